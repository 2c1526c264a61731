//! Named OS signal routing to ordered async callbacks.
//!
//! A [`SignalRouter`] keeps, per signal name, an ordered list of callbacks.
//! The first registration for a name installs a trap: a listener task that
//! waits on the OS signal and pushes the name through a channel to a single
//! dispatcher task. The dispatcher runs [`SignalRouter::execute_callbacks`],
//! so user code never runs inside the listener itself.
//!
//! [`SignalRouter::clear`] stops the listeners and re-arms the OS default
//! action of every signal no other router still traps. tokio never removes
//! its own process-wide handler, so on unix the default is re-armed through
//! a `signal-hook` conditional-default action registered alongside the trap.
//!
//! Names are case-insensitive and the `SIG` prefix is optional: `"int"`,
//! `"INT"` and `"SIGINT"` all address the same key, `INT`.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{AppError, BoxError, BoxFuture, Result};

/// Signal callback stored by the router.
pub type SignalCallback =
    Arc<dyn Fn() -> BoxFuture<'static, std::result::Result<(), BoxError>> + Send + Sync>;

#[derive(Default)]
struct Inner {
    callbacks: Mutex<HashMap<String, Vec<SignalCallback>>>,
    traps: Mutex<HashMap<String, Trap>>,
    dispatcher: Mutex<Option<Dispatcher>>,
}

struct Trap {
    task: JoinHandle<()>,
    /// Raw signal number whose default action `clear` can re-arm.
    signo: Option<i32>,
}

struct Dispatcher {
    tx: mpsc::UnboundedSender<String>,
    task: JoinHandle<()>,
}

/// Maps signal names to ordered callback lists and owns the OS traps.
///
/// Cloning yields another handle to the same router.
#[derive(Clone, Default)]
pub struct SignalRouter {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SignalRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let trapped: HashSet<String> = lock(&self.inner.traps).keys().cloned().collect();
        f.debug_struct("SignalRouter")
            .field("trapped", &trapped)
            .finish_non_exhaustive()
    }
}

impl SignalRouter {
    /// Create an empty router with no traps installed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `callback` to every name in `signals`.
    ///
    /// The first callback for a name also installs the OS trap. A name
    /// whose trap cannot be installed (unknown signal, signal that cannot be
    /// caught, no tokio runtime) is logged as a warning; its callback stays
    /// recorded and the remaining names are still processed.
    pub fn register<F, Fut>(&self, signals: &[&str], callback: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), BoxError>> + Send + 'static,
    {
        let callback: SignalCallback = Arc::new(move || Box::pin(callback()));

        for raw in signals {
            let name = normalize(raw);
            let first = {
                let mut callbacks = lock(&self.inner.callbacks);
                let list = callbacks.entry(name.clone()).or_default();
                list.push(Arc::clone(&callback));
                list.len() == 1
            };

            if first {
                self.trap(&name);
            }
        }
    }

    /// `true` if at least one callback is registered for `signal`,
    /// regardless of whether its trap is live.
    #[must_use]
    pub fn is_registered(&self, signal: &str) -> bool {
        lock(&self.inner.callbacks)
            .get(&normalize(signal))
            .is_some_and(|list| !list.is_empty())
    }

    /// `true` if an OS trap is currently installed for `signal`.
    #[must_use]
    pub fn is_trapped(&self, signal: &str) -> bool {
        lock(&self.inner.traps).contains_key(&normalize(signal))
    }

    /// Remove every trap and forget every callback.
    ///
    /// Each listener task is stopped and the signal's OS default action is
    /// restored unless another router still traps it. A signal whose
    /// default cannot be restored is logged as a warning. The callback map
    /// is emptied unconditionally.
    pub fn clear(&self) {
        let traps = std::mem::take(&mut *lock(&self.inner.traps));
        for (name, trap) in traps {
            if trap.task.is_finished() {
                warn!(signal = %name, "signal listener already stopped");
            }
            trap.task.abort();

            match trap.signo.map(release_default) {
                Some(true) => debug!(signal = %name, "default signal action restored"),
                Some(false) => {
                    debug!(signal = %name, "signal still trapped by another router");
                }
                None => warn!(signal = %name, "default signal action not restored"),
            }
        }

        if let Some(dispatcher) = lock(&self.inner.dispatcher).take() {
            dispatcher.task.abort();
        }

        lock(&self.inner.callbacks).clear();
    }

    /// Run every callback registered for `signal`, in registration order.
    ///
    /// Each callback runs in its own task. An error or panic is logged and
    /// the next callback still runs.
    pub async fn execute_callbacks(&self, signal: &str) {
        let name = normalize(signal);
        let callbacks: Vec<SignalCallback> = lock(&self.inner.callbacks)
            .get(&name)
            .cloned()
            .unwrap_or_default();

        for (index, callback) in callbacks.into_iter().enumerate() {
            match tokio::spawn(callback()).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    error!(signal = %name, index, error = %err, "signal callback failed");
                }
                Err(join_err) => {
                    error!(signal = %name, index, error = %join_err, "signal callback panicked");
                }
            }
        }
    }

    fn trap(&self, name: &str) {
        let installed = Handle::try_current()
            .map_err(|err| AppError::Signal(format!("no async runtime to trap SIG{name}: {err}")))
            .and_then(|handle| {
                let tx = self.dispatcher_tx(&handle);
                install_trap(&handle, name, tx)
            });

        match installed {
            Ok(trap) => {
                debug!(signal = %name, "signal trap installed");
                lock(&self.inner.traps).insert(name.to_owned(), trap);
            }
            Err(err) => {
                warn!(signal = %name, error = %err, "failed to install signal trap");
            }
        }
    }

    fn dispatcher_tx(&self, handle: &Handle) -> mpsc::UnboundedSender<String> {
        let mut slot = lock(&self.inner.dispatcher);
        if let Some(dispatcher) = slot.as_ref() {
            if !dispatcher.task.is_finished() {
                return dispatcher.tx.clone();
            }
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let task = handle.spawn(async move {
            while let Some(name) = rx.recv().await {
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                SignalRouter { inner }.execute_callbacks(&name).await;
            }
        });

        *slot = Some(Dispatcher {
            tx: tx.clone(),
            task,
        });
        tx
    }
}

/// Canonical key for a signal name: upper case without the `SIG` prefix.
#[must_use]
pub fn normalize(signal: &str) -> String {
    let upper = signal.trim().to_ascii_uppercase();
    match upper.strip_prefix("SIG") {
        Some(rest) if !rest.is_empty() => rest.to_owned(),
        _ => upper,
    }
}

#[cfg(unix)]
fn install_trap(
    handle: &Handle,
    name: &str,
    tx: mpsc::UnboundedSender<String>,
) -> Result<Trap> {
    use std::str::FromStr;

    use nix::sys::signal::Signal;
    use tokio::signal::unix::{signal, SignalKind};

    let sig = Signal::from_str(&format!("SIG{name}"))
        .map_err(|err| AppError::Signal(format!("unknown signal SIG{name}: {err}")))?;

    let _entered = handle.enter();
    let mut stream = signal(SignalKind::from_raw(sig as i32))
        .map_err(|err| AppError::Signal(format!("cannot trap {sig}: {err}")))?;

    let signo = sig as i32;
    let signo = match hold_default(signo) {
        Ok(()) => Some(signo),
        Err(err) => {
            warn!(signal = %name, error = %err, "default signal action cannot be restored");
            None
        }
    };

    let name = name.to_owned();
    let task = handle.spawn(async move {
        while stream.recv().await.is_some() {
            info!(signal = %name, "received signal");
            if tx.send(name.clone()).is_err() {
                break;
            }
        }
    });
    Ok(Trap { task, signo })
}

#[cfg(not(unix))]
fn install_trap(
    handle: &Handle,
    name: &str,
    tx: mpsc::UnboundedSender<String>,
) -> Result<Trap> {
    if name != "INT" {
        return Err(AppError::Signal(format!(
            "SIG{name} is not supported on this platform"
        )));
    }

    let name = name.to_owned();
    let task = handle.spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            info!(signal = %name, "received signal");
            if tx.send(name.clone()).is_err() {
                break;
            }
        }
    });
    Ok(Trap { task, signo: None })
}

/// Process-wide default-action switch for one signal number.
///
/// The conditional-default action stays registered for the life of the
/// process; it runs the OS default only while `restore` is set, which is
/// whenever no router holds a trap for the signal.
#[cfg(unix)]
struct DefaultAction {
    restore: Arc<std::sync::atomic::AtomicBool>,
    holders: usize,
}

#[cfg(unix)]
fn default_actions() -> &'static Mutex<HashMap<i32, DefaultAction>> {
    static ACTIONS: std::sync::OnceLock<Mutex<HashMap<i32, DefaultAction>>> =
        std::sync::OnceLock::new();
    ACTIONS.get_or_init(Mutex::default)
}

/// Suppress the default action of `signo` while this trap is live.
#[cfg(unix)]
fn hold_default(signo: i32) -> Result<()> {
    use std::sync::atomic::{AtomicBool, Ordering};

    let mut actions = lock(default_actions());
    if let Some(action) = actions.get_mut(&signo) {
        action.holders += 1;
        action.restore.store(false, Ordering::SeqCst);
        return Ok(());
    }

    let restore = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register_conditional_default(signo, Arc::clone(&restore))
        .map_err(|err| AppError::Signal(format!("cannot register default action: {err}")))?;
    actions.insert(signo, DefaultAction { restore, holders: 1 });
    Ok(())
}

/// Drop one hold on `signo`; returns `true` once the default is re-armed.
#[cfg(unix)]
fn release_default(signo: i32) -> bool {
    use std::sync::atomic::Ordering;

    let mut actions = lock(default_actions());
    let Some(action) = actions.get_mut(&signo) else {
        return false;
    };
    action.holders = action.holders.saturating_sub(1);
    if action.holders == 0 {
        action.restore.store(true, Ordering::SeqCst);
        true
    } else {
        false
    }
}

#[cfg(not(unix))]
fn release_default(_signo: i32) -> bool {
    false
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
