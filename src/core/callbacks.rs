//! Scheduler event callbacks.
//!
//! Listeners are registered per event kind and identified by the [`CallbackHandle`]
//! returned at registration. Events are delivered on a dedicated notifier thread, outside
//! any scheduler lock, so a slow or panicking listener never stalls dispatch.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Sender};
use parking_lot::Mutex;
use tracing::{debug, error};

use super::error::SchedulerError;
use super::task::{TaskOutput, TaskResult, TaskState};
use super::uid::WorkerUid;
use crate::util::panic_message;

/// Identifies a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallbackHandle(u64);

/// A listener for events of type `E`.
pub type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Emitted after `add` or `set`, whether it succeeded or not.
#[derive(Debug, Clone)]
pub struct AddEvent {
    /// The task that was submitted.
    pub task: TaskState,
    /// Why the operation failed.
    pub error: Option<SchedulerError>,
}

/// Emitted after `cancel`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelEvent {
    /// Task key.
    pub key: String,
    /// Why the operation failed.
    pub error: Option<SchedulerError>,
}

/// Emitted after every execution of a task body.
#[derive(Debug, Clone)]
pub struct ExecuteEvent {
    /// Task snapshot taken after the run was recorded.
    pub task: TaskState,
    /// What the body returned.
    pub result: TaskResult,
    /// The executor that ran it.
    pub executor: WorkerUid,
}

impl ExecuteEvent {
    /// Output of a successful run.
    #[must_use]
    pub fn output(&self) -> Option<&TaskOutput> {
        self.result.as_ref().ok()
    }

    /// Error of a failed run.
    #[must_use]
    pub fn error(&self) -> Option<&anyhow::Error> {
        self.result.as_ref().err().map(AsRef::as_ref)
    }
}

/// Emitted after `ban`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BanEvent {
    /// Task key.
    pub key: String,
    /// Why the operation failed.
    pub error: Option<SchedulerError>,
}

/// Emitted after `unban`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnBanEvent {
    /// Task key.
    pub key: String,
    /// Why the operation failed.
    pub error: Option<SchedulerError>,
}

/// Ordered list of listeners for one event kind.
pub struct CallbackList<E> {
    next_handle: AtomicU64,
    listeners: Mutex<Vec<(CallbackHandle, Callback<E>)>>,
}

impl<E> Default for CallbackList<E> {
    fn default() -> Self {
        Self {
            next_handle: AtomicU64::new(0),
            listeners: Mutex::new(Vec::new()),
        }
    }
}

impl<E> CallbackList<E> {
    /// Append a listener.
    pub fn add<F>(&self, listener: F) -> CallbackHandle
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let handle = CallbackHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((handle, Arc::new(listener)));
        handle
    }

    /// Remove a listener. Returns false if the handle is unknown.
    pub fn remove(&self, handle: CallbackHandle) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(h, _)| *h != handle);
        listeners.len() != before
    }

    /// Number of listeners.
    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Whether no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.lock().is_empty()
    }

    /// Call every listener in registration order. The list lock is not held while calling.
    pub fn invoke(&self, event: &E) {
        let listeners: Vec<Callback<E>> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| listener(event))) {
                error!(
                    panic = %panic_message(payload.as_ref()),
                    "callback panicked"
                );
            }
        }
    }
}

/// Listener lists of one scheduler.
#[derive(Default)]
pub(crate) struct SchedulerCallbacks {
    pub add: CallbackList<AddEvent>,
    pub cancel: CallbackList<CancelEvent>,
    pub execute: CallbackList<ExecuteEvent>,
    pub ban: CallbackList<BanEvent>,
    pub unban: CallbackList<UnBanEvent>,
}

pub(crate) enum Notification {
    Add(AddEvent),
    Cancel(CancelEvent),
    Execute(ExecuteEvent),
    Ban(BanEvent),
    UnBan(UnBanEvent),
}

impl SchedulerCallbacks {
    fn deliver(&self, notification: &Notification) {
        match notification {
            Notification::Add(event) => self.add.invoke(event),
            Notification::Cancel(event) => self.cancel.invoke(event),
            Notification::Execute(event) => self.execute.invoke(event),
            Notification::Ban(event) => self.ban.invoke(event),
            Notification::UnBan(event) => self.unban.invoke(event),
        }
    }
}

/// Delivers notifications on its own thread, in submission order.
pub(crate) struct Notifier {
    tx: Mutex<Option<Sender<Notification>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Notifier {
    pub fn spawn(callbacks: Arc<SchedulerCallbacks>) -> io::Result<Self> {
        let (tx, rx) = unbounded::<Notification>();
        let handle = thread::Builder::new()
            .name("task-notifier".into())
            .spawn(move || {
                for notification in rx {
                    callbacks.deliver(&notification);
                }
                debug!("notifier exiting");
            })?;
        Ok(Self {
            tx: Mutex::new(Some(tx)),
            handle: Mutex::new(Some(handle)),
        })
    }

    pub fn send(&self, notification: Notification) {
        let delivered = self
            .tx
            .lock()
            .as_ref()
            .is_some_and(|tx| tx.send(notification).is_ok());
        if !delivered {
            debug!("notifier closed, dropping event");
        }
    }

    /// Stop accepting events and wait until the queued ones are delivered, unless called
    /// from a listener.
    pub fn close(&self) {
        self.tx.lock().take();
        let Some(handle) = self.handle.lock().take() else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            error!("notifier thread panicked");
        }
    }

    /// Stop accepting events without waiting.
    pub fn close_nowait(&self) {
        self.tx.lock().take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_add_remove_by_handle() {
        let list: CallbackList<CancelEvent> = CallbackList::default();
        let first = list.add(|_| {});
        let second = list.add(|_| {});
        assert_ne!(first, second);
        assert_eq!(list.len(), 2);
        assert!(list.remove(first));
        assert!(!list.remove(first));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_invoke_survives_panicking_listener() {
        let hits = Arc::new(AtomicUsize::new(0));
        let list: CallbackList<BanEvent> = CallbackList::default();
        list.add(|_| panic!("listener failure"));
        let counter = Arc::clone(&hits);
        list.add(move |event| {
            assert_eq!(event.key, "k");
            counter.fetch_add(1, Ordering::SeqCst);
        });

        list.invoke(&BanEvent {
            key: "k".into(),
            error: None,
        });
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_notifier_delivers_before_close_returns() {
        let callbacks = Arc::new(SchedulerCallbacks::default());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        callbacks.unban.add(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let notifier = Notifier::spawn(Arc::clone(&callbacks)).unwrap();
        for _ in 0..10 {
            notifier.send(Notification::UnBan(UnBanEvent {
                key: "k".into(),
                error: None,
            }));
        }
        notifier.close();
        assert_eq!(hits.load(Ordering::SeqCst), 10);

        notifier.send(Notification::UnBan(UnBanEvent {
            key: "k".into(),
            error: None,
        }));
        assert_eq!(hits.load(Ordering::SeqCst), 10);
    }
}
