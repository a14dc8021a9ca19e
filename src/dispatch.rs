//! Callback marshaling between engine threads and the owning thread
//!
//! Engines never call host code directly. They push [`EngineEvent`]s through an
//! [`EngineNotifier`] into a crossbeam channel, and the owner drains the
//! channel from its own thread via [`CallbackQueue::try_next`]. Every
//! notifier is stamped with the generation that was current when its engine
//! handle was created. Tearing a handle down bumps the generation, after which
//! the old notifier refuses to send and anything it already queued is dropped
//! at drain time, so a superseded handle can never produce a late callback.
//! Local notifications posted with [`CallbackQueue::post`] are decisions the
//! owner already made and are always delivered, in order with the engine
//! callbacks around them. [`CallbackQueue::post_current`] instead ties a
//! notification to the current generation like an engine callback.

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{error, trace};

use crate::engine::EngineEvent;
use crate::internal_error;
use crate::utils::error::Result;

/// A unit of work delivered to the owning thread
#[derive(Debug, Clone, PartialEq)]
pub enum Callback<L> {
    /// Notification produced by the engine
    Engine(EngineEvent),

    /// Notification the owner queued for itself
    Local(L),
}

struct Envelope<L> {
    /// `None` for local notifications
    generation: Option<u64>,
    callback: Callback<L>,
}

/// Single-consumer queue owned by a view or facade
pub struct CallbackQueue<L> {
    tx: Sender<Envelope<L>>,
    rx: Receiver<Envelope<L>>,
    generation: Arc<AtomicU64>,
}

impl<L: Send + 'static> CallbackQueue<L> {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            tx,
            rx,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Current generation
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Invalidate every notifier and queued callback issued so far
    ///
    /// Returns the new generation.
    pub fn invalidate(&self) -> u64 {
        let next = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        trace!("callback generation advanced to {}", next);
        next
    }

    /// Create a notifier for a new engine handle, bound to the current generation
    pub fn notifier(&self) -> EngineNotifier {
        let tx = self.tx.clone();
        EngineNotifier {
            generation: self.generation(),
            current: Arc::clone(&self.generation),
            sink: Arc::new(move |generation, event| {
                tx.send(Envelope {
                    generation: Some(generation),
                    callback: Callback::Engine(event),
                })
                .is_ok()
            }),
        }
    }

    /// Queue a local notification behind everything already pending
    pub fn post(&self, local: L) {
        // The queue holds its own receiver, so the channel cannot be disconnected here.
        let _ = self.tx.send(Envelope {
            generation: None,
            callback: Callback::Local(local),
        });
    }

    /// Queue a local notification that the next `invalidate` withdraws
    pub fn post_current(&self, local: L) {
        let _ = self.tx.send(Envelope {
            generation: Some(self.generation()),
            callback: Callback::Local(local),
        });
    }

    /// Pop the next callback that is unstamped or of the current generation
    pub fn try_next(&self) -> Option<Callback<L>> {
        loop {
            let envelope = self.rx.try_recv().ok()?;
            match envelope.generation {
                Some(generation) if generation != self.generation() => {
                    trace!("dropping stale callback from generation {}", generation);
                }
                _ => return Some(envelope.callback),
            }
        }
    }
}

impl<L: Send + 'static> Default for CallbackQueue<L> {
    fn default() -> Self {
        Self::new()
    }
}

type NotifySink = dyn Fn(u64, EngineEvent) -> bool + Send + Sync;

/// Producer side handed to an engine handle
///
/// Cheap to clone and safe to move onto engine threads.
#[derive(Clone)]
pub struct EngineNotifier {
    generation: u64,
    current: Arc<AtomicU64>,
    sink: Arc<NotifySink>,
}

impl EngineNotifier {
    /// Queue an event for the owning thread
    ///
    /// Returns `false` once the handle this notifier belongs to was superseded.
    pub fn notify(&self, event: EngineEvent) -> bool {
        if !self.is_current() {
            trace!("suppressing {:?} from superseded generation {}", event, self.generation);
            return false;
        }
        (self.sink)(self.generation, event)
    }

    /// Whether the owning handle is still the live one
    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.generation
    }
}

impl fmt::Debug for EngineNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineNotifier")
            .field("generation", &self.generation)
            .field("current", &self.is_current())
            .finish()
    }
}

/// Run host-supplied code, converting a panic into an internal error
pub fn guarded<T, F>(what: &str, f: F) -> Result<T>
where
    F: FnOnce() -> T,
{
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let message = panic_message(payload.as_ref());
        error!("caught panic in {}: {}", what, message);
        internal_error!("{} panicked: {}", what, message)
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
