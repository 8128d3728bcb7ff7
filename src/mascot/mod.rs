//! Mascot animation triggers.
//!
//! Game code reports "something happened to player X" through the
//! [`TriggerRegistry`]; each mounted [`Mascot`] registers a callback that
//! moves its [`Animator`] and publishes frames for a renderer.

mod animator;
mod table;
mod watcher;

pub use animator::{AnimationFrame, AnimationState, Animator, Hold, MascotEvent};
pub use table::{bundle_for, AnimationBundle};
pub use watcher::StatusWatcher;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock, Weak};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::types::{MascotSpecies, PlayerName};

/// Callback a mascot registers to receive events
pub type TriggerFn = Arc<dyn Fn(MascotEvent, Option<Hold>) + Send + Sync>;

/// Player name → trigger callback. Names match ignoring case.
#[derive(Default)]
pub struct TriggerRegistry {
    /// Keyed by normalized name; keeps the name as registered
    triggers: RwLock<HashMap<String, (PlayerName, TriggerFn)>>,
}

impl TriggerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(name: &str) -> String {
        name.trim().to_lowercase()
    }

    /// Store a callback for `name`, or remove it with `None` (on unmount)
    pub fn register(&self, name: &str, trigger: Option<TriggerFn>) {
        let Ok(mut triggers) = self.triggers.write() else {
            return;
        };
        match trigger {
            Some(trigger) => {
                triggers.insert(Self::key(name), (name.trim().to_string(), trigger));
            }
            None => {
                triggers.remove(&Self::key(name));
            }
        }
    }

    /// Deliver `event` to `name`'s mascot. Unregistered names are a no-op.
    ///
    /// Returns whether a callback ran.
    pub fn trigger(&self, name: &str, event: MascotEvent, hold: Option<Hold>) -> bool {
        let trigger = self
            .triggers
            .read()
            .ok()
            .and_then(|triggers| triggers.get(&Self::key(name)).map(|(_, t)| t.clone()));

        match trigger {
            Some(trigger) => {
                trigger(event, hold);
                true
            }
            None => {
                tracing::debug!("No mascot registered for {}, dropping {}", name, event);
                false
            }
        }
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.triggers
            .read()
            .map(|t| t.contains_key(&Self::key(name)))
            .unwrap_or(false)
    }

    /// Names with a mascot, as they were registered
    pub fn registered(&self) -> Vec<PlayerName> {
        self.triggers
            .read()
            .map(|t| t.values().map(|(name, _)| name.clone()).collect())
            .unwrap_or_default()
    }
}

struct MascotInner {
    animator: Mutex<Animator>,
    frames: watch::Sender<AnimationFrame>,
    reset_task: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for MascotInner {
    fn drop(&mut self) {
        if let Ok(mut task) = self.reset_task.lock() {
            if let Some(task) = task.take() {
                task.abort();
            }
        }
    }
}

/// A live mascot: an [`Animator`] that resets itself and publishes frames.
///
/// Must be triggered from inside a tokio runtime for the timed reset to be
/// published; without one the reset is still observed through [`Mascot::frame`].
#[derive(Clone)]
pub struct Mascot {
    inner: Arc<MascotInner>,
}

impl Mascot {
    pub fn new(species: MascotSpecies) -> Self {
        let animator = Animator::new(species);
        let (frames, _) = watch::channel(animator.frame_at(Instant::now()));
        Self {
            inner: Arc::new(MascotInner {
                animator: Mutex::new(animator),
                frames,
                reset_task: Mutex::new(None),
            }),
        }
    }

    pub fn species(&self) -> MascotSpecies {
        self.inner
            .animator
            .lock()
            .map(|a| a.species())
            .unwrap_or(MascotSpecies::Other)
    }

    /// Current frame, with any expired hold already reset
    pub fn frame(&self) -> AnimationFrame {
        let now = Instant::now();
        match self.inner.animator.lock() {
            Ok(animator) => animator.frame_at(now),
            Err(_) => *self.inner.frames.borrow(),
        }
    }

    /// Frames as they change, including timed resets
    pub fn subscribe(&self) -> watch::Receiver<AnimationFrame> {
        self.inner.frames.subscribe()
    }

    /// Apply `event` now and reschedule the reset to idle.
    ///
    /// The animator lock is held until the frame is published and the reset
    /// is rescheduled, so concurrent triggers publish in the order they apply.
    pub fn trigger(&self, event: MascotEvent, hold: Option<Hold>) {
        let now = Instant::now();
        let Ok(mut animator) = self.inner.animator.lock() else {
            return;
        };
        let deadline = animator.trigger(event, now, hold);
        self.inner.frames.send_replace(animator.frame_at(now));

        let Ok(mut pending) = self.inner.reset_task.lock() else {
            return;
        };
        if let Some(task) = pending.take() {
            task.abort();
        }
        if let (Some(deadline), Ok(runtime)) = (deadline, tokio::runtime::Handle::try_current()) {
            let weak = Arc::downgrade(&self.inner);
            *pending = Some(runtime.spawn(reset_after(weak, deadline)));
        }
    }

    /// Callback suitable for [`TriggerRegistry::register`]
    pub fn trigger_fn(&self) -> TriggerFn {
        let mascot = self.clone();
        Arc::new(move |event, hold| mascot.trigger(event, hold))
    }
}

async fn reset_after(inner: Weak<MascotInner>, deadline: Instant) {
    tokio::time::sleep_until(deadline).await;

    let Some(inner) = inner.upgrade() else {
        return;
    };
    // Publish under the lock: a newer trigger either already moved the
    // deadline (nothing settles) or waits until the idle frame is out
    if let Ok(mut animator) = inner.animator.lock() {
        if animator.settle(Instant::now()) {
            inner.frames.send_replace(animator.frame_at(deadline));
        }
    };
}
