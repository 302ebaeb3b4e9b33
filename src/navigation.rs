//! Re-typesetting math after client-side navigation.
//!
//! Sites that swap page content without a full reload fire a "navigation
//! settled" notification once the new content is in place. [`MathRefresher`]
//! listens for it and asks the engine to reprocess the page, without waiting
//! for the pass to finish.

use crate::render::TypesetEngine;
use std::sync::{Arc, Mutex, PoisonError};

/// Receiver of navigation-settled notifications.
pub trait NavigationListener: Send + Sync {
    fn on_settled(&self);
}

/// Source of navigation-settled notifications.
pub trait NavigationSource {
    fn subscribe(&self, listener: Arc<dyn NavigationListener>);
}

/// Issues a reprocessing request on every notification.
///
/// Engine failures are not observed here; the next navigation triggers
/// another attempt.
pub struct MathRefresher {
    engine: Arc<dyn TypesetEngine>,
}

impl MathRefresher {
    pub fn new(engine: Arc<dyn TypesetEngine>) -> Self {
        Self { engine }
    }
}

impl NavigationListener for MathRefresher {
    fn on_settled(&self) {
        tracing::debug!("navigation settled, requesting typeset");
        self.engine.typeset().detach();
    }
}

/// In-memory notification source.
#[derive(Default)]
pub struct NavigationBus {
    listeners: Mutex<Vec<Arc<dyn NavigationListener>>>,
}

impl NavigationBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notify every listener, in subscription order.
    pub fn settle(&self) {
        let listeners = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        tracing::trace!(listeners = listeners.len(), "navigation settled");
        for listener in listeners {
            listener.on_settled();
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl NavigationSource for NavigationBus {
    fn subscribe(&self, listener: Arc<dyn NavigationListener>) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }
}
