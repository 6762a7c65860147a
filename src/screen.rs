//! Building blocks shared by the screen view-models: the per-screen
//! cancellation scope, observable view state and one-shot screen events.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Observable state of a screen section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "data", rename_all = "snake_case")]
pub enum ViewState<T> {
    Loading,
    Ready(T),
}

impl<T> ViewState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    /// Returns the data once loaded.
    pub fn ready(&self) -> Option<&T> {
        match self {
            Self::Loading => None,
            Self::Ready(data) => Some(data),
        }
    }
}

/// One-shot notifications to the presentation layer.
///
/// Events travel on their own channel, so re-reading view state never
/// replays them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenEvent {
    /// The screen finished its job and should be dismissed.
    Close,
}

/// Receiving end of a screen's events.
#[derive(Debug)]
pub struct ScreenEvents {
    rx: mpsc::UnboundedReceiver<ScreenEvent>,
}

impl ScreenEvents {
    /// Creates a connected sender/receiver pair.
    pub fn channel() -> (mpsc::UnboundedSender<ScreenEvent>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }

    /// Waits for the next event. `None` once the screen is gone.
    pub async fn next(&mut self) -> Option<ScreenEvent> {
        self.rx.recv().await
    }

    /// Returns an already delivered event without waiting.
    pub fn try_next(&mut self) -> Option<ScreenEvent> {
        self.rx.try_recv().ok()
    }
}

/// Scoped cancellation group owning all asynchronous work of one screen
/// instance.
///
/// Work started with [`spawn`](Self::spawn) stops at its next await point
/// once the scope is revoked. State changes go through
/// [`publish`](Self::publish), which runs them one at a time and never after
/// [`revoke`](Self::revoke) has returned.
#[derive(Debug, Clone)]
pub struct ScreenScope {
    token: CancellationToken,
    foreground: Arc<Mutex<()>>,
}

impl ScreenScope {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            foreground: Arc::new(Mutex::new(())),
        }
    }

    /// Sub-scope that can be revoked on its own and is revoked together
    /// with this scope. Shares this scope's foreground context.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            foreground: Arc::clone(&self.foreground),
        }
    }

    /// Runs `future` on the runtime until it completes or the scope is
    /// revoked.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = self.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {}
                _ = future => {}
            }
        })
    }

    /// Applies a state change on the foreground context.
    ///
    /// Returns `false`, without running `apply`, once the scope is revoked.
    pub fn publish(&self, apply: impl FnOnce()) -> bool {
        let _foreground = self
            .foreground
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if self.token.is_cancelled() {
            return false;
        }
        apply();
        true
    }

    /// Revokes the scope and all its children. Idempotent.
    pub fn revoke(&self) {
        let _foreground = self
            .foreground
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.token.cancel();
    }

    pub fn is_revoked(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Default for ScreenScope {
    fn default() -> Self {
        Self::new()
    }
}
