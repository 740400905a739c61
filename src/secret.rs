//! In-memory secret state: the lock flag, the cached wallet password, and
//! the auto-relock timer.
//!
//! The state lives behind an `Arc<Mutex<_>>` shared between the dispatcher
//! and the relock timer task; the timer takes the mutex before flipping the
//! lock flag, so an operation either observes the wallet unlocked and runs
//! to completion with the password it captured, or observes it locked.
//!
//! The cached password survives lock/unlock cycles — password-change
//! verification compares against it when the wallet has been unlocked once.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::AbortHandle;
use zeroize::Zeroizing;

/// Lock state and cached credentials. Always `locked` with no password at
/// process start.
pub struct SecretState {
    locked: bool,
    password: Option<Zeroizing<String>>,
    relock: Option<AbortHandle>,
}

impl SecretState {
    pub fn new() -> Self {
        SecretState {
            locked: true,
            password: None,
            relock: None,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// The password cached by the last unlock / password change.
    pub fn cached_password(&self) -> Option<&str> {
        self.password.as_deref().map(String::as_str)
    }

    pub fn cache_password(&mut self, password: &str) {
        self.password = Some(Zeroizing::new(password.to_string()));
    }

    /// Mark unlocked; any pending relock timer stays armed until replaced.
    pub fn set_unlocked(&mut self) {
        self.locked = false;
    }

    /// Mark locked and cancel a pending relock timer. The cached password
    /// is retained.
    pub fn lock(&mut self) {
        self.locked = true;
        self.disarm();
    }

    fn disarm(&mut self) {
        if let Some(handle) = self.relock.take() {
            handle.abort();
        }
    }
}

impl Default for SecretState {
    fn default() -> Self {
        Self::new()
    }
}

/// Arm (or re-arm) the auto-relock timer: after `timeout`, the wallet
/// flips back to locked under the state mutex.
pub async fn arm_relock(state: &Arc<Mutex<SecretState>>, timeout: Duration) {
    let mut guard = state.lock().await;
    guard.disarm();
    let timer_state = Arc::clone(state);
    let task = tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        let mut guard = timer_state.lock().await;
        guard.locked = true;
        guard.relock = None;
        tracing::debug!("auto-relock timer expired, wallet locked");
    });
    guard.relock = Some(task.abort_handle());
}
