//! crates/marketplace_core/src/init.rs
//!
//! Explicit state machine for one-time initialization of a channel.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitState {
    Uninitialized,
    Initializing,
    Ready,
    /// The last attempt failed; a new attempt is allowed.
    Failed(String),
}

/// Tracks whether an initialization may start.
///
/// `try_begin` hands out at most one in-flight attempt. Once `Ready`, every
/// further call is refused, so the guarded work runs exactly once per success.
#[derive(Debug, Clone)]
pub struct InitGuard {
    state: InitState,
    attempts: u32,
}

impl Default for InitGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl InitGuard {
    pub fn new() -> Self {
        Self {
            state: InitState::Uninitialized,
            attempts: 0,
        }
    }

    pub fn state(&self) -> &InitState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == InitState::Ready
    }

    /// Number of attempts started so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Claims the right to run the initialization. Returns `false` while an
    /// attempt is in flight or after one succeeded.
    pub fn try_begin(&mut self) -> bool {
        match self.state {
            InitState::Uninitialized | InitState::Failed(_) => {
                self.state = InitState::Initializing;
                self.attempts += 1;
                true
            }
            InitState::Initializing | InitState::Ready => false,
        }
    }

    pub fn succeed(&mut self) {
        if self.state == InitState::Initializing {
            self.state = InitState::Ready;
        }
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        if self.state == InitState::Initializing {
            self.state = InitState::Failed(reason.into());
        }
    }

    /// Back to `Uninitialized`, e.g. after the user signs out.
    pub fn reset(&mut self) {
        self.state = InitState::Uninitialized;
        self.attempts = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_one_attempt_runs_at_a_time() {
        let mut guard = InitGuard::new();
        assert!(guard.try_begin());
        assert!(!guard.try_begin());
        guard.succeed();
        assert!(guard.is_ready());
        assert!(!guard.try_begin());
        assert_eq!(guard.attempts(), 1);
    }

    #[test]
    fn failure_allows_a_retry() {
        let mut guard = InitGuard::new();
        assert!(guard.try_begin());
        guard.fail("permission denied");
        assert_eq!(guard.state(), &InitState::Failed("permission denied".into()));
        assert!(guard.try_begin());
        assert_eq!(guard.attempts(), 2);
    }

    #[test]
    fn outcomes_outside_an_attempt_are_ignored() {
        let mut guard = InitGuard::new();
        guard.succeed();
        assert_eq!(guard.state(), &InitState::Uninitialized);
    }
}
