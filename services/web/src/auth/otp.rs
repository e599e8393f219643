//! services/web/src/auth/otp.rs
//!
//! Drives the OTP state machine from `marketplace_core` against the backend:
//! submitting the code, resending it, and ticking the resend countdown.

use crate::auth::session::SessionManager;
use crate::error::WebError;
use marketplace_core::domain::Session;
use marketplace_core::otp::{OtpFlow, OtpPhase};
use marketplace_core::ports::AuthService;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// What a submit produced.
#[derive(Debug, Clone, PartialEq)]
pub enum VerifyOutcome {
    /// The session is stored; the UI navigates to `redirect`.
    Verified {
        session: Session,
        redirect: &'static str,
    },
    /// Back to entering; `message` is shown inline.
    Rejected { message: String },
}

/// One verification attempt for one email address.
#[derive(Clone)]
pub struct OtpVerification {
    email: String,
    flow: Arc<Mutex<OtpFlow>>,
    auth: Arc<dyn AuthService>,
    sessions: SessionManager,
}

impl OtpVerification {
    pub fn new(email: impl Into<String>, auth: Arc<dyn AuthService>, sessions: SessionManager) -> Self {
        Self {
            email: email.into(),
            flow: Arc::new(Mutex::new(OtpFlow::new())),
            auth,
            sessions,
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// A copy of the current flow state for rendering.
    pub async fn snapshot(&self) -> OtpFlow {
        self.flow.lock().await.clone()
    }

    pub async fn enter(&self, index: usize, text: &str) -> Result<(), WebError> {
        Ok(self.flow.lock().await.enter(index, text)?)
    }

    pub async fn backspace(&self, index: usize) -> Result<(), WebError> {
        Ok(self.flow.lock().await.backspace(index)?)
    }

    pub async fn paste(&self, text: &str) -> Result<bool, WebError> {
        Ok(self.flow.lock().await.paste(text)?)
    }

    /// Sends the entered code to the verification endpoint.
    ///
    /// Returns `Err` only when the flow is misused (incomplete code, double
    /// submit). Backend rejections come back as `VerifyOutcome::Rejected`.
    pub async fn submit(&self) -> Result<VerifyOutcome, WebError> {
        let code = self.flow.lock().await.begin_submit()?;

        let verified = match self.auth.verify_otp(&self.email, &code).await {
            Ok(session) => self.sessions.sign_in(session.clone()).await.map(|_| session),
            Err(e) => Err(e),
        };

        let mut flow = self.flow.lock().await;
        match verified {
            Ok(session) => {
                flow.finish_submit(Ok(()))?;
                info!("OTP verified for {}", self.email);
                let redirect = session.user_type.home_path();
                Ok(VerifyOutcome::Verified { session, redirect })
            }
            Err(e) => {
                warn!("OTP verification failed for {}: {}", self.email, e);
                let message = e.user_message();
                flow.finish_submit(Err(message.clone()))?;
                Ok(VerifyOutcome::Rejected { message })
            }
        }
    }

    /// Requests a new code. Refused while the countdown is running; a success
    /// restarts the countdown at 60 seconds.
    pub async fn resend(&self) -> Result<bool, WebError> {
        self.flow.lock().await.begin_resend()?;
        let result = self.auth.resend_otp(&self.email).await;
        let mut flow = self.flow.lock().await;
        match result {
            Ok(()) => {
                info!("OTP resent to {}", self.email);
                flow.finish_resend(Ok(()));
                Ok(true)
            }
            Err(e) => {
                warn!("OTP resend failed for {}: {}", self.email, e);
                flow.finish_resend(Err(e.user_message()));
                Ok(false)
            }
        }
    }

    /// Ticks the resend countdown once per second until `cancel` fires or the
    /// code is verified.
    pub fn start_countdown(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let flow = self.flow.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            // The first tick of an interval completes immediately.
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        let mut flow = flow.lock().await;
                        if *flow.phase() == OtpPhase::Verified {
                            break;
                        }
                        flow.tick();
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::session_store::MemorySessionStore;
    use crate::auth::session::tests::FakeAuth;
    use marketplace_core::otp::OtpError;
    use std::sync::atomic::Ordering;

    fn verification(auth: Arc<FakeAuth>) -> OtpVerification {
        let sessions = SessionManager::new(Arc::new(MemorySessionStore::new()), auth.clone());
        OtpVerification::new("ada@example.com", auth, sessions)
    }

    #[tokio::test]
    async fn correct_code_signs_in_and_redirects_by_role() {
        let auth = Arc::new(FakeAuth::default());
        let otp = verification(auth);
        assert!(otp.paste("1234").await.unwrap());

        let outcome = otp.submit().await.unwrap();
        match outcome {
            VerifyOutcome::Verified { redirect, session } => {
                assert_eq!(redirect, "/customer/dashboard");
                assert_eq!(session.token, "tok");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(otp.sessions.is_authenticated().await);
        assert_eq!(*otp.snapshot().await.phase(), OtpPhase::Verified);
    }

    #[tokio::test]
    async fn wrong_code_returns_to_entering_with_message() {
        let otp = verification(Arc::new(FakeAuth::default()));
        otp.paste("9999").await.unwrap();

        let outcome = otp.submit().await.unwrap();
        assert_eq!(
            outcome,
            VerifyOutcome::Rejected {
                message: "Invalid OTP".into()
            }
        );
        let flow = otp.snapshot().await;
        assert_eq!(flow.error(), Some("Invalid OTP"));
        assert!(flow.can_submit());
    }

    #[tokio::test]
    async fn incomplete_code_is_not_sent() {
        let otp = verification(Arc::new(FakeAuth::default()));
        otp.enter(0, "1").await.unwrap();
        let err = otp.submit().await.unwrap_err();
        assert!(matches!(err, WebError::Otp(OtpError::Incomplete)));
    }

    #[tokio::test]
    async fn resend_is_refused_during_cooldown() {
        let auth = Arc::new(FakeAuth::default());
        let otp = verification(auth.clone());
        let err = otp.resend().await.unwrap_err();
        assert!(matches!(err, WebError::Otp(OtpError::CooldownActive(60))));
        assert_eq!(auth.resends.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_ticks_once_per_second_and_resend_restarts_it() {
        let auth = Arc::new(FakeAuth::default());
        let otp = verification(auth.clone());
        let cancel = CancellationToken::new();
        let ticker = otp.start_countdown(cancel.clone());

        tokio::time::sleep(Duration::from_millis(30_500)).await;
        assert_eq!(otp.snapshot().await.cooldown().remaining(), 30);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(otp.snapshot().await.can_resend());

        assert!(otp.resend().await.unwrap());
        assert_eq!(auth.resends.load(Ordering::SeqCst), 1);
        assert_eq!(otp.snapshot().await.cooldown().remaining(), 60);

        cancel.cancel();
        ticker.await.unwrap();
    }

    #[tokio::test]
    async fn failed_resend_surfaces_generic_message() {
        let auth = Arc::new(FakeAuth {
            fail_resend: true,
            ..Default::default()
        });
        let otp = verification(auth);
        for _ in 0..60 {
            otp.flow.lock().await.tick();
        }
        assert!(!otp.resend().await.unwrap());
        let flow = otp.snapshot().await;
        assert_eq!(flow.error(), Some(marketplace_core::ports::GENERIC_FAILURE_MESSAGE));
        assert!(flow.can_resend());
    }
}
