pub mod otp;
pub mod session;

pub use otp::{OtpVerification, VerifyOutcome};
pub use session::SessionManager;
