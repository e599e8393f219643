pub mod conversation;
pub mod domain;
pub mod init;
pub mod notifications;
pub mod otp;
pub mod ports;

pub use conversation::MessageLog;
pub use domain::{
    BundleSummary, ChatMessage, ConversationRef, ConversationSubject, GeoPoint, Notification,
    PendingSignup, ProviderSummary, PushPermission, QuickChat, SearchResults, Session, User,
    UserRole,
};
pub use init::{InitGuard, InitState};
pub use notifications::NotificationList;
pub use otp::{OtpError, OtpFlow, OtpInput, OtpPhase, ResendCooldown};
pub use ports::{
    AuthService, DeviceTokenRegistry, GeocodeProvider, LoginOutcome, PortError, PortResult,
    PushTokenSource, SearchService, SessionStore,
};
