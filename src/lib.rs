#![doc = include_str!("../README.md")]

pub mod client;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod guard;
pub mod http;
pub mod navigation;
pub mod notify;
pub mod payment;
pub mod phone;
pub mod session;
pub mod storage;
pub mod token;
pub mod types;

#[cfg(test)]
mod testing;

// Re-exports for convenient access
pub use client::{Client, ClientBuilder};
pub use config::ClientConfig;
pub use dashboard::{
    DashboardState, DashboardStore, PaymentType, TransactionFilters, TransactionStats,
    TransactionStatus,
};
pub use error::Error;
pub use guard::{GuardDecision, GuardOutcome, RouteGuards};
pub use http::{ApiClient, NormalizedError, ReqwestTransport, Transport};
pub use navigation::{LogNavigator, Navigator};
pub use notify::{AlertCenter, AlertKind, Notification, NotificationSink};
pub use payment::{PaymentRequest, PaymentResult, PaymentState, PaymentStore, Receipt};
pub use session::{AuthPhase, Session, SessionManager};
pub use storage::{CookieStore, ExecutionContext, KeyValueStore, MemoryStore, Persistence};
pub use types::{ApiResponse, ProfileUpdate, Role, User, UserId};
