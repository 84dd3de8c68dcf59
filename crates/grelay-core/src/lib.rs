pub mod auth;
pub mod error;
pub mod gemini;
pub mod service;
pub mod upstream;
pub mod usage;

pub use auth::{AuthKeyEntry, AuthProvider, AuthRejection, AuthSnapshot, MemoryAuth, Principal};
pub use error::GenerateError;
pub use service::GenerateService;
pub use upstream::{
    Headers, UpstreamClient, UpstreamClientConfig, UpstreamFailure, UpstreamRequest,
    UpstreamResponse, UpstreamTransportErrorKind, WreqUpstreamClient,
};
pub use usage::{NoopUsageSink, SharedUsageSink, UsageRecord, UsageSink};
