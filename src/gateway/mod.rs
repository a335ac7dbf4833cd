//! Gateway orchestration: routing requests to backend servers, failover, and
//! federated model listing.

pub mod catalog;
mod failover;
pub mod registry;
pub mod router;

pub use catalog::{auto_model_entry, federate_models};
pub use registry::{
    CredentialStore, LocalRateLimiter, ModelCatalog, NullUsageLog, RateDecision, RateLimiter,
    ServerRegistry, UsageEvent, UsageLog,
};
pub use router::{GatewayRouter, RequestContext};
