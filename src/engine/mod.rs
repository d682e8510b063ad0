//! The watch lifecycle: which subscriptions run, and what happens to each
//! event they produce.

pub mod bootstrap;
pub mod pipeline;
pub mod registry;
pub mod subscription_manager;
pub mod watch_service;

pub use bootstrap::{BootstrapReport, resync};
pub use pipeline::{AlertPipeline, PipelineContext, PipelineOutcome};
pub use registry::{RegistryError, SubscriptionHandle, WatchRegistry};
pub use subscription_manager::{SubscriptionError, SubscriptionManager, TeardownReason, WatchState};
pub use watch_service::{WatchService, WatchServiceError};
