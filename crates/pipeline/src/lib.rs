//! Job tracking pipeline.
//!
//! Holds the in-memory job store, the media materializer, the long-running
//! operation poller and its supervisor, the generation dispatcher, and the
//! read-only status/download gateway.

pub mod dispatcher;
pub mod gateway;
pub mod materializer;
pub mod poller;
pub mod retention;
pub mod store;
pub mod supervisor;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use dispatcher::GenerationDispatcher;
pub use gateway::{DownloadTarget, JobGateway, JobView};
pub use materializer::{MaterializeError, MediaMaterializer};
pub use poller::{OperationPoller, PollConfig, PollTarget};
pub use store::JobStore;
pub use supervisor::PollerSupervisor;
