pub mod cache;
pub mod data_service;
pub mod discover;
pub mod error;
pub mod events;
pub mod identifier;
pub mod location;
pub mod memory;
pub mod models;
pub mod pacing;
pub mod process;
pub mod progress;
pub mod site;
pub mod traits;

#[cfg(test)]
pub mod testutil;

pub use cache::{Cache, CacheTtls, ClearReport};
pub use data_service::{DataService, QueueStatus, WarmUpReport};
pub use discover::{DiscoverReport, DiscoverRequest, Discoverer, StopReason};
pub use error::AppError;
pub use events::{PipelineEvent, PipelineReporter, TracingReporter};
pub use identifier::JobId;
pub use memory::MemoryStore;
pub use models::{Company, CompanyLookup, ItemState, PostingRecord, StoredPosting, WorkType};
pub use pacing::Pacing;
pub use process::{ProcessReport, Processor};
pub use progress::{ProgressSnapshot, ProgressTracker, spawn_ticker};
pub use site::SiteProfile;
pub use traits::{BackendGateway, KvStore, PageDriver, PageExtractor, ReadyProbe, Readiness};
