// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod article;
pub mod ingest;
pub mod read;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::article::{NewsArticle, ProviderTag, SourceRef};
pub use crate::ingest::scheduler::IngestScheduler;
pub use crate::read::ReadService;
pub use crate::store::ArticleStore;
