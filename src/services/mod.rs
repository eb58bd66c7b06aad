pub mod catalog;
pub mod embeddings;
pub mod engine;
pub mod filter;
pub mod ranking;
pub mod scorer;
pub mod selector;

pub use catalog::{CatalogBuilder, CatalogIndex};
pub use embeddings::EmbeddingStore;
pub use engine::{Engine, QueryLimits, RecommendationQuery, Snapshot, SnapshotInfo, SnapshotLoader};
