pub mod classifier;
pub mod filter;
pub mod fusion;
pub mod lexical;
pub mod pipeline;
pub mod retrieval;
pub mod snapshot;
pub mod vector;

pub use classifier::{QueryKind, classify};
pub use fusion::{Candidate, FusionError, SourceKind, fuse};
pub use lexical::{LexicalMatcher, partial_ratio};
pub use pipeline::{HybridSearcher, MAX_QUERY_CHARS, SearchError, SearchOutcome, SearchRoute};
pub use retrieval::{RetrievalDefaults, query_encoder};
pub use snapshot::{CatalogHandle, CatalogSnapshot, SnapshotBuildError};
pub use vector::{FlatL2Index, Neighbor, VectorRetriever};
