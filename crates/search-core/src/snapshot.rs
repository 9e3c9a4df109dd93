use std::sync::Arc;

use common::{
    MedicineRecord,
    config::SpaceConfig,
    snapshot::{CatalogSource, SnapshotError, SnapshotRow},
};
use parking_lot::RwLock;

use crate::vector::{FlatL2Index, IndexBuildError};

#[derive(Debug, thiserror::Error)]
pub enum SnapshotBuildError {
    #[error(transparent)]
    Source(#[from] SnapshotError),
    #[error("row {row}: no vector for embedding space `{space}` (column `{column}`)")]
    MissingVector { row: usize, space: String, column: String },
    #[error("embedding space `{space}`: {source}")]
    Index {
        space: String,
        #[source]
        source: IndexBuildError,
    },
    #[error("vector dimension changed from {serving} to {reloaded}; restart to switch embedding models")]
    DimensionChanged { serving: usize, reloaded: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpaceIndex {
    pub config: SpaceConfig,
    pub index: FlatL2Index,
}

/// The catalog and every embedding index built from the same rows.
/// Never mutated once built; reload produces a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogSnapshot {
    records: Vec<MedicineRecord>,
    spaces: Vec<SpaceIndex>,
}

impl CatalogSnapshot {
    pub fn build(rows: Vec<SnapshotRow>, spaces: &[SpaceConfig]) -> Result<Self, SnapshotBuildError> {
        let mut per_space = vec![Vec::with_capacity(rows.len()); spaces.len()];
        let mut records = Vec::with_capacity(rows.len());
        for (row, mut snapshot_row) in rows.into_iter().enumerate() {
            for (space, vectors) in spaces.iter().zip(per_space.iter_mut()) {
                let vector = snapshot_row.vectors.remove(&space.column).ok_or_else(|| {
                    SnapshotBuildError::MissingVector {
                        row,
                        space: space.name.clone(),
                        column: space.column.clone(),
                    }
                })?;
                vectors.push(vector);
            }
            records.push(snapshot_row.record);
        }

        let spaces = spaces
            .iter()
            .zip(per_space)
            .map(|(config, vectors)| {
                FlatL2Index::from_vectors(&vectors)
                    .map(|index| SpaceIndex {
                        config: config.clone(),
                        index,
                    })
                    .map_err(|source| SnapshotBuildError::Index {
                        space: config.name.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let unknown = records
            .iter()
            .filter(|r| !r.has_known_form() || !r.has_known_category())
            .count();
        if unknown > 0 {
            tracing::warn!(unknown, rows = records.len(), "records outside the known form/category sets");
        }

        Ok(Self { records, spaces })
    }

    pub fn records(&self) -> &[MedicineRecord] {
        &self.records
    }

    pub fn spaces(&self) -> &[SpaceIndex] {
        &self.spaces
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Dimension of the first space's vectors, or `None` for an empty catalog.
    pub fn vector_dimension(&self) -> Option<usize> {
        self.spaces
            .first()
            .map(|s| s.index.dimension())
            .filter(|d| *d > 0)
    }
}

/// Shared pointer to the live snapshot.
///
/// Readers clone the inner `Arc` and keep searching the snapshot they
/// started with while a reload swaps in a replacement.
#[derive(Debug, Clone)]
pub struct CatalogHandle {
    current: Arc<RwLock<Arc<CatalogSnapshot>>>,
}

impl CatalogHandle {
    pub fn new(snapshot: CatalogSnapshot) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(snapshot))),
        }
    }

    pub fn load(source: &dyn CatalogSource, spaces: &[SpaceConfig]) -> Result<Self, SnapshotBuildError> {
        Ok(Self::new(CatalogSnapshot::build(source.load()?, spaces)?))
    }

    pub fn current(&self) -> Arc<CatalogSnapshot> {
        Arc::clone(&*self.current.read())
    }

    pub fn replace(&self, snapshot: CatalogSnapshot) {
        *self.current.write() = Arc::new(snapshot);
    }

    /// Builds a fresh snapshot and swaps it in. On failure the previous
    /// snapshot keeps serving. The query encoder is sized at startup, so a
    /// snapshot whose vector dimension differs from the serving one is
    /// refused.
    pub fn reload_from(&self, source: &dyn CatalogSource, spaces: &[SpaceConfig]) -> Result<usize, SnapshotBuildError> {
        let snapshot = CatalogSnapshot::build(source.load()?, spaces)?;
        match (self.current().vector_dimension(), snapshot.vector_dimension()) {
            (Some(serving), Some(reloaded)) if serving != reloaded => {
                return Err(SnapshotBuildError::DimensionChanged { serving, reloaded });
            }
            _ => {}
        }
        let rows = snapshot.len();
        self.replace(snapshot);
        tracing::info!(source = %source.describe(), rows, "catalog snapshot reloaded");
        Ok(rows)
    }
}
