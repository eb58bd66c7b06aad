use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::{
    error::{AppError, AppResult},
    models::GameId,
};

/// Row of the embedding artifact, either `{"id": 13, "vector": [...]}` or `[13, [...]]`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EmbeddingRow {
    Keyed { id: GameId, vector: Vec<f32> },
    Pair(GameId, Vec<f32>),
}

impl EmbeddingRow {
    fn into_parts(self) -> (GameId, Vec<f32>) {
        match self {
            EmbeddingRow::Keyed { id, vector } => (id, vector),
            EmbeddingRow::Pair(id, vector) => (id, vector),
        }
    }
}

/// Immutable table of latent game vectors
///
/// Vectors live in one contiguous buffer; lookups hand out slices into it and
/// never allocate. Games without a vector are expected (new or unrated games).
#[derive(Debug, Clone, Default)]
pub struct EmbeddingStore {
    dimension: usize,
    offsets: HashMap<GameId, usize>,
    data: Vec<f32>,
}

impl EmbeddingStore {
    /// Reads the artifact at `path` fully into memory
    pub fn load(path: &Path) -> AppResult<Self> {
        let file = File::open(path).map_err(|e| {
            AppError::Load(format!(
                "cannot read embeddings at {}: {}",
                path.display(),
                e
            ))
        })?;

        let store = Self::from_reader(BufReader::new(file))?;

        tracing::info!(
            path = %path.display(),
            games = store.len(),
            dimension = store.dimension(),
            "Loaded game embeddings"
        );

        Ok(store)
    }

    /// Parses a JSON embedding artifact
    pub fn from_reader<R: Read>(reader: R) -> AppResult<Self> {
        let rows: Vec<EmbeddingRow> = serde_json::from_reader(reader)
            .map_err(|e| AppError::Load(format!("malformed embedding artifact: {}", e)))?;

        Self::from_rows(rows.into_iter().map(EmbeddingRow::into_parts))
    }

    /// Builds a store from `(id, vector)` pairs, all of which must share one dimension
    pub fn from_rows<I>(rows: I) -> AppResult<Self>
    where
        I: IntoIterator<Item = (GameId, Vec<f32>)>,
    {
        let mut store = Self::default();

        for (index, (id, vector)) in rows.into_iter().enumerate() {
            if vector.is_empty() {
                return Err(AppError::Load(format!(
                    "row {} (game {}) has an empty vector",
                    index, id
                )));
            }
            if index == 0 {
                store.dimension = vector.len();
            } else if vector.len() != store.dimension {
                return Err(AppError::Load(format!(
                    "row {} (game {}) has dimension {}, expected {}",
                    index,
                    id,
                    vector.len(),
                    store.dimension
                )));
            }
            if vector.iter().any(|x| !x.is_finite()) {
                return Err(AppError::Load(format!(
                    "row {} (game {}) contains a non-finite value",
                    index, id
                )));
            }
            if store.offsets.insert(id, store.data.len()).is_some() {
                return Err(AppError::Load(format!("game {} appears more than once", id)));
            }
            store.data.extend_from_slice(&vector);
        }

        Ok(store)
    }

    /// Vector for `id`, or `None` when the game has no embedding
    #[inline]
    pub fn get(&self, id: GameId) -> Option<&[f32]> {
        self.offsets
            .get(&id)
            .map(|&offset| &self.data[offset..offset + self.dimension])
    }

    #[inline]
    pub fn contains(&self, id: GameId) -> bool {
        self.offsets.contains_key(&id)
    }

    /// Shared vector length; 0 for an empty store
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Rejects a non-empty store whose dimension differs from `expected`
    pub fn ensure_dimension(&self, expected: usize) -> AppResult<()> {
        if !self.is_empty() && self.dimension != expected {
            return Err(AppError::Load(format!(
                "embedding dimension {} does not match configured dimension {}",
                self.dimension, expected
            )));
        }
        Ok(())
    }
}
