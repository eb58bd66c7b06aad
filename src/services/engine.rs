use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

use crate::{
    error::{AppError, AppResult},
    models::{FilterRequest, GameId, GamesPage, Page, PreferenceSet, SortKey},
    services::{
        catalog::CatalogIndex,
        embeddings::EmbeddingStore,
        filter::{FilterCompiler, Predicate},
        ranking::{self, RankedResult},
        scorer::PreferenceScorer,
        selector,
    },
};

/// Request bounds applied by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryLimits {
    pub default_page_size: usize,
    pub max_page_size: usize,
    pub max_candidates: usize,
    pub top_player_bucket: i32,
    pub recommendation_limit: usize,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            default_page_size: 24,
            max_page_size: 100,
            max_candidates: 100_000,
            top_player_bucket: 8,
            recommendation_limit: 5,
        }
    }
}

/// Source of catalog and embedding data
///
/// Implementations fetch a complete, consistent copy each time they are
/// called; the engine never mutates what they return.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait SnapshotLoader: Send + Sync {
    async fn load_catalog(&self) -> AppResult<CatalogIndex>;

    async fn load_embeddings(&self) -> AppResult<EmbeddingStore>;

    /// Loader name for logging
    fn name(&self) -> &'static str;
}

/// Catalog and embeddings adopted together as one generation
#[derive(Debug)]
pub struct Snapshot {
    pub generation: u64,
    pub loaded_at: DateTime<Utc>,
    pub catalog: CatalogIndex,
    pub embeddings: EmbeddingStore,
}

/// Summary of the active snapshot
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SnapshotInfo {
    pub generation: u64,
    pub loaded_at: DateTime<Utc>,
    pub games: usize,
    pub embeddings: usize,
    pub embedding_dimension: usize,
}

impl Snapshot {
    pub fn info(&self) -> SnapshotInfo {
        SnapshotInfo {
            generation: self.generation,
            loaded_at: self.loaded_at,
            games: self.catalog.len(),
            embeddings: self.embeddings.len(),
            embedding_dimension: self.embeddings.dimension(),
        }
    }
}

/// Body of `POST /recommendations`, already validated
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationQuery {
    pub preferences: PreferenceSet,
    pub pax_only: bool,
    pub page: Page,
}

/// Filtered ranking and recommendation engine over a swappable snapshot
///
/// Each request takes the current snapshot once and works against it to the
/// end; a concurrent reload only affects requests that start afterwards.
pub struct Engine {
    current: ArcSwap<Snapshot>,
    limits: QueryLimits,
    expected_dimension: Option<usize>,
    /// Serializes reloads so every swap gets its own generation
    reload_lock: Mutex<()>,
}

impl Engine {
    /// Creates an engine serving generation 1 of the given data
    pub fn new(
        catalog: CatalogIndex,
        embeddings: EmbeddingStore,
        limits: QueryLimits,
        expected_dimension: Option<usize>,
    ) -> AppResult<Self> {
        if let Some(expected) = expected_dimension {
            embeddings.ensure_dimension(expected)?;
        }
        let snapshot = Snapshot {
            generation: 1,
            loaded_at: Utc::now(),
            catalog,
            embeddings,
        };
        Ok(Self {
            current: ArcSwap::from_pointee(snapshot),
            limits,
            expected_dimension,
            reload_lock: Mutex::new(()),
        })
    }

    /// Loads the first generation through `loader`
    pub async fn load(
        loader: &dyn SnapshotLoader,
        limits: QueryLimits,
        expected_dimension: Option<usize>,
    ) -> AppResult<Self> {
        let (catalog, embeddings) = Self::fetch(loader).await?;
        let engine = Self::new(catalog, embeddings, limits, expected_dimension)?;
        tracing::info!(loader = loader.name(), "Engine ready");
        Ok(engine)
    }

    async fn fetch(loader: &dyn SnapshotLoader) -> AppResult<(CatalogIndex, EmbeddingStore)> {
        let start = Instant::now();
        let catalog = loader.load_catalog().await?;
        let embeddings = loader.load_embeddings().await?;

        let without_vectors = catalog
            .ids()
            .filter(|id| !embeddings.contains(*id))
            .count();

        tracing::info!(
            loader = loader.name(),
            games = catalog.len(),
            embeddings = embeddings.len(),
            games_without_embedding = without_vectors,
            elapsed_ms = start.elapsed().as_millis(),
            "Snapshot data loaded"
        );

        Ok((catalog, embeddings))
    }

    /// Builds the next generation and swaps it in
    ///
    /// On failure the current snapshot stays active. Concurrent reloads run one
    /// after another, each publishing the generation after the last.
    pub async fn reload(&self, loader: &dyn SnapshotLoader) -> AppResult<SnapshotInfo> {
        let _guard = self.reload_lock.lock().await;
        let (catalog, embeddings) = Self::fetch(loader).await.map_err(|e| {
            tracing::error!(error = %e, "Snapshot reload failed, keeping current generation");
            e
        })?;
        if let Some(expected) = self.expected_dimension {
            embeddings.ensure_dimension(expected)?;
        }

        let previous = self.current.load();
        let next = Arc::new(Snapshot {
            generation: previous.generation + 1,
            loaded_at: Utc::now(),
            catalog,
            embeddings,
        });
        let info = next.info();
        self.current.store(next);

        tracing::info!(generation = info.generation, "Snapshot swapped");
        Ok(info)
    }

    /// The snapshot new requests will see
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    pub fn limits(&self) -> &QueryLimits {
        &self.limits
    }

    /// Runs `GET /games`: filter, order by attribute or preference, paginate
    pub fn browse(&self, request: &FilterRequest) -> AppResult<GamesPage> {
        let snapshot = self.snapshot();
        let predicate = FilterCompiler::new(self.limits.top_player_bucket).compile(request);
        let ranked = self.run(
            &snapshot,
            &predicate,
            request.sort_by,
            &request.preferences,
            request.page,
        )?;

        tracing::debug!(
            generation = snapshot.generation,
            total = ranked.total,
            returned = ranked.entries.len(),
            "Browse completed"
        );

        Ok(Self::to_page(
            &snapshot,
            ranked,
            request.sort_by == SortKey::RecommendationScore,
        ))
    }

    /// Runs `POST /recommendations` across the whole catalog
    ///
    /// There are no filters to narrow here, so exceeding the candidate limit
    /// surfaces as [`AppError::RecommendationPoolTooLarge`].
    pub fn recommend(&self, query: &RecommendationQuery) -> AppResult<GamesPage> {
        let snapshot = self.snapshot();
        let predicate = if query.pax_only {
            Predicate::And(vec![Predicate::InSubset])
        } else {
            Predicate::And(vec![])
        };

        let ranked = self.run(
            &snapshot,
            &predicate,
            SortKey::RecommendationScore,
            &query.preferences,
            query.page,
        )
        .map_err(|e| match e {
            AppError::CandidateSetTooLarge { total, max } => {
                AppError::RecommendationPoolTooLarge { total, max }
            }
            other => other,
        })?;

        tracing::info!(
            generation = snapshot.generation,
            liked = query.preferences.liked().len(),
            disliked = query.preferences.disliked().len(),
            total = ranked.total,
            "Recommendations computed"
        );

        Ok(Self::to_page(&snapshot, ranked, true))
    }

    /// Games most similar to one anchor game
    pub fn similar_to(&self, game_id: GameId, limit: usize, pax_only: bool) -> AppResult<GamesPage> {
        if !self.snapshot().catalog.contains(game_id) {
            return Err(AppError::NotFound(format!("Game {} not found", game_id)));
        }
        let page = Page::new(0, Some(limit), &self.limits)?;
        self.recommend(&RecommendationQuery {
            preferences: PreferenceSet::anchored(game_id),
            pax_only,
            page,
        })
    }

    fn run(
        &self,
        snapshot: &Snapshot,
        predicate: &Predicate,
        sort_by: SortKey,
        preferences: &PreferenceSet,
        page: Page,
    ) -> AppResult<RankedResult> {
        let candidates = selector::select(predicate, &snapshot.catalog, self.limits.max_candidates)?;

        let scorer = (sort_by == SortKey::RecommendationScore)
            .then(|| PreferenceScorer::new(&snapshot.embeddings, preferences));

        Ok(ranking::rank(
            candidates,
            sort_by,
            &snapshot.catalog,
            scorer.as_ref(),
            page,
        ))
    }

    fn to_page(snapshot: &Snapshot, ranked: RankedResult, with_scores: bool) -> GamesPage {
        let games = ranked
            .entries
            .into_iter()
            .filter_map(|entry| {
                let mut game = snapshot.catalog.resolve(entry.game_id, false)?;
                if with_scores {
                    game.recommendation_score = Some(entry.score.unwrap_or(0.0));
                }
                Some(game)
            })
            .collect();

        GamesPage {
            games,
            total: ranked.total,
        }
    }
}
