use std::path::PathBuf;

use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};

use crate::{
    error::{AppError, AppResult},
    models::{Entity, EntityId, Game, GameId, Ranks, RecommendationLevel, Relation},
    services::{CatalogBuilder, CatalogIndex, EmbeddingStore, SnapshotLoader},
};

/// Creates a PostgreSQL connection pool
///
/// The pool is shared by snapshot loads; requests never touch the database.
pub async fn create_pool(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Applies the bundled schema migrations
pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Database migrations applied");
    Ok(())
}

#[derive(Debug, FromRow)]
struct GameRow {
    id: i32,
    name: String,
    year_published: Option<i32>,
    min_players: Option<i32>,
    max_players: Option<i32>,
    playing_time: Option<i32>,
    min_playtime: Option<i32>,
    max_playtime: Option<i32>,
    min_age: Option<i32>,
    average: Option<f64>,
    average_weight: Option<f64>,
    users_rated: Option<i32>,
    is_expansion: Option<bool>,
    thumbnail: Option<String>,
    image: Option<String>,
    rank: Option<i32>,
    abstracts_rank: Option<i32>,
    cgs_rank: Option<i32>,
    childrens_games_rank: Option<i32>,
    family_games_rank: Option<i32>,
    party_games_rank: Option<i32>,
    strategy_games_rank: Option<i32>,
    thematic_rank: Option<i32>,
    wargames_rank: Option<i32>,
}

impl From<GameRow> for Game {
    fn from(row: GameRow) -> Self {
        Game {
            id: row.id,
            name: row.name,
            year_published: row.year_published,
            min_players: row.min_players,
            max_players: row.max_players,
            playing_time: row.playing_time,
            min_playtime: row.min_playtime,
            max_playtime: row.max_playtime,
            min_age: row.min_age,
            average: row.average,
            average_weight: row.average_weight,
            users_rated: row.users_rated,
            is_expansion: row.is_expansion.unwrap_or(false),
            thumbnail: row.thumbnail,
            image: row.image,
            ranks: Ranks {
                rank: row.rank,
                abstracts_rank: row.abstracts_rank,
                cgs_rank: row.cgs_rank,
                childrens_games_rank: row.childrens_games_rank,
                family_games_rank: row.family_games_rank,
                party_games_rank: row.party_games_rank,
                strategy_games_rank: row.strategy_games_rank,
                thematic_rank: row.thematic_rank,
                wargames_rank: row.wargames_rank,
            },
        }
    }
}

#[derive(Debug, FromRow)]
struct LinkRow {
    game_id: GameId,
    entity_id: EntityId,
    name: String,
}

#[derive(Debug, FromRow)]
struct SuggestedPlayersRow {
    game_id: GameId,
    player_count: i32,
    recommendation_level: String,
}

const GAMES_QUERY: &str = r#"
    SELECT id, name, year_published, min_players, max_players, playing_time,
           min_playtime, max_playtime, min_age, average, average_weight,
           users_rated, is_expansion, thumbnail, image,
           rank, abstracts_rank, cgs_rank, childrens_games_rank,
           family_games_rank, party_games_rank, strategy_games_rank,
           thematic_rank, wargames_rank
    FROM games
"#;

/// Table and id column holding each relation's links
fn link_source(relation: Relation) -> (&'static str, &'static str) {
    match relation {
        Relation::Mechanic => ("mechanics", "boardgamemechanic_id"),
        Relation::Category => ("categories", "boardgamecategory_id"),
        Relation::Designer => ("designers", "boardgamedesigner_id"),
        Relation::Artist => ("artists", "boardgameartist_id"),
    }
}

/// Selects every link of a relation
///
/// Links are not restricted to known games: an orphan link fails the catalog
/// build rather than disappearing.
fn link_query(relation: Relation) -> String {
    let (table, id_column) = link_source(relation);
    format!("SELECT game_id, {id_column} AS entity_id, name FROM {table}")
}

/// Adds the PAX rows to the subset, returning how many had no game id
fn add_subset_rows(builder: &mut CatalogBuilder, rows: Vec<(Option<GameId>,)>) -> usize {
    let mut skipped = 0usize;
    for (game_id,) in rows {
        match game_id {
            Some(game_id) => {
                builder.add_to_subset(game_id);
            }
            None => skipped += 1,
        }
    }
    skipped
}

/// Loads snapshots from the catalog database and the embedding artifact
pub struct PostgresLoader {
    pool: PgPool,
    embeddings_path: PathBuf,
}

impl PostgresLoader {
    pub fn new(pool: PgPool, embeddings_path: PathBuf) -> Self {
        Self {
            pool,
            embeddings_path,
        }
    }

    async fn load_links(&self, relation: Relation) -> AppResult<Vec<LinkRow>> {
        let query = link_query(relation);
        let rows = sqlx::query_as::<_, LinkRow>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}

#[async_trait::async_trait]
impl SnapshotLoader for PostgresLoader {
    async fn load_catalog(&self) -> AppResult<CatalogIndex> {
        let games = sqlx::query_as::<_, GameRow>(GAMES_QUERY)
            .fetch_all(&self.pool)
            .await?;

        let mut builder = CatalogIndex::builder();
        for row in games {
            builder.add_game(row.into());
        }

        for relation in Relation::ALL {
            let links = self.load_links(relation).await?;
            tracing::debug!(relation = %relation, links = links.len(), "Loaded links");
            for link in links {
                builder.link(
                    relation,
                    link.game_id,
                    Entity {
                        id: link.entity_id,
                        name: link.name,
                    },
                );
            }
        }

        let polls = sqlx::query_as::<_, SuggestedPlayersRow>(
            "SELECT game_id, player_count, recommendation_level FROM suggested_players",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut skipped = 0usize;
        for poll in polls {
            match poll.recommendation_level.parse::<RecommendationLevel>() {
                Ok(level) => {
                    builder.set_player_tier(poll.game_id, poll.player_count, level);
                }
                Err(_) => skipped += 1,
            }
        }
        if skipped > 0 {
            tracing::warn!(skipped, "Ignored suggested player rows with unknown levels");
        }

        let subset: Vec<(Option<GameId>,)> =
            sqlx::query_as("SELECT DISTINCT bgg_id FROM pax_games")
                .fetch_all(&self.pool)
                .await?;
        let skipped = add_subset_rows(&mut builder, subset);
        if skipped > 0 {
            tracing::warn!(skipped, "Ignored PAX rows without a game id");
        }

        builder.build()
    }

    async fn load_embeddings(&self) -> AppResult<EmbeddingStore> {
        let path = self.embeddings_path.clone();
        tokio::task::spawn_blocking(move || EmbeddingStore::load(&path))
            .await
            .map_err(|e| AppError::Internal(format!("Embedding load task failed: {}", e)))?
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_sources_cover_every_relation() {
        let tables: Vec<&str> = Relation::ALL
            .iter()
            .map(|relation| link_source(*relation).0)
            .collect();
        assert_eq!(tables, vec!["mechanics", "categories", "designers", "artists"]);
        assert_eq!(link_source(Relation::Artist).1, "boardgameartist_id");
    }

    #[test]
    fn test_link_query_keeps_orphan_links() {
        let query = link_query(Relation::Mechanic);
        assert_eq!(
            query,
            "SELECT game_id, boardgamemechanic_id AS entity_id, name FROM mechanics"
        );
        assert!(!query.contains("WHERE"));
    }

    #[test]
    fn test_orphan_link_fails_catalog_build() {
        let mut builder = CatalogIndex::builder();
        builder.add_game(Game::new(13, "Catan"));
        builder.link(
            Relation::Mechanic,
            99,
            Entity {
                id: 2072,
                name: "Dice Rolling".to_string(),
            },
        );

        let err = builder.build().unwrap_err();
        assert!(matches!(err, AppError::Load(_)), "{:?}", err);
    }

    #[test]
    fn test_subset_rows_without_game_id_are_skipped() {
        let mut builder = CatalogIndex::builder();
        builder.add_game(Game::new(13, "Catan"));
        builder.add_game(Game::new(822, "Carcassonne"));

        let skipped = add_subset_rows(&mut builder, vec![(Some(13),), (None,), (None,)]);
        assert_eq!(skipped, 2);

        let catalog = builder.build().unwrap();
        assert!(catalog.in_subset(13));
        assert!(!catalog.in_subset(822));
        assert_eq!(catalog.subset().len(), 1);
    }

    #[test]
    fn test_game_row_conversion() {
        let row = GameRow {
            id: 13,
            name: "Catan".to_string(),
            year_published: Some(1995),
            min_players: Some(3),
            max_players: Some(4),
            playing_time: Some(120),
            min_playtime: Some(60),
            max_playtime: Some(120),
            min_age: Some(10),
            average: Some(7.1),
            average_weight: Some(2.3),
            users_rated: Some(100_000),
            is_expansion: None,
            thumbnail: None,
            image: None,
            rank: Some(500),
            abstracts_rank: None,
            cgs_rank: None,
            childrens_games_rank: None,
            family_games_rank: Some(100),
            party_games_rank: None,
            strategy_games_rank: None,
            thematic_rank: None,
            wargames_rank: None,
        };

        let game: Game = row.into();
        assert_eq!(game.id, 13);
        assert!(!game.is_expansion);
        assert_eq!(game.ranks.family_games_rank, Some(100));
        assert_eq!(game.weight(), Some(2.3));
    }

    #[tokio::test]
    #[ignore = "requires a seeded Postgres at DATABASE_URL"]
    async fn test_load_catalog_from_database() {
        let database_url = std::env::var("DATABASE_URL").unwrap();
        let pool = create_pool(&database_url, 2).await.unwrap();
        let loader = PostgresLoader::new(pool, PathBuf::from("data/game_embeddings.json"));

        let catalog = loader.load_catalog().await.unwrap();
        assert!(!catalog.is_empty());
    }
}
