use std::collections::{BTreeMap, BTreeSet};

use crate::{
    error::{AppError, AppResult},
    models::{
        Entity, EntityCount, EntityId, Game, GameId, GameResponse, RecommendationLevel, Relation,
        SuggestedPlayers,
    },
};

/// A game plus the derived data the engine needs on the hot path
#[derive(Debug, Clone)]
struct CatalogEntry {
    game: Game,
    /// Lowercased name used for search and name ordering
    name_key: String,
    relations: BTreeMap<Relation, BTreeSet<EntityId>>,
}

/// Read-only, in-memory view of the catalog
///
/// Holds game attributes, the inverted relation indices used to resolve
/// categorical filters, the per-player-count poll results and the PAX subset.
/// Every id set is ordered, so anything derived from the index is deterministic.
#[derive(Debug, Clone, Default)]
pub struct CatalogIndex {
    games: BTreeMap<GameId, CatalogEntry>,
    entity_names: BTreeMap<Relation, BTreeMap<EntityId, String>>,
    links: BTreeMap<Relation, BTreeMap<EntityId, BTreeSet<GameId>>>,
    player_tiers: BTreeMap<GameId, BTreeMap<i32, RecommendationLevel>>,
    subset: BTreeSet<GameId>,
}

impl CatalogIndex {
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }

    pub fn game(&self, id: GameId) -> Option<&Game> {
        self.games.get(&id).map(|entry| &entry.game)
    }

    pub fn contains(&self, id: GameId) -> bool {
        self.games.contains_key(&id)
    }

    /// Lowercased game name
    pub fn name_key(&self, id: GameId) -> Option<&str> {
        self.games.get(&id).map(|entry| entry.name_key.as_str())
    }

    /// All game ids in ascending order
    pub fn ids(&self) -> impl Iterator<Item = GameId> + '_ {
        self.games.keys().copied()
    }

    /// Games linked to one mechanic, category, designer or artist
    pub fn linked(&self, relation: Relation, entity_id: EntityId) -> Option<&BTreeSet<GameId>> {
        self.links
            .get(&relation)
            .and_then(|index| index.get(&entity_id))
    }

    /// Whether `game_id` is linked to `entity_id`
    pub fn is_linked(&self, game_id: GameId, relation: Relation, entity_id: EntityId) -> bool {
        self.games
            .get(&game_id)
            .and_then(|entry| entry.relations.get(&relation))
            .map(|ids| ids.contains(&entity_id))
            .unwrap_or(false)
    }

    /// Resolved relation list of one game, ordered by name
    pub fn relations_of(&self, game_id: GameId, relation: Relation) -> Vec<Entity> {
        let names = self.entity_names.get(&relation);
        let mut entities: Vec<Entity> = self
            .games
            .get(&game_id)
            .and_then(|entry| entry.relations.get(&relation))
            .into_iter()
            .flatten()
            .filter_map(|id| {
                names
                    .and_then(|names| names.get(id))
                    .map(|name| Entity {
                        id: *id,
                        name: name.clone(),
                    })
            })
            .collect();
        entities.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        entities
    }

    /// Poll outcome for `count` players, if the game has one
    pub fn player_tier(&self, game_id: GameId, count: i32) -> Option<RecommendationLevel> {
        self.player_tiers
            .get(&game_id)
            .and_then(|tiers| tiers.get(&count))
            .copied()
    }

    pub fn suggested_players(&self, game_id: GameId) -> Vec<SuggestedPlayers> {
        self.player_tiers
            .get(&game_id)
            .into_iter()
            .flatten()
            .map(|(count, level)| SuggestedPlayers {
                player_count: *count,
                recommendation_level: *level,
            })
            .collect()
    }

    /// Games exhibited at PAX
    pub fn subset(&self) -> &BTreeSet<GameId> {
        &self.subset
    }

    pub fn in_subset(&self, game_id: GameId) -> bool {
        self.subset.contains(&game_id)
    }

    /// Lookup list ordered by name
    pub fn entities(&self, relation: Relation) -> Vec<EntityCount> {
        let mut entities = self.entity_counts(relation);
        entities.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then(a.id.cmp(&b.id))
        });
        entities
    }

    /// Lookup list ordered by number of linked games, most common first
    pub fn entities_by_frequency(&self, relation: Relation) -> Vec<EntityCount> {
        let mut entities = self.entity_counts(relation);
        entities.sort_by(|a, b| {
            b.game_count
                .cmp(&a.game_count)
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
                .then(a.id.cmp(&b.id))
        });
        entities
    }

    fn entity_counts(&self, relation: Relation) -> Vec<EntityCount> {
        let links = self.links.get(&relation);
        self.entity_names
            .get(&relation)
            .into_iter()
            .flatten()
            .map(|(id, name)| EntityCount {
                id: *id,
                name: name.clone(),
                game_count: links
                    .and_then(|links| links.get(id))
                    .map(|games| games.len())
                    .unwrap_or(0),
            })
            .collect()
    }

    /// Game with its relations resolved; poll results only when `detailed`
    pub fn resolve(&self, game_id: GameId, detailed: bool) -> Option<GameResponse> {
        let game = self.game(game_id)?.clone();
        Some(GameResponse {
            game,
            mechanics: self.relations_of(game_id, Relation::Mechanic),
            categories: self.relations_of(game_id, Relation::Category),
            designers: self.relations_of(game_id, Relation::Designer),
            artists: self.relations_of(game_id, Relation::Artist),
            suggested_players: detailed.then(|| self.suggested_players(game_id)),
            recommendation_score: None,
        })
    }
}

/// Collects catalog rows and validates them into a [`CatalogIndex`]
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    games: BTreeMap<GameId, Game>,
    duplicates: Vec<GameId>,
    links: Vec<(Relation, GameId, Entity)>,
    tiers: Vec<(GameId, i32, RecommendationLevel)>,
    subset: Vec<GameId>,
}

impl CatalogBuilder {
    pub fn add_game(&mut self, mut game: Game) -> &mut Self {
        game.ranks = game.ranks.normalized();
        let id = game.id;
        if self.games.insert(id, game).is_some() {
            self.duplicates.push(id);
        }
        self
    }

    pub fn link(&mut self, relation: Relation, game_id: GameId, entity: Entity) -> &mut Self {
        self.links.push((relation, game_id, entity));
        self
    }

    pub fn set_player_tier(
        &mut self,
        game_id: GameId,
        player_count: i32,
        level: RecommendationLevel,
    ) -> &mut Self {
        self.tiers.push((game_id, player_count, level));
        self
    }

    pub fn add_to_subset(&mut self, game_id: GameId) -> &mut Self {
        self.subset.push(game_id);
        self
    }

    /// Validates identifiers and builds the indices
    ///
    /// Duplicate game ids and relation rows pointing at unknown games are load
    /// errors. Poll rows and subset entries for unknown games are dropped: both
    /// come from sources that routinely cover games outside the catalog.
    pub fn build(self) -> AppResult<CatalogIndex> {
        if let Some(id) = self.duplicates.first() {
            return Err(AppError::Load(format!("game {} appears more than once", id)));
        }

        let mut index = CatalogIndex {
            games: self
                .games
                .into_iter()
                .map(|(id, game)| {
                    let entry = CatalogEntry {
                        name_key: game.name.to_lowercase(),
                        game,
                        relations: BTreeMap::new(),
                    };
                    (id, entry)
                })
                .collect(),
            ..CatalogIndex::default()
        };

        for (relation, game_id, entity) in self.links {
            let entry = index.games.get_mut(&game_id).ok_or_else(|| {
                AppError::Load(format!(
                    "{} {} is linked to unknown game {}",
                    relation, entity.id, game_id
                ))
            })?;
            entry
                .relations
                .entry(relation)
                .or_default()
                .insert(entity.id);
            index
                .links
                .entry(relation)
                .or_default()
                .entry(entity.id)
                .or_default()
                .insert(game_id);
            index
                .entity_names
                .entry(relation)
                .or_default()
                .entry(entity.id)
                .or_insert(entity.name);
        }

        let mut dropped_tiers = 0usize;
        for (game_id, count, level) in self.tiers {
            if index.games.contains_key(&game_id) {
                index
                    .player_tiers
                    .entry(game_id)
                    .or_default()
                    .insert(count, level);
            } else {
                dropped_tiers += 1;
            }
        }

        let mut dropped_subset = 0usize;
        for game_id in self.subset {
            if index.games.contains_key(&game_id) {
                index.subset.insert(game_id);
            } else {
                dropped_subset += 1;
            }
        }

        if dropped_tiers > 0 || dropped_subset > 0 {
            tracing::warn!(
                dropped_tiers,
                dropped_subset,
                "Ignored catalog rows referring to unknown games"
            );
        }

        tracing::debug!(
            games = index.games.len(),
            subset = index.subset.len(),
            "Catalog index built"
        );

        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(id: EntityId, name: &str) -> Entity {
        Entity {
            id,
            name: name.to_string(),
        }
    }

    fn sample() -> CatalogIndex {
        let mut builder = CatalogIndex::builder();
        builder
            .add_game(Game::new(13, "Catan"))
            .add_game(Game::new(822, "Carcassonne"))
            .add_game(Game::new(30549, "Pandemic"))
            .link(Relation::Mechanic, 13, entity(2072, "Dice Rolling"))
            .link(Relation::Mechanic, 13, entity(2040, "Hexagon Grid"))
            .link(Relation::Mechanic, 822, entity(2002, "Tile Placement"))
            .link(Relation::Mechanic, 30549, entity(2023, "Cooperative Game"))
            .link(Relation::Mechanic, 30549, entity(2072, "Dice Rolling"))
            .link(Relation::Category, 30549, entity(1084, "Medical"))
            .set_player_tier(13, 4, RecommendationLevel::Best)
            .set_player_tier(13, 3, RecommendationLevel::Recommended)
            .set_player_tier(99999, 2, RecommendationLevel::Best)
            .add_to_subset(822)
            .add_to_subset(424242);
        builder.build().unwrap()
    }

    #[test]
    fn test_inverted_index() {
        let catalog = sample();
        assert_eq!(
            catalog.linked(Relation::Mechanic, 2072),
            Some(&BTreeSet::from([13, 30549]))
        );
        assert!(catalog.linked(Relation::Artist, 1).is_none());
        assert!(catalog.is_linked(822, Relation::Mechanic, 2002));
        assert!(!catalog.is_linked(822, Relation::Mechanic, 2072));
    }

    #[test]
    fn test_relations_resolve_sorted_by_name() {
        let catalog = sample();
        let mechanics = catalog.relations_of(13, Relation::Mechanic);
        assert_eq!(
            mechanics,
            vec![entity(2072, "Dice Rolling"), entity(2040, "Hexagon Grid")]
        );
    }

    #[test]
    fn test_unknown_rows_for_tiers_and_subset_are_dropped() {
        let catalog = sample();
        assert_eq!(catalog.subset(), &BTreeSet::from([822]));
        assert_eq!(catalog.player_tier(13, 4), Some(RecommendationLevel::Best));
        assert_eq!(catalog.player_tier(13, 5), None);
        assert_eq!(catalog.suggested_players(13).len(), 2);
    }

    #[test]
    fn test_link_to_unknown_game_is_load_error() {
        let mut builder = CatalogIndex::builder();
        builder
            .add_game(Game::new(1, "Known"))
            .link(Relation::Designer, 2, entity(7, "Somebody"));
        assert!(matches!(builder.build(), Err(AppError::Load(_))));
    }

    #[test]
    fn test_duplicate_game_is_load_error() {
        let mut builder = CatalogIndex::builder();
        builder
            .add_game(Game::new(1, "First"))
            .add_game(Game::new(1, "Second"));
        assert!(matches!(builder.build(), Err(AppError::Load(_))));
    }

    #[test]
    fn test_lookup_lists() {
        let catalog = sample();

        let by_name: Vec<EntityId> = catalog
            .entities(Relation::Mechanic)
            .iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(by_name, vec![2023, 2072, 2040, 2002]);

        let by_frequency = catalog.entities_by_frequency(Relation::Mechanic);
        assert_eq!(by_frequency[0].id, 2072);
        assert_eq!(by_frequency[0].game_count, 2);
        assert_eq!(by_frequency.len(), 4);
    }

    #[test]
    fn test_resolve_includes_poll_only_when_detailed() {
        let catalog = sample();
        let summary = catalog.resolve(13, false).unwrap();
        assert!(summary.suggested_players.is_none());
        assert_eq!(summary.mechanics.len(), 2);

        let detail = catalog.resolve(13, true).unwrap();
        assert_eq!(
            detail.suggested_players,
            Some(vec![
                SuggestedPlayers {
                    player_count: 3,
                    recommendation_level: RecommendationLevel::Recommended
                },
                SuggestedPlayers {
                    player_count: 4,
                    recommendation_level: RecommendationLevel::Best
                },
            ])
        );
        assert!(catalog.resolve(1, true).is_none());
    }
}
