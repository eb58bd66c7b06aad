use std::collections::BTreeSet;

use crate::{
    models::{
        EntityId, FilterRequest, GameId, PlayerFilter, PlayerTier, RecommendationLevel, Relation,
        WeightBand,
    },
    services::catalog::CatalogIndex,
};

/// One independently selectable filter dimension with its typed payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterDimension {
    Search(String),
    Players(PlayerFilter),
    Weight(BTreeSet<WeightBand>),
    Related(Relation, BTreeSet<EntityId>),
    PaxOnly,
}

impl FilterDimension {
    /// Active dimensions of a request, in a fixed order
    pub fn from_request(request: &FilterRequest) -> Vec<FilterDimension> {
        let mut dimensions = Vec::new();

        if let Some(search) = &request.search {
            dimensions.push(FilterDimension::Search(search.clone()));
        }
        if let Some(players) = request.players {
            dimensions.push(FilterDimension::Players(players));
        }
        if !request.weight.is_empty() {
            dimensions.push(FilterDimension::Weight(request.weight.clone()));
        }
        for relation in Relation::ALL {
            let ids = request.related(relation);
            if !ids.is_empty() {
                dimensions.push(FilterDimension::Related(relation, ids.clone()));
            }
        }
        if request.pax_only {
            dimensions.push(FilterDimension::PaxOnly);
        }

        dimensions
    }
}

/// Boolean filter tree evaluated against the catalog index
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Every child must hold; an empty conjunction matches everything
    And(Vec<Predicate>),
    /// At least one child must hold
    Or(Vec<Predicate>),
    /// Lowercased needle matched against the lowercased name
    NameContains(String),
    /// Supports `count` players; `open_ended` means the "N+" top bucket
    PlayerCount { count: i32, open_ended: bool },
    /// Poll at `count` players reaches at least `tier`
    PlayerTier { count: i32, tier: PlayerTier },
    WeightBand(WeightBand),
    LinkedTo { relation: Relation, id: EntityId },
    InSubset,
}

impl Predicate {
    /// Nodes the selector can answer from inverted indices alone
    pub fn is_indexed(&self) -> bool {
        match self {
            Predicate::LinkedTo { .. } | Predicate::InSubset => true,
            Predicate::And(children) | Predicate::Or(children) => {
                !children.is_empty() && children.iter().all(Predicate::is_indexed)
            }
            _ => false,
        }
    }

    /// Evaluates the predicate for a single game
    pub fn matches(&self, game_id: GameId, catalog: &CatalogIndex) -> bool {
        match self {
            Predicate::And(children) => children.iter().all(|c| c.matches(game_id, catalog)),
            Predicate::Or(children) => children.iter().any(|c| c.matches(game_id, catalog)),
            Predicate::NameContains(needle) => catalog
                .name_key(game_id)
                .map(|name| name.contains(needle.as_str()))
                .unwrap_or(false),
            Predicate::PlayerCount { count, open_ended } => {
                let Some(game) = catalog.game(game_id) else {
                    return false;
                };
                match (game.min_players, game.max_players) {
                    (Some(_), Some(max)) if *open_ended => max >= *count,
                    (Some(min), Some(max)) => min <= *count && *count <= max,
                    _ => false,
                }
            }
            Predicate::PlayerTier { count, tier } => match tier {
                PlayerTier::Allowed => true,
                PlayerTier::Recommended => matches!(
                    catalog.player_tier(game_id, *count),
                    Some(RecommendationLevel::Recommended | RecommendationLevel::Best)
                ),
                PlayerTier::Best => matches!(
                    catalog.player_tier(game_id, *count),
                    Some(RecommendationLevel::Best)
                ),
            },
            Predicate::WeightBand(band) => catalog
                .game(game_id)
                .and_then(|game| game.weight())
                .map(|weight| band.contains(weight))
                .unwrap_or(false),
            Predicate::LinkedTo { relation, id } => catalog.is_linked(game_id, *relation, *id),
            Predicate::InSubset => catalog.in_subset(game_id),
        }
    }
}

/// Compiles filter requests into predicate trees
#[derive(Debug, Clone, Copy)]
pub struct FilterCompiler {
    /// Player count the UI renders as "N+"
    pub top_player_bucket: i32,
}

impl FilterCompiler {
    pub fn new(top_player_bucket: i32) -> Self {
        Self { top_player_bucket }
    }

    /// Builds an AND of the active dimensions; ids within one relation are ORed
    pub fn compile(&self, request: &FilterRequest) -> Predicate {
        let atoms = FilterDimension::from_request(request)
            .into_iter()
            .flat_map(|dimension| self.compile_dimension(dimension))
            .collect();
        Predicate::And(atoms)
    }

    fn compile_dimension(&self, dimension: FilterDimension) -> Vec<Predicate> {
        match dimension {
            FilterDimension::Search(text) => vec![Predicate::NameContains(text.to_lowercase())],
            FilterDimension::Players(PlayerFilter { count, tier }) => {
                let mut atoms = vec![Predicate::PlayerCount {
                    count,
                    open_ended: count == self.top_player_bucket,
                }];
                if tier != PlayerTier::Allowed {
                    atoms.push(Predicate::PlayerTier { count, tier });
                }
                atoms
            }
            FilterDimension::Weight(bands) => vec![Predicate::Or(
                bands.into_iter().map(Predicate::WeightBand).collect(),
            )],
            FilterDimension::Related(relation, ids) => vec![Predicate::Or(
                ids.into_iter()
                    .map(|id| Predicate::LinkedTo { relation, id })
                    .collect(),
            )],
            FilterDimension::PaxOnly => vec![Predicate::InSubset],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Game;
    use crate::services::engine::QueryLimits;

    fn limits() -> QueryLimits {
        QueryLimits {
            default_page_size: 24,
            max_page_size: 100,
            max_candidates: 1000,
            top_player_bucket: 8,
            recommendation_limit: 5,
        }
    }

    fn player_catalog() -> CatalogIndex {
        let mut builder = CatalogIndex::builder();
        let mut x = Game::new(1, "X");
        x.min_players = Some(2);
        x.max_players = Some(6);
        let mut y = Game::new(2, "Y");
        y.min_players = Some(2);
        y.max_players = Some(6);
        let mut big = Game::new(3, "Big Party");
        big.min_players = Some(4);
        big.max_players = Some(12);
        let unknown = Game::new(4, "No Counts");
        builder
            .add_game(x)
            .add_game(y)
            .add_game(big)
            .add_game(unknown)
            .set_player_tier(1, 5, RecommendationLevel::Best)
            .set_player_tier(2, 5, RecommendationLevel::Recommended);
        builder.build().unwrap()
    }

    #[test]
    fn test_compile_shape() {
        let mut request = FilterRequest::unfiltered(&limits());
        request.search = Some("Catan".to_string());
        request.mechanics = BTreeSet::from([2072, 2040]);
        request.categories = BTreeSet::from([1021]);
        request.pax_only = true;

        let predicate = FilterCompiler::new(8).compile(&request);
        assert_eq!(
            predicate,
            Predicate::And(vec![
                Predicate::NameContains("catan".to_string()),
                Predicate::Or(vec![
                    Predicate::LinkedTo {
                        relation: Relation::Mechanic,
                        id: 2040
                    },
                    Predicate::LinkedTo {
                        relation: Relation::Mechanic,
                        id: 2072
                    },
                ]),
                Predicate::Or(vec![Predicate::LinkedTo {
                    relation: Relation::Category,
                    id: 1021
                }]),
                Predicate::InSubset,
            ])
        );
    }

    #[test]
    fn test_compile_is_deterministic() {
        let mut request = FilterRequest::unfiltered(&limits());
        request.weight = BTreeSet::from([WeightBand::Heavy, WeightBand::Beginner]);
        request.artists = BTreeSet::from([5, 3, 9]);
        request.players = Some(PlayerFilter {
            count: 3,
            tier: PlayerTier::Recommended,
        });

        let compiler = FilterCompiler::new(8);
        assert_eq!(compiler.compile(&request), compiler.compile(&request.clone()));
    }

    #[test]
    fn test_unfiltered_compiles_to_empty_and() {
        let request = FilterRequest::unfiltered(&limits());
        assert_eq!(
            FilterCompiler::new(8).compile(&request),
            Predicate::And(vec![])
        );
    }

    #[test]
    fn test_best_tier_keeps_best_and_drops_recommended() {
        let catalog = player_catalog();
        let mut request = FilterRequest::unfiltered(&limits());
        request.players = Some(PlayerFilter {
            count: 5,
            tier: PlayerTier::Best,
        });
        let predicate = FilterCompiler::new(8).compile(&request);

        assert!(predicate.matches(1, &catalog));
        assert!(!predicate.matches(2, &catalog));
        // No poll data at 5 players
        assert!(!predicate.matches(3, &catalog));
    }

    #[test]
    fn test_recommended_tier_accepts_best() {
        let catalog = player_catalog();
        let atom = Predicate::PlayerTier {
            count: 5,
            tier: PlayerTier::Recommended,
        };
        assert!(atom.matches(1, &catalog));
        assert!(atom.matches(2, &catalog));
        assert!(!atom.matches(3, &catalog));
    }

    #[test]
    fn test_player_range_and_top_bucket() {
        let catalog = player_catalog();
        let compiler = FilterCompiler::new(8);

        let seven = Predicate::PlayerCount {
            count: 7,
            open_ended: false,
        };
        assert!(!seven.matches(1, &catalog));
        assert!(seven.matches(3, &catalog));
        assert!(!seven.matches(4, &catalog));

        let mut request = FilterRequest::unfiltered(&limits());
        request.players = Some(PlayerFilter {
            count: 8,
            tier: PlayerTier::Allowed,
        });
        assert_eq!(
            compiler.compile(&request),
            Predicate::And(vec![Predicate::PlayerCount {
                count: 8,
                open_ended: true
            }])
        );

        let mut small = Game::new(10, "Min Above Bucket");
        small.min_players = Some(10);
        small.max_players = Some(20);
        let mut no_minimum = Game::new(11, "No Minimum");
        no_minimum.max_players = Some(10);
        let mut builder = CatalogIndex::builder();
        builder.add_game(small);
        builder.add_game(no_minimum);
        let catalog = builder.build().unwrap();
        assert!(compiler.compile(&request).matches(10, &catalog));
        // Both bounds are required at the top bucket too
        assert!(!compiler.compile(&request).matches(11, &catalog));
    }

    #[test]
    fn test_weight_band_excludes_unweighted() {
        let mut light = Game::new(1, "Light");
        light.average_weight = Some(1.4);
        let mut unvoted = Game::new(2, "Unvoted");
        unvoted.average_weight = Some(0.0);
        let mut builder = CatalogIndex::builder();
        builder.add_game(light).add_game(unvoted).add_game(Game::new(3, "Missing"));
        let catalog = builder.build().unwrap();

        let atom = Predicate::WeightBand(WeightBand::Beginner);
        assert!(atom.matches(1, &catalog));
        assert!(!atom.matches(2, &catalog));
        assert!(!atom.matches(3, &catalog));
    }

    #[test]
    fn test_is_indexed() {
        let linked = Predicate::LinkedTo {
            relation: Relation::Artist,
            id: 1,
        };
        assert!(Predicate::Or(vec![linked.clone()]).is_indexed());
        assert!(Predicate::InSubset.is_indexed());
        assert!(!Predicate::And(vec![]).is_indexed());
        assert!(!Predicate::Or(vec![linked, Predicate::NameContains("a".into())]).is_indexed());
    }
}
