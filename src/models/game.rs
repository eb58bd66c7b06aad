use serde::{Deserialize, Serialize};

use super::{EntityId, GameId, RankField, RecommendationLevel};

/// A board game as stored in the catalog snapshot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Game {
    pub id: GameId,
    pub name: String,
    pub year_published: Option<i32>,
    pub min_players: Option<i32>,
    pub max_players: Option<i32>,
    pub playing_time: Option<i32>,
    pub min_playtime: Option<i32>,
    pub max_playtime: Option<i32>,
    pub min_age: Option<i32>,
    /// Mean user rating
    pub average: Option<f64>,
    /// Mean complexity vote, 1.0 (light) to 5.0 (heavy)
    pub average_weight: Option<f64>,
    pub users_rated: Option<i32>,
    #[serde(default)]
    pub is_expansion: bool,
    pub thumbnail: Option<String>,
    pub image: Option<String>,
    #[serde(flatten)]
    pub ranks: Ranks,
}

impl Game {
    /// Creates a game with only an id and a name set
    pub fn new(id: GameId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            year_published: None,
            min_players: None,
            max_players: None,
            playing_time: None,
            min_playtime: None,
            max_playtime: None,
            min_age: None,
            average: None,
            average_weight: None,
            users_rated: None,
            is_expansion: false,
            thumbnail: None,
            image: None,
            ranks: Ranks::default(),
        }
    }

    /// Recorded weight, treating the source's 0 ("never voted") as absent
    pub fn weight(&self) -> Option<f64> {
        self.average_weight.filter(|w| *w > 0.0)
    }
}

/// Rank positions of a game; `None` means unranked
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ranks {
    pub rank: Option<i32>,
    pub abstracts_rank: Option<i32>,
    pub cgs_rank: Option<i32>,
    pub childrens_games_rank: Option<i32>,
    pub family_games_rank: Option<i32>,
    pub party_games_rank: Option<i32>,
    pub strategy_games_rank: Option<i32>,
    pub thematic_rank: Option<i32>,
    pub wargames_rank: Option<i32>,
}

impl Ranks {
    pub fn get(&self, field: RankField) -> Option<i32> {
        match field {
            RankField::Rank => self.rank,
            RankField::AbstractsRank => self.abstracts_rank,
            RankField::CgsRank => self.cgs_rank,
            RankField::ChildrensGamesRank => self.childrens_games_rank,
            RankField::FamilyGamesRank => self.family_games_rank,
            RankField::PartyGamesRank => self.party_games_rank,
            RankField::StrategyGamesRank => self.strategy_games_rank,
            RankField::ThematicRank => self.thematic_rank,
            RankField::WargamesRank => self.wargames_rank,
        }
    }

    pub fn set(&mut self, field: RankField, value: Option<i32>) {
        let slot = match field {
            RankField::Rank => &mut self.rank,
            RankField::AbstractsRank => &mut self.abstracts_rank,
            RankField::CgsRank => &mut self.cgs_rank,
            RankField::ChildrensGamesRank => &mut self.childrens_games_rank,
            RankField::FamilyGamesRank => &mut self.family_games_rank,
            RankField::PartyGamesRank => &mut self.party_games_rank,
            RankField::StrategyGamesRank => &mut self.strategy_games_rank,
            RankField::ThematicRank => &mut self.thematic_rank,
            RankField::WargamesRank => &mut self.wargames_rank,
        };
        *slot = value;
    }

    /// Folds non-positive positions into "unranked"
    pub fn normalized(mut self) -> Self {
        for field in RankField::ALL {
            let value = self.get(field).filter(|r| *r > 0);
            self.set(field, value);
        }
        self
    }
}

/// A mechanic, category, designer or artist
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
}

/// Lookup list entry used to build filter UIs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntityCount {
    pub id: EntityId,
    pub name: String,
    pub game_count: usize,
}

/// Poll result for one player count
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SuggestedPlayers {
    pub player_count: i32,
    pub recommendation_level: RecommendationLevel,
}

/// A game with its relations resolved, as returned to the client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameResponse {
    #[serde(flatten)]
    pub game: Game,
    pub mechanics: Vec<Entity>,
    pub categories: Vec<Entity>,
    pub designers: Vec<Entity>,
    pub artists: Vec<Entity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_players: Option<Vec<SuggestedPlayers>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation_score: Option<f32>,
}

/// One page of games plus the size of the full result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GamesPage {
    pub games: Vec<GameResponse>,
    pub total: usize,
}
