use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

pub mod filter;
pub mod game;
pub mod preferences;

pub use filter::{FilterRequest, Page, PlayerFilter, PlayerTier, SortKey, WeightBand};
pub use game::{
    Entity, EntityCount, Game, GameResponse, GamesPage, Ranks, SuggestedPlayers,
};
pub use preferences::PreferenceSet;

/// BoardGameGeek game identifier
pub type GameId = i32;

/// Identifier of a mechanic, category, designer or artist
pub type EntityId = i32;

/// Many-to-many relations a game carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Mechanic,
    Category,
    Designer,
    Artist,
}

impl Relation {
    pub const ALL: [Relation; 4] = [
        Relation::Mechanic,
        Relation::Category,
        Relation::Designer,
        Relation::Artist,
    ];

    /// Query parameter carrying this relation's id list on `/games`
    pub fn param(&self) -> &'static str {
        match self {
            Relation::Mechanic => "mechanics",
            Relation::Category => "categories",
            Relation::Designer => "designer_id",
            Relation::Artist => "artist_id",
        }
    }
}

impl Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Relation::Mechanic => "mechanic",
            Relation::Category => "category",
            Relation::Designer => "designer",
            Relation::Artist => "artist",
        };
        write!(f, "{}", name)
    }
}

/// Named ordinal rankings stored per game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankField {
    Rank,
    AbstractsRank,
    CgsRank,
    ChildrensGamesRank,
    FamilyGamesRank,
    PartyGamesRank,
    StrategyGamesRank,
    ThematicRank,
    WargamesRank,
}

impl RankField {
    pub const ALL: [RankField; 9] = [
        RankField::Rank,
        RankField::AbstractsRank,
        RankField::CgsRank,
        RankField::ChildrensGamesRank,
        RankField::FamilyGamesRank,
        RankField::PartyGamesRank,
        RankField::StrategyGamesRank,
        RankField::ThematicRank,
        RankField::WargamesRank,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RankField::Rank => "rank",
            RankField::AbstractsRank => "abstracts_rank",
            RankField::CgsRank => "cgs_rank",
            RankField::ChildrensGamesRank => "childrens_games_rank",
            RankField::FamilyGamesRank => "family_games_rank",
            RankField::PartyGamesRank => "party_games_rank",
            RankField::StrategyGamesRank => "strategy_games_rank",
            RankField::ThematicRank => "thematic_rank",
            RankField::WargamesRank => "wargames_rank",
        }
    }
}

impl FromStr for RankField {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RankField::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or(())
    }
}

/// Community poll outcome for one player count of one game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationLevel {
    Best,
    Recommended,
    NotRecommended,
}

impl FromStr for RecommendationLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "best" => Ok(RecommendationLevel::Best),
            "recommended" => Ok(RecommendationLevel::Recommended),
            "not_recommended" | "not recommended" => Ok(RecommendationLevel::NotRecommended),
            other => Err(format!("unknown recommendation level `{}`", other)),
        }
    }
}
