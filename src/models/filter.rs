use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use super::{EntityId, GameId, PreferenceSet, RankField, Relation};
use crate::error::{AppError, AppResult};
use crate::services::engine::QueryLimits;

/// Query parameters accepted by `GET /games`
pub const GAME_QUERY_FIELDS: [&str; 14] = [
    "search",
    "players",
    "recommendations",
    "weight",
    "mechanics",
    "categories",
    "designer_id",
    "artist_id",
    "sort_by",
    "skip",
    "limit",
    "pax_only",
    "liked_games",
    "disliked_games",
];

/// Fields whose values are comma-separated lists; repeating them appends
const LIST_FIELDS: [&str; 7] = [
    "weight",
    "mechanics",
    "categories",
    "designer_id",
    "artist_id",
    "liked_games",
    "disliked_games",
];

/// Complexity bands selectable in the weight filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightBand {
    Beginner,
    Midweight,
    Heavy,
}

impl WeightBand {
    /// Whether a recorded weight falls in this band
    pub fn contains(&self, weight: f64) -> bool {
        match self {
            WeightBand::Beginner => weight <= 2.0,
            WeightBand::Midweight => weight > 2.0 && weight <= 4.0,
            WeightBand::Heavy => weight > 4.0,
        }
    }
}

impl FromStr for WeightBand {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "beginner" => Ok(WeightBand::Beginner),
            "midweight" => Ok(WeightBand::Midweight),
            "heavy" => Ok(WeightBand::Heavy),
            _ => Err(()),
        }
    }
}

/// How strongly the community must endorse the requested player count
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerTier {
    #[default]
    Allowed,
    Recommended,
    Best,
}

impl FromStr for PlayerTier {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "allowed" => Ok(PlayerTier::Allowed),
            "recommended" => Ok(PlayerTier::Recommended),
            "best" => Ok(PlayerTier::Best),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerFilter {
    pub count: i32,
    pub tier: PlayerTier,
}

/// Result ordering requested by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Rank(RankField),
    NameAsc,
    NameDesc,
    RecommendationScore,
}

impl Default for SortKey {
    fn default() -> Self {
        SortKey::Rank(RankField::Rank)
    }
}

impl FromStr for SortKey {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "recommendation_score" => Ok(SortKey::RecommendationScore),
            "name" | "name_asc" => Ok(SortKey::NameAsc),
            "name_desc" => Ok(SortKey::NameDesc),
            other => other.parse::<RankField>().map(SortKey::Rank),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub skip: usize,
    pub limit: usize,
}

impl Page {
    /// Validates a client supplied page window
    pub fn new(skip: usize, limit: Option<usize>, limits: &QueryLimits) -> AppResult<Self> {
        let limit = limit.unwrap_or(limits.default_page_size);
        if limit == 0 || limit > limits.max_page_size {
            return Err(AppError::invalid_filter(
                "limit",
                format!("must be between 1 and {}", limits.max_page_size),
            ));
        }
        Ok(Self { skip, limit })
    }
}

/// A fully parsed and validated `/games` request
#[derive(Debug, Clone, PartialEq)]
pub struct FilterRequest {
    pub search: Option<String>,
    pub players: Option<PlayerFilter>,
    pub weight: BTreeSet<WeightBand>,
    pub mechanics: BTreeSet<EntityId>,
    pub categories: BTreeSet<EntityId>,
    pub designers: BTreeSet<EntityId>,
    pub artists: BTreeSet<EntityId>,
    pub pax_only: bool,
    pub sort_by: SortKey,
    pub page: Page,
    pub preferences: PreferenceSet,
}

impl FilterRequest {
    /// A request with no constraints, default ordering and the default page
    pub fn unfiltered(limits: &QueryLimits) -> Self {
        Self {
            search: None,
            players: None,
            weight: BTreeSet::new(),
            mechanics: BTreeSet::new(),
            categories: BTreeSet::new(),
            designers: BTreeSet::new(),
            artists: BTreeSet::new(),
            pax_only: false,
            sort_by: SortKey::default(),
            page: Page {
                skip: 0,
                limit: limits.default_page_size,
            },
            preferences: PreferenceSet::default(),
        }
    }

    pub fn related(&self, relation: Relation) -> &BTreeSet<EntityId> {
        match relation {
            Relation::Mechanic => &self.mechanics,
            Relation::Category => &self.categories,
            Relation::Designer => &self.designers,
            Relation::Artist => &self.artists,
        }
    }

    fn related_mut(&mut self, relation: Relation) -> &mut BTreeSet<EntityId> {
        match relation {
            Relation::Mechanic => &mut self.mechanics,
            Relation::Category => &mut self.categories,
            Relation::Designer => &mut self.designers,
            Relation::Artist => &mut self.artists,
        }
    }

    /// Parses raw query pairs, rejecting unknown fields and malformed values
    pub fn from_query(pairs: &[(String, String)], limits: &QueryLimits) -> AppResult<Self> {
        let params = collect_params(pairs)?;
        let mut request = Self::unfiltered(limits);

        if let Some(search) = params.get("search") {
            let search = search.trim();
            if !search.is_empty() {
                request.search = Some(search.to_string());
            }
        }

        let tier = match params.get("recommendations").map(|s| s.trim()) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<PlayerTier>().map_err(|_| {
                AppError::invalid_filter(
                    "recommendations",
                    format!("`{}` is not one of allowed, recommended, best", raw),
                )
            })?),
        };

        match params.get("players").map(|s| s.trim()) {
            None | Some("") => {
                if matches!(tier, Some(t) if t != PlayerTier::Allowed) {
                    return Err(AppError::invalid_filter(
                        "recommendations",
                        "requires a `players` value",
                    ));
                }
            }
            Some(raw) => {
                let count: i32 = raw
                    .parse()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| {
                        AppError::invalid_filter(
                            "players",
                            format!("`{}` is not a positive integer", raw),
                        )
                    })?;
                request.players = Some(PlayerFilter {
                    count,
                    tier: tier.unwrap_or_default(),
                });
            }
        }

        if let Some(raw) = params.get("weight") {
            for item in split_list(raw) {
                let band = item.parse::<WeightBand>().map_err(|_| {
                    AppError::invalid_filter(
                        "weight",
                        format!("`{}` is not one of beginner, midweight, heavy", item),
                    )
                })?;
                request.weight.insert(band);
            }
        }

        for relation in Relation::ALL {
            if let Some(raw) = params.get(relation.param()) {
                *request.related_mut(relation) = parse_id_list(relation.param(), raw)?;
            }
        }

        if let Some(raw) = params.get("pax_only") {
            request.pax_only = parse_bool("pax_only", raw)?;
        }

        if let Some(raw) = params.get("sort_by").map(|s| s.trim()).filter(|s| !s.is_empty()) {
            request.sort_by = raw.parse().map_err(|_| {
                AppError::invalid_filter("sort_by", format!("unknown sort key `{}`", raw))
            })?;
        }

        let skip = match params.get("skip").map(|s| s.trim()) {
            None | Some("") => 0,
            Some(raw) => raw.parse::<usize>().map_err(|_| {
                AppError::invalid_filter(
                    "skip",
                    format!("`{}` is not a non-negative integer", raw),
                )
            })?,
        };
        let limit = match params.get("limit").map(|s| s.trim()) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<usize>().map_err(|_| {
                AppError::invalid_filter("limit", format!("`{}` is not an integer", raw))
            })?),
        };
        request.page = Page::new(skip, limit, limits)?;

        let liked = match params.get("liked_games") {
            Some(raw) => parse_id_list("liked_games", raw)?,
            None => BTreeSet::new(),
        };
        let disliked = match params.get("disliked_games") {
            Some(raw) => parse_id_list("disliked_games", raw)?,
            None => BTreeSet::new(),
        };
        if request.sort_by != SortKey::RecommendationScore {
            for (field, ids) in [("liked_games", &liked), ("disliked_games", &disliked)] {
                if !ids.is_empty() {
                    return Err(AppError::invalid_filter(
                        field,
                        "only applies with sort_by=recommendation_score",
                    ));
                }
            }
        }
        request.preferences = PreferenceSet::new(liked, disliked);

        Ok(request)
    }
}

/// Groups query pairs by key, joining repeated list fields with commas
fn collect_params(pairs: &[(String, String)]) -> AppResult<BTreeMap<&str, String>> {
    let mut params: BTreeMap<&str, String> = BTreeMap::new();

    for (key, value) in pairs {
        let key = key.as_str();
        if !GAME_QUERY_FIELDS.contains(&key) {
            return Err(AppError::invalid_filter(key, "unknown query parameter"));
        }

        match params.get_mut(key) {
            Some(existing) if LIST_FIELDS.contains(&key) => {
                existing.push(',');
                existing.push_str(value);
            }
            Some(_) => {
                return Err(AppError::invalid_filter(key, "may only be given once"));
            }
            None => {
                params.insert(key, value.clone());
            }
        }
    }

    Ok(params)
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|item| !item.is_empty())
}

/// Parses a comma-separated id list, ignoring empty items
pub fn parse_id_list(field: &str, raw: &str) -> AppResult<BTreeSet<GameId>> {
    split_list(raw)
        .map(|item| {
            item.parse::<i32>().map_err(|_| {
                AppError::invalid_filter(field, format!("`{}` is not an integer id", item))
            })
        })
        .collect()
}

fn parse_bool(field: &str, raw: &str) -> AppResult<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" | "" => Ok(false),
        other => Err(AppError::invalid_filter(
            field,
            format!("`{}` is not a boolean", other),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> QueryLimits {
        QueryLimits {
            default_page_size: 24,
            max_page_size: 100,
            max_candidates: 1000,
            top_player_bucket: 8,
            recommendation_limit: 5,
        }
    }

    fn parse(pairs: &[(&str, &str)]) -> AppResult<FilterRequest> {
        let pairs: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        FilterRequest::from_query(&pairs, &limits())
    }

    fn field_of(err: AppError) -> String {
        match err {
            AppError::InvalidFilter { field, .. } => field,
            other => panic!("expected InvalidFilter, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_query_is_unfiltered() {
        let request = parse(&[]).unwrap();
        assert_eq!(request, FilterRequest::unfiltered(&limits()));
        assert_eq!(request.sort_by, SortKey::Rank(RankField::Rank));
        assert_eq!(request.page, Page { skip: 0, limit: 24 });
    }

    #[test]
    fn test_full_query_parses() {
        let request = parse(&[
            ("search", "  Catan "),
            ("players", "5"),
            ("recommendations", "best"),
            ("weight", "beginner,heavy"),
            ("mechanics", "2072, 2040"),
            ("categories", "1021"),
            ("designer_id", "11"),
            ("artist_id", ""),
            ("pax_only", "true"),
            ("sort_by", "thematic_rank"),
            ("skip", "10"),
            ("limit", "5"),
        ])
        .unwrap();

        assert_eq!(request.search.as_deref(), Some("Catan"));
        assert_eq!(
            request.players,
            Some(PlayerFilter {
                count: 5,
                tier: PlayerTier::Best
            })
        );
        assert_eq!(
            request.weight,
            BTreeSet::from([WeightBand::Beginner, WeightBand::Heavy])
        );
        assert_eq!(request.mechanics, BTreeSet::from([2040, 2072]));
        assert_eq!(request.categories, BTreeSet::from([1021]));
        assert_eq!(request.designers, BTreeSet::from([11]));
        assert!(request.artists.is_empty());
        assert!(request.pax_only);
        assert_eq!(request.sort_by, SortKey::Rank(RankField::ThematicRank));
        assert_eq!(request.page, Page { skip: 10, limit: 5 });
    }

    #[test]
    fn test_repeated_list_fields_accumulate() {
        let request = parse(&[("mechanics", "1"), ("mechanics", "2,3")]).unwrap();
        assert_eq!(request.mechanics, BTreeSet::from([1, 2, 3]));
    }

    #[test]
    fn test_repeated_scalar_field_rejected() {
        let err = parse(&[("players", "2"), ("players", "3")]).unwrap_err();
        assert_eq!(field_of(err), "players");
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = parse(&[("genre", "wargame")]).unwrap_err();
        assert_eq!(field_of(err), "genre");
    }

    #[test]
    fn test_malformed_values_name_their_field() {
        let cases: Vec<(&str, &str)> = vec![
            ("mechanics", "12,abc"),
            ("weight", "light"),
            ("players", "0"),
            ("players", "two"),
            ("recommendations", "great"),
            ("sort_by", "popularity"),
            ("skip", "-1"),
            ("limit", "0"),
            ("limit", "101"),
            ("pax_only", "maybe"),
            ("liked_games", "x"),
        ];

        for (field, value) in cases {
            let err = parse(&[(field, value)]).unwrap_err();
            assert_eq!(field_of(err), field, "value `{}`", value);
        }
    }

    #[test]
    fn test_tier_without_players_rejected() {
        let err = parse(&[("recommendations", "best")]).unwrap_err();
        assert_eq!(field_of(err), "recommendations");

        assert!(parse(&[("recommendations", "allowed")]).is_ok());
    }

    #[test]
    fn test_sort_keys() {
        assert_eq!("name".parse::<SortKey>(), Ok(SortKey::NameAsc));
        assert_eq!("name_desc".parse::<SortKey>(), Ok(SortKey::NameDesc));
        assert_eq!(
            "recommendation_score".parse::<SortKey>(),
            Ok(SortKey::RecommendationScore)
        );
        assert_eq!(
            "wargames_rank".parse::<SortKey>(),
            Ok(SortKey::Rank(RankField::WargamesRank))
        );
    }

    #[test]
    fn test_weight_band_boundaries() {
        assert!(WeightBand::Beginner.contains(2.0));
        assert!(!WeightBand::Midweight.contains(2.0));
        assert!(WeightBand::Midweight.contains(4.0));
        assert!(!WeightBand::Heavy.contains(4.0));
        assert!(WeightBand::Heavy.contains(4.01));
    }

    #[test]
    fn test_preferences_from_query() {
        let request = parse(&[
            ("sort_by", "recommendation_score"),
            ("liked_games", "13,822"),
            ("disliked_games", "9209"),
        ])
        .unwrap();
        assert_eq!(request.preferences.liked(), &BTreeSet::from([13, 822]));
        assert_eq!(request.preferences.disliked(), &BTreeSet::from([9209]));
    }

    #[test]
    fn test_preferences_require_score_sort() {
        let err = parse(&[("liked_games", "13")]).unwrap_err();
        assert_eq!(field_of(err), "liked_games");

        let err = parse(&[("sort_by", "name"), ("disliked_games", "9209")]).unwrap_err();
        assert_eq!(field_of(err), "disliked_games");

        let request = parse(&[("liked_games", "")]).unwrap();
        assert!(request.preferences.is_empty());
    }
}
