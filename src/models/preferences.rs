use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::GameId;

/// Liked and disliked games supplied with a recommendation request
///
/// A game listed on both sides is treated as conflicted: it contributes to
/// neither side of the preference direction, but it is still a rated game and
/// never appears in the results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceSet {
    liked: BTreeSet<GameId>,
    disliked: BTreeSet<GameId>,
    conflicted: BTreeSet<GameId>,
}

impl PreferenceSet {
    pub fn new(
        liked: impl IntoIterator<Item = GameId>,
        disliked: impl IntoIterator<Item = GameId>,
    ) -> Self {
        let liked: BTreeSet<GameId> = liked.into_iter().collect();
        let disliked: BTreeSet<GameId> = disliked.into_iter().collect();
        let conflicted: BTreeSet<GameId> = liked.intersection(&disliked).copied().collect();

        if !conflicted.is_empty() {
            tracing::debug!(
                conflicted = ?conflicted,
                "Games present in both liked and disliked sets are ignored for scoring"
            );
        }

        Self {
            liked: &liked - &conflicted,
            disliked: &disliked - &conflicted,
            conflicted,
        }
    }

    /// Preference built around a single anchor game
    pub fn anchored(game_id: GameId) -> Self {
        Self::new([game_id], [])
    }

    /// Liked games that contribute to scoring
    pub fn liked(&self) -> &BTreeSet<GameId> {
        &self.liked
    }

    /// Disliked games that contribute to scoring
    pub fn disliked(&self) -> &BTreeSet<GameId> {
        &self.disliked
    }

    /// Whether the user rated this game in any way
    pub fn is_rated(&self, game_id: GameId) -> bool {
        self.liked.contains(&game_id)
            || self.disliked.contains(&game_id)
            || self.conflicted.contains(&game_id)
    }

    pub fn is_empty(&self) -> bool {
        self.liked.is_empty() && self.disliked.is_empty() && self.conflicted.is_empty()
    }

    /// Stable textual form used in cache keys
    pub fn fingerprint(&self) -> String {
        fn join(ids: &BTreeSet<GameId>) -> String {
            ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(",")
        }
        format!(
            "l={};d={};c={}",
            join(&self.liked),
            join(&self.disliked),
            join(&self.conflicted)
        )
    }
}
