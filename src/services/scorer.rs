use crate::{
    models::{GameId, PreferenceSet},
    services::embeddings::EmbeddingStore,
};

/// Scores candidates against a user's liked and disliked games
///
/// The preference direction is `normalize(sum of liked) - normalize(sum of
/// disliked)`. A candidate's score is its cosine similarity to that direction,
/// mapped into `[0, 1]`. Rated games without an embedding are skipped.
#[derive(Debug, Clone)]
pub struct PreferenceScorer<'a> {
    embeddings: &'a EmbeddingStore,
    /// `None` when no rated game had an embedding or both sides cancel out
    direction: Option<Vec<f32>>,
    preferences: &'a PreferenceSet,
}

impl<'a> PreferenceScorer<'a> {
    pub fn new(embeddings: &'a EmbeddingStore, preferences: &'a PreferenceSet) -> Self {
        let dimension = embeddings.dimension();
        let positive = centroid(embeddings, preferences.liked().iter().copied(), dimension);
        let negative = centroid(embeddings, preferences.disliked().iter().copied(), dimension);

        let direction = match (positive, negative) {
            (None, None) => None,
            (positive, negative) => {
                let mut direction = vec![0.0f32; dimension];
                if let Some(positive) = positive {
                    add_scaled(&mut direction, &positive, 1.0);
                }
                if let Some(negative) = negative {
                    add_scaled(&mut direction, &negative, -1.0);
                }
                (norm(&direction) > f32::EPSILON).then_some(direction)
            }
        };

        if direction.is_none() && !preferences.is_empty() {
            tracing::debug!("No usable preference direction; candidates score 0");
        }

        Self {
            embeddings,
            direction,
            preferences,
        }
    }

    /// Whether any rated game contributed to the direction
    pub fn has_direction(&self) -> bool {
        self.direction.is_some()
    }

    /// Games the user already rated are never recommended
    pub fn is_excluded(&self, game_id: GameId) -> bool {
        self.preferences.is_rated(game_id)
    }

    /// Score in `[0, 1]`, or `None` when the game has no embedding or there is
    /// no direction to compare against; unscored games rank after scored ones
    pub fn score(&self, game_id: GameId) -> Option<f32> {
        let direction = self.direction.as_deref()?;
        let vector = self.embeddings.get(game_id)?;
        let cosine = cosine_similarity(vector, direction);
        Some(((cosine + 1.0) / 2.0).clamp(0.0, 1.0))
    }
}

/// Normalized sum of the embeddings of `ids`; ids without a vector are skipped
fn centroid(
    embeddings: &EmbeddingStore,
    ids: impl Iterator<Item = GameId>,
    dimension: usize,
) -> Option<Vec<f32>> {
    let mut sum = vec![0.0f32; dimension];
    let mut found = 0usize;

    for id in ids {
        if let Some(vector) = embeddings.get(id) {
            add_scaled(&mut sum, vector, 1.0);
            found += 1;
        } else {
            tracing::debug!(game_id = id, "Rated game has no embedding, skipping");
        }
    }

    if found == 0 {
        return None;
    }

    let length = norm(&sum);
    if length <= f32::EPSILON {
        return None;
    }
    sum.iter_mut().for_each(|x| *x /= length);
    Some(sum)
}

#[inline]
fn add_scaled(target: &mut [f32], source: &[f32], factor: f32) {
    for (t, s) in target.iter_mut().zip(source) {
        *t += s * factor;
    }
}

#[inline]
fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[inline]
fn norm(v: &[f32]) -> f32 {
    dot(v, v).sqrt()
}

/// Cosine similarity; 0 when either vector has no length
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let denominator = norm(a) * norm(b);
    if denominator <= f32::EPSILON {
        return 0.0;
    }
    dot(a, b) / denominator
}
