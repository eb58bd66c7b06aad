use std::cmp::Ordering;

use crate::{
    models::{GameId, Page, RankField, SortKey},
    services::{catalog::CatalogIndex, scorer::PreferenceScorer, selector::CandidateSet},
};

/// One ordered result row
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedEntry {
    pub game_id: GameId,
    /// Present only in recommendation mode
    pub score: Option<f32>,
}

/// One page of ordered results plus the size of the full ordering
#[derive(Debug, Clone, PartialEq)]
pub struct RankedResult {
    pub entries: Vec<RankedEntry>,
    pub total: usize,
}

/// Orders candidates and slices the requested page
///
/// `RecommendationScore` orders by scorer output, otherwise the named attribute
/// orders the games. A recommendation without a scorer ranks every game as
/// unscored, which leaves them in id order.
pub fn rank(
    candidates: CandidateSet,
    sort_by: SortKey,
    catalog: &CatalogIndex,
    scorer: Option<&PreferenceScorer<'_>>,
    page: Page,
) -> RankedResult {
    let entries = match sort_by {
        SortKey::RecommendationScore => order_by_score(candidates.ids, scorer),
        SortKey::Rank(field) => order_by_rank(candidates.ids, field, catalog),
        SortKey::NameAsc => order_by_name(candidates.ids, catalog, false),
        SortKey::NameDesc => order_by_name(candidates.ids, catalog, true),
    };

    let total = entries.len();
    RankedResult {
        entries: paginate(entries, page),
        total,
    }
}

/// Keeps `page.limit` items starting at `page.skip`
pub fn paginate<T>(items: Vec<T>, page: Page) -> Vec<T> {
    items.into_iter().skip(page.skip).take(page.limit).collect()
}

fn unscored(ids: Vec<GameId>) -> Vec<RankedEntry> {
    ids.into_iter()
        .map(|game_id| RankedEntry {
            game_id,
            score: None,
        })
        .collect()
}

/// Ascending rank with unranked games last, ties by id
fn order_by_rank(mut ids: Vec<GameId>, field: RankField, catalog: &CatalogIndex) -> Vec<RankedEntry> {
    let rank_of = |id: GameId| catalog.game(id).and_then(|game| game.ranks.get(field));
    ids.sort_by(|a, b| match (rank_of(*a), rank_of(*b)) {
        (Some(ra), Some(rb)) => ra.cmp(&rb).then(a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    });
    unscored(ids)
}

/// Case-insensitive name order, ties by ascending id in both directions
fn order_by_name(mut ids: Vec<GameId>, catalog: &CatalogIndex, descending: bool) -> Vec<RankedEntry> {
    ids.sort_by(|a, b| {
        let by_name = catalog.name_key(*a).cmp(&catalog.name_key(*b));
        let by_name = if descending { by_name.reverse() } else { by_name };
        by_name.then(a.cmp(b))
    });
    unscored(ids)
}

/// Highest score first, unscored games last, ties by id; rated games are dropped
fn order_by_score(ids: Vec<GameId>, scorer: Option<&PreferenceScorer<'_>>) -> Vec<RankedEntry> {
    let Some(scorer) = scorer else {
        return unscored(ids);
    };

    let mut entries: Vec<RankedEntry> = ids
        .into_iter()
        .filter(|id| !scorer.is_excluded(*id))
        .map(|game_id| RankedEntry {
            game_id,
            score: scorer.score(game_id),
        })
        .collect();

    entries.sort_by(|a, b| match (a.score, b.score) {
        (Some(sa), Some(sb)) => sb.total_cmp(&sa).then(a.game_id.cmp(&b.game_id)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.game_id.cmp(&b.game_id),
    });
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Game, PreferenceSet};
    use crate::services::embeddings::EmbeddingStore;

    fn catalog() -> CatalogIndex {
        let mut builder = CatalogIndex::builder();
        let rows = [
            (1, "azul", None),
            (2, "Brass", Some(3)),
            (3, "Catan", Some(1)),
            (4, "Dominion", None),
            (5, "Everdell", Some(3)),
            (6, "catan junior", Some(2)),
        ];
        for (id, name, rank) in rows {
            let mut game = Game::new(id, name);
            game.ranks.rank = rank;
            game.ranks.thematic_rank = rank.map(|r| 10 - r);
            builder.add_game(game);
        }
        builder.build().unwrap()
    }

    fn all(catalog: &CatalogIndex) -> CandidateSet {
        let ids: Vec<GameId> = catalog.ids().collect();
        CandidateSet {
            total: ids.len(),
            ids,
        }
    }

    fn page(skip: usize, limit: usize) -> Page {
        Page { skip, limit }
    }

    fn ids(result: &RankedResult) -> Vec<GameId> {
        result.entries.iter().map(|e| e.game_id).collect()
    }

    #[test]
    fn test_rank_ascending_unranked_last() {
        let catalog = catalog();
        let result = rank(
            all(&catalog),
            SortKey::Rank(RankField::Rank),
            &catalog,
            None,
            page(0, 10),
        );
        assert_eq!(ids(&result), vec![3, 6, 2, 5, 1, 4]);
        assert_eq!(result.total, 6);

        let ranks: Vec<Option<i32>> = result
            .entries
            .iter()
            .map(|e| catalog.game(e.game_id).unwrap().ranks.rank)
            .collect();
        let ranked: Vec<i32> = ranks.iter().flatten().copied().collect();
        assert!(ranked.windows(2).all(|w| w[0] <= w[1]));
        assert!(ranks[4].is_none() && ranks[5].is_none());
    }

    #[test]
    fn test_other_rank_field() {
        let catalog = catalog();
        let result = rank(
            all(&catalog),
            SortKey::Rank(RankField::ThematicRank),
            &catalog,
            None,
            page(0, 10),
        );
        assert_eq!(ids(&result), vec![2, 5, 6, 3, 1, 4]);
    }

    #[test]
    fn test_name_order_both_directions() {
        let catalog = catalog();
        let asc = rank(all(&catalog), SortKey::NameAsc, &catalog, None, page(0, 10));
        assert_eq!(ids(&asc), vec![1, 2, 3, 6, 4, 5]);

        let desc = rank(all(&catalog), SortKey::NameDesc, &catalog, None, page(0, 10));
        assert_eq!(ids(&desc), vec![5, 4, 6, 3, 2, 1]);
    }

    #[test]
    fn test_pagination_slices_after_ordering() {
        let catalog = catalog();
        let result = rank(
            all(&catalog),
            SortKey::Rank(RankField::Rank),
            &catalog,
            None,
            page(2, 3),
        );
        assert_eq!(ids(&result), vec![2, 5, 1]);
        assert_eq!(result.total, 6);

        let past_end = rank(
            all(&catalog),
            SortKey::Rank(RankField::Rank),
            &catalog,
            None,
            page(10, 3),
        );
        assert!(past_end.entries.is_empty());
        assert_eq!(past_end.total, 6);
    }

    #[test]
    fn test_score_order_excludes_rated() {
        let catalog = catalog();
        let store = EmbeddingStore::from_rows(vec![
            (1, vec![1.0, 0.0]),
            (2, vec![0.0, 1.0]),
            (3, vec![0.9, 0.1]),
            (5, vec![-1.0, 0.0]),
        ])
        .unwrap();
        let prefs = PreferenceSet::new([1], [4]);
        let scorer = PreferenceScorer::new(&store, &prefs);

        let result = rank(
            all(&catalog),
            SortKey::RecommendationScore,
            &catalog,
            Some(&scorer),
            page(0, 10),
        );
        // 3 is closest, 2 orthogonal, 5 opposite, 6 has no embedding
        assert_eq!(ids(&result), vec![3, 2, 5, 6]);
        assert_eq!(result.total, 4);
        assert_eq!(result.entries[3].score, None);
    }

    #[test]
    fn test_no_direction_degenerates_to_id_order() {
        let catalog = catalog();
        let store = EmbeddingStore::default();
        let prefs = PreferenceSet::default();
        let scorer = PreferenceScorer::new(&store, &prefs);

        let result = rank(
            all(&catalog),
            SortKey::RecommendationScore,
            &catalog,
            Some(&scorer),
            page(0, 10),
        );
        assert_eq!(ids(&result), vec![1, 2, 3, 4, 5, 6]);
        assert!(result.entries.iter().all(|e| e.score.is_none()));
    }
}
