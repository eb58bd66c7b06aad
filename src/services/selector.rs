use std::collections::BTreeSet;

use crate::{
    error::{AppError, AppResult},
    models::GameId,
    services::{catalog::CatalogIndex, filter::Predicate},
};

/// Games matching a predicate, ascending by id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateSet {
    pub ids: Vec<GameId>,
    pub total: usize,
}

/// Evaluates `predicate` against the catalog
///
/// Fails with [`AppError::CandidateSetTooLarge`] when more than
/// `max_candidates` games match.
pub fn select(
    predicate: &Predicate,
    catalog: &CatalogIndex,
    max_candidates: usize,
) -> AppResult<CandidateSet> {
    let ids: Vec<GameId> = evaluate(predicate, catalog).into_iter().collect();
    let total = ids.len();

    if total > max_candidates {
        tracing::warn!(total, max_candidates, "Candidate set exceeds ceiling");
        return Err(AppError::CandidateSetTooLarge {
            total,
            max: max_candidates,
        });
    }

    Ok(CandidateSet { ids, total })
}

fn evaluate(predicate: &Predicate, catalog: &CatalogIndex) -> BTreeSet<GameId> {
    match predicate {
        Predicate::And(children) => {
            // Seed from the inverted indices, then filter by the remaining atoms
            let (indexed, scanned): (Vec<&Predicate>, Vec<&Predicate>) =
                children.iter().partition(|c| c.is_indexed());

            let mut seed: Option<BTreeSet<GameId>> = None;
            for child in indexed {
                let ids = evaluate(child, catalog);
                seed = Some(match seed {
                    None => ids,
                    Some(acc) => acc.intersection(&ids).copied().collect(),
                });
                if seed.as_ref().is_some_and(BTreeSet::is_empty) {
                    return BTreeSet::new();
                }
            }

            let keep = |id: &GameId| scanned.iter().all(|c| c.matches(*id, catalog));
            match seed {
                Some(ids) => ids.into_iter().filter(keep).collect(),
                None => catalog.ids().filter(keep).collect(),
            }
        }
        Predicate::Or(children) => children
            .iter()
            .flat_map(|child| evaluate(child, catalog))
            .collect(),
        Predicate::LinkedTo { relation, id } => catalog
            .linked(*relation, *id)
            .cloned()
            .unwrap_or_default(),
        Predicate::InSubset => catalog.subset().clone(),
        atom => catalog
            .ids()
            .filter(|id| atom.matches(*id, catalog))
            .collect(),
    }
}
