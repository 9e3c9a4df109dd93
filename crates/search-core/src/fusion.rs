use std::collections::HashSet;

use common::{MedicineHit, MedicineRecord};

use crate::filter;

/// Relevance assigned to identifier fast-path hits.
pub const FAST_PATH_RELEVANCE: f64 = 1.0;
/// Relevance assigned to any record that survived dedup as a lexical hit.
pub const LEXICAL_RELEVANCE: f64 = 2.0;

/// Where a candidate came from. The derived ordering is the dedup priority:
/// fast path, then lexical, then vector spaces in configuration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SourceKind {
    FastPath,
    Lexical,
    Vector(usize),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub position: usize,
    pub source: SourceKind,
    /// Fuzzy score (0–100) for lexical candidates, distance for vector ones.
    pub raw_score: f64,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum FusionError {
    #[error("candidate at position {position} has non-finite score {score}")]
    NonFiniteScore { position: usize, score: f64 },
    #[error("candidate position {position} is outside a catalog of {len} records")]
    UnknownPosition { position: usize, len: usize },
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Scored {
    position: usize,
    source: SourceKind,
    relevance: f64,
}

/// Merges candidates from every source into the final ranked hit list.
///
/// `form` and `category` restrict the union before dedup so a filtered-out
/// record cannot shadow a lower-priority duplicate that would have passed.
pub fn fuse(
    records: &[MedicineRecord],
    candidates: Vec<Candidate>,
    form: Option<&str>,
    category: Option<&str>,
    top_k: usize,
) -> Result<Vec<MedicineHit>, FusionError> {
    for candidate in &candidates {
        if candidate.position >= records.len() {
            return Err(FusionError::UnknownPosition {
                position: candidate.position,
                len: records.len(),
            });
        }
        if !candidate.raw_score.is_finite() {
            return Err(FusionError::NonFiniteScore {
                position: candidate.position,
                score: candidate.raw_score,
            });
        }
    }

    let mut survivors = candidates
        .into_iter()
        .filter(|c| filter::matches_categorical(&records[c.position], form, category))
        .collect::<Vec<_>>();
    survivors.sort_by_key(|c| c.source);

    let mut seen = HashSet::new();
    survivors.retain(|c| seen.insert(records[c.position].batch_id.as_str()));

    let max_distance = survivors
        .iter()
        .filter(|c| matches!(c.source, SourceKind::Vector(_)))
        .map(|c| c.raw_score)
        .fold(0.0_f64, f64::max);

    let mut scored = survivors
        .into_iter()
        .map(|c| Scored {
            position: c.position,
            source: c.source,
            relevance: relevance(c, max_distance),
        })
        .collect::<Vec<_>>();
    scored.sort_by(|a, b| {
        a.source
            .cmp(&b.source)
            .then_with(|| b.relevance.total_cmp(&a.relevance))
            .then_with(|| a.position.cmp(&b.position))
    });
    scored.truncate(top_k);

    Ok(scored
        .into_iter()
        .map(|s| MedicineHit {
            record: records[s.position].clone(),
            relevance_score: s.relevance,
        })
        .collect())
}

fn relevance(candidate: Candidate, max_distance: f64) -> f64 {
    match candidate.source {
        SourceKind::FastPath => FAST_PATH_RELEVANCE,
        SourceKind::Lexical => LEXICAL_RELEVANCE,
        // A record reaching here carries no lexical signal; dedup kept the
        // lexical copy otherwise.
        SourceKind::Vector(_) => 1.0 - normalize_distance(candidate.raw_score, max_distance),
    }
}

/// Lexical score on the unit interval. `fuse` does not read it: fused lexical
/// hits take the fixed `LEXICAL_RELEVANCE`, which outranks any normalised
/// score. Only the unit-interval property test calls it.
pub fn normalize_fuzzy(raw: f64) -> f64 {
    (raw / 100.0).clamp(0.0, 1.0)
}

/// Distance relative to the furthest surviving vector candidate; zero when
/// every distance is zero.
pub fn normalize_distance(raw: f64, max_distance: f64) -> f64 {
    if max_distance > 0.0 {
        (raw / max_distance).clamp(0.0, 1.0)
    } else {
        0.0
    }
}
