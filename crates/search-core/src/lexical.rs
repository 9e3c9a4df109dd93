use common::{MedicineRecord, SearchableField};
use rayon::prelude::*;

use crate::fusion::{Candidate, SourceKind};

/// Catalog size above which lexical scoring fans out across the rayon pool.
pub const PARALLEL_THRESHOLD: usize = 2_048;

#[derive(Debug, Clone, PartialEq)]
pub struct LexicalMatcher {
    fields: Vec<SearchableField>,
    threshold: f64,
}

impl LexicalMatcher {
    pub fn new(fields: Vec<SearchableField>, threshold: f64) -> Self {
        let fields = if fields.is_empty() {
            SearchableField::DEFAULTS.to_vec()
        } else {
            fields
        };
        Self { fields, threshold }
    }

    pub fn fields(&self) -> &[SearchableField] {
        &self.fields
    }

    pub const fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Best partial ratio of the query against any searchable field.
    pub fn score(&self, query: &[char], record: &MedicineRecord) -> f64 {
        let mut best = 0.0_f64;
        for field in &self.fields {
            let value = lowered(field.value(record));
            best = best.max(partial_ratio_chars(query, &value));
            if best >= 100.0 {
                break;
            }
        }
        best
    }

    pub fn candidates(&self, query: &str, records: &[MedicineRecord]) -> Vec<Candidate> {
        let needle = lowered(query.trim());
        let scored = |(position, record): (usize, &MedicineRecord)| {
            let score = self.score(&needle, record);
            (score >= self.threshold).then_some(Candidate {
                position,
                source: SourceKind::Lexical,
                raw_score: score,
            })
        };
        if records.len() > PARALLEL_THRESHOLD {
            records.par_iter().enumerate().filter_map(scored).collect()
        } else {
            records.iter().enumerate().filter_map(scored).collect()
        }
    }
}

fn lowered(text: &str) -> Vec<char> {
    text.to_lowercase().chars().collect()
}

/// Case-insensitive partial ratio on a 0–100 scale.
///
/// The shorter string is slid across the longer one, including the ragged
/// windows hanging off either end, and each alignment is scored with the
/// normalised Indel similarity. Either side empty scores 0.
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    partial_ratio_chars(&lowered(a), &lowered(b))
}

fn partial_ratio_chars(a: &[char], b: &[char]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let n = short.len();
    let m = long.len();

    let mut best = 0.0_f64;
    let mut consider = |window: &[char]| {
        let ratio = indel_ratio(short, window);
        if ratio > best {
            best = ratio;
        }
        best >= 100.0
    };

    for start in 0..=m - n {
        if consider(&long[start..start + n]) {
            return 100.0;
        }
    }
    for len in 1..n {
        if consider(&long[..len]) || consider(&long[m - len..]) {
            return 100.0;
        }
    }
    best
}

#[allow(clippy::cast_precision_loss)]
fn indel_ratio(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 100.0;
    }
    200.0 * lcs_len(a, b) as f64 / total as f64
}

fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0_usize; b.len() + 1];
    let mut curr = vec![0_usize; b.len() + 1];
    for ca in a {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}
