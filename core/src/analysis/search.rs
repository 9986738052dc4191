//! Fuzzy search over stored entities
//!
//! Scores are integers in `0..=100`. A field's score is the better of a
//! token-set comparison (word order and repetition ignored) and a partial
//! comparison (best-matching substring of the longer string).

use crate::store::{EntityStore, StoreResult};
use crate::types::{Patient, Series, Study};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

pub const DEFAULT_THRESHOLD: u8 = 60;
pub const DEFAULT_LIMIT: usize = 10;

/// Similarity of two strings from their normalized edit distance
pub fn ratio(a: &str, b: &str) -> u8 {
    (strsim::normalized_levenshtein(a, b) * 100.0).round() as u8
}

/// Best [`ratio`] of the shorter string against every same-length window
/// of the longer one
pub fn partial_ratio(a: &str, b: &str) -> u8 {
    let (short, long): (Vec<char>, Vec<char>) = if a.chars().count() <= b.chars().count() {
        (a.chars().collect(), b.chars().collect())
    } else {
        (b.chars().collect(), a.chars().collect())
    };
    if short.is_empty() {
        return 0;
    }

    let needle: String = short.iter().collect();
    long.windows(short.len())
        .map(|window| ratio(&needle, &window.iter().collect::<String>()))
        .max()
        .unwrap_or(0)
}

fn tokens(s: &str) -> BTreeSet<String> {
    s.chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

fn join(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Compares the shared tokens against each side's full sorted token set
pub fn token_set_ratio(a: &str, b: &str) -> u8 {
    let ta = tokens(a);
    let tb = tokens(b);
    if ta.is_empty() || tb.is_empty() {
        return 0;
    }

    let common: Vec<&str> = ta.intersection(&tb).map(String::as_str).collect();
    let only_a: Vec<&str> = ta.difference(&tb).map(String::as_str).collect();
    let only_b: Vec<&str> = tb.difference(&ta).map(String::as_str).collect();

    let base = common.join(" ");
    let rest_a = only_a.join(" ");
    let rest_b = only_b.join(" ");
    let with_a = join(&[base.as_str(), rest_a.as_str()]);
    let with_b = join(&[base.as_str(), rest_b.as_str()]);

    [
        ratio(&base, &with_a),
        ratio(&base, &with_b),
        ratio(&with_a, &with_b),
    ]
    .into_iter()
    .max()
    .unwrap_or(0)
}

/// Case-insensitive score of `text` against a search query
pub fn fuzzy_score(query: &str, text: &str) -> u8 {
    let query = query.to_lowercase();
    let text = text.to_lowercase();
    token_set_ratio(&query, &text).max(partial_ratio(&query, &text))
}

fn best_score(query: &str, fields: &[Option<&str>]) -> u8 {
    fields
        .iter()
        .flatten()
        .filter(|value| !value.is_empty())
        .map(|value| fuzzy_score(query, value))
        .max()
        .unwrap_or(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HitKind {
    Patient,
    Study,
    Series,
}

impl fmt::Display for HitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HitKind::Patient => "Patient",
            HitKind::Study => "Study",
            HitKind::Series => "Series",
        };
        f.pad(name)
    }
}

/// One matching entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    #[serde(rename = "type")]
    pub kind: HitKind,
    /// Natural key of the matched entity
    pub id: String,
    pub text: String,
    pub score: u8,
}

/// Fuzzy search across patients, studies and series
pub struct Searcher {
    store: EntityStore,
    threshold: u8,
    limit: usize,
}

impl Searcher {
    pub fn new(store: EntityStore) -> Self {
        Self {
            store,
            threshold: DEFAULT_THRESHOLD,
            limit: DEFAULT_LIMIT,
        }
    }

    pub fn with_threshold(mut self, threshold: u8) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Hits scoring at least the threshold, best first
    ///
    /// Equal scores keep patients before studies before series. A blank
    /// query matches nothing.
    pub fn search(&self, query: &str) -> StoreResult<Vec<SearchHit>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let mut hits = Vec::new();
        let mut push = |kind, id: &str, text: String, score: u8| {
            if score >= self.threshold {
                hits.push(SearchHit {
                    kind,
                    id: id.to_string(),
                    text,
                    score,
                });
            }
        };

        for patient in self.store.list::<Patient>()? {
            let score = best_score(
                query,
                &[patient.patient_name.as_deref(), Some(patient.patient_id.as_str())],
            );
            let text = format!(
                "{} ({})",
                patient.patient_name.as_deref().unwrap_or("unknown"),
                patient.patient_id
            );
            push(HitKind::Patient, &patient.patient_id, text, score);
        }

        for study in self.store.list::<Study>()? {
            let score = best_score(
                query,
                &[study.description.as_deref(), study.study_date.as_deref()],
            );
            let text = format!(
                "{} ({})",
                study.description.as_deref().unwrap_or("unknown"),
                study.study_date.as_deref().unwrap_or("unknown")
            );
            push(HitKind::Study, &study.study_instance_uid, text, score);
        }

        for series in self.store.list::<Series>()? {
            let score = best_score(
                query,
                &[series.description.as_deref(), series.modality.as_deref()],
            );
            let text = format!(
                "{}: {}",
                series.modality.as_deref().unwrap_or("unknown"),
                series.description.as_deref().unwrap_or("unknown")
            );
            push(HitKind::Series, &series.series_uid, text, score);
        }

        hits.sort_by(|a, b| b.score.cmp(&a.score));
        hits.truncate(self.limit);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Collection, MemoryStore};
    use rstest::rstest;
    use std::sync::Arc;

    #[rstest]
    #[case("brain", "brain", 100)]
    #[case("", "", 100)]
    #[case("abcd", "wxyz", 0)]
    fn test_ratio(#[case] a: &str, #[case] b: &str, #[case] expected: u8) {
        assert_eq!(ratio(a, b), expected);
    }

    #[test]
    fn test_partial_ratio_finds_substring() {
        assert_eq!(partial_ratio("flair", "ax t2 flair"), 100);
        assert_eq!(partial_ratio("ax t2 flair", "flair"), 100);
        assert_eq!(partial_ratio("", "flair"), 0);
        assert!(partial_ratio("flare", "ax t2 flair") >= 60);
    }

    #[test]
    fn test_token_set_ignores_order_and_punctuation() {
        assert_eq!(token_set_ratio("doe john", "John^Doe"), 100);
        assert_eq!(token_set_ratio("brain mri", "MRI of the brain"), 100);
        assert_eq!(token_set_ratio("", "anything"), 0);
    }

    #[test]
    fn test_fuzzy_score_is_case_insensitive() {
        assert_eq!(fuzzy_score("T1", "AX t1 POST"), 100);
        assert!(fuzzy_score("spine", "brain") < DEFAULT_THRESHOLD);
    }

    fn searcher() -> Searcher {
        let store = EntityStore::new(Arc::new(MemoryStore::new()));
        let patient = Patient {
            patient_id: "P001".to_string(),
            patient_name: Some("Doe^John".to_string()),
            ..Default::default()
        };
        store.upsert(Collection::Patients, "P001", &patient).unwrap();
        let study = Study {
            study_instance_uid: "1.2".to_string(),
            patient_id: "P001".to_string(),
            description: Some("MRI Brain".to_string()),
            study_date: Some("2023-01-15".to_string()),
            ..Default::default()
        };
        store.upsert(Collection::Studies, "1.2", &study).unwrap();
        for (uid, description) in [("1.2.1", "AX T1"), ("1.2.2", "AX FLAIR")] {
            let series = Series {
                series_uid: uid.to_string(),
                study_instance_uid: "1.2".to_string(),
                description: Some(description.to_string()),
                modality: Some("MR".to_string()),
                ..Default::default()
            };
            store.upsert(Collection::Series, uid, &series).unwrap();
        }
        Searcher::new(store)
    }

    #[test]
    fn test_search_patient_by_name() {
        let hits = searcher().search("john doe").unwrap();
        assert_eq!(hits[0].kind, HitKind::Patient);
        assert_eq!(hits[0].id, "P001");
        assert_eq!(hits[0].text, "Doe^John (P001)");
        assert_eq!(hits[0].score, 100);
    }

    #[test]
    fn test_search_across_kinds() {
        let hits = searcher().search("flair").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].kind, HitKind::Series);
        assert_eq!(hits[0].text, "MR: AX FLAIR");

        let hits = searcher().search("brain").unwrap();
        assert_eq!(hits[0].kind, HitKind::Study);
        assert_eq!(hits[0].text, "MRI Brain (2023-01-15)");
    }

    #[test]
    fn test_search_sorted_and_limited() {
        let hits = searcher().search("mr").unwrap();
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));

        let hits = searcher().with_limit(1).search("mr").unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_blank_query_matches_nothing() {
        assert!(searcher().search("   ").unwrap().is_empty());
    }
}
