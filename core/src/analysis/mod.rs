//! Downstream views over an ingested store
//!
//! [`DatasetAnalyzer`] summarizes which MRI sequences each study carries;
//! [`search`] provides fuzzy lookup across patients, studies and series.

pub mod search;
pub mod sequences;

pub use search::{fuzzy_score, HitKind, SearchHit, Searcher};
pub use sequences::SequenceType;

use crate::store::{EntityStore, StoreResult};
use crate::types::{Series, Study};
use log::debug;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Sequence composition of a stored dataset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DatasetAnalysis {
    pub total_studies: usize,
    /// Studies carrying every [`SequenceType`]
    pub complete_studies: usize,
    /// Classified series per sequence type; unclassified series are not counted
    pub sequence_counts: BTreeMap<SequenceType, usize>,
}

/// Analyzes the studies held by an [`EntityStore`]
pub struct DatasetAnalyzer {
    store: EntityStore,
}

impl DatasetAnalyzer {
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }

    pub fn analyze(&self) -> StoreResult<DatasetAnalysis> {
        let mut analysis = DatasetAnalysis::default();

        for study in self.store.list::<Study>()? {
            analysis.total_studies += 1;

            let series: Vec<Series> = self
                .store
                .find_by("study_instance_uid", &study.study_instance_uid)?;
            let mut found = BTreeSet::new();
            for seq in series
                .iter()
                .filter_map(|s| s.description.as_deref().and_then(SequenceType::classify))
            {
                *analysis.sequence_counts.entry(seq).or_insert(0) += 1;
                found.insert(seq);
            }

            if SequenceType::ALL.iter().all(|seq| found.contains(seq)) {
                analysis.complete_studies += 1;
            } else {
                debug!(
                    "Study {} has {} of {} sequences",
                    study.study_instance_uid,
                    found.len(),
                    SequenceType::ALL.len()
                );
            }
        }

        Ok(analysis)
    }
}
