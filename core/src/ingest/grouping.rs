use crate::types::{
    Instance, InstanceDocument, ParsedRecord, Patient, Series, SeriesDocument, Study, StudyDocument,
};
use log::debug;
use std::collections::{BTreeMap, HashSet};

/// End-of-run state derived from the parsed records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupedRecords {
    pub patients: Vec<Patient>,
    /// Series with their instance lists rebuilt
    pub series: Vec<Series>,
    /// Ordered by study instance UID
    pub studies: Vec<StudyDocument>,
}

struct SeriesBucket {
    series: Series,
    instances: Vec<Instance>,
}

struct StudyBucket {
    study: Study,
    series: BTreeMap<String, SeriesBucket>,
}

fn instance_order(instance: &Instance) -> (bool, Option<i32>, &str) {
    (
        instance.instance_number.is_none(),
        instance.instance_number,
        &instance.sop_instance_uid,
    )
}

fn series_order(series: &Series) -> (bool, Option<i32>, &str) {
    (
        series.series_number.is_none(),
        series.series_number,
        &series.series_uid,
    )
}

/// Buckets records by study and series and builds the study documents
///
/// Instances are deduplicated by SOP instance UID across all records, the
/// first occurrence winning. Series are ordered by series number and
/// instances by instance number; missing numbers sort last and UIDs break
/// ties. Modality sets and counters are recomputed from what remains.
pub fn group_records(records: &[ParsedRecord]) -> GroupedRecords {
    let mut seen = HashSet::new();
    let mut patients: BTreeMap<String, Patient> = BTreeMap::new();
    let mut studies: BTreeMap<String, StudyBucket> = BTreeMap::new();

    for record in records {
        if !seen.insert(record.sop_instance_uid()) {
            debug!(
                "Dropping duplicate instance {} from {}",
                record.sop_instance_uid(),
                record.instance.file_path
            );
            continue;
        }

        patients
            .entry(record.patient.patient_id.clone())
            .or_insert_with(|| record.patient.clone());

        let study = studies
            .entry(record.study.study_instance_uid.clone())
            .or_insert_with(|| StudyBucket {
                study: record.study.clone(),
                series: BTreeMap::new(),
            });
        study
            .series
            .entry(record.series.series_uid.clone())
            .or_insert_with(|| SeriesBucket {
                series: record.series.clone(),
                instances: Vec::new(),
            })
            .instances
            .push(record.instance.clone());
    }

    let mut grouped = GroupedRecords {
        patients: patients.into_values().collect(),
        ..Default::default()
    };

    for bucket in studies.into_values() {
        let mut series_buckets: Vec<SeriesBucket> = bucket.series.into_values().collect();
        series_buckets.sort_by(|a, b| series_order(&a.series).cmp(&series_order(&b.series)));

        let mut series_docs = Vec::with_capacity(series_buckets.len());
        for mut series_bucket in series_buckets {
            series_bucket
                .instances
                .sort_by(|a, b| instance_order(a).cmp(&instance_order(b)));

            let mut series = series_bucket.series;
            series.study_instance_uid = bucket.study.study_instance_uid.clone();
            series.instances = series_bucket
                .instances
                .iter()
                .map(|i| i.sop_instance_uid.clone())
                .collect();

            let instances = series_bucket
                .instances
                .iter()
                .map(InstanceDocument::from)
                .collect();
            series_docs.push(SeriesDocument::from_series(&series, instances));
            grouped.series.push(series);
        }

        grouped
            .studies
            .push(StudyDocument::from_study(&bucket.study, series_docs));
    }

    grouped
}
