use super::{Instance, Series, Study};
use serde::{Deserialize, Serialize};

/// End-of-run view of one study with its series and instances embedded
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudyDocument {
    pub study_instance_uid: String,
    pub patient_id: String,
    pub study_date: Option<String>,
    pub study_time: Option<String>,
    pub accession_number: Option<String>,
    pub description: Option<String>,
    pub modalities: Vec<String>,
    pub series: Vec<SeriesDocument>,
    pub num_series: usize,
    pub num_instances: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesDocument {
    pub series_uid: String,
    pub series_number: Option<i32>,
    pub description: Option<String>,
    pub modality: Option<String>,
    pub instances: Vec<InstanceDocument>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstanceDocument {
    pub sop_instance_uid: String,
    pub instance_number: Option<i32>,
    pub file_path: String,
}

impl From<&Instance> for InstanceDocument {
    fn from(instance: &Instance) -> Self {
        Self {
            sop_instance_uid: instance.sop_instance_uid.clone(),
            instance_number: instance.instance_number,
            file_path: instance.file_path.clone(),
        }
    }
}

impl SeriesDocument {
    pub fn from_series(series: &Series, instances: Vec<InstanceDocument>) -> Self {
        Self {
            series_uid: series.series_uid.clone(),
            series_number: series.series_number,
            description: series.description.clone(),
            modality: series.modality.clone(),
            instances,
        }
    }
}

impl StudyDocument {
    /// Builds a document from a study and its series, recomputing the
    /// modality set and the series and instance counters
    pub fn from_study(study: &Study, series: Vec<SeriesDocument>) -> Self {
        let mut modalities: Vec<String> =
            series.iter().filter_map(|s| s.modality.clone()).collect();
        modalities.sort();
        modalities.dedup();

        let num_instances = series.iter().map(|s| s.instances.len()).sum();

        Self {
            study_instance_uid: study.study_instance_uid.clone(),
            patient_id: study.patient_id.clone(),
            study_date: study.study_date.clone(),
            study_time: study.study_time.clone(),
            accession_number: study.accession_number.clone(),
            description: study.description.clone(),
            modalities,
            num_series: series.len(),
            num_instances,
            series,
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    fn series_doc(uid: &str, modality: Option<&str>, instances: usize) -> SeriesDocument {
        SeriesDocument {
            series_uid: uid.to_string(),
            modality: modality.map(str::to_string),
            instances: (0..instances)
                .map(|i| InstanceDocument {
                    sop_instance_uid: format!("{}.{}", uid, i),
                    instance_number: Some(i as i32 + 1),
                    file_path: format!("/data/{}/{}.dcm", uid, i),
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_study_document_recomputes_aggregates() {
        let study = Study {
            study_instance_uid: "1.2".to_string(),
            patient_id: "P1".to_string(),
            modalities: vec!["XA".to_string()],
            num_series: 99,
            ..Default::default()
        };
        let doc = StudyDocument::from_study(
            &study,
            vec![
                series_doc("1.2.1", Some("MR"), 3),
                series_doc("1.2.2", Some("CT"), 1),
                series_doc("1.2.3", Some("MR"), 2),
                series_doc("1.2.4", None, 1),
            ],
        );

        assert_eq!(doc.modalities, vec!["CT".to_string(), "MR".to_string()]);
        assert_eq!(doc.num_series, 4);
        assert_eq!(doc.num_instances, 7);
    }

    #[test]
    fn test_study_document_json_shape() {
        let doc = StudyDocument::from_study(
            &Study {
                study_instance_uid: "1.2".to_string(),
                patient_id: "P1".to_string(),
                ..Default::default()
            },
            vec![series_doc("1.2.1", Some("MR"), 1)],
        );
        let value = serde_json::to_value(&doc).unwrap();

        assert_eq!(value["num_series"], 1);
        assert_eq!(value["series"][0]["series_uid"], "1.2.1");
        assert_eq!(value["series"][0]["instances"][0]["sop_instance_uid"], "1.2.1.0");
        assert_eq!(value["series"][0]["instances"][0]["file_path"], "/data/1.2.1/0.dcm");
    }
}
