use super::PixelSpacing;
use crate::store::{Collection, Entity};
use serde::{Deserialize, Serialize};

/// Patient record, keyed by `patient_id`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub patient_id: String,
    pub patient_name: Option<String>,
    /// ISO `YYYY-MM-DD`
    pub birth_date: Option<String>,
    pub sex: Option<String>,
    pub weight: Option<f64>,
    pub age: Option<String>,
    /// Set when `patient_id` was generated for a record lacking one
    #[serde(default)]
    pub unidentified: bool,
}

/// Study record, keyed by `study_instance_uid`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Study {
    pub study_instance_uid: String,
    pub patient_id: String,
    pub study_date: Option<String>,
    pub study_time: Option<String>,
    pub accession_number: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub modalities: Vec<String>,
    #[serde(default)]
    pub num_series: usize,
    #[serde(default)]
    pub num_instances: usize,
}

/// Series record, keyed by `series_uid`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub series_uid: String,
    pub study_instance_uid: String,
    pub series_number: Option<i32>,
    pub description: Option<String>,
    pub modality: Option<String>,
    pub body_part: Option<String>,
    pub protocol_name: Option<String>,
    /// SOP instance UIDs in instance order
    #[serde(default)]
    pub instances: Vec<String>,
}

/// Instance record, keyed by `sop_instance_uid`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub sop_instance_uid: String,
    pub series_uid: String,
    pub sop_class_uid: String,
    pub instance_number: Option<i32>,
    pub file_path: String,
    pub relative_path: Option<String>,
    pub rows: Option<u16>,
    pub columns: Option<u16>,
    pub pixel_spacing: Option<PixelSpacing>,
    pub slice_location: Option<f64>,
    pub slice_thickness: Option<f64>,
}

impl Entity for Patient {
    const COLLECTION: Collection = Collection::Patients;

    fn natural_key(&self) -> &str {
        &self.patient_id
    }
}

impl Entity for Study {
    const COLLECTION: Collection = Collection::Studies;

    fn natural_key(&self) -> &str {
        &self.study_instance_uid
    }
}

impl Entity for Series {
    const COLLECTION: Collection = Collection::Series;

    fn natural_key(&self) -> &str {
        &self.series_uid
    }
}

impl Entity for Instance {
    const COLLECTION: Collection = Collection::Instances;

    fn natural_key(&self) -> &str {
        &self.sop_instance_uid
    }
}

/// The four resolved entities of one successfully parsed file
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRecord {
    pub patient: Patient,
    pub study: Study,
    pub series: Series,
    pub instance: Instance,
}

impl ParsedRecord {
    pub fn sop_instance_uid(&self) -> &str {
        &self.instance.sop_instance_uid
    }
}
