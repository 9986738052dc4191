//! On-disk fixtures for tests: DICOM files and DICOMDIR indexes

use crate::extraction::{
    DIRECTORY_RECORD_SEQUENCE, DIRECTORY_RECORD_TYPE, MEDIA_STORAGE_DIRECTORY_SOP_CLASS,
    REFERENCED_FILE_ID, REFERENCED_SOP_CLASS_UID_IN_FILE, REFERENCED_SOP_INSTANCE_UID_IN_FILE,
};
use dicom_core::value::{DataSetSequence, PrimitiveValue};
use dicom_core::{DataElement, Tag, VR};
use dicom_dictionary_std::tags;
use dicom_object::{FileMetaTableBuilder, InMemDicomObject};
use std::fs;
use std::path::{Path, PathBuf};

pub const MR_IMAGE_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.4";
const EXPLICIT_VR_LE: &str = "1.2.840.10008.1.2.1";

/// Header contents of a fixture file
#[derive(Debug, Clone)]
pub struct FileSpec {
    pub patient_id: Option<String>,
    pub patient_name: Option<String>,
    pub study_uid: Option<String>,
    pub study_date: Option<String>,
    pub study_description: Option<String>,
    pub series_uid: Option<String>,
    pub series_number: Option<i32>,
    pub series_description: Option<String>,
    pub modality: Option<String>,
    pub sop_uid: Option<String>,
    pub sop_class_uid: Option<String>,
    pub instance_number: Option<i32>,
}

impl FileSpec {
    pub fn new(patient_id: &str, study_uid: &str, series_uid: &str, sop_uid: &str) -> Self {
        Self {
            patient_id: Some(patient_id.to_string()),
            patient_name: Some("Doe^Jane".to_string()),
            study_uid: Some(study_uid.to_string()),
            study_date: Some("20230115".to_string()),
            study_description: Some("MRI BRAIN".to_string()),
            series_uid: Some(series_uid.to_string()),
            series_number: Some(1),
            series_description: Some("AX T1".to_string()),
            modality: Some("MR".to_string()),
            sop_uid: Some(sop_uid.to_string()),
            sop_class_uid: Some(MR_IMAGE_STORAGE.to_string()),
            instance_number: Some(1),
        }
    }

    pub fn without_patient_id(mut self) -> Self {
        self.patient_id = None;
        self
    }

    pub fn without_sop_uid(mut self) -> Self {
        self.sop_uid = None;
        self
    }

    pub fn without_sop_class(mut self) -> Self {
        self.sop_class_uid = None;
        self
    }

    pub fn with_instance_number(mut self, number: i32) -> Self {
        self.instance_number = Some(number);
        self
    }

    pub fn with_series(mut self, number: i32, description: &str, modality: &str) -> Self {
        self.series_number = Some(number);
        self.series_description = Some(description.to_string());
        self.modality = Some(modality.to_string());
        self
    }

    pub fn to_object(&self) -> InMemDicomObject {
        let text = [
            (tags::SOP_CLASS_UID, VR::UI, &self.sop_class_uid),
            (tags::SOP_INSTANCE_UID, VR::UI, &self.sop_uid),
            (tags::STUDY_DATE, VR::DA, &self.study_date),
            (tags::MODALITY, VR::CS, &self.modality),
            (tags::STUDY_DESCRIPTION, VR::LO, &self.study_description),
            (tags::SERIES_DESCRIPTION, VR::LO, &self.series_description),
            (tags::PATIENT_NAME, VR::PN, &self.patient_name),
            (tags::PATIENT_ID, VR::LO, &self.patient_id),
            (tags::STUDY_INSTANCE_UID, VR::UI, &self.study_uid),
            (tags::SERIES_INSTANCE_UID, VR::UI, &self.series_uid),
        ];
        let numbers = [
            (tags::SERIES_NUMBER, self.series_number),
            (tags::INSTANCE_NUMBER, self.instance_number),
        ];

        let elements = text
            .into_iter()
            .filter_map(|(tag, vr, value)| {
                value
                    .as_deref()
                    .map(|v| DataElement::new(tag, vr, PrimitiveValue::from(v)))
            })
            .chain(numbers.into_iter().filter_map(|(tag, value)| {
                value.map(|v| DataElement::new(tag, VR::IS, PrimitiveValue::from(v.to_string())))
            }));
        InMemDicomObject::from_element_iter(elements)
    }
}

fn write_object(path: &Path, obj: InMemDicomObject, sop_class: &str, sop_uid: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let meta = FileMetaTableBuilder::new()
        .media_storage_sop_class_uid(sop_class)
        .media_storage_sop_instance_uid(sop_uid)
        .transfer_syntax(EXPLICIT_VR_LE);
    obj.with_meta(meta).unwrap().write_to_file(path).unwrap();
}

/// Writes `spec` as a DICOM file at `dir/name`, creating parent directories
pub fn write_dicom(dir: &Path, name: &str, spec: &FileSpec) -> PathBuf {
    let path = dir.join(name);
    let sop_class = spec.sop_class_uid.as_deref().unwrap_or(MR_IMAGE_STORAGE);
    let sop_uid = spec.sop_uid.as_deref().unwrap_or("2.25.1");
    write_object(&path, spec.to_object(), sop_class, sop_uid);
    path
}

fn text_element(tag: Tag, vr: VR, value: &str) -> DataElement<InMemDicomObject> {
    DataElement::new(tag, vr, PrimitiveValue::from(value))
}

fn record(kind: &str, mut elements: Vec<DataElement<InMemDicomObject>>) -> InMemDicomObject {
    elements.push(text_element(DIRECTORY_RECORD_TYPE, VR::CS, kind));
    InMemDicomObject::from_element_iter(elements)
}

/// Builds the directory records for files given with their path components
///
/// PATIENT, STUDY and SERIES records are emitted whenever the key changes
/// from the previous entry, so entries must be grouped.
pub fn directory_records(entries: &[(&FileSpec, Vec<&str>)]) -> Vec<InMemDicomObject> {
    let mut records = Vec::new();
    let mut patient: Option<Option<String>> = None;
    let mut study: Option<Option<String>> = None;
    let mut series: Option<Option<String>> = None;

    for (spec, components) in entries {
        if patient.as_ref() != Some(&spec.patient_id) {
            patient = Some(spec.patient_id.clone());
            let mut elements = Vec::new();
            if let Some(id) = &spec.patient_id {
                elements.push(text_element(tags::PATIENT_ID, VR::LO, id));
            }
            if let Some(name) = &spec.patient_name {
                elements.push(text_element(tags::PATIENT_NAME, VR::PN, name));
            }
            records.push(record("PATIENT", elements));
            study = None;
        }
        if study.as_ref() != Some(&spec.study_uid) {
            study = Some(spec.study_uid.clone());
            let mut elements = Vec::new();
            if let Some(uid) = &spec.study_uid {
                elements.push(text_element(tags::STUDY_INSTANCE_UID, VR::UI, uid));
            }
            if let Some(date) = &spec.study_date {
                elements.push(text_element(tags::STUDY_DATE, VR::DA, date));
            }
            if let Some(description) = &spec.study_description {
                elements.push(text_element(tags::STUDY_DESCRIPTION, VR::LO, description));
            }
            records.push(record("STUDY", elements));
            series = None;
        }
        if series.as_ref() != Some(&spec.series_uid) {
            series = Some(spec.series_uid.clone());
            let mut elements = Vec::new();
            if let Some(uid) = &spec.series_uid {
                elements.push(text_element(tags::SERIES_INSTANCE_UID, VR::UI, uid));
            }
            if let Some(modality) = &spec.modality {
                elements.push(text_element(tags::MODALITY, VR::CS, modality));
            }
            if let Some(number) = spec.series_number {
                elements.push(text_element(tags::SERIES_NUMBER, VR::IS, &number.to_string()));
            }
            records.push(record("SERIES", elements));
        }

        let mut elements = vec![DataElement::new(
            REFERENCED_FILE_ID,
            VR::CS,
            PrimitiveValue::Strs(
                components
                    .iter()
                    .map(|c| c.to_string())
                    .collect::<Vec<_>>()
                    .into(),
            ),
        )];
        if let Some(uid) = &spec.sop_uid {
            elements.push(text_element(REFERENCED_SOP_INSTANCE_UID_IN_FILE, VR::UI, uid));
        }
        if let Some(class) = &spec.sop_class_uid {
            elements.push(text_element(REFERENCED_SOP_CLASS_UID_IN_FILE, VR::UI, class));
        }
        if let Some(number) = spec.instance_number {
            elements.push(text_element(tags::INSTANCE_NUMBER, VR::IS, &number.to_string()));
        }
        records.push(record("IMAGE", elements));
    }
    records
}

/// Writes a DICOMDIR holding the given directory records into `dir`
pub fn write_dicomdir(dir: &Path, records: Vec<InMemDicomObject>) -> PathBuf {
    let path = dir.join("DICOMDIR");
    let obj = InMemDicomObject::from_element_iter([
        text_element(Tag(0x0004, 0x1130), VR::CS, "TESTMEDIA"),
        DataElement::new(
            DIRECTORY_RECORD_SEQUENCE,
            VR::SQ,
            DataSetSequence::from(records),
        ),
    ]);
    write_object(&path, obj, MEDIA_STORAGE_DIRECTORY_SOP_CLASS, "2.25.100");
    path
}
