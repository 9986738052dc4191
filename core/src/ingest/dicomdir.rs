//! Directory index (DICOMDIR) reading
//!
//! Records in the `DirectoryRecordSequence` are visited in stored order;
//! each PATIENT, STUDY and SERIES record opens a new level and every record
//! carrying a `ReferencedFileID` is a leaf under the current levels.

use super::decode::read_header;
use super::parser::{ParseOutcome, RecordParser};
use crate::config::IngestConfig;
use crate::error::{IngestError, Result};
use crate::extraction::{
    get_multi_string_value, get_string_value, DIRECTORY_GROUP, DIRECTORY_RECORD_SEQUENCE,
    DIRECTORY_RECORD_TYPE, REFERENCED_FILE_ID, REFERENCED_SOP_CLASS_UID_IN_FILE,
    REFERENCED_SOP_INSTANCE_UID_IN_FILE, SOP_CLASS_UID, SOP_INSTANCE_UID,
};
use crate::types::ParsedRecord;
use dicom_core::value::PrimitiveValue;
use dicom_core::{DataElement, Tag, VR};
use dicom_object::InMemDicomObject;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One file referenced by an index
#[derive(Debug, Clone)]
pub struct IndexEntry {
    /// Index directory joined with the referenced path components
    pub path: PathBuf,
    /// Attributes of the leaf record and its ancestors, deeper levels
    /// overriding shallower ones; a fallback source for tag resolution
    pub attributes: InMemDicomObject,
    pub referenced_sop_instance_uid: Option<String>,
}

impl IndexEntry {
    /// Logs when the file header disagrees with the index about the SOP instance
    pub fn check_reference(&self, record: &ParsedRecord) {
        if let Some(expected) = &self.referenced_sop_instance_uid {
            if expected != record.sop_instance_uid() {
                warn!(
                    "{}: index references SOP instance {} but file holds {}",
                    self.path.display(),
                    expected,
                    record.sop_instance_uid()
                );
            }
        }
    }
}

/// Decoded directory index
#[derive(Debug, Clone)]
pub struct DirectoryIndex {
    pub path: PathBuf,
    pub entries: Vec<IndexEntry>,
}

fn corrupt(path: &Path, reason: impl Into<String>) -> IngestError {
    IngestError::CorruptIndex {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

fn copy_reference(merged: &mut InMemDicomObject, leaf: &InMemDicomObject, from: Tag, to: Tag) {
    if merged.element(to).is_ok() {
        return;
    }
    if let Some(uid) = get_string_value(leaf, from) {
        merged.put(DataElement::new(to, VR::UI, PrimitiveValue::from(uid)));
    }
}

/// Flattens the records of one leaf into a single dataset
///
/// Directory-structure elements are dropped. The referenced SOP UIDs stand
/// in for the SOP Instance and Class UIDs the records themselves lack.
fn merge_records(levels: &[Option<&InMemDicomObject>]) -> InMemDicomObject {
    let mut merged = InMemDicomObject::new_empty();
    for level in levels.iter().flatten() {
        for elem in level.iter() {
            if elem.header().tag.group() != DIRECTORY_GROUP {
                merged.put(elem.clone());
            }
        }
    }

    if let Some(Some(leaf)) = levels.last() {
        copy_reference(&mut merged, leaf, REFERENCED_SOP_INSTANCE_UID_IN_FILE, SOP_INSTANCE_UID);
        copy_reference(&mut merged, leaf, REFERENCED_SOP_CLASS_UID_IN_FILE, SOP_CLASS_UID);
    }
    merged
}

/// Reads directory indexes and parses the files they reference
pub struct DicomdirParser {
    config: Arc<IngestConfig>,
}

impl DicomdirParser {
    pub fn new(config: Arc<IngestConfig>) -> Self {
        Self { config }
    }

    /// Decodes an index into its referenced files
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::CorruptIndex`] if the index cannot be decoded
    /// or holds no directory record sequence
    pub fn read(&self, index_path: &Path) -> Result<DirectoryIndex> {
        let dcm = read_header(index_path, self.config.read_retries)
            .map_err(|e| corrupt(index_path, e.to_string()))?;
        let records = dcm
            .element(DIRECTORY_RECORD_SEQUENCE)
            .ok()
            .and_then(|elem| elem.items())
            .ok_or_else(|| corrupt(index_path, "no directory record sequence"))?;

        let base = index_path.parent().unwrap_or_else(|| Path::new("."));
        let mut patient = None;
        let mut study = None;
        let mut series = None;
        let mut entries = Vec::new();

        for (position, record) in records.iter().enumerate() {
            let kind = get_string_value(record, DIRECTORY_RECORD_TYPE)
                .unwrap_or_default()
                .to_uppercase();
            match kind.as_str() {
                "PATIENT" => {
                    patient = Some(record);
                    study = None;
                    series = None;
                }
                "STUDY" => {
                    study = Some(record);
                    series = None;
                }
                "SERIES" => series = Some(record),
                _ => {
                    let Some(components) = get_multi_string_value(record, REFERENCED_FILE_ID)
                    else {
                        debug!("Record {} ({}) references no file", position, kind);
                        continue;
                    };
                    let path = components
                        .iter()
                        .filter(|c| !c.is_empty())
                        .fold(base.to_path_buf(), |path, component| path.join(component));

                    entries.push(IndexEntry {
                        path,
                        attributes: merge_records(&[patient, study, series, Some(record)]),
                        referenced_sop_instance_uid: get_string_value(
                            record,
                            REFERENCED_SOP_INSTANCE_UID_IN_FILE,
                        ),
                    });
                }
            }
        }

        info!(
            "Index {} references {} files",
            index_path.display(),
            entries.len()
        );
        Ok(DirectoryIndex {
            path: index_path.to_path_buf(),
            entries,
        })
    }

    /// Parses every file referenced by an index
    ///
    /// Files that cannot be read or parsed are skipped with a warning.
    pub fn parse(&self, index_path: &Path, parser: &mut RecordParser) -> Result<Vec<ParsedRecord>> {
        let index = self.read(index_path)?;
        let mut records = Vec::new();
        for entry in &index.entries {
            let extracted = parser.extract(&entry.path, Some(&entry.attributes));
            if let ParseOutcome::Parsed(record) = parser.resolve(extracted)? {
                entry.check_reference(&record);
                records.push(record);
            }
        }
        Ok(records)
    }
}
