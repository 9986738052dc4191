use super::decode::{read_header, DecodeError};
use crate::config::{Domain, IngestConfig};
use crate::error::Result;
use crate::extraction::{normalize_date, normalize_time, parse_date, TagResolver};
use crate::store::EntityStore;
use crate::types::{Instance, ParsedRecord, Patient, PixelSpacing, Series, Study};
use dicom_object::InMemDicomObject;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Prefix of patient IDs generated for records that carry none
pub const UNIDENTIFIED_PREFIX: &str = "UNIDENTIFIED-";

/// Why a file produced no record
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    Unreadable(String),
    NotDicom,
    Undecodable(String),
    /// Decoded, but carries no SOP class (not an image)
    MissingClassUid,
    MissingRequired { domain: Domain, field: String },
}

impl SkipReason {
    fn missing(domain: Domain, field: &str) -> Self {
        if domain == Domain::Instance && field == "class_uid" {
            SkipReason::MissingClassUid
        } else {
            SkipReason::MissingRequired {
                domain,
                field: field.to_string(),
            }
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Unreadable(e) => write!(f, "unreadable: {}", e),
            SkipReason::NotDicom => write!(f, "not a DICOM file"),
            SkipReason::Undecodable(e) => write!(f, "undecodable: {}", e),
            SkipReason::MissingClassUid => write!(f, "no SOP class UID"),
            SkipReason::MissingRequired { domain, field } => {
                write!(f, "required {} tag '{}' is missing", domain, field)
            }
        }
    }
}

/// Result of parsing one file
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Parsed(ParsedRecord),
    Skipped(SkipReason),
}

impl ParseOutcome {
    pub fn record(&self) -> Option<&ParsedRecord> {
        match self {
            ParseOutcome::Parsed(record) => Some(record),
            ParseOutcome::Skipped(_) => None,
        }
    }
}

/// Turns single files into resolved entity records
///
/// Parsing has two halves. [`RecordParser::extract`] decodes the header
/// and builds candidate entities without touching the store, so it can run
/// on many files at once. [`RecordParser::resolve`] then gets or creates
/// each entity; it runs in file order.
///
/// A parser lives for one ingestion run: patient IDs generated for records
/// without one are remembered per study UID for the lifetime of the parser.
pub struct RecordParser {
    config: Arc<IngestConfig>,
    store: EntityStore,
    generated_ids: HashMap<String, String>,
}

impl RecordParser {
    pub fn new(config: Arc<IngestConfig>, store: EntityStore) -> Self {
        Self {
            config,
            store,
            generated_ids: HashMap::new(),
        }
    }

    /// Extracts and resolves one file
    ///
    /// # Errors
    ///
    /// Only storage failures are errors; every per-file problem is a
    /// [`ParseOutcome::Skipped`].
    pub fn parse(&mut self, path: &Path) -> Result<ParseOutcome> {
        let outcome = self.extract(path, None);
        self.resolve(outcome)
    }

    /// Decodes a file and builds its candidate entities
    ///
    /// `fallback` holds attributes known from elsewhere (a directory index)
    /// and is consulted after the file header. When the file exists but
    /// cannot be decoded, the fallback alone is used.
    pub fn extract(&self, path: &Path, fallback: Option<&InMemDicomObject>) -> ParseOutcome {
        let header = match read_header(path, self.config.read_retries) {
            Ok(header) => Some(header),
            Err(DecodeError::Unreadable(e)) => {
                warn!("Skipping unreadable file {}: {}", path.display(), e);
                return ParseOutcome::Skipped(SkipReason::Unreadable(e.to_string()));
            }
            Err(e) if fallback.is_some() => {
                warn!("{}: {}, using index attributes", path.display(), e);
                None
            }
            Err(DecodeError::NotDicom) => {
                debug!("Skipping non-DICOM file {}", path.display());
                return ParseOutcome::Skipped(SkipReason::NotDicom);
            }
            Err(DecodeError::Undecodable(reason)) => {
                warn!("Skipping {}: {}", path.display(), reason);
                return ParseOutcome::Skipped(SkipReason::Undecodable(reason));
            }
        };

        let sources: Vec<&InMemDicomObject> = header.iter().chain(fallback).collect();
        match self.build(&sources, path) {
            Ok(record) => ParseOutcome::Parsed(record),
            Err(reason) => {
                match reason {
                    SkipReason::MissingClassUid => {
                        debug!("Skipping {}: {}", path.display(), reason)
                    }
                    _ => warn!("Skipping {}: {}", path.display(), reason),
                }
                ParseOutcome::Skipped(reason)
            }
        }
    }

    fn build(
        &self,
        sources: &[&InMemDicomObject],
        path: &Path,
    ) -> std::result::Result<ParsedRecord, SkipReason> {
        let tags = &self.config.tags;
        let resolver = TagResolver::new(tags);
        let text = |domain: Domain, field: &str| resolver.resolve(sources, domain, field);
        let key = |domain: Domain, field: &str| {
            text(domain, field).ok_or_else(|| SkipReason::missing(domain, field))
        };

        let sop_class_uid = key(Domain::Instance, "class_uid")?;
        for domain in Domain::ALL {
            for field in tags.required_fields(domain) {
                resolver
                    .require(sources, domain, field)
                    .map_err(|_| SkipReason::missing(domain, field))?;
            }
        }
        let study_instance_uid = key(Domain::Study, "uid")?;
        let series_uid = key(Domain::Series, "uid")?;
        let sop_instance_uid = key(Domain::Instance, "uid")?;

        let patient_id = text(Domain::Patient, "id");
        let modality = text(Domain::Series, "modality");

        let patient = Patient {
            patient_id: patient_id.clone().unwrap_or_default(),
            patient_name: text(Domain::Patient, "name"),
            birth_date: text(Domain::Patient, "birth_date").and_then(|d| parse_date(&d)),
            sex: text(Domain::Patient, "sex"),
            weight: resolver.resolve_parsed(sources, Domain::Patient, "weight"),
            age: text(Domain::Patient, "age"),
            unidentified: patient_id.is_none(),
        };

        let study = Study {
            study_instance_uid: study_instance_uid.clone(),
            patient_id: patient.patient_id.clone(),
            study_date: text(Domain::Study, "date").map(|d| normalize_date(&d)),
            study_time: text(Domain::Study, "time").map(|t| normalize_time(&t)),
            accession_number: text(Domain::Study, "accession_number"),
            description: text(Domain::Study, "description"),
            modalities: modality.iter().cloned().collect(),
            num_series: 1,
            num_instances: 1,
        };

        let series = Series {
            series_uid: series_uid.clone(),
            study_instance_uid,
            series_number: resolver.resolve_parsed(sources, Domain::Series, "number"),
            description: text(Domain::Series, "description"),
            modality,
            body_part: text(Domain::Series, "body_part"),
            protocol_name: text(Domain::Series, "protocol_name"),
            instances: vec![sop_instance_uid.clone()],
        };

        let instance = Instance {
            sop_instance_uid,
            series_uid,
            sop_class_uid,
            instance_number: resolver.resolve_parsed(sources, Domain::Instance, "number"),
            file_path: path.to_string_lossy().into_owned(),
            relative_path: self.relative_path(path),
            rows: resolver.resolve_parsed(sources, Domain::Instance, "rows"),
            columns: resolver.resolve_parsed(sources, Domain::Instance, "columns"),
            pixel_spacing: text(Domain::Instance, "pixel_spacing")
                .and_then(|s| PixelSpacing::parse(&s).ok()),
            slice_location: resolver.resolve_parsed(sources, Domain::Instance, "position"),
            slice_thickness: resolver.resolve_parsed(sources, Domain::Instance, "thickness"),
        };

        Ok(ParsedRecord {
            patient,
            study,
            series,
            instance,
        })
    }

    fn relative_path(&self, path: &Path) -> Option<String> {
        let base = self.config.base_dir.as_deref()?;
        let relative = path.strip_prefix(base).ok()?;
        let parts: Vec<_> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect();
        Some(parts.join("/"))
    }

    /// Gets or creates the entities of an extracted record
    ///
    /// Returns the stored entities, which differ from the candidates when
    /// an earlier write for the same key won.
    pub fn resolve(&mut self, outcome: ParseOutcome) -> Result<ParseOutcome> {
        let mut record = match outcome {
            ParseOutcome::Parsed(record) => record,
            skipped => return Ok(skipped),
        };

        if record.patient.unidentified {
            let id = self.generated_patient_id(&record.study.study_instance_uid)?;
            record.patient.unidentified = id.starts_with(UNIDENTIFIED_PREFIX);
            record.patient.patient_id = id.clone();
            record.study.patient_id = id;
        }

        let (patient, _) = self.store.get_or_create(record.patient)?;
        let (study, _) = self.store.get_or_create(record.study)?;
        let (series, _) = self.store.get_or_create(record.series)?;
        let (instance, created) = self.store.get_or_create(record.instance)?;
        if !created {
            debug!(
                "Instance {} already stored from {}",
                instance.sop_instance_uid, instance.file_path
            );
        }

        Ok(ParseOutcome::Parsed(ParsedRecord {
            patient,
            study,
            series,
            instance,
        }))
    }

    /// Patient ID for a record without one, stable per study UID
    ///
    /// A study already in the store keeps its patient; otherwise a fresh
    /// ID is generated once per run.
    fn generated_patient_id(&mut self, study_uid: &str) -> Result<String> {
        if let Some(id) = self.generated_ids.get(study_uid) {
            return Ok(id.clone());
        }

        let id = match self.store.find::<Study>(study_uid)? {
            Some(study) => study.patient_id,
            None => {
                let id = format!("{}{}", UNIDENTIFIED_PREFIX, Uuid::new_v4());
                info!("Study {} has no patient ID, assigned {}", study_uid, id);
                id
            }
        };
        self.generated_ids.insert(study_uid.to_string(), id.clone());
        Ok(id)
    }
}
