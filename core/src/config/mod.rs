//! Ingestion configuration
//!
//! Built once at process start and handed to the walker, parser and
//! orchestrator by reference. Nothing in the crate reads ambient state.

mod tags;

pub use tags::{parse_tag, Domain, TagConfig, TagOverrides, TagSpec};

use crate::error::{IngestError, Result};
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const DEFAULTS: &str = include_str!("defaults.toml");

/// Settings shared by every component of an ingestion run
///
/// # Example
///
/// ```
/// use neuroimg_core::IngestConfig;
///
/// let config = IngestConfig::default()
///     .with_base_dir("/data/dicom")
///     .with_progress_interval(10)
///     .with_workers(4);
///
/// assert_eq!(config.progress_interval, 10);
/// assert_eq!(config.workers, 4);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct IngestConfig {
    /// Semantic field → attribute tables
    pub tags: TagConfig,

    /// Prefix stripped from file paths to derive `relative_path`
    pub base_dir: Option<PathBuf>,

    /// Emit a progress event every N processed files
    pub progress_interval: usize,

    /// Files decoded per batch
    pub batch_size: usize,

    /// Decode threads per run (1 = sequential)
    pub workers: usize,

    /// Extra attempts when a file cannot be opened
    pub read_retries: u32,

    /// Capacity of the progress event channel
    pub channel_capacity: usize,

    /// Ignore dot-files and dot-directories while walking
    pub skip_hidden: bool,

    /// Case-insensitive extension whitelist; `None` accepts every file
    pub extensions: Option<Vec<String>>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            tags: TagConfig::default(),
            base_dir: None,
            progress_interval: 1,
            batch_size: 64,
            workers: 1,
            read_retries: 1,
            channel_capacity: 256,
            skip_hidden: true,
            extensions: None,
        }
    }
}

/// On-disk shape of the configuration
#[derive(Debug, Deserialize)]
struct RawConfig {
    base_dir: Option<PathBuf>,
    progress_interval: usize,
    batch_size: usize,
    workers: usize,
    read_retries: u32,
    channel_capacity: usize,
    skip_hidden: bool,
    #[serde(default)]
    extensions: Option<Vec<String>>,
    #[serde(default)]
    tags: BTreeMap<String, BTreeMap<String, TagSpec>>,
}

impl IngestConfig {
    /// Loads built-in defaults, then the optional TOML file, then
    /// `NEUROIMG_*` environment variables (`__` separates nested keys)
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or any value fails to parse
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Self::defaults_builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix("NEUROIMG")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );
        Self::build(builder)
    }

    /// Parses a TOML document layered over the built-in defaults
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let builder = Self::defaults_builder().add_source(File::from_str(toml, FileFormat::Toml));
        Self::build(builder)
    }

    fn defaults_builder() -> ConfigBuilder<config::builder::DefaultState> {
        Config::builder().add_source(File::from_str(DEFAULTS, FileFormat::Toml))
    }

    fn build(builder: ConfigBuilder<config::builder::DefaultState>) -> Result<Self> {
        let raw: RawConfig = builder.build()?.try_deserialize()?;

        let mut overrides = TagOverrides::new();
        for (name, fields) in raw.tags {
            let domain = Domain::from_name(&name).ok_or_else(|| {
                IngestError::ConfigError(format!("Unknown tag domain '{}'", name))
            })?;
            overrides.insert(domain, fields);
        }
        let mut tags = TagConfig::default();
        tags.merge(overrides);

        Ok(Self {
            tags,
            base_dir: raw.base_dir,
            progress_interval: raw.progress_interval.max(1),
            batch_size: raw.batch_size.max(1),
            workers: raw.workers.max(1),
            read_retries: raw.read_retries,
            channel_capacity: raw.channel_capacity.max(1),
            skip_hidden: raw.skip_hidden,
            extensions: raw.extensions,
        })
    }

    /// Builder: set the base directory for relative paths
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    /// Builder: set the progress interval
    pub fn with_progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = interval.max(1);
        self
    }

    /// Builder: set the number of decode threads
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Builder: set the decode batch size
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Builder: restrict candidate files to the given extensions
    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = Some(extensions);
        self
    }

    /// Builder: replace the tag tables
    pub fn with_tags(mut self, tags: TagConfig) -> Self {
        self.tags = tags;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicom_core::Tag;

    #[test]
    fn test_defaults_match_builtin_toml() {
        let parsed = IngestConfig::from_toml_str("").unwrap();
        assert_eq!(parsed, IngestConfig::default());
    }

    #[test]
    fn test_toml_overrides() {
        let config = IngestConfig::from_toml_str(
            r#"
            base_dir = "/mnt/pacs"
            progress_interval = 25
            workers = 0
            extensions = ["dcm", "ima"]

            [tags.patient.id]
            keyword = "OtherPatientIDs"
            tag = "0010,1000"
            required = true
            "#,
        )
        .unwrap();

        assert_eq!(config.base_dir, Some(PathBuf::from("/mnt/pacs")));
        assert_eq!(config.progress_interval, 25);
        // zero workers is clamped to sequential decoding
        assert_eq!(config.workers, 1);
        assert_eq!(config.extensions, Some(vec!["dcm".to_string(), "ima".to_string()]));

        let spec = config.tags.get(Domain::Patient, "id").unwrap();
        assert_eq!(spec.tag, Tag(0x0010, 0x1000));
        assert!(spec.required);
        assert_eq!(config.tags.get(Domain::Study, "uid").unwrap().keyword, "StudyInstanceUID");
    }

    #[test]
    fn test_unknown_domain_is_rejected() {
        let result = IngestConfig::from_toml_str(
            r#"
            [tags.equipment.model]
            keyword = "ManufacturerModelName"
            tag = "0008,1090"
            "#,
        );
        assert!(matches!(result, Err(IngestError::ConfigError(_))));
    }

    #[test]
    fn test_invalid_tag_in_toml_is_rejected() {
        let result = IngestConfig::from_toml_str(
            r#"
            [tags.series.uid]
            keyword = "SeriesInstanceUID"
            tag = "not-a-tag"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("neuroimg.toml");
        std::fs::write(&path, "batch_size = 8\nskip_hidden = false\n").unwrap();

        let config = IngestConfig::load(Some(&path)).unwrap();
        assert_eq!(config.batch_size, 8);
        assert!(!config.skip_hidden);
    }
}
