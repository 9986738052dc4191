//! Ingestion pipeline
//!
//! A run plans its sources ([`walker`]), decodes headers ([`decode`]),
//! turns them into entity records ([`parser`], [`dicomdir`]) and finally
//! groups and saves them ([`grouping`]). [`orchestrator`] drives the phases
//! and streams [`IngestEvent`](crate::types::IngestEvent)s.

pub mod decode;
pub mod dicomdir;
pub mod grouping;
pub mod orchestrator;
pub mod parser;
pub mod walker;

pub use decode::{read_header, DecodeError, HeaderLayout};
pub use dicomdir::{DicomdirParser, DirectoryIndex, IndexEntry};
pub use grouping::{group_records, GroupedRecords};
pub use orchestrator::{CancelToken, EventSink, IngestHandle, IngestSummary, Ingestor};
pub use parser::{ParseOutcome, RecordParser, SkipReason, UNIDENTIFIED_PREFIX};
pub use walker::{find_index, normalize_path, DirectoryWalker, ScanSource, INDEX_FILE_NAME};
