//! Core type definitions for ingested imaging metadata
//!
//! - [`Patient`], [`Study`], [`Series`], [`Instance`]: stored entities, one
//!   collection each, keyed by natural key
//! - [`ParsedRecord`]: the four entities resolved from one file
//! - [`StudyDocument`]: end-of-run study view with series and instances embedded
//! - [`IngestEvent`]: progress stream of an ingestion run
//! - [`PixelSpacing`]: physical pixel size in millimetres

mod documents;
mod entities;
mod events;
mod pixel_spacing;

pub use documents::{InstanceDocument, SeriesDocument, StudyDocument};
pub use entities::{Instance, ParsedRecord, Patient, Series, Study};
pub use events::{IngestEvent, IngestPhase};
pub use pixel_spacing::PixelSpacing;
