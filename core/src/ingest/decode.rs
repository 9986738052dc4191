//! Header decoding with tolerance for missing preambles
//!
//! Files are sniffed before decoding: a standard file has `DICM` at offset
//! 128, some writers drop the preamble and start at `DICM`, and bare
//! datasets carry no meta group at all. Bare datasets are read as little
//! endian, explicit VR when the first element carries a VR code.

use dicom::transfer_syntax::entries::{EXPLICIT_VR_LITTLE_ENDIAN, IMPLICIT_VR_LITTLE_ENDIAN};
use dicom_dictionary_std::tags::PIXEL_DATA;
use dicom_object::{InMemDicomObject, OpenFileOptions};
use log::debug;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use std::thread;
use std::time::Duration;
use thiserror::Error;

const PREAMBLE_LEN: usize = 128;
const MAGIC: &[u8; 4] = b"DICM";
const HEAD_LEN: usize = PREAMBLE_LEN + MAGIC.len();
const RETRY_DELAY: Duration = Duration::from_millis(50);

/// Why a file could not be turned into a header
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("cannot read file: {0}")]
    Unreadable(#[from] io::Error),

    #[error("not a DICOM file")]
    NotDicom,

    #[error("cannot decode header: {0}")]
    Undecodable(String),
}

/// Byte layout detected at the start of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderLayout {
    /// 128-byte preamble followed by `DICM`
    Preamble,
    /// `DICM` at offset 0
    Magic,
    /// Dataset without meta group, implicit VR little endian
    RawImplicit,
    /// Dataset without meta group, explicit VR little endian
    RawExplicit,
}

impl HeaderLayout {
    /// Detects the layout from the first bytes of a file
    pub fn detect(head: &[u8]) -> Option<Self> {
        if head.len() >= HEAD_LEN && &head[PREAMBLE_LEN..HEAD_LEN] == MAGIC {
            return Some(HeaderLayout::Preamble);
        }
        if head.starts_with(MAGIC) {
            return Some(HeaderLayout::Magic);
        }
        if head.len() < 8 {
            return None;
        }

        // bare datasets open on an even group between identification and image pixel
        let group = u16::from_le_bytes([head[0], head[1]]);
        if group % 2 != 0 || !(0x0008..=0x0028).contains(&group) {
            return None;
        }
        if head[4..6].iter().all(u8::is_ascii_uppercase) {
            Some(HeaderLayout::RawExplicit)
        } else {
            Some(HeaderLayout::RawImplicit)
        }
    }

    fn offset(self) -> u64 {
        match self {
            HeaderLayout::Preamble => PREAMBLE_LEN as u64,
            _ => 0,
        }
    }
}

fn open_with_retry(path: &Path, retries: u32) -> io::Result<File> {
    let mut attempt = 0;
    loop {
        match File::open(path) {
            Ok(file) => return Ok(file),
            Err(e) if attempt < retries => {
                debug!("Retrying open of {}: {}", path.display(), e);
                attempt += 1;
                thread::sleep(RETRY_DELAY);
            }
            Err(e) => return Err(e),
        }
    }
}

/// Decodes the header of a file, stopping before pixel data
///
/// Opening is retried `retries` times before the file counts as unreadable.
pub fn read_header(path: &Path, retries: u32) -> Result<InMemDicomObject, DecodeError> {
    let mut file = open_with_retry(path, retries)?;

    let mut head = Vec::with_capacity(HEAD_LEN);
    (&mut file).take(HEAD_LEN as u64).read_to_end(&mut head)?;
    let layout = HeaderLayout::detect(&head).ok_or(DecodeError::NotDicom)?;
    debug!("{} has layout {:?}", path.display(), layout);

    file.seek(SeekFrom::Start(layout.offset()))?;
    let reader = BufReader::new(file);

    match layout {
        HeaderLayout::Preamble | HeaderLayout::Magic => OpenFileOptions::new()
            .read_until(PIXEL_DATA)
            .from_reader(reader)
            .map(|obj| obj.into_inner())
            .map_err(|e| DecodeError::Undecodable(e.to_string())),
        HeaderLayout::RawExplicit => {
            InMemDicomObject::read_dataset_with_ts(reader, &EXPLICIT_VR_LITTLE_ENDIAN.erased())
                .map_err(|e| DecodeError::Undecodable(e.to_string()))
        }
        HeaderLayout::RawImplicit => {
            InMemDicomObject::read_dataset_with_ts(reader, &IMPLICIT_VR_LITTLE_ENDIAN.erased())
                .map_err(|e| DecodeError::Undecodable(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::{get_string_value, SOP_INSTANCE_UID};
    use crate::test_support::{write_dicom, FileSpec};
    use rstest::rstest;
    use tempfile::TempDir;

    fn with_preamble() -> Vec<u8> {
        let mut bytes = vec![0u8; PREAMBLE_LEN];
        bytes.extend_from_slice(b"DICM\x02\x00\x00\x00");
        bytes
    }

    #[rstest]
    #[case::preamble(with_preamble(), Some(HeaderLayout::Preamble))]
    #[case::magic(b"DICM\x02\x00\x01\x00UL".to_vec(), Some(HeaderLayout::Magic))]
    #[case::explicit(
        b"\x08\x00\x05\x00CS\x0a\x00ISO_IR 100".to_vec(),
        Some(HeaderLayout::RawExplicit)
    )]
    #[case::implicit(
        b"\x08\x00\x16\x00\x1a\x00\x00\x001.2".to_vec(),
        Some(HeaderLayout::RawImplicit)
    )]
    #[case::text(b"patient notes, not an image".to_vec(), None)]
    #[case::odd_group(b"\x09\x00\x10\x00LO\x04\x00ACME".to_vec(), None)]
    #[case::short(b"\x08\x00".to_vec(), None)]
    fn test_detect_layout(#[case] head: Vec<u8>, #[case] expected: Option<HeaderLayout>) {
        assert_eq!(HeaderLayout::detect(&head), expected);
    }

    #[test]
    fn test_read_standard_file() {
        let dir = TempDir::new().unwrap();
        let path = write_dicom(
            dir.path(),
            "a.dcm",
            &FileSpec::new("P1", "1.2", "1.2.1", "1.2.1.1"),
        );

        let dcm = read_header(&path, 0).unwrap();
        assert_eq!(get_string_value(&dcm, SOP_INSTANCE_UID).as_deref(), Some("1.2.1.1"));
    }

    #[test]
    fn test_read_without_preamble() {
        let dir = TempDir::new().unwrap();
        let path = write_dicom(
            dir.path(),
            "a.dcm",
            &FileSpec::new("P1", "1.2", "1.2.1", "1.2.1.1"),
        );
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[PREAMBLE_LEN..]).unwrap();

        let dcm = read_header(&path, 0).unwrap();
        assert_eq!(get_string_value(&dcm, SOP_INSTANCE_UID).as_deref(), Some("1.2.1.1"));
    }

    #[test]
    fn test_read_bare_dataset() {
        let dir = TempDir::new().unwrap();
        let path = write_dicom(
            dir.path(),
            "a.dcm",
            &FileSpec::new("P1", "1.2", "1.2.1", "1.2.1.1"),
        );
        let bytes = std::fs::read(&path).unwrap();

        // (0002,0000) UL group length sits right after the magic
        let len_at = HEAD_LEN + 8;
        let group_len = u32::from_le_bytes(bytes[len_at..len_at + 4].try_into().unwrap()) as usize;
        std::fs::write(&path, &bytes[len_at + 4 + group_len..]).unwrap();

        let dcm = read_header(&path, 0).unwrap();
        assert_eq!(get_string_value(&dcm, SOP_INSTANCE_UID).as_deref(), Some("1.2.1.1"));
    }

    #[test]
    fn test_non_dicom_and_missing_files() {
        let dir = TempDir::new().unwrap();
        let notes = dir.path().join("notes.txt");
        std::fs::write(&notes, "free text").unwrap();

        assert!(matches!(read_header(&notes, 0), Err(DecodeError::NotDicom)));
        assert!(matches!(
            read_header(&dir.path().join("missing.dcm"), 1),
            Err(DecodeError::Unreadable(_))
        ));
    }

    #[test]
    fn test_truncated_file_is_undecodable() {
        let dir = TempDir::new().unwrap();
        let path = write_dicom(
            dir.path(),
            "a.dcm",
            &FileSpec::new("P1", "1.2", "1.2.1", "1.2.1.1"),
        );
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..HEAD_LEN + 6]).unwrap();

        assert!(matches!(read_header(&path, 0), Err(DecodeError::Undecodable(_))));
    }
}
