use crate::config::{Domain, TagConfig, TagSpec};
use crate::error::{IngestError, Result};
use dicom_core::VR;
use dicom_object::mem::InMemElement;
use dicom_object::InMemDicomObject;
use log::{debug, warn};
use std::str::FromStr;

use super::values::{format_person_name, parse_first};

/// One way of reading a field out of a decoded header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    /// Dictionary keyword lookup (`PatientID`)
    Keyword,
    /// Numeric tag lookup (`0010,0020`)
    RawTag,
}

const STRATEGIES: [Strategy; 2] = [Strategy::Keyword, Strategy::RawTag];

impl Strategy {
    fn lookup(self, dcm: &InMemDicomObject, spec: &TagSpec) -> Option<String> {
        let element = match self {
            Strategy::Keyword => match dcm.element_by_name(&spec.keyword) {
                Ok(elem) => elem,
                Err(e) => {
                    debug!("Keyword lookup of {} failed: {}", spec.keyword, e);
                    return None;
                }
            },
            Strategy::RawTag => dcm.element(spec.tag).ok()?,
        };
        render_element(element)
    }
}

/// Renders an element as display text
///
/// Person names become `"Family, Given"`; padding and empty values are
/// treated as absent. Values that cannot be read as text are logged and
/// treated as absent.
fn render_element(elem: &InMemElement) -> Option<String> {
    let header = elem.header();
    match elem.to_str() {
        Ok(text) => {
            let text = text.trim_matches(|c: char| c.is_whitespace() || c == '\0');
            if text.is_empty() {
                None
            } else if header.vr == VR::PN {
                Some(format_person_name(text)).filter(|name| !name.is_empty())
            } else {
                Some(text.to_string())
            }
        }
        Err(e) => {
            warn!("Cannot read tag {} as text: {}", header.tag, e);
            None
        }
    }
}

/// Resolves semantic fields against one or more decoded headers
///
/// Sources are consulted in order; within each source the keyword lookup
/// runs before the raw tag lookup. The configured default applies only
/// after every source is exhausted.
///
/// # Example
///
/// ```
/// use neuroimg_core::config::{Domain, TagConfig};
/// use neuroimg_core::extraction::TagResolver;
/// use dicom_core::{DataElement, PrimitiveValue, Tag, VR};
/// use dicom_object::InMemDicomObject;
///
/// let dcm = InMemDicomObject::from_element_iter([DataElement::new(
///     Tag(0x0010, 0x0010),
///     VR::PN,
///     PrimitiveValue::from("Doe^Jane"),
/// )]);
///
/// let tags = TagConfig::default();
/// let resolver = TagResolver::new(&tags);
/// assert_eq!(
///     resolver.resolve(&[&dcm], Domain::Patient, "name"),
///     Some("Doe, Jane".to_string())
/// );
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TagResolver<'a> {
    tags: &'a TagConfig,
}

impl<'a> TagResolver<'a> {
    pub fn new(tags: &'a TagConfig) -> Self {
        Self { tags }
    }

    /// Resolves a field to its display text, or the configured default
    pub fn resolve(
        &self,
        sources: &[&InMemDicomObject],
        domain: Domain,
        field: &str,
    ) -> Option<String> {
        let Some(spec) = self.tags.get(domain, field) else {
            warn!("No tag configured for {}.{}", domain, field);
            return None;
        };

        sources
            .iter()
            .find_map(|source| {
                STRATEGIES
                    .iter()
                    .find_map(|strategy| strategy.lookup(source, spec))
            })
            .or_else(|| spec.default.clone())
    }

    /// Resolves a field and enforces its `required` flag
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::MissingRequiredTag`] when a required field is absent
    pub fn require(
        &self,
        sources: &[&InMemDicomObject],
        domain: Domain,
        field: &str,
    ) -> Result<Option<String>> {
        let value = self.resolve(sources, domain, field);
        let required = self
            .tags
            .get(domain, field)
            .map(|spec| spec.required)
            .unwrap_or(false);

        if value.is_none() && required {
            return Err(IngestError::MissingRequiredTag {
                domain,
                field: field.to_string(),
            });
        }
        Ok(value)
    }

    /// Resolves a field and parses its first value
    ///
    /// Unparseable text is logged and treated as absent.
    pub fn resolve_parsed<T: FromStr>(
        &self,
        sources: &[&InMemDicomObject],
        domain: Domain,
        field: &str,
    ) -> Option<T> {
        let raw = self.resolve(sources, domain, field)?;
        let parsed = parse_first(&raw);
        if parsed.is_none() {
            warn!("Ignoring unparseable {}.{} value '{}'", domain, field, raw);
        }
        parsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TagSpec;
    use dicom_core::value::PrimitiveValue;
    use dicom_core::{DataElement, Tag};

    fn element(tag: Tag, vr: VR, value: &str) -> DataElement<InMemDicomObject> {
        DataElement::new(tag, vr, PrimitiveValue::from(value))
    }

    #[test]
    fn test_resolve_by_keyword() {
        let tags = TagConfig::default();
        let resolver = TagResolver::new(&tags);
        let dcm = InMemDicomObject::from_element_iter([element(
            Tag(0x0020, 0x000D),
            VR::UI,
            "1.2.3.4",
        )]);

        assert_eq!(
            resolver.resolve(&[&dcm], Domain::Study, "uid"),
            Some("1.2.3.4".to_string())
        );
    }

    #[test]
    fn test_raw_tag_fallback_for_unknown_keyword() {
        // A keyword the dictionary does not know still resolves through the raw tag
        let tags = TagConfig::default().with_field(
            Domain::Series,
            "vendor_label",
            TagSpec::new("NotARealKeyword", Tag(0x0009, 0x0010), "Private creator"),
        );
        let resolver = TagResolver::new(&tags);
        let dcm = InMemDicomObject::from_element_iter([element(
            Tag(0x0009, 0x0010),
            VR::LO,
            "ACME 1.0",
        )]);

        assert_eq!(
            resolver.resolve(&[&dcm], Domain::Series, "vendor_label"),
            Some("ACME 1.0".to_string())
        );
    }

    #[test]
    fn test_default_applies_when_absent() {
        let tags = TagConfig::default().with_field(
            Domain::Series,
            "modality",
            TagSpec::new("Modality", Tag(0x0008, 0x0060), "Modality").with_default("OT"),
        );
        let resolver = TagResolver::new(&tags);
        let dcm = InMemDicomObject::new_empty();

        assert_eq!(
            resolver.resolve(&[&dcm], Domain::Series, "modality"),
            Some("OT".to_string())
        );
    }

    #[test]
    fn test_sources_consulted_in_order() {
        let tags = TagConfig::default();
        let resolver = TagResolver::new(&tags);
        let file = InMemDicomObject::from_element_iter([element(
            Tag(0x0008, 0x0060),
            VR::CS,
            "MR",
        )]);
        let index = InMemDicomObject::from_element_iter([
            element(Tag(0x0008, 0x0060), VR::CS, "CT"),
            element(Tag(0x0008, 0x103E), VR::LO, "AX T1"),
        ]);

        // first source wins
        assert_eq!(
            resolver.resolve(&[&file, &index], Domain::Series, "modality"),
            Some("MR".to_string())
        );
        // later sources fill gaps
        assert_eq!(
            resolver.resolve(&[&file, &index], Domain::Series, "description"),
            Some("AX T1".to_string())
        );
    }

    #[test]
    fn test_require_missing_field() {
        let tags = TagConfig::default();
        let resolver = TagResolver::new(&tags);
        let dcm = InMemDicomObject::new_empty();

        let err = resolver
            .require(&[&dcm], Domain::Instance, "uid")
            .unwrap_err();
        assert!(matches!(
            err,
            IngestError::MissingRequiredTag {
                domain: Domain::Instance,
                ref field,
            } if field == "uid"
        ));

        // optional fields resolve to None without error
        assert_eq!(resolver.require(&[&dcm], Domain::Patient, "sex").unwrap(), None);
    }

    #[test]
    fn test_empty_value_is_absent() {
        let tags = TagConfig::default();
        let resolver = TagResolver::new(&tags);
        let dcm = InMemDicomObject::from_element_iter([element(
            Tag(0x0010, 0x0040),
            VR::CS,
            " ",
        )]);

        assert_eq!(resolver.resolve(&[&dcm], Domain::Patient, "sex"), None);
    }

    #[test]
    fn test_resolve_parsed() {
        let tags = TagConfig::default();
        let resolver = TagResolver::new(&tags);
        let dcm = InMemDicomObject::from_element_iter([
            element(Tag(0x0020, 0x0013), VR::IS, "7 "),
            element(Tag(0x0020, 0x0011), VR::IS, "abc"),
        ]);

        assert_eq!(
            resolver.resolve_parsed::<i32>(&[&dcm], Domain::Instance, "number"),
            Some(7)
        );
        assert_eq!(
            resolver.resolve_parsed::<i32>(&[&dcm], Domain::Series, "number"),
            None
        );
    }
}
