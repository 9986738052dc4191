use dicom_core::Tag;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Entity level a semantic field belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Patient,
    Study,
    Series,
    Instance,
}

impl Domain {
    pub const ALL: [Domain; 4] = [Domain::Patient, Domain::Study, Domain::Series, Domain::Instance];

    /// Parses a lowercase domain name as used in configuration files
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|domain| domain.as_str().eq_ignore_ascii_case(name.trim()))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Patient => "patient",
            Domain::Study => "study",
            Domain::Series => "series",
            Domain::Instance => "instance",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How one semantic field maps onto a DICOM attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagSpec {
    /// Dictionary keyword, e.g. `PatientID`
    pub keyword: String,

    /// Numeric tag, written as `"GGGG,EEEE"` in configuration files
    #[serde(serialize_with = "serialize_tag", deserialize_with = "deserialize_tag")]
    pub tag: Tag,

    /// A record lacking this field is discarded
    #[serde(default)]
    pub required: bool,

    /// Value used when every lookup strategy comes up empty
    #[serde(default)]
    pub default: Option<String>,

    #[serde(default)]
    pub description: String,
}

impl TagSpec {
    pub fn new(keyword: &str, tag: Tag, description: &str) -> Self {
        Self {
            keyword: keyword.to_string(),
            tag,
            required: false,
            default: None,
            description: description.to_string(),
        }
    }

    /// Builder: mark the field as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Builder: set the fallback value
    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// Field tables per domain, consulted by the tag resolver
///
/// Defaults cover every field the record parser reads. Overrides replace
/// single fields and leave the rest of the table untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct TagConfig {
    domains: BTreeMap<Domain, BTreeMap<String, TagSpec>>,
}

/// Per-domain field overrides as they appear in a configuration file
pub type TagOverrides = BTreeMap<Domain, BTreeMap<String, TagSpec>>;

impl Default for TagConfig {
    fn default() -> Self {
        let mut config = Self {
            domains: BTreeMap::new(),
        };

        config.insert(
            Domain::Patient,
            "id",
            TagSpec::new("PatientID", Tag(0x0010, 0x0020), "Patient ID"),
        );
        config.insert(
            Domain::Patient,
            "name",
            TagSpec::new("PatientName", Tag(0x0010, 0x0010), "Patient Name"),
        );
        config.insert(
            Domain::Patient,
            "birth_date",
            TagSpec::new("PatientBirthDate", Tag(0x0010, 0x0030), "Birth Date"),
        );
        config.insert(
            Domain::Patient,
            "sex",
            TagSpec::new("PatientSex", Tag(0x0010, 0x0040), "Patient Sex"),
        );
        config.insert(
            Domain::Patient,
            "weight",
            TagSpec::new("PatientWeight", Tag(0x0010, 0x1030), "Weight"),
        );
        config.insert(
            Domain::Patient,
            "age",
            TagSpec::new("PatientAge", Tag(0x0010, 0x1010), "Age"),
        );

        config.insert(
            Domain::Study,
            "uid",
            TagSpec::new("StudyInstanceUID", Tag(0x0020, 0x000D), "Study Instance UID").required(),
        );
        config.insert(
            Domain::Study,
            "date",
            TagSpec::new("StudyDate", Tag(0x0008, 0x0020), "Study Date"),
        );
        config.insert(
            Domain::Study,
            "time",
            TagSpec::new("StudyTime", Tag(0x0008, 0x0030), "Study Time"),
        );
        config.insert(
            Domain::Study,
            "description",
            TagSpec::new("StudyDescription", Tag(0x0008, 0x1030), "Study Description"),
        );
        config.insert(
            Domain::Study,
            "accession_number",
            TagSpec::new("AccessionNumber", Tag(0x0008, 0x0050), "Accession Number"),
        );

        config.insert(
            Domain::Series,
            "uid",
            TagSpec::new("SeriesInstanceUID", Tag(0x0020, 0x000E), "Series Instance UID")
                .required(),
        );
        config.insert(
            Domain::Series,
            "number",
            TagSpec::new("SeriesNumber", Tag(0x0020, 0x0011), "Series Number"),
        );
        config.insert(
            Domain::Series,
            "description",
            TagSpec::new("SeriesDescription", Tag(0x0008, 0x103E), "Series Description"),
        );
        config.insert(
            Domain::Series,
            "modality",
            TagSpec::new("Modality", Tag(0x0008, 0x0060), "Modality"),
        );
        config.insert(
            Domain::Series,
            "body_part",
            TagSpec::new("BodyPartExamined", Tag(0x0018, 0x0015), "Body Part"),
        );
        config.insert(
            Domain::Series,
            "protocol_name",
            TagSpec::new("ProtocolName", Tag(0x0018, 0x1030), "Protocol Name"),
        );

        config.insert(
            Domain::Instance,
            "uid",
            TagSpec::new("SOPInstanceUID", Tag(0x0008, 0x0018), "SOP Instance UID").required(),
        );
        config.insert(
            Domain::Instance,
            "class_uid",
            TagSpec::new("SOPClassUID", Tag(0x0008, 0x0016), "SOP Class UID").required(),
        );
        config.insert(
            Domain::Instance,
            "number",
            TagSpec::new("InstanceNumber", Tag(0x0020, 0x0013), "Instance Number"),
        );
        config.insert(
            Domain::Instance,
            "position",
            TagSpec::new("SliceLocation", Tag(0x0020, 0x1041), "Slice Location"),
        );
        config.insert(
            Domain::Instance,
            "thickness",
            TagSpec::new("SliceThickness", Tag(0x0018, 0x0050), "Slice Thickness"),
        );
        config.insert(Domain::Instance, "rows", TagSpec::new("Rows", Tag(0x0028, 0x0010), "Rows"));
        config.insert(
            Domain::Instance,
            "columns",
            TagSpec::new("Columns", Tag(0x0028, 0x0011), "Columns"),
        );
        config.insert(
            Domain::Instance,
            "pixel_spacing",
            TagSpec::new("PixelSpacing", Tag(0x0028, 0x0030), "Pixel Spacing"),
        );

        config
    }
}

impl TagConfig {
    /// Looks up the spec of a field
    pub fn get(&self, domain: Domain, field: &str) -> Option<&TagSpec> {
        self.domains.get(&domain).and_then(|fields| fields.get(field))
    }

    /// Field names marked required within a domain
    pub fn required_fields(&self, domain: Domain) -> Vec<&str> {
        self.domains
            .get(&domain)
            .map(|fields| {
                fields
                    .iter()
                    .filter(|(_, spec)| spec.required)
                    .map(|(name, _)| name.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Inserts or replaces a single field
    pub fn insert(&mut self, domain: Domain, field: &str, spec: TagSpec) {
        self.domains
            .entry(domain)
            .or_default()
            .insert(field.to_string(), spec);
    }

    /// Builder: replace a single field
    pub fn with_field(mut self, domain: Domain, field: &str, spec: TagSpec) -> Self {
        self.insert(domain, field, spec);
        self
    }

    /// Applies overrides field by field
    pub fn merge(&mut self, overrides: TagOverrides) {
        for (domain, fields) in overrides {
            for (field, spec) in fields {
                self.insert(domain, &field, spec);
            }
        }
    }
}

/// Parses a tag written as `GGGG,EEEE`, `(GGGG,EEEE)` or `GGGGEEEE`
pub fn parse_tag(s: &str) -> Result<Tag, String> {
    let cleaned: String = s
        .chars()
        .filter(|c| !matches!(c, '(' | ')' | ',' | ' '))
        .collect();
    if cleaned.len() != 8 {
        return Err(format!("Failed to parse tag from '{}'", s));
    }
    let group = u16::from_str_radix(&cleaned[..4], 16)
        .map_err(|e| format!("Invalid tag group in '{}': {}", s, e))?;
    let element = u16::from_str_radix(&cleaned[4..], 16)
        .map_err(|e| format!("Invalid tag element in '{}': {}", s, e))?;
    Ok(Tag(group, element))
}

fn serialize_tag<S: Serializer>(tag: &Tag, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{:04X},{:04X}", tag.group(), tag.element()))
}

fn deserialize_tag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Tag, D::Error> {
    let s = String::deserialize(deserializer)?;
    parse_tag(&s).map_err(serde::de::Error::custom)
}
