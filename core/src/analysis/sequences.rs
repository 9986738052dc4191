use serde::{Deserialize, Serialize};
use std::fmt;

/// MRI sequences a complete brain study carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SequenceType {
    #[serde(rename = "T1")]
    T1,
    #[serde(rename = "T1c")]
    T1c,
    #[serde(rename = "T2")]
    T2,
    #[serde(rename = "FLAIR")]
    Flair,
}

impl SequenceType {
    pub const ALL: [SequenceType; 4] = [
        SequenceType::T1,
        SequenceType::T1c,
        SequenceType::T2,
        SequenceType::Flair,
    ];

    /// Classifies a series description, case-insensitively
    ///
    /// FLAIR is checked first since FLAIR descriptions often also name the
    /// underlying T1 or T2 weighting.
    pub fn classify(description: &str) -> Option<Self> {
        let desc = description.to_lowercase();
        if desc.contains("flair") {
            Some(SequenceType::Flair)
        } else if desc.contains("t1") {
            if desc.contains("gd") || desc.contains("contrast") {
                Some(SequenceType::T1c)
            } else {
                Some(SequenceType::T1)
            }
        } else if desc.contains("t2") {
            Some(SequenceType::T2)
        } else {
            None
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SequenceType::T1 => "T1",
            SequenceType::T1c => "T1c",
            SequenceType::T2 => "T2",
            SequenceType::Flair => "FLAIR",
        }
    }
}

impl fmt::Display for SequenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("AX T1", Some(SequenceType::T1))]
    #[case("t1_mprage_sag", Some(SequenceType::T1))]
    #[case("AX T1 POST GD", Some(SequenceType::T1c))]
    #[case("T1 + Contrast", Some(SequenceType::T1c))]
    #[case("AX T2 TSE", Some(SequenceType::T2))]
    #[case("AX T2 FLAIR", Some(SequenceType::Flair))]
    #[case("t1_flair_tra", Some(SequenceType::Flair))]
    #[case("DWI b1000", None)]
    #[case("", None)]
    fn test_classify(#[case] description: &str, #[case] expected: Option<SequenceType>) {
        assert_eq!(SequenceType::classify(description), expected);
    }

    #[test]
    fn test_serialized_names() {
        assert_eq!(serde_json::to_string(&SequenceType::Flair).unwrap(), "\"FLAIR\"");
        assert_eq!(serde_json::to_string(&SequenceType::T1c).unwrap(), "\"T1c\"");
        assert_eq!(SequenceType::T1c.to_string(), "T1c");
    }
}
