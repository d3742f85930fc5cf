use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Returned when a wire string does not name a known enum variant.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid {field} value: {value}")]
pub struct ParseEnumError {
    pub field: String,
    pub value: String,
}

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(ParseEnumError {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(Severity {
    Mild => "mild",
    Moderate => "moderate",
    Severe => "severe",
});

str_enum!(Sex {
    Female => "female",
    Male => "male",
    Other => "other",
});

str_enum!(SourceKind {
    Literature => "literature",
    Vector => "vector",
    Guideline => "guideline",
});

impl SourceKind {
    /// Every source kind, in merge priority order.
    pub const ALL: [SourceKind; 3] = [
        SourceKind::Guideline,
        SourceKind::Literature,
        SourceKind::Vector,
    ];

    /// Tie-break rank when weighted relevance is equal. Lower wins.
    pub fn priority(&self) -> u8 {
        match self {
            Self::Guideline => 0,
            Self::Literature => 1,
            Self::Vector => 2,
        }
    }
}

str_enum!(SourceStatus {
    Ok => "ok",
    Timeout => "timeout",
    Error => "error",
});

str_enum!(CompletenessLevel {
    Minimal => "minimal",
    Partial => "partial",
    Full => "full",
});

str_enum!(FeedbackRating {
    Accurate => "accurate",
    PartiallyAccurate => "partially_accurate",
    Inaccurate => "inaccurate",
});

str_enum!(EvidenceQuality {
    Low => "low",
    Moderate => "moderate",
    High => "high",
});

str_enum!(ConfidenceLevel {
    Low => "low",
    Moderate => "moderate",
    High => "high",
});

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn source_kind_round_trip() {
        for (variant, s) in [
            (SourceKind::Literature, "literature"),
            (SourceKind::Vector, "vector"),
            (SourceKind::Guideline, "guideline"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(SourceKind::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn feedback_rating_round_trip() {
        for (variant, s) in [
            (FeedbackRating::Accurate, "accurate"),
            (FeedbackRating::PartiallyAccurate, "partially_accurate"),
            (FeedbackRating::Inaccurate, "inaccurate"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(FeedbackRating::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn unknown_value_names_the_enum() {
        let err = Severity::from_str("critical").unwrap_err();
        assert_eq!(err.field, "Severity");
        assert_eq!(err.value, "critical");
    }

    #[test]
    fn serde_matches_as_str() {
        let json = serde_json::to_string(&FeedbackRating::PartiallyAccurate).unwrap();
        assert_eq!(json, "\"partially_accurate\"");
        let level: CompletenessLevel = serde_json::from_str("\"partial\"").unwrap();
        assert_eq!(level, CompletenessLevel::Partial);
    }

    #[test]
    fn guideline_has_highest_priority() {
        let mut kinds = vec![SourceKind::Vector, SourceKind::Guideline, SourceKind::Literature];
        kinds.sort_by_key(|k| k.priority());
        assert_eq!(kinds, SourceKind::ALL.to_vec());
    }
}
