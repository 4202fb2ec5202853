use serde::{Deserialize, Serialize};

/// A string did not name a member of a closed enum.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid {field} value: {value}")]
pub struct InvalidEnum {
    pub field: &'static str,
    pub value: String,
}

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// The string form doubles as the serde representation.
macro_rules! str_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }

            pub fn all() -> &'static [Self] {
                &[$(Self::$variant),+]
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = InvalidEnum;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(InvalidEnum {
                        field: stringify!($name),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(ExtractionType {
    Medications => "medications",
    RadiationDate => "radiation_date",
});

str_enum!(ExtractionMethod {
    Llm => "llm",
    Pattern => "pattern",
});

str_enum!(SteroidStatus {
    None => "none",
    Stable => "stable",
    Increasing => "increasing",
    Decreasing => "decreasing",
    Started => "started",
    Unknown => "unknown",
});

str_enum!(AvastinStatus {
    None => "none",
    Ongoing => "ongoing",
    FirstTreatment => "first_treatment",
    Started => "started",
    Unknown => "unknown",
});

str_enum!(EvidenceConfidence {
    High => "high",
    Medium => "medium",
    Low => "low",
});

str_enum!(ImagingCategory {
    Improved => "improved",
    Stable => "stable",
    Worse => "worse",
});

str_enum!(ConfidenceLevel {
    High => "high",
    Medium => "medium",
    Low => "low",
});

str_enum!(
    /// How candidate chunks were ranked for an extraction.
    RetrievalMode {
        Hybrid => "hybrid",
        LexicalOnly => "lexical_only",
        FullText => "full_text",
    }
);

str_enum!(
    /// How the ranked candidates were narrowed to the prompt context.
    RerankMode {
        Scored => "scored",
        Identity => "identity",
        Skipped => "skipped",
    }
);

str_enum!(
    /// A documented fallback taken while producing a result. Not an error,
    /// but every tag lowers the result's confidence.
    DegradedMode {
        LexicalOnlyRetrieval => "lexical_only_retrieval",
        IdentityRerank => "identity_rerank",
        PatternExtraction => "pattern_extraction",
    }
);

str_enum!(RadiationTiming {
    Within90Days => "within_90_days",
    Beyond90Days => "beyond_90_days",
    Unknown => "unknown",
});

str_enum!(WorseComponent {
    FlairOrEnh => "flair_or_enh",
    FlairAndEnh => "flair_and_enh",
    Unknown => "unknown",
});

str_enum!(WorseningExtent {
    Major => "major",
    Minor => "minor",
    Unknown => "unknown",
});

str_enum!(
    /// Medication context relevant to an improved scan.
    MedicationEffect {
        Avastin => "avastin",
        IncreasingSteroids => "increasing_steroids",
        Neither => "neither",
        Unknown => "unknown",
    }
);

str_enum!(
    /// BT-RADS follow-up score. Closed set; serialized without the "BT-" prefix.
    BtradsScore {
        Bt0 => "0",
        Bt1a => "1a",
        Bt1b => "1b",
        Bt2 => "2",
        Bt3a => "3a",
        Bt3b => "3b",
        Bt3c => "3c",
        Bt4 => "4",
    }
);

impl BtradsScore {
    /// Display label, e.g. "BT-3b".
    pub fn label(&self) -> String {
        format!("BT-{}", self.as_str())
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Bt0 => "Baseline",
            Self::Bt1a => "Improved",
            Self::Bt1b => "Medication Effect",
            Self::Bt2 => "Stable",
            Self::Bt3a => "Favor Treatment",
            Self::Bt3b => "Indeterminate",
            Self::Bt3c => "Favor Tumor",
            Self::Bt4 => "Highly Suspicious",
        }
    }
}

impl SteroidStatus {
    /// A status that asserts the patient is taking steroids.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Stable | Self::Increasing | Self::Decreasing | Self::Started
        )
    }
}

impl AvastinStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Ongoing | Self::FirstTreatment | Self::Started)
    }
}
