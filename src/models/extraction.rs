use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::enums::{
    AvastinStatus, DegradedMode, ExtractionMethod, ExtractionType, MedicationEffect,
    RerankMode, RetrievalMode, SteroidStatus,
};
use super::evidence::EvidenceItem;

/// Steroid and bevacizumab (Avastin) status extracted from a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicationStatus {
    pub steroid_status: SteroidStatus,
    pub avastin_status: AvastinStatus,
}

impl MedicationStatus {
    pub fn unknown() -> Self {
        Self {
            steroid_status: SteroidStatus::Unknown,
            avastin_status: AvastinStatus::Unknown,
        }
    }

    /// Collapse the two statuses into the medication question asked on an
    /// improved scan. Avastin takes precedence over steroids.
    pub fn effect(&self) -> MedicationEffect {
        if self.avastin_status.is_active() {
            return MedicationEffect::Avastin;
        }
        if matches!(
            self.steroid_status,
            SteroidStatus::Increasing | SteroidStatus::Started
        ) {
            return MedicationEffect::IncreasingSteroids;
        }
        if self.steroid_status == SteroidStatus::Unknown
            || self.avastin_status == AvastinStatus::Unknown
        {
            return MedicationEffect::Unknown;
        }
        MedicationEffect::Neither
    }

    pub fn unknown_count(&self) -> usize {
        usize::from(self.steroid_status == SteroidStatus::Unknown)
            + usize::from(self.avastin_status == AvastinStatus::Unknown)
    }
}

/// Completion date of radiation therapy, or an explicit unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RadiationDate {
    Known(NaiveDate),
    Unknown,
}

impl RadiationDate {
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            Self::Known(d) => Some(*d),
            Self::Unknown => None,
        }
    }
}

/// Value carried by an [`ExtractionResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtractedValue {
    Medications(MedicationStatus),
    RadiationDate(RadiationDate),
}

/// Information the pipeline needed but could not establish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingInfo {
    pub field: String,
    pub reason: String,
    pub clinical_impact: String,
    pub suggested_fallback: String,
}

impl MissingInfo {
    pub fn new(
        field: impl Into<String>,
        reason: impl Into<String>,
        clinical_impact: impl Into<String>,
        suggested_fallback: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
            clinical_impact: clinical_impact.into(),
            suggested_fallback: suggested_fallback.into(),
        }
    }
}

/// One structured fact pulled from a note, with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub field: ExtractionType,
    pub value: ExtractedValue,
    /// 0-100.
    pub confidence_score: f32,
    pub evidence: Vec<EvidenceItem>,
    pub method: ExtractionMethod,
    pub model_name: String,
    pub processing_time_seconds: f64,
    pub retrieval_mode: RetrievalMode,
    pub rerank_mode: RerankMode,
    pub degraded: Vec<DegradedMode>,
    pub missing_info: Vec<MissingInfo>,
}

impl ExtractionResult {
    pub fn medications(&self) -> Option<MedicationStatus> {
        match self.value {
            ExtractedValue::Medications(m) => Some(m),
            ExtractedValue::RadiationDate(_) => None,
        }
    }

    pub fn radiation_date(&self) -> Option<RadiationDate> {
        match self.value {
            ExtractedValue::RadiationDate(r) => Some(r),
            ExtractedValue::Medications(_) => None,
        }
    }
}

/// Facts the decision engine consumes. Every field is optional: absent
/// facts fall to the documented default branch of the node that needs them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractedFacts {
    pub medications: Option<MedicationStatus>,
    pub medication_confidence: Option<f32>,
    pub radiation_date: Option<RadiationDate>,
    pub radiation_confidence: Option<f32>,
    /// Whether a suitable prior study exists for comparison.
    pub prior_available: Option<bool>,
    /// Whether progression has been seen across multiple prior studies.
    pub progressive_over_prior_studies: Option<bool>,
    pub missing_info: Vec<MissingInfo>,
}

impl ExtractedFacts {
    /// Build facts from the two extraction results of one request.
    pub fn from_results(medications: &ExtractionResult, radiation: &ExtractionResult) -> Self {
        let mut missing_info = medications.missing_info.clone();
        missing_info.extend(radiation.missing_info.iter().cloned());
        Self {
            medications: medications.medications(),
            medication_confidence: Some(medications.confidence_score),
            radiation_date: radiation.radiation_date(),
            radiation_confidence: Some(radiation.confidence_score),
            prior_available: None,
            progressive_over_prior_studies: None,
            missing_info,
        }
    }

    pub fn extraction_confidences(&self) -> Vec<f32> {
        [self.medication_confidence, self.radiation_confidence]
            .into_iter()
            .flatten()
            .collect()
    }
}
