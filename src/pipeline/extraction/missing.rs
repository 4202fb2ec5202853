use crate::models::{
    AvastinStatus, ExtractedValue, MissingInfo, RadiationDate, SteroidStatus,
};

/// Missing-information records for one extraction: every unknown value,
/// plus a low-confidence record when a known value scored below `threshold`.
pub fn missing_info_for(value: &ExtractedValue, confidence: f32, threshold: f32) -> Vec<MissingInfo> {
    let mut missing = Vec::new();
    match value {
        ExtractedValue::Medications(status) => {
            if status.steroid_status == SteroidStatus::Unknown {
                missing.push(MissingInfo::new(
                    "steroid_status",
                    "Steroid status could not be determined from the note",
                    "Steroid effect on an improved scan cannot be assessed (BT-1a vs BT-1b)",
                    "Review the medication reconciliation or pharmacy record",
                ));
            }
            if status.avastin_status == AvastinStatus::Unknown {
                missing.push(MissingInfo::new(
                    "avastin_status",
                    "Avastin status could not be determined from the note",
                    "Avastin effect on an improved scan cannot be assessed (BT-1a vs BT-1b)",
                    "Review the oncology treatment plan or infusion record",
                ));
            }
            if status.unknown_count() < 2 && confidence < threshold {
                missing.push(low_confidence("medications", confidence));
            }
        }
        ExtractedValue::RadiationDate(RadiationDate::Unknown) => {
            missing.push(MissingInfo::new(
                "radiation_date",
                "Radiation completion date could not be determined from the note",
                "Worsening within 90 days of radiation cannot be attributed to treatment effect (BT-3a)",
                "Check the radiation oncology treatment summary",
            ));
        }
        ExtractedValue::RadiationDate(RadiationDate::Known(_)) => {
            if confidence < threshold {
                missing.push(low_confidence("radiation_date", confidence));
            }
        }
    }
    missing
}

fn low_confidence(field: &str, confidence: f32) -> MissingInfo {
    MissingInfo::new(
        field,
        format!("Extraction confidence {confidence:.0} is below the review threshold"),
        "The extracted value may be wrong and could change the score",
        "Verify the value against the source note",
    )
}
