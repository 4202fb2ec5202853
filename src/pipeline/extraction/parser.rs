use std::str::FromStr;

use serde_json::{Map, Value};

use crate::models::{
    AvastinStatus, ExtractedValue, ExtractionType, MedicationStatus, RadiationDate, SteroidStatus,
};
use crate::pipeline::text::parse_clinical_date;

use super::sanitize::{extract_json_object, sanitize_llm_output};
use super::ExtractionError;

/// A model answer after schema validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedExtraction {
    pub value: ExtractedValue,
    /// Text the model cited as support, verbatim.
    pub cited: Vec<String>,
    /// Self-reported confidence in [0, 1], when given.
    pub model_confidence: Option<f32>,
    /// Fields whose value was outside the allowed set and coerced to unknown.
    pub invalid_fields: usize,
    /// Fields that ended up unknown, coerced ones included.
    pub unknown_fields: usize,
}

/// Parse a raw model response for `field`.
///
/// A response with no JSON object, invalid JSON, or a missing required key
/// is malformed. Values outside the allowed set are not errors: they become
/// `unknown` and are counted in `invalid_fields`.
pub fn parse_extraction_response(
    field: ExtractionType,
    raw: &str,
) -> Result<ParsedExtraction, ExtractionError> {
    let cleaned = sanitize_llm_output(raw);
    let json = extract_json_object(&cleaned)
        .ok_or_else(|| ExtractionError::MalformedResponse("No JSON object found".into()))?;
    let value: Value =
        serde_json::from_str(json).map_err(|e| ExtractionError::JsonParsing(e.to_string()))?;
    let obj = value
        .as_object()
        .ok_or_else(|| ExtractionError::MalformedResponse("Response is not a JSON object".into()))?;

    let cited = parse_evidence(obj);
    let model_confidence = obj.get("confidence").and_then(parse_confidence);

    match field {
        ExtractionType::Medications => {
            let (steroid_status, steroid_invalid) =
                parse_enum_field(obj, "steroid_status", SteroidStatus::Unknown)?;
            let (avastin_status, avastin_invalid) =
                parse_enum_field(obj, "avastin_status", AvastinStatus::Unknown)?;
            let status = MedicationStatus { steroid_status, avastin_status };
            Ok(ParsedExtraction {
                value: ExtractedValue::Medications(status),
                cited,
                model_confidence,
                invalid_fields: usize::from(steroid_invalid) + usize::from(avastin_invalid),
                unknown_fields: status.unknown_count(),
            })
        }
        ExtractionType::RadiationDate => {
            let raw_date = required(obj, "radiation_date")?;
            let (date, invalid) = match raw_date {
                Value::Null => (RadiationDate::Unknown, false),
                Value::String(s) if s.trim().eq_ignore_ascii_case("unknown") => {
                    (RadiationDate::Unknown, false)
                }
                Value::String(s) => match parse_clinical_date(s) {
                    Some(d) => (RadiationDate::Known(d), false),
                    None => (RadiationDate::Unknown, true),
                },
                _ => (RadiationDate::Unknown, true),
            };
            Ok(ParsedExtraction {
                value: ExtractedValue::RadiationDate(date),
                cited,
                model_confidence,
                invalid_fields: usize::from(invalid),
                unknown_fields: usize::from(date == RadiationDate::Unknown),
            })
        }
    }
}

fn required<'a>(obj: &'a Map<String, Value>, key: &str) -> Result<&'a Value, ExtractionError> {
    obj.get(key)
        .ok_or_else(|| ExtractionError::MalformedResponse(format!("Missing required key {key}")))
}

/// Returns the parsed value and whether it had to be coerced.
fn parse_enum_field<T: FromStr>(
    obj: &Map<String, Value>,
    key: &str,
    unknown: T,
) -> Result<(T, bool), ExtractionError> {
    let parsed = required(obj, key)?
        .as_str()
        .and_then(|s| T::from_str(&s.trim().to_lowercase()).ok());
    Ok(match parsed {
        Some(v) => (v, false),
        None => (unknown, true),
    })
}

/// Evidence may come back as a list of strings or a single string.
fn parse_evidence(obj: &Map<String, Value>) -> Vec<String> {
    match obj.get("evidence") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

/// Accepts 0-1 or a 0-100 percentage.
fn parse_confidence(value: &Value) -> Option<f32> {
    let raw = value.as_f64()?;
    if !raw.is_finite() || raw < 0.0 {
        return None;
    }
    let unit = if raw > 1.0 { raw / 100.0 } else { raw };
    Some(unit.min(1.0) as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn parses_medication_response() {
        let raw = r#"{"steroid_status": "increasing", "avastin_status": "none", "evidence": ["Dexamethasone 4mg daily"], "confidence": 0.9}"#;
        let parsed = parse_extraction_response(ExtractionType::Medications, raw).unwrap();
        assert_eq!(
            parsed.value,
            ExtractedValue::Medications(MedicationStatus {
                steroid_status: SteroidStatus::Increasing,
                avastin_status: AvastinStatus::None,
            })
        );
        assert_eq!(parsed.cited, vec!["Dexamethasone 4mg daily"]);
        assert!((parsed.model_confidence.unwrap() - 0.9).abs() < 1e-6);
        assert_eq!(parsed.invalid_fields, 0);
        assert_eq!(parsed.unknown_fields, 0);
    }

    #[test]
    fn out_of_enum_value_becomes_unknown() {
        let raw = r#"{"steroid_status": "tapering", "avastin_status": "ongoing"}"#;
        let parsed = parse_extraction_response(ExtractionType::Medications, raw).unwrap();
        let status = match parsed.value {
            ExtractedValue::Medications(s) => s,
            other => panic!("unexpected value: {other:?}"),
        };
        assert_eq!(status.steroid_status, SteroidStatus::Unknown);
        assert_eq!(status.avastin_status, AvastinStatus::Ongoing);
        assert_eq!(parsed.invalid_fields, 1);
        assert_eq!(parsed.unknown_fields, 1);
    }

    #[test]
    fn missing_required_key_is_malformed() {
        let raw = r#"{"steroid_status": "none"}"#;
        let err = parse_extraction_response(ExtractionType::Medications, raw).unwrap_err();
        assert!(matches!(err, ExtractionError::MalformedResponse(_)));
    }

    #[test]
    fn invalid_json_is_parse_error() {
        let raw = r#"{"radiation_date": 10/15/2024}"#;
        let err = parse_extraction_response(ExtractionType::RadiationDate, raw).unwrap_err();
        assert!(matches!(err, ExtractionError::JsonParsing(_)));
    }

    #[test]
    fn no_json_is_malformed() {
        let err =
            parse_extraction_response(ExtractionType::RadiationDate, "I cannot tell.").unwrap_err();
        assert!(matches!(err, ExtractionError::MalformedResponse(_)));
    }

    #[test]
    fn parses_radiation_date_in_fenced_block() {
        let raw = "```json\n{\"radiation_date\": \"10/15/2024\", \"evidence\": \"XRT completed 10/15/2024\"}\n```";
        let parsed = parse_extraction_response(ExtractionType::RadiationDate, raw).unwrap();
        assert_eq!(
            parsed.value,
            ExtractedValue::RadiationDate(RadiationDate::Known(
                NaiveDate::from_ymd_opt(2024, 10, 15).unwrap()
            ))
        );
        assert_eq!(parsed.cited, vec!["XRT completed 10/15/2024"]);
        assert_eq!(parsed.model_confidence, None);
    }

    #[test]
    fn explicit_unknown_date_is_not_invalid() {
        let raw = r#"{"radiation_date": "unknown", "evidence": []}"#;
        let parsed = parse_extraction_response(ExtractionType::RadiationDate, raw).unwrap();
        assert_eq!(parsed.value, ExtractedValue::RadiationDate(RadiationDate::Unknown));
        assert_eq!(parsed.invalid_fields, 0);
        assert_eq!(parsed.unknown_fields, 1);
    }

    #[test]
    fn unparsable_date_is_invalid() {
        let raw = r#"{"radiation_date": "last spring"}"#;
        let parsed = parse_extraction_response(ExtractionType::RadiationDate, raw).unwrap();
        assert_eq!(parsed.value, ExtractedValue::RadiationDate(RadiationDate::Unknown));
        assert_eq!(parsed.invalid_fields, 1);
    }

    #[test]
    fn percentage_confidence_normalized() {
        let raw = r#"{"radiation_date": "unknown", "confidence": 85}"#;
        let parsed = parse_extraction_response(ExtractionType::RadiationDate, raw).unwrap();
        assert!((parsed.model_confidence.unwrap() - 0.85).abs() < 1e-6);
    }
}
