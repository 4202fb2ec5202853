//! Keyword and date-pattern extraction.
//!
//! Used only when pattern fallback is enabled and the inference backend is
//! unavailable. Results carry `method = pattern` and a capped confidence.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{
    AvastinStatus, ExtractedValue, ExtractionType, MedicationStatus, RadiationDate, SteroidStatus,
};
use crate::pipeline::text::{find_dates, has_radiation_term, sentence_spans};

use super::parser::ParsedExtraction;

const STEROID_TERMS: &str = "dexamethasone|decadron|prednisolone|prednisone|steroids?";
const AVASTIN_TERMS: &str = "avastin|bevacizumab";

static STEROID_RE: LazyLock<Regex> = LazyLock::new(|| mention_regex(STEROID_TERMS));
static AVASTIN_RE: LazyLock<Regex> = LazyLock::new(|| mention_regex(AVASTIN_TERMS));

static STEROID_NEGATION_RE: LazyLock<Regex> = LazyLock::new(|| negation_regex(STEROID_TERMS));
static AVASTIN_NEGATION_RE: LazyLock<Regex> = LazyLock::new(|| negation_regex(AVASTIN_TERMS));

static INCREASE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:increas\w*|escalat\w*|uptitrat\w*)\b").expect("valid regex")
});

static DECREASE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:decreas\w*|taper\w*|wean\w*|reduc\w*)\b").expect("valid regex")
});

static START_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:start\w*|initiat\w*|began|begin)\b").expect("valid regex")
});

static FIRST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bfirst\s+(?:dose|cycle|infusion|treatment)\b").expect("valid regex")
});

static COMPLETION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:complet\w*|finish\w*|ended|last)\b").expect("valid regex")
});

fn mention_regex(terms: &str) -> Regex {
    Regex::new(&format!(r"(?i)\b(?:{terms})\b")).expect("valid regex")
}

/// Negation bound to the drug itself: "no steroids", "off Avastin",
/// "dexamethasone was stopped". A bare "no change" does not negate.
fn negation_regex(terms: &str) -> Regex {
    Regex::new(&format!(
        r"(?i)\b(?:(?:no|not on|off|without)\s+(?:\w+\s+){{0,2}}(?:{terms})|(?:{terms})(?:\s+\w+){{0,3}}?\s+(?:discontinued|stopped|held)|(?:discontinued|stopped|held)\s+(?:\w+\s+){{0,2}}(?:{terms}))\b"
    ))
    .expect("valid regex")
}

/// Extract `field` from `text` without a model.
pub fn extract_with_patterns(field: ExtractionType, text: &str) -> ParsedExtraction {
    match field {
        ExtractionType::Medications => extract_medications(text),
        ExtractionType::RadiationDate => extract_radiation_date(text),
    }
}

fn extract_medications(text: &str) -> ParsedExtraction {
    let mut cited = Vec::new();
    let mut steroid_status = SteroidStatus::Unknown;
    let mut avastin_status = AvastinStatus::Unknown;

    // Later sentences overwrite earlier ones: plans follow history in notes.
    for (start, end) in sentence_spans(text) {
        let sentence = &text[start..end];
        let mut relevant = false;
        if STEROID_RE.is_match(sentence) {
            steroid_status = classify_steroid(sentence);
            relevant = true;
        }
        if AVASTIN_RE.is_match(sentence) {
            avastin_status = classify_avastin(sentence);
            relevant = true;
        }
        if relevant {
            cited.push(sentence.to_string());
        }
    }

    let status = MedicationStatus { steroid_status, avastin_status };
    ParsedExtraction {
        value: ExtractedValue::Medications(status),
        cited,
        model_confidence: None,
        invalid_fields: 0,
        unknown_fields: status.unknown_count(),
    }
}

fn classify_steroid(sentence: &str) -> SteroidStatus {
    if STEROID_NEGATION_RE.is_match(sentence) {
        SteroidStatus::None
    } else if INCREASE_RE.is_match(sentence) {
        SteroidStatus::Increasing
    } else if DECREASE_RE.is_match(sentence) {
        SteroidStatus::Decreasing
    } else if START_RE.is_match(sentence) {
        SteroidStatus::Started
    } else {
        // Listed with a dose and no change.
        SteroidStatus::Stable
    }
}

fn classify_avastin(sentence: &str) -> AvastinStatus {
    if AVASTIN_NEGATION_RE.is_match(sentence) {
        AvastinStatus::None
    } else if FIRST_RE.is_match(sentence) {
        AvastinStatus::FirstTreatment
    } else if START_RE.is_match(sentence) {
        AvastinStatus::Started
    } else {
        AvastinStatus::Ongoing
    }
}

/// Latest date in a sentence that mentions radiation, preferring sentences
/// that describe completion.
fn extract_radiation_date(text: &str) -> ParsedExtraction {
    let mut completion: Vec<(chrono::NaiveDate, String)> = Vec::new();
    let mut other: Vec<(chrono::NaiveDate, String)> = Vec::new();

    for (start, end) in sentence_spans(text) {
        let sentence = &text[start..end];
        if !has_radiation_term(sentence) {
            continue;
        }
        let latest = find_dates(sentence).into_iter().filter_map(|(_, d)| d).max();
        if let Some(date) = latest {
            let bucket = if COMPLETION_RE.is_match(sentence) {
                &mut completion
            } else {
                &mut other
            };
            bucket.push((date, sentence.to_string()));
        }
    }

    let pool = if completion.is_empty() { other } else { completion };
    match pool.into_iter().max_by_key(|(date, _)| *date) {
        Some((date, sentence)) => ParsedExtraction {
            value: ExtractedValue::RadiationDate(RadiationDate::Known(date)),
            cited: vec![sentence],
            model_confidence: None,
            invalid_fields: 0,
            unknown_fields: 0,
        },
        None => ParsedExtraction {
            value: ExtractedValue::RadiationDate(RadiationDate::Unknown),
            cited: Vec::new(),
            model_confidence: None,
            invalid_fields: 0,
            unknown_fields: 1,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn medications(text: &str) -> MedicationStatus {
        match extract_with_patterns(ExtractionType::Medications, text).value {
            ExtractedValue::Medications(s) => s,
            other => panic!("unexpected value: {other:?}"),
        }
    }

    #[test]
    fn increased_steroid_dose() {
        let status = medications("Dexamethasone increased to 4mg BID.");
        assert_eq!(status.steroid_status, SteroidStatus::Increasing);
        assert_eq!(status.avastin_status, AvastinStatus::Unknown);
    }

    #[test]
    fn taper_and_ongoing_avastin() {
        let status = medications("Decadron taper continues. Avastin cycle 4 given today.");
        assert_eq!(status.steroid_status, SteroidStatus::Decreasing);
        assert_eq!(status.avastin_status, AvastinStatus::Ongoing);
    }

    #[test]
    fn first_avastin_dose() {
        let status = medications("Received first dose of bevacizumab.");
        assert_eq!(status.avastin_status, AvastinStatus::FirstTreatment);
    }

    #[test]
    fn negated_mentions_are_none() {
        let status = medications("Patient is off steroids. No Avastin.");
        assert_eq!(status.steroid_status, SteroidStatus::None);
        assert_eq!(status.avastin_status, AvastinStatus::None);
    }

    #[test]
    fn no_change_is_not_a_negation() {
        let status = medications("Dexamethasone 4mg, no change.");
        assert_eq!(status.steroid_status, SteroidStatus::Stable);
    }

    #[test]
    fn negation_applies_to_its_own_drug() {
        let status = medications("Continue Avastin, no steroids at this time.");
        assert_eq!(status.steroid_status, SteroidStatus::None);
        assert_eq!(status.avastin_status, AvastinStatus::Ongoing);

        let status = medications("Dexamethasone was discontinued last month.");
        assert_eq!(status.steroid_status, SteroidStatus::None);
    }

    #[test]
    fn no_mentions_stay_unknown() {
        let parsed = extract_with_patterns(ExtractionType::Medications, "MRI reviewed.");
        assert_eq!(parsed.unknown_fields, 2);
        assert!(parsed.cited.is_empty());
    }

    #[test]
    fn radiation_completion_date_preferred() {
        let text = "Radiation started 8/1/2024. Completed XRT on 10/15/2024. Follow-up MRI 12/1/2024.";
        let parsed = extract_with_patterns(ExtractionType::RadiationDate, text);
        assert_eq!(
            parsed.value,
            ExtractedValue::RadiationDate(RadiationDate::Known(
                NaiveDate::from_ymd_opt(2024, 10, 15).unwrap()
            ))
        );
        assert_eq!(parsed.cited, vec!["Completed XRT on 10/15/2024."]);
    }

    #[test]
    fn dates_without_radiation_context_ignored() {
        let parsed =
            extract_with_patterns(ExtractionType::RadiationDate, "Surgery on 3/2/2023.");
        assert_eq!(parsed.value, ExtractedValue::RadiationDate(RadiationDate::Unknown));
        assert_eq!(parsed.unknown_fields, 1);
    }
}
