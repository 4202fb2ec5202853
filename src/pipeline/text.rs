//! Shared clinical-text scanning: dates, medication mentions, sentences.

use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;

/// Formats a clinical date may be written in, tried in order. Two-digit
/// years come first: chrono's `%Y` would accept "24" as year 24.
const DATE_FORMATS: &[&str] = &[
    "%m/%d/%y",
    "%m/%d/%Y",
    "%Y-%m-%d",
    "%m-%d-%Y",
    "%B %d, %Y",
    "%b %d, %Y",
];

static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:\d{1,2}/\d{1,2}/(?:\d{4}|\d{2})|\d{1,2}-\d{1,2}-\d{4}|\d{4}-\d{2}-\d{2}|(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.? \d{1,2}, \d{4})\b",
    )
    .expect("valid regex")
});

static MEDICATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:dexamethasone|decadron|prednisolone|prednisone|steroids?|avastin|bevacizumab|anti-angiogenic)\b",
    )
    .expect("valid regex")
});

static RADIATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:radiation|radiotherapy|chemoradiation|xrt|imrt|proton therapy)\b")
        .expect("valid regex")
});

const ABBREVIATIONS: &[&str] = &["dr.", "mr.", "mrs.", "ms.", "vs.", "approx.", "e.g.", "i.e.", "q."];

/// A match of one of the scanners, with byte offsets into the scanned text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mention {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// Parse a date written in any of the supported clinical formats.
pub fn parse_clinical_date(raw: &str) -> Option<NaiveDate> {
    let cleaned = raw.trim().replace('.', "");
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&cleaned, fmt).ok())
        .filter(|d| (1900..=2100).contains(&d.year()))
}

pub fn find_dates(text: &str) -> Vec<(Mention, Option<NaiveDate>)> {
    DATE_RE
        .find_iter(text)
        .map(|m| (mention(m), parse_clinical_date(m.as_str())))
        .collect()
}

pub fn find_medications(text: &str) -> Vec<Mention> {
    MEDICATION_RE.find_iter(text).map(mention).collect()
}

pub fn has_date(text: &str) -> bool {
    DATE_RE.is_match(text)
}

pub fn has_radiation_term(text: &str) -> bool {
    RADIATION_RE.is_match(text)
}

fn mention(m: regex::Match<'_>) -> Mention {
    Mention {
        start: m.start(),
        end: m.end(),
        text: m.as_str().to_string(),
    }
}

/// Sentence spans `(start, end)` in byte offsets, trimmed of surrounding
/// whitespace. Periods ending a known abbreviation do not end a sentence.
pub fn sentence_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        let terminal = matches!(c, '.' | '!' | '?' | '\n');
        if !terminal {
            continue;
        }
        let end = i + c.len_utf8();
        let followed_by_break = chars.peek().map_or(true, |(_, next)| next.is_whitespace());
        if c == '.' && (!followed_by_break || ends_with_abbreviation(&text[start..end])) {
            continue;
        }
        push_trimmed(text, start, end, &mut spans);
        start = end;
    }
    push_trimmed(text, start, text.len(), &mut spans);
    spans
}

fn ends_with_abbreviation(segment: &str) -> bool {
    let lower = segment.to_lowercase();
    let last_word = lower.split_whitespace().last().unwrap_or("");
    ABBREVIATIONS.contains(&last_word)
}

fn push_trimmed(text: &str, start: usize, end: usize, spans: &mut Vec<(usize, usize)>) {
    let segment = &text[start..end];
    let lead = segment.len() - segment.trim_start().len();
    let trail = segment.len() - segment.trim_end().len();
    if lead + trail < segment.len() {
        spans.push((start + lead, end - trail));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 10, 15).unwrap();
        for raw in ["10/15/2024", "2024-10-15", "10/15/24", "10-15-2024", "October 15, 2024", "Oct. 15, 2024"] {
            assert_eq!(parse_clinical_date(raw), Some(expected), "format: {raw}");
        }
        assert_eq!(parse_clinical_date("15.10.2024x"), None);
        assert_eq!(parse_clinical_date("unknown"), None);
    }

    #[test]
    fn finds_dates_with_offsets() {
        let text = "XRT completed 5/15/2023; MRI on 2024-01-02.";
        let dates = find_dates(text);
        assert_eq!(dates.len(), 2);
        let (m, d) = &dates[0];
        assert_eq!(&text[m.start..m.end], "5/15/2023");
        assert_eq!(*d, NaiveDate::from_ymd_opt(2023, 5, 15));
    }

    #[test]
    fn finds_medication_mentions() {
        let meds = find_medications("Decadron 4mg; Avastin q2w; steroids tapered.");
        let names: Vec<&str> = meds.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(names, vec!["Decadron", "Avastin", "steroids"]);
    }

    #[test]
    fn radiation_terms_detected() {
        assert!(has_radiation_term("Completed concurrent chemoradiation"));
        assert!(has_radiation_term("s/p XRT"));
        assert!(!has_radiation_term("radial nerve"));
    }

    #[test]
    fn sentences_respect_abbreviations() {
        let text = "Seen by Dr. Smith today. Dexamethasone 4mg daily.  Stable vs. prior.";
        let sentences: Vec<&str> = sentence_spans(text)
            .into_iter()
            .map(|(s, e)| &text[s..e])
            .collect();
        assert_eq!(
            sentences,
            vec!["Seen by Dr. Smith today.", "Dexamethasone 4mg daily.", "Stable vs. prior."]
        );
    }

    #[test]
    fn decimal_points_do_not_split() {
        let text = "Volume 12.5 mL today";
        assert_eq!(sentence_spans(text), vec![(0, text.len())]);
    }
}
