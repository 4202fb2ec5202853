use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Immutable clinical note carried by a single processing request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalNote {
    pub text: String,
    pub note_date: Option<NaiveDate>,
}

impl ClinicalNote {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            note_date: None,
        }
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.note_date = Some(date);
        self
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}
