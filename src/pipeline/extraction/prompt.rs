//! Field-specific prompts: a system message with the JSON response contract,
//! two few-shot exchanges, then the note context as the final user turn.

use crate::models::ExtractionType;

use super::types::ChatMessage;

pub const MEDICATION_SYSTEM_PROMPT: &str = r#"You are an expert medical data extractor specializing in brain tumor patient medication management.

Extract the CURRENT medication status from the clinical note.

STEROID STATUS (dexamethasone, decadron, prednisolone, prednisone):
- "none": not currently on steroids
- "stable": continues on the same dose
- "increasing": dose being increased
- "decreasing": dose being tapered
- "started": newly started
- "unknown": cannot be determined from the note

AVASTIN STATUS (Avastin, bevacizumab, anti-angiogenic therapy):
- "none": not on Avastin
- "ongoing": continuing established therapy
- "first_treatment": clearly the first dose or cycle
- "started": recently started
- "unknown": cannot be determined from the note

Be conservative: use "unknown" when uncertain.

Respond with ONLY a JSON object:
{"steroid_status": "...", "avastin_status": "...", "evidence": ["exact sentence copied from the note"], "confidence": 0.0-1.0}"#;

pub const RADIATION_SYSTEM_PROMPT: &str = r#"You are an expert medical data extractor specializing in brain tumor treatment timelines.

Find when the patient COMPLETED their most recent course of radiation therapy (XRT, chemoradiation, IMRT, proton therapy). Report the completion date, not the start date.

Respond with ONLY a JSON object:
{"radiation_date": "MM/DD/YYYY" or "unknown", "evidence": ["exact sentence copied from the note"], "confidence": 0.0-1.0}"#;

const MEDICATION_FEW_SHOTS: &[(&str, &str)] = &[
    (
        "Current Medications: Dexamethasone 4mg daily (increased from 2mg last week)",
        r#"{"steroid_status": "increasing", "avastin_status": "none", "evidence": ["Dexamethasone 4mg daily (increased from 2mg last week)"], "confidence": 0.9}"#,
    ),
    (
        "Treatment plan: Continue Avastin 10mg/kg IV q2 weeks. Third cycle today.",
        r#"{"steroid_status": "unknown", "avastin_status": "ongoing", "evidence": ["Continue Avastin 10mg/kg IV q2 weeks."], "confidence": 0.85}"#,
    ),
];

const RADIATION_FEW_SHOTS: &[(&str, &str)] = &[
    (
        "Completed concurrent chemoradiation on 5/15/2023. Started temozolomide maintenance.",
        r#"{"radiation_date": "5/15/2023", "evidence": ["Completed concurrent chemoradiation on 5/15/2023."], "confidence": 0.95}"#,
    ),
    (
        "History: Brain tumor diagnosed 2022. Multiple surgeries. No radiation mentioned.",
        r#"{"radiation_date": "unknown", "evidence": [], "confidence": 0.8}"#,
    ),
];

/// Retrieval query used to rank note chunks for a field.
pub fn retrieval_query(field: ExtractionType) -> &'static str {
    match field {
        ExtractionType::Medications => {
            "medications steroids dexamethasone avastin bevacizumab treatment"
        }
        ExtractionType::RadiationDate => "radiation therapy XRT completed finished date",
    }
}

pub fn system_prompt(field: ExtractionType) -> &'static str {
    match field {
        ExtractionType::Medications => MEDICATION_SYSTEM_PROMPT,
        ExtractionType::RadiationDate => RADIATION_SYSTEM_PROMPT,
    }
}

fn few_shots(field: ExtractionType) -> &'static [(&'static str, &'static str)] {
    match field {
        ExtractionType::Medications => MEDICATION_FEW_SHOTS,
        ExtractionType::RadiationDate => RADIATION_FEW_SHOTS,
    }
}

/// Assemble the chat transcript for one extraction.
pub fn build_messages(field: ExtractionType, context: &str) -> Vec<ChatMessage> {
    let shots = few_shots(field);
    let mut messages = Vec::with_capacity(2 + shots.len() * 2);
    messages.push(ChatMessage::system(system_prompt(field)));
    for (user, assistant) in shots {
        messages.push(ChatMessage::user(*user));
        messages.push(ChatMessage::assistant(*assistant));
    }
    messages.push(ChatMessage::user(format!("Clinical note:\n{context}")));
    messages
}
