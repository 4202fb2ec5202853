//! Request orchestrator.
//!
//! Drives one follow-up study through the pipeline:
//! chunk → retrieve → rerank → extract (medications ‖ radiation date) →
//! decide → validate.
//!
//! Every backend is injected, so the orchestrator runs unchanged against
//! mock clients in tests.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::inference_service::InferenceService;
use crate::models::{
    ClinicalNote, Decision, DegradedMode, ExtractedFacts, ExtractionMethod, ExtractionResult,
    ExtractionType, RerankMode, RetrievalMode, VolumeInputs,
};
use crate::pipeline::cancel::CancelFlag;
use crate::pipeline::consistency::{validate, ValidationReport, ValidationSubject};
use crate::pipeline::decision::{decide, DecisionError};
use crate::pipeline::events::{EventSink, NoopSink, PipelineEvent};
use crate::pipeline::extraction::{
    extract_with_patterns, located_count, missing_info_for, retrieval_query, score_extraction,
    ConfidenceInputs, EvidenceLocator, ExtractionClient, ExtractionError,
};
use crate::pipeline::retrieval::{
    Chunker, HybridRetriever, NoteChunker, RerankedCandidate, Reranker, RetrievalError,
};
use crate::pipeline_config::PipelineConfig;

/// Separator between retrieved chunks in the prompt context.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Decision failed: {0}")]
    Decision(#[from] DecisionError),

    #[error("Request cancelled during {0}")]
    Cancelled(&'static str),

    #[error("{0} worker panicked")]
    WorkerPanicked(&'static str),
}

// ---------------------------------------------------------------------------
// Request and result types
// ---------------------------------------------------------------------------

/// One follow-up study to score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingRequest {
    pub note: ClinicalNote,
    pub volumes: VolumeInputs,
    #[serde(default)]
    pub prior_available: Option<bool>,
    #[serde(default)]
    pub progressive_over_prior_studies: Option<bool>,
    #[serde(default = "default_use_rag")]
    pub use_rag: bool,
}

fn default_use_rag() -> bool {
    true
}

impl ProcessingRequest {
    pub fn new(note: ClinicalNote, volumes: VolumeInputs) -> Self {
        Self {
            note,
            volumes,
            prior_available: None,
            progressive_over_prior_studies: None,
            use_rag: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingOutcome {
    pub request_id: Uuid,
    pub medications: ExtractionResult,
    pub radiation: ExtractionResult,
    pub facts: ExtractedFacts,
    pub decision: Decision,
    pub validation: ValidationReport,
    pub processing_time_seconds: f64,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct PatientProcessor {
    config: PipelineConfig,
    extraction: ExtractionClient,
    chunker: NoteChunker,
    retriever: HybridRetriever,
    reranker: Reranker,
    sink: Arc<dyn EventSink>,
}

impl PatientProcessor {
    pub fn new(
        config: PipelineConfig,
        service: Arc<InferenceService>,
        retriever: HybridRetriever,
        reranker: Reranker,
    ) -> Result<Self, RetrievalError> {
        let chunker = NoteChunker::new(config.chunk_size, config.chunk_overlap)?;
        Ok(Self {
            extraction: ExtractionClient::from_config(service, &config),
            config,
            chunker,
            retriever,
            reranker,
            sink: Arc::new(NoopSink),
        })
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn service(&self) -> &Arc<InferenceService> {
        self.extraction.service()
    }

    /// Extract one field from a note.
    pub fn extract_field(
        &self,
        note: &str,
        field: ExtractionType,
        use_rag: bool,
        cancel: &CancelFlag,
    ) -> Result<ExtractionResult, ExtractionError> {
        self.extract_for(Uuid::new_v4(), note, field, use_rag, cancel)
    }

    fn extract_for(
        &self,
        request_id: Uuid,
        note: &str,
        field: ExtractionType,
        use_rag: bool,
        cancel: &CancelFlag,
    ) -> Result<ExtractionResult, ExtractionError> {
        let started = Instant::now();
        if note.trim().is_empty() {
            return Err(ExtractionError::EmptyNote);
        }
        if cancel.is_cancelled() {
            return Err(ExtractionError::Cancelled);
        }

        let context = self.build_context(note, field, use_rag, cancel)?;
        let mut degraded = context.degraded();

        let (parsed, method, model_name) =
            match self.extraction.extract(field, &context.text, cancel) {
                Ok(answer) => (answer.parsed, ExtractionMethod::Llm, answer.model_name),
                Err(e) if e.is_unavailable() && self.config.allow_pattern_fallback => {
                    tracing::warn!(
                        field = %field,
                        error = %e,
                        "Inference unavailable, falling back to pattern extraction"
                    );
                    degraded.push(DegradedMode::PatternExtraction);
                    (
                        extract_with_patterns(field, note),
                        ExtractionMethod::Pattern,
                        "pattern".to_string(),
                    )
                }
                Err(e) => return Err(e),
            };

        for mode in &degraded {
            self.sink.publish(PipelineEvent::Degraded {
                request_id,
                field,
                mode: *mode,
            });
        }

        let evidence = EvidenceLocator::new(note, field, &context.candidates)
            .locate(&parsed.value, &parsed.cited);
        let confidence_score = score_extraction(&ConfidenceInputs {
            model_confidence: parsed.model_confidence,
            located_evidence: located_count(&evidence),
            unknown_fields: parsed.unknown_fields,
            invalid_fields: parsed.invalid_fields,
            degraded_tags: degraded.len(),
            method,
        });
        let missing_info = missing_info_for(
            &parsed.value,
            confidence_score,
            self.config.missing_info_confidence_threshold,
        );

        tracing::info!(
            field = %field,
            method = %method,
            confidence = confidence_score,
            evidence = evidence.len(),
            degraded = degraded.len(),
            "Extraction complete"
        );
        self.sink.publish(PipelineEvent::ExtractionCompleted {
            request_id,
            field,
            confidence: confidence_score,
        });

        Ok(ExtractionResult {
            field,
            value: parsed.value,
            confidence_score,
            evidence,
            method,
            model_name,
            processing_time_seconds: started.elapsed().as_secs_f64(),
            retrieval_mode: context.retrieval_mode,
            rerank_mode: context.rerank_mode,
            degraded,
            missing_info,
        })
    }

    /// Chunk, retrieve and rerank, or pass the note through whole.
    fn build_context(
        &self,
        note: &str,
        field: ExtractionType,
        use_rag: bool,
        cancel: &CancelFlag,
    ) -> Result<PromptContext, ExtractionError> {
        if !use_rag {
            return Ok(PromptContext {
                text: truncate_chars(note, self.config.full_report_max_chars).to_string(),
                candidates: Vec::new(),
                retrieval_mode: RetrievalMode::FullText,
                rerank_mode: RerankMode::Skipped,
            });
        }

        let query = retrieval_query(field);
        let chunks = self.chunker.chunk(note);
        let retrieval = self
            .retriever
            .retrieve(query, &chunks, self.config.retrieval_top_n);
        if cancel.is_cancelled() {
            return Err(ExtractionError::Cancelled);
        }
        let reranked = self
            .reranker
            .rerank(query, &retrieval.candidates, self.config.rerank_top_k);

        tracing::debug!(
            field = %field,
            chunks = chunks.len(),
            retrieval = %retrieval.mode,
            rerank = %reranked.mode,
            "Context assembled"
        );

        let text = reranked
            .candidates
            .iter()
            .map(|c| c.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR);
        Ok(PromptContext {
            text,
            candidates: reranked.candidates,
            retrieval_mode: retrieval.mode,
            rerank_mode: reranked.mode,
        })
    }

    /// Extract both facts concurrently, then decide and validate.
    pub fn process(
        &self,
        request: &ProcessingRequest,
        cancel: &CancelFlag,
    ) -> Result<ProcessingOutcome, ProcessingError> {
        let started = Instant::now();
        let request_id = Uuid::new_v4();
        if request.note.is_blank() {
            return Err(ExtractionError::EmptyNote.into());
        }
        self.check_cancelled(request_id, "extraction", cancel)?;

        self.stage_started(request_id, "extraction");
        let stage_started = Instant::now();
        let note = request.note.text.as_str();
        let use_rag = request.use_rag;
        let (medications, radiation) = std::thread::scope(|s| {
            let meds = s.spawn(|| {
                self.extract_for(request_id, note, ExtractionType::Medications, use_rag, cancel)
            });
            let rad = s.spawn(|| {
                self.extract_for(request_id, note, ExtractionType::RadiationDate, use_rag, cancel)
            });
            (meds.join(), rad.join())
        });
        let medications =
            medications.map_err(|_| ProcessingError::WorkerPanicked("Medication extraction"))?;
        let radiation =
            radiation.map_err(|_| ProcessingError::WorkerPanicked("Radiation extraction"))?;

        let cancelled = |r: &Result<ExtractionResult, ExtractionError>| {
            matches!(r, Err(ExtractionError::Cancelled))
        };
        if cancelled(&medications) || cancelled(&radiation) {
            self.sink.publish(PipelineEvent::Cancelled {
                request_id,
                stage: "extraction".into(),
            });
            return Err(ProcessingError::Cancelled("extraction"));
        }
        let medications = medications?;
        let radiation = radiation?;
        self.stage_completed(request_id, "extraction", stage_started);

        self.check_cancelled(request_id, "decision", cancel)?;
        self.stage_started(request_id, "decision");
        let stage_started = Instant::now();

        let mut facts = ExtractedFacts::from_results(&medications, &radiation);
        facts.prior_available = request.prior_available;
        facts.progressive_over_prior_studies = request.progressive_over_prior_studies;

        let decision = decide(&facts, &request.volumes, &self.config)?;
        let validation = validate(&ValidationSubject::from_decision(
            &decision,
            &facts,
            &request.volumes,
            &self.config,
        ));
        for warning in &validation.warnings {
            tracing::warn!(request_id = %request_id, warning = %warning, "Consistency warning");
        }
        self.stage_completed(request_id, "decision", stage_started);
        self.sink.publish(PipelineEvent::DecisionCompleted {
            request_id,
            score: decision.score,
            confidence: decision.confidence.overall,
        });

        Ok(ProcessingOutcome {
            request_id,
            medications,
            radiation,
            facts,
            decision,
            validation,
            processing_time_seconds: started.elapsed().as_secs_f64(),
        })
    }

    /// [`process`](Self::process) on the blocking thread pool.
    pub async fn process_async(
        self: Arc<Self>,
        request: ProcessingRequest,
        cancel: CancelFlag,
    ) -> Result<ProcessingOutcome, ProcessingError> {
        tokio::task::spawn_blocking(move || self.process(&request, &cancel))
            .await
            .map_err(|_| ProcessingError::WorkerPanicked("Processing"))?
    }

    fn check_cancelled(
        &self,
        request_id: Uuid,
        stage: &'static str,
        cancel: &CancelFlag,
    ) -> Result<(), ProcessingError> {
        if !cancel.is_cancelled() {
            return Ok(());
        }
        tracing::info!(request_id = %request_id, stage, "Request cancelled");
        self.sink.publish(PipelineEvent::Cancelled {
            request_id,
            stage: stage.into(),
        });
        Err(ProcessingError::Cancelled(stage))
    }

    fn stage_started(&self, request_id: Uuid, stage: &str) {
        tracing::debug!(request_id = %request_id, stage, "Stage started");
        self.sink.publish(PipelineEvent::StageStarted {
            request_id,
            stage: stage.into(),
        });
    }

    fn stage_completed(&self, request_id: Uuid, stage: &str, started: Instant) {
        let duration_ms = started.elapsed().as_millis() as u64;
        tracing::debug!(request_id = %request_id, stage, duration_ms, "Stage completed");
        self.sink.publish(PipelineEvent::StageCompleted {
            request_id,
            stage: stage.into(),
            duration_ms,
        });
    }
}

/// Text sent to the model and the chunks it was drawn from.
struct PromptContext {
    text: String,
    candidates: Vec<RerankedCandidate>,
    retrieval_mode: RetrievalMode,
    rerank_mode: RerankMode,
}

impl PromptContext {
    fn degraded(&self) -> Vec<DegradedMode> {
        let mut tags = Vec::new();
        if self.retrieval_mode == RetrievalMode::LexicalOnly {
            tags.push(DegradedMode::LexicalOnlyRetrieval);
        }
        if self.rerank_mode == RerankMode::Identity {
            tags.push(DegradedMode::IdentityRerank);
        }
        tags
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// At most `max_chars` characters of `text`, cut on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use chrono::NaiveDate;

    use crate::models::{AvastinStatus, BtradsScore, RadiationDate, SteroidStatus};
    use crate::pipeline::events::ChannelSink;
    use crate::pipeline::extraction::{LlmClient, MockLlmClient};
    use crate::pipeline::retrieval::{EmbeddingIndexCache, KeywordRelevanceScorer, MockEmbedder};

    const NOTE: &str = "Interval history: patient tolerating treatment. \
        Completed radiation on 10/15/2024 with concurrent temozolomide. \
        Continue Avastin, third cycle today. No steroids at this time.";

    /// Valid for both fields; each parser reads only its own keys.
    const RESPONSE: &str = r#"{
        "steroid_status": "none",
        "avastin_status": "ongoing",
        "radiation_date": "10/15/2024",
        "evidence": ["Completed radiation on 10/15/2024", "Continue Avastin, third cycle today."],
        "confidence": 0.9
    }"#;

    fn service(client: Arc<dyn LlmClient>) -> Arc<InferenceService> {
        Arc::new(InferenceService::with_client(client, "mock", Duration::from_secs(600)))
    }

    fn fast_config() -> PipelineConfig {
        PipelineConfig {
            retry_backoff_ms: 1,
            ..Default::default()
        }
    }

    fn hybrid_processor(config: PipelineConfig, client: Arc<dyn LlmClient>) -> PatientProcessor {
        let retriever = HybridRetriever::new(
            Some(Arc::new(MockEmbedder::new())),
            Arc::new(EmbeddingIndexCache::default()),
            config.semantic_weight,
            config.lexical_weight,
        );
        let reranker = Reranker::new(Some(Arc::new(KeywordRelevanceScorer)));
        PatientProcessor::new(config, service(client), retriever, reranker).unwrap()
    }

    fn lexical_processor(config: PipelineConfig, client: Arc<dyn LlmClient>) -> PatientProcessor {
        PatientProcessor::new(
            config,
            service(client),
            HybridRetriever::lexical_only(),
            Reranker::identity(),
        )
        .unwrap()
    }

    fn unreachable_service() -> Arc<InferenceService> {
        Arc::new(InferenceService::new(
            Box::new(|| Err(ExtractionError::OllamaConnection("http://127.0.0.1:9".into()))),
            "mock",
            Duration::from_secs(600),
        ))
    }

    fn improved_request() -> ProcessingRequest {
        let mut request = ProcessingRequest::new(
            ClinicalNote::new(NOTE),
            VolumeInputs {
                flair_change_pct: Some(-20.0),
                enhancement_change_pct: Some(-30.0),
                followup_date: NaiveDate::from_ymd_opt(2025, 3, 1),
                ..Default::default()
            },
        );
        request.prior_available = Some(true);
        request
    }

    #[test]
    fn extracts_radiation_date_with_located_evidence() {
        let processor = hybrid_processor(fast_config(), Arc::new(MockLlmClient::new(RESPONSE)));
        let result = processor
            .extract_field(NOTE, ExtractionType::RadiationDate, true, &CancelFlag::new())
            .unwrap();

        assert_eq!(
            result.radiation_date(),
            Some(RadiationDate::Known(NaiveDate::from_ymd_opt(2024, 10, 15).unwrap()))
        );
        assert_eq!(result.method, ExtractionMethod::Llm);
        assert_eq!(result.retrieval_mode, RetrievalMode::Hybrid);
        assert_eq!(result.rerank_mode, RerankMode::Scored);
        assert!(result.degraded.is_empty());
        let located: Vec<_> = result.evidence.iter().filter(|e| e.located).collect();
        assert!(!located.is_empty());
        for item in located {
            assert_eq!(&NOTE[item.start_index..item.end_index], item.source_text);
        }
        assert!(result.evidence.iter().any(|e| e.source_text.contains("10/15/2024")));
    }

    #[test]
    fn lexical_retrieval_and_identity_rerank_are_tagged() {
        let processor = lexical_processor(fast_config(), Arc::new(MockLlmClient::new(RESPONSE)));
        let result = processor
            .extract_field(NOTE, ExtractionType::Medications, true, &CancelFlag::new())
            .unwrap();
        assert_eq!(
            result.degraded,
            vec![DegradedMode::LexicalOnlyRetrieval, DegradedMode::IdentityRerank]
        );
        assert_eq!(
            result.medications().unwrap().avastin_status,
            AvastinStatus::Ongoing
        );
    }

    #[test]
    fn full_text_mode_skips_retrieval() {
        let processor = lexical_processor(fast_config(), Arc::new(MockLlmClient::new(RESPONSE)));
        let result = processor
            .extract_field(NOTE, ExtractionType::Medications, false, &CancelFlag::new())
            .unwrap();
        assert_eq!(result.retrieval_mode, RetrievalMode::FullText);
        assert_eq!(result.rerank_mode, RerankMode::Skipped);
        assert!(result.degraded.is_empty());
    }

    #[test]
    fn empty_note_is_rejected_without_calls() {
        let client = Arc::new(MockLlmClient::new(RESPONSE));
        let processor = lexical_processor(fast_config(), client.clone());
        let err = processor
            .extract_field("   \n", ExtractionType::Medications, true, &CancelFlag::new())
            .unwrap_err();
        assert!(matches!(err, ExtractionError::EmptyNote));
        assert_eq!(client.calls(), 0);
    }

    #[test]
    fn unavailable_backend_without_fallback_fails() {
        let config = PipelineConfig {
            max_attempts: 1,
            ..fast_config()
        };
        let processor = PatientProcessor::new(
            config,
            unreachable_service(),
            HybridRetriever::lexical_only(),
            Reranker::identity(),
        )
        .unwrap();
        let err = processor
            .extract_field(NOTE, ExtractionType::Medications, true, &CancelFlag::new())
            .unwrap_err();
        assert!(err.is_unavailable());
    }

    #[test]
    fn pattern_fallback_when_enabled() {
        let config = PipelineConfig {
            max_attempts: 1,
            allow_pattern_fallback: true,
            ..fast_config()
        };
        let processor = PatientProcessor::new(
            config,
            unreachable_service(),
            HybridRetriever::lexical_only(),
            Reranker::identity(),
        )
        .unwrap();
        let result = processor
            .extract_field(NOTE, ExtractionType::Medications, false, &CancelFlag::new())
            .unwrap();
        assert_eq!(result.method, ExtractionMethod::Pattern);
        assert_eq!(result.degraded, vec![DegradedMode::PatternExtraction]);
        assert!(result.confidence_score <= 60.0);
        let meds = result.medications().unwrap();
        assert_eq!(meds.avastin_status, AvastinStatus::Ongoing);
        assert_eq!(meds.steroid_status, SteroidStatus::None);
    }

    #[test]
    fn process_scores_the_study() {
        let (sink, rx) = ChannelSink::new();
        let processor = hybrid_processor(fast_config(), Arc::new(MockLlmClient::new(RESPONSE)))
            .with_sink(Arc::new(sink));
        let outcome = processor
            .process(&improved_request(), &CancelFlag::new())
            .unwrap();

        // Ongoing Avastin with both components improved
        assert_eq!(outcome.decision.score, BtradsScore::Bt1a);
        assert!(outcome.validation.is_valid);
        assert_eq!(
            outcome.facts.radiation_date.and_then(|r| r.date()),
            NaiveDate::from_ymd_opt(2024, 10, 15)
        );

        let events: Vec<PipelineEvent> = rx.try_iter().collect();
        let extractions = events
            .iter()
            .filter(|e| matches!(e, PipelineEvent::ExtractionCompleted { .. }))
            .count();
        assert_eq!(extractions, 2);
        assert!(matches!(
            events.last(),
            Some(PipelineEvent::DecisionCompleted { score: BtradsScore::Bt1a, .. })
        ));
    }

    #[test]
    fn documented_radiation_note_scores_treatment_effect() {
        const SCENARIO_NOTE: &str =
            "Patient on dexamethasone 4mg daily... radiation therapy on 10/15/2024";
        const SCENARIO_RESPONSE: &str = r#"{
            "steroid_status": "stable",
            "avastin_status": "none",
            "radiation_date": "10/15/2024",
            "evidence": ["radiation therapy on 10/15/2024", "Patient on dexamethasone 4mg daily"],
            "confidence": 0.9
        }"#;

        let processor =
            lexical_processor(fast_config(), Arc::new(MockLlmClient::new(SCENARIO_RESPONSE)));
        let mut request = ProcessingRequest::new(
            ClinicalNote::new(SCENARIO_NOTE),
            VolumeInputs {
                flair_change_pct: Some(15.0),
                enhancement_change_pct: Some(20.0),
                followup_date: NaiveDate::from_ymd_opt(2024, 12, 1),
                ..Default::default()
            },
        );
        request.prior_available = Some(true);
        let outcome = processor.process(&request, &CancelFlag::new()).unwrap();

        assert_eq!(
            outcome.radiation.radiation_date(),
            Some(RadiationDate::Known(NaiveDate::from_ymd_opt(2024, 10, 15).unwrap()))
        );
        let dated = outcome
            .radiation
            .evidence
            .iter()
            .find(|e| e.source_text.contains("10/15/2024"))
            .unwrap();
        assert!(dated.located);
        assert_eq!(&SCENARIO_NOTE[dated.start_index..dated.end_index], dated.source_text);
        assert_eq!(
            outcome.medications.medications().unwrap().steroid_status,
            SteroidStatus::Stable
        );

        // 47 days after radiation
        assert_eq!(outcome.decision.score, BtradsScore::Bt3a);
        let labels: Vec<&str> = outcome.decision.path.labels().collect();
        assert_eq!(
            labels,
            vec!["NOTE_RECEIVED", "SUITABLE_PRIOR", "WORSE", "WITHIN_90_DAYS"]
        );
        assert!(outcome.validation.is_valid);
    }

    #[test]
    fn cancelled_request_returns_cancelled() {
        let (sink, rx) = ChannelSink::new();
        let client = Arc::new(MockLlmClient::new(RESPONSE));
        let processor = lexical_processor(fast_config(), client.clone()).with_sink(Arc::new(sink));
        let cancel = CancelFlag::new();
        cancel.cancel();

        let err = processor.process(&improved_request(), &cancel).unwrap_err();
        assert!(matches!(err, ProcessingError::Cancelled("extraction")));
        assert_eq!(client.calls(), 0);
        assert!(rx
            .try_iter()
            .any(|e| matches!(e, PipelineEvent::Cancelled { .. })));
    }

    #[test]
    fn malformed_volumes_fail_the_decision() {
        let processor = lexical_processor(fast_config(), Arc::new(MockLlmClient::new(RESPONSE)));
        let mut request = improved_request();
        request.volumes.enhancement_change_pct = None;
        let err = processor.process(&request, &CancelFlag::new()).unwrap_err();
        assert!(matches!(
            err,
            ProcessingError::Decision(DecisionError::MissingVolumeData(_))
        ));
    }

    #[tokio::test]
    async fn process_async_runs_on_blocking_pool() {
        let processor = Arc::new(lexical_processor(
            fast_config(),
            Arc::new(MockLlmClient::new(RESPONSE)),
        ));
        let outcome = processor
            .process_async(improved_request(), CancelFlag::new())
            .await
            .unwrap();
        assert_eq!(outcome.decision.score, BtradsScore::Bt1a);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 5), "");
    }
}
