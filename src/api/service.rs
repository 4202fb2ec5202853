//! The two external contracts, `extract` and `decide`, plus end-to-end
//! processing, over an assembled pipeline.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::inference_service::{ClientFactory, IdleReaper, InferenceService, InferenceStatus};
use crate::models::{Decision, ExtractedFacts, ExtractionResult, ExtractionType, VolumeInputs};
use crate::pipeline::cancel::CancelFlag;
use crate::pipeline::decision::decide;
use crate::pipeline::extraction::{LlmClient, OllamaClient};
use crate::pipeline::processor::{PatientProcessor, ProcessingOutcome, ProcessingRequest};
use crate::pipeline::retrieval::{
    EmbeddingIndexCache, EmbeddingModel, HybridRetriever, KeywordRelevanceScorer, OllamaEmbedder,
    RelevanceScorer, Reranker, OLLAMA_EMBEDDING_MODEL,
};
use crate::pipeline_config::PipelineConfig;

use super::error::ApiError;

/// How often the reaper checks for idle resources.
const REAPER_INTERVAL: Duration = Duration::from_secs(30);

pub struct BtradsService {
    processor: Arc<PatientProcessor>,
    _reaper: Option<IdleReaper>,
}

impl BtradsService {
    pub fn new(processor: PatientProcessor) -> Self {
        Self {
            processor: Arc::new(processor),
            _reaper: None,
        }
    }

    /// Assemble the pipeline against the local Ollama instance.
    ///
    /// Nothing connects here: the inference client is built on first use
    /// and embedding failures degrade to lexical-only retrieval.
    pub fn from_config(config: PipelineConfig) -> Result<Self, ApiError> {
        config.validate()?;
        let idle = Duration::from_secs(config.idle_timeout_secs);

        let client_config = config.clone();
        let factory: ClientFactory = Box::new(move || {
            let client = OllamaClient::from_config(&client_config)?;
            Ok(Arc::new(client) as Arc<dyn LlmClient>)
        });
        let service = Arc::new(InferenceService::new(factory, &config.model, idle));
        let cache = Arc::new(EmbeddingIndexCache::new(idle));

        let retriever = HybridRetriever::new(
            embedder(&config),
            Arc::clone(&cache),
            config.semantic_weight,
            config.lexical_weight,
        );
        let reranker = Reranker::new(Some(relevance_scorer()));
        let reaper = IdleReaper::start(&service, &cache, REAPER_INTERVAL);

        tracing::info!(
            model = %config.model,
            url = %config.ollama_url,
            "BT-RADS service assembled"
        );
        let processor = PatientProcessor::new(config, service, retriever, reranker)?;
        Ok(Self {
            processor: Arc::new(processor),
            _reaper: Some(reaper),
        })
    }

    pub fn processor(&self) -> &Arc<PatientProcessor> {
        &self.processor
    }

    /// Extract one fact. `extraction_type` is `medications` or
    /// `radiation_date`; `use_rag = false` sends the whole note.
    pub fn extract(
        &self,
        note: &str,
        extraction_type: &str,
        use_rag: bool,
    ) -> Result<ExtractionResult, ApiError> {
        let field = ExtractionType::from_str(extraction_type).map_err(|_| {
            ApiError::BadRequest(format!("Unrecognised extraction type: {extraction_type}"))
        })?;
        if note.trim().is_empty() {
            return Err(ApiError::BadRequest("Clinical note is empty".into()));
        }
        Ok(self
            .processor
            .extract_field(note, field, use_rag, &CancelFlag::new())?)
    }

    /// Score a study from already-extracted facts. Pure.
    pub fn decide(
        &self,
        facts: &ExtractedFacts,
        volumes: &VolumeInputs,
    ) -> Result<Decision, ApiError> {
        Ok(decide(facts, volumes, self.processor.config())?)
    }

    pub fn process(
        &self,
        request: &ProcessingRequest,
        cancel: &CancelFlag,
    ) -> Result<ProcessingOutcome, ApiError> {
        Ok(self.processor.process(request, cancel)?)
    }

    pub async fn process_async(
        &self,
        request: ProcessingRequest,
        cancel: CancelFlag,
    ) -> Result<ProcessingOutcome, ApiError> {
        Ok(Arc::clone(&self.processor)
            .process_async(request, cancel)
            .await?)
    }

    pub fn status(&self) -> InferenceStatus {
        self.processor.service().status()
    }

    pub fn shutdown(&self) {
        tracing::info!("BT-RADS service shutting down");
        self.processor.service().shutdown();
    }
}

/// Local ONNX embedder when built with it and its model is installed,
/// otherwise Ollama embeddings.
fn embedder(config: &PipelineConfig) -> Option<Arc<dyn EmbeddingModel>> {
    #[cfg(feature = "onnx-embeddings")]
    {
        use crate::pipeline::retrieval::OnnxEmbedder;
        match OnnxEmbedder::load(&crate::config::embedding_model_dir()) {
            Ok(model) => return Some(Arc::new(model)),
            Err(e) => tracing::warn!(error = %e, "ONNX embedder unavailable, using Ollama"),
        }
    }

    match OllamaEmbedder::new(
        &config.ollama_url,
        OLLAMA_EMBEDDING_MODEL,
        config.retrieval_timeout_secs,
    ) {
        Ok(model) => Some(Arc::new(model)),
        Err(e) => {
            tracing::warn!(error = %e, "No embedding backend, retrieval will be lexical-only");
            None
        }
    }
}

/// Cross-encoder when built with it and its model is installed, otherwise
/// keyword scoring.
fn relevance_scorer() -> Arc<dyn RelevanceScorer> {
    #[cfg(feature = "onnx-embeddings")]
    {
        use crate::pipeline::retrieval::OnnxCrossEncoder;
        match OnnxCrossEncoder::load(&crate::config::reranker_model_dir()) {
            Ok(model) => return Arc::new(model),
            Err(e) => tracing::warn!(error = %e, "Cross-encoder unavailable, using keyword scoring"),
        }
    }
    Arc::new(KeywordRelevanceScorer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BtradsScore, ClinicalNote};
    use crate::pipeline::extraction::MockLlmClient;

    const RESPONSE: &str = r#"{"steroid_status": "increasing", "avastin_status": "none",
        "radiation_date": "unknown", "evidence": [], "confidence": 0.8}"#;

    fn service() -> BtradsService {
        let client: Arc<dyn LlmClient> = Arc::new(MockLlmClient::new(RESPONSE));
        let inference = Arc::new(InferenceService::with_client(
            client,
            "mock",
            Duration::from_secs(600),
        ));
        let processor = PatientProcessor::new(
            PipelineConfig::default(),
            inference,
            HybridRetriever::lexical_only(),
            Reranker::identity(),
        )
        .unwrap();
        BtradsService::new(processor)
    }

    #[test]
    fn extract_rejects_unknown_type() {
        let err = service().extract("Dexamethasone 4mg.", "labs", true).unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(err.to_string().contains("labs"));
    }

    #[test]
    fn extract_rejects_empty_note() {
        let err = service().extract("  ", "medications", true).unwrap_err();
        assert_eq!(err.code(), "BAD_REQUEST");
    }

    #[test]
    fn extract_returns_result() {
        let result = service()
            .extract("Dexamethasone increased to 4mg.", "medications", false)
            .unwrap();
        assert_eq!(result.field, ExtractionType::Medications);
    }

    #[test]
    fn decide_is_pure_and_validates_input() {
        let svc = service();
        let facts = ExtractedFacts {
            prior_available: Some(true),
            ..Default::default()
        };
        let volumes = VolumeInputs {
            flair_change_pct: Some(2.0),
            enhancement_change_pct: Some(-4.0),
            ..Default::default()
        };
        let first = svc.decide(&facts, &volumes).unwrap();
        assert_eq!(first.score, BtradsScore::Bt2);
        assert_eq!(first, svc.decide(&facts, &volumes).unwrap());

        let err = svc.decide(&facts, &VolumeInputs::default()).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn shutdown_makes_extraction_unavailable() {
        let svc = service();
        svc.shutdown();
        assert!(svc.status().shut_down);
        let err = svc
            .extract("Dexamethasone 4mg.", "medications", false)
            .unwrap_err();
        assert_eq!(err.status_code(), 503);
    }

    #[tokio::test]
    async fn process_async_scores_steroid_response() {
        let mut request = ProcessingRequest::new(
            ClinicalNote::new("Dexamethasone increased to 4mg. Scan shows less edema."),
            VolumeInputs {
                flair_change_pct: Some(-25.0),
                enhancement_change_pct: Some(-15.0),
                ..Default::default()
            },
        );
        request.prior_available = Some(true);
        let outcome = service()
            .process_async(request, CancelFlag::new())
            .await
            .unwrap();
        assert_eq!(outcome.decision.score, BtradsScore::Bt1b);
    }

    #[test]
    fn cancelled_process_maps_to_499() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let request = ProcessingRequest::new(
            ClinicalNote::new("Dexamethasone 4mg."),
            VolumeInputs::default(),
        );
        let err = service().process(&request, &cancel).unwrap_err();
        assert_eq!(err.status_code(), 499);
    }
}
