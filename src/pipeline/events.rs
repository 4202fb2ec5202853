//! Progress events published while a request moves through the pipeline.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{BtradsScore, DegradedMode, ExtractionType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    StageStarted {
        request_id: Uuid,
        stage: String,
    },
    StageCompleted {
        request_id: Uuid,
        stage: String,
        duration_ms: u64,
    },
    ExtractionCompleted {
        request_id: Uuid,
        field: ExtractionType,
        confidence: f32,
    },
    Degraded {
        request_id: Uuid,
        field: ExtractionType,
        mode: DegradedMode,
    },
    DecisionCompleted {
        request_id: Uuid,
        score: BtradsScore,
        confidence: f32,
    },
    Cancelled {
        request_id: Uuid,
        stage: String,
    },
}

/// Receiver of pipeline events. Publishing never fails the pipeline.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: PipelineEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn publish(&self, _event: PipelineEvent) {}
}

/// Forwards events over an mpsc channel.
pub struct ChannelSink {
    tx: Mutex<Sender<PipelineEvent>>,
}

impl ChannelSink {
    pub fn new() -> (Self, Receiver<PipelineEvent>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx: Mutex::new(tx) }, rx)
    }
}

impl EventSink for ChannelSink {
    fn publish(&self, event: PipelineEvent) {
        let Ok(tx) = self.tx.lock() else {
            return;
        };
        if tx.send(event).is_err() {
            tracing::debug!("Event receiver dropped");
        }
    }
}
