//! In-memory fakes for the two external capabilities.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::GatewayError;
use crate::skills::{
    Assessment, ClassifierOutput, ExtractedQuery, LanguageModel, SummaryOutput,
};
use crate::tools::{ApiResult, EarthquakeCatalog, EarthquakeQuery, Retrieval};

/// Language model that replays queued outputs. An empty queue behaves like an outage.
#[derive(Default)]
pub struct ScriptedModel {
    classifications: Mutex<VecDeque<ClassifierOutput>>,
    extractions: Mutex<VecDeque<ExtractedQuery>>,
    summaries: Mutex<VecDeque<SummaryOutput>>,
    assessments: Mutex<VecDeque<Assessment>>,
    extract_calls: AtomicUsize,
    summarise_calls: AtomicUsize,
    assess_inputs: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_classification(self, output: ClassifierOutput) -> Self {
        self.classifications.lock().unwrap().push_back(output);
        self
    }

    pub fn with_extraction(self, output: ExtractedQuery) -> Self {
        self.extractions.lock().unwrap().push_back(output);
        self
    }

    pub fn with_summary(self, output: SummaryOutput) -> Self {
        self.summaries.lock().unwrap().push_back(output);
        self
    }

    pub fn with_assessment(self, output: Assessment) -> Self {
        self.assessments.lock().unwrap().push_back(output);
        self
    }

    pub fn extract_calls(&self) -> usize {
        self.extract_calls.load(Ordering::SeqCst)
    }

    pub fn summarise_calls(&self) -> usize {
        self.summarise_calls.load(Ordering::SeqCst)
    }

    pub fn assess_inputs(&self) -> Vec<String> {
        self.assess_inputs.lock().unwrap().clone()
    }
}

fn next<T>(queue: &Mutex<VecDeque<T>>, what: &str) -> anyhow::Result<T> {
    queue
        .lock()
        .unwrap()
        .pop_front()
        .ok_or_else(|| anyhow::anyhow!("no scripted {} left", what))
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn classify(&self, _input: String) -> anyhow::Result<ClassifierOutput> {
        next(&self.classifications, "classification")
    }

    async fn extract(&self, _input: String) -> anyhow::Result<ExtractedQuery> {
        self.extract_calls.fetch_add(1, Ordering::SeqCst);
        next(&self.extractions, "extraction")
    }

    async fn summarise(&self, _input: String) -> anyhow::Result<SummaryOutput> {
        self.summarise_calls.fetch_add(1, Ordering::SeqCst);
        next(&self.summaries, "summary")
    }

    async fn assess(&self, input: String) -> anyhow::Result<Assessment> {
        self.assess_inputs.lock().unwrap().push(input);
        next(&self.assessments, "assessment")
    }
}

type Responder = Box<dyn Fn(&EarthquakeQuery) -> Result<ApiResult, GatewayError> + Send + Sync>;

/// Catalog answering from a closure, validating queries like the real client.
pub struct StubCatalog {
    responder: Responder,
    delays: Vec<Duration>,
    calls: AtomicUsize,
    seen: Mutex<Vec<EarthquakeQuery>>,
}

pub const STUB_BASE_URL: &str = "https://stub.usgs.test/fdsnws/event/1";

impl StubCatalog {
    pub fn new(
        responder: impl Fn(&EarthquakeQuery) -> Result<ApiResult, GatewayError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            delays: Vec::new(),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn unreachable() -> Self {
        Self::new(|_| Err(GatewayError::Unreachable("connection refused".into())))
    }

    /// Per-call delays by call index; later indices default to none.
    pub fn with_delays(mut self, delays: Vec<Duration>) -> Self {
        self.delays = delays;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<EarthquakeQuery> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl EarthquakeCatalog for StubCatalog {
    fn base_url(&self) -> &str {
        STUB_BASE_URL
    }

    async fn fetch(&self, query: &EarthquakeQuery) -> Result<Retrieval, GatewayError> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(query.clone());

        let report = query.validate();
        if !report.is_valid() {
            return Err(GatewayError::InvalidQuery(report.to_string()));
        }

        if let Some(delay) = self.delays.get(index) {
            tokio::time::sleep(*delay).await;
        }

        let result = (self.responder)(query)?;
        Ok(Retrieval {
            url: query.url(STUB_BASE_URL),
            retrieved_at: Utc::now(),
            result,
        })
    }
}
