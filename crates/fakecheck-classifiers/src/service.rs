//! Inference service.
//!
//! One worker thread owns the [`TextClassifier`] and drains a bounded queue,
//! so at most one forward pass runs at a time. Callers await a reply under a
//! per-call timeout that covers queue wait and inference. A caller that
//! gives up leaves its job to be skipped or its late result dropped.

use crate::classifier::Classifier;
use crate::model_config::{ModelConfig, ServiceConfig};
use crate::text_classifier::TextClassifier;
use async_trait::async_trait;
use fakecheck_core::{ClassificationRequest, ClassificationResult, Error, Label, Result};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};

const WORKER_THREAD_NAME: &str = "fakecheck-inference";

/// Register metric descriptions with the installed recorder
pub fn describe_metrics() {
    metrics::describe_counter!(
        "fakecheck_inference_total",
        "Completed classifications by predicted label"
    );
    metrics::describe_counter!(
        "fakecheck_inference_errors_total",
        "Failed classification calls by error kind"
    );
    metrics::describe_histogram!(
        "fakecheck_inference_latency_us",
        metrics::Unit::Microseconds,
        "Classification latency in microseconds, queue wait included"
    );
}

enum Payload {
    One(String),
    Batch(Vec<String>),
}

struct Job {
    payload: Payload,
    reply: oneshot::Sender<Result<Vec<ClassificationResult>>>,
}

struct Inner {
    name: String,
    jobs: mpsc::Sender<Job>,
    timeout: Duration,
}

/// Cloneable handle to the inference worker.
///
/// The worker exits once every handle is dropped.
#[derive(Clone)]
pub struct InferenceService {
    inner: Arc<Inner>,
}

impl InferenceService {
    /// Move an already loaded classifier onto a new worker thread
    pub fn spawn(classifier: TextClassifier, config: &ServiceConfig) -> Result<Self> {
        config.validate()?;

        let name = classifier.name().to_string();
        let (jobs, queue) = mpsc::channel(config.queue_capacity);

        std::thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || run_worker(classifier, queue))?;

        tracing::info!(
            classifier = %name,
            timeout_ms = config.timeout_ms,
            queue_capacity = config.queue_capacity,
            "Inference service started"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                name,
                jobs,
                timeout: config.timeout(),
            }),
        })
    }

    /// Load the model off the async runtime, then start the worker.
    ///
    /// Fails with a configuration error when the artifact is missing or
    /// unreadable; no request is ever served in that case.
    pub async fn start(model: &ModelConfig, service: &ServiceConfig) -> Result<Self> {
        model.validate()?;
        service.validate()?;

        let model = model.clone();
        let classifier = tokio::task::spawn_blocking(move || TextClassifier::load(&model))
            .await
            .map_err(|e| Error::config(format!("Model loading task failed: {}", e)))??;

        Self::spawn(classifier, service)
    }

    /// Per-call timeout
    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    /// Classify several texts in one forward pass, results in input order
    pub async fn classify_batch(&self, texts: &[&str]) -> Result<Vec<ClassificationResult>> {
        let start = Instant::now();
        let outcome = self.submit_batch(texts).await;
        match &outcome {
            Ok(results) => results.iter().for_each(|r| record_success(r.label)),
            Err(e) => record_error(e),
        }
        record_latency(start);
        outcome
    }

    async fn submit_batch(&self, texts: &[&str]) -> Result<Vec<ClassificationResult>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        for (idx, text) in texts.iter().enumerate() {
            ClassificationRequest::validate(text)
                .map_err(|e| Error::invalid_input(format!("batch item {}: {}", idx, e)))?;
        }
        let texts = texts.iter().map(|t| t.to_string()).collect();
        self.submit(Payload::Batch(texts)).await
    }

    async fn submit(&self, payload: Payload) -> Result<Vec<ClassificationResult>> {
        let (reply, response) = oneshot::channel();
        let job = Job { payload, reply };

        let round_trip = async {
            self.inner
                .jobs
                .send(job)
                .await
                .map_err(|_| Error::ServiceUnavailable("inference worker has stopped".to_string()))?;
            response.await.map_err(|_| {
                Error::ServiceUnavailable("inference worker dropped the request".to_string())
            })?
        };

        match tokio::time::timeout(self.inner.timeout, round_trip).await {
            Ok(outcome) => outcome,
            Err(_) => Err(Error::Timeout(self.inner.timeout)),
        }
    }
}

#[async_trait]
impl Classifier for InferenceService {
    async fn classify(&self, text: &str) -> Result<ClassificationResult> {
        let start = Instant::now();
        let outcome = match ClassificationRequest::new(text) {
            Ok(request) => self
                .submit(Payload::One(request.into_text()))
                .await
                .and_then(|mut results| {
                    results
                        .pop()
                        .ok_or_else(|| Error::inference("Worker returned no result"))
                }),
            Err(e) => Err(e),
        };

        match &outcome {
            Ok(result) => record_success(result.label),
            Err(e) => record_error(e),
        }
        record_latency(start);
        outcome
    }

    fn name(&self) -> &str {
        &self.inner.name
    }
}

fn run_worker(classifier: TextClassifier, mut queue: mpsc::Receiver<Job>) {
    tracing::debug!(classifier = classifier.name(), "Inference worker running");

    while let Some(Job { payload, reply }) = queue.blocking_recv() {
        if reply.is_closed() {
            tracing::debug!("Skipping request abandoned while queued");
            continue;
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| match &payload {
            Payload::One(text) => classifier.predict(text).map(|result| vec![result]),
            Payload::Batch(texts) => {
                let texts: Vec<&str> = texts.iter().map(String::as_str).collect();
                classifier.predict_batch(&texts)
            }
        }))
        .unwrap_or_else(|_| {
            tracing::error!("Inference panicked; worker continues");
            Err(Error::inference("inference panicked"))
        });

        if reply.send(outcome).is_err() {
            tracing::debug!("Discarding result for a request that timed out");
        }
    }

    tracing::info!("Inference worker stopped");
}

fn error_kind(error: &Error) -> &'static str {
    match error {
        Error::Timeout(_) => "timeout",
        Error::ServiceUnavailable(_) => "unavailable",
        other => other.kind().as_str(),
    }
}

fn record_success(label: Label) {
    metrics::counter!("fakecheck_inference_total", "label" => label.as_str()).increment(1);
}

fn record_error(error: &Error) {
    metrics::counter!("fakecheck_inference_errors_total", "kind" => error_kind(error)).increment(1);
}

fn record_latency(start: Instant) {
    metrics::histogram!("fakecheck_inference_latency_us").record(start.elapsed().as_micros() as f64);
}
