//! Query engine: the request boundary of the pipeline.
//!
//! `answer` runs one question through every stage:
//!
//! ```text
//! sanitize -> extract -> plan -> fetch (concurrent, deadline-bounded)
//!          -> annotate + assess -> assemble -> audit
//! ```
//!
//! Only invalid input is returned as an error. Provider failures arrive as
//! fallback data and show up in the quality assessment and provenance.

use crate::assembler::Assembler;
use crate::audit::{AuditEvent, AuditLog, QueryEvent, SourceEvent};
use crate::extractor::{GazetteerExtractor, IntentExtractor};
use crate::router::{default_plan, plan_query, QueryPlan};
use crate::types::{AnswerPayload, Provenance, QueryDescriptor};
use crate::validator::{GroupedRecords, Validator};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use samarth_core::config::QualityConfig;
use samarth_core::{AppConfig, AppError, AppResult};
use samarth_narrative::TemplateSet;
use samarth_sources::{create_adapters, create_cache, AdapterSet, FetchOutcome, Origin, ProviderRequest};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::Instant as Deadline;
use uuid::Uuid;

/// Longest question accepted, in characters.
pub const MAX_QUESTION_CHARS: usize = 500;

/// Sequences stripped from questions before extraction.
const STRIPPED_SEQUENCES: [&str; 4] = ["/*", "*/", "--", ";"];

/// Clean question text, rejecting input with nothing to extract.
pub fn sanitize(question: &str) -> AppResult<String> {
    let mut cleaned = question.trim().to_string();
    for sequence in STRIPPED_SEQUENCES {
        cleaned = cleaned.replace(sequence, " ");
    }

    let cleaned: String = cleaned.trim().chars().take(MAX_QUESTION_CHARS).collect();
    let cleaned = cleaned.trim_end().to_string();

    if cleaned.is_empty() {
        return Err(AppError::InvalidInput("question is empty".to_string()));
    }
    if !cleaned.chars().any(char::is_alphanumeric) {
        return Err(AppError::InvalidInput(
            "question contains no words or numbers".to_string(),
        ));
    }

    Ok(cleaned)
}

/// Swap an empty plan for the default all-sources plan.
fn ensure_requests(plan: QueryPlan) -> QueryPlan {
    if !plan.is_empty() {
        return plan;
    }

    let error = AppError::InternalInconsistency("plan produced zero provider requests".to_string());
    tracing::error!("{}; using the default all-sources plan", error);
    default_plan()
}

/// Answers questions end to end.
pub struct QueryEngine {
    extractor: Arc<dyn IntentExtractor>,
    adapters: AdapterSet,
    validator: Validator,
    assembler: Assembler,
    audit: Arc<AuditLog>,
    request_timeout: Duration,
}

impl std::fmt::Debug for QueryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryEngine")
            .field("adapters", &self.adapters)
            .field("validator", &self.validator)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl QueryEngine {
    pub fn new(
        adapters: AdapterSet,
        templates: TemplateSet,
        quality: QualityConfig,
        audit: Arc<AuditLog>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            extractor: Arc::new(GazetteerExtractor),
            adapters,
            validator: Validator::new(quality),
            assembler: Assembler::new(templates),
            audit,
            request_timeout,
        }
    }

    /// Engine wired from configuration: cache backend, data.gov.in sources,
    /// workspace template overrides and the persisted audit log.
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        config.validate()?;

        let cache = create_cache(config)?;
        let adapters = create_adapters(config, cache)?;
        let templates = TemplateSet::load(&config.templates_dir())?;
        let audit = Arc::new(AuditLog::open(&config.audit_path())?);

        Ok(Self::new(
            adapters,
            templates,
            config.quality,
            audit,
            Duration::from_millis(config.request_timeout_ms),
        ))
    }

    /// Replace the intent extractor.
    pub fn with_extractor(mut self, extractor: Arc<dyn IntentExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn audit(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    pub fn adapters(&self) -> &AdapterSet {
        &self.adapters
    }

    /// Answer one question.
    ///
    /// Returns `InvalidInput` for empty or unusable text; every other problem
    /// degrades the answer instead of failing it.
    pub async fn answer(&self, question: &str) -> AppResult<AnswerPayload> {
        let started = Instant::now();
        let request_id = Uuid::new_v4();

        let cleaned = match sanitize(question) {
            Ok(cleaned) => cleaned,
            Err(e) => {
                let mut event = QueryEvent::new(request_id, &QueryDescriptor::empty(question));
                event.error = Some(e.to_string());
                event.response_time_ms = started.elapsed().as_millis() as u64;
                self.record(AuditEvent::Query(event));
                return Err(e);
            }
        };

        let deadline = Deadline::now() + self.request_timeout;

        let descriptor = self.extractor.extract(&cleaned);
        let plan = ensure_requests(plan_query(&descriptor));

        let outcomes = self.fetch_all(&plan, deadline).await;

        let mut grouped = GroupedRecords::new();
        let mut ordered = Vec::new();
        for outcome in &outcomes {
            grouped
                .entry(outcome.provider)
                .or_default()
                .extend(outcome.records.iter().cloned());
            ordered.extend(outcome.records.iter().cloned());
        }

        let annotated = self.validator.annotate(&ordered);
        let quality = self.validator.assess(&plan.requests, &grouped);
        let mut payload = self
            .assembler
            .assemble(&descriptor, &plan.operations, annotated, quality)?;

        payload.provenance = outcomes
            .iter()
            .map(|o| Provenance {
                provider: o.provider,
                origin: o.origin,
                cache_hit: o.cache_hit,
                record_count: o.records.len(),
                failures: o.failures.clone(),
                elapsed_ms: o.elapsed_ms,
            })
            .collect();

        let elapsed_ms = started.elapsed().as_millis() as u64;
        self.audit_answer(request_id, &payload, &outcomes, elapsed_ms);

        tracing::info!(
            "Answered {} question in {}ms: {} records, {} citations, confidence {}",
            descriptor.query_type,
            elapsed_ms,
            payload.supporting_records.len(),
            payload.citations.len(),
            payload.quality.confidence_label
        );

        Ok(payload)
    }

    /// Fetch every planned request. Concurrency is bounded by the number of
    /// distinct providers; outcomes keep plan order.
    async fn fetch_all(&self, plan: &QueryPlan, deadline: Deadline) -> Vec<FetchOutcome> {
        let concurrency = plan.providers().len().max(1);

        stream::iter(plan.requests.iter())
            .map(|request| self.fetch_before(request, deadline))
            .buffered(concurrency)
            .filter_map(|outcome| async move { outcome })
            .collect()
            .await
    }

    /// Fetch `request`, degrading to fallback if the request deadline passes first.
    async fn fetch_before(&self, request: &ProviderRequest, deadline: Deadline) -> Option<FetchOutcome> {
        let adapter = match self.adapters.get(request.provider_id) {
            Ok(adapter) => adapter,
            Err(e) => {
                tracing::error!("Skipping planned request: {}", e);
                return None;
            }
        };

        match tokio::time::timeout_at(deadline, adapter.fetch(request)).await {
            Ok(outcome) => Some(outcome),
            Err(_) => {
                let timeout_ms = self.request_timeout.as_millis() as u64;
                Some(adapter.degrade(request, timeout_ms))
            }
        }
    }

    fn audit_answer(&self, request_id: Uuid, payload: &AnswerPayload, outcomes: &[FetchOutcome], elapsed_ms: u64) {
        for outcome in outcomes {
            self.record(AuditEvent::SourceAccess(SourceEvent {
                timestamp: Utc::now(),
                request_id,
                provider: outcome.provider,
                cache_key: outcome.cache_key.clone(),
                origin: outcome.origin,
                cache_hit: outcome.cache_hit,
                record_count: outcome.records.len(),
                success: outcome.origin == Origin::Live,
                elapsed_ms: outcome.elapsed_ms,
            }));
        }

        let mut event = QueryEvent::new(request_id, &payload.descriptor);
        let mut sources = Vec::new();
        for outcome in outcomes {
            if !sources.contains(&outcome.provider) {
                sources.push(outcome.provider);
            }
        }
        event.sources = sources;
        event.confidence = Some(payload.quality.confidence_label);
        event.response_time_ms = elapsed_ms;
        event.success = true;
        self.record(AuditEvent::Query(event));
    }

    fn record(&self, event: AuditEvent) {
        if let Err(e) = self.audit.record(event) {
            tracing::warn!("Failed to write audit entry: {}", e);
        }
    }
}
