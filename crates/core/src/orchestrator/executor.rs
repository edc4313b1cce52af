//! # Query Executor
//!
//! One catalog call per resolved query, issued concurrently. Results keep
//! the order the targets were resolved in.

use chrono::Utc;
use futures::future::join_all;

use crate::error::{GatewayError, TurnError};
use crate::state::{ApiCallLog, ParsedIntent, QueryTarget};
use crate::tools::{ApiResult, EarthquakeCatalog, Evidence, Retrieval};

/// Everything the executor learned, in issue order.
#[derive(Debug, Clone, Default)]
pub struct Execution {
    pub api_calls: Vec<ApiCallLog>,
    pub evidence: Vec<Evidence>,
    /// Notes for calls that failed and were recorded as empty
    pub assumptions: Vec<String>,
}

pub struct QueryExecutor<'a> {
    catalog: &'a dyn EarthquakeCatalog,
}

impl<'a> QueryExecutor<'a> {
    pub fn new(catalog: &'a dyn EarthquakeCatalog) -> Self {
        Self { catalog }
    }

    #[tracing::instrument(skip_all, fields(targets = intent.targets.len()))]
    pub async fn run(&self, intent: &ParsedIntent) -> Result<Execution, TurnError> {
        let calls = intent.targets.iter().map(|target| async move {
            (target, self.catalog.fetch(&target.query).await)
        });
        let outcomes = join_all(calls).await;

        let mut execution = Execution::default();
        for (target, outcome) in outcomes {
            match outcome {
                Ok(retrieval) => {
                    tracing::info!(
                        url = %retrieval.url,
                        result_type = retrieval.result.result_type.as_str(),
                        "Catalog call succeeded"
                    );
                    execution
                        .api_calls
                        .push(ApiCallLog::from_retrieval(&retrieval));
                    execution.evidence.push(Evidence {
                        label: target.label.clone(),
                        retrieval,
                        failure: None,
                    });
                }
                Err(GatewayError::Unreachable(reason)) => {
                    tracing::warn!(%reason, "Catalog unreachable, failing turn");
                    return Err(TurnError::CatalogUnreachable(reason));
                }
                Err(err) => {
                    tracing::warn!(error = %err, "Catalog call failed, recording empty result");
                    self.record_failure(&mut execution, target, &err);
                }
            }
        }
        Ok(execution)
    }

    fn record_failure(&self, execution: &mut Execution, target: &QueryTarget, err: &GatewayError) {
        let retrieval = Retrieval {
            url: target.query.url(self.catalog.base_url()),
            retrieved_at: Utc::now(),
            result: ApiResult::empty(0),
        };
        let reason = err.to_string().split_whitespace().collect::<Vec<_>>().join(" ");
        let subject = match &target.label {
            Some(label) => format!("The query for {}", label),
            None => "The catalog query".to_string(),
        };
        execution.assumptions.push(format!(
            "{} failed ({}) → treated as returning no events",
            subject, reason
        ));
        execution
            .api_calls
            .push(ApiCallLog::empty(&retrieval.url, retrieval.retrieved_at));
        execution.evidence.push(Evidence {
            label: target.label.clone(),
            retrieval,
            failure: Some(reason),
        });
    }
}
