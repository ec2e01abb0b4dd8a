//! Query Router: maps a descriptor onto provider calls and analysis steps.
//!
//! Plans are pure functions of the descriptor. The same descriptor always
//! yields the same requests in the same order, which keeps cache keys stable.

use crate::types::{QueryDescriptor, QueryType};
use samarth_sources::{FilterParams, ProviderId, ProviderRequest, YearScope};
use serde::Serialize;
use std::collections::BTreeSet;

/// Derived computation run by the assembler once data arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisOp {
    /// Per-location totals, ranked
    LocationTotals,
    /// Per-year series with percentage change
    YearlySeries,
    /// Rainfall against production across locations
    RainfallCorrelation,
}

/// Provider calls and analysis steps for one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryPlan {
    pub requests: Vec<ProviderRequest>,
    pub operations: Vec<AnalysisOp>,
}

impl QueryPlan {
    /// Distinct providers in plan order.
    pub fn providers(&self) -> Vec<ProviderId> {
        let mut seen = Vec::new();
        for request in &self.requests {
            if !seen.contains(&request.provider_id) {
                seen.push(request.provider_id);
            }
        }
        seen
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

/// Provider requests for `descriptor`.
pub fn plan(descriptor: &QueryDescriptor) -> Vec<ProviderRequest> {
    plan_query(descriptor).requests
}

/// Full plan: requests in provider order (agriculture, market prices,
/// climate), then analysis operations.
pub fn plan_query(descriptor: &QueryDescriptor) -> QueryPlan {
    let years = year_scope(descriptor);
    let mut requests = Vec::new();

    let crop_filters = FilterParams {
        locations: descriptor.locations.clone(),
        crops: descriptor.crops.clone(),
        years: years.clone(),
    };

    requests.extend(requests_for(ProviderId::Agriculture, &crop_filters, descriptor));

    if descriptor.requires_prices {
        requests.extend(requests_for(ProviderId::MarketPrices, &crop_filters, descriptor));
    }

    if descriptor.requires_climate || descriptor.query_type == QueryType::Correlation {
        // Climate records carry no crop, so crops would only fragment the cache
        let climate_filters = FilterParams {
            crops: BTreeSet::new(),
            ..crop_filters
        };
        requests.extend(requests_for(ProviderId::Climate, &climate_filters, descriptor));
    }

    let operations = match descriptor.query_type {
        QueryType::Lookup => Vec::new(),
        QueryType::Comparison => vec![AnalysisOp::LocationTotals],
        QueryType::Trend => vec![AnalysisOp::YearlySeries],
        QueryType::Correlation => vec![AnalysisOp::RainfallCorrelation],
    };

    QueryPlan {
        requests,
        operations,
    }
}

/// Plan used when routing produced nothing: every provider, all-India, latest year.
pub fn default_plan() -> QueryPlan {
    QueryPlan {
        requests: ProviderId::ALL
            .iter()
            .map(|p| ProviderRequest::new(*p, FilterParams::all_india()))
            .collect(),
        operations: Vec::new(),
    }
}

/// Comparisons get one request per compared location; everything else one
/// request covering all locations.
fn requests_for(
    provider: ProviderId,
    filters: &FilterParams,
    descriptor: &QueryDescriptor,
) -> Vec<ProviderRequest> {
    if descriptor.query_type == QueryType::Comparison && filters.locations.len() > 1 {
        filters
            .locations
            .iter()
            .map(|location| {
                let single = FilterParams {
                    locations: BTreeSet::from([location.clone()]),
                    ..filters.clone()
                };
                ProviderRequest::new(provider, single)
            })
            .collect()
    } else {
        vec![ProviderRequest::new(provider, filters.clone())]
    }
}

fn year_scope(descriptor: &QueryDescriptor) -> YearScope {
    if !descriptor.years.is_empty() {
        YearScope::Listed(descriptor.years.clone())
    } else if descriptor.query_type == QueryType::Trend {
        YearScope::All
    } else {
        YearScope::Latest
    }
}
