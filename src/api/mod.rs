//! HTTP surface of the relay
//!
//! Every route answers 200 with an envelope: `{"data": ...}` on success,
//! `{"errors": [...], "data": ...}` on failure, where `data` keeps whatever
//! was accumulated before the failure.

use std::sync::Arc;

use axum::{Json, Router, body::Bytes, extract::State, http::HeaderMap, routing::post};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::auth::{self, RequestAuth};
use crate::config::Settings;
use crate::dnsdb::{DnsdbClient, health_probe_observable};
use crate::errors::{ErrorPayload, RelayError};
use crate::mappings::Mapping;
use crate::models::{Observable, ReferenceLink, Sighting, SightingDocs};

/// Application state shared across handlers
pub struct AppState {
    pub http: reqwest::Client,
    pub settings: Settings,
}

impl AppState {
    /// Upstream client bound to the caller's API key.
    fn client_for(&self, auth: &RequestAuth) -> DnsdbClient {
        DnsdbClient::new(
            self.http.clone(),
            &self.settings.api_url,
            &auth.key,
            &self.settings.user_agent,
        )
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", post(health))
        .route("/observe/observables", post(observe_observables))
        .route("/deliberate/observables", post(deliberate_observables))
        .route("/refer/observables", post(refer_observables))
        .with_state(state)
}

// ==================== Handlers ====================

/// Primary enrichment endpoint: one upstream lookup per supported
/// observable, mapped into sightings. A critical failure stops the batch
/// but never discards sightings already built.
async fn observe_observables(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Value> {
    let auth = match auth::authorize(&headers, &state.settings) {
        Ok(auth) => auth,
        Err(error) => return result_envelope(Vec::new(), Some(error)),
    };

    let observables = match parse_observables(&body) {
        Ok(observables) => observables,
        Err(error) => return result_envelope(Vec::new(), Some(error)),
    };

    let client = state.client_for(&auth);
    // The upstream day-window filter is only sent in aggregation mode.
    let time_filter = auth.aggregate.then_some(state.settings.time_filter_days);

    let mut sightings = Vec::new();
    let mut failure = None;

    for observable in &observables {
        let Some(mapping) = Mapping::for_observable(observable) else {
            debug!(observable_type = %observable.observable_type, "no mapping, skipping");
            continue;
        };

        let records = match client.lookup(observable, time_filter).await {
            Ok(records) => records,
            Err(error) => {
                warn!(observable = %observable.value, error = %error, "lookup failed");
                failure = Some(error);
                break;
            }
        };
        if records.is_empty() {
            continue;
        }

        let source_uri = state.settings.search_url_for(&observable.value);
        match mapping.extract_sightings(records, &source_uri, auth.entities_limit, auth.aggregate)
        {
            Ok(mut docs) => sightings.append(&mut docs),
            Err(error) => {
                warn!(observable = %observable.value, error = %error, "mapping failed");
                failure = Some(error);
                break;
            }
        }
    }

    result_envelope(sightings, failure)
}

/// Builds search-UI deep links for supported observables. No upstream call.
async fn refer_observables(State(state): State<Arc<AppState>>, body: Bytes) -> Json<Value> {
    let observables = match parse_observables(&body) {
        Ok(observables) => observables,
        Err(error) => return result_envelope(Vec::new(), Some(error)),
    };

    let data: Vec<ReferenceLink> = observables
        .iter()
        .filter_map(|observable| reference_link(observable, &state.settings))
        .collect();

    Json(json!({ "data": data }))
}

/// Verdict deliberation is not supported by this data source.
async fn deliberate_observables() -> Json<Value> {
    Json(json!({ "data": {} }))
}

/// One lightweight upstream probe to prove the credential works.
async fn health(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Json<Value> {
    let auth = match auth::authorize(&headers, &state.settings) {
        Ok(auth) => auth,
        Err(error) => return result_envelope(Vec::new(), Some(error)),
    };

    match state
        .client_for(&auth)
        .summarize(&health_probe_observable())
        .await
    {
        Ok(_) => Json(json!({ "data": { "status": "ok" } })),
        Err(error) => {
            warn!(error = %error, "health probe failed");
            result_envelope(Vec::new(), Some(error))
        }
    }
}

// ==================== Helpers ====================

fn parse_observables(body: &Bytes) -> Result<Vec<Observable>, RelayError> {
    serde_json::from_slice(body)
        .map_err(|error| RelayError::InvalidPayload(error.to_string()))
}

fn reference_link(observable: &Observable, settings: &Settings) -> Option<ReferenceLink> {
    let label = match observable.observable_type.as_str() {
        "ip" => "IP",
        "ipv6" => "IPv6",
        "domain" => "domain",
        _ => return None,
    };

    Some(ReferenceLink {
        id: format!(
            "ref-farsight-dnsdb-search-{}-{}",
            observable.observable_type, observable.value,
        ),
        title: format!("Search for this {label}"),
        description: format!("Lookup this {label} on Farsight DNSDB"),
        url: settings.search_url_for(&observable.value),
        categories: vec!["Search".to_string(), "Farsight DNSDB".to_string()],
    })
}

/// Assemble the response envelope. Sightings built before a failure are
/// returned alongside the single fatal error entry.
fn result_envelope(sightings: Vec<Sighting>, failure: Option<RelayError>) -> Json<Value> {
    let data = if sightings.is_empty() {
        json!({})
    } else {
        json!({ "sightings": SightingDocs::new(sightings) })
    };

    match failure {
        None => Json(json!({ "data": data })),
        Some(error) => Json(json!({
            "errors": [ErrorPayload::from(&error)],
            "data": data,
        })),
    }
}
