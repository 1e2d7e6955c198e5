//! Farsight DNSDB client
//!
//! Thin wrapper over the upstream passive-DNS HTTP API. Responses arrive as
//! newline-delimited JSON, one record per line. Status handling follows the
//! upstream contract: 400/404 mean "nothing for this value" and yield an
//! empty record set, anything else non-2xx is a critical error classified
//! by status code.

use chrono::{Duration, Utc};
use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::errors::RelayError;
use crate::models::{Observable, RawRecord};

const LOOKUP_ACTION: &str = "lookup";
const SUMMARIZE_ACTION: &str = "summarize";

const NOT_CRITICAL_STATUSES: [StatusCode; 2] = [StatusCode::BAD_REQUEST, StatusCode::NOT_FOUND];

/// Well-known observable used by the health endpoint for a lightweight
/// upstream probe.
pub fn health_probe_observable() -> Observable {
    Observable::new("domain", "www.farsightsecurity.com")
}

/// Per-request upstream client carrying the caller's API key.
pub struct DnsdbClient {
    http: Client,
    base_url: String,
    api_key: String,
    user_agent: String,
}

impl DnsdbClient {
    pub fn new(
        http: Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
            user_agent: user_agent.into(),
        }
    }

    /// Full record lookup for one observable.
    pub async fn lookup(
        &self,
        observable: &Observable,
        time_filter_days: Option<i64>,
    ) -> Result<Vec<RawRecord>, RelayError> {
        self.request(LOOKUP_ACTION, observable, time_filter_days)
            .await
    }

    /// Lightweight summary call, used as the health probe.
    pub async fn summarize(&self, observable: &Observable) -> Result<Vec<RawRecord>, RelayError> {
        self.request(SUMMARIZE_ACTION, observable, None).await
    }

    fn api_path(observable_type: &str) -> Result<&'static str, RelayError> {
        match observable_type {
            "domain" => Ok("rrset/name"),
            "ip" | "ipv6" => Ok("rdata/ip"),
            other => Err(RelayError::UnsupportedObservableType(other.to_string())),
        }
    }

    async fn request(
        &self,
        action: &str,
        observable: &Observable,
        time_filter_days: Option<i64>,
    ) -> Result<Vec<RawRecord>, RelayError> {
        let path = Self::api_path(&observable.observable_type)?;
        let url = format!(
            "{}/{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            action,
            path,
            observable.value,
        );

        let mut query: Vec<(&str, String)> = vec![
            ("humantime", "True".to_string()),
            ("aggr", "False".to_string()),
        ];
        if let Some(days) = time_filter_days {
            let cutoff = Utc::now() - Duration::days(days);
            query.push(("time_last_after", cutoff.timestamp().to_string()));
        }

        debug!(url = %url, observable = %observable.value, "passive-DNS request");

        let response = self
            .http
            .get(&url)
            .query(&query)
            .header("Accept", "application/json")
            .header("X-API-Key", &self.api_key)
            .header("User-Agent", &self.user_agent)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if status.is_success() {
            let body = response.text().await.map_err(classify_transport)?;
            return parse_records(&body);
        }

        if NOT_CRITICAL_STATUSES.contains(&status) {
            return Ok(Vec::new());
        }

        let body = response.text().await.unwrap_or_default();
        Err(RelayError::UpstreamResponse {
            status: status.as_u16(),
            body,
        })
    }
}

fn parse_records(body: &str) -> Result<Vec<RawRecord>, RelayError> {
    body.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(|_| RelayError::SchemaDrift))
        .collect()
}

/// A TLS verification failure is its own error class; any other transport
/// failure keeps its innermost cause as the message.
fn classify_transport(error: reqwest::Error) -> RelayError {
    let mut messages = vec![error.to_string()];
    let mut source = std::error::Error::source(&error);
    while let Some(inner) = source {
        messages.push(inner.to_string());
        source = inner.source();
    }

    let detail = messages.last().cloned().unwrap_or_default();
    if messages
        .iter()
        .any(|m| m.to_ascii_lowercase().contains("certificate"))
    {
        RelayError::SslVerification(detail)
    } else {
        RelayError::Transport(detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_table_covers_supported_types() {
        assert_eq!(DnsdbClient::api_path("domain").unwrap(), "rrset/name");
        assert_eq!(DnsdbClient::api_path("ip").unwrap(), "rdata/ip");
        assert_eq!(DnsdbClient::api_path("ipv6").unwrap(), "rdata/ip");

        let error = DnsdbClient::api_path("sha256").unwrap_err();
        assert_eq!(error.to_string(), "Unsupported observable error: sha256");
    }

    #[test]
    fn parses_newline_delimited_records() {
        let body = concat!(
            r#"{"count":4,"rrname":"google.com.","rrtype":"A","rdata":["74.125.128.100"]}"#,
            "\n\n",
            r#"{"count":2,"rrname":"google.com.","rrtype":"AAAA","rdata":["2001:db8::1"]}"#,
            "\n",
        );

        let records = parse_records(body).expect("two records");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].count, Some(4));
        assert_eq!(records[1].rrtype.as_deref(), Some("AAAA"));
    }

    #[test]
    fn unknown_fields_parse_to_empty_record() {
        let records = parse_records(r#"{"some_key":"some_value"}"#).expect("parses");
        assert_eq!(records.len(), 1);
        assert!(records[0].count.is_none());
        assert!(records[0].rrname.is_none());
    }

    #[test]
    fn garbage_line_is_schema_drift() {
        let error = parse_records("not json at all").unwrap_err();
        assert!(matches!(error, RelayError::SchemaDrift));
    }
}
