//! Core data models for the relay

use serde::{Deserialize, Serialize};

/// CTIM schema version stamped on every sighting.
pub const SCHEMA_VERSION: &str = "1.0.17";

/// Data source name shown on sightings.
pub const SOURCE_NAME: &str = "Farsight DNSDB";

/// Origin attributed to every relation the relay builds.
pub const RELATION_ORIGIN: &str = "Farsight DNSDB Enrichment Module";

/// A typed indicator value under investigation.
///
/// The type is carried as a plain string: callers may send types the relay
/// does not support, and those must be skipped rather than rejected at
/// deserialization time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Observable {
    #[serde(rename = "type")]
    pub observable_type: String,
    pub value: String,
}

impl Observable {
    pub fn new(observable_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            observable_type: observable_type.into(),
            value: value.into(),
        }
    }
}

/// One raw passive-DNS record as returned by the upstream lookup.
///
/// Every field is optional at the parsing layer. A field the pipeline needs
/// but cannot find is a schema-drift error at use time, not a parse failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRecord {
    pub count: Option<u64>,
    pub rrname: Option<String>,
    pub rrtype: Option<String>,
    pub rdata: Option<Vec<String>>,
    pub bailiwick: Option<String>,
    pub time_first: Option<String>,
    pub time_last: Option<String>,
    pub zone_time_first: Option<String>,
    pub zone_time_last: Option<String>,
}

impl RawRecord {
    /// First-seen timestamp, whichever time pair the record carries.
    pub fn first_seen(&self) -> Option<&str> {
        self.time_first
            .as_deref()
            .or(self.zone_time_first.as_deref())
    }

    /// Last-seen timestamp, whichever time pair the record carries.
    pub fn last_seen(&self) -> Option<&str> {
        self.time_last.as_deref().or(self.zone_time_last.as_deref())
    }
}

/// Observation window attached to a sighting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ObservedTime {
    pub start_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
}

/// A directional link asserting that `source` resolved to `related`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Relation {
    pub origin: String,
    pub relation: String,
    pub source: Observable,
    pub related: Observable,
}

/// Column descriptor for a sighting data table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
}

/// Auxiliary table attached to domain sightings carrying the bailiwick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SightingDataTable {
    pub columns: Vec<ColumnDefinition>,
    pub rows: Vec<Vec<String>>,
}

impl SightingDataTable {
    pub fn bailiwick(value: impl Into<String>) -> Self {
        Self {
            columns: vec![ColumnDefinition {
                name: "Bailiwick".to_string(),
                column_type: "string".to_string(),
            }],
            rows: vec![vec![value.into()]],
        }
    }
}

/// A normalized sighting document asserting an observable was seen in the
/// passive-DNS data source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sighting {
    pub schema_version: String,
    pub id: String,
    #[serde(rename = "type")]
    pub doc_type: String,
    pub source: String,
    pub title: String,
    pub confidence: String,
    pub internal: bool,
    pub count: u64,
    pub observables: Vec<Observable>,
    pub observed_time: ObservedTime,
    pub description: String,
    pub source_uri: String,
    pub relations: Vec<Relation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<SightingDataTable>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensor: Option<String>,
}

/// Search-UI deep link returned by the refer endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceLink {
    pub id: String,
    pub title: String,
    pub description: String,
    pub url: String,
    pub categories: Vec<String>,
}

/// Document collection wrapper used inside the response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SightingDocs {
    pub count: usize,
    pub docs: Vec<Sighting>,
}

impl SightingDocs {
    pub fn new(docs: Vec<Sighting>) -> Self {
        Self {
            count: docs.len(),
            docs,
        }
    }
}
