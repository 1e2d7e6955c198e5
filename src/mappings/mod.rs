//! Observable-to-sighting mapping engine
//!
//! Turns raw passive-DNS records into normalized sighting and relation
//! documents. Behavior is type-dependent: domain lookups keep only
//! A/AAAA records and relate the domain to its resolved addresses, while
//! IP lookups relate each resolving hostname back to the address. The
//! record set for one observable is either collapsed into a single
//! aggregated sighting or sorted by recency and truncated to a limit.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use chrono::{SecondsFormat, Utc};
use uuid::Uuid;

use crate::errors::RelayError;
use crate::models::{
    Observable, ObservedTime, RELATION_ORIGIN, RawRecord, Relation, SCHEMA_VERSION, SOURCE_NAME,
    Sighting, SightingDataTable,
};

pub const RESOLVED_TO: &str = "Resolved_To";

const SENSOR_REPLICATION: &str = "Passive DNS replication";
const SENSOR_ZONE_FILE: &str = "Zone file import";

/// The closed set of observable types the relay can map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingKind {
    Domain,
    Ip,
    Ipv6,
}

impl MappingKind {
    fn for_type(observable_type: &str) -> Option<Self> {
        match observable_type {
            "domain" => Some(Self::Domain),
            "ip" => Some(Self::Ip),
            "ipv6" => Some(Self::Ipv6),
            _ => None,
        }
    }
}

/// Mapping strategy bound to one observable.
pub struct Mapping {
    kind: MappingKind,
    observable: Observable,
}

impl Mapping {
    /// Mapping for the observable's declared type, or `None` when the type
    /// is unsupported and the caller should skip it.
    pub fn for_observable(observable: &Observable) -> Option<Self> {
        MappingKind::for_type(&observable.observable_type).map(|kind| Self {
            kind,
            observable: observable.clone(),
        })
    }

    pub fn kind(&self) -> MappingKind {
        self.kind
    }

    /// Run the full pipeline for one observable's record set.
    ///
    /// With `aggregate` on, the whole set collapses into at most one
    /// sighting and `limit` is not applied. Otherwise records are sorted
    /// most-recent-first and truncated to `limit` before sightings are
    /// built. Records whose extracted related set is empty never produce
    /// a sighting.
    pub fn extract_sightings(
        &self,
        records: Vec<RawRecord>,
        source_uri: &str,
        limit: usize,
        aggregate: bool,
    ) -> Result<Vec<Sighting>, RelayError> {
        let mut kept = Vec::with_capacity(records.len());
        for record in records {
            if self.retains(&record)? {
                kept.push(record);
            }
        }

        if aggregate {
            self.extract_aggregated(&kept, source_uri)
        } else {
            self.extract_individual(kept, source_uri, limit)
        }
    }

    /// Collapse the record set into a single summarized sighting.
    fn extract_aggregated(
        &self,
        records: &[RawRecord],
        source_uri: &str,
    ) -> Result<Vec<Sighting>, RelayError> {
        let mut count: u64 = 0;
        let mut related = BTreeSet::new();

        for record in records {
            count += self.record_count(record)?;
            related.extend(self.extract_related(record)?);
        }

        if related.is_empty() {
            return Ok(Vec::new());
        }

        // Individual timestamps are discarded once merged; the window is
        // anchored to now.
        let now = now_timestamp();
        let observed_time = ObservedTime {
            start_time: now.clone(),
            end_time: Some(now),
        };

        let mut sighting =
            self.base_sighting(count, observed_time, self.description(true), source_uri);
        sighting.relations = related
            .iter()
            .map(|value| self.resolved_to(value))
            .collect();

        Ok(vec![sighting])
    }

    /// Sort by recency, truncate, and build one sighting per record.
    fn extract_individual(
        &self,
        mut records: Vec<RawRecord>,
        source_uri: &str,
        limit: usize,
    ) -> Result<Vec<Sighting>, RelayError> {
        // Stable sort: ties and records missing both last-timestamps keep
        // their upstream order, undated records after dated ones.
        records.sort_by(|a, b| match (a.last_seen(), b.last_seen()) {
            (Some(left), Some(right)) => right.cmp(left),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
        records.truncate(limit);

        let description = self.description(false);
        let mut sightings = Vec::new();

        for record in &records {
            let mut related = self.extract_related(record)?;
            related.sort();
            related.dedup();
            if related.is_empty() {
                continue;
            }

            let start_time = record
                .first_seen()
                .ok_or(RelayError::SchemaDrift)?
                .to_string();
            let end_time = record
                .last_seen()
                .map_or_else(|| start_time.clone(), str::to_string);
            let observed_time = ObservedTime {
                start_time,
                end_time: Some(end_time),
            };

            let mut sighting = self.base_sighting(
                self.record_count(record)?,
                observed_time,
                description.clone(),
                source_uri,
            );
            sighting.relations = related
                .iter()
                .map(|value| self.resolved_to(value))
                .collect();
            sighting.sensor = sensor(record).map(str::to_string);

            if self.kind == MappingKind::Domain {
                sighting.data = record
                    .bailiwick
                    .as_deref()
                    .filter(|b| !b.is_empty())
                    .map(SightingDataTable::bailiwick);
            }

            sightings.push(sighting);
        }

        Ok(sightings)
    }

    /// Type-specific record filter. Domain lookups only map address
    /// records; a record without an rrtype means the upstream shape
    /// changed.
    fn retains(&self, record: &RawRecord) -> Result<bool, RelayError> {
        match self.kind {
            MappingKind::Domain => {
                let rrtype = record.rrtype.as_deref().ok_or(RelayError::SchemaDrift)?;
                Ok(matches!(rrtype, "A" | "AAAA"))
            }
            MappingKind::Ip | MappingKind::Ipv6 => Ok(true),
        }
    }

    /// Values the observable is related to according to one record.
    fn extract_related(&self, record: &RawRecord) -> Result<Vec<String>, RelayError> {
        match self.kind {
            MappingKind::Domain => record.rdata.clone().ok_or(RelayError::SchemaDrift),
            MappingKind::Ip | MappingKind::Ipv6 => {
                let rrname = record.rrname.clone().ok_or(RelayError::SchemaDrift)?;
                Ok(vec![rrname])
            }
        }
    }

    fn record_count(&self, record: &RawRecord) -> Result<u64, RelayError> {
        record.count.ok_or(RelayError::SchemaDrift)
    }

    /// Build the directional `Resolved_To` relation for one related value.
    /// Direction always reads "the DNS record source resolves to the
    /// target", whichever side was the caller's input.
    fn resolved_to(&self, related: &str) -> Relation {
        match self.kind {
            MappingKind::Domain => observable_relation(
                self.observable.clone(),
                Observable::new(
                    if related.contains(':') { "ipv6" } else { "ip" },
                    related,
                ),
            ),
            MappingKind::Ip | MappingKind::Ipv6 => {
                // Trailing dot is stripped for compatibility with the
                // aggregation platform.
                let hostname = related.strip_suffix('.').unwrap_or(related);
                observable_relation(
                    Observable::new("domain", hostname),
                    self.observable.clone(),
                )
            }
        }
    }

    fn description(&self, aggregate: bool) -> String {
        match self.kind {
            MappingKind::Domain => {
                format!("IP addresses that {} resolves to", self.observable.value)
            }
            MappingKind::Ip | MappingKind::Ipv6 => format!(
                "{} resolved to {}",
                if aggregate {
                    "Hostnames that have"
                } else {
                    "Hostname that has"
                },
                self.observable.value,
            ),
        }
    }

    fn base_sighting(
        &self,
        count: u64,
        observed_time: ObservedTime,
        description: String,
        source_uri: &str,
    ) -> Sighting {
        Sighting {
            schema_version: SCHEMA_VERSION.to_string(),
            id: format!("transient:{}", Uuid::new_v4()),
            doc_type: "sighting".to_string(),
            source: SOURCE_NAME.to_string(),
            title: "Found in Farsight DNSDB".to_string(),
            confidence: "High".to_string(),
            internal: false,
            count,
            observables: vec![self.observable.clone()],
            observed_time,
            description,
            source_uri: source_uri.to_string(),
            relations: Vec::new(),
            data: None,
            sensor: None,
        }
    }
}

fn observable_relation(source: Observable, related: Observable) -> Relation {
    Relation {
        origin: RELATION_ORIGIN.to_string(),
        relation: RESOLVED_TO.to_string(),
        source,
        related,
    }
}

/// Which collection method produced the record, keyed on the time pair it
/// carries. Meaningless for aggregated sightings, where both classes may
/// have been merged.
fn sensor(record: &RawRecord) -> Option<&'static str> {
    if record.time_first.is_some() {
        Some(SENSOR_REPLICATION)
    } else if record.zone_time_first.is_some() {
        Some(SENSOR_ZONE_FILE)
    } else {
        None
    }
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
