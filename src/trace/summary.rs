//! Serializable trace summary for consumers.
//!
//! Analysis and UI layers want a cheap, schema-level view of a trace
//! before (or without) decoding any events: which streams exist, which
//! events they can produce, what clocks and environment the trace carries.
//! [`TraceSummary`] snapshots that from a parsed [`CtfTrace`].

use std::collections::BTreeMap;

use serde::Serialize;

use super::CtfTrace;

#[derive(Debug, Serialize)]
pub struct ClockSummary {
    pub name: String,
    pub freq: u64,
    pub offset: u64,
    pub offset_s: u64,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EventSummary {
    pub id: Option<u64>,
    pub name: String,
    pub log_level: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct StreamSummary {
    pub id: Option<u64>,
    pub events: Vec<EventSummary>,
}

#[derive(Debug, Serialize)]
pub struct TraceSummary {
    pub version: Option<String>,
    pub uuid: Option<String>,
    pub byte_order: String,
    pub environment: BTreeMap<String, String>,
    pub clocks: Vec<ClockSummary>,
    pub streams: Vec<StreamSummary>,
}

impl TraceSummary {
    pub fn from_trace(trace: &CtfTrace) -> Self {
        let version = match (trace.major, trace.minor) {
            (Some(major), Some(minor)) => Some(format!("{major}.{minor}")),
            _ => None,
        };
        let mut clocks: Vec<ClockSummary> = trace
            .clocks
            .values()
            .map(|c| ClockSummary {
                name: c.name.clone(),
                freq: c.freq,
                offset: c.offset,
                offset_s: c.offset_s,
                description: c.description.clone(),
            })
            .collect();
        clocks.sort_by(|a, b| a.name.cmp(&b.name));

        let streams = trace
            .streams()
            .map(|s| {
                let mut events: Vec<EventSummary> = s
                    .events()
                    .map(|e| EventSummary {
                        id: e.id,
                        name: e.name.clone(),
                        log_level: e.log_level,
                    })
                    .collect();
                events.sort_by_key(|e| e.id);
                StreamSummary { id: s.id, events }
            })
            .collect();

        TraceSummary {
            version,
            uuid: trace.uuid.map(|u| u.to_string()),
            byte_order: trace.byte_order().to_string(),
            environment: trace.environment.clone(),
            clocks,
            streams,
        }
    }

    /// Pretty-printed JSON, for dumping alongside converted traces.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::Clock;

    #[test]
    fn test_summary_of_empty_trace() {
        let mut trace = CtfTrace::new();
        trace.major = Some(1);
        trace.minor = Some(8);
        trace.clocks.insert("monotonic".to_string(), Clock::new("monotonic"));
        let summary = TraceSummary::from_trace(&trace);
        assert_eq!(summary.version.as_deref(), Some("1.8"));
        assert_eq!(summary.clocks.len(), 1);
        let json = summary.to_json();
        assert!(json.contains("\"monotonic\""));
    }
}
