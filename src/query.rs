//! Filtering, pagination and aggregation over a newest-first event sequence.
//!
//! Nothing here owns events: callers hand in whatever the live store or a
//! fresh transcript scan currently holds.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::activity::{ActivityEvent, EventStatus, EventType};

/// Default result cap for the live feed.
pub const LIVE_DEFAULT_LIMIT: usize = 100;
/// Default result cap for transcript (batch) queries.
pub const BATCH_DEFAULT_LIMIT: usize = 200;

/// Raw query-string parameters of `/api/activity`, kept as text so that bad
/// numbers can fall back to defaults instead of rejecting the request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivityParams {
    pub limit: Option<String>,
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    pub action: Option<String>,
    pub status: Option<String>,
    pub agent: Option<String>,
    pub since: Option<String>,
}

impl ActivityParams {
    /// Collect parameters from decoded query pairs. A repeated key keeps its
    /// first value; unknown keys are ignored.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "limit" => &mut params.limit,
                "type" => &mut params.event_type,
                "action" => &mut params.action,
                "status" => &mut params.status,
                "agent" => &mut params.agent,
                "since" => &mut params.since,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }
        params
    }
}

/// A conjunctive filter plus result cap.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityQuery {
    pub limit: usize,
    pub event_type: Option<String>,
    pub action: Option<String>,
    pub status: Option<String>,
    pub agent: Option<String>,
    /// Exclusive lower bound on `ts`; zero or less means unbounded.
    pub since: i64,
}

impl ActivityQuery {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            event_type: None,
            action: None,
            status: None,
            agent: None,
            since: 0,
        }
    }

    /// Build a query from request parameters. Unparseable `limit`/`since`
    /// fall back to `default_limit` and 0; empty filters are ignored.
    pub fn from_params(params: ActivityParams, default_limit: usize) -> Self {
        let non_empty = |value: Option<String>| value.filter(|v| !v.is_empty());
        Self {
            limit: params
                .limit
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default_limit),
            event_type: non_empty(params.event_type),
            action: non_empty(params.action),
            status: non_empty(params.status),
            agent: non_empty(params.agent),
            since: params
                .since
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(0),
        }
    }

    pub fn matches(&self, event: &ActivityEvent) -> bool {
        if let Some(t) = &self.event_type {
            if event.event_type.as_str() != t {
                return false;
            }
        }
        if let Some(action) = &self.action {
            if &event.action != action {
                return false;
            }
        }
        if let Some(status) = &self.status {
            if event.status.as_str() != status {
                return false;
            }
        }
        if let Some(agent) = &self.agent {
            if event.agent_id.as_ref() != Some(agent) {
                return false;
            }
        }
        self.since <= 0 || event.ts > self.since
    }

    /// Filter a newest-first sequence and cap it at `limit`.
    pub fn apply<'a, I>(&self, events: I) -> Vec<ActivityEvent>
    where
        I: IntoIterator<Item = &'a ActivityEvent>,
    {
        events
            .into_iter()
            .filter(|e| self.matches(e))
            .take(self.limit)
            .cloned()
            .collect()
    }
}

/// Aggregate counts over a set of events.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityStats {
    pub total: usize,
    pub by_type: BTreeMap<String, usize>,
    pub by_action: BTreeMap<String, usize>,
    pub by_status: BTreeMap<String, usize>,
    pub by_agent: BTreeMap<String, usize>,
    pub errors: usize,
    pub total_tokens: u64,
    pub total_cost: f64,
    pub last_event: Option<i64>,
}

impl ActivityStats {
    pub fn from_events<'a, I>(events: I) -> Self
    where
        I: IntoIterator<Item = &'a ActivityEvent>,
    {
        let mut stats = Self::default();
        for event in events {
            stats.total += 1;
            *stats
                .by_type
                .entry(event.event_type.as_str().to_string())
                .or_insert(0) += 1;
            *stats.by_action.entry(event.action.clone()).or_insert(0) += 1;
            *stats
                .by_status
                .entry(event.status.as_str().to_string())
                .or_insert(0) += 1;
            if let Some(agent) = &event.agent_id {
                *stats.by_agent.entry(agent.clone()).or_insert(0) += 1;
            }
            if event.status == EventStatus::Error {
                stats.errors += 1;
            }
            stats.total_tokens = stats
                .total_tokens
                .saturating_add(event.tokens.map_or(0, |t| t.total));
            stats.total_cost += event.cost.unwrap_or(0.0);
            stats.last_event = Some(stats.last_event.map_or(event.ts, |ts| ts.max(event.ts)));
        }
        stats
    }
}

/// Sorted, de-duplicated actions of all `tool` events.
pub fn tool_actions<'a, I>(events: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a ActivityEvent>,
{
    events
        .into_iter()
        .filter(|e| e.event_type == EventType::Tool)
        .map(|e| e.action.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
