//! Trend statistics over historical rule firings
//!
//! Aggregates persisted insight records into per-rule frequency stats for
//! the insights view. Pure computation; the command layer supplies the
//! records and serializes the result as-is.

use crate::rules::NO_TRIGGER_RULE_ID;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A persisted rule firing, as read back from the insights table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleFiring {
  pub rule_id: String,
  pub rule_name: String,
  pub priority: i64,
}

/// Frequency statistics for one rule across all stored insights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendStat {
  pub rule_id: String,
  pub rule_name: String,
  /// Most severe priority ever recorded for this rule. Guards against a
  /// rule's priority having changed across catalog revisions.
  pub priority: i64,
  pub count: i64,
  /// Share of all counted firings, rounded to one decimal place.
  pub percentage: f64,
}

/// Aggregate all stored insight records into per-rule trend stats.
///
/// Sentinel "no trigger" records are excluded. Output is ordered by
/// descending count, ties broken by ascending rule id so the ordering is
/// deterministic. An empty qualifying set yields an empty result.
pub fn aggregate(records: &[RuleFiring]) -> Vec<TrendStat> {
  // (count, min priority), keyed by (rule_id, rule_name)
  let mut groups: HashMap<(String, String), (i64, i64)> = HashMap::new();

  for record in records {
    if record.rule_id == NO_TRIGGER_RULE_ID {
      continue;
    }

    let entry = groups
      .entry((record.rule_id.clone(), record.rule_name.clone()))
      .or_insert((0, record.priority));
    entry.0 += 1;
    entry.1 = entry.1.min(record.priority);
  }

  let total: i64 = groups.values().map(|(count, _)| count).sum();
  if total == 0 {
    return Vec::new();
  }

  let mut stats: Vec<TrendStat> = groups
    .into_iter()
    .map(|((rule_id, rule_name), (count, priority))| TrendStat {
      rule_id,
      rule_name,
      priority,
      count,
      percentage: round_one_decimal(count as f64 / total as f64 * 100.0),
    })
    .collect();

  stats.sort_by(|a, b| {
    b.count
      .cmp(&a.count)
      .then_with(|| a.rule_id.cmp(&b.rule_id))
  });

  stats
}

/// Round half-up to one decimal place
fn round_one_decimal(value: f64) -> f64 {
  (value * 10.0).round() / 10.0
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
