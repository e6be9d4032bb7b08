//! Declarative recovery insight rules
//!
//! This module evaluates a subjective reflection (plus the matching Fitbit
//! workout, when one is available) against a static rule catalog and emits
//! prioritized, explainable insights. Evaluation is deterministic and pure;
//! persistence of the results happens in the command layer.

use crate::fitbit::Workout;
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// ---------------------------------------------------------------------------
/// Reflection Scores
/// ---------------------------------------------------------------------------

/// The eight 1-5 ratings a reflection carries, as plain numbers.
/// Callers coerce to integers before evaluation; the rules do no further
/// validation of the scale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflectionScores {
  pub mood: i64,
  pub hydration: i64,
  pub effort: i64,
  pub satisfaction: i64,
  pub sleep: i64,
  pub fatigue: i64,
  pub motivation: i64,
  pub pain: i64,
}

/// ---------------------------------------------------------------------------
/// Rule Catalog
/// ---------------------------------------------------------------------------

/// A single rule: stable id, display metadata, and a pure predicate over
/// the reflection and the optional workout.
pub struct RuleDef {
  pub id: &'static str,
  pub name: &'static str,
  pub priority: i64,
  pub condition: fn(&ReflectionScores, Option<&Workout>) -> bool,
  pub message: &'static str,
  pub rationale: &'static str,
}

/// Sentinel emitted when no catalog rule fires. Not part of the catalog;
/// excluded from trend statistics.
pub const NO_TRIGGER_RULE_ID: &str = "R0";
pub const NO_TRIGGER_PRIORITY: i64 = 99;

/// The full catalog, in declaration order. Lower priority = more urgent.
/// Rules R01-R03 are subjective-only; R04-R06 also consult the workout and
/// short-circuit to false when the needed objective field is missing.
pub const CATALOG: &[RuleDef] = &[
  RuleDef {
    id: "R01",
    name: "High Fatigue + High Effort",
    priority: 1,
    condition: |r, _| r.fatigue >= 4 && r.effort >= 4,
    message: "Consider prioritising recovery before your next workout.",
    rationale: "High subjective fatigue combined with high exertion may indicate inadequate recovery.",
  },
  RuleDef {
    id: "R02",
    name: "Poor Sleep + High Fatigue",
    priority: 2,
    condition: |r, _| r.sleep <= 2 && r.fatigue >= 4,
    message: "Sleep quality may be impacting recovery - consider resting.",
    rationale: "Low reported sleep quality alongside high fatigue suggests recovery impairment.",
  },
  RuleDef {
    id: "R03",
    name: "Low Motivation + Low Satisfaction",
    priority: 3,
    condition: |r, _| r.motivation <= 2 && r.satisfaction <= 2,
    message: "You may benefit from adjusting your workout intensity.",
    rationale: "Low motivation and satisfaction may indicate misalignment between training load and psychological readiness.",
  },
  RuleDef {
    id: "R04",
    name: "High Effort + Low Heart Rate",
    priority: 3,
    condition: |r, w| {
      r.effort >= 4
        && w
          .and_then(|w| w.average_heart_rate)
          .map_or(false, |hr| hr < 120)
    },
    message: "You reported high effort, but heart rate suggests low physiological intensity.",
    rationale: "Mismatch between perceived exertion and cardiovascular load may indicate physiological strain or inaccurate pacing.",
  },
  RuleDef {
    id: "R05",
    name: "Short Duration + High Fatigue",
    priority: 4,
    condition: |r, w| {
      // Fitbit reports duration in milliseconds
      r.fatigue >= 4
        && w
          .and_then(|w| w.duration)
          .map_or(false, |ms| (ms as f64 / 60_000.0) < 20.0)
    },
    message: "High fatigue following a short workout may indicate insufficient recovery.",
    rationale: "Experiencing high fatigue after low-duration training may reflect cumulative fatigue or poor recovery status.",
  },
  RuleDef {
    id: "R06",
    name: "High Heart Rate + Low Effort",
    priority: 5,
    condition: |r, w| {
      r.effort <= 2
        && w
          .and_then(|w| w.average_heart_rate)
          .map_or(false, |hr| hr > 160)
    },
    message: "Heart rate was high despite low perceived effort.",
    rationale: "Elevated cardiovascular load despite low perceived effort may indicate cardiovascular strain or adaptation changes.",
  },
];

/// ---------------------------------------------------------------------------
/// Insights
/// ---------------------------------------------------------------------------

/// One triggered rule's output, carrying its metadata verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
  pub rule_id: String,
  pub rule_name: String,
  pub message: String,
  pub rationale: String,
  pub priority: i64,
}

impl Insight {
  fn from_rule(rule: &RuleDef) -> Self {
    Self {
      rule_id: rule.id.to_string(),
      rule_name: rule.name.to_string(),
      message: rule.message.to_string(),
      rationale: rule.rationale.to_string(),
      priority: rule.priority,
    }
  }

  fn no_trigger() -> Self {
    Self {
      rule_id: NO_TRIGGER_RULE_ID.to_string(),
      rule_name: "No Trigger".to_string(),
      message: "No significant recovery or performance concerns detected.".to_string(),
      rationale: "Reflection and physiological metrics did not meet any rule thresholds.".to_string(),
      priority: NO_TRIGGER_PRIORITY,
    }
  }
}

/// ---------------------------------------------------------------------------
/// Evaluator
/// ---------------------------------------------------------------------------

/// Run the full catalog against a reflection and its optional workout.
///
/// Each predicate call is wrapped so a panicking rule is logged and treated
/// as a non-trigger instead of aborting the pass. If nothing fires, a single
/// sentinel insight is emitted, so the result is never empty. Output is
/// stable-sorted ascending by priority; ties keep catalog order.
pub fn evaluate(reflection: &ReflectionScores, workout: Option<&Workout>) -> Vec<Insight> {
  evaluate_catalog(CATALOG, reflection, workout)
}

fn evaluate_catalog(
  rules: &[RuleDef],
  reflection: &ReflectionScores,
  workout: Option<&Workout>,
) -> Vec<Insight> {
  let mut triggered = Vec::new();

  for rule in rules {
    match catch_unwind(AssertUnwindSafe(|| (rule.condition)(reflection, workout))) {
      Ok(true) => triggered.push(Insight::from_rule(rule)),
      Ok(false) => {}
      Err(_) => {
        eprintln!("Error evaluating {}: predicate panicked, skipping rule", rule.id);
      }
    }
  }

  if triggered.is_empty() {
    triggered.push(Insight::no_trigger());
  }

  // sort_by_key is stable, so equal priorities keep catalog order
  triggered.sort_by_key(|insight| insight.priority);

  triggered
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
