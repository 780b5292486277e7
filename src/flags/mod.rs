use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::evaluation::constraint::OPERATORS;
use crate::evaluation::{evaluate_strategy, EvalContext, EvalTrace, Strategy};

// MODELS

/// The payload the server ships to SDK clients: every flag in one
/// project/environment with its strategies and constraints inlined.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlagsPayload {
    pub flags: Vec<FlagConfig>,
}

/// One flag as it appears on the wire. `enabled` is the per-environment
/// toggle, AND'd with the strategy results during evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlagConfig {
    pub name: String,
    pub enabled: bool,
    #[serde(default)]
    pub strategies: Vec<Strategy>,
}

/// Per-flag outcome of an evaluation.
#[derive(Debug, Serialize)]
pub struct FlagEvaluation {
    pub enabled: bool,
    pub reason: String,
}

/// The strategy names the evaluator implements. Unknown names still
/// evaluate (they pass), so this list is for input validation only.
pub const STRATEGY_NAMES: [&str; 4] = ["default", "gradualRollout", "userWithId", "remoteAddress"];

// EVALUATION

/// Evaluate a single flag for a context.
///
/// A flag is enabled when its toggle is on and either no strategies are
/// configured or at least one strategy evaluates to true.
pub fn evaluate_flag(flag: &FlagConfig, context: &EvalContext) -> FlagEvaluation {
    if !flag.enabled {
        return FlagEvaluation {
            enabled: false,
            reason: "Flag is disabled in this environment".to_string(),
        };
    }

    if flag.strategies.is_empty() {
        return FlagEvaluation {
            enabled: true,
            reason: "Flag is enabled with no strategies".to_string(),
        };
    }

    for strategy in &flag.strategies {
        let trace = evaluate_strategy(strategy, context);
        if trace.final_result {
            return FlagEvaluation {
                enabled: true,
                reason: format!("Strategy \"{}\": {}", strategy.name, trace.strategy_reason),
            };
        }
    }

    FlagEvaluation {
        enabled: false,
        reason: "No strategy matched".to_string(),
    }
}

/// Same decision as [`evaluate_flag`], plus the full trace of every
/// strategy. All strategies are evaluated even after one matches, so a
/// playground can display the complete picture.
pub fn evaluate_flag_detailed(flag: &FlagConfig, context: &EvalContext) -> (bool, Vec<EvalTrace>) {
    let traces: Vec<EvalTrace> = flag
        .strategies
        .iter()
        .map(|strategy| evaluate_strategy(strategy, context))
        .collect();

    let enabled =
        flag.enabled && (traces.is_empty() || traces.iter().any(|trace| trace.final_result));

    (enabled, traces)
}

/// Evaluate every flag in a payload against one context, keyed by flag
/// name. Evaluations are independent of each other.
pub fn evaluate_all(
    payload: &FlagsPayload,
    context: &EvalContext,
) -> HashMap<String, FlagEvaluation> {
    payload
        .flags
        .iter()
        .map(|flag| (flag.name.clone(), evaluate_flag(flag, context)))
        .collect()
}

// HELPER FUNCTIONS

/// Validate a constraint operator before storing it.
pub fn validate_operator(operator: &str) -> Result<(), String> {
    if OPERATORS.contains(&operator) {
        Ok(())
    } else {
        Err(format!(
            "Invalid operator '{}'. Must be one of: {}",
            operator,
            OPERATORS.join(", ")
        ))
    }
}

/// Validate a strategy name before storing it. Advisory: evaluation
/// accepts any name.
pub fn validate_strategy_name(name: &str) -> Result<(), String> {
    if STRATEGY_NAMES.contains(&name) {
        Ok(())
    } else {
        Err(format!(
            "Invalid strategy '{}'. Must be one of: {}",
            name,
            STRATEGY_NAMES.join(", ")
        ))
    }
}

// Checks the rollout percentage is between 0 and 100
pub fn validate_rollout(percentage: i64) -> Result<(), String> {
    if !(0..=100).contains(&percentage) {
        return Err("Rollout percentage must be between 0 and 100".to_string());
    }

    Ok(())
}
