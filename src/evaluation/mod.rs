pub mod constraint;
pub mod hash;
mod strategies;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use constraint::{evaluate_constraint, Constraint};

// MODELS

/// Caller-supplied facts about the subject being evaluated.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalContext {
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub remote_address: Option<String>,
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

impl EvalContext {
    /// Resolve a context field by name. `userId`, `sessionId` and
    /// `remoteAddress` are reserved and read the fixed fields; any other
    /// name is looked up in the custom properties. Absent values read as
    /// empty string.
    pub fn value_of(&self, name: &str) -> String {
        match name {
            "userId" => self.user_id.clone().unwrap_or_default(),
            "sessionId" => self.session_id.clone().unwrap_or_default(),
            "remoteAddress" => self.remote_address.clone().unwrap_or_default(),
            _ => self.properties.get(name).cloned().unwrap_or_default(),
        }
    }
}

/// One targeting rule on a flag: a named strategy, its parameters, and
/// the constraints gating it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Strategy {
    pub name: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub parameters: HashMap<String, Value>,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
}

/// One constraint's row in a trace, in configuration order.
#[derive(Debug, Clone, Serialize)]
pub struct ConstraintResult {
    pub constraint: Constraint,
    pub passed: bool,
    pub reason: String,
}

/// Structured explanation of how a strategy evaluation reached its
/// result. The reason strings are display-only and must never be parsed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalTrace {
    pub constraints: Vec<ConstraintResult>,
    pub strategy_result: bool,
    pub strategy_reason: String,
    pub final_result: bool,
}

// What a strategy's own logic decided, before it is folded into a trace.
#[derive(Debug)]
pub(crate) struct StrategyDecision {
    pub result: bool,
    pub reason: String,
}

impl StrategyDecision {
    fn on(reason: String) -> Self {
        Self {
            result: true,
            reason,
        }
    }

    fn off(reason: String) -> Self {
        Self {
            result: false,
            reason,
        }
    }
}

/// Evaluate a strategy against a context.
///
/// Constraints are checked first and AND'd; strategy-specific logic only
/// runs when every constraint passed. Never fails: malformed input
/// degrades to a disabled result with an explanatory reason.
pub fn evaluate_strategy(strategy: &Strategy, context: &EvalContext) -> EvalTrace {
    // Every constraint is evaluated so the trace shows all rows, even
    // when an early one already failed.
    let constraints: Vec<ConstraintResult> = strategy
        .constraints
        .iter()
        .map(|constraint| {
            let check = evaluate_constraint(constraint, context);
            ConstraintResult {
                constraint: constraint.clone(),
                passed: check.passed,
                reason: check.reason,
            }
        })
        .collect();

    if constraints.iter().any(|result| !result.passed) {
        return EvalTrace {
            constraints,
            strategy_result: false,
            strategy_reason: "Constraints failed (AND logic)".to_string(),
            final_result: false,
        };
    }

    let decision = match strategy.name.as_str() {
        "default" => StrategyDecision::on("Default strategy → always on".to_string()),
        "gradualRollout" => strategies::gradual_rollout(&strategy.parameters, context),
        "userWithId" => strategies::user_with_id(&strategy.parameters, context),
        "remoteAddress" => strategies::remote_address(&strategy.parameters, context),
        // Unrecognized strategy names pass rather than block the flag
        other => StrategyDecision::on(format!("Unknown strategy \"{}\" → pass", other)),
    };

    EvalTrace {
        constraints,
        strategy_result: decision.result,
        strategy_reason: decision.reason,
        final_result: decision.result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn strategy(name: &str, parameters: &[(&str, Value)], constraints: Vec<Constraint>) -> Strategy {
        Strategy {
            name: name.to_string(),
            parameters: parameters
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
            constraints,
        }
    }

    fn constraint(context_name: &str, operator: &str, values: &[&str]) -> Constraint {
        Constraint {
            context_name: context_name.to_string(),
            operator: operator.to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
            inverted: false,
            case_insensitive: false,
        }
    }

    fn user_context(user_id: &str) -> EvalContext {
        EvalContext {
            user_id: Some(user_id.to_string()),
            ..EvalContext::default()
        }
    }

    #[test]
    fn test_default_strategy_always_on() {
        let s = strategy("default", &[], vec![]);
        let trace = evaluate_strategy(&s, &EvalContext::default());

        assert!(trace.final_result);
        assert!(trace.strategy_result);
        assert_eq!(trace.strategy_reason, "Default strategy → always on");
        assert!(trace.constraints.is_empty());
    }

    #[test]
    fn test_failing_constraint_skips_strategy_logic() {
        // 100% rollout would always pass, so the only way finalResult can
        // be false is the constraint gate firing first
        let s = strategy(
            "gradualRollout",
            &[("rollout", json!(100))],
            vec![constraint("country", "IN", &["BR"])],
        );
        let trace = evaluate_strategy(&s, &user_context("42"));

        assert!(!trace.final_result);
        assert!(!trace.strategy_result);
        assert_eq!(trace.strategy_reason, "Constraints failed (AND logic)");
        assert_eq!(trace.constraints.len(), 1);
        assert!(!trace.constraints[0].passed);
    }

    #[test]
    fn test_passing_constraint_runs_strategy_logic() {
        let mut context = user_context("42");
        context
            .properties
            .insert("country".to_string(), "BR".to_string());

        let s = strategy(
            "userWithId",
            &[("userIds", json!("1,2,42"))],
            vec![constraint("country", "IN", &["BR"])],
        );
        let trace = evaluate_strategy(&s, &context);

        assert!(trace.final_result);
        assert!(trace.constraints[0].passed);
    }

    #[test]
    fn test_all_constraints_appear_in_trace_in_order() {
        let mut context = user_context("42");
        context
            .properties
            .insert("plan".to_string(), "free".to_string());

        let s = strategy(
            "default",
            &[],
            vec![
                constraint("plan", "IN", &["enterprise"]),
                constraint("userId", "IN", &["42"]),
            ],
        );
        let trace = evaluate_strategy(&s, &context);

        // First fails, second still evaluated and recorded in order
        assert_eq!(trace.constraints.len(), 2);
        assert_eq!(trace.constraints[0].constraint.context_name, "plan");
        assert!(!trace.constraints[0].passed);
        assert_eq!(trace.constraints[1].constraint.context_name, "userId");
        assert!(trace.constraints[1].passed);
        assert!(!trace.final_result);
    }

    #[test]
    fn test_unknown_strategy_fails_open() {
        let s = strategy("canaryByRegion", &[], vec![]);
        let trace = evaluate_strategy(&s, &EvalContext::default());

        assert!(trace.final_result);
        assert_eq!(
            trace.strategy_reason,
            "Unknown strategy \"canaryByRegion\" → pass"
        );

        // Constraints still gate unknown strategies
        let s = strategy(
            "canaryByRegion",
            &[],
            vec![constraint("plan", "IN", &["pro"])],
        );
        let trace = evaluate_strategy(&s, &EvalContext::default());
        assert!(!trace.final_result);
    }

    #[test]
    fn test_gradual_rollout_end_to_end() {
        let s = strategy("gradualRollout", &[("rollout", json!(50))], vec![]);

        // hash("user7") = 11 → in; hash("user6") = 92 → out
        assert!(evaluate_strategy(&s, &user_context("user7")).final_result);
        assert!(!evaluate_strategy(&s, &user_context("user6")).final_result);

        // No stickiness value → forced off
        assert!(!evaluate_strategy(&s, &EvalContext::default()).final_result);
    }

    #[test]
    fn test_trace_serializes_camel_case() {
        let s = strategy("default", &[], vec![constraint("plan", "IN", &["pro"])]);
        let mut context = EvalContext::default();
        context
            .properties
            .insert("plan".to_string(), "pro".to_string());

        let trace = evaluate_strategy(&s, &context);
        let json = serde_json::to_value(&trace).unwrap();

        assert_eq!(json["finalResult"], json!(true));
        assert_eq!(json["strategyResult"], json!(true));
        assert_eq!(json["constraints"][0]["passed"], json!(true));
        assert_eq!(
            json["constraints"][0]["constraint"]["context_name"],
            json!("plan")
        );
    }

    #[test]
    fn test_context_deserializes_camel_case() {
        let context: EvalContext = serde_json::from_value(json!({
            "userId": "42",
            "remoteAddress": "10.0.0.1",
            "properties": { "plan": "pro" }
        }))
        .unwrap();

        assert_eq!(context.value_of("userId"), "42");
        assert_eq!(context.value_of("remoteAddress"), "10.0.0.1");
        assert_eq!(context.value_of("plan"), "pro");
        assert_eq!(context.value_of("sessionId"), "");
        assert_eq!(context.value_of("missing"), "");
    }
}
