use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::EvalContext;

// MODELS

/// A predicate gating a strategy: one context field tested against a set
/// of values. Constraints on a strategy are AND'd together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constraint {
    pub context_name: String,
    pub operator: String,
    pub values: Vec<String>,
    #[serde(default)]
    pub inverted: bool,
    #[serde(default)]
    pub case_insensitive: bool,
}

/// Outcome of checking one constraint against a context.
#[derive(Debug, Clone)]
pub struct ConstraintCheck {
    pub passed: bool,
    pub reason: String,
}

/// Every operator a constraint may carry on the wire.
pub const OPERATORS: [&str; 12] = [
    "IN",
    "NOT_IN",
    "STR_CONTAINS",
    "STR_STARTS_WITH",
    "STR_ENDS_WITH",
    "NUM_EQ",
    "NUM_GT",
    "NUM_GTE",
    "NUM_LT",
    "NUM_LTE",
    "DATE_AFTER",
    "DATE_BEFORE",
];

// Parsed form of the operator string. Unrecognized strings stay outside
// this enum and evaluate to false.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    In,
    NotIn,
    StrContains,
    StrStartsWith,
    StrEndsWith,
    NumEq,
    NumGt,
    NumGte,
    NumLt,
    NumLte,
    DateAfter,
    DateBefore,
}

impl Operator {
    fn parse(operator: &str) -> Option<Self> {
        match operator {
            "IN" => Some(Self::In),
            "NOT_IN" => Some(Self::NotIn),
            "STR_CONTAINS" => Some(Self::StrContains),
            "STR_STARTS_WITH" => Some(Self::StrStartsWith),
            "STR_ENDS_WITH" => Some(Self::StrEndsWith),
            "NUM_EQ" => Some(Self::NumEq),
            "NUM_GT" => Some(Self::NumGt),
            "NUM_GTE" => Some(Self::NumGte),
            "NUM_LT" => Some(Self::NumLt),
            "NUM_LTE" => Some(Self::NumLte),
            "DATE_AFTER" => Some(Self::DateAfter),
            "DATE_BEFORE" => Some(Self::DateBefore),
            _ => None,
        }
    }
}

/// Check a single constraint against a context.
///
/// Never fails: an unknown operator or an unparsable context value
/// evaluates to false, and unparsable entries in `values` are skipped.
pub fn evaluate_constraint(constraint: &Constraint, context: &EvalContext) -> ConstraintCheck {
    let ctx_value = context.value_of(&constraint.context_name);

    let matched = match Operator::parse(&constraint.operator) {
        Some(operator) => eval_operator(
            operator,
            &ctx_value,
            &constraint.values,
            constraint.case_insensitive,
        ),
        None => false,
    };

    // Inversion applies after the operator, so an inverted unknown
    // operator passes.
    let passed = if constraint.inverted { !matched } else { matched };

    let label = if constraint.inverted {
        format!("NOT({})", constraint.operator)
    } else {
        constraint.operator.clone()
    };
    let outcome = if passed { "pass" } else { "fail" };
    let reason = format!(
        "\"{}\" {} [{}] → {}",
        ctx_value,
        label,
        constraint.values.join(", "),
        outcome
    );

    ConstraintCheck { passed, reason }
}

// True when the context value matches ANY entry in `values`.
fn eval_operator(operator: Operator, ctx_value: &str, values: &[String], fold_case: bool) -> bool {
    let cv = if fold_case {
        ctx_value.to_lowercase()
    } else {
        ctx_value.to_string()
    };

    match operator {
        Operator::In => values.iter().any(|v| cv == fold(v, fold_case)),
        Operator::NotIn => !values.iter().any(|v| cv == fold(v, fold_case)),
        Operator::StrContains => values.iter().any(|v| cv.contains(&fold(v, fold_case))),
        Operator::StrStartsWith => values.iter().any(|v| cv.starts_with(&fold(v, fold_case))),
        Operator::StrEndsWith => values.iter().any(|v| cv.ends_with(&fold(v, fold_case))),
        Operator::NumEq
        | Operator::NumGt
        | Operator::NumGte
        | Operator::NumLt
        | Operator::NumLte => num_compare(operator, &cv, values),
        Operator::DateAfter | Operator::DateBefore => date_compare(operator, &cv, values),
    }
}

fn fold(value: &str, fold_case: bool) -> String {
    if fold_case {
        value.to_lowercase()
    } else {
        value.to_string()
    }
}

fn num_compare(operator: Operator, ctx_value: &str, values: &[String]) -> bool {
    let num: f64 = match ctx_value.trim().parse() {
        Ok(n) => n,
        Err(_) => return false,
    };

    values.iter().any(|v| match v.trim().parse::<f64>() {
        Ok(target) => match operator {
            Operator::NumEq => num == target,
            Operator::NumGt => num > target,
            Operator::NumGte => num >= target,
            Operator::NumLt => num < target,
            Operator::NumLte => num <= target,
            _ => false,
        },
        // Entries that aren't numbers are skipped, not errors.
        Err(_) => false,
    })
}

fn date_compare(operator: Operator, ctx_value: &str, values: &[String]) -> bool {
    let instant = match parse_date(ctx_value) {
        Some(t) => t,
        None => return false,
    };

    values.iter().any(|v| match parse_date(v) {
        Some(target) => match operator {
            Operator::DateAfter => instant > target,
            Operator::DateBefore => instant < target,
            _ => false,
        },
        None => false,
    })
}

// Accepts RFC 3339 timestamps and bare YYYY-MM-DD dates (read as midnight
// UTC). Anything else is unparsable.
fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(t) = DateTime::parse_from_rfc3339(value) {
        return Some(t.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| Utc.from_utc_datetime(&d))
}
