use std::collections::HashMap;

use serde_json::Value;

use super::hash::normalized_hash;
use super::{EvalContext, StrategyDecision};

// PARAMETERS
// Strategy parameters arrive as a free-form JSON map. Each strategy
// extracts a typed view of the keys it needs; a wrong shape becomes the
// reason string for a disabled result, never an error.

pub struct RolloutParams {
    pub rollout: f64,
    pub stickiness: String,
    pub group_id: String,
}

impl RolloutParams {
    pub fn from_map(parameters: &HashMap<String, Value>) -> Result<Self, String> {
        // rollout is stored as a JSON number by the API but older clients
        // send it as a numeric string; both are accepted.
        let rollout = match parameters.get("rollout") {
            Some(Value::Number(n)) => match n.as_f64() {
                Some(r) => r,
                None => return Err("Invalid rollout value".to_string()),
            },
            Some(Value::String(s)) => match s.trim().parse::<f64>() {
                Ok(r) => r,
                Err(_) => return Err("Invalid rollout value".to_string()),
            },
            _ => return Err("No rollout parameter".to_string()),
        };

        let stickiness = parameters
            .get("stickiness")
            .and_then(Value::as_str)
            .unwrap_or("userId")
            .to_string();

        let group_id = parameters
            .get("groupId")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();

        Ok(Self {
            rollout,
            stickiness,
            group_id,
        })
    }
}

pub struct UserIdParams {
    pub user_ids: Vec<String>,
}

impl UserIdParams {
    pub fn from_map(parameters: &HashMap<String, Value>) -> Result<Self, String> {
        match parameters.get("userIds").and_then(Value::as_str) {
            Some(raw) => Ok(Self {
                user_ids: split_multi(raw),
            }),
            None => Err("No userIds parameter".to_string()),
        }
    }
}

pub struct AddressParams {
    pub ips: Vec<String>,
}

impl AddressParams {
    pub fn from_map(parameters: &HashMap<String, Value>) -> Result<Self, String> {
        // Some stored strategies carry the key as "IPs"
        let raw = parameters
            .get("ips")
            .and_then(Value::as_str)
            .or_else(|| parameters.get("IPs").and_then(Value::as_str));

        match raw {
            Some(raw) => Ok(Self {
                ips: split_multi(raw),
            }),
            None => Err("No IPs parameter".to_string()),
        }
    }
}

/// Split a comma- or newline-separated list into trimmed, non-empty
/// entries, preserving order.
pub fn split_multi(raw: &str) -> Vec<String> {
    raw.split(|c| c == ',' || c == '\n')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

// STRATEGIES

/// Percentage rollout with deterministic stickiness hashing.
pub fn gradual_rollout(
    parameters: &HashMap<String, Value>,
    context: &EvalContext,
) -> StrategyDecision {
    let params = match RolloutParams::from_map(parameters) {
        Ok(p) => p,
        Err(reason) => return StrategyDecision::off(reason),
    };

    // Exact boundaries bypass hashing entirely
    if params.rollout >= 100.0 {
        return StrategyDecision::on("Rollout is 100% → always on".to_string());
    }
    if params.rollout <= 0.0 {
        return StrategyDecision::off("Rollout is 0% → always off".to_string());
    }

    let stickiness_value = match params.stickiness.as_str() {
        "userId" => context.user_id.clone().unwrap_or_default(),
        "sessionId" => context.session_id.clone().unwrap_or_default(),
        other => context.properties.get(other).cloned().unwrap_or_default(),
    };

    // A subject with no stickiness value is forced off rather than
    // bucketed randomly.
    if stickiness_value.is_empty() {
        return StrategyDecision::off(format!(
            "Stickiness field \"{}\" is empty",
            params.stickiness
        ));
    }

    let subject = format!("{}{}", stickiness_value, params.group_id);
    let bucket = normalized_hash(&subject);
    let enabled = f64::from(bucket) < params.rollout;

    StrategyDecision {
        result: enabled,
        reason: format!(
            "hash(\"{}\") % 100 = {} {} {}",
            subject,
            bucket,
            if enabled { "<" } else { ">=" },
            params.rollout
        ),
    }
}

/// Allow-list of user ids.
pub fn user_with_id(
    parameters: &HashMap<String, Value>,
    context: &EvalContext,
) -> StrategyDecision {
    let params = match UserIdParams::from_map(parameters) {
        Ok(p) => p,
        Err(reason) => return StrategyDecision::off(reason),
    };

    let user_id = context.user_id.clone().unwrap_or_default();
    if params.user_ids.iter().any(|id| *id == user_id) {
        StrategyDecision::on(format!(
            "User \"{}\" found in [{}]",
            user_id,
            params.user_ids.join(", ")
        ))
    } else {
        StrategyDecision::off(format!(
            "User \"{}\" not in [{}]",
            user_id,
            params.user_ids.join(", ")
        ))
    }
}

/// Allow-list of IP addresses; an entry ending in `.` matches as a
/// dotted prefix.
pub fn remote_address(
    parameters: &HashMap<String, Value>,
    context: &EvalContext,
) -> StrategyDecision {
    let params = match AddressParams::from_map(parameters) {
        Ok(p) => p,
        Err(reason) => return StrategyDecision::off(reason),
    };

    let address = context.remote_address.clone().unwrap_or_default();
    for entry in &params.ips {
        if *entry == address {
            return StrategyDecision::on(format!("\"{}\" matches \"{}\" exactly", address, entry));
        }
        if entry.ends_with('.') && address.starts_with(entry.as_str()) {
            return StrategyDecision::on(format!(
                "\"{}\" matches prefix \"{}\"",
                address, entry
            ));
        }
    }

    StrategyDecision::off(format!(
        "\"{}\" not in [{}]",
        address,
        params.ips.join(", ")
    ))
}
