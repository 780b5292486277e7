//! Deterministic feature-flag evaluation: strategies, constraints and the
//! stable rollout hash shared by the server, the SDKs and the docs
//! playground. Every evaluation is a pure function over its inputs and
//! must produce identical results in every implementation.

pub mod evaluation;
pub mod flags;

pub use evaluation::constraint::{evaluate_constraint, Constraint, ConstraintCheck, OPERATORS};
pub use evaluation::hash::normalized_hash;
pub use evaluation::{evaluate_strategy, ConstraintResult, EvalContext, EvalTrace, Strategy};
pub use flags::{
    evaluate_all, evaluate_flag, evaluate_flag_detailed, validate_operator, validate_rollout,
    validate_strategy_name, FlagConfig, FlagEvaluation, FlagsPayload, STRATEGY_NAMES,
};
