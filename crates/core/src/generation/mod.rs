//! Bounded draft, validate and repair loop around a single model.

pub mod attempt;
pub mod repair_loop;

pub use attempt::{AttemptOutcome, FailureReason, GenerationAttempt, LoopOutcome, LoopResult};
pub use repair_loop::{
    CONFIG_ERROR_NARRATIVE, EXHAUSTED_NARRATIVE, Generator, NO_RESPONSE_NARRATIVE, PROVIDER_ERROR_NARRATIVE,
    TRUNCATION_NOTE, TurnRequest,
};
