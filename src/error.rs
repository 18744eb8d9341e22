//! Error taxonomy for the move decision pipeline (spec §7).

use thiserror::Error;

/// Errors surfaced by the [`crate::model_client::ModelClient`] transport boundary.
///
/// Retryable errors are absorbed by the client's own backoff loop; once that
/// budget is exhausted the Decision Loop treats whatever comes out the same
/// way it treats a [`CoreError::ParseError`].
#[derive(Debug, Error, Clone)]
pub enum TransportError {
    #[error("transport error calling model {model_id}: {message}")]
    Retryable { model_id: String, message: String },
    #[error("non-retryable client error calling model {model_id} (status {status}): {message}")]
    NonRetryable {
        model_id: String,
        status: u16,
        message: String,
    },
    #[error("call to model {model_id} timed out after {elapsed_ms}ms")]
    Timeout { model_id: String, elapsed_ms: u64 },
}

/// Errors produced within the Decision Loop / Game Driver core.
#[derive(Debug, Error, Clone)]
pub enum CoreError {
    #[error("could not parse a move from the model response: {reason}")]
    ParseError { reason: String },

    #[error("parsed move '{attempted}' is not legal in the current position: {reason}")]
    IllegalMove { attempted: String, reason: String },

    #[error("move '{uci}' vetoed by tactical filter (worst-case -{worst_drop} vs threshold {threshold}; reply {worst_reply})")]
    Veto {
        uci: String,
        worst_drop: i32,
        threshold: i32,
        worst_reply: String,
    },

    #[error("model transport failed: {0}")]
    Transport(#[from] TransportError),

    #[error("attempt budget ({max_attempts}) exhausted for this ply")]
    Exhaustion { max_attempts: u32 },

    #[error("no legal moves available in a position the game driver treated as ongoing")]
    NoLegalMoves,

    #[error("rules engine reported an unexpected failure: {0}")]
    RulesEngineError(String),
}

impl CoreError {
    /// Whether this error should count against the per-ply `attempt` budget
    /// (spec §4.6 / §8: incremented on ParseError, IllegalMove, TransportError;
    /// never on Veto).
    pub fn consumes_attempt(&self) -> bool {
        !matches!(self, CoreError::Veto { .. })
    }
}
