//! Core of the LLM-vs-LLM chess Move Decision Pipeline: prompt
//! construction, response parsing, legal-move validation, tactical
//! blunder veto, and the per-ply retry/fallback state machine.

pub mod config;
pub mod decision;
pub mod error;
pub mod game;
pub mod logging;
pub mod model_client;
pub mod notation;
pub mod parser;
pub mod pgn;
pub mod position;
pub mod prompt;
pub mod rng;
pub mod tactical;

pub use config::EngineConfig;
pub use decision::{run_ply, DecisionResult, PlyInputs, TurnState};
pub use error::{CoreError, TransportError};
pub use game::{GameDriver, GameObserver, GameResult, GameState, PlayerBinding, Termination};
pub use model_client::{CallParams, ModelClient, StdinModelClient};
pub use position::{Phase, PositionAnalysis};
