//! Model Client (spec §4.5): abstract transport to a remote LLM. Real
//! HTTP providers are out of scope (§1); this module defines the trait
//! boundary, phase-based parameter selection, and a backoff wrapper any
//! concrete transport can sit behind.

use crate::config::EngineConfig;
use crate::error::TransportError;
use crate::position::Phase;
use rand::Rng;
use std::io::{BufRead, Write};
use std::time::Duration;

/// Phase-based sampling parameters handed to the model (spec §4.5).
#[derive(Debug, Clone, Copy)]
pub struct CallParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

pub fn call_params_for_phase(config: &EngineConfig, phase: Phase) -> CallParams {
    CallParams {
        temperature: config.temperature(phase),
        max_tokens: config.max_tokens(phase),
    }
}

/// Transport to a remote model. Implementations own their own HTTP/SDK
/// details; the core only ever sees `Result<String, TransportError>`.
pub trait ModelClient {
    fn call(
        &mut self,
        prompt: &str,
        model_id: &str,
        params: CallParams,
    ) -> Result<String, TransportError>;
}

/// Wraps any `ModelClient` with exponential backoff and jitter on
/// retryable transport errors, surfacing non-retryable errors immediately
/// (spec §4.5).
pub fn call_with_backoff(
    client: &mut dyn ModelClient,
    prompt: &str,
    model_id: &str,
    params: CallParams,
    max_retries: u32,
    rng: &mut impl Rng,
) -> Result<String, TransportError> {
    let mut attempt = 0;
    loop {
        match client.call(prompt, model_id, params) {
            Ok(text) => return Ok(text),
            Err(err @ TransportError::NonRetryable { .. }) => return Err(err),
            Err(err) => {
                if attempt >= max_retries {
                    return Err(err);
                }
                let base_ms = 200u64 * 2u64.pow(attempt);
                let jitter_ms = rng.gen_range(0..=base_ms / 2 + 1);
                std::thread::sleep(Duration::from_millis(base_ms + jitter_ms));
                attempt += 1;
            }
        }
    }
}

/// Default development transport: echoes the prompt to stdout and reads
/// one line from stdin as the model's reply, in the spirit of the
/// teacher's own UCI stdin/stdout command loop.
pub struct StdinModelClient;

impl ModelClient for StdinModelClient {
    fn call(
        &mut self,
        prompt: &str,
        model_id: &str,
        _params: CallParams,
    ) -> Result<String, TransportError> {
        println!("--- prompt for {model_id} ---");
        println!("{prompt}");
        println!("--- end prompt, type a response line ---");
        std::io::stdout().flush().map_err(|e| TransportError::Retryable {
            model_id: model_id.to_string(),
            message: e.to_string(),
        })?;

        let stdin = std::io::stdin();
        let mut line = String::new();
        stdin
            .lock()
            .read_line(&mut line)
            .map_err(|e| TransportError::Retryable {
                model_id: model_id.to_string(),
                message: e.to_string(),
            })?;
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FlakyThenOk {
        failures_left: u32,
    }

    impl ModelClient for FlakyThenOk {
        fn call(
            &mut self,
            _prompt: &str,
            model_id: &str,
            _params: CallParams,
        ) -> Result<String, TransportError> {
            if self.failures_left > 0 {
                self.failures_left -= 1;
                Err(TransportError::Retryable {
                    model_id: model_id.to_string(),
                    message: "temporary".to_string(),
                })
            } else {
                Ok("MOVE: e4".to_string())
            }
        }
    }

    struct AlwaysNonRetryable;

    impl ModelClient for AlwaysNonRetryable {
        fn call(
            &mut self,
            _prompt: &str,
            model_id: &str,
            _params: CallParams,
        ) -> Result<String, TransportError> {
            Err(TransportError::NonRetryable {
                model_id: model_id.to_string(),
                status: 401,
                message: "bad key".to_string(),
            })
        }
    }

    #[test]
    fn retries_retryable_errors_until_success() {
        let mut client = FlakyThenOk { failures_left: 2 };
        let mut rng = rand::thread_rng();
        let result = call_with_backoff(
            &mut client,
            "p",
            "model-a",
            CallParams { temperature: 0.7, max_tokens: 500 },
            5,
            &mut rng,
        );
        assert_eq!(result.unwrap(), "MOVE: e4");
    }

    #[test]
    fn non_retryable_errors_short_circuit() {
        let mut client = AlwaysNonRetryable;
        let mut rng = rand::thread_rng();
        let result = call_with_backoff(
            &mut client,
            "p",
            "model-a",
            CallParams { temperature: 0.7, max_tokens: 500 },
            5,
            &mut rng,
        );
        assert!(matches!(result, Err(TransportError::NonRetryable { .. })));
    }

    #[test]
    fn phase_params_match_spec() {
        let config = EngineConfig::default();
        let endgame = call_params_for_phase(&config, Phase::Endgame);
        assert_eq!(endgame.temperature, 0.3);
        assert_eq!(endgame.max_tokens, 800);
        let middlegame = call_params_for_phase(&config, Phase::Middlegame);
        assert_eq!(middlegame.temperature, 0.7);
        assert_eq!(middlegame.max_tokens, 500);
    }
}
