//! Tunables for the decision pipeline (spec §A.3). `EngineConfig::default()`
//! reproduces every constant spec.md hardcodes; loading a TOML file or
//! environment overrides is left to callers (e.g. via `figment`-style
//! merging), since the core itself only needs a plain value type.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// §4.6: "5 in endgame, 3 otherwise."
    pub max_attempts_default: u32,
    pub max_attempts_endgame: u32,
    /// §4.6: "Veto retry cap. 2."
    pub veto_retry_cap: u32,

    /// §4.4 STATE section: random-sized legal-move sample bounds, widened
    /// after a veto so the model isn't starved of options.
    pub sample_min: usize,
    pub sample_max: usize,
    pub sample_widen_step: usize,

    /// §4.3: forcing-first reply caps for the blunder check and the
    /// safe-fallback ranking respectively.
    pub forcing_reply_cap: usize,
    pub fallback_reply_cap: usize,

    /// §4.4 SAFE_SUGGESTIONS: "up to 3 UCIs."
    pub safe_suggestions_count: usize,

    /// §5: "typical 60s" per-call timeout.
    pub call_timeout_secs: u64,
    /// §4.5: exponential backoff retry budget for transient transport errors.
    pub transport_max_retries: u32,

    /// §4.5 phase-based sampling parameters.
    pub temperature_default: f32,
    pub temperature_endgame: f32,
    pub max_tokens_default: u32,
    pub max_tokens_endgame: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_attempts_default: 3,
            max_attempts_endgame: 5,
            veto_retry_cap: 2,
            sample_min: 6,
            sample_max: 12,
            sample_widen_step: 4,
            forcing_reply_cap: 12,
            fallback_reply_cap: 10,
            safe_suggestions_count: 3,
            call_timeout_secs: 60,
            transport_max_retries: 3,
            temperature_default: 0.7,
            temperature_endgame: 0.3,
            max_tokens_default: 500,
            max_tokens_endgame: 800,
        }
    }
}

impl EngineConfig {
    pub fn max_attempts(&self, phase: crate::position::Phase) -> u32 {
        if phase == crate::position::Phase::Endgame {
            self.max_attempts_endgame
        } else {
            self.max_attempts_default
        }
    }

    pub fn temperature(&self, phase: crate::position::Phase) -> f32 {
        if phase == crate::position::Phase::Endgame {
            self.temperature_endgame
        } else {
            self.temperature_default
        }
    }

    pub fn max_tokens(&self, phase: crate::position::Phase) -> u32 {
        if phase == crate::position::Phase::Endgame {
            self.max_tokens_endgame
        } else {
            self.max_tokens_default
        }
    }
}
