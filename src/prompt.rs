//! Prompt Builder (spec §4.4): assembles a phase-aware, feedback-aware
//! structured prompt from a position's analysis and the current turn's
//! retry state.

use crate::config::EngineConfig;
use crate::notation::format_uci;
use crate::position::{Phase, PositionAnalysis};
use crate::rng::SampleRng;
use chess::{Board, MoveGen};

/// Everything the Prompt Builder needs about the current ply that isn't
/// already captured in a `PositionAnalysis`.
pub struct PromptContext<'a> {
    pub board: &'a Board,
    pub analysis: &'a PositionAnalysis,
    pub opening_name: &'a str,
    pub recent_san: &'a [String],
    pub last_san: Option<&'a str>,
    pub last_failure: Option<&'a str>,
    pub avoid_moves: &'a [String],
    pub safe_suggestions: &'a [String],
    pub veto_occurred: bool,
}

fn strategy_guide(phase: Phase, in_check: bool) -> String {
    let mut guide = match phase {
        Phase::Opening => {
            "Develop minor pieces toward the center, castle early, avoid moving \
             the same piece twice without reason, and don't bring the queen out \
             too soon."
        }
        Phase::Middlegame => {
            "Look for tactical opportunities, coordinate your pieces, watch for \
             hanging material on both sides, and improve your worst-placed piece."
        }
        Phase::Endgame => {
            "Activate your king, push passed pawns, and convert material \
             advantages carefully; avoid unnecessary piece trades that simplify \
             into a loss."
        }
    }
    .to_string();

    if in_check {
        guide = format!("You are in check: consider only moves that resolve the check. {guide}");
    }
    guide
}

fn material_tag(balance: i32) -> &'static str {
    if balance > 2 {
        "you are ahead on material"
    } else if balance < -2 {
        "you are behind on material"
    } else {
        "material is roughly balanced"
    }
}

fn center_control_summary(analysis: &PositionAnalysis) -> String {
    format!(
        "center control (d4/d5/e4/e5): white attacks {}, black attacks {}",
        analysis.center_control.white, analysis.center_control.black
    )
}

fn last_moves_tail(recent_san: &[String], n: usize) -> String {
    if recent_san.is_empty() {
        return "(none yet)".to_string();
    }
    let start = recent_san.len().saturating_sub(n);
    recent_san[start..].join(" ")
}

/// Sample bounds widen monotonically after each veto this ply so the
/// model isn't starved of options (spec §4.4 "Determinism").
fn sample_bounds(config: &EngineConfig, veto_retries: u32) -> (usize, usize) {
    let widen = config.sample_widen_step * veto_retries as usize;
    (config.sample_min + widen, config.sample_max + widen)
}

/// Build the full prompt string for this attempt.
pub fn build_prompt(
    ctx: &PromptContext,
    config: &EngineConfig,
    veto_retries: u32,
    rng: &mut SampleRng,
) -> String {
    let legal: Vec<String> = MoveGen::new_legal(ctx.board).map(format_uci).collect();
    let (low, high) = sample_bounds(config, veto_retries);
    let low = low.min(legal.len());
    let high = high.min(legal.len());
    let sample_size = rng.gen_range_usize(low, high + 1);
    let sample = rng.sample_distinct(&legal, sample_size);

    let mut s = String::new();

    s.push_str("STATE:\n");
    s.push_str(&format!("side_to_move: {:?}\n", ctx.board.side_to_move()));
    s.push_str(&format!(
        "fullmove_number: {}\n",
        ctx.analysis.phase_info.fullmove_number
    ));
    s.push_str(&format!("fen: {}\n", ctx.board));
    s.push_str(&format!(
        "recent_moves: {}\n",
        last_moves_tail(ctx.recent_san, 6)
    ));
    s.push_str(&format!(
        "last_move: {}\n",
        ctx.last_san.unwrap_or("(none)")
    ));
    s.push_str(&format!("opening: {}\n", ctx.opening_name));
    s.push_str(&format!("phase: {}\n", ctx.analysis.phase));
    s.push_str(&format!("sample_legal_moves: {}\n", sample.join(", ")));
    if !ctx.avoid_moves.is_empty() {
        s.push_str(&format!("avoid_moves: {}\n", ctx.avoid_moves.join(", ")));
    }

    let in_check = ctx.board.checkers().popcnt() > 0;
    s.push_str("\nSTRATEGY_GUIDE:\n");
    s.push_str(&strategy_guide(ctx.analysis.phase, in_check));
    s.push('\n');

    s.push_str("\nPOSITION_INSIGHTS:\n");
    s.push_str(&ctx.analysis.threats_text);
    s.push('\n');
    s.push_str(material_tag(ctx.analysis.material_balance));
    s.push('\n');
    s.push_str(&center_control_summary(ctx.analysis));
    s.push('\n');

    s.push_str("\nGAME_HISTORY_SUMMARY:\n");
    s.push_str(&format!(
        "Phase {}, opening '{}', {}.\n",
        ctx.analysis.phase,
        ctx.opening_name,
        material_tag(ctx.analysis.material_balance)
    ));

    if ctx.veto_occurred && !ctx.safe_suggestions.is_empty() {
        s.push_str("\nSAFE_SUGGESTIONS:\n");
        s.push_str(&ctx.safe_suggestions.join(", "));
        s.push('\n');
    }

    if let Some(reason) = ctx.last_failure {
        s.push_str("\nFEEDBACK:\n");
        s.push_str(reason);
        s.push('\n');
    }

    s.push_str("\nOPTIONS:\n");
    s.push_str(
        "Choose any move from sample_legal_moves, or propose any other legal move. \
         Prefer SAN (e.g. Nf3, O-O) or UCI (e.g. g1f3).\n",
    );

    s.push_str("\nPROTOCOL:\n");
    s.push_str("Respond with exactly two lines:\nREASONING: <short reasoning>\nMOVE: <SAN or UCI>\n");

    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position;
    use chess::Board;

    #[test]
    fn sampled_moves_are_all_legal_and_within_bounds() {
        let board = Board::default();
        let analysis = position::analyze(&board);
        let config = EngineConfig::default();
        let ctx = PromptContext {
            board: &board,
            analysis: &analysis,
            opening_name: "Opening",
            recent_san: &[],
            last_san: None,
            last_failure: None,
            avoid_moves: &[],
            safe_suggestions: &[],
            veto_occurred: false,
        };
        let mut rng = SampleRng::from_seed(1);
        let prompt = build_prompt(&ctx, &config, 0, &mut rng);
        assert!(prompt.contains("STATE:"));
        assert!(prompt.contains("MOVE: <SAN or UCI>"));

        let legal: Vec<String> = MoveGen::new_legal(&board).map(format_uci).collect();
        let line = prompt
            .lines()
            .find(|l| l.starts_with("sample_legal_moves:"))
            .unwrap();
        let sampled: Vec<&str> = line
            .trim_start_matches("sample_legal_moves: ")
            .split(", ")
            .filter(|s| !s.is_empty())
            .collect();
        for tok in &sampled {
            assert!(legal.iter().any(|l| l == tok));
        }
        assert!(sampled.len() >= config.sample_min.min(legal.len()));
    }

    #[test]
    fn veto_widens_sample_bounds() {
        let (low0, high0) = sample_bounds(&EngineConfig::default(), 0);
        let (low1, high1) = sample_bounds(&EngineConfig::default(), 1);
        assert!(low1 >= low0);
        assert!(high1 >= high0);
    }

    #[test]
    fn in_check_guide_mentions_resolving_check() {
        let guide = strategy_guide(Phase::Middlegame, true);
        assert!(guide.to_lowercase().contains("resolve the check"));
    }
}
