//! CLI surface for running LLM-vs-LLM games (spec §A.4, informational —
//! not part of the core). Wires a `GameDriver` with `StdinModelClient` by
//! default, in the spirit of the teacher's own UCI stdin/stdout loop.

use chess::Color;
use chrono::Local;
use clap::Parser;
use duel_core::game::{GameDriver, GameState, NullObserver, PlayerBinding};
use duel_core::model_client::StdinModelClient;
use duel_core::{pgn, EngineConfig};
use std::process::ExitCode;

/// Runs a number of LLM-vs-LLM chess games over a stdin/stdout model
/// transport, printing PGN for each completed game.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Number of games to play.
    #[arg(long, default_value_t = 1)]
    games: u32,

    /// Model id bound to White.
    #[arg(long, default_value = "model-a")]
    white: String,

    /// Model id bound to Black.
    #[arg(long, default_value = "model-b")]
    black: String,

    /// Seed for the deterministic prompt sampler.
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Write structured logs in JSON instead of the default pretty format.
    #[arg(long, default_value_t = false)]
    log_to_file: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if cli.games == 0 {
        eprintln!("error: --games must be at least 1");
        return ExitCode::FAILURE;
    }

    duel_core::logging::init();
    let _ = cli.log_to_file; // sink selection is an external concern (spec §6)

    let config = EngineConfig::default();

    for game_idx in 0..cli.games {
        let mut white_client = StdinModelClient;
        let mut black_client = StdinModelClient;
        let players = [
            PlayerBinding {
                name: "white".to_string(),
                color: Color::White,
                model_id: cli.white.clone(),
            },
            PlayerBinding {
                name: "black".to_string(),
                color: Color::Black,
                model_id: cli.black.clone(),
            },
        ];
        let mut state = GameState::new(players);
        let mut driver = GameDriver::new(
            config.clone(),
            &mut white_client,
            &mut black_client,
            cli.seed.wrapping_add(game_idx as u64),
        );
        let mut observer = NullObserver;
        let (result, termination) = driver.run(&mut state, &mut observer);
        println!("game {game_idx}: {result:?} ({termination:?})");

        let date = Local::now().format("%Y.%m.%d").to_string();
        let headers = pgn::PgnHeaders {
            event: "LLM Duel",
            site: "local",
            date: &date,
            round: &(game_idx + 1).to_string(),
            white: &cli.white,
            black: &cli.black,
        };
        println!("{}", pgn::export(&state, &headers, None));
    }

    ExitCode::SUCCESS
}
