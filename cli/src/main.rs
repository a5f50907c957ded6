// Make clippy as annoying as possible
#![deny(
    // All typically enabled warnings are converted into errors
    // includes correctness, suspicious, style, complexity, and perf
    clippy::all,
    // Error on cargo lints
    clippy::cargo,
)]
#![warn(
    // Warn on pedantic and in-development nursery lints
    clippy::pedantic,
    clippy::nursery,
)]

//! Batch runner for playing two Redcode warriors against each other over one
//! or more rounds, or assembling and printing a single warrior.
//!
//! Grounded on the original `gmars` command-line driver
//! (`cmd/gmars/main.go`): parse flags, compile the warrior file(s), and
//! either print the assembled code (`-A`) or play `-r` rounds and report
//! wins/ties per warrior.

use std::{fs, process::ExitCode};

use clap::Parser;
use mars::{Simulator, SimulatorConfig};
use redcode::WarriorData;
use redcode_compiler::Dialect;
use tracing::error;

/// Command line batch runner for playing CoreWar redcode warriors against
/// each other.
#[derive(Debug, Parser)]
#[command(name = "redwar", version, about)]
struct Args {
    /// Enforce ICWS'88 rules (default: ICWS'94).
    #[arg(short = '8', default_value_t = false)]
    icws88: bool,

    /// Size of the core.
    #[arg(short = 's', default_value_t = 8000)]
    size: u32,

    /// Maximum number of queued processes per warrior.
    #[arg(short = 'p', default_value_t = 8000)]
    processes: u32,

    /// Cycles until a tie is declared.
    #[arg(short = 'c', default_value_t = 80_000)]
    cycles: u32,

    /// Maximum warrior length.
    #[arg(short = 'l', default_value_t = 100)]
    length: u32,

    /// Fixed placement offset for warrior #2 (0 = random).
    #[arg(short = 'F', default_value_t = 0)]
    fixed: u32,

    /// Number of rounds to play.
    #[arg(short = 'r', default_value_t = 1)]
    rounds: u32,

    /// Assemble and print the warrior's compiled code; don't simulate.
    #[arg(short = 'A', default_value_t = false)]
    assemble: bool,

    /// One warrior file (with `-A`) or two warrior files to battle.
    #[arg(required = true, num_args = 1..=2)]
    warriors: Vec<String>,
}

impl Args {
    /// The dialect this invocation compiles warriors under.
    const fn dialect(&self) -> Dialect {
        if self.icws88 {
            Dialect::Icws88
        } else {
            Dialect::Icws94
        }
    }

    /// The simulator configuration this invocation derives from its flags,
    /// mirroring the original `NewQuickConfig`: read/write limits equal the
    /// core size, and the placement distance equals the length limit.
    const fn simulator_config(&self) -> SimulatorConfig {
        SimulatorConfig {
            core_size: self.size,
            processes: self.processes,
            cycles: self.cycles,
            read_limit: self.size,
            write_limit: self.size,
            length: self.length,
            distance: self.length,
            fixed: self.fixed,
        }
    }
}

/// Reads and compiles a warrior file, preferring Redcode source; falls back
/// to the load-file format if compilation fails, so pre-assembled warriors
/// remain playable.
fn load_warrior(
    path: &str,
    core_size: u32,
    dialect: Dialect,
) -> Result<WarriorData, String> {
    let source = fs::read_to_string(path)
        .map_err(|err| format!("error opening warrior file '{path}': {err}"))?;

    match redcode_compiler::compile(&source, core_size, dialect) {
        Ok(data) => Ok(data),
        Err(compile_err) => {
            let options = match dialect {
                Dialect::Icws88 => redcode_parser::ParseOptions::ICWS_88_OPTIONS,
                Dialect::Icws94 => redcode_parser::ParseOptions::ICWS_94_OPTIONS,
            };
            redcode_parser::parse_warrior_data(&source, options, core_size).map_err(
                |_parse_err| {
                    format!("error parsing warrior file '{path}': {compile_err}")
                },
            )
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();

    if args.assemble && args.warriors.len() != 1 {
        println!("wrong number of arguments");
        return ExitCode::FAILURE;
    }
    if !args.assemble && args.warriors.len() != 2 {
        println!("only 2 warrior battles supported");
        return ExitCode::FAILURE;
    }

    let config = args.simulator_config();
    let dialect = args.dialect();

    let w1_data = match load_warrior(&args.warriors[0], config.core_size, dialect) {
        Ok(data) => data,
        Err(message) => {
            println!("{message}");
            return ExitCode::FAILURE;
        }
    };

    if args.assemble {
        let Ok(mut sim) = Simulator::new(config, 1) else {
            error!("error creating sim");
            return ExitCode::FAILURE;
        };
        if sim.add_warrior(w1_data.clone()).is_err() {
            error!("error loading warrior");
            return ExitCode::FAILURE;
        }
        for instr in &w1_data.warrior.code {
            println!("{instr}");
        }
        return ExitCode::SUCCESS;
    }

    let w2_data = match load_warrior(&args.warriors[1], config.core_size, dialect) {
        Ok(data) => data,
        Err(message) => {
            println!("{message}");
            return ExitCode::FAILURE;
        }
    };

    let mut w1_win = 0_u32;
    let mut w1_tie = 0_u32;
    let mut w2_win = 0_u32;
    let mut w2_tie = 0_u32;

    for _ in 0..args.rounds {
        let Ok(mut sim) = Simulator::new(config, 2) else {
            error!("error creating sim");
            continue;
        };

        let Ok(w1) = sim.add_warrior(w1_data.clone()) else {
            error!("error adding warrior 1");
            continue;
        };
        if sim.spawn_warrior(w1, 0).is_err() {
            error!("error spawning warrior 1");
            continue;
        }

        let Ok(w2) = sim.add_warrior(w2_data.clone()) else {
            error!("error adding warrior 2");
            continue;
        };
        if sim
            .spawn_warrior(w2, config.second_warrior_start())
            .is_err()
        {
            error!("error spawning warrior 2");
            continue;
        }

        let Ok(alive) = sim.run() else {
            error!("error running simulation");
            continue;
        };
        let w1_alive = alive.first().copied().unwrap_or(false);
        let w2_alive = alive.get(1).copied().unwrap_or(false);

        if w1_alive {
            if w2_alive {
                w1_tie += 1;
            } else {
                w1_win += 1;
            }
        }
        if w2_alive {
            if w1_alive {
                w2_tie += 1;
            } else {
                w2_win += 1;
            }
        }
    }

    println!("{w1_win} {w1_tie}");
    println!("{w2_win} {w2_tie}");
    ExitCode::SUCCESS
}
