//! cz: chess self-play training loop.
//!
//! Starts the producer fleet and the generation controller, then serves a
//! small operator REPL on stdin:
//!
//! - `write <path>`  persist the reference model
//! - `read <path>`   replace the reference model from disk
//! - `pgn [path]`    transcript of the next finished self-play game
//! - `status`        run state, generation, replay-buffer fill
//! - `quit`          cooperative shutdown

use std::io::BufRead;
use std::path::Path;
use std::process;
use std::sync::Arc;

use cz_chess::ChessEnv;
use cz_controller::Controller;
use cz_core::{options, Status};
use cz_net::{NetDims, Network};
use cz_selfplay::Selfplay;

fn banner() {
    println!("> cz {}", env!("CARGO_PKG_VERSION"));

    if tch::Cuda::is_available() {
        println!(
            "CUDA enabled, {} devices, CUDNN {}",
            tch::Cuda::device_count(),
            if tch::Cuda::cudnn_is_available() {
                "enabled"
            } else {
                "disabled"
            }
        );
    } else {
        println!("CUDA disabled, using CPU");
    }
}

fn print_usage() {
    println!("commands: write <path> | read <path> | pgn [path] | status | quit");
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    banner();

    let mut args = std::env::args().skip(1);
    let config_path = args.next().unwrap_or_else(|| "options.conf".to_string());
    if args.next().is_some() {
        eprintln!("usage: cz [options-file]");
        process::exit(2);
    }

    // A broken or missing config is not fatal; the defaults carry the run.
    match options::load(&config_path) {
        Ok(()) => {
            println!("Imported options from {}", config_path);
            options::print();
        }
        Err(e) => log::warn!("{}; continuing with defaults", e),
    }

    let model = match Network::new(NetDims::for_env::<ChessEnv>()) {
        Ok(m) => Arc::new(m),
        Err(e) => {
            eprintln!("failed to build the network: {}", e);
            process::exit(1);
        }
    };

    let model_path = options::get_str("model_path", "model.pt");
    if Path::new(&model_path).exists() {
        match model.read(&model_path) {
            Ok(()) => println!(
                "Loaded {} at generation {}",
                model_path,
                model.generation()
            ),
            Err(e) => log::warn!("{}; starting from a fresh model", e),
        }
    }

    let status = Arc::new(Status::new());
    let mut engine: Selfplay<ChessEnv, Network> =
        Selfplay::new(Arc::clone(&model), Arc::clone(&status));

    if let Err(e) = engine.start() {
        eprintln!("failed to start self-play: {}", e);
        process::exit(1);
    }
    let controller = Controller::start::<ChessEnv>(
        Arc::clone(&model),
        engine.replay_buffer(),
        Arc::clone(&status),
        engine.partials(),
    );

    println!("Ready.");
    print_usage();

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };
        let mut words = line.split_whitespace();

        match words.next() {
            None => continue,
            Some("write") => match words.next() {
                Some(path) => match model.write(path) {
                    Ok(()) => println!("Wrote {}", path),
                    Err(e) => println!("write failed: {}", e),
                },
                None => println!("usage: write <path>"),
            },
            Some("read") => match words.next() {
                Some(path) => match model.read(path) {
                    Ok(()) => println!(
                        "Read {} at generation {}",
                        path,
                        model.generation()
                    ),
                    Err(e) => println!("read failed: {}", e),
                },
                None => println!("usage: read <path>"),
            },
            Some("pgn") => {
                println!("Waiting for the next finished game...");
                match engine.request_pgn() {
                    Some(pgn) => match words.next() {
                        Some(path) => match std::fs::write(path, &pgn) {
                            Ok(()) => println!("Wrote {}", path),
                            Err(e) => println!("pgn write failed: {}", e),
                        },
                        None => println!("{}", pgn),
                    },
                    None => println!("engine is not running"),
                }
            }
            Some("status") => {
                let replay = engine.replay_buffer();
                println!(
                    "{} | generation {} | replay {} / {} (total {})",
                    status.code().as_str(),
                    model.generation(),
                    (replay.count() as usize).min(replay.size()),
                    replay.size(),
                    replay.count()
                );
                let message = status.message();
                if !message.is_empty() {
                    println!("{}", message);
                }
            }
            Some("quit") => break,
            Some(_) => print_usage(),
        }
    }

    println!("Stopping.");
    if let Err(e) = engine.stop() {
        log::warn!("shutdown: {}", e);
    }
    controller.stop();
    println!("Stopped.");
}
