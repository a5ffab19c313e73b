use std::sync::Arc;
use std::time::{Duration, Instant};

use cz_core::infer::UniformInfer;
use cz_core::ttt::TttEnv;
use cz_core::{options, Environment, Status, StatusCode};

use crate::engine::{EngineError, Selfplay};
use crate::worker::temperature;

#[test]
fn temperature_schedule_matches_expected_values() {
    let t = |ply| temperature(ply, 1.0, 0.95, 20, 0.5);

    assert!((t(0) - 1.0).abs() < 1e-4);
    assert!((t(10) - 0.5987369).abs() < 1e-4);
    assert!((t(19) - 0.3773536).abs() < 1e-4);
    assert!((t(20) - 0.5).abs() < 1e-4);
    assert!((t(30) - 0.5).abs() < 1e-4);
}

#[test]
fn stop_without_start_is_an_error() {
    let status = Arc::new(Status::new());
    let model = Arc::new(UniformInfer::new(TttEnv::POL_SIZE));
    let mut engine: Selfplay<TttEnv, UniformInfer> = Selfplay::new(model, status);

    assert!(matches!(engine.stop(), Err(EngineError::NotRunning(_))));
}

#[test]
fn engine_produces_tuples_and_serves_pgns() {
    options::set_int("selfplay_batch", 2);
    options::set_int("selfplay_nodes", 16);
    options::set_int("inference_threads", 1);
    options::set_int("replaybuffer_size", 64);

    let status = Arc::new(Status::new());
    let model = Arc::new(UniformInfer::new(TttEnv::POL_SIZE));
    let mut engine: Selfplay<TttEnv, UniformInfer> =
        Selfplay::new(model, Arc::clone(&status));

    engine.start().unwrap();
    assert!(matches!(engine.start(), Err(EngineError::NotStopped(_))));
    assert_eq!(status.code(), StatusCode::Running);

    let replay = engine.replay_buffer();
    let deadline = Instant::now() + Duration::from_secs(60);
    while replay.count() == 0 {
        assert!(Instant::now() < deadline, "no tuples produced within 60s");
        std::thread::sleep(Duration::from_millis(25));
    }

    let pgn = engine.request_pgn().expect("a finished game");
    assert!(
        pgn.contains("1-0") || pgn.contains("0-1") || pgn.contains("1/2-1/2"),
        "transcript missing a result token: {}",
        pgn
    );

    engine.stop().unwrap();
    assert_eq!(status.code(), StatusCode::Stopped);
    assert_eq!(engine.partials().len(), 1);
}
