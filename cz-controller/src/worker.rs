//! The consumer worker loop.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cz_core::{options, Environment, Status};
use cz_eval::{eval, EvalConfig};
use cz_net::Network;
use cz_replay::ReplayBuffer;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::metrics::{self, TrainEventV1};
use crate::targets::Targets;

pub(crate) struct ConsumerCtx {
    pub id: usize,
    pub model: Arc<Network>,
    pub replay: Arc<ReplayBuffer>,
    pub status: Arc<Status>,
    pub partials: Arc<Vec<AtomicUsize>>,
}

pub(crate) fn consumer_main<E: Environment>(ctx: ConsumerCtx) {
    log::info!("consumer {}: starting", ctx.id);

    let model_path = options::get_str("model_path", "model.pt");
    let metrics_path = options::get_str("metrics_path", "promotions.ndjson");
    let flush_old_rpb = options::get_int("flush_old_rpb", 0) != 0;

    let capacity = ctx.replay.size() as u64;
    let incr = capacity * options::get_int("rpb_train_pct", 40).max(0) as u64 / 100;
    let samples = (ctx.replay.size() * options::get_int("training_sample_pct", 60).max(1) as usize
        / 100)
        .max(1);

    let eval_cfg = EvalConfig::from_options();
    let mut targets = Targets::new(capacity, incr);
    let mut rng = ChaCha8Rng::seed_from_u64(rand::random());

    let mut obs = vec![0.0f32; samples * E::OBS_SIZE];
    let mut dist = vec![0.0f32; samples * E::POL_SIZE];
    let mut value = vec![0.0f32; samples];

    while ctx.status.is_running() {
        let count = ctx.replay.count();

        if !targets.reached(count) {
            if ctx.id == 0 {
                let line = format!(
                    "gen {} rpb {}% [{} / {}]",
                    ctx.model.generation(),
                    targets.progress(count),
                    count.saturating_sub(targets.from),
                    targets.count.saturating_sub(targets.from),
                );
                let partials: Vec<usize> =
                    ctx.partials.iter().map(|p| p.load(Ordering::Relaxed)).collect();
                log::info!("{} | partials {:?}", line, partials);
                ctx.status.set_message(line);
            }
            std::thread::sleep(Duration::from_secs(1));
            continue;
        }

        log::info!(
            "consumer {}: training generation {} with {} samples from the last {}",
            ctx.id,
            ctx.model.generation(),
            samples,
            ctx.replay.size()
        );

        let candidate = match ctx.model.try_clone() {
            Ok(c) => c,
            Err(e) => {
                log::error!("consumer {}: cloning the reference failed: {}", ctx.id, e);
                std::thread::sleep(Duration::from_secs(1));
                continue;
            }
        };

        ctx.replay
            .sample_batch(&mut rng, samples, &mut obs, &mut dist, &mut value);

        let report = match candidate.train(&mut rng, &obs, &dist, &value, samples) {
            Ok(r) => Some(r),
            Err(e) => {
                log::error!("consumer {}: training failed: {}", ctx.id, e);
                None
            }
        };

        let accepted = match report {
            None => false,
            Some(_) => {
                match eval::<E, _, _, _>(&*ctx.model, &candidate, &eval_cfg, &mut rng, &ctx.status)
                {
                    Ok(a) => a,
                    Err(e) => {
                        log::warn!("consumer {}: evaluation failed: {}", ctx.id, e);
                        false
                    }
                }
            }
        };

        // Promotion goes through the model file so the on-disk reference
        // always matches the in-memory one.
        let promoted = accepted
            && match candidate.write(&model_path).and_then(|_| ctx.model.read(&model_path)) {
                Ok(()) => true,
                Err(e) => {
                    log::error!("consumer {}: promotion failed: {}", ctx.id, e);
                    false
                }
            };

        let ev = TrainEventV1 {
            event: "train_v1",
            ts_ms: metrics::now_ms(),
            generation: ctx.model.generation(),
            accepted: promoted,
            buffer_count: count,
            samples,
            first_loss: report.map(|r| r.first_loss),
            last_loss: report.map(|r| r.last_loss),
        };
        if let Err(e) = metrics::append_event(&metrics_path, &ev) {
            log::warn!("consumer {}: metrics write failed: {}", ctx.id, e);
        }

        if promoted {
            log::info!(
                "consumer {}: candidate accepted: using new generation {}",
                ctx.id,
                ctx.model.generation()
            );
            if flush_old_rpb {
                ctx.replay.clear();
            }
            targets.accept(ctx.replay.count());
        } else {
            log::info!(
                "consumer {}: candidate rejected: generation remains {}",
                ctx.id,
                ctx.model.generation()
            );
            targets.reject(ctx.replay.count());
        }
    }

    log::info!("consumer {}: stopping", ctx.id);
}
