//! The producer worker loop.
//!
//! Per iteration each worker refreshes stale trees, drives every tree until
//! it either fills its observation slot or earns an action, submits one
//! batched inference call, and expands each tree with its policy/value row.
//! Trees that reach a terminal position flush their trajectory list into the
//! replay buffer and start a fresh game.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use cz_core::{options, Environment, Infer, Status};
use cz_mcts::{SearchTree, TreeConfig};
use cz_replay::ReplayBuffer;

use crate::engine::PgnRequest;

/// Executed-move temperature at a given ply.
///
/// Decays from `initial` by `decay` per ply until `cutoff`, then holds at
/// `final_alpha`.
pub fn temperature(ply: u32, initial: f32, decay: f32, cutoff: u32, final_alpha: f32) -> f32 {
    if ply < cutoff {
        decay.powi(ply as i32) * initial
    } else {
        final_alpha
    }
}

pub(crate) struct WorkerCtx<M> {
    pub id: usize,
    pub model: Arc<M>,
    pub replay: Arc<ReplayBuffer>,
    pub status: Arc<Status>,
    pub pgn: Arc<PgnRequest>,
    pub partials: Arc<Vec<AtomicUsize>>,
}

struct Pending {
    obs: Vec<f32>,
    dist: Vec<f32>,
    pov: f32,
}

pub(crate) fn producer_main<E: Environment, M: Infer>(ctx: WorkerCtx<M>) {
    log::info!("worker {}: starting", ctx.id);

    let ibatch = options::get_int("selfplay_batch", 16).max(1) as usize;
    let nodes = options::get_int("selfplay_nodes", 512).max(2) as u32;
    let flush_old_trees = options::get_int("flush_old_trees", 1) != 0;

    // Draw games train toward this value instead of zero; shifting it below
    // the midpoint discourages the network from steering into quick draws.
    let draw_value = options::get_int("draw_value_pct", 50) as f32 / 100.0 * 2.0 - 1.0;

    let alpha_initial = options::get_float("selfplay_alpha_initial", 1.0);
    let alpha_decay = options::get_float("selfplay_alpha_decay", 1.0);
    let alpha_final = options::get_float("selfplay_alpha_final", 1.0);
    let alpha_cutoff = options::get_int("selfplay_alpha_cutoff", 1).max(0) as u32;

    let cfg = TreeConfig::from_options();

    let mut trees: Vec<SearchTree<E>> = (0..ibatch)
        .map(|_| SearchTree::new(cfg.clone(), rand::random()))
        .collect();
    let mut trajectories: Vec<Vec<Pending>> = (0..ibatch).map(|_| Vec::new()).collect();
    let mut source_gen: Vec<u32> = (0..ibatch).map(|_| ctx.model.generation()).collect();

    let mut batch = vec![0.0f32; ibatch * E::OBS_SIZE];
    let mut policy = vec![0.0f32; ibatch * E::POL_SIZE];
    let mut value = vec![0.0f32; ibatch];
    let mut dist = vec![0.0f32; E::POL_SIZE];

    let mut partials: usize = 0;

    while ctx.status.is_running() {
        for i in 0..ibatch {
            // A promoted model invalidates in-flight games.
            if flush_old_trees && source_gen[i] < ctx.model.generation() {
                trees[i].reset();
                partials -= trajectories[i].len();
                trajectories[i].clear();
                source_gen[i] = ctx.model.generation();
            }

            let slot = &mut batch[i * E::OBS_SIZE..(i + 1) * E::OBS_SIZE];

            loop {
                // Run simulations until the node budget is spent or a leaf
                // needs the network.
                while trees[i].visits() < nodes && !trees[i].select(slot) {}
                if trees[i].visits() < nodes {
                    break;
                }

                // Budget reached: record a training tuple from the pre-action
                // position, then execute a move.
                trees[i].env().observe(slot);
                trees[i].snapshot(&mut dist);
                let pov = -trees[i].env().turn();

                trajectories[i].push(Pending {
                    obs: slot.to_vec(),
                    dist: dist.clone(),
                    pov,
                });
                partials += 1;

                let alpha = temperature(
                    trees[i].env().ply(),
                    alpha_initial,
                    alpha_decay,
                    alpha_cutoff,
                    alpha_final,
                );

                let stepped = match trees[i].pick(alpha) {
                    Ok(action) => trees[i].advance(action),
                    Err(e) => Err(e),
                };
                if let Err(e) = stepped {
                    log::error!("worker {}: search step failed: {}; resetting tree", ctx.id, e);
                    trees[i].reset();
                    partials -= trajectories[i].len();
                    trajectories[i].clear();
                    continue;
                }

                if let Some(outcome) = trees[i].env_mut().terminal() {
                    if ctx.pgn.wanted.swap(false, Ordering::SeqCst) {
                        *ctx.pgn.slot.lock().unwrap() = Some(trees[i].env_mut().transcript());
                    }

                    for t in trajectories[i].drain(..) {
                        let target = if outcome == 0.0 {
                            draw_value
                        } else {
                            t.pov * outcome
                        };
                        ctx.replay.add(&t.obs, &t.dist, target);
                        partials -= 1;
                    }

                    trees[i].reset();
                    source_gen[i] = ctx.model.generation();
                }
            }
        }

        match ctx.model.infer(&batch, ibatch, &mut policy, &mut value) {
            Ok(()) => {
                for i in 0..ibatch {
                    trees[i].expand(
                        &policy[i * E::POL_SIZE..(i + 1) * E::POL_SIZE],
                        value[i],
                        false,
                    );
                }
            }
            Err(e) => {
                log::error!("worker {}: inference failed: {}", ctx.id, e);
                break;
            }
        }

        ctx.partials[ctx.id].store(partials, Ordering::Relaxed);
    }

    log::info!("worker {}: terminating", ctx.id);
}
