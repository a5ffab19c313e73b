//! cz-eval: the evaluation match.
//!
//! Paired-color batched games between the reference model and a freshly
//! trained candidate. Every tree is assigned the side the candidate plays;
//! on each tree's turn its observation is routed to the matching model, and
//! inference is batched separately per model. The candidate is accepted only
//! when its score reaches the configured fraction of the match.

use cz_core::{options, Environment, Infer, InferError, Status};
use cz_mcts::{SearchTree, TreeConfig};
use rand::Rng;
use thiserror::Error;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Error)]
pub enum EvalError {
    /// The match cannot conclude; the caller treats this as a rejection.
    #[error("evaluation aborted: {0}")]
    Aborted(&'static str),
    #[error(transparent)]
    Infer(#[from] InferError),
}

#[derive(Debug, Clone)]
pub struct EvalConfig {
    /// Concurrent games in flight.
    pub batch: usize,
    /// Total games in the match.
    pub games: u32,
    /// Search budget per action.
    pub nodes: u32,
    /// Acceptance threshold in percent of the attainable score.
    pub target_pct: u32,
    pub tree: TreeConfig,
}

impl EvalConfig {
    pub fn from_options() -> Self {
        Self {
            batch: options::get_int("evaluate_batch", 16).max(1) as usize,
            games: options::get_int("evaluate_games", 64).max(1) as u32,
            nodes: options::get_int("evaluate_nodes", 128).max(2) as u32,
            target_pct: options::get_int("evaluate_target_pct", 55).max(1) as u32,
            tree: TreeConfig::from_options(),
        }
    }
}

/// Play the match. `Ok(true)` accepts the candidate.
///
/// Aborts (mapped to rejection by the caller) when the reference generation
/// moves mid-match, since the reference has already been replaced, or when
/// the run leaves `Running`. Expansion always disables heuristic
/// bootstrapping so the gate measures the networks alone.
pub fn eval<E, RM, CM, R>(
    reference: &RM,
    candidate: &CM,
    cfg: &EvalConfig,
    rng: &mut R,
    status: &Status,
) -> Result<bool, EvalError>
where
    E: Environment,
    RM: Infer,
    CM: Infer,
    R: Rng,
{
    let total = cfg.games as f32;
    let threshold = cfg.target_pct as f32 / 100.0;
    let start_gen = reference.generation();

    let mut trees: Vec<SearchTree<E>> = (0..cfg.batch)
        .map(|_| SearchTree::new(cfg.tree.clone(), rng.gen()))
        .collect();
    let mut sides: Vec<f32> = (0..cfg.batch)
        .map(|_| if rng.gen::<bool>() { 1.0 } else { -1.0 })
        .collect();

    let mut ref_obs = vec![0.0f32; cfg.batch * E::OBS_SIZE];
    let mut cand_obs = vec![0.0f32; cfg.batch * E::OBS_SIZE];
    let mut ref_targets: Vec<usize> = Vec::with_capacity(cfg.batch);
    let mut cand_targets: Vec<usize> = Vec::with_capacity(cfg.batch);
    let mut policy = vec![0.0f32; cfg.batch * E::POL_SIZE];
    let mut value = vec![0.0f32; cfg.batch];

    let mut score = 0.0f32;
    let mut games = 0u32;

    log::info!(
        "evaluating candidate over {} games ({} in flight, {} nodes)",
        cfg.games,
        cfg.batch,
        cfg.nodes
    );

    while games < cfg.games {
        if !status.is_running() {
            return Err(EvalError::Aborted("run is shutting down"));
        }
        if reference.generation() != start_gen {
            return Err(EvalError::Aborted("reference generation changed"));
        }

        ref_targets.clear();
        cand_targets.clear();

        'trees: for i in 0..cfg.batch {
            loop {
                // Route by whose turn it is in this game right now.
                let candidate_to_move = trees[i].env().turn() == sides[i];
                let slot = if candidate_to_move {
                    let off = cand_targets.len() * E::OBS_SIZE;
                    &mut cand_obs[off..off + E::OBS_SIZE]
                } else {
                    let off = ref_targets.len() * E::OBS_SIZE;
                    &mut ref_obs[off..off + E::OBS_SIZE]
                };

                while trees[i].visits() < cfg.nodes && !trees[i].select(slot) {}
                if trees[i].visits() < cfg.nodes {
                    if candidate_to_move {
                        cand_targets.push(i);
                    } else {
                        ref_targets.push(i);
                    }
                    break;
                }

                let stepped = match trees[i].pick(0.0) {
                    Ok(action) => trees[i].advance(action),
                    Err(e) => Err(e),
                };
                if let Err(e) = stepped {
                    log::error!("evaluation step failed: {}; resetting game", e);
                    trees[i].reset();
                    continue;
                }

                if let Some(outcome) = trees[i].env_mut().terminal() {
                    score += outcome * sides[i] / 2.0 + 0.5;
                    games += 1;

                    log::info!(
                        "game {}/{} [{:+.0}]: candidate score {:.0}%",
                        games,
                        cfg.games,
                        outcome * sides[i],
                        score * 100.0 / games as f32
                    );

                    trees[i].reset();
                    sides[i] = if rng.gen::<bool>() { 1.0 } else { -1.0 };

                    if score >= total * threshold {
                        return Ok(true);
                    }
                    if score + (total - games as f32) < total * threshold {
                        return Ok(false);
                    }
                    if games >= cfg.games {
                        break 'trees;
                    }
                }
            }
        }

        if !ref_targets.is_empty() {
            reference.infer(&ref_obs, ref_targets.len(), &mut policy, &mut value)?;
            for (k, &i) in ref_targets.iter().enumerate() {
                trees[i].expand(
                    &policy[k * E::POL_SIZE..(k + 1) * E::POL_SIZE],
                    value[k],
                    true,
                );
            }
        }

        if !cand_targets.is_empty() {
            candidate.infer(&cand_obs, cand_targets.len(), &mut policy, &mut value)?;
            for (k, &i) in cand_targets.iter().enumerate() {
                trees[i].expand(
                    &policy[k * E::POL_SIZE..(k + 1) * E::POL_SIZE],
                    value[k],
                    true,
                );
            }
        }
    }

    let accepted = score >= total * threshold;
    log::info!(
        "evaluation finished: score {:.0}%, target {}%",
        score * 100.0 / games.max(1) as f32,
        cfg.target_pct
    );
    Ok(accepted)
}
