//! The PUCT search tree.
//!
//! A tree owns one environment and one arena. The caller drives it in three
//! phases per simulation: `select` descends to a leaf and either backs up a
//! terminal value (returning `false`) or fills the observation slot and
//! parks a cursor at the leaf (returning `true`); the observation goes
//! through the network together with those of sibling trees; `expand` then
//! consumes the policy/value row for the parked leaf. Once the root has
//! collected its visit budget, `pick` samples an action and `advance`
//! promotes the matching child.

use cz_core::{options, Environment};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Gamma};
use thiserror::Error;

use crate::arena::Arena;
use crate::node::{Node, NodeId};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("no child for action {0}")]
    NoSuchChild(i32),
    #[error("root has no children to pick from")]
    EmptyRoot,
}

/// Search constants, normally read from the options store once per worker.
#[derive(Debug, Clone)]
pub struct TreeConfig {
    /// PUCT exploration constant.
    pub cpuct: f32,
    /// Descend into the first unvisited child instead of comparing UCT
    /// among unvisited siblings.
    pub force_expand_unvisited: bool,
    /// Q default for unvisited children, scaled by the child's turn.
    pub unvisited_node_value: f32,
    /// Heuristic blend weight; zero disables bootstrapping.
    pub bootstrap_weight: f32,
    /// Heuristic scale: raw evaluations are divided by this and clamped.
    pub bootstrap_window: f32,
    /// Amplitude applied to the clamped heuristic.
    pub bootstrap_amp: f32,
    /// Prior noise mix-in fraction, applied at every expansion.
    pub noise_weight: f32,
    /// Gamma shape for the prior noise draw.
    pub noise_alpha: f32,
    /// Divide cpuct by the number of siblings.
    pub scale_cpuct_by_actions: bool,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            cpuct: 1.0,
            force_expand_unvisited: false,
            unvisited_node_value: 1.0,
            bootstrap_weight: 0.0,
            bootstrap_window: 1600.0,
            bootstrap_amp: 0.75,
            noise_weight: 0.05,
            noise_alpha: 1.0,
            scale_cpuct_by_actions: false,
        }
    }
}

impl TreeConfig {
    pub fn from_options() -> Self {
        Self {
            cpuct: options::get_float("cpuct", 1.0),
            force_expand_unvisited: options::get_int("force_expand_unvisited", 0) != 0,
            unvisited_node_value: options::get_int("unvisited_node_value_pct", 100) as f32 / 100.0,
            bootstrap_weight: options::get_int("bootstrap_weight", 0) as f32 / 100.0,
            bootstrap_window: options::get_int("bootstrap_window", 1600) as f32,
            bootstrap_amp: options::get_int("bootstrap_amp_pct", 75) as f32 / 100.0,
            noise_weight: options::get_float("mcts_noise_weight", 0.05),
            noise_alpha: options::get_float("mcts_noise_alpha", 1.0),
            scale_cpuct_by_actions: options::get_int("scale_cpuct_by_actions", 0) != 0,
        }
    }
}

pub struct SearchTree<E: Environment> {
    env: E,
    arena: Arena,
    root: NodeId,
    /// Leaf awaiting expansion; while set, the environment sits at that leaf.
    target: Option<NodeId>,
    cfg: TreeConfig,
    rng: ChaCha8Rng,
}

impl<E: Environment> SearchTree<E> {
    pub fn new(cfg: TreeConfig, seed: u64) -> Self {
        let env = E::new();
        let mut arena = Arena::new();
        let root = arena.push(Node::root(-env.turn()));
        Self {
            env,
            arena,
            root,
            target: None,
            cfg,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Visit count of the root.
    pub fn visits(&self) -> u32 {
        self.arena.get(self.root).visits
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut E {
        &mut self.env
    }

    /// Walk from the cursor (or root) to a leaf.
    ///
    /// Returns `true` when an observation was written into `obs` and the
    /// cursor parked for a following `expand`. Returns `false` when the walk
    /// hit a terminal position; its value was backed up and the environment
    /// rewound to the root.
    pub fn select(&mut self, obs: &mut [f32]) -> bool {
        let mut node = self.target.unwrap_or(self.root);

        loop {
            if self.arena.get(node).children.is_empty() {
                if let Some(outcome) = self.env.terminal() {
                    self.backprop(node, outcome);
                    self.unwind(node);
                    self.target = None;
                    return false;
                }

                self.env.observe(obs);
                self.target = Some(node);
                return true;
            }

            let next = self.select_child(node);
            let action = self.arena.get(next).action;
            self.env.push(action);
            node = next;
        }
    }

    fn select_child(&self, node: NodeId) -> NodeId {
        let n = self.arena.get(node);

        let mut cpuct = self.cfg.cpuct;
        if self.cfg.scale_cpuct_by_actions {
            cpuct /= n.children.len() as f32;
        }
        let sqrt_visits = (n.visits as f32).sqrt();

        let mut best = n.children[0];
        let mut best_uct = f32::NEG_INFINITY;

        for &cid in &n.children {
            let c = self.arena.get(cid);

            if self.cfg.force_expand_unvisited && c.visits == 0 {
                return cid;
            }

            let uct = c.q(self.cfg.unvisited_node_value * c.turn)
                + c.prior * cpuct * sqrt_visits / (c.visits + 1) as f32;

            if uct > best_uct {
                best_uct = uct;
                best = cid;
            }
        }

        best
    }

    /// Expand the parked leaf with a policy row and scalar value.
    ///
    /// The policy is renormalized over the legal actions; when the legal mass
    /// is zero the priors fall back to uniform. Gamma noise is mixed into
    /// every child prior. The value is flipped to the leaf's point of view,
    /// optionally blended with the environment heuristic, backed up to the
    /// root, and the environment rewound.
    pub fn expand(&mut self, policy: &[f32], value: f32, disable_bootstrap: bool) {
        let target = self
            .target
            .take()
            .expect("expand() without a pending select()");

        let actions = self.env.actions();
        debug_assert!(!actions.is_empty(), "expand() at a terminal position");

        let ptotal: f32 = actions.iter().map(|&a| policy[a as usize]).sum();
        let uniform = 1.0 / actions.len() as f32;

        let gamma = Gamma::new(self.cfg.noise_alpha.max(1e-3) as f64, 1.0).expect("alpha > 0");
        let mut noise: Vec<f32> = Vec::with_capacity(actions.len());
        let mut noise_total = 0.0f32;
        for _ in 0..actions.len() {
            let x = gamma.sample(&mut self.rng) as f32;
            noise.push(x);
            noise_total += x;
        }

        let child_turn = -self.arena.get(target).turn;
        let w = self.cfg.noise_weight;

        for (i, &action) in actions.iter().enumerate() {
            let p_legal = if ptotal > 0.0 {
                policy[action as usize] / ptotal
            } else {
                uniform
            };
            let nz = if noise_total > 0.0 {
                noise[i] / noise_total
            } else {
                uniform
            };

            let prior = (1.0 - w) * p_legal + w * nz;
            let id = self
                .arena
                .push(Node::child(action, target, child_turn, prior));
            self.arena.get_mut(target).children.push(id);
        }

        // The network reports the value relative to the leaf's mover; fold in
        // the node's turn to get a position value before backing up.
        let mut value = value * self.arena.get(target).turn;

        if !disable_bootstrap && self.cfg.bootstrap_weight > 0.0 {
            let h = (self.env.heuristic() / self.cfg.bootstrap_window).clamp(-1.0, 1.0);
            value = (1.0 - self.cfg.bootstrap_weight) * value
                + self.cfg.bootstrap_weight * h * self.cfg.bootstrap_amp;
        }

        self.backprop(target, value);
        self.unwind(target);
    }

    fn backprop(&mut self, from: NodeId, value: f32) {
        let mut node = Some(from);
        while let Some(id) = node {
            let n = self.arena.get_mut(id);
            n.visits += 1;
            n.value_sum += 0.5 + (value * n.turn) / 2.0;
            node = n.parent;
        }
    }

    fn unwind(&mut self, from: NodeId) {
        let mut node = from;
        while node != self.root {
            self.env.pop();
            node = self.arena.get(node).parent.expect("non-root without parent");
        }
    }

    /// Sample an action among the root's children.
    ///
    /// Temperatures below 0.1 pick the most-visited child; otherwise children
    /// are drawn with weight `visits^(1/alpha)`.
    pub fn pick(&mut self, alpha: f32) -> Result<i32, TreeError> {
        let root = self.arena.get(self.root);
        if root.children.is_empty() {
            return Err(TreeError::EmptyRoot);
        }

        if alpha < 0.1 {
            let best = root
                .children
                .iter()
                .max_by_key(|&&c| self.arena.get(c).visits)
                .copied()
                .expect("non-empty children");
            return Ok(self.arena.get(best).action);
        }

        let weights: Vec<f64> = root
            .children
            .iter()
            .map(|&c| (self.arena.get(c).visits as f64).powf(1.0 / alpha as f64))
            .collect();
        let total: f64 = weights.iter().sum();

        let mut draw = self.rng.gen::<f64>() * total;
        for (i, w) in weights.iter().enumerate() {
            draw -= w;
            if draw <= 0.0 {
                return Ok(self.arena.get(root.children[i]).action);
            }
        }

        let last = *root.children.last().expect("non-empty children");
        Ok(self.arena.get(last).action)
    }

    /// Promote the child reached by `action` to the root and play the action
    /// on the environment. Sibling subtrees are freed.
    pub fn advance(&mut self, action: i32) -> Result<(), TreeError> {
        debug_assert!(self.target.is_none(), "advance() with a pending select()");

        let child = self
            .arena
            .get(self.root)
            .children
            .iter()
            .copied()
            .find(|&c| self.arena.get(c).action == action)
            .ok_or(TreeError::NoSuchChild(action))?;

        self.root = self.arena.promote(child);
        self.env.push(action);
        Ok(())
    }

    /// Visit distribution over the full action space.
    ///
    /// The root's own visit is excluded from the denominator, so the entries
    /// sum to one once the root has been visited more than once.
    pub fn snapshot(&self, dist: &mut [f32]) {
        dist.fill(0.0);

        let root = self.arena.get(self.root);
        if root.visits <= 1 {
            return;
        }
        let denom = (root.visits - 1) as f32;

        for &c in &root.children {
            let child = self.arena.get(c);
            dist[child.action as usize] = child.visits as f32 / denom;
        }
    }

    /// Drop the whole tree and restart from a fresh starting position.
    pub fn reset(&mut self) {
        self.env = E::new();
        self.arena.clear();
        self.root = self.arena.push(Node::root(-self.env.turn()));
        self.target = None;
    }

    /// One line per root child: action, visits, mean value, prior, turn.
    pub fn describe_root(&self) -> Vec<String> {
        self.arena
            .get(self.root)
            .children
            .iter()
            .map(|&c| {
                let n = self.arena.get(c);
                format!(
                    "{:>6} visits {:>5} avg {:.3} prior {:.4} turn {:+.0}",
                    self.env.action_name(n.action),
                    n.visits,
                    n.q(0.0),
                    n.prior,
                    n.turn
                )
            })
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn arena(&self) -> &Arena {
        &self.arena
    }

    #[cfg(test)]
    pub(crate) fn root_id(&self) -> NodeId {
        self.root
    }
}
