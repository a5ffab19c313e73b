use cz_core::ttt::TttEnv;
use cz_core::Environment;

use crate::tree::{SearchTree, TreeConfig, TreeError};

/// Environment that is terminal from the very first position.
struct DoneEnv;

impl Environment for DoneEnv {
    const WIDTH: usize = 1;
    const HEIGHT: usize = 1;
    const FEATURES: usize = 1;
    const POL_SIZE: usize = 1;

    fn new() -> Self {
        DoneEnv
    }
    fn turn(&self) -> f32 {
        1.0
    }
    fn ply(&self) -> u32 {
        0
    }
    fn push(&mut self, _action: i32) {
        panic!("no legal actions");
    }
    fn pop(&mut self) {}
    fn actions(&mut self) -> Vec<i32> {
        Vec::new()
    }
    fn terminal_reason(&mut self) -> Option<(f32, String)> {
        Some((0.0, "drawn at the start".to_string()))
    }
    fn observe(&self, dst: &mut [f32]) {
        dst.fill(0.0);
    }
    fn heuristic(&self) -> f32 {
        0.0
    }
    fn transcript(&mut self) -> String {
        "1/2-1/2 {drawn at the start}".to_string()
    }
    fn action_name(&self, _action: i32) -> String {
        "-".to_string()
    }
}

/// Twenty legal actions at every node, never terminal.
struct WideEnv {
    ply: u32,
}

impl Environment for WideEnv {
    const WIDTH: usize = 4;
    const HEIGHT: usize = 5;
    const FEATURES: usize = 1;
    const POL_SIZE: usize = 20;

    fn new() -> Self {
        WideEnv { ply: 0 }
    }
    fn turn(&self) -> f32 {
        if self.ply % 2 == 0 {
            1.0
        } else {
            -1.0
        }
    }
    fn ply(&self) -> u32 {
        self.ply
    }
    fn push(&mut self, _action: i32) {
        self.ply += 1;
    }
    fn pop(&mut self) {
        self.ply -= 1;
    }
    fn actions(&mut self) -> Vec<i32> {
        (0..20).collect()
    }
    fn terminal_reason(&mut self) -> Option<(f32, String)> {
        None
    }
    fn observe(&self, dst: &mut [f32]) {
        dst.fill(0.0);
    }
    fn heuristic(&self) -> f32 {
        0.0
    }
    fn transcript(&mut self) -> String {
        String::new()
    }
    fn action_name(&self, action: i32) -> String {
        action.to_string()
    }
}

fn quiet_cfg() -> TreeConfig {
    TreeConfig {
        noise_weight: 0.0,
        ..TreeConfig::default()
    }
}

/// Run select/expand simulations with a uniform policy and zero value.
fn simulate<E: Environment>(tree: &mut SearchTree<E>, iterations: usize) {
    let uniform = vec![1.0 / E::POL_SIZE as f32; E::POL_SIZE];
    let mut obs = vec![0.0f32; E::OBS_SIZE];

    for _ in 0..iterations {
        if tree.select(&mut obs) {
            tree.expand(&uniform, 0.0, true);
        }
    }
}

#[test]
fn terminal_at_root_backprops_once_and_pick_fails() {
    let mut tree: SearchTree<DoneEnv> = SearchTree::new(quiet_cfg(), 1);
    let mut obs = [0.0f32; 1];

    assert!(!tree.select(&mut obs));
    assert_eq!(tree.visits(), 1);
    assert_eq!(tree.pick(0.0), Err(TreeError::EmptyRoot));
}

#[test]
fn uniform_policy_visits_spread_evenly() {
    let cfg = TreeConfig {
        cpuct: 1.5,
        ..quiet_cfg()
    };
    let mut tree: SearchTree<WideEnv> = SearchTree::new(cfg, 7);
    simulate(&mut tree, 2048);

    let arena = tree.arena();
    let root = arena.get(tree.root_id());
    assert_eq!(root.children.len(), 20);

    let visits: Vec<u32> = root
        .children
        .iter()
        .map(|&c| arena.get(c).visits)
        .collect();
    let min = *visits.iter().min().unwrap();
    let max = *visits.iter().max().unwrap();

    assert!(min > 0, "every child visited, got {:?}", visits);
    assert!(max - min <= 400, "spread too wide: {:?}", visits);
}

#[test]
fn visit_accounting_holds_at_every_expanded_node() {
    let mut tree: SearchTree<TttEnv> = SearchTree::new(quiet_cfg(), 3);
    simulate(&mut tree, 300);

    let arena = tree.arena();
    for id in 0..arena.len() as u32 {
        let n = arena.get(id);
        if n.children.is_empty() {
            continue;
        }
        let child_sum: u32 = n.children.iter().map(|&c| arena.get(c).visits).sum();
        assert_eq!(
            n.visits,
            1 + child_sum,
            "node {} visits {} vs 1 + {}",
            id,
            n.visits,
            child_sum
        );
    }
}

#[test]
fn players_alternate_down_the_tree() {
    let mut tree: SearchTree<TttEnv> = SearchTree::new(quiet_cfg(), 4);
    simulate(&mut tree, 200);

    let arena = tree.arena();
    for id in 0..arena.len() as u32 {
        let n = arena.get(id);
        for &c in &n.children {
            assert_eq!(arena.get(c).turn, -n.turn);
        }
    }
}

#[test]
fn priors_sum_to_one_at_every_expanded_node() {
    // Noise enabled: the mix must still be a distribution.
    let cfg = TreeConfig {
        noise_weight: 0.25,
        ..TreeConfig::default()
    };
    let mut tree: SearchTree<TttEnv> = SearchTree::new(cfg, 5);
    simulate(&mut tree, 200);

    let arena = tree.arena();
    for id in 0..arena.len() as u32 {
        let n = arena.get(id);
        if n.children.is_empty() {
            continue;
        }
        let sum: f32 = n.children.iter().map(|&c| arena.get(c).prior).sum();
        assert!((sum - 1.0).abs() < 1e-4, "prior sum {} at node {}", sum, id);
    }
}

#[test]
fn zero_policy_mass_falls_back_to_uniform_priors() {
    let mut tree: SearchTree<TttEnv> = SearchTree::new(quiet_cfg(), 6);
    let zeros = vec![0.0f32; TttEnv::POL_SIZE];
    let mut obs = vec![0.0f32; TttEnv::OBS_SIZE];

    assert!(tree.select(&mut obs));
    tree.expand(&zeros, 0.0, true);

    let arena = tree.arena();
    let root = arena.get(tree.root_id());
    assert_eq!(root.children.len(), 9);
    for &c in &root.children {
        assert!((arena.get(c).prior - 1.0 / 9.0).abs() < 1e-6);
    }
}

#[test]
fn snapshot_is_a_distribution_over_child_visits() {
    let mut tree: SearchTree<TttEnv> = SearchTree::new(quiet_cfg(), 8);
    simulate(&mut tree, 128);
    assert!(tree.visits() > 1);

    let mut dist = [0.0f32; TttEnv::POL_SIZE];
    tree.snapshot(&mut dist);

    let sum: f32 = dist.iter().sum();
    assert!((sum - 1.0).abs() < 1e-4, "snapshot sum {}", sum);
    assert!(dist.iter().all(|&p| p >= 0.0));
}

#[test]
fn value_accounting_folds_the_leaf_turn() {
    let mut tree: SearchTree<WideEnv> = SearchTree::new(quiet_cfg(), 9);
    let uniform = vec![0.05f32; 20];
    let mut obs = vec![0.0f32; WideEnv::OBS_SIZE];

    assert!(tree.select(&mut obs));
    tree.expand(&uniform, 1.0, true);

    // Root turn is -1 (the mover at the root is White): the +1 network value
    // flips to -1 as a position value, then maps to 0.5 + (-1 * -1)/2 = 1.
    let root = tree.arena().get(tree.root_id());
    assert_eq!(root.visits, 1);
    assert!((root.value_sum - 1.0).abs() < 1e-6);
}

#[test]
fn advance_promotes_the_picked_child() {
    let mut tree: SearchTree<TttEnv> = SearchTree::new(quiet_cfg(), 10);
    simulate(&mut tree, 64);

    let picked = tree.pick(0.0).unwrap();
    tree.advance(picked).unwrap();

    assert_eq!(tree.env().ply(), 1);
    assert!(tree.arena().get(tree.root_id()).parent.is_none());

    // Everything outside the promoted subtree is gone.
    let arena = tree.arena();
    assert!(arena.len() >= 1);
    for id in 0..arena.len() as u32 {
        if id != tree.root_id() {
            assert!(arena.get(id).parent.is_some());
        }
    }
}

#[test]
fn advance_on_unknown_action_is_an_error() {
    let mut tree: SearchTree<TttEnv> = SearchTree::new(quiet_cfg(), 11);
    simulate(&mut tree, 32);
    assert_eq!(tree.advance(99), Err(TreeError::NoSuchChild(99)));
}

#[test]
fn reset_drops_the_arena() {
    let mut tree: SearchTree<TttEnv> = SearchTree::new(quiet_cfg(), 12);
    simulate(&mut tree, 64);
    assert!(tree.arena().len() > 1);

    tree.reset();
    assert_eq!(tree.visits(), 0);
    assert_eq!(tree.arena().len(), 1);
    assert_eq!(tree.env().ply(), 0);
}

#[test]
fn describe_root_reports_every_child() {
    let mut tree: SearchTree<TttEnv> = SearchTree::new(quiet_cfg(), 14);
    simulate(&mut tree, 64);

    let lines = tree.describe_root();
    assert_eq!(lines.len(), 9);
    assert!(lines.iter().all(|l| l.contains("visits")));
}

#[test]
fn tempered_pick_returns_a_legal_action() {
    let mut tree: SearchTree<TttEnv> = SearchTree::new(quiet_cfg(), 13);
    simulate(&mut tree, 64);

    for _ in 0..32 {
        let a = tree.pick(1.0).unwrap();
        assert!((0..9).contains(&a));
    }
}
