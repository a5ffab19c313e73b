//! The game rules adapter interface.
//!
//! An [`Environment`] wraps an external rules implementation and exposes the
//! narrow surface the search and self-play layers need: a mutable position
//! with push/pop, integer action ids, terminal detection with a signed
//! outcome, an observation writer, and a scalar heuristic. Everything above
//! this trait is game-agnostic.

/// A two-player, zero-sum, perfect-information game position.
///
/// Action ids index into a fixed policy vector of length `POL_SIZE`.
/// Observations are dense `f32` planes of shape `WIDTH x HEIGHT x FEATURES`,
/// flattened to `OBS_SIZE`, always encoded from the side-to-move's point of
/// view.
pub trait Environment: Send + 'static {
    const WIDTH: usize;
    const HEIGHT: usize;
    const FEATURES: usize;
    const POL_SIZE: usize;
    const OBS_SIZE: usize = Self::WIDTH * Self::HEIGHT * Self::FEATURES;

    /// A fresh starting position.
    fn new() -> Self
    where
        Self: Sized;

    /// Side to move: `+1.0` for the first player (White), `-1.0` otherwise.
    fn turn(&self) -> f32;

    /// Number of actions applied since the starting position.
    fn ply(&self) -> u32;

    /// Apply a legal action. Callers guarantee legality; adapters may panic
    /// or debug-assert on illegal ids.
    fn push(&mut self, action: i32);

    /// Undo the most recent action.
    fn pop(&mut self);

    /// Legal action ids at the current position.
    fn actions(&mut self) -> Vec<i32>;

    /// `Some(outcome)` when the game is over, with the outcome in
    /// `{-1.0, 0.0, +1.0}` relative to the first player.
    fn terminal(&mut self) -> Option<f32> {
        self.terminal_reason().map(|(v, _)| v)
    }

    /// Terminal outcome plus a short human-readable reason, used for game
    /// transcript comments.
    fn terminal_reason(&mut self) -> Option<(f32, String)>;

    /// Write the observation planes into `dst`, which has length `OBS_SIZE`.
    fn observe(&self, dst: &mut [f32]);

    /// Unbounded scalar evaluation of the position relative to the first
    /// player. Callers clamp and scale.
    fn heuristic(&self) -> f32;

    /// Full game transcript. Meaningful once the position is terminal.
    fn transcript(&mut self) -> String;

    /// Short printable name for an action id, for logs and debugging.
    fn action_name(&self, action: i32) -> String;
}
