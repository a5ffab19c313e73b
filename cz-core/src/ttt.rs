//! Built-in tic-tac-toe environment.
//!
//! A deliberately tiny game used by the unit tests and smoke runs. The
//! observation is three 3x3 planes: the mover's stones, the opponent's
//! stones, and a constant side-to-move plane.

use crate::env::Environment;

const LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

pub struct TttEnv {
    cells: [i8; 9],
    history: Vec<i32>,
}

impl TttEnv {
    fn winner(&self) -> Option<i8> {
        for line in LINES {
            let s = self.cells[line[0]];
            if s != 0 && self.cells[line[1]] == s && self.cells[line[2]] == s {
                return Some(s);
            }
        }
        None
    }

    fn mover(&self) -> i8 {
        if self.history.len() % 2 == 0 {
            1
        } else {
            -1
        }
    }

    fn cell_name(action: i32) -> String {
        let col = (b'a' + (action % 3) as u8) as char;
        let row = action / 3 + 1;
        format!("{}{}", col, row)
    }
}

impl Environment for TttEnv {
    const WIDTH: usize = 3;
    const HEIGHT: usize = 3;
    const FEATURES: usize = 3;
    const POL_SIZE: usize = 9;

    fn new() -> Self {
        Self {
            cells: [0; 9],
            history: Vec::new(),
        }
    }

    fn turn(&self) -> f32 {
        self.mover() as f32
    }

    fn ply(&self) -> u32 {
        self.history.len() as u32
    }

    fn push(&mut self, action: i32) {
        debug_assert_eq!(self.cells[action as usize], 0, "cell occupied");
        self.cells[action as usize] = self.mover();
        self.history.push(action);
    }

    fn pop(&mut self) {
        let action = self.history.pop().expect("pop on empty history");
        self.cells[action as usize] = 0;
    }

    fn actions(&mut self) -> Vec<i32> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, &c)| c == 0)
            .map(|(i, _)| i as i32)
            .collect()
    }

    fn terminal_reason(&mut self) -> Option<(f32, String)> {
        if let Some(w) = self.winner() {
            let name = if w > 0 { "X" } else { "O" };
            return Some((w as f32, format!("{} completes a line", name)));
        }
        if self.history.len() == 9 {
            return Some((0.0, "board is full".to_string()));
        }
        None
    }

    fn observe(&self, dst: &mut [f32]) {
        let me = self.mover();
        for (i, &c) in self.cells.iter().enumerate() {
            dst[i * 3] = (c == me) as u8 as f32;
            dst[i * 3 + 1] = (c == -me) as u8 as f32;
            dst[i * 3 + 2] = me as f32;
        }
    }

    fn heuristic(&self) -> f32 {
        // Open-line count difference, in the same spirit as a material count.
        let mut score = 0.0;
        for line in LINES {
            let cells = [
                self.cells[line[0]],
                self.cells[line[1]],
                self.cells[line[2]],
            ];
            if !cells.contains(&-1) {
                score += 10.0;
            }
            if !cells.contains(&1) {
                score -= 10.0;
            }
        }
        score
    }

    fn transcript(&mut self) -> String {
        let mut out = String::new();
        for (i, &a) in self.history.iter().enumerate() {
            if i % 2 == 0 {
                out.push_str(&format!("{}{}.", if i == 0 { "" } else { " " }, i / 2 + 1));
            }
            out.push(' ');
            out.push_str(&Self::cell_name(a));
        }
        let (result, reason) = match self.terminal_reason() {
            Some((v, r)) if v > 0.0 => ("1-0", r),
            Some((v, r)) if v < 0.0 => ("0-1", r),
            Some((_, r)) => ("1/2-1/2", r),
            None => ("*", "game in progress".to_string()),
        };
        format!("{} {} {{{}}}", out.trim(), result, reason)
    }

    fn action_name(&self, action: i32) -> String {
        Self::cell_name(action)
    }
}
