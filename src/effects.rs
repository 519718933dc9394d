//! What a finished command does to the game: bombs for successes, garbage and
//! infection for failures, and the variety bonus.

use crate::board::{Board, Cell, INFECTION_GLYPH};
use rand::Rng;
use rand::seq::IteratorRandom;

pub const DEFAULT_BOMB_CAP: u32 = 3;
pub const DEFAULT_VARIETY_BONUS: u64 = 25;
pub const DEFAULT_INFECTION_COUNT: usize = 5;

/// Tuning for outcome effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectsConfig {
    pub bomb_cap: u32,
    pub variety_bonus: u64,
    pub infection_count: usize,
}

impl Default for EffectsConfig {
    fn default() -> Self {
        Self {
            bomb_cap: DEFAULT_BOMB_CAP,
            variety_bonus: DEFAULT_VARIETY_BONUS,
            infection_count: DEFAULT_INFECTION_COUNT,
        }
    }
}

/// Add one bomb unless the cap is reached. Returns whether the grant happened.
pub fn grant_bomb(bombs: &mut u32, cap: u32) -> bool {
    if *bombs >= cap {
        return false;
    }
    *bombs += 1;
    true
}

/// Blast the 3×3 block centred on (x, y), clamped to the well. Returns how
/// many filled cells were cleared.
pub fn detonate(board: &mut Board, x: i32, y: i32) -> usize {
    let mut cleared = 0;
    for ny in (y - 1).max(0)..=(y + 1) {
        for nx in (x - 1).max(0)..=(x + 1) {
            let (ux, uy) = (nx as usize, ny as usize);
            if board.get(ux, uy).is_some_and(|c| c.is_filled()) {
                board.set(ux, uy, Cell::Empty);
                cleared += 1;
            }
        }
    }
    cleared
}

/// Result of pushing a garbage row in from the bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GarbageOutcome {
    Inserted { hole: usize },
    /// The top row was occupied; the board is untouched and the game is over.
    Overflow,
}

/// Push a garbage row with one random gap in at the bottom.
pub fn insert_garbage_row<R: Rng>(board: &mut Board, rng: &mut R) -> GarbageOutcome {
    let hole = rng.gen_range(0..board.width());
    let row = (0..board.width())
        .map(|x| if x == hole { Cell::Empty } else { Cell::garbage() })
        .collect();
    if board.push_bottom_row(row) {
        GarbageOutcome::Inserted { hole }
    } else {
        GarbageOutcome::Overflow
    }
}

/// Overwrite the glyph of up to `count` random filled cells with the
/// infection marker, skipping `skip_row`. Occupancy never changes.
pub fn infect<R: Rng>(board: &mut Board, rng: &mut R, count: usize, skip_row: Option<usize>) -> usize {
    let targets = board
        .filled_cells()
        .into_iter()
        .filter(|&(_, y)| Some(y) != skip_row)
        .choose_multiple(rng, count);
    for &(x, y) in &targets {
        if let Some(Cell::Filled(mut block)) = board.get(x, y) {
            block.glyph = INFECTION_GLYPH;
            block.infected = true;
            board.set(x, y, Cell::Filled(block));
        }
    }
    targets.len()
}

/// Meter level at which the variety meter pays out a bomb.
pub const VARIETY_THRESHOLD: u32 = 100;

/// What recording one completed command did to the variety state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VarietyOutcome {
    /// Flat score bonus for switching commands.
    pub bonus: u64,
    /// Points added to the meter.
    pub meter_points: u32,
    /// Times the meter crossed [`VARIETY_THRESHOLD`]; one bomb each.
    pub bombs_earned: u32,
}

/// Identity (first token) of the last command plus the variety meter.
///
/// Switching commands builds a streak and fills the meter; repeating one
/// resets the streak and drains it a little.
#[derive(Debug, Clone, Default)]
pub struct VarietyTracker {
    last: Option<String>,
    meter: u32,
    streak: u32,
}

impl VarietyTracker {
    pub fn last(&self) -> Option<&str> {
        self.last.as_deref()
    }

    pub fn meter(&self) -> u32 {
        self.meter
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }

    /// Called on START: the first command ever seen becomes the baseline,
    /// so it earns nothing when it completes.
    pub fn seed(&mut self, identity: &str) {
        self.last.get_or_insert_with(|| identity.to_string());
    }

    /// Record a completed command. A new identity earns `bonus` points and
    /// meter points; failures earn half the meter points.
    pub fn record(&mut self, identity: &str, succeeded: bool, bonus: u64) -> VarietyOutcome {
        let repeated = self.last.as_deref() == Some(identity);
        self.last = Some(identity.to_string());
        if repeated {
            self.meter = self.meter.saturating_sub(5);
            self.streak = 0;
            return VarietyOutcome::default();
        }
        self.meter = self.meter.saturating_sub(2);
        self.streak += 1;
        let mut meter_points = 10 + 3 * self.streak.min(10);
        if !succeeded {
            meter_points /= 2;
        }
        self.meter += meter_points;
        let mut bombs_earned = 0;
        while self.meter >= VARIETY_THRESHOLD {
            self.meter -= VARIETY_THRESHOLD;
            bombs_earned += 1;
        }
        VarietyOutcome {
            bonus,
            meter_points,
            bombs_earned,
        }
    }
}
