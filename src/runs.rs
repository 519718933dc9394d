//! Command runs: one per reported shell command, from START until its
//! outcome has been applied to the board.

use crate::piece::{Shape, ShapeClass};
use crate::tokenizer::{TokenizeMode, chunk, tokenize};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RunError {
    #[error("run {0} is already being tracked")]
    DuplicateRunId(u64),
    #[error("no run with id {0}")]
    UnknownRunId(u64),
    #[error("run {0} already ended")]
    AlreadyEnded(u64),
}

/// Where a run is in its lifecycle. `Done` runs are removed, so they never show up here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// Started, nothing emitted yet.
    Created,
    /// Emitting its first pass over the tokens.
    Streaming,
    /// Command still running after at least one full pass.
    Cycling,
    /// END received; waiting for its outcome to be applied.
    Completing,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Created => "new",
            Self::Streaming => "streaming",
            Self::Cycling => "cycling",
            Self::Completing => "ending",
        };
        f.write_str(label)
    }
}

/// One chunk handed out by a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedChunk {
    pub run_id: u64,
    pub cycle: u64,
    pub text: String,
    pub shape: Shape,
}

/// A run whose END arrived and whose minimum duration is met.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedRun {
    pub id: u64,
    pub identity: String,
    pub exit_code: i32,
    pub emitted: u64,
    pub cycles: u64,
}

#[derive(Debug)]
pub struct CommandRun {
    id: u64,
    identity: String,
    /// Chunks of each token, computed once at START and reused every cycle.
    chunks: Vec<Vec<String>>,
    token_index: usize,
    chunk_index: usize,
    cycle: u64,
    active: bool,
    exit_code: Option<i32>,
    emitted: u64,
    seed: u64,
    rng: SmallRng,
}

impl CommandRun {
    fn new(id: u64, command: &str, mode: TokenizeMode, seed: u64) -> Self {
        let tokens = tokenize(command, mode);
        let identity = tokens.first().cloned().unwrap_or_default();
        let chunks = tokens.iter().map(|t| chunk(t)).collect();
        Self {
            id,
            identity,
            chunks,
            token_index: 0,
            chunk_index: 0,
            cycle: 0,
            active: true,
            exit_code: None,
            emitted: 0,
            seed,
            rng: SmallRng::seed_from_u64(cycle_seed(seed, id, 0)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// First token of the command; used for the variety bonus.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// (token index, chunk index) of the next chunk to emit.
    #[cfg(test)]
    pub fn cursor(&self) -> (usize, usize) {
        (self.token_index, self.chunk_index)
    }

    pub fn phase(&self) -> RunPhase {
        if !self.is_active() {
            RunPhase::Completing
        } else if self.emitted == 0 {
            RunPhase::Created
        } else if self.cycle == 0 {
            RunPhase::Streaming
        } else {
            RunPhase::Cycling
        }
    }

    fn has_chunks(&self) -> bool {
        !self.chunks.is_empty()
    }

    /// Active runs stream forever; an ended run still owes one piece if it
    /// never got to emit.
    fn can_emit(&self) -> bool {
        self.has_chunks() && (self.active || self.emitted == 0)
    }

    fn minimum_met(&self) -> bool {
        self.emitted > 0 || !self.has_chunks()
    }

    /// Chunk at the cursor and its shape, drawn from `rng`.
    fn chunk_at_cursor(&self, rng: &mut SmallRng) -> Option<EmittedChunk> {
        if !self.can_emit() {
            return None;
        }
        let text = self
            .chunks
            .get(self.token_index)?
            .get(self.chunk_index)?
            .clone();
        let class = ShapeClass::for_chunk_len(text.chars().count())?;
        Some(EmittedChunk {
            run_id: self.id,
            cycle: self.cycle,
            text,
            shape: class.pick(rng),
        })
    }

    /// What [`CommandRun::next_chunk`] would return, without consuming it.
    fn peek_chunk(&self) -> Option<EmittedChunk> {
        self.chunk_at_cursor(&mut self.rng.clone())
    }

    fn next_chunk(&mut self) -> Option<EmittedChunk> {
        let mut rng = self.rng.clone();
        let emitted = self.chunk_at_cursor(&mut rng)?;
        self.rng = rng;
        self.emitted += 1;
        self.advance();
        Some(emitted)
    }

    fn advance(&mut self) {
        self.chunk_index += 1;
        if self.chunk_index < self.chunks[self.token_index].len() {
            return;
        }
        self.chunk_index = 0;
        self.token_index += 1;
        if self.token_index < self.chunks.len() || !self.active {
            return;
        }
        self.token_index = 0;
        self.cycle += 1;
        self.rng = SmallRng::seed_from_u64(cycle_seed(self.seed, self.id, self.cycle));
    }
}

/// Shape seed for one pass of one run.
fn cycle_seed(seed: u64, id: u64, cycle: u64) -> u64 {
    seed ^ id.wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ cycle.wrapping_add(1).wrapping_mul(0xC2B2_AE3D_27D4_EB4F)
}

/// Tracks every run between START and the application of its outcome and
/// decides which run feeds the next piece.
#[derive(Debug)]
pub struct RunManager {
    /// In START order; served round-robin.
    runs: Vec<CommandRun>,
    cursor: usize,
    seed: u64,
    mode: TokenizeMode,
}

impl RunManager {
    pub fn new(seed: u64, mode: TokenizeMode) -> Self {
        Self {
            runs: Vec::new(),
            cursor: 0,
            seed,
            mode,
        }
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn get(&self, id: u64) -> Option<&CommandRun> {
        self.runs.iter().find(|r| r.id == id)
    }

    /// Tracked runs in START order.
    pub fn iter(&self) -> impl Iterator<Item = &CommandRun> {
        self.runs.iter()
    }

    fn get_mut(&mut self, id: u64) -> Option<&mut CommandRun> {
        self.runs.iter_mut().find(|r| r.id == id)
    }

    /// Begin tracking a command. A START for an id that is still tracked is
    /// rejected and the existing run is kept.
    pub fn start(&mut self, id: u64, command: &str) -> Result<&CommandRun, RunError> {
        if self.get(id).is_some() {
            return Err(RunError::DuplicateRunId(id));
        }
        self.runs.push(CommandRun::new(id, command, self.mode, self.seed));
        Ok(&self.runs[self.runs.len() - 1])
    }

    /// Record a command's exit. Its outcome is applied later, by
    /// [`RunManager::take_completed`].
    pub fn end(&mut self, id: u64, exit_code: i32) -> Result<&CommandRun, RunError> {
        let run = self.get_mut(id).ok_or(RunError::UnknownRunId(id))?;
        if run.exit_code.is_some() {
            return Err(RunError::AlreadyEnded(id));
        }
        run.active = false;
        run.exit_code = Some(exit_code);
        Ok(&*run)
    }

    /// Next chunk from the first run (round-robin) that can emit one.
    pub fn next_chunk(&mut self) -> Option<EmittedChunk> {
        let n = self.runs.len();
        for offset in 0..n {
            let idx = (self.cursor + offset) % n;
            if let Some(chunk) = self.runs[idx].next_chunk() {
                self.cursor = (idx + 1) % n;
                return Some(chunk);
            }
        }
        None
    }

    /// The chunk the next [`RunManager::next_chunk`] call would hand out.
    pub fn peek_chunk(&self) -> Option<EmittedChunk> {
        let n = self.runs.len();
        (0..n).find_map(|offset| self.runs[(self.cursor + offset) % n].peek_chunk())
    }

    /// Remove and return every ended run that has emitted at least one piece
    /// (or never could). With `force`, every ended run is returned.
    pub fn take_completed(&mut self, force: bool) -> Vec<CompletedRun> {
        let mut done = Vec::new();
        let mut kept = Vec::with_capacity(self.runs.len());
        for run in self.runs.drain(..) {
            match run.exit_code {
                Some(exit_code) if force || run.minimum_met() => done.push(CompletedRun {
                    id: run.id,
                    identity: run.identity,
                    exit_code,
                    emitted: run.emitted,
                    cycles: run.cycle,
                }),
                _ => kept.push(run),
            }
        }
        self.runs = kept;
        if self.cursor >= self.runs.len() {
            self.cursor = 0;
        }
        done
    }
}
