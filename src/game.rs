//! Game state: well, falling piece, spawn queue, score, command runs.
//!
//! Everything here is mutated from a single thread. Hook events reach it only
//! through [`GameState::tick`], which applies them between gravity steps.

use crate::GameConfig;
use crate::board::{BOARD_HEIGHT, BOARD_WIDTH, Board, Cell};
use crate::effects::{
    EffectsConfig, GarbageOutcome, VarietyTracker, detonate, grant_bomb, infect,
    insert_garbage_row,
};
use crate::events::CommandEvent;
use crate::mode::{ModeController, RunMode};
use crate::piece::{Piece, RotationDir};
use crate::runs::{CompletedRun, EmittedChunk, RunManager};
use crate::snapshot::{PieceView, RunView, Snapshot};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Spawn column of a piece's anchor.
const SPAWN_X: i32 = BOARD_WIDTH as i32 / 2 - 1;

/// Points for clearing `lines` rows in one lock.
pub fn line_clear_score(lines: u32) -> u64 {
    match lines {
        1 => 100,
        2 => 300,
        3 => 500,
        4 => 800,
        _ => 0,
    }
}

fn piece_from_chunk(chunk: EmittedChunk) -> Piece {
    debug!(run = chunk.run_id, cycle = chunk.cycle, text = %chunk.text, shape = ?chunk.shape, "chunk");
    Piece::new(chunk.shape, chunk.text.chars())
}

#[derive(Debug)]
pub struct GameState {
    pub board: Board,
    pub piece: Option<Piece>,
    /// Pieces that spawn ahead of run output (success bombs).
    pub queue: VecDeque<Piece>,
    pub score: u64,
    pub lines_cleared: u64,
    /// Bombs granted and not yet detonated.
    pub bombs: u32,
    pub game_over: bool,
    runs: RunManager,
    mode: ModeController,
    variety: VarietyTracker,
    effects: EffectsConfig,
    /// Garbage holes and infection targets.
    rng: SmallRng,
}

impl GameState {
    pub fn new(config: &GameConfig) -> Self {
        Self {
            board: Board::new(BOARD_WIDTH, BOARD_HEIGHT),
            piece: None,
            queue: VecDeque::new(),
            score: 0,
            lines_cleared: 0,
            bombs: 0,
            game_over: false,
            runs: RunManager::new(config.seed, config.tokenize_mode),
            mode: ModeController::new(
                Duration::from_millis(config.idle_gravity_ms),
                Duration::from_millis(config.run_gravity_ms),
            ),
            variety: VarietyTracker::default(),
            effects: config.effects,
            rng: SmallRng::seed_from_u64(config.seed ^ 0xB0A2_D5EE_D000_0001),
        }
    }

    pub fn runs(&self) -> &RunManager {
        &self.runs
    }

    pub fn mode(&self) -> RunMode {
        self.mode.mode()
    }

    /// Time between gravity steps in the current mode.
    pub fn gravity_interval(&self) -> Duration {
        self.mode.gravity_interval()
    }

    /// One tick: apply queued hook events in order, apply outcomes that are
    /// due, then take exactly one gravity step.
    pub fn tick<I: IntoIterator<Item = CommandEvent>>(&mut self, events: I) {
        for event in events {
            self.apply_event(event);
        }
        self.apply_completions();
        self.mode.observe(self.runs.len());
        self.step_gravity();
    }

    fn apply_event(&mut self, event: CommandEvent) {
        match event {
            CommandEvent::Start { id, command } => match self.runs.start(id, &command) {
                Ok(run) => {
                    info!(id, identity = run.identity(), "run started");
                    self.variety.seed(run.identity());
                }
                Err(err) => warn!(%err, "ignoring START"),
            },
            CommandEvent::End { id, exit_code } => match self.runs.end(id, exit_code) {
                Ok(run) => info!(id, exit_code, emitted = run.emitted(), "run ended"),
                Err(err) => warn!(%err, "ignoring END"),
            },
        }
    }

    fn apply_completions(&mut self) {
        if self.runs.is_empty() {
            return;
        }
        for done in self.runs.take_completed(self.game_over) {
            if self.game_over {
                info!(id = done.id, "run retired after game over");
                continue;
            }
            self.apply_outcome(&done);
        }
    }

    fn apply_outcome(&mut self, done: &CompletedRun) {
        let succeeded = done.exit_code == 0;
        if succeeded {
            self.award_bomb(done.id, "success");
        } else {
            self.apply_failure(done);
        }
        let variety = self
            .variety
            .record(&done.identity, succeeded, self.effects.variety_bonus);
        self.score += variety.bonus;
        for _ in 0..variety.bombs_earned {
            self.award_bomb(done.id, "variety meter");
        }
        info!(
            id = done.id,
            exit_code = done.exit_code,
            pieces = done.emitted,
            cycles = done.cycles,
            bonus = variety.bonus,
            meter_points = variety.meter_points,
            meter = self.variety.meter(),
            streak = self.variety.streak(),
            "run completed"
        );
    }

    /// Grant a bomb and queue its piece, unless the cap is reached.
    fn award_bomb(&mut self, id: u64, source: &str) {
        if grant_bomb(&mut self.bombs, self.effects.bomb_cap) {
            self.queue.push_back(Piece::bomb());
            info!(id, source, bombs = self.bombs, "bomb granted");
        } else {
            debug!(id, source, "bomb cap reached");
        }
    }

    fn apply_failure(&mut self, done: &CompletedRun) {
        let hole = match insert_garbage_row(&mut self.board, &mut self.rng) {
            GarbageOutcome::Inserted { hole } => hole,
            GarbageOutcome::Overflow => {
                self.set_game_over("garbage row overflowed the well");
                return;
            }
        };
        // The stack rose under the falling piece; carry it up with the stack.
        if let Some(piece) = &self.piece {
            if !self.can_place(piece) {
                let lifted = piece.shifted(0, -1);
                if self.can_place(&lifted) {
                    self.piece = Some(lifted);
                } else {
                    self.set_game_over("garbage row pushed into the falling piece");
                    return;
                }
            }
        }
        let bottom = self.board.height() - 1;
        let infected = infect(
            &mut self.board,
            &mut self.rng,
            self.effects.infection_count,
            Some(bottom),
        );
        info!(id = done.id, hole, infected, "failure penalty applied");
    }

    fn set_game_over(&mut self, reason: &str) {
        if !self.game_over {
            self.game_over = true;
            self.piece = None;
            warn!(
                reason,
                score = self.score,
                lines = self.lines_cleared,
                filled = self.board.filled_count(),
                "game over"
            );
        }
    }

    /// True if every cell of `piece` is inside the well and empty.
    pub fn can_place(&self, piece: &Piece) -> bool {
        piece
            .cells()
            .into_iter()
            .all(|(x, y)| self.board.is_open(x, y))
    }

    /// Place `piece` at the spawn point. No room means game over.
    pub fn try_spawn(&mut self, mut piece: Piece) -> bool {
        piece.x = SPAWN_X;
        piece.y = 0;
        if self.can_place(&piece) {
            self.piece = Some(piece);
            true
        } else {
            self.set_game_over("no room to spawn");
            false
        }
    }

    pub fn try_move(&mut self, dx: i32, dy: i32) -> bool {
        if self.game_over {
            return false;
        }
        let Some(piece) = &self.piece else {
            return false;
        };
        let next = piece.shifted(dx, dy);
        if self.can_place(&next) {
            self.piece = Some(next);
            true
        } else {
            false
        }
    }

    pub fn try_rotate(&mut self, dir: RotationDir) -> bool {
        if self.game_over {
            return false;
        }
        let Some(piece) = &self.piece else {
            return false;
        };
        let next = piece.rotated(dir);
        if self.can_place(&next) {
            self.piece = Some(next);
            true
        } else {
            false
        }
    }

    /// Where the active piece would land; the piece itself is not moved.
    pub fn ghost(&self) -> Option<Piece> {
        let mut ghost = self.piece.clone()?;
        loop {
            let next = ghost.shifted(0, 1);
            if !self.can_place(&next) {
                return Some(ghost);
            }
            ghost = next;
        }
    }

    /// Move the piece down one row, or lock it and spawn the next one. With
    /// nothing falling, try to spawn.
    pub fn step_gravity(&mut self) {
        if self.game_over {
            return;
        }
        if self.piece.is_none() {
            self.spawn_next();
            return;
        }
        if !self.try_move(0, 1) {
            self.lock();
            self.spawn_next();
        }
    }

    /// Write the piece into the well (or detonate it, for a bomb) and clear
    /// any completed rows. Returns the number of rows cleared.
    pub fn lock(&mut self) -> u32 {
        let Some(piece) = self.piece.take() else {
            return 0;
        };
        if piece.is_bomb {
            let cleared = detonate(&mut self.board, piece.x, piece.y);
            self.bombs = self.bombs.saturating_sub(1);
            info!(x = piece.x, y = piece.y, cleared, "bomb detonated");
            return 0;
        }
        let class = piece.shape.class();
        for (x, y, glyph) in piece.cells_with_glyphs() {
            if x >= 0 && y >= 0 {
                self.board
                    .set(x as usize, y as usize, Cell::command(glyph, class));
            }
        }
        self.clear_completed_lines()
    }

    pub fn clear_completed_lines(&mut self) -> u32 {
        let rows = self.board.complete_rows();
        let cleared = self.board.remove_rows(&rows) as u32;
        if cleared > 0 {
            self.lines_cleared += u64::from(cleared);
            self.score += line_clear_score(cleared);
            debug!(cleared, score = self.score, "lines cleared");
        }
        cleared
    }

    /// Queued pieces first, then whatever the runs produce. In IDLE there are
    /// no runs, so nothing new appears.
    fn spawn_next(&mut self) {
        if self.game_over {
            return;
        }
        let next = self
            .queue
            .pop_front()
            .or_else(|| self.runs.next_chunk().map(piece_from_chunk));
        match next {
            Some(piece) => {
                self.try_spawn(piece);
            }
            None => self.piece = None,
        }
    }

    pub fn move_left(&mut self) -> bool {
        self.try_move(-1, 0)
    }

    pub fn move_right(&mut self) -> bool {
        self.try_move(1, 0)
    }

    /// One row down; locks like a gravity step when blocked.
    pub fn soft_drop(&mut self) {
        if self.game_over || self.piece.is_none() {
            return;
        }
        self.step_gravity();
    }

    pub fn hard_drop(&mut self) {
        if self.game_over {
            return;
        }
        if let Some(ghost) = self.ghost() {
            self.piece = Some(ghost);
            self.lock();
            self.spawn_next();
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            width: self.board.width(),
            height: self.board.height(),
            rows: self.board.rows().map(<[Cell]>::to_vec).collect(),
            piece: self.piece.as_ref().map(PieceView::from),
            ghost: self.ghost().as_ref().map(PieceView::from),
            next: self.queue.front().map(PieceView::from).or_else(|| {
                self.runs
                    .peek_chunk()
                    .map(|chunk| PieceView::from(&Piece::new(chunk.shape, chunk.text.chars())))
            }),
            score: self.score,
            lines_cleared: self.lines_cleared,
            mode: self.mode(),
            bombs: self.bombs,
            bomb_cap: self.effects.bomb_cap,
            tracked_runs: self.runs.len(),
            runs: self.runs.iter().map(RunView::from).collect(),
            last_identity: self.variety.last().map(str::to_string),
            variety_meter: self.variety.meter(),
            game_over: self.game_over,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::GARBAGE_GLYPH;
    use crate::piece::{Shape, ShapeClass, TetrominoKind};

    const NO_EVENTS: [CommandEvent; 0] = [];

    fn state() -> GameState {
        GameState::new(&GameConfig::default())
    }

    fn start(id: u64, command: &str) -> CommandEvent {
        CommandEvent::Start {
            id,
            command: command.to_string(),
        }
    }

    fn end(id: u64, exit_code: i32) -> CommandEvent {
        CommandEvent::End { id, exit_code }
    }

    /// Start and end a command in one tick, then tick until its outcome is applied.
    fn run_command(state: &mut GameState, id: u64, command: &str, exit_code: i32) {
        state.tick([start(id, command), end(id, exit_code)]);
        for _ in 0..500 {
            if state.runs().get(id).is_none() {
                return;
            }
            state.tick(NO_EVENTS);
        }
        panic!("run {id} never completed");
    }

    fn failed_run() -> CompletedRun {
        CompletedRun {
            id: 1,
            identity: "false".into(),
            exit_code: 1,
            emitted: 1,
            cycles: 0,
        }
    }

    fn fill_row(state: &mut GameState, y: usize) {
        for x in 0..BOARD_WIDTH {
            state.board.set(x, y, Cell::command('r', ShapeClass::Tetromino));
        }
    }

    #[test]
    fn idle_tick_spawns_nothing() {
        let mut s = state();
        s.tick(NO_EVENTS);
        assert!(s.piece.is_none());
        assert_eq!(s.mode(), RunMode::Idle);
    }

    #[test]
    fn start_switches_to_run_mode_and_spawns_first_chunk() {
        let mut s = state();
        s.tick([start(1, "cargo build")]);
        assert_eq!(s.mode(), RunMode::Run);
        let piece = s.piece.as_ref().expect("piece spawned");
        assert_eq!(piece.payload, vec!['c', 'a', 'r', 'g']);
        assert_eq!(piece.shape.class(), ShapeClass::Tetromino);
        assert!(s.gravity_interval() < Duration::from_millis(crate::mode::DEFAULT_IDLE_GRAVITY_MS));
    }

    #[test]
    fn early_end_still_yields_a_piece_before_effects() {
        let mut s = state();
        s.tick([start(1, "git commit -m fix"), end(1, 0)]);
        // First piece is out, outcome not applied yet, still RUN.
        assert_eq!(s.piece.as_ref().map(|p| p.payload.clone()), Some(vec!['g', 'i', 't']));
        assert_eq!(s.bombs, 0);
        assert_eq!(s.mode(), RunMode::Run);
        assert_eq!(s.runs().len(), 1);

        s.tick(NO_EVENTS);
        assert!(s.runs().is_empty());
        assert_eq!(s.bombs, 1);
        assert_eq!(s.queue.len(), 1);
        assert_eq!(s.mode(), RunMode::Idle);
    }

    #[test]
    fn outcome_is_applied_once() {
        let mut s = state();
        run_command(&mut s, 1, "ls", 0);
        let bombs = s.bombs;
        let score = s.score;
        for _ in 0..5 {
            s.tick(NO_EVENTS);
        }
        assert_eq!(s.bombs, bombs);
        assert_eq!(s.score, score);
    }

    #[test]
    fn success_at_cap_leaves_bombs_unchanged() {
        let mut s = state();
        s.bombs = s.effects.bomb_cap;
        run_command(&mut s, 1, "make", 0);
        assert_eq!(s.bombs, s.effects.bomb_cap);
        assert!(s.queue.iter().all(|p| !p.is_bomb));
    }

    #[test]
    fn failure_adds_one_garbage_row_and_shifts_up() {
        let config = GameConfig {
            effects: EffectsConfig {
                infection_count: 0,
                ..EffectsConfig::default()
            },
            ..GameConfig::default()
        };
        let mut s = GameState::new(&config);
        let bottom = BOARD_HEIGHT - 1;
        s.board.set(0, bottom, Cell::command('m', ShapeClass::Monomino));

        run_command(&mut s, 1, "false", 1);

        let gaps = (0..BOARD_WIDTH)
            .filter(|&x| !s.board.get(x, bottom).unwrap().is_filled())
            .count();
        assert_eq!(gaps, 1);
        assert!(
            (0..BOARD_WIDTH)
                .filter_map(|x| s.board.get(x, bottom).unwrap().glyph())
                .all(|g| g == GARBAGE_GLYPH)
        );
        assert_eq!(s.board.get(0, bottom - 1).unwrap().glyph(), Some('m'));
        assert_eq!(s.bombs, 0);
    }

    #[test]
    fn failure_infects_without_changing_occupancy() {
        let mut s = state();
        for x in 0..6 {
            s.board.set(x, 10, Cell::command('k', ShapeClass::Tetromino));
        }
        s.tick([start(1, "false"), end(1, 1)]);
        let filled_before = s.board.filled_count();
        s.tick(NO_EVENTS);
        // +9 garbage cells; infection only rewrites glyphs.
        assert_eq!(s.board.filled_count(), filled_before + BOARD_WIDTH - 1);
        let infected = s
            .board
            .rows()
            .flatten()
            .filter(|c| c.glyph() == Some(crate::board::INFECTION_GLYPH))
            .count();
        assert_eq!(infected, 5);
    }

    #[test]
    fn garbage_overflow_ends_the_game() {
        let mut s = state();
        s.board.set(9, 0, Cell::garbage());
        run_command(&mut s, 1, "false", 1);
        assert!(s.game_over);
        assert!(s.board.get(9, 0).unwrap().is_filled());
    }

    #[test]
    fn variety_bonus_needs_a_new_identity() {
        let mut s = state();
        run_command(&mut s, 1, "git status", 0);
        assert_eq!(s.score, 0);
        run_command(&mut s, 2, "git diff", 0);
        assert_eq!(s.score, 0);
        run_command(&mut s, 3, "cargo test", 0);
        assert_eq!(s.score, 25);
    }

    #[test]
    fn first_started_command_sets_the_variety_baseline() {
        let mut s = state();
        s.tick([start(1, "make"), start(2, "cargo build")]);
        s.tick([end(2, 0)]);
        for _ in 0..500 {
            if s.runs().get(2).is_none() {
                break;
            }
            s.tick(NO_EVENTS);
        }
        assert!(s.runs().get(2).is_none());
        assert_eq!(s.score, 25);
        assert_eq!(s.snapshot().last_identity.as_deref(), Some("cargo"));
    }

    #[test]
    fn variety_meter_grants_a_bomb_at_threshold() {
        let config = GameConfig {
            effects: EffectsConfig {
                bomb_cap: 10,
                ..EffectsConfig::default()
            },
            ..GameConfig::default()
        };
        let mut s = GameState::new(&config);
        s.variety.seed("c0");
        // Six switches: meter 13, 27, 44, 64, 87, 113.
        for (id, identity) in ["c1", "c2", "c3", "c4", "c5", "c6"].into_iter().enumerate() {
            s.apply_outcome(&CompletedRun {
                id: id as u64,
                identity: identity.into(),
                exit_code: 0,
                emitted: 1,
                cycles: 0,
            });
        }
        // Six success bombs plus one from the meter.
        assert_eq!(s.bombs, 7);
        assert_eq!(s.queue.len(), 7);
        assert_eq!(s.snapshot().variety_meter, 13);
    }

    #[test]
    fn garbage_lifts_a_resting_piece_with_the_stack() {
        let config = GameConfig {
            effects: EffectsConfig {
                infection_count: 0,
                ..EffectsConfig::default()
            },
            ..GameConfig::default()
        };
        let mut s = GameState::new(&config);
        let bottom = BOARD_HEIGHT - 1;
        s.board.set(2, bottom, Cell::command('s', ShapeClass::Monomino));
        let mut piece = Piece::new(Shape::Monomino, ['p']);
        piece.x = 2;
        piece.y = bottom as i32 - 1;
        s.piece = Some(piece);

        s.apply_failure(&failed_run());

        assert!(!s.game_over);
        assert_eq!(s.board.get(2, bottom - 1).unwrap().glyph(), Some('s'));
        assert_eq!(s.piece.as_ref().unwrap().y, bottom as i32 - 2);
        assert!(s.can_place(s.piece.as_ref().unwrap()));
    }

    #[test]
    fn garbage_pushing_a_top_row_piece_out_ends_the_game() {
        let mut s = state();
        s.board.set(2, 1, Cell::command('s', ShapeClass::Monomino));
        let mut piece = Piece::new(Shape::Monomino, ['p']);
        piece.x = 2;
        piece.y = 0;
        s.piece = Some(piece);

        s.apply_failure(&failed_run());

        assert!(s.game_over);
        assert!(s.piece.is_none());
        assert_eq!(s.board.get(2, 0).unwrap().glyph(), Some('s'));
    }

    #[test]
    fn clearing_two_rows_scores_300_and_shifts_down() {
        let mut s = state();
        fill_row(&mut s, BOARD_HEIGHT - 1);
        fill_row(&mut s, BOARD_HEIGHT - 2);
        s.board.set(4, BOARD_HEIGHT - 3, Cell::command('z', ShapeClass::Monomino));

        assert_eq!(s.clear_completed_lines(), 2);
        assert_eq!(s.score, 300);
        assert_eq!(s.lines_cleared, 2);
        assert_eq!(s.board.get(4, BOARD_HEIGHT - 1).unwrap().glyph(), Some('z'));
        assert_eq!(s.board.filled_count(), 1);
        assert!(!s.board.row_has_filled(0));
        assert!(!s.board.row_has_filled(1));
    }

    #[test]
    fn line_clear_table() {
        assert_eq!(line_clear_score(1), 100);
        assert_eq!(line_clear_score(2), 300);
        assert_eq!(line_clear_score(3), 500);
        assert_eq!(line_clear_score(4), 800);
    }

    #[test]
    fn bomb_lock_clears_block_and_writes_nothing() {
        let mut s = state();
        for y in 8..=12 {
            fill_row(&mut s, y);
        }
        let mut bomb = Piece::bomb();
        bomb.x = 4;
        bomb.y = 10;
        s.bombs = 1;
        s.piece = Some(bomb);

        s.lock();

        for y in 9..=11 {
            for x in 3..=5 {
                assert_eq!(s.board.get(x, y), Some(Cell::Empty), "({x},{y})");
            }
        }
        assert_eq!(s.board.filled_count(), 5 * BOARD_WIDTH - 9);
        assert_eq!(s.bombs, 0);
        assert!(s.piece.is_none());
    }

    #[test]
    fn lock_writes_payload_chars() {
        let mut s = state();
        let mut piece = Piece::new(Shape::Tetromino(TetrominoKind::I), "it".chars());
        piece.x = 0;
        piece.y = 19;
        s.piece = Some(piece);
        s.lock();
        let glyphs: Vec<char> = (0..4)
            .filter_map(|x| s.board.get(x, 19).and_then(|c| c.glyph()))
            .collect();
        assert_eq!(glyphs, vec!['i', 't', 't', 't']);
    }

    #[test]
    fn gravity_eventually_locks_and_respawns() {
        let mut s = state();
        s.tick([start(1, "abcd efgh")]);
        for _ in 0..BOARD_HEIGHT + 2 {
            s.tick(NO_EVENTS);
        }
        assert!(s.board.filled_count() > 0);
        assert!(s.piece.is_some());
        assert!(
            s.board
                .rows()
                .flatten()
                .filter_map(|c| c.glyph())
                .all(|g| "abcdefgh".contains(g))
        );
    }

    #[test]
    fn failed_moves_leave_piece_unchanged() {
        let mut s = state();
        s.try_spawn(Piece::new(Shape::Domino, "ab".chars()));
        while s.move_left() {}
        let before = s.piece.clone();
        assert!(!s.try_move(-1, 0));
        assert_eq!(s.piece, before);
        assert_eq!(s.piece.as_ref().unwrap().x, 0);
    }

    #[test]
    fn rotation_blocked_by_floor_is_rejected() {
        let mut s = state();
        // I piece lying flat one row above the floor cannot stand up through it.
        let mut flat = Piece::new(Shape::Tetromino(TetrominoKind::I), "abcd".chars());
        flat.x = 0;
        flat.y = (BOARD_HEIGHT - 2) as i32;
        s.piece = Some(flat.clone());
        assert!(!s.try_rotate(RotationDir::Clockwise));
        assert_eq!(s.piece, Some(flat));
    }

    #[test]
    fn ghost_lands_on_the_floor_without_moving_piece() {
        let mut s = state();
        s.try_spawn(Piece::new(Shape::Monomino, ['x']));
        let ghost = s.ghost().unwrap();
        assert_eq!(ghost.y, (BOARD_HEIGHT - 1) as i32);
        assert_eq!(s.piece.as_ref().unwrap().y, 0);
    }

    #[test]
    fn hard_drop_locks_at_ghost() {
        let mut s = state();
        s.try_spawn(Piece::new(Shape::Monomino, ['x']));
        s.hard_drop();
        assert_eq!(
            s.board.get(SPAWN_X as usize, BOARD_HEIGHT - 1).unwrap().glyph(),
            Some('x')
        );
    }

    #[test]
    fn spawn_collision_is_game_over_and_events_still_recorded() {
        let mut s = state();
        for y in 0..3 {
            s.board.set(SPAWN_X as usize, y, Cell::garbage());
            s.board.set(SPAWN_X as usize + 1, y, Cell::garbage());
        }
        s.tick([start(1, "ls")]);
        assert!(s.game_over);
        assert!(s.piece.is_none());

        s.tick([start(2, "pwd")]);
        assert!(s.runs().get(2).is_some());
        assert!(s.piece.is_none());
        assert!(!s.try_move(0, 1));

        s.tick([end(2, 1)]);
        assert!(s.runs().get(2).is_none());
    }

    #[test]
    fn duplicate_start_is_ignored() {
        let mut s = state();
        s.tick([start(1, "make"), start(1, "cargo")]);
        assert_eq!(s.runs().len(), 1);
        assert_eq!(s.runs().get(1).unwrap().identity(), "make");
    }

    #[test]
    fn unknown_end_is_ignored() {
        let mut s = state();
        s.tick([end(77, 0)]);
        assert!(s.runs().is_empty());
        assert_eq!(s.bombs, 0);
    }

    #[test]
    fn queued_bomb_spawns_before_run_output() {
        let mut s = state();
        run_command(&mut s, 1, "true", 0);
        assert_eq!(s.queue.len(), 1);
        s.piece = None;
        s.tick([start(2, "echo hi")]);
        assert!(s.piece.as_ref().unwrap().is_bomb);
        let snap = s.snapshot();
        assert!(snap.piece.unwrap().is_bomb);
        assert_eq!(snap.bombs, 1);
    }

    #[test]
    fn snapshot_reflects_state() {
        let mut s = state();
        s.tick([start(1, "htop")]);
        let snap = s.snapshot();
        assert_eq!(snap.mode, RunMode::Run);
        assert_eq!(snap.tracked_runs, 1);
        assert_eq!(snap.runs[0].identity, "htop");
        assert_eq!(snap.runs[0].emitted, 1);
        assert_eq!(snap.last_identity.as_deref(), Some("htop"));
        assert_eq!(snap.variety_meter, 0);
        let next = snap.next.as_ref().expect("run output previewed");
        assert!(!next.is_bomb);
        assert_eq!(next.cells.len(), 4);
        assert_eq!(snap.rows.len(), BOARD_HEIGHT);
        assert!(snap.piece.is_some());
        let ghost = snap.ghost.as_ref().unwrap();
        assert!(ghost.y >= snap.piece.as_ref().unwrap().y);
        let (x, y, glyph) = snap.piece.as_ref().unwrap().cells[0];
        assert_eq!(snap.piece_glyph_at(x as usize, y as usize), Some(glyph));
    }
}
