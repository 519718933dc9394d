//! App: terminal init, main loop, tick and key handling.

use crate::events::{EventListener, EventQueue};
use crate::game::GameState;
use crate::input::{Action, key_to_action};
use crate::piece::RotationDir;
use crate::theme::Theme;
use anyhow::Result;
use crossterm::event::{self, Event, KeyEventKind};
use ratatui::DefaultTerminal;
use std::time::{Duration, Instant};
use tracing::info;

/// DAS (Delayed Auto-Shift): delay before movement starts repeating when you hold a key.
const REPEAT_DELAY_MS: u64 = 170;
/// ARR (Auto-Repeat Rate): time between repeated moves while holding.
const REPEAT_INTERVAL_MS: u64 = 50;

pub struct App {
    theme: Theme,
    state: GameState,
    queue: EventQueue,
    /// Held for its Drop: removes the socket file on exit.
    _listener: EventListener,
    frame_duration: Duration,
    last_tick: Instant,
    /// Action being auto-repeated and when its key went down.
    repeat_state: Option<(Action, Instant)>,
    last_repeat_fire: Option<Instant>,
    /// Terminal reports key releases; otherwise OS key repeat is used as is.
    release_events: bool,
}

impl App {
    pub fn new(
        state: GameState,
        theme: Theme,
        listener: EventListener,
        queue: EventQueue,
        frame_rate: f64,
    ) -> Self {
        Self {
            theme,
            state,
            queue,
            _listener: listener,
            frame_duration: Duration::from_secs_f64(1.0 / frame_rate.max(1.0)),
            last_tick: Instant::now(),
            repeat_state: None,
            last_repeat_fire: None,
            release_events: false,
        }
    }

    fn apply_action(&mut self, action: Action) {
        match action {
            Action::MoveLeft => {
                self.state.move_left();
            }
            Action::MoveRight => {
                self.state.move_right();
            }
            Action::RotateCw => {
                self.state.try_rotate(RotationDir::Clockwise);
            }
            Action::RotateCcw => {
                self.state.try_rotate(RotationDir::CounterClockwise);
            }
            Action::SoftDrop => self.state.soft_drop(),
            Action::HardDrop => {
                self.state.hard_drop();
                self.repeat_state = None;
            }
            Action::Quit | Action::None => {}
        }
    }

    fn tick_repeat(&mut self) {
        let Some((action, first)) = self.repeat_state else {
            return;
        };
        if !matches!(action, Action::MoveLeft | Action::MoveRight | Action::SoftDrop) {
            return;
        }
        if first.elapsed() < Duration::from_millis(REPEAT_DELAY_MS) {
            return;
        }
        let now = Instant::now();
        let next =
            self.last_repeat_fire.unwrap_or(first) + Duration::from_millis(REPEAT_INTERVAL_MS);
        if now >= next {
            self.apply_action(action);
            self.last_repeat_fire = Some(now);
        }
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            event::{
                KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
                PushKeyboardEnhancementFlags,
            },
            execute,
            terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen)?;

        // Release events, where the terminal supports them, end key repeat.
        self.release_events = crossterm::terminal::supports_keyboard_enhancement()
            .unwrap_or(false)
            && execute!(
                stdout,
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )
            .is_ok();

        let mut terminal =
            ratatui::DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;

        let result = self.run_loop(&mut terminal);

        if self.release_events {
            let _ = execute!(std::io::stdout(), PopKeyboardEnhancementFlags);
        }
        execute!(std::io::stdout(), LeaveAlternateScreen)?;
        disable_raw_mode()?;

        info!(
            score = self.state.score,
            lines = self.state.lines_cleared,
            "session ended"
        );
        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        loop {
            let now = Instant::now();
            let snapshot = self.state.snapshot();
            terminal.draw(|f| crate::ui::draw(f, &snapshot, &self.theme, f.area()))?;

            if self.last_tick.elapsed() >= self.state.gravity_interval() {
                self.state.tick(self.queue.drain());
                self.last_tick = Instant::now();
            }

            let timeout = self.frame_duration.saturating_sub(now.elapsed());
            if event::poll(timeout)? {
                while event::poll(Duration::ZERO)? {
                    let Event::Key(key) = event::read()? else {
                        continue;
                    };
                    let action = key_to_action(key);
                    if key.kind != KeyEventKind::Press {
                        if key.kind == KeyEventKind::Release
                            && self.repeat_state.map(|(a, _)| a) == Some(action)
                        {
                            self.repeat_state = None;
                            self.last_repeat_fire = None;
                        }
                        continue;
                    }
                    if action == Action::Quit {
                        return Ok(());
                    }
                    // Already repeating this one ourselves; ignore OS repeats.
                    if self.repeat_state.map(|(a, _)| a) == Some(action) {
                        continue;
                    }
                    self.apply_action(action);
                    self.repeat_state = match action {
                        Action::MoveLeft | Action::MoveRight | Action::SoftDrop
                            if self.release_events =>
                        {
                            Some((action, Instant::now()))
                        }
                        _ => None,
                    };
                    self.last_repeat_fire = None;
                }
            }
            self.tick_repeat();
        }
    }
}
