//! Waitris: a falling-block game fed by the commands you run in another pane.

mod app;
mod board;
mod effects;
mod events;
mod game;
mod input;
mod logging;
mod mode;
mod piece;
mod runs;
mod snapshot;
mod theme;
mod tokenizer;
mod ui;

use anyhow::{Context, Result};
use app::App;
use clap::{Parser, ValueEnum};
use effects::EffectsConfig;
use events::EventListener;
use game::GameState;
use std::path::PathBuf;
use tokenizer::TokenizeMode;
use tracing::info;

/// Shape seed used when `--seed` is not given.
pub const DEFAULT_SEED: u64 = 0x5741_4954;

/// Options derived from CLI that affect game behaviour (gravity, effects, tokenizing).
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub seed: u64,
    pub idle_gravity_ms: u64,
    pub run_gravity_ms: u64,
    pub effects: EffectsConfig,
    pub tokenize_mode: TokenizeMode,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            idle_gravity_ms: mode::DEFAULT_IDLE_GRAVITY_MS,
            run_gravity_ms: mode::DEFAULT_RUN_GRAVITY_MS,
            effects: EffectsConfig::default(),
            tokenize_mode: TokenizeMode::Whitespace,
        }
    }
}

impl From<&Args> for GameConfig {
    fn from(args: &Args) -> Self {
        Self {
            seed: args.seed,
            idle_gravity_ms: args.idle_gravity_ms.max(1),
            run_gravity_ms: args.run_gravity_ms.max(1),
            effects: EffectsConfig {
                bomb_cap: args.bomb_cap,
                variety_bonus: args.variety_bonus,
                infection_count: args.infection_count,
            },
            tokenize_mode: if args.quote_aware {
                TokenizeMode::QuoteAware
            } else {
                TokenizeMode::Whitespace
            },
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let log_file = args.log_file.clone().unwrap_or_else(logging::default_log_path);
    logging::init(&log_file)
        .with_context(|| format!("opening log file {}", log_file.display()))?;

    let config = GameConfig::from(&args);
    let (listener, queue) = EventListener::spawn(&args.socket)
        .with_context(|| format!("binding hook socket {}", args.socket.display()))?;
    info!(?config, socket = %listener.path().display(), "starting");
    let theme = theme::Theme::load(args.theme.as_deref(), args.palette).unwrap_or_default();
    let state = GameState::new(&config);

    let mut app = App::new(state, theme, listener, queue, args.frame_rate);
    app.run()?;
    Ok(())
}

/// Tetris-like game driven by your shell: every command you run becomes falling pieces.
#[derive(Debug, Parser)]
#[command(
    name = "waitris",
    version,
    about = "Falling-block game fed by shell commands. Each command you run turns into pieces; \
        its exit status decides what happens next.",
    long_about = "Waitris is a terminal falling-block game meant for a split pane next to your shell.\n\n\
        A shell hook reports commands over a Unix socket:\n  \
        START <id> <command...>    when a command begins\n  \
        END <id> <exit_code>       when it finishes\n\n\
        While commands run, their text is cut into chunks of up to four characters and each chunk \
        falls as a piece carrying those characters. Success grants a bomb that clears a 3x3 area; \
        failure pushes a garbage row in from the bottom and infects blocks with '?'. Switching \
        commands earns a variety bonus.\n\n\
        CONTROLS (normal):\n  Left/Right  Move    Up / X    Rotate CW   Z          Rotate CCW\n  \
        Down        Soft drop  Enter/Space Hard drop  Q / Esc   Quit\n\n\
        CONTROLS (vim):\n  h/l         Move    k or i    Rotate CW   u          Rotate CCW\n  \
        j           Soft drop  Space      Hard drop  q          Quit\n\n\
        Set RUST_LOG to adjust what is written to --log-file."
)]
pub struct Args {
    /// Unix socket the shell hook writes START/END lines to.
    #[arg(short, long, default_value = events::DEFAULT_SOCKET_PATH, value_name = "PATH")]
    pub socket: PathBuf,

    /// Seed for piece shapes, garbage holes and infection.
    #[arg(long, default_value_t = DEFAULT_SEED, value_name = "N")]
    pub seed: u64,

    /// Gravity interval in ms with no command running.
    #[arg(long, default_value_t = mode::DEFAULT_IDLE_GRAVITY_MS, value_name = "MS")]
    pub idle_gravity_ms: u64,

    /// Gravity interval in ms while a command is running.
    #[arg(long, default_value_t = mode::DEFAULT_RUN_GRAVITY_MS, value_name = "MS")]
    pub run_gravity_ms: u64,

    /// Maximum number of success bombs held at once.
    #[arg(long, default_value_t = effects::DEFAULT_BOMB_CAP, value_name = "N")]
    pub bomb_cap: u32,

    /// Points for finishing a command different from the previous one.
    #[arg(long, default_value_t = effects::DEFAULT_VARIETY_BONUS, value_name = "POINTS")]
    pub variety_bonus: u64,

    /// Blocks infected by a failed command.
    #[arg(long, default_value_t = effects::DEFAULT_INFECTION_COUNT, value_name = "N")]
    pub infection_count: usize,

    /// Keep quoted strings ("a b" or 'a b') together as one token.
    #[arg(long)]
    pub quote_aware: bool,

    /// Target render frames per second.
    #[arg(long, default_value = "30.0", value_name = "RATE")]
    pub frame_rate: f64,

    /// Path to theme file (btop-style theme[key]=\"value\"). Uses One Dark if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<PathBuf>,

    /// Colour palette: normal (theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,

    /// Diagnostics log file. Defaults to waitris.log in the temp directory.
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Palette {
    #[default]
    Normal,

    #[value(alias = "highcontrast", alias = "contrast")]
    HighContrast,

    #[value(alias = "colourblind")]
    Colorblind,
}
