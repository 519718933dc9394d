//! Rendering: playfield and sidebar drawn from a [`Snapshot`].

use crate::board::Cell;
use crate::effects::VARIETY_THRESHOLD;
use crate::mode::RunMode;
use crate::piece::BOMB_GLYPH;
use crate::runs::RunPhase;
use crate::snapshot::{PieceView, Snapshot};
use crate::theme::Theme;
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Widget};

/// Terminal columns per well cell: the glyph and a filler column.
const CELL_WIDTH: u16 = 2;
const SIDEBAR_WIDTH: u16 = 22;
const NEXT_PREVIEW_ROWS: u16 = 4;

/// Playfield size in terminal cells, border included.
fn playfield_size(snapshot: &Snapshot) -> (u16, u16) {
    (
        snapshot.width as u16 * CELL_WIDTH + 2,
        snapshot.height as u16 + 2,
    )
}

pub fn draw(frame: &mut Frame, snapshot: &Snapshot, theme: &Theme, area: Rect) {
    let (pw, ph) = playfield_size(snapshot);
    let total_w = pw + SIDEBAR_WIDTH;

    // Center the board and sidebar as one unit.
    let x = area.x + area.width.saturating_sub(total_w) / 2;
    let y = area.y + area.height.saturating_sub(ph) / 2;
    let game_area = Rect {
        x,
        y,
        width: total_w.min(area.width),
        height: ph.min(area.height),
    };
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(pw), Constraint::Length(SIDEBAR_WIDTH)])
        .split(game_area);

    draw_playfield(frame, snapshot, theme, chunks[0]);
    draw_sidebar(frame, snapshot, theme, chunks[1]);
    if snapshot.game_over {
        draw_game_over(frame, snapshot, theme, chunks[0]);
    }
}

fn mode_style(mode: RunMode, theme: &Theme) -> Style {
    match mode {
        RunMode::Idle => Style::default().fg(theme.inactive_fg),
        RunMode::Run => Style::default()
            .fg(theme.title)
            .add_modifier(Modifier::BOLD),
    }
}

fn piece_color(piece: &PieceView, theme: &Theme) -> Color {
    if piece.is_bomb {
        theme.bomb
    } else {
        theme.class_color(piece.shape.class())
    }
}

fn draw_playfield(frame: &mut Frame, snapshot: &Snapshot, theme: &Theme, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" Waitris ", Style::default().fg(theme.title)),
        Span::styled(format!("{} ", snapshot.mode), mode_style(snapshot.mode, theme)),
    ]);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
        .title(title);
    let inner = block.inner(area);
    block.render(area, frame.buffer_mut());

    let piece_bg = snapshot.piece.as_ref().map(|p| piece_color(p, theme));
    let buf = frame.buffer_mut();
    for (y, row) in snapshot.rows.iter().enumerate() {
        let ry = inner.y + y as u16;
        if ry >= inner.y + inner.height {
            break;
        }
        for (x, cell) in row.iter().enumerate() {
            let rx = inner.x + x as u16 * CELL_WIDTH;
            if rx + 1 >= inner.x + inner.width {
                break;
            }
            let (glyph, style) = if let (Some(glyph), Some(bg)) =
                (snapshot.piece_glyph_at(x, y), piece_bg)
            {
                (glyph, Style::default().fg(theme.bg).bg(bg))
            } else {
                match cell {
                    Cell::Filled(block) => (
                        block.glyph,
                        Style::default()
                            .fg(theme.bg)
                            .bg(theme.cell_color(block.origin, block.infected)),
                    ),
                    Cell::Empty if snapshot.ghost_covers(x, y) => {
                        ('░', Style::default().fg(theme.ghost).bg(theme.bg))
                    }
                    Cell::Empty => (' ', Style::default().bg(theme.bg)),
                }
            };
            let filler = if glyph == '░' { '░' } else { ' ' };
            buf[(rx, ry)].set_char(glyph).set_style(style);
            buf[(rx + 1, ry)].set_char(filler).set_style(style);
        }
    }
}

fn draw_sidebar(frame: &mut Frame, snapshot: &Snapshot, theme: &Theme, area: Rect) {
    let title_style = Style::default().fg(theme.title);
    let fg_style = Style::default().fg(theme.main_fg);
    let border_style = Style::default().fg(theme.div_line).bg(theme.bg);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(NEXT_PREVIEW_ROWS + 3), // Next (border + title + preview)
            Constraint::Length(1),                     // gap
            Constraint::Length(9),                     // Stats
            Constraint::Length(1),                     // gap
            Constraint::Min(3),                        // Runs
        ])
        .split(area);

    // --- Next (own border) ---
    let next_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style);
    let next_inner = next_block.inner(chunks[0]);
    next_block.render(chunks[0], frame.buffer_mut());
    let next_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(NEXT_PREVIEW_ROWS)])
        .split(next_inner);
    Paragraph::new(Line::from(Span::styled("Next", title_style)))
        .render(next_layout[0], frame.buffer_mut());
    if let Some(next) = &snapshot.next {
        draw_piece_preview(frame, next, theme, next_layout[1]);
    }

    // --- Stats (own border) ---
    let stats_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style);
    let stats_inner = stats_block.inner(chunks[2]);
    stats_block.render(chunks[2], frame.buffer_mut());
    let stat = |label: &'static str, value: String| {
        Line::from(vec![
            Span::styled(label, title_style),
            Span::styled(value, fg_style),
        ])
    };
    let bombs = format!(
        "{}{}",
        BOMB_GLYPH.to_string().repeat(snapshot.bombs as usize),
        "·".repeat(snapshot.bomb_cap.saturating_sub(snapshot.bombs) as usize)
    );
    let stats_lines = vec![
        stat("Score: ", snapshot.score.to_string()),
        stat("Lines: ", snapshot.lines_cleared.to_string()),
        Line::from(vec![
            Span::styled("Mode:  ", title_style),
            Span::styled(snapshot.mode.to_string(), mode_style(snapshot.mode, theme)),
        ]),
        Line::from(vec![
            Span::styled("Bombs: ", title_style),
            Span::styled(bombs, Style::default().fg(theme.bomb)),
        ]),
        Line::from(vec![
            Span::styled("Meter: ", title_style),
            Span::styled(variety_gauge(snapshot.variety_meter), fg_style),
        ]),
        stat("Runs:  ", snapshot.tracked_runs.to_string()),
        stat(
            "Last:  ",
            snapshot.last_identity.clone().unwrap_or_else(|| "-".into()),
        ),
    ];
    Paragraph::new(stats_lines).render(stats_inner, frame.buffer_mut());

    // --- Runs (own border) ---
    let runs_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(Span::styled("Commands", title_style));
    let runs_inner = runs_block.inner(chunks[4]);
    runs_block.render(chunks[4], frame.buffer_mut());
    let run_lines: Vec<Line> = snapshot
        .runs
        .iter()
        .map(|run| {
            let phase_style = match run.phase {
                RunPhase::Completing => Style::default().fg(theme.inactive_fg),
                _ => Style::default().fg(theme.bomb),
            };
            let phase = match run.phase {
                RunPhase::Cycling => format!(" x{}", run.cycle + 1),
                phase => format!(" {phase}"),
            };
            Line::from(vec![
                Span::styled(run.identity.clone(), fg_style),
                Span::styled(phase, phase_style),
            ])
        })
        .collect();
    Paragraph::new(run_lines).render(runs_inner, frame.buffer_mut());
}

/// Ten-step bar for the variety meter.
fn variety_gauge(meter: u32) -> String {
    let filled = (meter.min(VARIETY_THRESHOLD) * 10 / VARIETY_THRESHOLD) as usize;
    format!("{}{}", "▮".repeat(filled), "▯".repeat(10 - filled))
}

/// Draw a piece centred in `area`, rotation and payload as shown in the well.
fn draw_piece_preview(frame: &mut Frame, piece: &PieceView, theme: &Theme, area: Rect) {
    let Some(min_x) = piece.cells.iter().map(|c| c.0).min() else {
        return;
    };
    let min_y = piece.cells.iter().map(|c| c.1).min().unwrap_or(0);
    let max_x = piece.cells.iter().map(|c| c.0).max().unwrap_or(min_x);
    let max_y = piece.cells.iter().map(|c| c.1).max().unwrap_or(min_y);
    let bw = (max_x - min_x + 1) as u16 * CELL_WIDTH;
    let bh = (max_y - min_y + 1) as u16;
    let off_x = area.width.saturating_sub(bw) / 2;
    let off_y = area.height.saturating_sub(bh) / 2;

    let style = Style::default().fg(theme.bg).bg(piece_color(piece, theme));
    let buf = frame.buffer_mut();
    for &(x, y, glyph) in &piece.cells {
        let rx = area.x + off_x + (x - min_x) as u16 * CELL_WIDTH;
        let ry = area.y + off_y + (y - min_y) as u16;
        if rx + 1 < area.x + area.width && ry < area.y + area.height {
            buf[(rx, ry)].set_char(glyph).set_style(style);
            buf[(rx + 1, ry)].set_char(' ').set_style(style);
        }
    }
}

fn draw_game_over(frame: &mut Frame, snapshot: &Snapshot, theme: &Theme, area: Rect) {
    let pw = area.width.min(18);
    let ph = 7;
    let popup = Rect {
        x: area.x + area.width.saturating_sub(pw) / 2,
        y: area.y + area.height.saturating_sub(ph) / 2,
        width: pw,
        height: ph.min(area.height),
    };
    let lines = vec![
        Line::from(Span::styled(
            " Game Over ",
            Style::default()
                .fg(Color::White)
                .bg(Color::Red)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(
            format!(" Score: {} ", snapshot.score),
            Style::default().fg(theme.main_fg),
        )),
        Line::from(Span::styled(
            format!(" Lines: {} ", snapshot.lines_cleared),
            Style::default().fg(theme.main_fg),
        )),
        Line::from(Span::styled(" Q — Quit ", Style::default().fg(theme.main_fg))),
    ];
    let p = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .style(Style::default().bg(theme.bg))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
        );
    p.render(popup, frame.buffer_mut());
}
