//! Theme loading: btop-style `theme[key]="value"` and hex → ratatui Color.

use crate::board::CellOrigin;
use crate::piece::ShapeClass;
use ratatui::style::Color;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

const GREEN: Color = Color::from_u32(0x0098_C379);
const YELLOW: Color = Color::from_u32(0x00E5_C07B);
const RED: Color = Color::from_u32(0x00E0_6C75);
const BLUE: Color = Color::from_u32(0x0061_AFEF);
const MAGENTA: Color = Color::from_u32(0x00C6_78DD);
const CYAN: Color = Color::from_u32(0x0056_B6C2);
const GREY: Color = Color::from_u32(0x005C_6370);

/// One Dark palette and UI colours loaded from a theme file.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Command blocks by shape class: monomino, domino, triomino, tetromino.
    pub pieces: [Color; 4],
    pub garbage: Color,
    /// Infected cells (`?`).
    pub infection: Color,
    pub bomb: Color,
    /// Landing preview.
    pub ghost: Color,
    /// Playfield background.
    pub bg: Color,
    /// Grid / border.
    pub div_line: Color,
    /// Text (score, lines).
    pub main_fg: Color,
    /// Highlight / titles.
    pub title: Color,
    /// Secondary text, IDLE mode.
    pub inactive_fg: Color,
}

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

impl Default for Theme {
    fn default() -> Self {
        Self::onedark_default()
    }
}

impl Theme {
    /// Hardcoded One Dark defaults, same hex values as onedark.theme.
    pub fn onedark_default() -> Self {
        Self {
            pieces: [CYAN, GREEN, MAGENTA, BLUE],
            garbage: GREY,
            infection: RED,
            bomb: YELLOW,
            ghost: Color::from_u32(0x003F_444F),
            bg: Color::from_u32(0x0031_353F),
            div_line: Color::from_u32(0x003F_444F),
            main_fg: Color::from_u32(0x00AB_B2BF),
            title: YELLOW,
            inactive_fg: GREY,
        }
    }

    /// Load theme from a btop-style file: `theme[key]="value"` or `theme[key]='value'`.
    /// Falls back to One Dark defaults if path is None or the file is missing.
    pub fn load(path: Option<&Path>, palette: crate::Palette) -> Result<Self, ThemeError> {
        let path = match path {
            Some(p) if p.exists() => p,
            _ => return Ok(Self::default_for_palette(palette)),
        };
        let s = std::fs::read_to_string(path)?;
        let map = parse_theme_file(&s);
        let mut theme = Self::from_map(&map);
        theme.apply_palette(palette);
        Ok(theme)
    }

    fn default_for_palette(palette: crate::Palette) -> Self {
        let mut t = Self::onedark_default();
        t.apply_palette(palette);
        t
    }

    /// Override block colours for high-contrast or colorblind palettes.
    pub fn apply_palette(&mut self, palette: crate::Palette) {
        match palette {
            crate::Palette::Normal => {}
            crate::Palette::HighContrast => {
                self.pieces = [
                    Color::from_u32(0x0000_FFFF),
                    Color::from_u32(0x0000_FF00),
                    Color::from_u32(0x00FF_00FF),
                    Color::from_u32(0x0000_88FF),
                ];
                self.garbage = Color::from_u32(0x00C0_C0C0);
                self.infection = Color::from_u32(0x00FF_0000);
                self.bomb = Color::from_u32(0x00FF_FF00);
            }
            crate::Palette::Colorblind => {
                // Avoids red/green pairs.
                self.pieces = [
                    Color::from_u32(0x0000_77BB),
                    Color::from_u32(0x0000_9988),
                    Color::from_u32(0x00EE_3377),
                    Color::from_u32(0x00BB_BB00),
                ];
                self.garbage = Color::from_u32(0x00BB_BBBB);
                self.infection = Color::from_u32(0x00CC_3311);
                self.bomb = Color::from_u32(0x00EE_7733);
            }
        }
    }

    fn from_map(map: &HashMap<String, String>) -> Self {
        let get = |key: &str| {
            map.get(key)
                .and_then(|v| parse_hex(v.trim_matches('"').trim_matches('\'').trim()).ok())
        };
        let d = Self::onedark_default();
        // Keys match onedark.theme.
        Self {
            pieces: [
                get("hi_fg").or_else(|| get("proc_misc")).unwrap_or(d.pieces[0]),
                get("mem_box").or_else(|| get("cpu_start")).unwrap_or(d.pieces[1]),
                get("net_box").unwrap_or(d.pieces[2]),
                get("cpu_box").unwrap_or(d.pieces[3]),
            ],
            garbage: get("inactive_fg").unwrap_or(d.garbage),
            infection: get("cpu_end").or_else(|| get("temp_end")).unwrap_or(d.infection),
            bomb: get("cpu_mid").or_else(|| get("title")).unwrap_or(d.bomb),
            ghost: get("div_line").unwrap_or(d.ghost),
            bg: get("meter_bg").unwrap_or(d.bg),
            div_line: get("div_line").unwrap_or(d.div_line),
            main_fg: get("main_fg").unwrap_or(d.main_fg),
            title: get("title").unwrap_or(d.title),
            inactive_fg: get("inactive_fg").unwrap_or(d.inactive_fg),
        }
    }

    #[inline]
    pub fn class_color(&self, class: ShapeClass) -> Color {
        self.pieces[class.cell_count() - 1]
    }

    /// Colour of a locked cell.
    pub fn cell_color(&self, origin: CellOrigin, infected: bool) -> Color {
        if infected {
            return self.infection;
        }
        match origin {
            CellOrigin::Command(class) => self.class_color(class),
            CellOrigin::Garbage => self.garbage,
        }
    }
}

/// Parse btop-style theme file into key -> value map.
fn parse_theme_file(s: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in s.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(stripped) = line.strip_prefix("theme[") else {
            continue;
        };
        let Some(end) = stripped.find(']') else {
            continue;
        };
        let key = stripped[..end].trim();
        let rest = stripped[end + 1..].trim();
        if let Some(value) = rest.strip_prefix('=') {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            if !value.is_empty() {
                map.insert(key.to_string(), value.to_string());
            }
        }
    }
    map
}

/// Parse hex colour "#RRGGBB" or "#RGB" into ratatui Color.
pub fn parse_hex(s: &str) -> Result<Color, ThemeError> {
    let s = s.trim().trim_start_matches('#');
    let invalid = || ThemeError::InvalidHex(s.to_string());
    if !s.is_ascii() {
        return Err(invalid());
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&s[range], 16).map_err(|_| invalid())
    };
    let (r, g, b) = match s.len() {
        6 => (channel(0..2)?, channel(2..4)?, channel(4..6)?),
        3 => (channel(0..1)? * 17, channel(1..2)? * 17, channel(2..3)? * 17),
        _ => return Err(invalid()),
    };
    Ok(Color::Rgb(r, g, b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Palette;

    #[test]
    fn test_parse_hex_6() {
        let c = parse_hex("#98C379").unwrap();
        assert!(matches!(c, Color::Rgb(0x98, 0xC3, 0x79)));
    }

    #[test]
    fn test_parse_hex_3() {
        let c = parse_hex("#FFF").unwrap();
        assert!(matches!(c, Color::Rgb(255, 255, 255)));
    }

    #[test]
    fn test_parse_hex_rejects_garbage() {
        assert!(parse_hex("#12345").is_err());
        assert!(parse_hex("#GGGGGG").is_err());
        assert!(parse_hex("#ééé").is_err());
    }

    #[test]
    fn test_parse_theme_line() {
        let map = parse_theme_file(r##"theme[meter_bg]="#31353F""##);
        assert_eq!(map.get("meter_bg"), Some(&"#31353F".to_string()));
    }

    #[test]
    fn test_theme_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.theme");
        std::fs::write(&path, "# comment\ntheme[cpu_box]=\"#010203\"\ntheme[title]='#FFF'\n")
            .unwrap();
        let theme = Theme::load(Some(&path), Palette::Normal).unwrap();
        assert_eq!(theme.class_color(ShapeClass::Tetromino), Color::Rgb(1, 2, 3));
        assert_eq!(theme.title, Color::Rgb(255, 255, 255));
        assert_eq!(theme.bg, Theme::default().bg);
    }

    #[test]
    fn test_infected_cells_use_infection_colour() {
        let theme = Theme::default();
        let origin = CellOrigin::Command(ShapeClass::Domino);
        assert_eq!(theme.cell_color(origin, true), theme.infection);
        assert_eq!(theme.cell_color(origin, false), theme.pieces[1]);
        assert_eq!(theme.cell_color(CellOrigin::Garbage, false), theme.garbage);
    }
}
