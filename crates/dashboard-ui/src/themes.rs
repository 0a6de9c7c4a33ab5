use ratatui::style::{Color, Modifier, Style};

/// Terminal background type detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackgroundType {
    Dark,
    Light,
    Unknown,
}

/// Detect terminal background type from the `COLORFGBG` environment variable.
///
/// The variable has the format `"foreground;background"`. Background values
/// 0–6 are considered dark; 7–15 are considered light. If the variable is
/// absent or unparseable, `BackgroundType::Dark` is returned.
pub fn detect_background() -> BackgroundType {
    if let Ok(val) = std::env::var("COLORFGBG") {
        if let Some(bg) = val.split(';').next_back() {
            if let Ok(bg_num) = bg.parse::<u8>() {
                return if bg_num <= 6 {
                    BackgroundType::Dark
                } else {
                    BackgroundType::Light
                };
            }
        }
    }
    BackgroundType::Dark
}

/// Every style used by the dashboard views.
#[derive(Debug, Clone)]
pub struct Theme {
    // ── Header ───────────────────────────────────────────────────────────────
    pub header: Style,
    pub header_sparkle: Style,
    pub separator: Style,

    // ── Text ─────────────────────────────────────────────────────────────────
    pub text: Style,
    pub dim: Style,
    pub bold: Style,
    pub label: Style,
    pub value: Style,

    // ── Status ───────────────────────────────────────────────────────────────
    pub info: Style,
    pub success: Style,
    pub warning: Style,
    pub error: Style,

    // ── Table ────────────────────────────────────────────────────────────────
    pub table_header: Style,
    /// Header cell under the column cursor.
    pub table_header_active: Style,
    pub table_border: Style,
    pub table_row: Style,
    pub table_row_alt: Style,
    /// Highlighted row or list entry.
    pub selected: Style,

    // ── Input ────────────────────────────────────────────────────────────────
    /// The search prompt while it has focus.
    pub input_active: Style,
    pub key_hint: Style,

    // ── Leaderboard ──────────────────────────────────────────────────────────
    pub rank_first: Style,
    pub rank_second: Style,
    pub rank_third: Style,
}

/// The handful of colours a theme is derived from.
#[derive(Debug, Clone, Copy)]
struct Palette {
    accent: Color,
    sparkle: Color,
    fg: Color,
    fg_alt: Color,
    muted: Color,
    /// Background of selected rows and the active header cell.
    highlight: Color,
    /// Foreground drawn on top of `highlight`.
    on_highlight: Color,
    medals: [Color; 3],
    /// Basic terminals get no bold text and reverse video for selection.
    plain: bool,
}

impl Theme {
    fn from_palette(p: Palette) -> Self {
        let emphasis = |style: Style| {
            if p.plain {
                style
            } else {
                style.add_modifier(Modifier::BOLD)
            }
        };
        let filled = |bg: Color| {
            if p.plain {
                Style::default().add_modifier(Modifier::REVERSED)
            } else {
                emphasis(Style::default().fg(p.on_highlight).bg(bg))
            }
        };
        let fg = |c: Color| Style::default().fg(c);

        Self {
            header: emphasis(fg(p.accent)),
            header_sparkle: fg(p.sparkle),
            separator: fg(p.muted),

            text: fg(p.fg),
            dim: fg(p.muted),
            bold: emphasis(fg(p.fg)),
            label: fg(p.fg_alt),
            value: emphasis(fg(p.fg)),

            info: fg(p.accent),
            success: fg(Color::Green),
            warning: fg(Color::Yellow),
            error: fg(Color::Red),

            table_header: emphasis(fg(p.accent)),
            table_header_active: if p.plain {
                fg(p.accent).add_modifier(Modifier::REVERSED)
            } else {
                emphasis(Style::default().fg(p.on_highlight).bg(p.accent))
            },
            table_border: fg(p.muted),
            table_row: fg(p.fg),
            table_row_alt: fg(p.fg_alt),
            selected: filled(p.highlight),

            input_active: emphasis(fg(p.highlight)),
            key_hint: fg(p.muted),

            rank_first: emphasis(fg(p.medals[0])),
            rank_second: fg(p.medals[1]),
            rank_third: fg(p.medals[2]),
        }
    }

    // ── Constructors ─────────────────────────────────────────────────────────

    /// Dark-background terminal theme (default).
    pub fn dark() -> Self {
        Self::from_palette(Palette {
            accent: Color::Cyan,
            sparkle: Color::Yellow,
            fg: Color::White,
            fg_alt: Color::Gray,
            muted: Color::DarkGray,
            highlight: Color::Yellow,
            on_highlight: Color::Black,
            medals: [Color::Yellow, Color::White, Color::LightRed],
            plain: false,
        })
    }

    /// Light-background terminal theme.
    ///
    /// Dark text with saturated accents so content stays legible on a
    /// white or light-grey canvas.
    pub fn light() -> Self {
        Self::from_palette(Palette {
            accent: Color::Blue,
            sparkle: Color::Magenta,
            fg: Color::Black,
            fg_alt: Color::DarkGray,
            muted: Color::Gray,
            highlight: Color::Magenta,
            on_highlight: Color::White,
            medals: [Color::Magenta, Color::Blue, Color::Red],
            plain: false,
        })
    }

    /// Classic theme using only the basic 8-colour ANSI palette, without
    /// bold text or background fills.
    pub fn classic() -> Self {
        Self::from_palette(Palette {
            accent: Color::Cyan,
            sparkle: Color::White,
            fg: Color::White,
            fg_alt: Color::Gray,
            muted: Color::DarkGray,
            highlight: Color::Yellow,
            on_highlight: Color::Black,
            medals: [Color::Yellow, Color::White, Color::Red],
            plain: true,
        })
    }

    /// Choose a theme automatically based on the detected terminal background.
    pub fn auto_detect() -> Self {
        match detect_background() {
            BackgroundType::Light => Self::light(),
            _ => Self::dark(),
        }
    }

    /// Construct a theme by name. Falls back to `auto_detect` for unknown
    /// names.
    pub fn from_name(name: &str) -> Self {
        match name {
            "light" => Self::light(),
            "dark" => Self::dark(),
            "classic" => Self::classic(),
            _ => Self::auto_detect(),
        }
    }

    // ── Style helpers ────────────────────────────────────────────────────────

    /// Zebra striping for data rows.
    pub fn row_style(&self, index: usize) -> Style {
        if index % 2 == 0 {
            self.table_row
        } else {
            self.table_row_alt
        }
    }

    /// Medal colour for a 1-based leaderboard position.
    pub fn rank_style(&self, rank: usize) -> Style {
        match rank {
            1 => self.rank_first,
            2 => self.rank_second,
            3 => self.rank_third,
            _ => self.text,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
