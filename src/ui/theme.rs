use owo_colors::Style;
use std::ffi::OsStr;
use std::sync::OnceLock;

static THEME: OnceLock<Theme> = OnceLock::new();

/// Styles for each role a line of CLI output can play
#[derive(Debug, Clone)]
pub struct Theme {
    /// Run headers, section and phase titles
    pub heading: Style,
    pub ok: Style,
    pub failure: Style,
    pub warning: Style,
    /// Leading icons of info and phase lines
    pub accent: Style,
    /// Left-hand labels in summaries
    pub label: Style,
    /// Parenthesized reasons after skipped paths
    pub note: Style,
    /// Counts and paths in summaries
    pub figure: Style,
}

impl Theme {
    pub fn detect() -> Self {
        let no_color = std::env::var_os("NO_COLOR");
        if use_color(no_color.as_deref(), console::Term::stdout().is_term()) {
            Self::colored()
        } else {
            Self::plain()
        }
    }

    pub fn colored() -> Self {
        Self {
            heading: Style::new().cyan().bold(),
            ok: Style::new().green().bold(),
            failure: Style::new().red().bold(),
            warning: Style::new().yellow().bold(),
            accent: Style::new().magenta(),
            label: Style::new().white().dimmed(),
            note: Style::new().bright_black(),
            figure: Style::new().bold(),
        }
    }

    pub fn plain() -> Self {
        let none = Style::new();
        Self {
            heading: none.clone(),
            ok: none.clone(),
            failure: none.clone(),
            warning: none.clone(),
            accent: none.clone(),
            label: none.clone(),
            note: none.clone(),
            figure: none,
        }
    }
}

/// Color only on a terminal, and never when `NO_COLOR` is set to anything non-empty
fn use_color(no_color: Option<&OsStr>, is_term: bool) -> bool {
    let disabled = no_color.is_some_and(|v| !v.is_empty());
    is_term && !disabled
}

pub fn theme() -> &'static Theme {
    THEME.get_or_init(Theme::detect)
}
