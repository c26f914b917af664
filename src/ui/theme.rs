use owo_colors::{OwoColorize, Style};
use std::sync::OnceLock;

static THEME: OnceLock<Theme> = OnceLock::new();

/// Styles by role: status lines, then graph elements
#[derive(Debug, Clone)]
pub struct Theme {
    pub title: Style,
    pub ok: Style,
    pub failure: Style,
    pub caution: Style,
    pub label: Style,
    pub faint: Style,
    pub null: Style,
    pub node: Style,
    pub relation: Style,
}

impl Theme {
    /// Follows `console`'s stdout color decision (tty, `NO_COLOR`, `CLICOLOR_FORCE`)
    pub fn detect() -> Self {
        Self::with_colors(console::colors_enabled())
    }

    pub fn with_colors(enabled: bool) -> Self {
        if !enabled {
            return Self {
                title: Style::new(),
                ok: Style::new(),
                failure: Style::new(),
                caution: Style::new(),
                label: Style::new(),
                faint: Style::new(),
                null: Style::new(),
                node: Style::new(),
                relation: Style::new(),
            };
        }
        Self {
            title: Style::new().cyan().bold(),
            ok: Style::new().green().bold(),
            failure: Style::new().red().bold(),
            caution: Style::new().yellow().bold(),
            label: Style::new().magenta(),
            faint: Style::new().white().dimmed(),
            null: Style::new().bright_black().italic(),
            node: Style::new().bold(),
            relation: Style::new().blue(),
        }
    }

    pub fn paint(&self, text: &str, style: fn(&Theme) -> &Style) -> String {
        text.style(style(self).clone()).to_string()
    }
}

pub fn theme() -> &'static Theme {
    THEME.get_or_init(Theme::detect)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_theme_leaves_text_untouched() {
        let plain = Theme::with_colors(false);
        assert_eq!(plain.paint("knows", |t| &t.relation), "knows");
        assert_eq!(plain.paint("NULL", |t| &t.null), "NULL");
    }

    #[test]
    fn test_colored_theme_emits_escapes() {
        let colored = Theme::with_colors(true);
        let painted = colored.paint("knows", |t| &t.relation);
        assert!(painted.contains("\u{1b}["));
        assert!(painted.contains("knows"));
    }
}
