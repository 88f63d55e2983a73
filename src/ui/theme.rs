//! Visual theme and styling.

use console::Style;

/// Styles used for terminal output.
#[derive(Debug, Clone)]
pub struct StackwireTheme {
    /// Style for success messages (green).
    pub success: Style,
    /// Style for warnings and soft failures (orange).
    pub warning: Style,
    /// Style for error messages (red bold).
    pub error: Style,
    pub highlight: Style,
    /// Style for the banner and section headings.
    pub header: Style,
    /// Style for rendered commands (dim italic).
    pub command: Style,
}

impl Default for StackwireTheme {
    fn default() -> Self {
        Self::new()
    }
}

impl StackwireTheme {
    pub fn new() -> Self {
        Self {
            success: Style::new().green(),
            warning: Style::new().color256(208),
            error: Style::new().red().bold(),
            highlight: Style::new().bold(),
            header: Style::new().bold().cyan(),
            command: Style::new().dim().italic(),
        }
    }

    /// Create a theme without colors (for non-TTY or --no-color).
    pub fn plain() -> Self {
        Self {
            success: Style::new(),
            warning: Style::new(),
            error: Style::new(),
            highlight: Style::new(),
            header: Style::new(),
            command: Style::new(),
        }
    }

    pub fn format_success(&self, msg: &str) -> String {
        format!("{}", self.success.apply_to(format!("✓ {}", msg)))
    }

    pub fn format_warning(&self, msg: &str) -> String {
        format!("{}", self.warning.apply_to(format!("⚠ {}", msg)))
    }

    pub fn format_error(&self, msg: &str) -> String {
        format!("{}", self.error.apply_to(format!("✗ {}", msg)))
    }

    /// Format a header banner.
    pub fn format_header(&self, title: &str) -> String {
        format!(
            "{} {}",
            self.header.apply_to("☁"),
            self.highlight.apply_to(title)
        )
    }

    pub fn format_heading(&self, heading: &str) -> String {
        format!("{}", self.header.apply_to(heading))
    }
}

/// Check if colors should be enabled.
pub fn should_use_colors(no_color: bool) -> bool {
    if no_color {
        return false;
    }

    // https://no-color.org/
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    console::Term::stdout().is_term()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn theme_formats_status_icons() {
        let theme = StackwireTheme::plain();
        assert_eq!(theme.format_success("Done"), "✓ Done");
        assert_eq!(theme.format_warning("Careful"), "⚠ Careful");
        assert_eq!(theme.format_error("Failed"), "✗ Failed");
    }

    #[test]
    fn theme_formats_header() {
        let theme = StackwireTheme::plain();
        let msg = theme.format_header("todo-api");
        assert!(msg.contains("todo-api"));
        assert!(msg.contains("☁"));
    }

    #[test]
    fn no_color_flag_disables_colors() {
        assert!(!should_use_colors(true));
    }

    #[test]
    fn default_impl_matches_new() {
        let default = StackwireTheme::default();
        let new = StackwireTheme::new();
        assert_eq!(default.format_success("test"), new.format_success("test"));
    }
}
