//! Terminal styling.
//!
//! Colors are applied only when stdout supports them, so piped output and
//! `NO_COLOR` environments get plain text.

use owo_colors::{OwoColorize, Stream, Style};

fn paint<T: std::fmt::Display>(value: &T, style: Style) -> String {
    value
        .if_supports_color(Stream::Stdout, |text| text.style(style))
        .to_string()
}

/// Semantic styles for CLI output.
pub trait SemanticStyle {
    fn success(&self) -> String;
    fn error(&self) -> String;
    fn warning(&self) -> String;
    fn muted(&self) -> String;
    fn header(&self) -> String;
    fn code(&self) -> String;
}

impl<T: std::fmt::Display> SemanticStyle for T {
    fn success(&self) -> String {
        paint(self, Style::new().green().bold())
    }

    fn error(&self) -> String {
        paint(self, Style::new().red().bold())
    }

    fn warning(&self) -> String {
        paint(self, Style::new().yellow())
    }

    fn muted(&self) -> String {
        paint(self, Style::new().dimmed())
    }

    fn header(&self) -> String {
        paint(self, Style::new().bold())
    }

    fn code(&self) -> String {
        paint(self, Style::new().blue())
    }
}

/// Prints a success message with a checkmark.
pub fn print_success(msg: &str) {
    println!("{} {}", "✓".success(), msg);
}

/// Prints an error message with an X mark.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".error(), msg);
}

/// Prints a labeled key-value pair with proper indentation.
pub fn print_labeled(key: &str, value: &str) {
    println!("  {}: {}", key.muted(), value);
}
