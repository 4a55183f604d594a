//! Terminal spinner for long-running external steps.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

mod progress_style {
    pub const SPINNER_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ";
    pub const SPINNER_TEMPLATE: &str = "{spinner:.green} {msg} [{elapsed}]";
}

/// Spinner ticking in the background until finished.
///
/// `hidden` draws nothing, for quiet runs and non-interactive use.
pub fn create_spinner(message: &str, hidden: bool) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();

    if hidden {
        spinner.set_draw_target(ProgressDrawTarget::hidden());
    } else {
        match ProgressStyle::default_spinner().template(progress_style::SPINNER_TEMPLATE) {
            Ok(style) => spinner.set_style(style.tick_chars(progress_style::SPINNER_CHARS)),
            Err(e) => tracing::debug!(error = %e, "Invalid spinner template, using default"),
        }
        spinner.enable_steady_tick(Duration::from_millis(80));
    }
    spinner.set_message(message.to_string());
    spinner
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_spinner_keeps_message() {
        let spinner = create_spinner("Generating color palette...", true);
        assert!(spinner.is_hidden());
        assert_eq!(spinner.message(), "Generating color palette...");
        spinner.finish_and_clear();
    }
}
