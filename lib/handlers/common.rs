//! Output helpers shared by command handlers.

use crate::error::ComponentError;
use colored::Colorize;
use std::collections::BTreeMap;

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Human-readable byte count.
pub(super) fn format_size(bytes: u64) -> String {
    if bytes < 1_000 {
        format!("{} B", bytes)
    } else if bytes < 1_000_000 {
        format!("{:.1} KB", bytes as f64 / 1_000.0)
    } else {
        format!("{:.1} MB", bytes as f64 / 1_000_000.0)
    }
}

/// `1 error` / `3 errors`.
pub(super) fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("1 {}", noun)
    } else {
        format!("{} {}s", count, noun)
    }
}

/// Print per-component errors in the `error[code]: → name` style.
pub(super) fn print_component_errors(errors: &BTreeMap<String, ComponentError>) {
    for (name, error) in errors {
        println!(
            "  {}: → {}",
            format!("error[{}]", error.code()).bright_red().bold(),
            name.bold()
        );
        println!("      {} {}", "└─".dimmed(), error.to_string().dimmed());
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1_500), "1.5 KB");
        assert_eq!(format_size(2_300_000), "2.3 MB");
    }

    #[test]
    fn test_plural() {
        assert_eq!(plural(1, "error"), "1 error");
        assert_eq!(plural(0, "error"), "0 errors");
        assert_eq!(plural(2, "violation"), "2 violations");
    }
}
