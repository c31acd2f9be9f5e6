//! Logging with colored module prefixes.
//!
//! # Example
//!
//! ```ignore
//! log!("tree"; "found {} markdown files", count);
//! log!("error"; "{err:#}");
//! ```
//!
//! Quiet mode (`--quiet`) suppresses everything except the `error` module.

use colored::{ColoredString, Colorize};
use std::sync::atomic::{AtomicBool, Ordering};

static QUIET: AtomicBool = AtomicBool::new(false);

/// Suppress non-error output.
pub fn set_quiet(quiet: bool) {
    QUIET.store(quiet, Ordering::Relaxed);
}

/// Log a message with a colored module prefix.
///
/// # Usage
/// ```ignore
/// log!("module"; "message with {} formatting", args);
/// ```
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

/// Log a message with a colored module prefix.
pub fn log(module: &str, message: &str) {
    let module_lower = module.to_ascii_lowercase();
    if QUIET.load(Ordering::Relaxed) && module_lower != "error" {
        return;
    }
    println!("{} {message}", colorize_prefix(module, &module_lower));
}

/// Apply color to a module prefix based on module type.
#[inline]
fn colorize_prefix(module: &str, module_lower: &str) -> ColoredString {
    let prefix = format!("[{module}]");
    match module_lower {
        "error" => prefix.bright_red().bold(),
        "warn" => prefix.bright_magenta().bold(),
        "convert" => prefix.bright_green().bold(),
        _ => prefix.bright_yellow().bold(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_is_bracketed() {
        let prefix = colorize_prefix("tree", "tree");
        assert!(prefix.to_string().contains("[tree]"));
    }
}
