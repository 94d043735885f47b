// Console logging for ubersetup.
// Level-tagged macros write to stderr so that echoed subprocess output on stdout
// stays clean. Debug messages are gated on a process-wide flag set once in `main`.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

// `log_info!` for progress: skipped packages, installed packages, stage results.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => (eprintln!("{} {}", colored::Colorize::bright_green("[INFO]"), format!($($arg)*)));
}

// `log_warn!` for things the run survives: a missing requirement file, a failed uninstall.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => (eprintln!("{} {}", colored::Colorize::bright_yellow("[WARN]"), format!($($arg)*)));
}

// `log_error!` for the failure that ends the run.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => (eprintln!("{} {}", colored::Colorize::bright_red("[ERROR]"), format!($($arg)*)));
}

// `log_debug!` only prints when `--debug` was passed.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if $crate::logger::is_debug_enabled() {
           eprintln!("{} {}", colored::Colorize::dimmed("[DEBUG]"), format!($($arg)*));
        }
    };
}

// `log_section!` prints the `=== Stage` banner that separates setup stages.
#[macro_export]
macro_rules! log_section {
    ($($arg:tt)*) => (eprintln!("{}", colored::Colorize::bold(colored::Colorize::bright_blue(format!("=== {}", format!($($arg)*)).as_str()))));
}

static DEBUG_ENABLED: OnceLock<AtomicBool> = OnceLock::new();

/// Sets the global debug flag. Called once from `main` after argument parsing.
pub fn init(debug: bool) {
    DEBUG_ENABLED
        .get_or_init(|| AtomicBool::new(debug))
        .store(debug, Ordering::Relaxed);

    log_debug!("Logger initialized in DEBUG mode");
}

/// Whether `log_debug!` output is enabled. False until `init` has run.
pub fn is_debug_enabled() -> bool {
    DEBUG_ENABLED
        .get()
        .map(|f| f.load(Ordering::Relaxed))
        .unwrap_or(false)
}
