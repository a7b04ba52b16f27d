// UI and formatting module

pub mod formatters;
pub mod messages;

// Re-export commonly used items for cleaner imports
pub use formatters::{colorize_percent, colorize_status, print_status, print_targets, summary_line};
pub use messages::{dimmed, error, info, success, warn};
