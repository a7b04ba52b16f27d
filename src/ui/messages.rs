// Console messages for command results

use colored::Colorize;

pub fn warn(message: &str) {
    println!("{}", format!("Warning: {}", message).yellow().bold());
}

pub fn info(message: &str) {
    println!("{}", message.cyan());
}

pub fn success(message: &str) {
    println!("{}", message.green().bold());
}

/// Errors go to stderr so `--json` output stays clean
pub fn error(message: &str) {
    eprintln!("{}", message.red().bold());
}

pub fn dimmed(message: &str) {
    println!("{}", message.dimmed());
}
