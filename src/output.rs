use std::io::{BufRead, Write};

use crossterm::style::Stylize;

const HEADER_WIDTH: usize = 70;

pub fn header(text: &str) {
    let rule = "=".repeat(HEADER_WIDTH);
    println!();
    println!("{}", rule.as_str().blue().bold());
    println!("{}", format!("{text:^width$}", width = HEADER_WIDTH).blue().bold());
    println!("{}", rule.as_str().blue().bold());
    println!();
}

pub fn success(text: &str) {
    println!("{}", format!("✓ {text}").green());
}

pub fn error(text: &str) {
    println!("{}", format!("✗ {text}").red());
}

pub fn warning(text: &str) {
    println!("{}", format!("⚠ {text}").yellow());
}

pub fn info(text: &str) {
    println!("{}", format!("ℹ {text}").blue());
}

/// Asks for a literal `yes` on stdin.
pub fn confirm(prompt: &str) -> std::io::Result<bool> {
    print!("{prompt} (yes/no): ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("yes")
}
