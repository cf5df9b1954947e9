//! Human-readable context for driver compile logs.
//!
//! Driver log formats differ; locating the failing line is best effort. Logs
//! may list warnings before the error, so lines mentioning an error are
//! searched first. When no known pattern matches, callers still get the raw
//! log and the full line-numbered source, just no context window.

use std::sync::LazyLock;

use regex::Regex;

use super::error::ErrorContext;

/// Lines shown on each side of the offending line.
pub const CONTEXT_RADIUS: usize = 2;

/// Mesa: `0:12(5): error: ...` (string:line(column)).
static MESA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d+:(\d+)\((\d+)\)").expect("valid regex"));

/// ANGLE / glslang / WebGL: `ERROR: 0:12: ...` (string:line).
static GLSLANG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\berror:\s*\d+:(\d+)").expect("valid regex"));

/// NVIDIA: `0(12) : error C0000: ...` (string(line)).
static NVIDIA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d+\((\d+)\)\s*:\s*error").expect("valid regex"));

/// Returns `source` with right-aligned 1-based line numbers.
pub fn annotate_source(source: &str) -> String {
    let count = source.lines().count().max(1);
    let width = count.to_string().len();
    source
        .lines()
        .enumerate()
        .map(|(i, line)| format!("{:>width$} | {line}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Extracts `(line, column)` from the first recognised driver error reference.
///
/// Falls back to the first reference of any kind when no error line carries
/// one.
pub fn parse_error_location(log: &str) -> Option<(usize, Option<usize>)> {
    log.lines()
        .filter(|line| line.to_ascii_lowercase().contains("error"))
        .find_map(parse_log_line)
        .or_else(|| log.lines().find_map(parse_log_line))
}

fn parse_log_line(line: &str) -> Option<(usize, Option<usize>)> {
    if let Some(c) = MESA.captures(line) {
        return Some((c[1].parse().ok()?, c[2].parse().ok()));
    }
    [&*GLSLANG, &*NVIDIA]
        .into_iter()
        .find_map(|pattern| pattern.captures(line))
        .and_then(|c| Some((c[1].parse().ok()?, None)))
}

/// Builds the ±[`CONTEXT_RADIUS`] window around `line`, marking it with `>>`.
///
/// Returns `None` when `line` is outside the source.
pub fn context_window(source: &str, line: usize) -> Option<String> {
    let lines: Vec<&str> = source.lines().collect();
    if line == 0 || line > lines.len() {
        return None;
    }
    let first = line.saturating_sub(CONTEXT_RADIUS).max(1);
    let last = (line + CONTEXT_RADIUS).min(lines.len());
    let width = last.to_string().len();

    let window = (first..=last)
        .map(|n| {
            let marker = if n == line { ">>" } else { "  " };
            format!("{marker} {n:>width$} | {}", lines[n - 1])
        })
        .collect::<Vec<_>>()
        .join("\n");
    Some(window)
}

/// Locates the error named in `log` inside `source`.
pub fn locate(source: &str, log: &str) -> Option<ErrorContext> {
    let (line, column) = parse_error_location(log)?;
    let window = context_window(source, line)?;
    Some(ErrorContext { line, column, window })
}
