//! Parses runtime build/pull output into a percentage + status stream,
//! throttled to at most one update per 100ms so a terminal consumer isn't
//! flooded by a fast-scrolling build log.

use once_cell::sync::Lazy;
use regex::Regex;
use std::time::{Duration, Instant};

const THROTTLE: Duration = Duration::from_millis(100);

static STEP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Step (\d+)/(\d+)").unwrap());
static PERCENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{1,3})%").unwrap());

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub status: String,
    pub percent: Option<u8>,
}

fn parse_line(line: &str) -> Option<ProgressUpdate> {
    if let Some(caps) = STEP_RE.captures(line) {
        let current: f64 = caps[1].parse().ok()?;
        let total: f64 = caps[2].parse().ok()?;
        let percent = if total > 0.0 {
            Some(((current / total) * 100.0).round() as u8)
        } else {
            None
        };
        return Some(ProgressUpdate {
            status: line.trim().to_string(),
            percent,
        });
    }
    if let Some(caps) = PERCENT_RE.captures(line) {
        let percent: u8 = caps[1].parse().ok()?;
        return Some(ProgressUpdate {
            status: line.trim().to_string(),
            percent: Some(percent.min(100)),
        });
    }
    if line.trim().is_empty() {
        return None;
    }
    Some(ProgressUpdate {
        status: line.trim().to_string(),
        percent: None,
    })
}

/// Consumes build/pull output line-by-line, emitting at most one update
/// per `THROTTLE` window regardless of how many lines arrive.
pub struct ProgressTracker {
    last_emit: Option<Instant>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self { last_emit: None }
    }

    /// Feeds one line of output. Returns `Some` only when the line parses
    /// to a status and the throttle window has elapsed since the last
    /// emission.
    pub fn feed(&mut self, line: &str) -> Option<ProgressUpdate> {
        let update = parse_line(line)?;
        let now = Instant::now();
        if let Some(last) = self.last_emit {
            if now.duration_since(last) < THROTTLE {
                return None;
            }
        }
        self.last_emit = Some(now);
        Some(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_step_progress() {
        let update = parse_line("Step 3/10 : RUN apt-get update").unwrap();
        assert_eq!(update.percent, Some(30));
    }

    #[test]
    fn parses_bare_percentage() {
        let update = parse_line("Downloading 42% complete").unwrap();
        assert_eq!(update.percent, Some(42));
    }

    #[test]
    fn blank_lines_produce_no_update() {
        assert!(parse_line("   ").is_none());
    }

    #[test]
    fn throttle_suppresses_rapid_successive_updates() {
        let mut tracker = ProgressTracker::new();
        assert!(tracker.feed("Step 1/5").is_some());
        assert!(tracker.feed("Step 2/5").is_none());
    }

    #[test]
    fn unrecognized_nonblank_line_is_a_plain_status() {
        let update = parse_line("Sending build context to Docker daemon").unwrap();
        assert_eq!(update.percent, None);
    }
}
