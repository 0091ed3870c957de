//! Schedule specification parsing and rendering
//!
//! Run times are configured either as raw 5-field cron lines or as short
//! human phrases like `mon,fri 19:30` and `daily 08:00`. Both forms
//! normalize to cron lines an external scheduler consumes; canonical lines
//! also render back into the human form for display.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Errors
// ============================================================================

/// Validation failure naming the offending input line
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Invalid schedule: {line}")]
    InvalidLine { line: String },
}

impl ScheduleError {
    pub fn invalid(line: impl Into<String>) -> Self {
        Self::InvalidLine { line: line.into() }
    }
}

// ============================================================================
// Day tokens
// ============================================================================

/// Display names indexed by day code (0 = Sunday)
const DAY_NAMES: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

/// Map a day selector token to its numeric code
///
/// Accepts names, common abbreviations and bare digits; `7` is not a valid
/// bare digit even though the display parser folds it to Sunday.
fn day_code(token: &str) -> Option<u8> {
    match token {
        "sun" | "sunday" => Some(0),
        "mon" | "monday" => Some(1),
        "tue" | "tues" | "tuesday" => Some(2),
        "wed" | "weds" | "wednesday" => Some(3),
        "thu" | "thur" | "thurs" | "thursday" => Some(4),
        "fri" | "friday" => Some(5),
        "sat" | "saturday" => Some(6),
        _ => token.parse::<u8>().ok().filter(|d| *d <= 6),
    }
}

/// Parse a time token of the form `H:MM` or `H.MM`
fn parse_time(token: &str) -> Option<(u8, u8)> {
    let (hour, minute) = token.split_once(':').or_else(|| token.split_once('.'))?;
    let hour: u8 = hour.parse().ok()?;
    let minute: u8 = minute.parse().ok()?;
    (hour <= 23 && minute <= 59).then_some((hour, minute))
}

// ============================================================================
// Schedule entry
// ============================================================================

/// One displayable schedule line in canonical 5-field form
///
/// Day-of-month and month are always wildcard for entries; lines where they
/// are not stay opaque at the [`ScheduleLine`] level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    /// Minute of the hour (0-59)
    pub minute: u8,
    /// Hour of the day (0-23)
    pub hour: u8,
    /// Day-of-week field: `*`, a comma list, or ranges (0 = Sunday)
    pub dow: String,
}

impl ScheduleEntry {
    /// Canonical cron rendering
    pub fn to_cron(&self) -> String {
        format!("{} {} * * {}", self.minute, self.hour, self.dow)
    }

    /// Parse a canonical 5-field line into an entry
    ///
    /// Returns `None` for anything that should stay opaque: non-wildcard
    /// day-of-month or month, out-of-range times, day fields the display
    /// parser cannot expand.
    pub fn from_cron(line: &str) -> Option<Self> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 5 {
            return None;
        }
        let minute: u8 = fields[0].parse().ok().filter(|m| *m <= 59)?;
        let hour: u8 = fields[1].parse().ok().filter(|h| *h <= 23)?;
        if fields[2] != "*" || fields[3] != "*" {
            return None;
        }
        expand_dow(fields[4])?;
        Some(Self {
            minute,
            hour,
            dow: fields[4].to_string(),
        })
    }

    /// Expanded day codes in first-seen order; empty for `*`
    pub fn days(&self) -> Vec<u8> {
        if self.dow == "*" {
            return Vec::new();
        }
        expand_dow(&self.dow).unwrap_or_default()
    }

    /// Human rendering: a bare time for every-day entries, otherwise
    /// `day1,day2 HH:MM`
    pub fn display(&self) -> String {
        let time = format!("{:02}:{:02}", self.hour, self.minute);
        let days = self.days();
        if days.is_empty() || days.len() == 7 {
            return time;
        }
        let names: Vec<&str> = days.iter().map(|d| DAY_NAMES[*d as usize]).collect();
        format!("{} {}", names.join(","), time)
    }
}

/// Expand a day-of-week field into codes, preserving first-seen order
///
/// Accepts `*`, comma lists and ranges; `7` folds to Sunday and a range
/// whose start exceeds its end wraps through the weekend.
fn expand_dow(field: &str) -> Option<Vec<u8>> {
    if field == "*" {
        return Some((0..=6).collect());
    }
    let mut days: Vec<u8> = Vec::new();
    let mut push = |day: u8| {
        if !days.contains(&day) {
            days.push(day);
        }
    };

    for part in field.split(',') {
        let part = part.trim();
        if part.is_empty() {
            return None;
        }
        if let Some((start, end)) = part.split_once('-') {
            let start = fold_sunday(start.parse().ok()?)?;
            let end = fold_sunday(end.parse().ok()?)?;
            if start <= end {
                (start..=end).for_each(&mut push);
            } else {
                (start..=6).for_each(&mut push);
                (0..=end).for_each(&mut push);
            }
        } else {
            push(fold_sunday(part.parse().ok()?)?);
        }
    }
    Some(days)
}

fn fold_sunday(day: u8) -> Option<u8> {
    match day {
        7 => Some(0),
        d if d <= 6 => Some(d),
        _ => None,
    }
}

// ============================================================================
// Schedule lines and spec
// ============================================================================

/// One line of a schedule specification
///
/// `raw` is the exact cron text handed to the external scheduler; passthrough
/// lines keep their input bytes and are never reformatted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleLine {
    raw: String,
    entry: Option<ScheduleEntry>,
}

impl ScheduleLine {
    fn from_raw(line: &str) -> Self {
        Self {
            raw: line.to_string(),
            entry: ScheduleEntry::from_cron(line),
        }
    }

    fn from_entry(entry: ScheduleEntry) -> Self {
        Self {
            raw: entry.to_cron(),
            entry: Some(entry),
        }
    }

    /// Cron text for the external scheduler
    pub fn cron(&self) -> &str {
        &self.raw
    }

    /// Human rendering; opaque lines render as their raw cron text
    pub fn display(&self) -> String {
        match &self.entry {
            Some(entry) => entry.display(),
            None => self.raw.clone(),
        }
    }

    /// True when the line is carried verbatim without a display form
    pub fn is_custom(&self) -> bool {
        self.entry.is_none()
    }
}

/// Ordered, deduplicated schedule specification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSpec {
    lines: Vec<ScheduleLine>,
}

/// Policy default: collection-day evenings plus a pre-dawn Wednesday check
pub const DEFAULT_LINES: [&str; 2] = ["30 19 * * 1,5,6", "30 3 * * 3"];

impl ScheduleSpec {
    /// Parse input lines; blank lines are skipped, duplicates collapse to
    /// their first occurrence
    pub fn parse<S: AsRef<str>>(lines: &[S]) -> Result<Self, ScheduleError> {
        let mut parsed: Vec<ScheduleLine> = Vec::new();
        for line in lines {
            let line = line.as_ref().trim();
            if line.is_empty() {
                continue;
            }
            let next = Self::parse_line(line)?;
            if !parsed.iter().any(|existing| existing.cron() == next.cron()) {
                parsed.push(next);
            }
        }
        Ok(Self { lines: parsed })
    }

    /// Grammar, tried in order: raw cron (5 or more fields, verbatim), a
    /// bare time, day selectors followed by a time
    fn parse_line(line: &str) -> Result<ScheduleLine, ScheduleError> {
        if line.split_whitespace().count() >= 5 {
            return Ok(ScheduleLine::from_raw(line));
        }

        let lowered = line.to_lowercase();
        let tokens: Vec<&str> = lowered
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
            .collect();
        let Some((time_token, day_tokens)) = tokens.split_last() else {
            return Err(ScheduleError::invalid(line));
        };
        let Some((hour, minute)) = parse_time(time_token) else {
            return Err(ScheduleError::invalid(line));
        };

        let dow = if day_tokens.is_empty() {
            "*".to_string()
        } else {
            dow_field(day_tokens).ok_or_else(|| ScheduleError::invalid(line))?
        };

        Ok(ScheduleLine::from_entry(ScheduleEntry { minute, hour, dow }))
    }

    /// The built-in schedule used when the configuration supplies none
    pub fn defaults() -> Self {
        Self {
            lines: DEFAULT_LINES.iter().map(|l| ScheduleLine::from_raw(l)).collect(),
        }
    }

    pub fn lines(&self) -> &[ScheduleLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Cron lines in order, ready for a crontab
    pub fn cron_lines(&self) -> Vec<String> {
        self.lines.iter().map(|l| l.cron().to_string()).collect()
    }

    /// Display renderings in the same order
    pub fn display_lines(&self) -> Vec<String> {
        self.lines.iter().map(|l| l.display()).collect()
    }
}

impl Default for ScheduleSpec {
    fn default() -> Self {
        Self::defaults()
    }
}

/// Combine day selector tokens into a cron day-of-week field
///
/// `daily`/`everyday` short-circuit to `*`; other tokens contribute field
/// fragments deduplicated in first-seen order.
fn dow_field(tokens: &[&str]) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();
    for token in tokens {
        if matches!(*token, "daily" | "everyday") {
            return Some("*".to_string());
        }
        let part = match *token {
            "weekday" | "weekdays" => "1-5".to_string(),
            "weekend" | "weekends" => "0,6".to_string(),
            other => day_code(other)?.to_string(),
        };
        if !parts.contains(&part) {
            parts.push(part);
        }
    }
    Some(parts.join(","))
}

// ============================================================================
// Tests
// ============================================================================
