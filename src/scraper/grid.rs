//! Date extraction from the schedule grid
//!
//! The grid's second row reads like "Weekly Collection Every Wed 15 Mar 2025".
//! The leading tokens are frequency and day-name noise; the date itself is
//! anchored on the month abbreviation so small wording changes on the site do
//! not shift the extraction onto the wrong token. Every access is
//! bounds-checked and every mismatch is a typed error, never a default value.

use chrono::NaiveDate;
use thiserror::Error;

/// Closed table of month abbreviations used by the remote grid
///
/// Matching is exact and case-sensitive; anything else is reported as an
/// unparseable month.
pub const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Number of leading noise tokens dropped before scanning for the date
const NOISE_TOKENS: usize = 3;

/// Reasons a grid row failed to yield a date
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GridParseError {
    #[error("row has {count} tokens, expected at least 6")]
    TooFewTokens { count: usize },

    #[error("no recognizable month abbreviation in row")]
    UnparseableMonth,

    #[error("no day-of-month token next to the month")]
    MissingDay,

    #[error("day token '{token}' is not a day-of-month")]
    InvalidDay { token: String },

    #[error("missing year after the date")]
    MissingYear,

    #[error("year token '{token}' is not a 4-digit year")]
    InvalidYear { token: String },

    #[error("{year}-{month:02}-{day:02} is not a calendar date")]
    InvalidDate { year: i32, month: u32, day: u32 },
}

/// Extract the collection date from one grid row
///
/// The day-of-month may precede the month ("15 Mar 2025") or follow it
/// ("Mar 15 2025"); the 4-digit year comes after both.
pub fn extract_date(row: &str) -> Result<NaiveDate, GridParseError> {
    let tokens: Vec<&str> = row.split_whitespace().collect();
    if tokens.len() < 6 {
        return Err(GridParseError::TooFewTokens {
            count: tokens.len(),
        });
    }

    let tail = &tokens[NOISE_TOKENS..];
    let (month_idx, month) = tail
        .iter()
        .enumerate()
        .find_map(|(idx, token)| month_number(token).map(|m| (idx, m)))
        .ok_or(GridParseError::UnparseableMonth)?;

    let day_before = month_idx
        .checked_sub(1)
        .and_then(|idx| tail.get(idx))
        .copied()
        .filter(|token| parse_day(token).is_some());

    let (day_token, year_token) = match day_before {
        Some(day) => (day, tail.get(month_idx + 1).copied()),
        None => {
            let day = tail
                .get(month_idx + 1)
                .copied()
                .ok_or(GridParseError::MissingDay)?;
            (day, tail.get(month_idx + 2).copied())
        }
    };

    let day = parse_day(day_token).ok_or_else(|| GridParseError::InvalidDay {
        token: day_token.to_string(),
    })?;
    let year_token = year_token.ok_or(GridParseError::MissingYear)?;
    let year = parse_year(year_token).ok_or_else(|| GridParseError::InvalidYear {
        token: year_token.to_string(),
    })?;

    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or(GridParseError::InvalidDate { year, month, day })
}

/// 1-based month number for an exact table entry
fn month_number(token: &str) -> Option<u32> {
    MONTHS
        .iter()
        .position(|month| *month == token)
        .map(|idx| (idx + 1) as u32)
}

fn parse_day(token: &str) -> Option<u32> {
    let day: u32 = token.parse().ok()?;
    (1..=31).contains(&day).then_some(day)
}

fn parse_year(token: &str) -> Option<i32> {
    if token.len() != 4 || !token.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}
