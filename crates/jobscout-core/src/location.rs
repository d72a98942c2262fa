//! Parsing of the posting's "location · posted · applicants" line.
//!
//! The site renders three facts as one bullet-separated string, in English
//! or Danish depending on the account language:
//!
//! ```text
//! Copenhagen, Capital Region, Denmark · 2 weeks ago · Over 100 applicants
//! København · 6 dage siden · 71 ansøgere
//! ```
//!
//! Segment 0 is the location verbatim. Every other segment is probed by a
//! relative-date recognizer and an applicants recognizer; the first hit of
//! each wins. Relative dates resolve against the capture time.

use std::sync::LazyLock;

use chrono::{DateTime, TimeDelta, Utc};
use regex::Regex;

/// Separators the site uses between the three facts.
const SEPARATORS: [char; 2] = ['·', '•'];

/// Nominal length of each relative-date unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateUnit {
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl DateUnit {
    pub fn span(&self, n: i64) -> TimeDelta {
        match self {
            DateUnit::Minute => TimeDelta::minutes(n),
            DateUnit::Hour => TimeDelta::hours(n),
            DateUnit::Day => TimeDelta::days(n),
            DateUnit::Week => TimeDelta::days(7 * n),
            DateUnit::Month => TimeDelta::days(30 * n),
            DateUnit::Year => TimeDelta::days(365 * n),
        }
    }
}

/// One compiled row per unit; each row covers both language registers.
static RELATIVE_DATE_TABLE: LazyLock<Vec<(Regex, DateUnit)>> = LazyLock::new(|| {
    const COUNT: &str = r"(\d+|an?|one|en|et)";
    const SUFFIX: &str = r"\s+(?:ago|siden)\b";
    [
        (r"minutes?|minut(?:ter)?", DateUnit::Minute),
        (r"hours?|timer?", DateUnit::Hour),
        (r"days?|dage?", DateUnit::Day),
        (r"weeks?|uger?", DateUnit::Week),
        (r"months?|måned(?:er)?", DateUnit::Month),
        (r"years?|år", DateUnit::Year),
    ]
    .into_iter()
    .map(|(units, unit)| {
        let pattern = format!(r"(?i)\b{COUNT}\s+(?:{units}){SUFFIX}");
        (Regex::new(&pattern).unwrap(), unit)
    })
    .collect()
});

static APPLICANTS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:(?:more than|over|mere end)\s+)?(\d[\d.,]*)(?:\s+(?:applicants?|ansøgere?|people clicked apply|personer har klikket på ansøg))?$",
    )
    .unwrap()
});

/// Facts derived from the location line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationInfo {
    pub location: String,
    pub posted_at: DateTime<Utc>,
    pub applicants: Option<u32>,
}

/// Split and interpret a location line captured at `captured_at`.
///
/// When no segment reads as a date, `posted_at` is the capture time.
pub fn parse_location_line(raw: &str, captured_at: DateTime<Utc>) -> LocationInfo {
    let mut segments = raw.split(SEPARATORS).map(str::trim);
    let location = segments.next().unwrap_or_default().to_string();

    let mut posted_at = None;
    let mut applicants = None;
    for segment in segments.filter(|s| !s.is_empty()) {
        if posted_at.is_none() {
            if let Some(age) = parse_relative_age(segment) {
                posted_at = Some(captured_at - age);
                continue;
            }
        }
        if applicants.is_none() {
            applicants = parse_applicants(segment);
        }
    }

    LocationInfo {
        location,
        posted_at: posted_at.unwrap_or(captured_at),
        applicants,
    }
}

/// Age expressed by a phrase like "2 weeks ago", "a day ago", "for 6 dage siden".
pub fn parse_relative_age(text: &str) -> Option<TimeDelta> {
    RELATIVE_DATE_TABLE.iter().find_map(|(re, unit)| {
        let caps = re.captures(text)?;
        let n = parse_count(&caps[1])?;
        Some(unit.span(n))
    })
}

fn parse_count(token: &str) -> Option<i64> {
    match token.to_lowercase().as_str() {
        "a" | "an" | "one" | "en" | "et" => Some(1),
        digits => digits.parse().ok(),
    }
}

/// Applicant count from "71 applicants", "Over 100 ansøgere", "42", …
///
/// "more than N" style phrasings yield the floor N.
pub fn parse_applicants(text: &str) -> Option<u32> {
    let caps = APPLICANTS_RE.captures(text.trim())?;
    let digits: String = caps[1].chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}
