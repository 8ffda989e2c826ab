//! User-facing time patterns and timezone resolution.
//!
//! Patterns use the tokens `yyyy yy MM dd HH mm ss SSS S`; everything else is
//! copied through literally. `SSS` is milliseconds and `S` deciseconds.

use std::fmt::Write as _;

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

use crate::error::{ExportError, ExportResult};

/// Default pattern used when the caller does not supply one.
pub const DEFAULT_TIME_PATTERN: &str = "yyyy-MM-dd HH:mm:ss";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Year4,
    Year2,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    Millis,
    Decis,
}

impl Token {
    fn is_date(self) -> bool {
        matches!(self, Token::Year4 | Token::Year2 | Token::Month | Token::Day)
    }
}

// Longest tokens first so `yyyy` wins over `yy` and `SSS` over `S`.
const TOKENS: &[(&str, Token)] = &[
    ("yyyy", Token::Year4),
    ("yy", Token::Year2),
    ("MM", Token::Month),
    ("dd", Token::Day),
    ("HH", Token::Hour),
    ("mm", Token::Minute),
    ("ss", Token::Second),
    ("SSS", Token::Millis),
    ("S", Token::Decis),
];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Field(Token),
    Literal(String),
}

/// A parsed time pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimePattern {
    source: String,
    segments: Vec<Segment>,
}

impl TimePattern {
    /// Parse a user pattern. Only an empty pattern is rejected.
    pub fn parse(pattern: &str) -> ExportResult<Self> {
        if pattern.is_empty() {
            return Err(ExportError::config("time format cannot be empty"));
        }

        let mut segments: Vec<Segment> = Vec::new();
        let mut rest = pattern;
        'outer: while !rest.is_empty() {
            for (text, token) in TOKENS {
                if let Some(tail) = rest.strip_prefix(text) {
                    segments.push(Segment::Field(*token));
                    rest = tail;
                    continue 'outer;
                }
            }
            let ch = rest.chars().next().unwrap_or_default();
            match segments.last_mut() {
                Some(Segment::Literal(lit)) => lit.push(ch),
                _ => segments.push(Segment::Literal(ch.to_string())),
            }
            rest = &rest[ch.len_utf8()..];
        }

        Ok(Self {
            source: pattern.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// The date-only prefix of this pattern: everything up to the last date
    /// token, so `yyyy-MM-dd HH:mm:ss` yields `yyyy-MM-dd`. A pattern without
    /// date tokens is returned unchanged.
    pub fn date_portion(&self) -> TimePattern {
        let Some(last) = self
            .segments
            .iter()
            .rposition(|s| matches!(s, Segment::Field(t) if t.is_date()))
        else {
            return self.clone();
        };

        let segments: Vec<Segment> = self.segments[..=last].to_vec();
        let mut source = String::new();
        for seg in &segments {
            match seg {
                Segment::Literal(lit) => source.push_str(lit),
                Segment::Field(tok) => {
                    let text = TOKENS
                        .iter()
                        .find(|(_, t)| t == tok)
                        .map_or("", |(text, _)| *text);
                    source.push_str(text);
                }
            }
        }
        TimePattern {
            source: source.trim().to_string(),
            segments,
        }
    }

    pub fn format_datetime(&self, ts: &NaiveDateTime) -> String {
        let mut out = String::with_capacity(self.source.len() + 8);
        for seg in &self.segments {
            match seg {
                Segment::Literal(lit) => out.push_str(lit),
                Segment::Field(tok) => {
                    let _ = match tok {
                        Token::Year4 => write!(out, "{:04}", ts.year()),
                        Token::Year2 => write!(out, "{:02}", ts.year().rem_euclid(100)),
                        Token::Month => write!(out, "{:02}", ts.month()),
                        Token::Day => write!(out, "{:02}", ts.day()),
                        Token::Hour => write!(out, "{:02}", ts.hour()),
                        Token::Minute => write!(out, "{:02}", ts.minute()),
                        Token::Second => write!(out, "{:02}", ts.second()),
                        Token::Millis => write!(out, "{:03}", subsec_nanos(ts) / 1_000_000),
                        Token::Decis => write!(out, "{}", subsec_nanos(ts) / 100_000_000),
                    };
                }
            }
        }
        out
    }

    pub fn format_date(&self, date: &NaiveDate) -> String {
        self.format_datetime(&date.and_time(chrono::NaiveTime::MIN))
    }
}

// Leap seconds are reported as nanos >= 1e9.
fn subsec_nanos(ts: &NaiveDateTime) -> u32 {
    ts.nanosecond() % 1_000_000_000
}

/// Zone zoned timestamps are converted into before rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Zone {
    #[default]
    Local,
    Named(Tz),
}

impl Zone {
    /// Resolve an IANA zone name. An empty name means local time; an
    /// unknown name also falls back to local time and returns a warning.
    pub fn resolve(name: &str) -> (Zone, Option<String>) {
        let name = name.trim();
        if name.is_empty() {
            return (Zone::Local, None);
        }
        match name.parse::<Tz>() {
            Ok(tz) => (Zone::Named(tz), None),
            Err(err) => (
                Zone::Local,
                Some(format!("invalid timezone {name:?}, using local time: {err}")),
            ),
        }
    }

    /// Strict variant for up-front validation.
    pub fn validate(name: &str) -> ExportResult<()> {
        match Zone::resolve(name) {
            (_, None) => Ok(()),
            (_, Some(msg)) => Err(ExportError::config(msg)),
        }
    }

    /// Wall-clock time in this zone.
    pub fn localize(&self, ts: &DateTime<Utc>) -> NaiveDateTime {
        match self {
            Zone::Local => ts.with_timezone(&Local).naive_local(),
            Zone::Named(tz) => ts.with_timezone(tz).naive_local(),
        }
    }

    /// ISO form with numeric offset, e.g. `2024-03-15 15:30:45+01:00`.
    pub fn iso_with_offset(&self, ts: &DateTime<Utc>) -> String {
        const ISO: &str = "%Y-%m-%d %H:%M:%S%.f%:z";
        match self {
            Zone::Local => ts.with_timezone(&Local).format(ISO).to_string(),
            Zone::Named(tz) => tz.from_utc_datetime(&ts.naive_utc()).format(ISO).to_string(),
        }
    }
}
