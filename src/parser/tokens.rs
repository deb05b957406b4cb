use std::sync::LazyLock;

use regex::Regex;

static TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([01]\d|2[0-3]):[0-5]\d$").unwrap());
static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(0?[1-9]|[12]\d|3[01])-[A-Za-z]{3}$").unwrap());

pub const DAY_CODES: &[&str] = &["Mo", "Tu", "We", "Th", "Fr", "Sa", "Su"];

/// One whitespace-delimited cell fragment, classified by its fixed format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    Day(&'a str),
    Time(&'a str),
    Date(&'a str),
    /// Lone `-` between a start and end value in older exports.
    Dash,
    Word(&'a str),
}

impl<'a> Token<'a> {
    pub fn text(&self) -> &'a str {
        match self {
            Token::Day(s) | Token::Time(s) | Token::Date(s) | Token::Word(s) => s,
            Token::Dash => "-",
        }
    }
}

pub fn classify(raw: &str) -> Token<'_> {
    if is_day_code(raw) {
        Token::Day(raw)
    } else if TIME_RE.is_match(raw) {
        Token::Time(raw)
    } else if DATE_RE.is_match(raw) {
        Token::Date(raw)
    } else if raw == "-" {
        Token::Dash
    } else {
        Token::Word(raw)
    }
}

/// Exact, case-sensitive, whole-token match.
pub fn is_day_code(raw: &str) -> bool {
    DAY_CODES.contains(&raw)
}

pub fn tokenize(line: &str) -> Vec<Token<'_>> {
    line.split_whitespace().map(classify).collect()
}
