use regex::Regex;
use thiserror::Error;

use super::record::CourseMeetingRecord;
use super::tokens::{tokenize, Token};
use crate::settings::ContinuationLayout;

/// Why a table line was dropped instead of producing a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("only {found} tokens, need at least {needed}")]
    TooFewTokens { found: usize, needed: usize },
    #[error("section {0:?} does not look like a section code")]
    BadSection(String),
    #[error("location column is cut short")]
    ShortLocation,
    #[error("expected {0}")]
    MissingAnchor(&'static str),
    #[error("no instructor/delivery mode after status")]
    MissingInstructor,
    #[error("{0} unexpected tokens after status")]
    UnexpectedTail(usize),
    #[error("continuation row without a preceding course row")]
    OrphanContinuation,
}

/// Columns shared by course rows and continuation rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetingFields {
    pub location: String,
    pub days: String,
    pub start_time: String,
    pub end_time: String,
    pub start_date: String,
    pub end_date: String,
    pub status: String,
}

/// Columns only a course row carries; continuation rows inherit them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionHead {
    pub course_code: String,
    pub section: String,
    pub instructor: String,
    pub delivery_mode: String,
}

impl SectionHead {
    pub fn record(&self, meeting: MeetingFields) -> CourseMeetingRecord {
        CourseMeetingRecord {
            course_code: self.course_code.clone(),
            section: self.section.clone(),
            location: meeting.location,
            days: meeting.days,
            start_time: meeting.start_time,
            end_time: meeting.end_time,
            start_date: meeting.start_date,
            end_date: meeting.end_date,
            status: meeting.status,
            instructor: self.instructor.clone(),
            delivery_mode: self.delivery_mode.clone(),
        }
    }
}

/// Left-to-right reader that anchors on fixed-format tokens.
struct Cursor<'t, 'a> {
    tokens: &'t [Token<'a>],
    pos: usize,
}

impl<'t, 'a> Cursor<'t, 'a> {
    fn new(tokens: &'t [Token<'a>]) -> Self {
        Cursor { tokens, pos: 0 }
    }

    fn advance(&mut self) -> Option<Token<'a>> {
        let tok = self.tokens.get(self.pos).copied()?;
        self.pos += 1;
        Some(tok)
    }

    fn take_location(&mut self, n: usize) -> Result<String, SkipReason> {
        let end = self.pos + n;
        let parts = self.tokens.get(self.pos..end).ok_or(SkipReason::ShortLocation)?;
        if parts
            .iter()
            .any(|t| matches!(t, Token::Time(_) | Token::Date(_) | Token::Dash))
        {
            return Err(SkipReason::ShortLocation);
        }
        self.pos = end;
        Ok(join(parts))
    }

    /// Maximal contiguous run of day codes.
    fn take_days(&mut self) -> String {
        let start = self.pos;
        while matches!(self.tokens.get(self.pos), Some(Token::Day(_))) {
            self.pos += 1;
        }
        join(&self.tokens[start..self.pos])
    }

    fn skip_dash(&mut self) {
        if matches!(self.tokens.get(self.pos), Some(Token::Dash)) {
            self.pos += 1;
        }
    }

    fn time(&mut self, what: &'static str) -> Result<&'a str, SkipReason> {
        match self.advance() {
            Some(Token::Time(s)) => Ok(s),
            _ => Err(SkipReason::MissingAnchor(what)),
        }
    }

    fn date(&mut self, what: &'static str) -> Result<&'a str, SkipReason> {
        match self.advance() {
            Some(Token::Date(s)) => Ok(s),
            _ => Err(SkipReason::MissingAnchor(what)),
        }
    }

    fn word(&mut self, what: &'static str) -> Result<&'a str, SkipReason> {
        match self.advance() {
            Some(Token::Word(s)) => Ok(s),
            _ => Err(SkipReason::MissingAnchor(what)),
        }
    }

    fn rest(&self) -> &'t [Token<'a>] {
        &self.tokens[self.pos.min(self.tokens.len())..]
    }

    fn meeting(&mut self, location_tokens: usize) -> Result<MeetingFields, SkipReason> {
        let location = self.take_location(location_tokens)?;
        let days = self.take_days();
        let start_time = self.time("start time")?;
        self.skip_dash();
        let end_time = self.time("end time")?;
        let start_date = self.date("start date")?;
        self.skip_dash();
        let end_date = self.date("end date")?;
        let status = self.word("status")?;
        Ok(MeetingFields {
            location,
            days,
            start_time: start_time.to_string(),
            end_time: end_time.to_string(),
            start_date: start_date.to_string(),
            end_date: end_date.to_string(),
            status: status.to_string(),
        })
    }
}

fn join(tokens: &[Token<'_>]) -> String {
    tokens.iter().map(Token::text).collect::<Vec<_>>().join(" ")
}

// times + dates + status
const MEETING_ANCHORS: usize = 5;

pub fn parse_primary(
    line: &str,
    location_tokens: usize,
    section_re: &Regex,
) -> Result<(SectionHead, MeetingFields), SkipReason> {
    let tokens = tokenize(line);
    let needed = 3 + location_tokens + MEETING_ANCHORS + 2;
    if tokens.len() < needed {
        return Err(SkipReason::TooFewTokens {
            found: tokens.len(),
            needed,
        });
    }

    let course_code = join(&tokens[..2]);
    let section = tokens[2].text();
    if !section_re.is_match(section) {
        return Err(SkipReason::BadSection(section.to_string()));
    }

    let mut cur = Cursor::new(&tokens[3..]);
    let meeting = cur.meeting(location_tokens)?;

    let (delivery_mode, instructor) = match cur.rest() {
        [instructor @ .., delivery_mode] if !instructor.is_empty() => {
            (delivery_mode.text(), join(instructor))
        }
        _ => return Err(SkipReason::MissingInstructor),
    };

    let head = SectionHead {
        course_code,
        section: section.to_string(),
        instructor,
        delivery_mode: delivery_mode.to_string(),
    };
    Ok((head, meeting))
}

pub fn parse_continuation(
    line: &str,
    location_tokens: usize,
    layout: ContinuationLayout,
) -> Result<MeetingFields, SkipReason> {
    let tokens = tokenize(line);
    let needed = location_tokens + MEETING_ANCHORS;
    if tokens.len() < needed {
        return Err(SkipReason::TooFewTokens {
            found: tokens.len(),
            needed,
        });
    }

    let mut cur = Cursor::new(&tokens);
    let meeting = cur.meeting(location_tokens)?;

    // A trailing delivery mode, when allowed, is dropped: it is inherited.
    let tail = cur.rest().len();
    let tail_ok = match layout {
        ContinuationLayout::StatusLast => tail == 0,
        ContinuationLayout::DeliveryModeLast => tail == 1,
        ContinuationLayout::Either => tail <= 1,
    };
    if !tail_ok {
        return Err(if tail == 0 {
            SkipReason::MissingAnchor("delivery mode")
        } else {
            SkipReason::UnexpectedTail(tail)
        });
    }
    Ok(meeting)
}
