use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("failed to read {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("page {page} is out of range (document has {pages} pages)")]
    PageOutOfRange { page: usize, pages: usize },
    #[error("page {page} has no extractable text (scanned or image-only?)")]
    EmptyPage { page: usize },
    #[error("PDF extraction failed: {0}")]
    Malformed(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The text never contains the table header line.
    #[error("no schedule table header found (unrecognized schedule format)")]
    NoHeaderFound,
}

/// Per-record failures while turning a parsed row into a calendar meeting.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CalendarError {
    #[error("section {0:?} does not start with a term letter and 2-digit year")]
    InvalidSemester(String),
    #[error("{course} {section} has no meeting days")]
    NoMeetingDays { course: String, section: String },
    #[error("invalid time {0:?}, expected HH:MM")]
    InvalidTime(String),
    #[error("invalid date {0:?}, expected DD-Mon")]
    InvalidDate(String),
    #[error("meeting ends ({end}) before it starts ({start})")]
    InvalidTimeRange { start: String, end: String },
    #[error("recurrence ends ({end}) before the first meeting ({start})")]
    InvalidDateRange { start: String, end: String },
    #[error("unknown time zone {0:?}")]
    UnknownTimezone(String),
}
