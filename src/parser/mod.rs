pub mod record;
pub mod rows;
pub mod tokens;

use regex::Regex;
use tracing::{debug, warn};

use crate::error::ParseError;
use crate::settings::{ContinuationLayout, ParserConfig};
pub use record::CourseMeetingRecord;
use rows::{SectionHead, SkipReason};

/// A table line that produced no record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    /// 1-based line number in the extracted text.
    pub line_no: usize,
    pub text: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseReport {
    pub records: Vec<CourseMeetingRecord>,
    pub skipped: Vec<SkippedLine>,
}

/// Schedule-table parser. Holds configuration only, so one instance can be
/// shared across threads.
#[derive(Debug, Clone)]
pub struct ScheduleParser {
    header_token: String,
    campus_prefixes: Vec<String>,
    location_tokens: usize,
    section_re: Regex,
    layout: ContinuationLayout,
}

impl ScheduleParser {
    pub fn new(config: &ParserConfig) -> Result<Self, regex::Error> {
        Ok(ScheduleParser {
            header_token: config.header_token.clone(),
            campus_prefixes: config.campus_prefixes.clone(),
            location_tokens: config.location_tokens,
            section_re: Regex::new(&config.section_pattern)?,
            layout: config.continuation_layout,
        })
    }

    pub fn parse(&self, text: &str) -> Result<Vec<CourseMeetingRecord>, ParseError> {
        self.parse_with_report(text).map(|report| report.records)
    }

    /// Header scan, then course rows each followed by any number of
    /// continuation rows. Malformed lines are skipped, not fatal.
    pub fn parse_with_report(&self, text: &str) -> Result<ParseReport, ParseError> {
        let lines: Vec<&str> = text.lines().collect();
        let header = lines
            .iter()
            .position(|l| self.is_header(l))
            .ok_or(ParseError::NoHeaderFound)?;

        let mut report = ParseReport::default();
        // Most recent well-formed course row; continuation rows inherit from it.
        let mut current: Option<SectionHead> = None;

        for (idx, raw) in lines.iter().enumerate().skip(header + 1) {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            let line_no = idx + 1;

            let outcome = if self.is_continuation(line) {
                match &current {
                    Some(head) => {
                        rows::parse_continuation(line, self.location_tokens, self.layout)
                            .map(|meeting| head.record(meeting))
                    }
                    None => Err(SkipReason::OrphanContinuation),
                }
            } else {
                match rows::parse_primary(line, self.location_tokens, &self.section_re) {
                    Ok((head, meeting)) => {
                        let record = head.record(meeting);
                        current = Some(head);
                        Ok(record)
                    }
                    Err(reason) => {
                        current = None;
                        Err(reason)
                    }
                }
            };

            match outcome {
                Ok(record) => {
                    debug!(line_no, course = %record.course_code, days = %record.days, "parsed meeting");
                    report.records.push(record);
                }
                Err(reason) => {
                    warn!(line_no, %reason, line, "skipping schedule line");
                    report.skipped.push(SkippedLine {
                        line_no,
                        text: line.to_string(),
                        reason,
                    });
                }
            }
        }

        Ok(report)
    }

    fn is_header(&self, line: &str) -> bool {
        line.split_whitespace().next() == Some(self.header_token.as_str())
    }

    fn is_continuation(&self, line: &str) -> bool {
        self.campus_prefixes.iter().any(|campus| {
            line.strip_prefix(campus.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
        })
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::tokens::DAY_CODES;

    const HEADER: &str =
        "Course Section Location Days Start End StartDate EndDate Status Instructor DeliveryMode";
    const PRIMARY: &str = "CSCI 360 F24N02 Nanaimo 200 106 Mo We 13:00 14:30 03-SEP 06-DEC Enrolled KABIR HUMAYUN Face-to-Face";
    const CONTINUATION: &str = "Nanaimo 210 225 Tu Th 10:00 11:30 03-SEP 06-DEC Enrolled";

    fn parser() -> ScheduleParser {
        ScheduleParser::new(&ParserConfig::default()).unwrap()
    }

    fn fixture() -> String {
        std::fs::read_to_string("tests/fixtures/schedule.txt").unwrap()
    }

    #[test]
    fn single_primary_row() {
        let text = format!("{HEADER}\n{PRIMARY}\n");
        let records = parser().parse(&text).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].course_code, "CSCI 360");
        assert_eq!(records[0].days, "Mo We");
        assert_eq!(records[0].start_time, "13:00");
    }

    #[test]
    fn continuation_inherits_section() {
        let text = format!("{HEADER}\n{PRIMARY}\n{CONTINUATION}\n");
        let records = parser().parse(&text).unwrap();
        assert_eq!(records.len(), 2);
        let (a, b) = (&records[0], &records[1]);
        assert_eq!(a.course_code, b.course_code);
        assert_eq!(a.section, b.section);
        assert_eq!(a.instructor, b.instructor);
        assert_eq!(a.delivery_mode, b.delivery_mode);
        assert_ne!(a.location, b.location);
        assert_ne!(a.days, b.days);
        assert_ne!(a.start_time, b.start_time);
        assert_ne!(a.end_time, b.end_time);
    }

    #[test]
    fn no_header() {
        let err = parser().parse(PRIMARY).unwrap_err();
        assert_eq!(err, ParseError::NoHeaderFound);
        assert_eq!(parser().parse("").unwrap_err(), ParseError::NoHeaderFound);
    }

    #[test]
    fn header_without_rows() {
        let text = format!("Student: Jane Doe\n{HEADER}\n\n");
        let report = parser().parse_with_report(&text).unwrap();
        assert!(report.records.is_empty());
        assert!(report.skipped.is_empty());
    }

    #[test]
    fn header_must_be_whole_token() {
        let text = format!("Courseload summary\n{PRIMARY}\n");
        assert_eq!(parser().parse(&text).unwrap_err(), ParseError::NoHeaderFound);
    }

    #[test]
    fn lines_before_header_are_ignored() {
        let text = format!("{PRIMARY}\nFall 2024 schedule\n{HEADER}\n{CONTINUATION}\n");
        let report = parser().parse_with_report(&text).unwrap();
        assert!(report.records.is_empty());
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].reason, SkipReason::OrphanContinuation);
        assert_eq!(report.skipped[0].line_no, 4);
    }

    #[test]
    fn malformed_line_is_skipped() {
        let text = format!("{HEADER}\n{PRIMARY}\nPage 2 of 3\n{PRIMARY}\n");
        let report = parser().parse_with_report(&text).unwrap();
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].line_no, 3);
        assert_eq!(report.skipped[0].text, "Page 2 of 3");
    }

    #[test]
    fn continuation_after_bad_primary_is_orphaned() {
        let text = format!("{HEADER}\nCSCI 360 broken row\n{CONTINUATION}\n{PRIMARY}\n");
        let report = parser().parse_with_report(&text).unwrap();
        assert_eq!(report.records.len(), 1);
        let reasons: Vec<_> = report.skipped.iter().map(|s| s.reason.clone()).collect();
        assert!(matches!(reasons[0], SkipReason::TooFewTokens { .. }));
        assert_eq!(reasons[1], SkipReason::OrphanContinuation);
    }

    #[test]
    fn bad_continuation_keeps_run_going() {
        let text = format!("{HEADER}\n{PRIMARY}\nNanaimo 210\n{CONTINUATION}\n");
        let report = parser().parse_with_report(&text).unwrap();
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.records[1].location, "Nanaimo 210 225");
        assert_eq!(report.skipped.len(), 1);
    }

    #[test]
    fn campus_prefix_is_whole_word() {
        let p = parser();
        assert!(p.is_continuation("Nanaimo 210 225"));
        assert!(p.is_continuation("Duncan 100 1"));
        assert!(!p.is_continuation("NanaimoX 210 225"));
        assert!(!p.is_continuation("CSCI 360 F24N02 Nanaimo"));
    }

    #[test]
    fn status_last_layout_rejects_trailing_mode() {
        let config = ParserConfig {
            continuation_layout: ContinuationLayout::StatusLast,
            ..ParserConfig::default()
        };
        let p = ScheduleParser::new(&config).unwrap();
        let text = format!("{HEADER}\n{PRIMARY}\n{CONTINUATION} Online\n");
        let report = p.parse_with_report(&text).unwrap();
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.skipped[0].reason, SkipReason::UnexpectedTail(1));
    }

    #[test]
    fn trailing_mode_on_continuation_is_not_reparsed() {
        let text = format!("{HEADER}\n{PRIMARY}\n{CONTINUATION} Online\n");
        let records = parser().parse(&text).unwrap();
        assert_eq!(records[1].delivery_mode, "Face-to-Face");
    }

    #[test]
    fn invalid_section_pattern() {
        let config = ParserConfig {
            section_pattern: "(".to_string(),
            ..ParserConfig::default()
        };
        assert!(ScheduleParser::new(&config).is_err());
    }

    #[test]
    fn fixture_schedule() {
        let report = parser().parse_with_report(&fixture()).unwrap();
        let summary: Vec<(&str, &str, &str)> = report
            .records
            .iter()
            .map(|r| (r.course_code.as_str(), r.days.as_str(), r.start_time.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("CSCI 360", "Mo We", "13:00"),
                ("CSCI 360", "Tu Th", "10:00"),
                ("CSCI 370", "Tu Th", "14:30"),
                ("MATH 211", "Mo We Fr", "09:30"),
                ("MATH 211", "Fr", "11:30"),
                ("MATH 211", "Sa", "10:00"),
                ("ENGL 204", "Th", "18:00"),
            ]
        );
        // "Page 2 of 3" footer and the cancelled row without times
        assert_eq!(report.skipped.len(), 2);
        assert_eq!(report.records[5].location, "Duncan 300 12");
        assert_eq!(report.records[5].instructor, "ANNA PETROVA");
    }

    #[test]
    fn fixture_invariants() {
        let records = parser().parse(&fixture()).unwrap();
        for r in &records {
            assert_eq!(r.course_code.split(' ').count(), 2, "{:?}", r);
            assert!(parser().section_re.is_match(&r.section), "{:?}", r);
            assert!(r.day_tokens().all(|d| DAY_CODES.contains(&d)), "{:?}", r);
        }
    }

    #[test]
    fn parsing_is_idempotent() {
        let p = parser();
        let text = fixture();
        assert_eq!(p.parse_with_report(&text), p.parse_with_report(&text));
    }
}
