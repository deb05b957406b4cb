pub mod google;
pub mod ics;

use chrono::{
    DateTime, Datelike, Days, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc, Weekday,
};
use chrono_tz::Tz;
use tracing::warn;

use crate::error::CalendarError;
use crate::parser::CourseMeetingRecord;
use crate::settings::CalendarConfig;

const WEEKDAYS: &[(&str, Weekday)] = &[
    ("Mo", Weekday::Mon),
    ("Tu", Weekday::Tue),
    ("We", Weekday::Wed),
    ("Th", Weekday::Thu),
    ("Fr", Weekday::Fri),
    ("Sa", Weekday::Sat),
    ("Su", Weekday::Sun),
];

const MONTHS: &[&str] = &[
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Year of a semester tag: term letter plus 2-digit year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Semester {
    pub year: i32,
}

impl Semester {
    /// `F24` (or a whole section like `F24N02`) -> 2024. The century is always 20xx.
    pub fn from_section(section: &str) -> Result<Self, CalendarError> {
        let invalid = || CalendarError::InvalidSemester(section.to_string());
        section
            .chars()
            .next()
            .filter(char::is_ascii_alphabetic)
            .ok_or_else(invalid)?;
        let yy = section
            .get(1..3)
            .filter(|s| s.bytes().all(|b| b.is_ascii_digit()))
            .ok_or_else(invalid)?;
        let year = format!("20{yy}").parse().map_err(|_| invalid())?;
        Ok(Semester { year })
    }

    /// `DD-Mon` in this semester's year.
    pub fn date(&self, raw: &str) -> Result<NaiveDate, CalendarError> {
        let invalid = || CalendarError::InvalidDate(raw.to_string());
        let (day, month) = raw.split_once('-').ok_or_else(invalid)?;
        let day: u32 = day.parse().map_err(|_| invalid())?;
        let month = MONTHS
            .iter()
            .position(|m| m.eq_ignore_ascii_case(month))
            .ok_or_else(invalid)?;
        NaiveDate::from_ymd_opt(self.year, month as u32 + 1, day).ok_or_else(invalid)
    }
}

pub fn weekday(token: &str) -> Option<Weekday> {
    WEEKDAYS.iter().find(|(t, _)| *t == token).map(|(_, d)| *d)
}

/// iCalendar BYDAY code: the day token upper-cased (`Mo` -> `MO`).
pub fn byday_code(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

/// The configured IANA zone.
pub fn timezone(config: &CalendarConfig) -> Result<Tz, CalendarError> {
    config
        .timezone
        .parse()
        .map_err(|_| CalendarError::UnknownTimezone(config.timezone.clone()))
}

fn parse_time(raw: &str) -> Result<NaiveTime, CalendarError> {
    NaiveTime::parse_from_str(raw, "%H:%M").map_err(|_| CalendarError::InvalidTime(raw.to_string()))
}

/// One weekly recurring event, ready for any exporter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetingPattern {
    pub uid: String,
    pub summary: String,
    pub location: String,
    pub description: String,
    pub weekdays: Vec<Weekday>,
    /// First class: start date moved forward to the first meeting weekday.
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// End of the last class day in the calendar's zone, as UTC.
    pub until: DateTime<Utc>,
}

impl MeetingPattern {
    pub fn from_record(
        record: &CourseMeetingRecord,
        config: &CalendarConfig,
    ) -> Result<Self, CalendarError> {
        let mut weekdays: Vec<Weekday> = Vec::new();
        for day in record.day_tokens().filter_map(weekday) {
            if !weekdays.contains(&day) {
                weekdays.push(day);
            }
        }
        if weekdays.is_empty() {
            return Err(CalendarError::NoMeetingDays {
                course: record.course_code.clone(),
                section: record.section.clone(),
            });
        }

        let semester = Semester::from_section(record.semester_tag())?;
        let mut first = semester.date(&record.start_date)?;
        // at most six steps: weekdays is non-empty
        while !weekdays.contains(&first.weekday()) {
            first = first
                .checked_add_days(Days::new(1))
                .ok_or_else(|| CalendarError::InvalidDate(record.start_date.clone()))?;
        }

        let start_time = parse_time(&record.start_time)?;
        let end_time = parse_time(&record.end_time)?;
        if end_time <= start_time {
            return Err(CalendarError::InvalidTimeRange {
                start: record.start_time.clone(),
                end: record.end_time.clone(),
            });
        }

        let last_day = semester.date(&record.end_date)?;
        if last_day < first {
            return Err(CalendarError::InvalidDateRange {
                start: first.to_string(),
                end: last_day.to_string(),
            });
        }
        let until = end_of_day(last_day, timezone(config)?)
            .ok_or_else(|| CalendarError::InvalidDate(record.end_date.clone()))?;

        Ok(MeetingPattern {
            uid: uid(record),
            summary: summary(record),
            location: location(record, config),
            description: format!(
                "Instructor: {}, Status: {}, DeliveryMode: {}",
                record.instructor, record.status, record.delivery_mode
            ),
            weekdays,
            start: first.and_time(start_time),
            end: first.and_time(end_time),
            until,
        })
    }

    /// `FREQ=WEEKLY;BYDAY=MO,WE;UNTIL=20241207T075959Z`
    pub fn rrule(&self) -> String {
        let days: Vec<&str> = self.weekdays.iter().map(|d| byday_code(*d)).collect();
        format!(
            "FREQ=WEEKLY;BYDAY={};UNTIL={}",
            days.join(","),
            self.until.format("%Y%m%dT%H%M%SZ")
        )
    }
}

/// 23:59:59 local on `day`. UNTIL has to be UTC when DTSTART carries a TZID.
fn end_of_day(day: NaiveDate, tz: Tz) -> Option<DateTime<Utc>> {
    let local = day.and_hms_opt(23, 59, 59)?;
    tz.from_local_datetime(&local)
        .latest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// `CSCI 360 - B200 R106 - N02`
fn summary(record: &CourseMeetingRecord) -> String {
    let parts: Vec<&str> = record.location.split_whitespace().collect();
    let place = match parts.as_slice() {
        [.., building, room] => format!("B{building} R{room}"),
        _ => record.location.clone(),
    };
    let number = record.section_number();
    if number.is_empty() {
        format!("{} - {}", record.course_code, place)
    } else {
        format!("{} - {} - {}", record.course_code, place, number)
    }
}

fn location(record: &CourseMeetingRecord, config: &CalendarConfig) -> String {
    record
        .location
        .split_whitespace()
        .next()
        .and_then(|campus| config.campus_addresses.get(&campus.to_lowercase()))
        .cloned()
        .unwrap_or_else(|| record.location.clone())
}

fn uid(record: &CourseMeetingRecord) -> String {
    let compact = |s: &str| -> String {
        s.chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase()
    };
    format!(
        "{}-{}-{}-{}-{}-{}@sched2cal",
        compact(&record.course_code),
        compact(&record.section),
        compact(&record.days),
        compact(&record.start_time),
        compact(&record.start_date),
        compact(&record.location)
    )
}

/// Meeting patterns for a parsed schedule, plus how many records were left out.
#[derive(Debug, Default)]
pub struct Schedule {
    pub patterns: Vec<MeetingPattern>,
    pub unscheduled: usize,
}

/// Records that cannot become a recurring event are logged and counted.
/// An unknown time zone fails the whole schedule.
pub fn meeting_patterns(
    records: &[CourseMeetingRecord],
    config: &CalendarConfig,
) -> Result<Schedule, CalendarError> {
    timezone(config)?;
    let mut schedule = Schedule::default();
    for record in records {
        match MeetingPattern::from_record(record, config) {
            Ok(pattern) => schedule.patterns.push(pattern),
            Err(e) => {
                warn!(course = %record.course_code, section = %record.section, error = %e, "unschedulable meeting");
                schedule.unscheduled += 1;
            }
        }
    }
    Ok(schedule)
}
