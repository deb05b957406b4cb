//! RFC 5545 calendar document with one weekly `VEVENT` per meeting pattern.
//!
//! Event times are local wall-clock times tagged with the configured `TZID`,
//! described by a `VTIMEZONE` built from the zone database. `DTSTAMP` and the
//! recurrence `UNTIL` are written in UTC.

use chrono::{
    DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeDelta, TimeZone, Utc,
};
use chrono_tz::{OffsetComponents, Tz};
use ical::generator::Emitter;
use ical::parser::ical::component::{
    IcalCalendar, IcalEvent, IcalTimeZone, IcalTimeZoneTransition, IcalTimeZoneTransitionType,
};
use ical::property::Property;

use super::{timezone, MeetingPattern};
use crate::error::CalendarError;
use crate::settings::CalendarConfig;

pub fn build_calendar(
    patterns: &[MeetingPattern],
    config: &CalendarConfig,
    stamp: DateTime<Utc>,
) -> Result<String, CalendarError> {
    let tz = timezone(config)?;
    let tzid = tz.name();
    let dtstamp = stamp.format("%Y%m%dT%H%M%SZ").to_string();

    let mut cal = IcalCalendar::new();
    cal.properties = vec![
        property("VERSION", "2.0"),
        property("PRODID", &config.product_id),
        property("CALSCALE", "GREGORIAN"),
        property("METHOD", "PUBLISH"),
        property("X-WR-TIMEZONE", tzid),
    ];

    let first_year = patterns.iter().map(|p| p.start.year()).min();
    let last_year = patterns.iter().map(|p| p.until.year()).max();
    if let (Some(first), Some(last)) = (first_year, last_year) {
        // the year before covers the observance already in effect on the first class
        cal.timezones.push(vtimezone(tz, first - 1, last));
    }

    for p in patterns {
        let mut event = IcalEvent::new();
        event.properties = vec![
            property("UID", &p.uid),
            property("DTSTAMP", &dtstamp),
            zoned("DTSTART", tzid, &p.start),
            zoned("DTEND", tzid, &p.end),
            property("RRULE", &p.rrule()),
            property("SUMMARY", &text(&p.summary)),
            property("LOCATION", &text(&p.location)),
            property("DESCRIPTION", &text(&p.description)),
        ];
        cal.events.push(event);
    }

    Ok(cal.generate())
}

fn property(name: &str, value: &str) -> Property {
    Property {
        name: name.to_string(),
        params: None,
        value: Some(value.to_string()),
    }
}

fn zoned(name: &str, tzid: &str, at: &NaiveDateTime) -> Property {
    Property {
        name: name.to_string(),
        params: Some(vec![("TZID".to_string(), vec![tzid.to_string()])]),
        value: Some(local(at)),
    }
}

fn local(dt: &NaiveDateTime) -> String {
    dt.format("%Y%m%dT%H%M%S").to_string()
}

/// TEXT values (RFC 5545 3.3.11). The emitter writes values as given, since
/// structured ones like `RRULE` keep their separators.
fn text(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace("\r\n", "\\n")
        .replace('\n', "\\n")
}

/// An offset change: the UTC instant it takes effect and the offsets around it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Transition {
    at: NaiveDateTime,
    from: FixedOffset,
    to: FixedOffset,
    daylight: bool,
}

/// Offset changes of `tz` from the start of `first` to the end of `last`.
fn transitions(tz: Tz, first: i32, last: i32) -> Vec<Transition> {
    let (Some(start), Some(end)) = (
        NaiveDate::from_ymd_opt(first, 1, 1),
        NaiveDate::from_ymd_opt(last + 1, 1, 1),
    ) else {
        return Vec::new();
    };
    let offset_at = |t: NaiveDateTime| tz.offset_from_utc_datetime(&t);

    let mut out = Vec::new();
    let mut t = start.and_time(Default::default());
    let end = end.and_time(Default::default());
    let mut current = offset_at(t).fix();
    while t < end {
        let next = t + TimeDelta::hours(1);
        if offset_at(next).fix() != current {
            // narrow down to the minute; half-hour zones switch off the UTC hour
            let mut at = t + TimeDelta::minutes(1);
            while offset_at(at).fix() == current {
                at += TimeDelta::minutes(1);
            }
            let offset = offset_at(at);
            out.push(Transition {
                at,
                from: current,
                to: offset.fix(),
                daylight: offset.dst_offset() != TimeDelta::zero(),
            });
            current = offset.fix();
        }
        t = next;
    }
    out
}

fn vtimezone(tz: Tz, first: i32, last: i32) -> IcalTimeZone {
    let mut component = IcalTimeZone::new();
    component.properties = vec![property("TZID", tz.name())];

    let changes = transitions(tz, first, last);
    if changes.is_empty() {
        // fixed-offset zone: one observance from the epoch on
        let fixed = NaiveDateTime::default();
        let offset = tz.offset_from_utc_datetime(&fixed).fix();
        component.transitions.push(observance(
            IcalTimeZoneTransitionType::STANDARD,
            &fixed,
            offset,
            offset,
        ));
        return component;
    }

    for change in changes {
        // DTSTART is wall-clock time under the offset being left
        let local_start = change.at + TimeDelta::seconds(change.from.local_minus_utc().into());
        let kind = if change.daylight {
            IcalTimeZoneTransitionType::DAYLIGHT
        } else {
            IcalTimeZoneTransitionType::STANDARD
        };
        component
            .transitions
            .push(observance(kind, &local_start, change.from, change.to));
    }
    component
}

fn observance(
    kind: IcalTimeZoneTransitionType,
    start: &NaiveDateTime,
    from: FixedOffset,
    to: FixedOffset,
) -> IcalTimeZoneTransition {
    IcalTimeZoneTransition {
        transition: kind,
        properties: vec![
            property("DTSTART", &local(start)),
            property("TZOFFSETFROM", &utc_offset(from)),
            property("TZOFFSETTO", &utc_offset(to)),
        ],
    }
}

/// `-0800`, `+0530`
fn utc_offset(offset: FixedOffset) -> String {
    let secs = offset.local_minus_utc();
    let sign = if secs < 0 { '-' } else { '+' };
    let secs = secs.abs();
    format!("{sign}{:02}{:02}", secs / 3600, secs % 3600 / 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::tests::record;

    fn stamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 8, 20, 12, 0, 0).unwrap()
    }

    fn calendar() -> String {
        let config = CalendarConfig::default();
        let p = MeetingPattern::from_record(&record(), &config).unwrap();
        build_calendar(&[p], &config, stamp()).unwrap()
    }

    fn unfolded(ics: &str) -> String {
        ics.replace("\r\n ", "")
    }

    #[test]
    fn event_lines() {
        let ics = unfolded(&calendar());
        assert!(ics.starts_with("BEGIN:VCALENDAR\r\nVERSION:2.0\r\n"));
        assert!(ics.ends_with("END:VCALENDAR\r\n"));
        assert_eq!(ics.matches("BEGIN:VEVENT").count(), 1);
        assert!(ics.contains("DTSTAMP:20240820T120000Z\r\n"));
        assert!(ics.contains("DTSTART;TZID=America/Vancouver:20240904T130000\r\n"));
        assert!(ics.contains("DTEND;TZID=America/Vancouver:20240904T143000\r\n"));
        assert!(ics.contains("RRULE:FREQ=WEEKLY;BYDAY=MO,WE;UNTIL=20241207T075959Z\r\n"));
        assert!(ics.contains("SUMMARY:CSCI 360 - B200 R106 - N02\r\n"));
        assert!(ics.contains("UID:csci360-f24n02-mowe-1300-03sep-nanaimo200106@sched2cal\r\n"));
    }

    #[test]
    fn referenced_zone_is_defined() {
        let ics = unfolded(&calendar());
        assert_eq!(ics.matches("BEGIN:VTIMEZONE").count(), 1);
        assert!(ics.contains("TZID:America/Vancouver\r\n"));
        // 2024-11-03 02:00 PDT -> PST
        assert!(ics.contains(
            "BEGIN:STANDARD\r\nDTSTART:20241103T020000\r\nTZOFFSETFROM:-0700\r\nTZOFFSETTO:-0800\r\n"
        ));
        // 2024-03-10 02:00 PST -> PDT
        assert!(ics.contains(
            "BEGIN:DAYLIGHT\r\nDTSTART:20240310T020000\r\nTZOFFSETFROM:-0800\r\nTZOFFSETTO:-0700\r\n"
        ));
    }

    #[test]
    fn zone_without_dst_has_one_observance() {
        let config = CalendarConfig {
            timezone: "Asia/Tokyo".into(),
            ..CalendarConfig::default()
        };
        let p = MeetingPattern::from_record(&record(), &config).unwrap();
        let ics = unfolded(&build_calendar(&[p], &config, stamp()).unwrap());
        assert_eq!(ics.matches("BEGIN:STANDARD").count(), 1);
        assert_eq!(ics.matches("BEGIN:DAYLIGHT").count(), 0);
        assert!(ics.contains("TZOFFSETFROM:+0900\r\nTZOFFSETTO:+0900\r\n"));
    }

    #[test]
    fn half_hour_transitions() {
        // Adelaide leaves daylight time at 03:00 ACDT, 16:30 UTC the day before
        let tz: Tz = "Australia/Adelaide".parse().unwrap();
        let changes = transitions(tz, 2024, 2024);
        let first = changes.first().unwrap();
        assert_eq!(
            first.at,
            NaiveDate::from_ymd_opt(2024, 4, 6).unwrap().and_hms_opt(16, 30, 0).unwrap()
        );
        assert_eq!(utc_offset(first.from), "+1030");
        assert_eq!(utc_offset(first.to), "+0930");
        assert!(!first.daylight);
    }

    #[test]
    fn description_is_escaped() {
        let ics = unfolded(&calendar());
        assert!(ics.contains(
            "DESCRIPTION:Instructor: KABIR HUMAYUN\\, Status: Enrolled\\, DeliveryMode: Face-to-Face\r\n"
        ));
    }

    #[test]
    fn long_lines_are_folded() {
        let ics = calendar();
        assert!(ics.lines().all(|l| l.len() <= 76));
        assert!(unfolded(&ics).contains("LOCATION:Vancouver Island University\\, 900 Fifth St"));
    }

    #[test]
    fn empty_calendar() {
        let ics = build_calendar(&[], &CalendarConfig::default(), stamp()).unwrap();
        assert_eq!(ics.matches("VEVENT").count(), 0);
        assert_eq!(ics.matches("VTIMEZONE").count(), 0);
        assert!(ics.contains("PRODID:-//sched2cal//Course Schedule//EN\r\n"));
    }

    #[test]
    fn text_escapes() {
        assert_eq!(text("a,b;c\\d\ne"), "a\\,b\\;c\\\\d\\ne");
    }
}
