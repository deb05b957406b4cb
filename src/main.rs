mod calendar;
mod error;
mod extract;
mod parser;
mod settings;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};

use calendar::google::{self, GoogleCalendarClient};
use calendar::{ics, MeetingPattern};
use parser::{CourseMeetingRecord, ParseReport, ScheduleParser};
use settings::Settings;

#[derive(Parser)]
#[command(name = "sched2cal", about = "Course schedule PDF to calendar events")]
struct Cli {
    /// Settings file (optional; SCHED2CAL_* environment variables also apply)
    #[arg(long, global = true, default_value = "sched2cal.toml")]
    config: PathBuf,
    /// Zero-based page holding the schedule table (overrides settings)
    #[arg(long, global = true)]
    page: Option<usize>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the extracted text of the schedule page
    Text { file: PathBuf },
    /// Parse one or more schedules and list their meetings
    Parse {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write an ICS calendar file
    Ics {
        file: PathBuf,
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print Google Calendar event payloads as JSON
    Events { file: PathBuf },
    /// Insert events into Google Calendar
    Push {
        file: PathBuf,
        /// Actually insert; without it the events are only listed
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let mut settings = settings::load(&cli.config)?;
    if let Some(page) = cli.page {
        settings.page_index = page;
    }
    let parser =
        ScheduleParser::new(&settings.parser).context("Invalid parser.section_pattern")?;

    let result = match cli.command {
        Commands::Text { file } => {
            println!("{}", schedule_text(&settings, &file)?);
            Ok(())
        }
        Commands::Parse { files, json } => {
            let results = parse_files(&parser, &settings, &files);
            if json {
                print_json(&results)?;
            } else {
                for (file, result) in &results {
                    match result {
                        Ok(report) => print_table(file, report),
                        Err(e) => println!("{}: {:#}\n", file.display(), e),
                    }
                }
            }
            let failed = results.iter().filter(|(_, r)| r.is_err()).count();
            if failed > 0 {
                anyhow::bail!("{} of {} schedules could not be read", failed, results.len());
            }
            Ok(())
        }
        Commands::Ics { file, output } => {
            let patterns = load_patterns(&parser, &settings, &file)?;
            if patterns.is_empty() {
                return Ok(());
            }
            let doc = ics::build_calendar(&patterns, &settings.calendar, chrono::Utc::now())?;
            match output {
                Some(path) => {
                    std::fs::write(&path, doc)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    info!(events = patterns.len(), path = %path.display(), "wrote calendar");
                }
                None => print!("{}", doc),
            }
            Ok(())
        }
        Commands::Events { file } => {
            let payloads: Vec<_> = load_patterns(&parser, &settings, &file)?
                .iter()
                .map(|p| google::event_payload(p, &settings.calendar.timezone))
                .collect();
            println!("{}", serde_json::to_string_pretty(&payloads)?);
            Ok(())
        }
        Commands::Push { file, yes } => {
            let patterns = load_patterns(&parser, &settings, &file)?;
            if patterns.is_empty() {
                return Ok(());
            }
            for p in &patterns {
                println!("- {} ({})", p.summary, p.rrule());
            }
            if !yes {
                println!(
                    "\nRe-run with --yes to add {} events to calendar '{}'.",
                    patterns.len(),
                    settings.calendar.calendar_id
                );
                return Ok(());
            }
            push_events(&settings, &patterns).await
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        eprintln!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn schedule_text(settings: &Settings, file: &Path) -> Result<String> {
    extract::page_text(file, settings.page_index)
        .with_context(|| format!("Failed to extract {}", file.display()))
}

fn load_report(parser: &ScheduleParser, settings: &Settings, file: &Path) -> Result<ParseReport> {
    let text = schedule_text(settings, file)?;
    let report = parser
        .parse_with_report(&text)
        .with_context(|| format!("Cannot read schedule in {}", file.display()))?;
    info!(
        file = %file.display(),
        records = report.records.len(),
        skipped = report.skipped.len(),
        "parsed schedule"
    );
    Ok(report)
}

fn load_records(
    parser: &ScheduleParser,
    settings: &Settings,
    file: &Path,
) -> Result<Vec<CourseMeetingRecord>> {
    let text = schedule_text(settings, file)?;
    let records = parser
        .parse(&text)
        .with_context(|| format!("Cannot read schedule in {}", file.display()))?;
    info!(file = %file.display(), records = records.len(), "parsed schedule");
    Ok(records)
}

/// Calendar patterns for one schedule. Empty schedules and unschedulable
/// meetings are reported on stderr, keeping stdout for the export itself.
fn load_patterns(
    parser: &ScheduleParser,
    settings: &Settings,
    file: &Path,
) -> Result<Vec<MeetingPattern>> {
    let records = load_records(parser, settings, file)?;
    if records.is_empty() {
        eprintln!("No courses found in the schedule.");
        return Ok(Vec::new());
    }
    let schedule = calendar::meeting_patterns(&records, &settings.calendar)?;
    if schedule.unscheduled > 0 {
        eprintln!(
            "{} of {} meetings could not be scheduled.",
            schedule.unscheduled,
            records.len()
        );
    }
    Ok(schedule.patterns)
}

/// Documents are independent, so they are extracted and parsed in parallel.
fn parse_files(
    parser: &ScheduleParser,
    settings: &Settings,
    files: &[PathBuf],
) -> Vec<(PathBuf, Result<ParseReport>)> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let pb = if files.len() > 1 {
        ProgressBar::new(files.len() as u64)
    } else {
        ProgressBar::hidden()
    };
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }

    let results = files
        .par_iter()
        .map(|file| {
            let result = load_report(parser, settings, file);
            pb.inc(1);
            (file.clone(), result)
        })
        .collect();

    pb.finish_and_clear();
    results
}

#[derive(Serialize)]
struct FileSchedule<'a> {
    file: String,
    records: &'a [CourseMeetingRecord],
    skipped: usize,
}

fn print_json(results: &[(PathBuf, Result<ParseReport>)]) -> Result<()> {
    let schedules: Vec<FileSchedule> = results
        .iter()
        .filter_map(|(file, result)| {
            let report = result.as_ref().ok()?;
            Some(FileSchedule {
                file: file.display().to_string(),
                records: &report.records,
                skipped: report.skipped.len(),
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&schedules)?);
    Ok(())
}

fn print_table(file: &Path, report: &ParseReport) {
    println!("{}", file.display());
    if report.records.is_empty() {
        println!("No courses found in the schedule.\n");
        return;
    }

    println!(
        "{:<10} | {:<7} | {:<16} | {:<9} | {:<11} | {:<13} | {:<10} | {:<12} | {:<12}",
        "Course", "Section", "Location", "Days", "Time", "Dates", "Status", "Instructor", "Mode"
    );
    println!("{}", "-".repeat(124));
    for r in &report.records {
        println!(
            "{:<10} | {:<7} | {:<16} | {:<9} | {:<11} | {:<13} | {:<10} | {:<12} | {:<12}",
            r.course_code,
            r.section,
            truncate(&r.location, 16),
            r.days,
            format!("{}-{}", r.start_time, r.end_time),
            format!("{}..{}", r.start_date, r.end_date),
            truncate(&r.status, 10),
            truncate(&r.instructor, 12),
            truncate(&r.delivery_mode, 12),
        );
    }

    let unique: std::collections::BTreeSet<&str> =
        report.records.iter().map(|r| r.course_code.as_str()).collect();
    println!(
        "\n{} courses, {} weekly meetings",
        unique.len(),
        report.records.len()
    );
    if !report.skipped.is_empty() {
        println!("Skipped {} unreadable lines:", report.skipped.len());
        for s in &report.skipped {
            println!("  line {}: {} ({})", s.line_no, truncate(&s.text, 60), s.reason);
        }
    }
    println!();
}

async fn push_events(settings: &Settings, patterns: &[MeetingPattern]) -> Result<()> {
    let client = GoogleCalendarClient::new(&settings.calendar)?;
    let mut errors = 0usize;
    for p in patterns {
        let payload = google::event_payload(p, &settings.calendar.timezone);
        match client.insert_event(&payload).await {
            Ok(Some(link)) => println!("Event created: {}", link),
            Ok(None) => println!("Event created: {}", p.summary),
            Err(e) => {
                warn!(summary = %p.summary, error = %format!("{:#}", e), "failed to add event");
                errors += 1;
            }
        }
    }
    println!(
        "Added {} of {} events.",
        patterns.len() - errors,
        patterns.len()
    );
    if errors > 0 {
        anyhow::bail!("{} events could not be added", errors);
    }
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
