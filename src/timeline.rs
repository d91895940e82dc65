//! Time-window queries over file modification times

use crate::error::{KeeperError, Result};
use crate::scan::{FileEntry, Scope};
use crate::stats::format_file_size;
use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, NaiveTime, TimeZone};
use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Files modified within the last `days` days, newest first
pub fn recent_files(scope: &Scope, days: u32) -> Vec<FileEntry> {
    recent_files_at(scope, days, Local::now())
}

fn recent_files_at(scope: &Scope, days: u32, now: DateTime<Local>) -> Vec<FileEntry> {
    let cutoff = (now - Duration::days(i64::from(days))).timestamp();
    let mut files: Vec<FileEntry> = scope
        .files()
        .map(|f| f.to_entry(&scope.directory))
        .filter(|e| e.modified_timestamp.is_some_and(|ts| ts >= cutoff))
        .collect();
    sort_newest_first(&mut files);
    files
}

fn sort_newest_first(files: &mut [FileEntry]) {
    files.sort_by(|a, b| b.modified_timestamp.cmp(&a.modified_timestamp));
}

#[derive(Debug, Clone, Serialize)]
pub struct DateRangeReport {
    pub files: Vec<FileEntry>,
    pub total_count: usize,
    pub total_size: u64,
    pub total_size_formatted: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub directory: String,
}

/// Files modified between `start_date` 00:00:00 and `end_date` 23:59:59 (local time)
///
/// A missing start is unbounded; a missing end means now.
pub fn files_by_date_range(
    scope: &Scope,
    start_date: Option<&str>,
    end_date: Option<&str>,
) -> Result<DateRangeReport> {
    let start = start_date.map(parse_date).transpose()?;
    let end = end_date.map(parse_date).transpose()?;
    if let (Some(s), Some(e)) = (start, end) {
        if s > e {
            return Err(KeeperError::InvalidArgument(format!(
                "start_date {} is after end_date {}",
                s, e
            )));
        }
    }

    let start_ts = start.map(|d| local_timestamp(d, NaiveTime::MIN));
    let end_ts = match end {
        Some(d) => local_timestamp(d, end_of_day()),
        None => Local::now().timestamp(),
    };

    let mut files: Vec<FileEntry> = scope
        .files()
        .map(|f| f.to_entry(&scope.directory))
        .filter(|e| match e.modified_timestamp {
            Some(ts) => start_ts.map_or(true, |s| ts >= s) && ts <= end_ts,
            None => false,
        })
        .collect();
    sort_newest_first(&mut files);

    let total_size = files.iter().map(|f| f.size_bytes).sum();
    Ok(DateRangeReport {
        total_count: files.len(),
        total_size,
        total_size_formatted: format_file_size(total_size),
        start_date: start.map(|d| d.format(DATE_FORMAT).to_string()),
        end_date: end.map(|d| d.format(DATE_FORMAT).to_string()),
        directory: scope.directory.display().to_string(),
        files,
    })
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).map_err(|_| {
        KeeperError::InvalidArgument(format!("invalid date '{}', expected YYYY-MM-DD", raw))
    })
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN)
}

fn local_timestamp(date: NaiveDate, time: NaiveTime) -> i64 {
    let naive = date.and_time(time);
    // DST gaps: fall back to interpreting the wall time as UTC
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|t| t.timestamp())
        .unwrap_or_else(|| naive.and_utc().timestamp())
}

/// Bucket size for get_file_timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    #[default]
    Day,
    /// Keyed by the Monday starting the week
    Week,
    Month,
}

impl GroupBy {
    fn key(self, time: DateTime<Local>) -> String {
        match self {
            Self::Day => time.format(DATE_FORMAT).to_string(),
            Self::Week => {
                let monday = time.date_naive()
                    - Duration::days(i64::from(time.weekday().num_days_from_monday()));
                monday.format(DATE_FORMAT).to_string()
            }
            Self::Month => time.format("%Y-%m").to_string(),
        }
    }
}

impl FromStr for GroupBy {
    type Err = KeeperError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            other => Err(KeeperError::InvalidArgument(format!(
                "unknown group_by '{}' (expected day, week or month)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TimelineBucket {
    pub files: Vec<FileEntry>,
    pub count: usize,
    pub total_size: u64,
    pub total_size_formatted: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimelineSummary {
    pub total_files: usize,
    pub total_size: u64,
    pub total_size_formatted: String,
    pub days: u32,
    pub group_by: GroupBy,
    pub directory: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Timeline {
    pub timeline: BTreeMap<String, TimelineBucket>,
    pub summary: TimelineSummary,
}

/// Recent files grouped into day/week/month buckets
pub fn file_timeline(scope: &Scope, days: u32, group_by: GroupBy) -> Timeline {
    let recent = recent_files(scope, days);
    let total_size: u64 = recent.iter().map(|f| f.size_bytes).sum();
    let total_files = recent.len();

    let mut timeline: BTreeMap<String, TimelineBucket> = BTreeMap::new();
    for file in recent {
        let Some(ts) = file.modified_timestamp else {
            continue;
        };
        let Some(time) = Local.timestamp_opt(ts, 0).single() else {
            continue;
        };
        let bucket = timeline.entry(group_by.key(time)).or_default();
        bucket.count += 1;
        bucket.total_size += file.size_bytes;
        bucket.files.push(file);
    }
    for bucket in timeline.values_mut() {
        bucket.total_size_formatted = format_file_size(bucket.total_size);
    }

    Timeline {
        timeline,
        summary: TimelineSummary {
            total_files,
            total_size,
            total_size_formatted: format_file_size(total_size),
            days,
            group_by,
            directory: scope.directory.display().to_string(),
        },
    }
}
