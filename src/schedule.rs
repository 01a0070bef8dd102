//! Daily schedule produced by the external scheduler.
//!
//! The scheduler writes one human-readable file per day before the capture
//! window opens. Only the prefix-keyed lines below are read; everything
//! else (sunrise, sunset, expected video length, ...) is ignored.
//!
//! ```text
//! Date: 2025-11-14
//! Start: 07:42:10
//! End: 16:03:55
//! Interval: 40 seconds
//! Expected photos: 752
//! ```

use chrono::{NaiveDate, NaiveTime, Timelike};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use crate::error::ScheduleError;

const DATE_PREFIX: &str = "Date: ";
const START_PREFIX: &str = "Start: ";
const END_PREFIX: &str = "End: ";
const INTERVAL_PREFIX: &str = "Interval: ";
const EXPECTED_PREFIX: &str = "Expected photos: ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub interval: Duration,
    pub expected_photos: u32,
}

impl Schedule {
    /// Schedule file name for `date` and `device_id`.
    pub fn file_name(date: NaiveDate, device_id: &str) -> String {
        format!("{}_schedule.txt", file_prefix(date, device_id))
    }

    pub fn path_for(schedules_dir: &Path, date: NaiveDate, device_id: &str) -> PathBuf {
        schedules_dir.join(Self::file_name(date, device_id))
    }

    pub fn load(path: &Path) -> Result<Self, ScheduleError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ScheduleError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let schedule = Self::parse(&raw)?;
        log::info!("Loaded schedule from {}", path.display());
        Ok(schedule)
    }

    pub fn parse(raw: &str) -> Result<Self, ScheduleError> {
        let mut date = None;
        let mut start = None;
        let mut end = None;
        let mut interval = None;
        let mut expected_photos = 0u32;

        for line in raw.lines() {
            let line = line.trim_end_matches('\r');
            if let Some(value) = line.strip_prefix(DATE_PREFIX) {
                date = Some(value.trim());
            } else if let Some(value) = line.strip_prefix(START_PREFIX) {
                start = Some(value.trim());
            } else if let Some(value) = line.strip_prefix(END_PREFIX) {
                end = Some(value.trim());
            } else if let Some(value) = line.strip_prefix(INTERVAL_PREFIX) {
                interval = Some(parse_interval(value)?);
            } else if let Some(value) = line.strip_prefix(EXPECTED_PREFIX) {
                expected_photos =
                    value
                        .trim()
                        .parse()
                        .map_err(|_| ScheduleError::InvalidNumber {
                            field: "expected photos",
                            value: value.to_string(),
                        })?;
            }
        }

        let date = required(date, "date")?;
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|_| ScheduleError::InvalidDate(date.to_string()))?;
        let start = parse_time_of_day("start", required(start, "start")?)?;
        let end = parse_time_of_day("end", required(end, "end")?)?;
        let interval = interval.ok_or(ScheduleError::MissingField("interval"))?;

        if interval <= 0 {
            return Err(ScheduleError::InvalidInterval(interval));
        }
        if start >= end {
            return Err(ScheduleError::InvalidWindow {
                start: start.format("%H:%M:%S").to_string(),
                end: end.format("%H:%M:%S").to_string(),
            });
        }

        Ok(Self {
            date,
            start,
            end,
            interval: Duration::from_secs(interval as u64),
            expected_photos,
        })
    }

    pub fn window(&self) -> Duration {
        let secs = self.end.num_seconds_from_midnight() - self.start.num_seconds_from_midnight();
        Duration::from_secs(u64::from(secs))
    }
}

/// `YYYYMMDD_<id>`, shared by the schedule, frame directory, frames and video.
pub fn file_prefix(date: NaiveDate, device_id: &str) -> String {
    format!("{}_{}", date.format("%Y%m%d"), device_id)
}

fn required<'a>(value: Option<&'a str>, field: &'static str) -> Result<&'a str, ScheduleError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(ScheduleError::MissingField(field))
}

/// `"40 seconds"` or a bare `"40"`.
fn parse_interval(value: &str) -> Result<i64, ScheduleError> {
    let trimmed = value.trim();
    let number = trimmed.strip_suffix("seconds").unwrap_or(trimmed).trim();
    number.parse().map_err(|_| ScheduleError::InvalidNumber {
        field: "interval",
        value: value.to_string(),
    })
}

/// Fixed-width `HH:MM:SS`.
pub fn parse_time_of_day(field: &'static str, value: &str) -> Result<NaiveTime, ScheduleError> {
    static TIME_RE: OnceLock<Regex> = OnceLock::new();
    let re = TIME_RE.get_or_init(|| {
        Regex::new(r"^([0-9]{2}):([0-9]{2}):([0-9]{2})$").expect("time-of-day pattern")
    });
    let invalid = || ScheduleError::InvalidTime {
        field,
        value: value.to_string(),
    };
    let caps = re.captures(value).ok_or_else(invalid)?;
    let part = |idx: usize| caps[idx].parse::<u32>().map_err(|_| invalid());
    NaiveTime::from_hms_opt(part(1)?, part(2)?, part(3)?).ok_or_else(invalid)
}
