//! Session identifiers and per-camera log file naming

use crate::types::CameraId;
use chrono::{DateTime, NaiveTime, ParseError, TimeZone, Timelike};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const LOG_FILE_CAMERA_TAG: &str = "_cam";
const LOG_FILE_EXTENSION: &str = ".rec";

/// Identifies a recording session by its wall-clock start time, at
/// millisecond precision.
///
/// Every camera in a session shares the id; it is parsed from and displayed as
/// `HH:MM:SS.fff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(NaiveTime);

impl SessionId {
    pub fn new(start: NaiveTime) -> Self {
        Self(truncate_to_millis(start))
    }

    /// Session id for a session starting at `start`.
    pub fn from_datetime<Tz: TimeZone>(start: &DateTime<Tz>) -> Self {
        Self::new(start.time())
    }

    pub fn start_time(&self) -> NaiveTime {
        self.0
    }

    /// File name of a camera's log, e.g. `00_06_51_086_cam1.rec`.
    pub fn log_file_name(&self, camera_id: CameraId) -> String {
        format!(
            "{}{}{}{}",
            self.0.format("%H_%M_%S_%3f"),
            LOG_FILE_CAMERA_TAG,
            camera_id,
            LOG_FILE_EXTENSION
        )
    }

    /// Full path of a camera's log inside `dir`.
    pub fn log_path(&self, dir: impl AsRef<Path>, camera_id: CameraId) -> PathBuf {
        dir.as_ref().join(self.log_file_name(camera_id))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M:%S%.3f"))
    }
}

impl FromStr for SessionId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveTime::parse_from_str(s.trim(), "%H:%M:%S%.f").map(Self::new)
    }
}

fn truncate_to_millis(time: NaiveTime) -> NaiveTime {
    let millis = time.nanosecond() / 1_000_000;
    NaiveTime::from_hms_milli_opt(time.hour(), time.minute(), time.second(), millis).unwrap_or(time)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let session: SessionId = "00:06:51.086".parse().unwrap();
        assert_eq!(session.to_string(), "00:06:51.086");
    }

    #[test]
    fn test_log_file_name() {
        let session: SessionId = "13:04:05.007".parse().unwrap();
        assert_eq!(session.log_file_name(2), "13_04_05_007_cam2.rec");
        assert_eq!(
            session.log_path("/tmp/rig", 0),
            PathBuf::from("/tmp/rig/13_04_05_007_cam0.rec")
        );
    }

    #[test]
    fn test_sub_millisecond_precision_dropped() {
        let time = NaiveTime::from_hms_micro_opt(10, 0, 0, 123_999).unwrap();
        let session = SessionId::new(time);
        assert_eq!(session.to_string(), "10:00:00.123");
        assert_eq!(session, "10:00:00.123".parse().unwrap());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("not a time".parse::<SessionId>().is_err());
    }
}
