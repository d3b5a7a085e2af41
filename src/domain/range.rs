// Display range keys selectable per chart
use chrono::{DateTime, Datelike, Duration, Months, TimeZone, Utc};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown range key {0:?}")]
pub struct RangeKeyError(pub String);

/// Trailing windows served continuously by a live chart session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiveWindow {
    OneMinute,
    FiveMinutes,
    ThirtyMinutes,
}

impl LiveWindow {
    pub fn seconds(&self) -> u64 {
        match self {
            LiveWindow::OneMinute => 60,
            LiveWindow::FiveMinutes => 300,
            LiveWindow::ThirtyMinutes => 1800,
        }
    }
}

/// Closed ranges that end at the moment of the query and are never refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HistoricalRange {
    LastHour,
    LastDay,
    LastWeek,
    LastMonth,
    YearToDate,
    AllTime,
}

impl HistoricalRange {
    /// Resolves the range to `[start, end]` with `end = now`.
    pub fn resolve(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = match self {
            HistoricalRange::LastHour => now - Duration::hours(1),
            HistoricalRange::LastDay => now - Duration::hours(24),
            HistoricalRange::LastWeek => now - Duration::days(7),
            HistoricalRange::LastMonth => now
                .checked_sub_months(Months::new(1))
                .unwrap_or(DateTime::UNIX_EPOCH),
            HistoricalRange::YearToDate => Utc
                .with_ymd_and_hms(now.year(), 1, 1, 0, 0, 0)
                .single()
                .unwrap_or(DateTime::UNIX_EPOCH),
            HistoricalRange::AllTime => DateTime::UNIX_EPOCH,
        };
        (start, now)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RangeKey {
    Live(LiveWindow),
    Historical(HistoricalRange),
}

impl Default for RangeKey {
    fn default() -> Self {
        RangeKey::Live(LiveWindow::FiveMinutes)
    }
}

impl RangeKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            RangeKey::Live(LiveWindow::OneMinute) => "1m",
            RangeKey::Live(LiveWindow::FiveMinutes) => "5m",
            RangeKey::Live(LiveWindow::ThirtyMinutes) => "30m",
            RangeKey::Historical(HistoricalRange::LastHour) => "1h",
            RangeKey::Historical(HistoricalRange::LastDay) => "24h",
            RangeKey::Historical(HistoricalRange::LastWeek) => "7d",
            RangeKey::Historical(HistoricalRange::LastMonth) => "1mo",
            RangeKey::Historical(HistoricalRange::YearToDate) => "YTD",
            RangeKey::Historical(HistoricalRange::AllTime) => "All",
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, RangeKey::Live(_))
    }
}

impl FromStr for RangeKey {
    type Err = RangeKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = match s {
            "1m" => RangeKey::Live(LiveWindow::OneMinute),
            "5m" => RangeKey::Live(LiveWindow::FiveMinutes),
            "30m" => RangeKey::Live(LiveWindow::ThirtyMinutes),
            "1h" => RangeKey::Historical(HistoricalRange::LastHour),
            "24h" => RangeKey::Historical(HistoricalRange::LastDay),
            "7d" => RangeKey::Historical(HistoricalRange::LastWeek),
            "1mo" => RangeKey::Historical(HistoricalRange::LastMonth),
            "YTD" => RangeKey::Historical(HistoricalRange::YearToDate),
            "All" => RangeKey::Historical(HistoricalRange::AllTime),
            other => return Err(RangeKeyError(other.to_string())),
        };
        Ok(key)
    }
}

impl fmt::Display for RangeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for RangeKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range_keys() {
        for key in ["1m", "5m", "30m", "1h", "24h", "7d", "1mo", "YTD", "All"] {
            let parsed: RangeKey = key.parse().unwrap();
            assert_eq!(parsed.as_str(), key);
        }
        assert!("2w".parse::<RangeKey>().is_err());
        assert_eq!(RangeKey::default().as_str(), "5m");
    }

    #[test]
    fn test_live_windows() {
        assert!("30m".parse::<RangeKey>().unwrap().is_live());
        assert!(!"1h".parse::<RangeKey>().unwrap().is_live());
        assert_eq!(LiveWindow::OneMinute.seconds(), 60);
        assert_eq!(LiveWindow::ThirtyMinutes.seconds(), 1800);
    }

    #[test]
    fn test_resolve_historical_ranges() {
        let now = Utc.with_ymd_and_hms(2024, 3, 31, 10, 30, 0).unwrap();

        let (start, end) = HistoricalRange::LastHour.resolve(now);
        assert_eq!(end, now);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 31, 9, 30, 0).unwrap());

        let (start, _) = HistoricalRange::LastWeek.resolve(now);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 24, 10, 30, 0).unwrap());

        // Calendar month back clamps to the end of February.
        let (start, _) = HistoricalRange::LastMonth.resolve(now);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 2, 29, 10, 30, 0).unwrap());

        let (start, _) = HistoricalRange::YearToDate.resolve(now);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());

        let (start, _) = HistoricalRange::AllTime.resolve(now);
        assert_eq!(start.timestamp(), 0);
    }
}
