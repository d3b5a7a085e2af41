// Backend connectivity status
use chrono::{DateTime, Local, TimeZone, Utc};
use serde::Serialize;
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    /// No probe has completed yet in this session.
    Connecting,
    Online,
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    /// Instant of the last successful probe. Only ever moves forward on success.
    pub last_seen: Option<DateTime<Utc>>,
}

impl ConnectionStatus {
    pub fn connecting(last_seen: Option<DateTime<Utc>>) -> Self {
        Self {
            state: ConnectionState::Connecting,
            last_seen,
        }
    }

    pub fn online(at: DateTime<Utc>) -> Self {
        Self {
            state: ConnectionState::Online,
            last_seen: Some(at),
        }
    }

    /// Keeps `last_seen` from the previous status.
    pub fn offline(&self) -> Self {
        Self {
            state: ConnectionState::Offline,
            last_seen: self.last_seen,
        }
    }

    pub fn is_offline(&self) -> bool {
        self.state == ConnectionState::Offline
    }
}

/// Formats a last-seen instant as a 24-hour local wall-clock time, or `Never`.
pub fn format_last_seen(last_seen: Option<DateTime<Utc>>) -> String {
    format_last_seen_in(last_seen, &Local)
}

pub fn format_last_seen_in<Tz>(last_seen: Option<DateTime<Utc>>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    match last_seen {
        Some(ts) => ts.with_timezone(tz).format("%H:%M:%S").to_string(),
        None => "Never".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    #[test]
    fn test_format_last_seen() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 21, 4, 9).unwrap();
        assert_eq!(format_last_seen_in(Some(ts), &Utc), "21:04:09");
        let cet = FixedOffset::east_opt(3600).unwrap();
        assert_eq!(format_last_seen_in(Some(ts), &cet), "22:04:09");
        assert_eq!(format_last_seen_in(None, &Utc), "Never");
        assert_eq!(format_last_seen(None), "Never");
    }

    #[test]
    fn test_offline_keeps_last_seen() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 21, 4, 9).unwrap();
        let offline = ConnectionStatus::online(ts).offline();
        assert_eq!(offline.state, ConnectionState::Offline);
        assert_eq!(offline.last_seen, Some(ts));
        assert!(offline.is_offline());
        assert!(!ConnectionStatus::connecting(None).is_offline());
    }
}
