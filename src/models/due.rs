use jiff::{
    Timestamp, Zoned,
    civil::{Date, Time},
};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DueInstantiationError {
    #[error("Invalid due date '{0}' (try 'today', 'tomorrow 09:00' or '2025-03-01 18:30')")]
    Unrecognized(String),

    #[error("Due date '{0}' does not exist in the local time zone")]
    OutOfRange(String),
}

/// A due instant together with whether the user gave a time of day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Due {
    pub at: Timestamp,
    pub has_time: bool,
}

impl Due {
    /// Parses `today`, `tomorrow` or `YYYY-MM-DD`, optionally followed by
    /// `HH:MM`, or a bare `HH:MM` for today. Date-only input lands on the
    /// last minute of that day, in the zone of `now`.
    pub fn parse(input: &str, now: &Zoned) -> Result<Due, DueInstantiationError> {
        let unrecognized = || DueInstantiationError::Unrecognized(input.to_string());
        let mut normalized = input.trim().to_lowercase();
        if let Some((day, time)) = normalized.split_once('t') {
            if day.parse::<Date>().is_ok() {
                normalized = format!("{day} {time}");
            }
        }
        let mut parts = normalized.split_whitespace();

        let first = parts.next().ok_or_else(unrecognized)?;
        let second = parts.next();
        if parts.next().is_some() {
            return Err(unrecognized());
        }

        let today = now.date();
        let (date, time) = match (parse_day(first, today), second) {
            (Some(date), None) => (date, None),
            (Some(date), Some(time)) => (date, Some(parse_time(time).ok_or_else(unrecognized)?)),
            (None, None) => (today, Some(parse_time(first).ok_or_else(unrecognized)?)),
            (None, Some(_)) => return Err(unrecognized()),
        };

        let has_time = time.is_some();
        let time = time.unwrap_or_else(|| Time::constant(23, 59, 0, 0));
        let at = date
            .to_datetime(time)
            .to_zoned(now.time_zone().clone())
            .map_err(|_| DueInstantiationError::OutOfRange(input.to_string()))?
            .timestamp();

        Ok(Due { at, has_time })
    }
}

fn parse_day(token: &str, today: Date) -> Option<Date> {
    match token {
        "today" => Some(today),
        "tomorrow" => today.tomorrow().ok(),
        _ => token.parse::<Date>().ok(),
    }
}

fn parse_time(token: &str) -> Option<Time> {
    let (hour, minute) = token.split_once(':')?;
    let hour: i8 = hour.parse().ok()?;
    let minute: i8 = minute.parse().ok()?;
    Time::new(hour, minute, 0, 0).ok()
}

#[cfg(test)]
mod tests {
    use jiff::{civil::date, tz::TimeZone};

    use super::*;

    fn now() -> Zoned {
        date(2025, 5, 20)
            .at(14, 0, 0, 0)
            .to_zoned(TimeZone::UTC)
            .unwrap()
    }

    fn utc(y: i16, m: i8, d: i8, h: i8, min: i8) -> Timestamp {
        date(y, m, d)
            .at(h, min, 0, 0)
            .to_zoned(TimeZone::UTC)
            .unwrap()
            .timestamp()
    }

    #[test]
    fn test_relative_days_with_and_without_time() {
        assert_eq!(
            Due::parse("tomorrow 09:00", &now()),
            Ok(Due {
                at: utc(2025, 5, 21, 9, 0),
                has_time: true
            })
        );
        assert_eq!(
            Due::parse("Today", &now()),
            Ok(Due {
                at: utc(2025, 5, 20, 23, 59),
                has_time: false
            })
        );
        assert_eq!(Due::parse("18:30", &now()).unwrap().at, utc(2025, 5, 20, 18, 30));
    }

    #[test]
    fn test_absolute_dates() {
        assert_eq!(
            Due::parse("2025-03-01T18:30", &now()).unwrap().at,
            utc(2025, 3, 1, 18, 30)
        );
        let date_only = Due::parse("2025-03-01", &now()).unwrap();
        assert!(!date_only.has_time);
    }

    #[test]
    fn test_garbage_is_rejected() {
        for input in ["", "someday", "tomorrow 25:00", "2025-02-30", "today at 9"] {
            assert!(Due::parse(input, &now()).is_err(), "{input} should not parse");
        }
    }
}
