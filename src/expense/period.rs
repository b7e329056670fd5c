use std::str::FromStr;

use chrono::{Datelike, Days, NaiveDate};

use crate::error::ServerError;

/// Symbolic time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpendPeriod {
    /// Since the first day of the current month.
    Month,
    /// Since the most recent Sunday.
    Week,
    Today,
}

/// Date filter derived from a [`SpendPeriod`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRange {
    /// `date >= boundary`.
    Since(NaiveDate),
    /// `date = boundary`.
    On(NaiveDate),
}

impl FromStr for SpendPeriod {
    type Err = ServerError;

    fn from_str(period: &str) -> Result<Self, Self::Err> {
        match period.trim().to_lowercase().as_str() {
            "month" => Ok(SpendPeriod::Month),
            "week" => Ok(SpendPeriod::Week),
            "today" => Ok(SpendPeriod::Today),
            _ => Err(ServerError::InvalidPeriod(period.to_owned())),
        }
    }
}

impl std::fmt::Display for SpendPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpendPeriod::Month => write!(f, "month"),
            SpendPeriod::Week => write!(f, "week"),
            SpendPeriod::Today => write!(f, "today"),
        }
    }
}

impl SpendPeriod {
    /// First day covered by the period, at 00:00 UTC.
    pub fn boundary(self, today: NaiveDate) -> NaiveDate {
        match self {
            SpendPeriod::Month => today.with_day(1).unwrap_or(today),
            SpendPeriod::Week => today
                .checked_sub_days(Days::new(
                    today.weekday().num_days_from_sunday().into(),
                ))
                .unwrap_or(today),
            SpendPeriod::Today => today,
        }
    }

    pub fn range(self, today: NaiveDate) -> DateRange {
        match self {
            SpendPeriod::Today => DateRange::On(today),
            period => DateRange::Since(period.boundary(today)),
        }
    }
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        match *self {
            DateRange::Since(boundary) => date >= boundary,
            DateRange::On(boundary) => date == boundary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2018, 3, day).unwrap()
    }

    #[test]
    fn test_parse_period() {
        assert_eq!("month".parse::<SpendPeriod>().unwrap(), SpendPeriod::Month);
        assert_eq!(" Week ".parse::<SpendPeriod>().unwrap(), SpendPeriod::Week);
        assert_eq!("today".parse::<SpendPeriod>().unwrap(), SpendPeriod::Today);

        let err = "foo".parse::<SpendPeriod>().unwrap_err();
        assert_eq!(err.to_string(), "foo is an invalid period");
    }

    #[test]
    fn test_boundaries() {
        // 2018-03-12 is a Monday.
        let today = date(12);

        assert_eq!(SpendPeriod::Month.boundary(today), date(1));
        assert_eq!(SpendPeriod::Week.boundary(today), date(11));
        assert_eq!(SpendPeriod::Today.boundary(today), today);

        // a Sunday is its own boundary.
        assert_eq!(SpendPeriod::Week.boundary(date(18)), date(18));
        assert_eq!(SpendPeriod::Week.boundary(date(17)), date(11));
    }

    #[test]
    fn test_ranges() {
        let today = date(12);

        assert_eq!(SpendPeriod::Today.range(today), DateRange::On(today));
        assert!(SpendPeriod::Week.range(today).contains(date(15)));
        assert!(!SpendPeriod::Week.range(today).contains(date(10)));
        assert!(!SpendPeriod::Today.range(today).contains(date(13)));
    }
}
