//! Trading calendar: US market holidays over a forward horizon.
//!
//! Built from the US federal holiday rules, minus Columbus Day and Veterans
//! Day (markets open), plus Good Friday (markets closed). Fixed-date holidays
//! falling on a weekend are observed on the nearest weekday.

use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// Days past the reference date the calendar covers.
pub const HORIZON_DAYS: i64 = 2500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Holiday {
    NewYearsDay,
    MartinLutherKingJrDay,
    PresidentsDay,
    GoodFriday,
    MemorialDay,
    Juneteenth,
    IndependenceDay,
    LaborDay,
    ColumbusDay,
    VeteransDay,
    ThanksgivingDay,
    ChristmasDay,
}

/// The US federal holiday set.
pub const US_FEDERAL: [Holiday; 11] = [
    Holiday::NewYearsDay,
    Holiday::MartinLutherKingJrDay,
    Holiday::PresidentsDay,
    Holiday::MemorialDay,
    Holiday::Juneteenth,
    Holiday::IndependenceDay,
    Holiday::LaborDay,
    Holiday::ColumbusDay,
    Holiday::VeteransDay,
    Holiday::ThanksgivingDay,
    Holiday::ChristmasDay,
];

/// Federal holidays on which the market trades.
pub const MARKET_OPEN: [Holiday; 2] = [Holiday::ColumbusDay, Holiday::VeteransDay];

/// Market holidays that are not federal holidays.
pub const MARKET_ONLY: [Holiday; 1] = [Holiday::GoodFriday];

enum Rule {
    /// Fixed month/day, moved to the nearest weekday.
    Fixed { month: u32, day: u32 },
    /// n-th weekday of the month (1-based).
    Nth { month: u32, weekday: Weekday, n: u8 },
    Last { month: u32, weekday: Weekday },
    /// Offset in days from Easter Sunday.
    Easter(i64),
}

impl Rule {
    const fn fixed(month: u32, day: u32) -> Self {
        Rule::Fixed { month, day }
    }

    const fn nth(month: u32, weekday: Weekday, n: u8) -> Self {
        Rule::Nth { month, weekday, n }
    }

    const fn last(month: u32, weekday: Weekday) -> Self {
        Rule::Last { month, weekday }
    }
}

impl Holiday {
    fn rule(self) -> Rule {
        use Weekday::{Mon, Thu};
        match self {
            Holiday::NewYearsDay => Rule::fixed(1, 1),
            Holiday::MartinLutherKingJrDay => Rule::nth(1, Mon, 3),
            Holiday::PresidentsDay => Rule::nth(2, Mon, 3),
            Holiday::GoodFriday => Rule::Easter(-2),
            Holiday::MemorialDay => Rule::last(5, Mon),
            Holiday::Juneteenth => Rule::fixed(6, 19),
            Holiday::IndependenceDay => Rule::fixed(7, 4),
            Holiday::LaborDay => Rule::nth(9, Mon, 1),
            Holiday::ColumbusDay => Rule::nth(10, Mon, 2),
            Holiday::VeteransDay => Rule::fixed(11, 11),
            Holiday::ThanksgivingDay => Rule::nth(11, Thu, 4),
            Holiday::ChristmasDay => Rule::fixed(12, 25),
        }
    }

    /// First year the holiday is observed.
    fn first_year(self) -> i32 {
        match self {
            Holiday::Juneteenth => 2021,
            _ => i32::MIN,
        }
    }

    /// Observed date in `year`, if the holiday exists that year.
    pub fn observed_in(self, year: i32) -> Option<NaiveDate> {
        if year < self.first_year() {
            return None;
        }
        match self.rule() {
            Rule::Fixed { month, day } => {
                NaiveDate::from_ymd_opt(year, month, day).map(nearest_workday)
            }
            Rule::Nth { month, weekday, n } => {
                NaiveDate::from_weekday_of_month_opt(year, month, weekday, n)
            }
            Rule::Last { month, weekday } => {
                NaiveDate::from_weekday_of_month_opt(year, month, weekday, 5)
                    .or_else(|| NaiveDate::from_weekday_of_month_opt(year, month, weekday, 4))
            }
            Rule::Easter(offset) => easter_sunday(year).map(|d| d + Duration::days(offset)),
        }
    }
}

/// Saturday → Friday, Sunday → Monday.
fn nearest_workday(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date - Duration::days(1),
        Weekday::Sun => date + Duration::days(1),
        _ => date,
    }
}

/// Gregorian Easter Sunday (anonymous Gregorian algorithm).
pub fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year.rem_euclid(19);
    let b = year.div_euclid(100);
    let c = year.rem_euclid(100);
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15).rem_euclid(30);
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k).rem_euclid(7);
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}

/// Rules that make up the market calendar.
pub fn market_holidays() -> Vec<Holiday> {
    US_FEDERAL
        .iter()
        .copied()
        .filter(|h| !MARKET_OPEN.contains(h))
        .chain(MARKET_ONLY)
        .collect()
}

/// Sorted, deduplicated non-trading dates over a fixed window. Immutable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradingCalendar {
    start: NaiveDate,
    end: NaiveDate,
    holidays: Vec<NaiveDate>,
}

impl TradingCalendar {
    /// Calendar over [today, today + HORIZON_DAYS].
    pub fn build(today: NaiveDate) -> Self {
        Self::between(today, today + Duration::days(HORIZON_DAYS))
    }

    /// Calendar over [start, end]. Rules are evaluated from the year before
    /// `start` to the year after `end` so observed dates that cross a year
    /// boundary are not lost.
    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        let rules = market_holidays();
        let mut holidays: Vec<NaiveDate> = (start.year() - 1..=end.year() + 1)
            .flat_map(|year| rules.iter().filter_map(move |h| h.observed_in(year)))
            .filter(|d| *d >= start && *d <= end)
            .collect();
        holidays.sort_unstable();
        holidays.dedup();
        Self {
            start,
            end,
            holidays,
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn holidays(&self) -> &[NaiveDate] {
        &self.holidays
    }

    pub fn len(&self) -> usize {
        self.holidays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holidays.is_empty()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.holidays.binary_search(&date).is_ok()
    }

    /// Weekday that is not a holiday.
    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !self.contains(date)
    }
}
