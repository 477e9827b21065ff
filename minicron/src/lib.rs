//! A five-field cron parser that finds the next time a schedule fires in any timezone.
//!
//! Expressions are written as `minute hour day-of-month month day-of-week` where each
//! field is a comma separated list of values (`5`), ranges (`1-5`), steps (`*/15`, `1-30/2`,
//! `10/5`), or `*`. A day only matches if both its day of the month and its day of the week
//! are in the expression.
//!
//! # Example
//! ```
//! use chrono::prelude::*;
//! use minicron::Schedule;
//!
//! // midnight on every first of the month that's also a monday
//! let schedule = Schedule::parse("0 0 1 * 1", Utc).expect("Couldn't parse expression!");
//!
//! let next = schedule.next(&Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap());
//! assert_eq!(next, Ok(Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap()));
//! ```

#![cfg_attr(not(any(feature = "std", test)), no_std)]

pub mod bits;
pub mod parse;

use chrono::{prelude::*, Duration, LocalResult};

use core::fmt::{self, Display, Formatter};
use core::iter::FusedIterator;
use core::str::FromStr;
use tracing::{debug, trace};

use self::bits::{DaysOfMonth, DaysOfWeek, FieldSet, Hours, Minutes, Months};
pub use self::parse::{ErrorKind, Field, InvalidExpression};

pub(crate) mod internal {
    pub trait Sealed {}
}

/// How many years past the year of the start time a search looks for a matching time.
pub const YEAR_LIMIT: i32 = 5;

/// Upper bound on the number of candidate times a single search can visit. Every restart
/// moves the candidate forward to the next minute, hour, day, month, or year, so this is
/// never reached before the year limit is.
const MAX_SEARCH_STEPS: usize = (YEAR_LIMIT as usize + 1) * 366 * 24 * 4;

/// Returns the number of days in the month, 28-31
fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if year % 4 != 0 {
                28
            } else if year % 100 != 0 {
                29
            } else if year % 400 != 0 {
                28
            } else {
                29
            }
        }
        _ => unreachable!(),
    }
}

/// An error indicating that no time matching a schedule exists within [`YEAR_LIMIT`] years
/// of the start time.
///
/// [`YEAR_LIMIT`]: constant.YEAR_LIMIT.html
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaxYearExceeded;

impl Display for MaxYearExceeded {
    #[inline]
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        "No time matches the expression within the year limit".fmt(f)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for MaxYearExceeded {}

/// Any error returned by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Error {
    /// The expression failed to parse
    InvalidExpression(InvalidExpression),
    /// The search for a matching time gave up
    MaxYearExceeded(MaxYearExceeded),
}

impl From<InvalidExpression> for Error {
    fn from(err: InvalidExpression) -> Self {
        Error::InvalidExpression(err)
    }
}

impl From<MaxYearExceeded> for Error {
    fn from(err: MaxYearExceeded) -> Self {
        Error::MaxYearExceeded(err)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Error::InvalidExpression(err) => err.fmt(f),
            Error::MaxYearExceeded(err) => err.fmt(f),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::InvalidExpression(err) => Some(err),
            Error::MaxYearExceeded(err) => Some(err),
        }
    }
}

/// A compiled cron expression paired with the timezone its times are read in.
///
/// Schedules are immutable and can be shared between threads and searched from as many
/// times as needed.
///
/// # Example
/// ```
/// use chrono::prelude::*;
/// use minicron::Schedule;
///
/// let schedule: Schedule<Utc> = "*/10 0 * 10 1".parse().expect("Couldn't parse expression!");
///
/// // check if a given time is contained in the schedule
/// assert!(schedule.contains(&Utc.with_ymd_and_hms(2020, 10, 19, 0, 30, 0).unwrap()));
///
/// // iterate over upcoming times
/// let start = Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap();
/// for time in schedule.iter_after(&start).take(5) {
///     // Prints
///     // 1970-10-05 00:00:00 UTC
///     // 1970-10-05 00:10:00 UTC
///     // 1970-10-05 00:20:00 UTC
///     // 1970-10-05 00:30:00 UTC
///     // 1970-10-05 00:40:00 UTC
///     println!("{}", time);
///     assert!(schedule.contains(&time));
/// }
/// ```
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct Schedule<Tz> {
    minutes: Minutes,
    hours: Hours,
    doms: DaysOfMonth,
    months: Months,
    dows: DaysOfWeek,
    tz: Tz,
}

impl FromStr for Schedule<Utc> {
    type Err = InvalidExpression;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s, Utc)
    }
}

/// The fields checked by a search, coarsest first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Month,
    Day,
    Hour,
    Minute,
}

/// The result of checking one field of a candidate time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Check {
    /// The field matches
    Pass,
    /// The field doesn't match. The search restarts from the given time, or gives up if the
    /// time can't be represented.
    Carry(Stage, Option<NaiveDateTime>),
}

impl Check {
    #[inline]
    fn or_else<F: FnOnce() -> Check>(self, f: F) -> Check {
        match self {
            Check::Pass => f(),
            carry => carry,
        }
    }
}

impl<Tz: TimeZone> Schedule<Tz> {
    /// Parses a cron expression into a schedule read in the given timezone.
    ///
    /// # Example
    /// ```
    /// use chrono::Utc;
    /// use minicron::{ErrorKind, Field, Schedule};
    ///
    /// assert!(Schedule::parse("*/5 9-17 * * 1-5", Utc).is_ok());
    ///
    /// let err = Schedule::parse("60 * * * *", Utc).unwrap_err();
    /// assert_eq!(Some(Field::Minute), err.field());
    /// assert_eq!(ErrorKind::OutOfRange, err.kind());
    ///
    /// let err = Schedule::parse("* * * *", Utc).unwrap_err();
    /// assert_eq!(ErrorKind::FieldCount(4), err.kind());
    /// ```
    pub fn parse(expression: &str, tz: Tz) -> Result<Self, InvalidExpression> {
        Self::compile(expression, tz).map_err(|err| {
            debug!(expression, error = %err, "rejected cron expression");
            err
        })
    }

    /// Parses a cron expression like [`parse`], but panics if the expression is invalid.
    /// Only use this with expressions known to be valid, like ones written into the program.
    ///
    /// # Panics
    ///
    /// Panics if the expression is invalid.
    ///
    /// [`parse`]: #method.parse
    pub fn must_parse(expression: &str, tz: Tz) -> Self {
        match Self::parse(expression, tz) {
            Ok(schedule) => schedule,
            Err(err) => panic!("{}", err),
        }
    }

    fn compile(expression: &str, tz: Tz) -> Result<Self, InvalidExpression> {
        let mut fields = expression.split_whitespace();
        match (
            fields.next(),
            fields.next(),
            fields.next(),
            fields.next(),
            fields.next(),
            fields.next(),
        ) {
            (Some(minutes), Some(hours), Some(doms), Some(months), Some(dows), None) => Ok(Self {
                minutes: parse::field(minutes)?,
                hours: parse::field(hours)?,
                doms: parse::field(doms)?,
                months: parse::field(months)?,
                dows: parse::field(dows)?,
                tz,
            }),
            _ => Err(InvalidExpression::new(
                None,
                ErrorKind::FieldCount(expression.split_whitespace().count()),
            )),
        }
    }

    /// Returns the timezone times are read in.
    #[inline]
    pub fn timezone(&self) -> &Tz {
        &self.tz
    }

    /// Returns the minutes in the schedule.
    #[inline]
    pub fn minutes(&self) -> Minutes {
        self.minutes
    }

    /// Returns the hours in the schedule.
    #[inline]
    pub fn hours(&self) -> Hours {
        self.hours
    }

    /// Returns the days of the month in the schedule.
    #[inline]
    pub fn days_of_month(&self) -> DaysOfMonth {
        self.doms
    }

    /// Returns the months in the schedule.
    #[inline]
    pub fn months(&self) -> Months {
        self.months
    }

    /// Returns the days of the week in the schedule.
    #[inline]
    pub fn days_of_week(&self) -> DaysOfWeek {
        self.dows
    }

    /// Returns whether the schedule matches the minute of the given time once it's read in
    /// the schedule's timezone. Seconds are ignored.
    pub fn contains<Z: TimeZone>(&self, time: &DateTime<Z>) -> bool {
        let local = time.with_timezone(&self.tz).naive_local();

        self.months.contains(local.month())
            && self.contains_day(local.date())
            && self.hours.contains(local.hour())
            && self.minutes.contains(local.minute())
    }

    #[inline]
    fn contains_day(&self, date: NaiveDate) -> bool {
        self.doms.contains(date.day()) && self.dows.contains(date.weekday().num_days_from_sunday())
    }

    /// Returns the first time after the given time (exclusive) that matches the schedule, in
    /// the schedule's timezone.
    ///
    /// Times are matched by their local time in the schedule's timezone. Local times skipped
    /// by the timezone (like the hour lost when clocks move forward) never match. Local times
    /// that happen twice match at the first occurrence after the given time.
    ///
    /// # Errors
    ///
    /// Returns [`MaxYearExceeded`] if no matching time exists before the end of the year
    /// [`YEAR_LIMIT`] years after the year of the given time.
    ///
    /// # Example
    /// ```
    /// use chrono::prelude::*;
    /// use minicron::{MaxYearExceeded, Schedule};
    ///
    /// let schedule = Schedule::parse("59 23 1 * 1", Utc).unwrap();
    /// let start = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 0).unwrap();
    /// assert_eq!(
    ///     schedule.next(&start),
    ///     Ok(Utc.with_ymd_and_hms(2025, 9, 1, 23, 59, 0).unwrap())
    /// );
    ///
    /// // there's never a 31st of february
    /// let never = Schedule::parse("* * 31 2 *", Utc).unwrap();
    /// assert_eq!(never.next(&start), Err(MaxYearExceeded));
    /// ```
    ///
    /// [`MaxYearExceeded`]: struct.MaxYearExceeded.html
    /// [`YEAR_LIMIT`]: constant.YEAR_LIMIT.html
    pub fn next<Z: TimeZone>(&self, after: &DateTime<Z>) -> Result<DateTime<Tz>, MaxYearExceeded> {
        let after = after.with_timezone(&self.tz);
        let start = after.naive_local();

        let first = minute_floor(start)
            .and_then(next_minute)
            .ok_or(MaxYearExceeded)?;
        let end = start_of_month(start.year() + YEAR_LIMIT + 1, 1).ok_or(MaxYearExceeded)?;

        let next = self.search(first, end, |local| self.resolve(local, &after));
        match self.next_repeated(&after, first) {
            Some(repeated) => match next {
                Ok(next) if next < repeated => Ok(next),
                _ => Ok(repeated),
            },
            None => next,
        }
    }

    /// Walks local times forward from the candidate until one matches every field and is
    /// accepted, giving up once the candidate reaches `end`.
    fn search<F>(
        &self,
        mut candidate: NaiveDateTime,
        end: NaiveDateTime,
        accept: F,
    ) -> Result<DateTime<Tz>, MaxYearExceeded>
    where
        F: Fn(&NaiveDateTime) -> Option<DateTime<Tz>>,
    {
        for _ in 0..MAX_SEARCH_STEPS {
            if candidate >= end {
                debug!(%end, "no matching time before the end of the search");
                return Err(MaxYearExceeded);
            }

            candidate = match self.check(candidate) {
                Check::Carry(stage, Some(next)) => {
                    trace!(?stage, from = %candidate, to = %next, "carried");
                    next
                }
                Check::Carry(stage, None) => {
                    debug!(?stage, %candidate, "carried past the last representable time");
                    return Err(MaxYearExceeded);
                }
                Check::Pass => match accept(&candidate) {
                    Some(time) => return Ok(time),
                    None => {
                        trace!(%candidate, "local time has no matching time after the start");
                        next_minute(candidate).ok_or(MaxYearExceeded)?
                    }
                },
            };
        }

        debug!(%end, "gave up after the max number of search steps");
        Err(MaxYearExceeded)
    }

    /// When clocks go back, the local times just before the change happen a second time.
    /// If the start is in the first pass over those times, this finds the first matching
    /// time in the second pass over the local times up to `end`. Matching local times
    /// past that are found by the forward search, in their first pass.
    fn next_repeated(&self, after: &DateTime<Tz>, end: NaiveDateTime) -> Option<DateTime<Tz>> {
        let start = after.naive_local();
        let repeat = match self.tz.from_local_datetime(&start) {
            LocalResult::Ambiguous(earliest, latest) if *after < latest => {
                latest.signed_duration_since(earliest)
            }
            _ => return None,
        };

        let first = start.checked_sub_signed(repeat).and_then(minute_floor)?;
        let repeated = self.search(first, end, |local| match self.tz.from_local_datetime(local) {
            LocalResult::Ambiguous(_, latest) if latest > *after => Some(latest),
            _ => None,
        });
        repeated.ok()
    }

    /// Checks every field of the candidate from the month down, stopping at the first one
    /// that doesn't match.
    #[inline]
    fn check(&self, candidate: NaiveDateTime) -> Check {
        self.check_month(candidate)
            .or_else(|| self.check_day(candidate))
            .or_else(|| self.check_hour(candidate))
            .or_else(|| self.check_minute(candidate))
    }

    fn check_month(&self, candidate: NaiveDateTime) -> Check {
        let month = candidate.month();
        if self.months.contains(month) {
            return Check::Pass;
        }

        let next = match self.months.first_set_from(month + 1) {
            Some(next_month) => start_of_month(candidate.year(), next_month),
            None => start_of_month(candidate.year() + 1, 1),
        };
        Check::Carry(Stage::Month, next)
    }

    fn check_day(&self, candidate: NaiveDateTime) -> Check {
        let date = candidate.date();
        if self.contains_day(date) {
            return Check::Pass;
        }

        // both masks are checked again once the search restarts from the new day
        let days = days_in_month(date.year(), date.month());
        let next = match self
            .doms
            .first_set_from(date.day() + 1)
            .filter(|&day| day <= days)
        {
            Some(next_day) => date.with_day(next_day).and_then(start_of_day),
            None => next_month(date),
        };
        Check::Carry(Stage::Day, next)
    }

    fn check_hour(&self, candidate: NaiveDateTime) -> Check {
        let hour = candidate.hour();
        if self.hours.contains(hour) {
            return Check::Pass;
        }

        let date = candidate.date();
        let next = match self.hours.first_set_from(hour + 1) {
            Some(next_hour) => date.and_hms_opt(next_hour, 0, 0),
            None => date.succ_opt().and_then(start_of_day),
        };
        Check::Carry(Stage::Hour, next)
    }

    fn check_minute(&self, candidate: NaiveDateTime) -> Check {
        let minute = candidate.minute();
        if self.minutes.contains(minute) {
            return Check::Pass;
        }

        let next = match self.minutes.first_set_from(minute + 1) {
            Some(next) => candidate.with_minute(next),
            None => candidate
                .date()
                .and_hms_opt(candidate.hour(), 0, 0)
                .and_then(|hour| hour.checked_add_signed(Duration::hours(1))),
        };
        Check::Carry(Stage::Minute, next)
    }

    /// Maps a matching local time to a time in the timezone that comes after the start.
    fn resolve(&self, local: &NaiveDateTime, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        match self.tz.from_local_datetime(local) {
            LocalResult::Single(time) => Some(time),
            LocalResult::Ambiguous(earliest, latest) => {
                if earliest > *after {
                    Some(earliest)
                } else {
                    Some(latest)
                }
            }
            LocalResult::None => None,
        }
        .filter(|time| time > after)
    }

    /// Creates an iterator of the times matching the schedule after the given time, in
    /// order. Each time is found by calling [`next`] with the time before it, so the year
    /// limit applies between consecutive times rather than to the whole iterator.
    ///
    /// The iterator ends once [`next`] returns an error.
    ///
    /// # Example
    /// ```
    /// use chrono::prelude::*;
    /// use minicron::Schedule;
    ///
    /// let schedule = Schedule::parse("*/10 * * * *", Utc).expect("Couldn't parse expression!");
    /// let start = Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap();
    /// for time in schedule.iter_after(&start).take(5) {
    ///     // Prints
    ///     // 1970-01-01 00:10:00 UTC
    ///     // 1970-01-01 00:20:00 UTC
    ///     // 1970-01-01 00:30:00 UTC
    ///     // 1970-01-01 00:40:00 UTC
    ///     // 1970-01-01 00:50:00 UTC
    ///     println!("{}", time)
    /// }
    /// ```
    ///
    /// [`next`]: #method.next
    pub fn iter_after<Z: TimeZone>(&self, start: &DateTime<Z>) -> UpcomingTimes<'_, Tz> {
        UpcomingTimes {
            schedule: self,
            last: Some(start.with_timezone(&self.tz)),
        }
    }
}

#[inline]
fn minute_floor(dt: NaiveDateTime) -> Option<NaiveDateTime> {
    dt.date().and_hms_opt(dt.hour(), dt.minute(), 0)
}

#[inline]
fn next_minute(dt: NaiveDateTime) -> Option<NaiveDateTime> {
    dt.checked_add_signed(Duration::minutes(1))
}

#[inline]
fn start_of_day(d: NaiveDate) -> Option<NaiveDateTime> {
    d.and_hms_opt(0, 0, 0)
}

#[inline]
fn start_of_month(year: i32, month: u32) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(year, month, 1).and_then(start_of_day)
}

/// Gets the start of the month after the one the date is in.
#[inline]
fn next_month(d: NaiveDate) -> Option<NaiveDateTime> {
    match d.month() {
        12 => start_of_month(d.year() + 1, 1),
        month => start_of_month(d.year(), month + 1),
    }
}

/// An iterator over the times matching a schedule. Created with [`Schedule::iter_after`].
///
/// [`Schedule::iter_after`]: struct.Schedule.html#method.iter_after
#[derive(Debug, Clone)]
pub struct UpcomingTimes<'a, Tz: TimeZone> {
    schedule: &'a Schedule<Tz>,
    last: Option<DateTime<Tz>>,
}

impl<'a, Tz: TimeZone> Iterator for UpcomingTimes<'a, Tz> {
    type Item = DateTime<Tz>;

    fn next(&mut self) -> Option<Self::Item> {
        let last = self.last.take()?;
        let next = self.schedule.next(&last).ok()?;
        self.last = Some(next.clone());
        Some(next)
    }
}

impl<'a, Tz: TimeZone> FusedIterator for UpcomingTimes<'a, Tz> {}
