//! Compiles the text of a single cron field into a [`FieldSet`].
//!
//! Each field is a comma separated list of parts, where a part is a `*`, a value, or a
//! range of values, optionally followed by a `/` and a step. A `*` is the range
//! covering every value of the field, so `*/15` and `0-59/15` are the same minutes.
//! A value with a step but no range end runs to the max value of the field, so `5/20`
//! is `5-59/20` for minutes.
//!
//! [`FieldSet`]: ../bits/trait.FieldSet.html

use crate::bits::FieldSet;
use core::fmt::{self, Display, Formatter};
use nom::{
    branch::alt,
    character::complete::{char, digit1},
    combinator::{map, map_res, opt},
    sequence::{preceded, separated_pair},
    IResult,
};

/// The inclusive range of valid values for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldBounds {
    /// The min value
    pub min: u32,
    /// The max value
    pub max: u32,
}

impl FieldBounds {
    /// Returns whether the value is inside the bounds.
    #[inline]
    pub const fn contains(&self, value: u32) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Minutes in an hour, 0-59
pub const MINUTE_BOUNDS: FieldBounds = FieldBounds { min: 0, max: 59 };
/// Hours in a day, 0-23
pub const HOUR_BOUNDS: FieldBounds = FieldBounds { min: 0, max: 23 };
/// Days in a month, 1-31
pub const DAY_OF_MONTH_BOUNDS: FieldBounds = FieldBounds { min: 1, max: 31 };
/// Months in a year, 1-12
pub const MONTH_BOUNDS: FieldBounds = FieldBounds { min: 1, max: 12 };
/// Days in a week, 0-6 (Sun-Sat)
pub const DAY_OF_WEEK_BOUNDS: FieldBounds = FieldBounds { min: 0, max: 6 };

/// One of the five fields of a cron expression, in the order they're written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// The first field
    Minute,
    /// The second field
    Hour,
    /// The third field
    DayOfMonth,
    /// The fourth field
    Month,
    /// The fifth field
    DayOfWeek,
}

impl Field {
    /// Returns the range of valid values for this field.
    #[inline]
    pub const fn bounds(self) -> FieldBounds {
        match self {
            Field::Minute => MINUTE_BOUNDS,
            Field::Hour => HOUR_BOUNDS,
            Field::DayOfMonth => DAY_OF_MONTH_BOUNDS,
            Field::Month => MONTH_BOUNDS,
            Field::DayOfWeek => DAY_OF_WEEK_BOUNDS,
        }
    }
}

impl Display for Field {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Field::Minute => "minute",
            Field::Hour => "hour",
            Field::DayOfMonth => "day of month",
            Field::Month => "month",
            Field::DayOfWeek => "day of week",
        }
        .fmt(f)
    }
}

/// The reason an expression was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The expression didn't have exactly five fields. Contains the number found.
    FieldCount(usize),
    /// A field contained something other than values, ranges, steps, and `*`.
    Syntax,
    /// A value was outside the bounds of its field.
    OutOfRange,
    /// A range ended before it started, like `5-3`.
    ReversedRange,
    /// A step of zero.
    ZeroStep,
}

/// An error indicating that the provided cron expression is invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InvalidExpression {
    field: Option<Field>,
    kind: ErrorKind,
}

impl InvalidExpression {
    #[inline]
    pub(crate) fn new(field: Option<Field>, kind: ErrorKind) -> Self {
        Self { field, kind }
    }

    /// The field that failed to compile, or none if the expression as a whole was malformed.
    #[inline]
    pub fn field(&self) -> Option<Field> {
        self.field
    }

    /// The reason the expression was rejected.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl Display for InvalidExpression {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        "Invalid cron expression: ".fmt(f)?;
        match (self.kind, self.field) {
            (ErrorKind::FieldCount(count), _) => {
                write!(f, "expected 5 fields, found {}", count)
            }
            (kind, Some(field)) => match kind {
                ErrorKind::OutOfRange => {
                    let FieldBounds { min, max } = field.bounds();
                    write!(f, "{} values must be within {}-{}", field, min, max)
                }
                ErrorKind::ReversedRange => write!(f, "{} range ends before it starts", field),
                ErrorKind::ZeroStep => write!(f, "{} step must be at least 1", field),
                _ => write!(f, "malformed {} field", field),
            },
            (_, None) => "malformed expression".fmt(f),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for InvalidExpression {}

/// The values covered by a part before its step is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PartRange {
    /// A `*`
    All,
    /// A single value
    One(u32),
    /// A `-` between two values
    Range(u32, u32),
}

/// One comma separated part of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PartExpr {
    range: PartRange,
    step: Option<u32>,
}

fn number(input: &str) -> IResult<&str, u32> {
    map_res(digit1, |s: &str| s.parse::<u32>())(input)
}

fn part_range(input: &str) -> IResult<&str, PartRange> {
    alt((
        map(char('*'), |_| PartRange::All),
        map(separated_pair(number, char('-'), number), |(start, end)| {
            PartRange::Range(start, end)
        }),
        map(number, PartRange::One),
    ))(input)
}

fn part_expr(input: &str) -> IResult<&str, PartExpr> {
    let (input, range) = part_range(input)?;
    let (input, step) = opt(preceded(char('/'), number))(input)?;
    Ok((input, PartExpr { range, step }))
}

fn comma(input: &str) -> IResult<&str, Option<char>> {
    opt(char(','))(input)
}

/// Compiles the text of one field into the set of values it allows.
///
/// The bounds of the field come from the set type, so the same text can mean different
/// values depending on where it appears.
///
/// # Example
/// ```
/// use minicron::bits::{FieldSet, Hours, Minutes};
/// use minicron::parse;
///
/// let minutes: Minutes = parse::field("*/20").unwrap();
/// assert_eq!(vec![0, 20, 40], minutes.values().collect::<Vec<_>>());
///
/// let hours: Hours = parse::field("20/2").unwrap();
/// assert_eq!(vec![20, 22], hours.values().collect::<Vec<_>>());
///
/// assert!(parse::field::<Hours>("24").is_err());
/// ```
pub fn field<S: FieldSet>(text: &str) -> Result<S, InvalidExpression> {
    let syntax = || InvalidExpression::new(Some(S::FIELD), ErrorKind::Syntax);

    let mut input = text;
    let mut set = S::EMPTY;
    loop {
        let (rest, expr) = part_expr(input).map_err(|_| syntax())?;
        set = set.union(compile_part(expr)?);

        input = match comma(rest) {
            Ok((rest, Some(_))) => rest,
            Ok(("", None)) => break Ok(set),
            _ => break Err(syntax()),
        };
    }
}

fn compile_part<S: FieldSet>(expr: PartExpr) -> Result<S, InvalidExpression> {
    let reject = |kind| Err(InvalidExpression::new(Some(S::FIELD), kind));
    let bounds = S::FIELD.bounds();

    let (start, end) = match (expr.range, expr.step) {
        (PartRange::All, _) => (bounds.min, bounds.max),
        (PartRange::One(start), Some(_)) => (start, bounds.max),
        (PartRange::One(value), None) => (value, value),
        (PartRange::Range(start, end), _) => (start, end),
    };

    if !bounds.contains(start) || !bounds.contains(end) {
        return reject(ErrorKind::OutOfRange);
    }

    if end < start {
        return reject(ErrorKind::ReversedRange);
    }

    match expr.step.unwrap_or(1) {
        0 => reject(ErrorKind::ZeroStep),
        step => Ok(S::range(start, end, step)),
    }
}
