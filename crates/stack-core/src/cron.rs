//! Cron expression parsing and evaluation for schedule rules.
//!
//! Two spellings are accepted:
//!
//! - `cron(m h dom mon dow year)`: exactly six fields, day-of-week numbered `1-7` from Sunday,
//!   and exactly one of day-of-month / day-of-week must be `?`.
//! - bare `m h dom mon dow [year]`: five or six fields, day-of-week numbered `0-7` with both
//!   `0` and `7` meaning Sunday. `?` is accepted as a synonym for `*`.
//!
//! Fields support `*`, `?`, single values, `a-b` ranges, `/step` suffixes and comma lists.
//! Month and weekday names (`JAN`, `MON`) are accepted case-insensitively. Expressions are
//! evaluated in UTC.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{Datelike, NaiveDateTime, Timelike};

use crate::error::BindingError;

const MONTH_NAMES: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];
const WEEKDAY_NAMES: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialect {
    Wrapped,
    Bare,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Minute,
    Hour,
    DayOfMonth,
    Month,
    DayOfWeek,
    Year,
}

impl FieldKind {
    fn name(self) -> &'static str {
        match self {
            FieldKind::Minute => "minute",
            FieldKind::Hour => "hour",
            FieldKind::DayOfMonth => "day-of-month",
            FieldKind::Month => "month",
            FieldKind::DayOfWeek => "day-of-week",
            FieldKind::Year => "year",
        }
    }

    /// Inclusive bounds in the dialect's own numbering.
    fn bounds(self, dialect: Dialect) -> (u32, u32) {
        match (self, dialect) {
            (FieldKind::Minute, _) => (0, 59),
            (FieldKind::Hour, _) => (0, 23),
            (FieldKind::DayOfMonth, _) => (1, 31),
            (FieldKind::Month, _) => (1, 12),
            (FieldKind::DayOfWeek, Dialect::Wrapped) => (1, 7),
            (FieldKind::DayOfWeek, Dialect::Bare) => (0, 7),
            (FieldKind::Year, _) => (1970, 2199),
        }
    }

    fn allows_question_mark(self) -> bool {
        matches!(self, FieldKind::DayOfMonth | FieldKind::DayOfWeek)
    }
}

/// Values a field matches; `any` records a `*` or `?` wildcard.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Field {
    values: BTreeSet<u32>,
    any: bool,
    unspecified: bool,
}

impl Field {
    fn contains(&self, value: u32) -> bool {
        self.any || self.values.contains(&value)
    }

    fn single(&self) -> Option<u32> {
        if self.any || self.values.len() != 1 {
            return None;
        }
        self.values.iter().next().copied()
    }
}

/// Parsed and validated cron expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpression {
    source: String,
    minutes: Field,
    hours: Field,
    days_of_month: Field,
    months: Field,
    /// Sunday is `0`.
    days_of_week: Field,
    years: Option<Field>,
}

impl CronExpression {
    /// Parse `expression`, returning a `BindingError::MalformedSchedule` describing the
    /// first problem found.
    pub fn parse(expression: &str) -> Result<Self, BindingError> {
        let malformed = |reason: String| BindingError::MalformedSchedule {
            expression: expression.to_string(),
            reason,
        };

        let trimmed = expression.trim();
        let (dialect, body) = match trimmed
            .strip_prefix("cron(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            Some(inner) => (Dialect::Wrapped, inner),
            None if trimmed.starts_with("cron(") || trimmed.ends_with(')') => {
                return Err(malformed("unbalanced `cron(...)` wrapper".to_string()));
            }
            None => (Dialect::Bare, trimmed),
        };

        let fields: Vec<&str> = body.split_whitespace().collect();
        match (dialect, fields.len()) {
            (Dialect::Wrapped, 6) | (Dialect::Bare, 5) | (Dialect::Bare, 6) => {}
            (Dialect::Wrapped, count) => {
                return Err(malformed(format!(
                    "`cron(...)` expressions need 6 fields, found {count}"
                )));
            }
            (Dialect::Bare, count) => {
                return Err(malformed(format!(
                    "expected 5 or 6 fields, found {count}"
                )));
            }
        }

        let parse = |token: &str, kind: FieldKind| {
            parse_field(token, kind, dialect).map_err(malformed)
        };

        let minutes = parse(fields[0], FieldKind::Minute)?;
        let hours = parse(fields[1], FieldKind::Hour)?;
        let days_of_month = parse(fields[2], FieldKind::DayOfMonth)?;
        let months = parse(fields[3], FieldKind::Month)?;
        let days_of_week = parse(fields[4], FieldKind::DayOfWeek)?;
        let years = fields
            .get(5)
            .map(|token| parse(*token, FieldKind::Year))
            .transpose()?;

        if dialect == Dialect::Wrapped && days_of_month.unspecified == days_of_week.unspecified {
            return Err(malformed(
                "exactly one of day-of-month and day-of-week must be `?`".to_string(),
            ));
        }

        Ok(Self {
            source: trimmed.to_string(),
            minutes,
            hours,
            days_of_month,
            months,
            days_of_week,
            years,
        })
    }

    /// The expression as declared (surrounding whitespace trimmed).
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether the schedule fires at `time` (minute resolution, UTC; seconds are ignored).
    pub fn matches(&self, time: &NaiveDateTime) -> bool {
        if !self.minutes.contains(time.minute())
            || !self.hours.contains(time.hour())
            || !self.months.contains(time.month())
        {
            return false;
        }
        if let Some(years) = &self.years {
            let year = u32::try_from(time.year()).ok();
            if !years.any && !year.is_some_and(|year| years.contains(year)) {
                return false;
            }
        }
        let dom = self.days_of_month.contains(time.day());
        let dow = self
            .days_of_week
            .contains(time.weekday().num_days_from_sunday());
        // Classic cron: when both day fields are restricted, either may match.
        match (self.days_of_month.any, self.days_of_week.any) {
            (false, false) => dom || dow,
            _ => dom && dow,
        }
    }

    /// `(hour, minute)` when the expression fires exactly once every day.
    pub fn daily_at(&self) -> Option<(u32, u32)> {
        let every_day = self.days_of_month.any
            && self.days_of_week.any
            && self.months.any
            && self.years.as_ref().is_none_or(|years| years.any);
        if !every_day {
            return None;
        }
        Some((self.hours.single()?, self.minutes.single()?))
    }

    /// Short human-readable description.
    pub fn describe(&self) -> String {
        match self.daily_at() {
            Some((hour, minute)) => format!("daily at {hour:02}:{minute:02} UTC"),
            None => format!("custom schedule `{}` (UTC)", self.source),
        }
    }
}

impl fmt::Display for CronExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn parse_field(token: &str, kind: FieldKind, dialect: Dialect) -> Result<Field, String> {
    let name = kind.name();
    if token == "?" {
        if !kind.allows_question_mark() {
            return Err(format!("`?` is only allowed in day fields, not {name}"));
        }
        return Ok(Field {
            values: BTreeSet::new(),
            any: true,
            unspecified: true,
        });
    }

    let (min, max) = kind.bounds(dialect);
    let mut values = BTreeSet::new();
    let mut any = false;

    for item in token.split(',') {
        if item.is_empty() {
            return Err(format!("empty list item in {name} field `{token}`"));
        }
        let (range, step) = match item.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step
                    .parse()
                    .map_err(|_| format!("invalid step `{step}` in {name} field"))?;
                if step == 0 {
                    return Err(format!("step must be positive in {name} field"));
                }
                (range, Some(step))
            }
            None => (item, None),
        };

        let (start, end) = if range == "*" {
            if step.is_none() {
                any = true;
            }
            (min, max)
        } else if let Some((low, high)) = range.split_once('-') {
            let low = parse_value(low, kind, dialect)?;
            let high = parse_value(high, kind, dialect)?;
            if low > high {
                return Err(format!("descending range `{range}` in {name} field"));
            }
            (low, high)
        } else {
            let value = parse_value(range, kind, dialect)?;
            // `a/n` runs from `a` to the end of the field.
            (value, if step.is_some() { max } else { value })
        };

        let step = step.unwrap_or(1);
        let mut value = Some(start);
        while let Some(current) = value.filter(|current| *current <= end) {
            values.insert(normalise(current, kind, dialect));
            value = current.checked_add(step);
        }
    }

    Ok(Field {
        values,
        any,
        unspecified: false,
    })
}

fn parse_value(raw: &str, kind: FieldKind, dialect: Dialect) -> Result<u32, String> {
    let (min, max) = kind.bounds(dialect);
    let upper = raw.to_ascii_uppercase();
    let named = match kind {
        FieldKind::Month => MONTH_NAMES
            .iter()
            .position(|name| *name == upper)
            .map(|index| index as u32 + 1),
        FieldKind::DayOfWeek => WEEKDAY_NAMES
            .iter()
            .position(|name| *name == upper)
            .map(|index| match dialect {
                Dialect::Wrapped => index as u32 + 1,
                Dialect::Bare => index as u32,
            }),
        _ => None,
    };
    let value = match named {
        Some(value) => value,
        None if raw.contains(['L', 'W', '#']) => {
            return Err(format!(
                "`{raw}` uses unsupported {} modifiers (L, W, #)",
                kind.name()
            ));
        }
        None => raw
            .parse::<u32>()
            .map_err(|_| format!("invalid {} value `{raw}`", kind.name()))?,
    };
    if value < min || value > max {
        return Err(format!(
            "{} value {value} outside {min}-{max}",
            kind.name()
        ));
    }
    Ok(value)
}

/// Map dialect numbering onto the internal one (weekdays from Sunday = 0).
fn normalise(value: u32, kind: FieldKind, dialect: Dialect) -> u32 {
    match (kind, dialect) {
        (FieldKind::DayOfWeek, Dialect::Wrapped) => value - 1,
        (FieldKind::DayOfWeek, Dialect::Bare) => value % 7,
        _ => value,
    }
}
