//! A single cron field (`*/5`, `1-3,7`, `MON-FRI`, ...).

use std::collections::BTreeSet;

use super::CronParseError;

const MONTH_NAMES: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];
const DAY_NAMES: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

/// Position of a field inside the expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Second,
    Minute,
    Hour,
    DayOfMonth,
    Month,
    DayOfWeek,
}

impl FieldKind {
    pub fn label(self) -> &'static str {
        match self {
            FieldKind::Second => "second",
            FieldKind::Minute => "minute",
            FieldKind::Hour => "hour",
            FieldKind::DayOfMonth => "day of month",
            FieldKind::Month => "month",
            FieldKind::DayOfWeek => "day of week",
        }
    }

    /// Inclusive bounds accepted in the expression.
    /// Day of week accepts 7 as an alias for Sunday.
    fn bounds(self) -> (u32, u32) {
        match self {
            FieldKind::Second | FieldKind::Minute => (0, 59),
            FieldKind::Hour => (0, 23),
            FieldKind::DayOfMonth => (1, 31),
            FieldKind::Month => (1, 12),
            FieldKind::DayOfWeek => (0, 7),
        }
    }

    fn allows_question_mark(self) -> bool {
        matches!(self, FieldKind::DayOfMonth | FieldKind::DayOfWeek)
    }

    fn named_value(self, token: &str) -> Option<u32> {
        let names: &[&str] = match self {
            FieldKind::Month => &MONTH_NAMES,
            FieldKind::DayOfWeek => &DAY_NAMES,
            _ => return None,
        };
        let offset = if self == FieldKind::Month { 1 } else { 0 };
        names
            .iter()
            .position(|name| name.eq_ignore_ascii_case(token))
            .map(|idx| idx as u32 + offset)
    }
}

/// The set of values one field matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronField {
    kind: FieldKind,
    values: BTreeSet<u32>,
}

impl CronField {
    pub fn parse(kind: FieldKind, expr: &str) -> Result<Self, CronParseError> {
        let mut field = Self {
            kind,
            values: BTreeSet::new(),
        };
        for part in expr.split(',') {
            field.parse_part(part.trim())?;
        }
        if kind == FieldKind::DayOfWeek && field.values.remove(&7) {
            field.values.insert(0);
        }
        Ok(field)
    }

    fn parse_part(&mut self, part: &str) -> Result<(), CronParseError> {
        if part.is_empty() {
            return Err(self.invalid(part, "empty value"));
        }

        let (range_part, step) = match part.split_once('/') {
            Some((range, step_str)) => {
                let step = step_str
                    .parse::<u32>()
                    .ok()
                    .filter(|step| *step > 0)
                    .ok_or_else(|| CronParseError::InvalidStep(step_str.to_string()))?;
                (range, Some(step))
            }
            None => (part, None),
        };

        let (min, max) = self.kind.bounds();
        let (start, end) = if range_part == "*"
            || (range_part == "?" && self.kind.allows_question_mark())
        {
            (min, max)
        } else if let Some((start, end)) = range_part.split_once('-') {
            let start = self.value(start)?;
            let end = self.value(end)?;
            if start > end {
                return Err(CronParseError::InvalidRange(start, end));
            }
            (start, end)
        } else {
            let value = self.value(range_part)?;
            // `5/15` は 5 から最大値まで 15 刻み
            if step.is_some() { (value, max) } else { (value, value) }
        };

        if start < min || end > max {
            return Err(CronParseError::OutOfRange {
                field: self.kind.label(),
                value: if start < min { start } else { end },
                min,
                max,
            });
        }

        let step = step.unwrap_or(1);
        if step > max {
            return Err(CronParseError::InvalidStep(step.to_string()));
        }
        self.values.extend((start..=end).step_by(step as usize));
        Ok(())
    }

    fn value(&self, token: &str) -> Result<u32, CronParseError> {
        token
            .parse::<u32>()
            .ok()
            .or_else(|| self.kind.named_value(token))
            .ok_or_else(|| self.invalid(token, "not a number or known name"))
    }

    fn invalid(&self, token: &str, reason: &str) -> CronParseError {
        CronParseError::InvalidField {
            field: self.kind.label(),
            token: token.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn matches(&self, value: u32) -> bool {
        self.values.contains(&value)
    }

    pub fn values(&self) -> &BTreeSet<u32> {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::wildcard(FieldKind::Minute, "*", 60)]
    #[case::step(FieldKind::Second, "*/15", 4)]
    #[case::range(FieldKind::Minute, "0-30", 31)]
    #[case::range_step(FieldKind::Hour, "9-17/2", 5)]
    #[case::start_step(FieldKind::Minute, "5/20", 3)]
    #[case::list(FieldKind::Minute, "0,15,30,45", 4)]
    #[case::month_names(FieldKind::Month, "JAN-MAR", 3)]
    #[case::question_mark(FieldKind::DayOfMonth, "?", 31)]
    #[case::weekdays(FieldKind::DayOfWeek, "mon-fri", 5)]
    fn parses_field_syntax(#[case] kind: FieldKind, #[case] expr: &str, #[case] count: usize) {
        let field = CronField::parse(kind, expr).unwrap();
        assert_eq!(field.values().len(), count);
    }

    #[test]
    fn step_at_field_maximum_keeps_start_only() {
        let field = CronField::parse(FieldKind::Minute, "5/59").unwrap();
        assert_eq!(field.values().iter().copied().collect::<Vec<_>>(), vec![5]);
    }

    #[test]
    fn sunday_can_be_seven() {
        let field = CronField::parse(FieldKind::DayOfWeek, "7").unwrap();
        assert!(field.matches(0));
        assert!(!field.matches(7));
    }

    #[rstest]
    #[case::out_of_range(FieldKind::Minute, "60")]
    #[case::hour_out_of_range(FieldKind::Hour, "25")]
    #[case::reversed_range(FieldKind::Minute, "30-10")]
    #[case::zero_step(FieldKind::Second, "*/0")]
    #[case::unknown_name(FieldKind::Month, "FOO")]
    #[case::question_mark_on_minutes(FieldKind::Minute, "?")]
    #[case::empty_list_item(FieldKind::Minute, "1,,2")]
    #[case::huge_step(FieldKind::Second, "59/4294967295")]
    #[case::step_wider_than_field(FieldKind::Hour, "*/24")]
    fn rejects_invalid_fields(#[case] kind: FieldKind, #[case] expr: &str) {
        assert!(CronField::parse(kind, expr).is_err());
    }
}
