//! Element value rules
//!
//! Each rule looks at one non-empty element value and reports at most one
//! error. [`validate_value`] runs the rules that apply to an element's base
//! type and collects every failure, so a single value can be both too long
//! and contain invalid characters.

use chrono::{NaiveDate, NaiveTime};
use edi_core::ValidationError;
use edi_schema::{BaseType, ElementType};
use regex::Regex;
use std::sync::LazyLock;

static CONTROL_CHARACTERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\p{Cc}").expect("control character pattern is valid")
});

static NUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?[0-9]+$").expect("numeric pattern is valid"));

static DECIMAL_POINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:[0-9]+(?:\.[0-9]*)?|\.[0-9]+)(?:E[+-]?[0-9]+)?$")
        .expect("decimal pattern is valid")
});

static DECIMAL_COMMA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:[0-9]+(?:,[0-9]*)?|,[0-9]+)(?:E[+-]?[0-9]+)?$")
        .expect("decimal pattern is valid")
});

/// Settings that vary how values are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueRules {
    /// Decimal mark of the interchange
    pub decimal_mark: char,
    /// Whether coded values must appear in the element's code list
    pub check_codes: bool,
}

impl Default for ValueRules {
    fn default() -> Self {
        Self {
            decimal_mark: '.',
            check_codes: true,
        }
    }
}

impl ValueRules {
    #[must_use]
    pub fn decimal_mark(mut self, mark: char) -> Self {
        self.decimal_mark = mark;
        self
    }

    #[must_use]
    pub fn check_codes(mut self, check: bool) -> Self {
        self.check_codes = check;
        self
    }
}

/// Run every rule that applies to `element` against `value`.
///
/// Empty values are not checked here; presence is an occurrence concern.
#[must_use]
pub fn validate_value(value: &str, element: &ElementType, rules: ValueRules) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if value.is_empty() || element.base == BaseType::Binary {
        return errors;
    }

    errors.extend(validate_length(value, element, rules.decimal_mark));

    let format = match element.base {
        BaseType::String | BaseType::Identifier => validate_text(value),
        BaseType::Numeric => validate_numeric(value),
        BaseType::Decimal => validate_decimal(value, rules.decimal_mark),
        BaseType::Date => validate_date(value),
        BaseType::Time => validate_time(value),
        BaseType::Binary => None,
    };
    errors.extend(format);

    if rules.check_codes {
        errors.extend(validate_code_list(value, element));
    }

    errors
}

/// Measured length of a value: characters, less sign and decimal mark for
/// numeric types, less the exponent for decimals.
#[must_use]
pub fn measured_length(value: &str, base: BaseType, decimal_mark: char) -> usize {
    match base {
        BaseType::Numeric => value.trim_start_matches('-').chars().count(),
        BaseType::Decimal => {
            let mantissa = value.split('E').next().unwrap_or(value);
            mantissa
                .trim_start_matches(['-', '+'])
                .chars()
                .filter(|&c| c != decimal_mark)
                .count()
        }
        _ => value.chars().count(),
    }
}

/// Validate length constraints
#[must_use]
pub fn validate_length(value: &str, element: &ElementType, decimal_mark: char) -> Option<ValidationError> {
    let len = measured_length(value, element.base, decimal_mark);

    if len < element.min_length {
        Some(ValidationError::DataElementTooShort)
    } else if len > element.max_length {
        Some(ValidationError::DataElementTooLong)
    } else {
        None
    }
}

/// Text may contain anything but control characters.
#[must_use]
pub fn validate_text(value: &str) -> Option<ValidationError> {
    CONTROL_CHARACTERS
        .is_match(value)
        .then_some(ValidationError::InvalidCharacterData)
}

/// Optional minus sign followed by digits.
#[must_use]
pub fn validate_numeric(value: &str) -> Option<ValidationError> {
    (!NUMERIC.is_match(value)).then_some(ValidationError::InvalidCharacterData)
}

/// Optional sign, digits with at most one decimal mark, optional exponent.
#[must_use]
pub fn validate_decimal(value: &str, decimal_mark: char) -> Option<ValidationError> {
    let valid = match decimal_mark {
        ',' => DECIMAL_COMMA.is_match(value),
        _ => DECIMAL_POINT.is_match(value),
    };
    (!valid).then_some(ValidationError::InvalidCharacterData)
}

/// `YYMMDD` or `CCYYMMDD` naming a real calendar day.
#[must_use]
pub fn validate_date(value: &str) -> Option<ValidationError> {
    let format = match value.len() {
        6 => "%y%m%d",
        8 => "%Y%m%d",
        _ => return Some(ValidationError::InvalidDate),
    };

    if !value.bytes().all(|b| b.is_ascii_digit()) {
        return Some(ValidationError::InvalidDate);
    }

    NaiveDate::parse_from_str(value, format)
        .err()
        .map(|_| ValidationError::InvalidDate)
}

/// `HHMM`, `HHMMSS` or `HHMMSS` followed by decimal seconds.
#[must_use]
pub fn validate_time(value: &str) -> Option<ValidationError> {
    if value.len() < 4 || value.len() == 5 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Some(ValidationError::InvalidTime);
    }

    let (clock, format) = if value.len() == 4 {
        (value, "%H%M")
    } else {
        (&value[..6], "%H%M%S")
    };

    NaiveTime::parse_from_str(clock, format)
        .err()
        .map(|_| ValidationError::InvalidTime)
}

/// Coded values must appear in the element's code list, when it has one.
#[must_use]
pub fn validate_code_list(value: &str, element: &ElementType) -> Option<ValidationError> {
    let coded = element.base == BaseType::Identifier && !element.values.is_empty();
    (coded && !element.values.contains(value)).then_some(ValidationError::InvalidCodeValue)
}
