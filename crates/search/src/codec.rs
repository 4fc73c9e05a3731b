//! Value codec: types a single raw search token.
//!
//! [`decode`] turns one comma-separated token (`ge2001-01-01`,
//! `5.4|http://unitsofmeasure.org|mg`, `Patient/123`) into a
//! [`ParameterValue`] for the parameter's declared type. Decoding is pure and
//! deterministic; a failure never yields a partially populated value.

use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{
    DateTime, Days, FixedOffset, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta,
    TimeZone, Utc,
};
use regex::Regex;
use rust_decimal::Decimal;
use url::Url;

use crate::error::DecodeError;
use crate::escape::{split_unescaped, unescape};
use crate::types::{
    DatePrecision, DateRange, ParameterValue, ReferenceTarget, SearchModifier, SearchParamType,
    SearchPrefix, StringMatchMode, ValueKind,
};

static DATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(\d{4})(?:-(\d{2})(?:-(\d{2})(?:T(\d{2}):(\d{2})(?::(\d{2})(\.\d{1,9})?)?(Z|[+-]\d{2}:\d{2})?)?)?)?$",
    )
    .expect("date pattern is a valid regex")
});

/// Context that refines how a token is decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeHints {
    /// Modifier on the parameter name (`:exact`, `:missing`, `:Patient`, ...).
    pub modifier: Option<SearchModifier>,
    /// Resource type a bare reference id refers to.
    pub target_type: Option<String>,
    /// Declared types of a composite parameter's components, in order.
    pub components: Vec<SearchParamType>,
}

impl DecodeHints {
    /// Hints carrying only a modifier.
    pub fn with_modifier(modifier: Option<SearchModifier>) -> Self {
        let target_type = modifier
            .as_ref()
            .and_then(SearchModifier::as_type)
            .map(String::from);
        Self {
            modifier,
            target_type,
            components: Vec::new(),
        }
    }

    /// Sets the reference target type hint.
    pub fn with_target_type(mut self, target_type: impl Into<String>) -> Self {
        self.target_type = Some(target_type.into());
        self
    }

    /// Sets the composite component types.
    pub fn with_components(mut self, components: Vec<SearchParamType>) -> Self {
        self.components = components;
        self
    }
}

/// Decodes a raw token for a parameter of the given declared type.
pub fn decode(raw: &str, declared: SearchParamType) -> Result<ParameterValue, DecodeError> {
    decode_with(raw, declared, &DecodeHints::default())
}

/// Decodes a raw token using modifier, type-hint and component context.
pub fn decode_with(
    raw: &str,
    declared: SearchParamType,
    hints: &DecodeHints,
) -> Result<ParameterValue, DecodeError> {
    if let Some(modifier) = &hints.modifier {
        if !modifier.is_valid_for(declared) {
            return Err(DecodeError::InvalidModifier {
                modifier: modifier.to_string(),
                param_type: declared,
            });
        }
    }
    if raw.trim().is_empty() {
        return Err(DecodeError::EmptyValue);
    }
    if hints.modifier == Some(SearchModifier::Missing) {
        return decode_missing(raw);
    }

    let kind = match declared {
        SearchParamType::Token => decode_token(raw, hints)?,
        SearchParamType::Date => ValueKind::Date(decode_date(raw)?),
        SearchParamType::Quantity => decode_quantity(raw)?,
        SearchParamType::Number => decode_number(raw)?,
        SearchParamType::String => decode_string(raw, hints)?,
        SearchParamType::Reference => ValueKind::Reference(decode_reference(raw, hints)?),
        SearchParamType::Uri => ValueKind::Uri {
            value: unescape_leaf(raw, raw)?,
        },
        SearchParamType::Composite => decode_composite(raw, hints)?,
        SearchParamType::Special => {
            return Err(DecodeError::UnsupportedType {
                raw: raw.to_string(),
                param_type: declared,
            });
        }
    };

    Ok(ParameterValue::new(raw, kind))
}

fn decode_missing(raw: &str) -> Result<ParameterValue, DecodeError> {
    let missing = match raw {
        "true" => true,
        "false" => false,
        _ => {
            return Err(DecodeError::InvalidMissing {
                raw: raw.to_string(),
            });
        }
    };
    Ok(ParameterValue::new(raw, ValueKind::Missing { missing }))
}

fn decode_token(raw: &str, hints: &DecodeHints) -> Result<ValueKind, DecodeError> {
    let malformed = || DecodeError::MalformedToken {
        raw: raw.to_string(),
    };
    let parts = split_unescaped(raw, '|');
    let (system, code) = match parts.as_slice() {
        [code] => (None, unescape_leaf(code, raw)?),
        ["", _] => {
            return Err(DecodeError::AmbiguousToken {
                raw: raw.to_string(),
            });
        }
        [system, code] => (Some(unescape_leaf(system, raw)?), unescape_leaf(code, raw)?),
        _ => return Err(malformed()),
    };
    if code.is_empty() {
        return Err(malformed());
    }
    Ok(ValueKind::Token {
        system,
        code,
        negated: hints.modifier == Some(SearchModifier::Not),
    })
}

/// Extracts and validates the comparator prefix for a prefix-bearing type.
fn split_prefix(
    raw: &str,
    param_type: SearchParamType,
) -> Result<(SearchPrefix, &str), DecodeError> {
    let (prefix, rest) = SearchPrefix::extract(raw);
    if !prefix.is_valid_for(param_type) {
        return Err(DecodeError::InvalidPrefix {
            raw: raw.to_string(),
            prefix: prefix.to_string(),
            param_type,
        });
    }
    Ok((prefix, rest))
}

fn decode_date(raw: &str) -> Result<DateRange, DecodeError> {
    let (prefix, literal) = split_prefix(raw, SearchParamType::Date)?;
    let (lower, upper, precision) =
        parse_date_literal(literal).ok_or_else(|| DecodeError::MalformedDate {
            raw: raw.to_string(),
        })?;
    Ok(DateRange {
        prefix,
        lower_bound: Some(lower),
        upper_bound: Some(upper),
        precision,
    })
}

/// Parses a FHIR date/dateTime literal into its inclusive instant range.
///
/// Literals without a timezone are read as UTC.
pub(crate) fn parse_date_literal(
    literal: &str,
) -> Option<(DateTime<Utc>, DateTime<Utc>, DatePrecision)> {
    let caps = DATE_PATTERN.captures(literal)?;
    let number = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());

    let year = caps.get(1)?.as_str().parse::<i32>().ok()?;
    let date = NaiveDate::from_ymd_opt(year, number(2).unwrap_or(1), number(3).unwrap_or(1))?;

    let nanos = match caps.get(7) {
        Some(m) => {
            let digits = &m.as_str()[1..];
            digits.parse::<u32>().ok()? * 10u32.pow(9 - digits.len() as u32)
        }
        None => 0,
    };
    let time = match number(4) {
        Some(hour) => NaiveTime::from_hms_nano_opt(hour, number(5)?, number(6).unwrap_or(0), nanos)?,
        None => NaiveTime::MIN,
    };

    let precision = if caps.get(7).is_some() {
        DatePrecision::Millisecond
    } else if caps.get(6).is_some() {
        DatePrecision::Second
    } else if caps.get(4).is_some() {
        DatePrecision::Minute
    } else if caps.get(3).is_some() {
        DatePrecision::Day
    } else if caps.get(2).is_some() {
        DatePrecision::Month
    } else {
        DatePrecision::Year
    };

    let start = date.and_time(time);
    let next = match precision {
        DatePrecision::Year => NaiveDate::from_ymd_opt(year + 1, 1, 1)?.and_time(NaiveTime::MIN),
        DatePrecision::Month => start.checked_add_months(Months::new(1))?,
        DatePrecision::Day => start.checked_add_days(Days::new(1))?,
        DatePrecision::Minute => start.checked_add_signed(TimeDelta::minutes(1))?,
        DatePrecision::Second => start.checked_add_signed(TimeDelta::seconds(1))?,
        DatePrecision::Millisecond => start.checked_add_signed(TimeDelta::nanoseconds(1))?,
    };
    let end = next.checked_sub_signed(TimeDelta::nanoseconds(1))?;

    let offset = match caps.get(8).map(|m| m.as_str()) {
        None | Some("Z") => FixedOffset::east_opt(0)?,
        Some(tz) => {
            let sign = if tz.starts_with('-') { -1 } else { 1 };
            let hours: i32 = tz[1..3].parse().ok()?;
            let minutes: i32 = tz[4..6].parse().ok()?;
            FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))?
        }
    };

    Some((to_utc(start, offset)?, to_utc(end, offset)?, precision))
}

fn to_utc(local: NaiveDateTime, offset: FixedOffset) -> Option<DateTime<Utc>> {
    offset
        .from_local_datetime(&local)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

fn decode_quantity(raw: &str) -> Result<ValueKind, DecodeError> {
    let malformed = || DecodeError::MalformedQuantity {
        raw: raw.to_string(),
    };
    let (prefix, rest) = split_prefix(raw, SearchParamType::Quantity)?;
    let parts = split_unescaped(rest, '|');
    let (value, system, units) = match parts.as_slice() {
        [value] => (*value, None, None),
        // A lone second segment is a unit system if it looks like a URI, else a unit code
        [value, second] if second.contains(':') => (*value, Some(*second), None),
        [value, second] => (*value, None, Some(*second)),
        [value, system, units] => (*value, Some(*system), Some(*units)),
        _ => return Err(malformed()),
    };

    let value = parse_decimal(&unescape_leaf(value, raw)?).ok_or_else(malformed)?;
    let optional = |segment: Option<&str>| -> Result<Option<String>, DecodeError> {
        match segment {
            Some(s) if !s.is_empty() => Ok(Some(unescape_leaf(s, raw)?)),
            _ => Ok(None),
        }
    };

    Ok(ValueKind::Quantity {
        prefix,
        value,
        system: optional(system)?,
        units: optional(units)?,
    })
}

fn decode_number(raw: &str) -> Result<ValueKind, DecodeError> {
    let (prefix, rest) = split_prefix(raw, SearchParamType::Number)?;
    let value = parse_decimal(rest).ok_or_else(|| DecodeError::MalformedNumber {
        raw: raw.to_string(),
    })?;
    Ok(ValueKind::Number { prefix, value })
}

/// Parses a plain base-10 decimal (`-12.50`); exponents and separators are rejected.
fn parse_decimal(s: &str) -> Option<Decimal> {
    let digits = s.strip_prefix(['-', '+']).unwrap_or(s);
    let mut parts = digits.splitn(2, '.');
    let int_part = parts.next().unwrap_or_default();
    let frac_part = parts.next();
    let all_digits = |p: &str| p.chars().all(|c| c.is_ascii_digit());
    if int_part.is_empty() || !all_digits(int_part) {
        return None;
    }
    if let Some(frac) = frac_part {
        if frac.is_empty() || !all_digits(frac) {
            return None;
        }
    }
    Decimal::from_str(s.strip_prefix('+').unwrap_or(s)).ok()
}

fn decode_string(raw: &str, hints: &DecodeHints) -> Result<ValueKind, DecodeError> {
    let mode = match hints.modifier {
        Some(SearchModifier::Exact) => StringMatchMode::Exact,
        Some(SearchModifier::Contains) => StringMatchMode::Contains,
        _ => StringMatchMode::StartsWith,
    };
    Ok(ValueKind::String {
        value: unescape_leaf(raw, raw)?,
        mode,
    })
}

fn decode_reference(raw: &str, hints: &DecodeHints) -> Result<ReferenceTarget, DecodeError> {
    let malformed = || DecodeError::MalformedReference {
        raw: raw.to_string(),
    };
    let value = unescape_leaf(raw, raw)?;
    if value.chars().any(char::is_whitespace) {
        return Err(malformed());
    }

    let target = if value.contains("://") {
        let url = Url::parse(&value).map_err(|_| malformed())?;
        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|p| !p.is_empty()).collect())
            .unwrap_or_default();
        typed_reference(&segments).ok_or_else(malformed)?
    } else if value.contains('/') {
        let segments: Vec<&str> = value.split('/').collect();
        typed_reference(&segments).ok_or_else(malformed)?
    } else {
        ReferenceTarget {
            resource_type: hints.target_type.clone(),
            id: value,
        }
    };

    if let (Some(expected), Some(found)) = (&hints.target_type, &target.resource_type) {
        if expected != found {
            return Err(DecodeError::ReferenceTypeMismatch {
                raw: raw.to_string(),
                expected: expected.clone(),
                found: found.clone(),
            });
        }
    }
    Ok(target)
}

/// Reads `[..., Type, id]` or `[..., Type, id, _history, version]` path segments.
fn typed_reference(segments: &[&str]) -> Option<ReferenceTarget> {
    let segments = match segments {
        [head @ .., "_history", _] => head,
        all => all,
    };
    let [.., resource_type, id] = segments else {
        return None;
    };
    if !is_resource_type_name(resource_type) || id.is_empty() {
        return None;
    }
    Some(ReferenceTarget {
        resource_type: Some(resource_type.to_string()),
        id: id.to_string(),
    })
}

pub(crate) fn is_resource_type_name(s: &str) -> bool {
    s.chars().next().is_some_and(|c| c.is_ascii_uppercase())
        && s.chars().all(|c| c.is_ascii_alphanumeric())
}

fn decode_composite(raw: &str, hints: &DecodeHints) -> Result<ValueKind, DecodeError> {
    if hints.components.is_empty() {
        return Err(DecodeError::UnsupportedType {
            raw: raw.to_string(),
            param_type: SearchParamType::Composite,
        });
    }
    let parts = split_unescaped(raw, '$');
    if parts.len() != hints.components.len() {
        return Err(DecodeError::MalformedComposite {
            raw: raw.to_string(),
            expected: hints.components.len(),
        });
    }
    let components = parts
        .iter()
        .zip(&hints.components)
        .map(|(part, component_type)| decode(part, *component_type))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ValueKind::Composite { components })
}

fn unescape_leaf(leaf: &str, raw: &str) -> Result<String, DecodeError> {
    unescape(leaf).ok_or_else(|| DecodeError::InvalidEscape {
        raw: raw.to_string(),
    })
}
