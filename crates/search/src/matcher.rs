//! Query matching against indexed rows.
//!
//! [`matches`] decides whether one index row satisfies one query value. OR
//! groups match if any value matches; a compound parameter matches if every
//! group does.
//!
//! # Comparator semantics
//!
//! | Prefix | Number / Quantity | Date (ranges) |
//! |--------|-------------------|---------------|
//! | eq | equal at the query's precision | row range inside query range |
//! | ne | not eq | not eq |
//! | gt / lt | numeric ordering | row ends after / starts before the query range |
//! | ge / le | numeric ordering | gt or eq / lt or eq |
//! | sa / eb | - | row starts after / ends before the whole query range |
//! | ap | within the tolerance of the query value | overlaps the query range widened by the tolerance |

use chrono::{DateTime, TimeDelta, Utc};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::compose::{CompoundParameter, OrGroup};
use crate::config::SearchConfig;
use crate::index::{IndexedDate, IndexedRecord, normalize_string};
use crate::types::{DateRange, ParameterValue, SearchPrefix, StringMatchMode, ValueKind};

/// Evaluates query values against index rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Matcher {
    approximate_tolerance_percent: u32,
}

impl Default for Matcher {
    fn default() -> Self {
        Self {
            approximate_tolerance_percent: 10,
        }
    }
}

impl Matcher {
    /// Creates a matcher with the given `ap` tolerance.
    pub fn new(approximate_tolerance_percent: u32) -> Self {
        Self {
            approximate_tolerance_percent,
        }
    }

    /// Creates a matcher from configuration.
    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(config.approximate_tolerance_percent)
    }

    /// Returns true if `indexed` satisfies `query`.
    pub fn matches(&self, indexed: &IndexedRecord, query: &ParameterValue) -> bool {
        match (&query.kind, indexed) {
            (ValueKind::Missing { missing }, _) => !missing,
            (
                ValueKind::Token {
                    system,
                    code,
                    negated,
                },
                IndexedRecord::Token(row),
            ) => {
                let hit = row.code == *code && (system.is_none() || row.system == *system);
                hit != *negated
            }
            (
                ValueKind::Quantity {
                    prefix,
                    value,
                    system,
                    units,
                },
                IndexedRecord::Quantity(row),
            ) => {
                let unit_ok = (system.is_none() || row.system == *system)
                    && (units.is_none() || row.units == *units);
                unit_ok && self.compare_decimal(row.value, *prefix, *value)
            }
            (ValueKind::Number { prefix, value }, IndexedRecord::Number(row)) => {
                self.compare_decimal(row.value, *prefix, *value)
            }
            (ValueKind::Date(range), IndexedRecord::Date(row)) => self.compare_date(row, range),
            (ValueKind::String { value, mode }, IndexedRecord::String(row)) => match mode {
                StringMatchMode::StartsWith => row.normalized.starts_with(&normalize_string(value)),
                StringMatchMode::Contains => row.normalized.contains(&normalize_string(value)),
                StringMatchMode::Exact => row.exact == *value,
            },
            (ValueKind::Reference(target), IndexedRecord::Reference(row)) => {
                row.target.id == target.id
                    && (target.resource_type.is_none()
                        || row.target.resource_type == target.resource_type)
            }
            (ValueKind::Uri { value }, IndexedRecord::Uri(row)) => row.uri == *value,
            (ValueKind::Composite { components }, IndexedRecord::Composite(row)) => {
                components.len() == row.components.len()
                    && components
                        .iter()
                        .zip(&row.components)
                        .all(|(q, r)| self.matches(r, q))
            }
            _ => false,
        }
    }

    /// Returns true if any value in the group matches `indexed`.
    pub fn matches_group(&self, indexed: &IndexedRecord, group: &OrGroup) -> bool {
        group.values.iter().any(|v| self.matches(indexed, v))
    }

    /// Returns true if every group matches `indexed`.
    pub fn matches_compound(&self, indexed: &IndexedRecord, param: &CompoundParameter) -> bool {
        param.groups.iter().all(|g| self.matches_group(indexed, g))
    }

    /// Returns true if an owner with `rows` for this parameter satisfies it.
    ///
    /// Each group needs one value satisfied by some row. `:missing` values test
    /// whether `rows` is empty; `:not` tokens require that no row has the code.
    pub fn matches_rows(&self, param: &CompoundParameter, rows: &[IndexedRecord]) -> bool {
        param.groups.iter().all(|group| {
            group.values.iter().any(|value| match &value.kind {
                ValueKind::Missing { missing } => rows.is_empty() == *missing,
                ValueKind::Token { negated: true, .. } => {
                    rows.iter().all(|row| self.matches(row, value))
                }
                _ => rows.iter().any(|row| self.matches(row, value)),
            })
        })
    }

    fn compare_decimal(&self, indexed: Decimal, prefix: SearchPrefix, query: Decimal) -> bool {
        match prefix {
            SearchPrefix::Eq => equal_at_precision(indexed, query),
            SearchPrefix::Ne => !equal_at_precision(indexed, query),
            SearchPrefix::Gt | SearchPrefix::Sa => indexed > query,
            SearchPrefix::Lt | SearchPrefix::Eb => indexed < query,
            SearchPrefix::Ge => indexed >= query,
            SearchPrefix::Le => indexed <= query,
            SearchPrefix::Ap => {
                let tolerance = self.decimal_tolerance(query);
                let low = query.checked_sub(tolerance).unwrap_or(Decimal::MIN);
                let high = query.checked_add(tolerance).unwrap_or(Decimal::MAX);
                indexed >= low && indexed <= high
            }
        }
    }

    /// The `ap` tolerance around `query`, saturating at `Decimal::MAX`.
    fn decimal_tolerance(&self, query: Decimal) -> Decimal {
        let percent = Decimal::from(self.approximate_tolerance_percent);
        let magnitude = query.abs();
        magnitude
            .checked_mul(percent)
            .and_then(|t| t.checked_div(Decimal::ONE_HUNDRED))
            .or_else(|| {
                magnitude
                    .checked_div(Decimal::ONE_HUNDRED)
                    .and_then(|m| m.checked_mul(percent))
            })
            .unwrap_or(Decimal::MAX)
    }

    fn compare_date(&self, row: &IndexedDate, query: &DateRange) -> bool {
        let row_low = lower(row.low);
        let row_high = upper(row.high);
        let q_low = lower(query.lower_bound);
        let q_high = upper(query.upper_bound);

        let eq = row_low >= q_low && row_high <= q_high;
        let gt = row_high > q_high;
        let lt = row_low < q_low;

        match query.prefix {
            SearchPrefix::Eq => eq,
            SearchPrefix::Ne => !eq,
            SearchPrefix::Gt => gt,
            SearchPrefix::Lt => lt,
            SearchPrefix::Ge => gt || eq,
            SearchPrefix::Le => lt || eq,
            SearchPrefix::Sa => row_low > q_high,
            SearchPrefix::Eb => row_high < q_low,
            SearchPrefix::Ap => {
                let (low, high) = self.widen(query.lower_bound, query.upper_bound);
                row_low <= high && row_high >= low
            }
        }
    }

    /// Widens a closed range by the tolerance of its own duration on each side.
    fn widen(
        &self,
        low: Option<DateTime<Utc>>,
        high: Option<DateTime<Utc>>,
    ) -> (DateTime<Utc>, DateTime<Utc>) {
        let (Some(low), Some(high)) = (low, high) else {
            return (lower(low), upper(high));
        };
        let span = high - low;
        let margin = span
            .checked_mul(i32::try_from(self.approximate_tolerance_percent).unwrap_or(i32::MAX))
            .map(|m| m / 100)
            .unwrap_or(TimeDelta::MAX);
        (
            low.checked_sub_signed(margin).unwrap_or(DateTime::<Utc>::MIN_UTC),
            high.checked_add_signed(margin).unwrap_or(DateTime::<Utc>::MAX_UTC),
        )
    }
}

/// Equality at the query's precision: `5.4` matches `5.35 ..< 5.45`.
fn equal_at_precision(indexed: Decimal, query: Decimal) -> bool {
    indexed.round_dp_with_strategy(query.scale(), RoundingStrategy::MidpointAwayFromZero) == query
}

fn lower(bound: Option<DateTime<Utc>>) -> DateTime<Utc> {
    bound.unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn upper(bound: Option<DateTime<Utc>>) -> DateTime<Utc> {
    bound.unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Returns true if `indexed` satisfies `query` with the default 10% `ap` tolerance.
pub fn matches(indexed: &IndexedRecord, query: &ParameterValue) -> bool {
    Matcher::default().matches(indexed, query)
}

impl OrGroup {
    /// Returns true if any value matches `indexed`.
    pub fn matches(&self, indexed: &IndexedRecord) -> bool {
        Matcher::default().matches_group(indexed, self)
    }
}

impl CompoundParameter {
    /// Returns true if every group matches `indexed`.
    pub fn matches(&self, indexed: &IndexedRecord) -> bool {
        Matcher::default().matches_compound(indexed, self)
    }

    /// Returns true if an owner with `rows` for this parameter satisfies it.
    pub fn matches_rows(&self, rows: &[IndexedRecord]) -> bool {
        Matcher::default().matches_rows(self, rows)
    }
}
