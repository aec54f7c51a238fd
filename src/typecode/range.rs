//! Typecode ranges and the scope-to-range registry.

use std::{fmt, str::FromStr};

use super::Scope;

pub const SHARED_RANGE: TypecodeRange = TypecodeRange {
    start: 20_000,
    end: i32::MAX,
};
pub const PROJECT_RANGE: TypecodeRange = TypecodeRange {
    start: 14_000,
    end: 19_999,
};
pub const HYBRIS_RANGE: TypecodeRange = TypecodeRange {
    start: 0,
    end: 10_000,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    #[error("range start {start} is greater than range end {end}")]
    Inverted { start: i32, end: i32 },
    #[error("invalid range {0:?}, expected START:END")]
    Format(String),
    #[error("{first} range {first_range} overlaps {second} range {second_range}")]
    Overlap {
        first: Scope,
        first_range: TypecodeRange,
        second: Scope,
        second_range: TypecodeRange,
    },
}

/// Inclusive range of typecodes `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypecodeRange {
    start: i32,
    end: i32,
}

impl TypecodeRange {
    /// # Errors
    /// Returns [`RangeError::Inverted`] when `start > end`.
    pub const fn new(start: i32, end: i32) -> Result<Self, RangeError> {
        if start > end {
            return Err(RangeError::Inverted { start, end });
        }
        Ok(Self { start, end })
    }

    #[must_use]
    pub const fn start(self) -> i32 {
        self.start
    }

    #[must_use]
    pub const fn end(self) -> i32 {
        self.end
    }

    #[must_use]
    pub const fn contains(self, code: i32) -> bool {
        code >= self.start && code <= self.end
    }

    #[must_use]
    pub const fn overlaps(self, other: Self) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

impl fmt::Display for TypecodeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

impl FromStr for TypecodeRange {
    type Err = RangeError;

    /// Parses `START:END`, both bounds inclusive.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let format_error = || RangeError::Format(value.to_string());
        let (start, end) = value.trim().split_once(':').ok_or_else(format_error)?;
        let start = start.trim().parse::<i32>().map_err(|_| format_error())?;
        let end = end.trim().parse::<i32>().map_err(|_| format_error())?;
        Self::new(start, end)
    }
}

/// Returns the smallest code in `range` that does not appear in `used`.
///
/// Reference model of the store query, used by the in-memory store and to
/// check `PgTypecodeStore` against. `used` must be sorted ascending.
/// Duplicates and codes outside `range` are tolerated. Returns `None` when
/// every code of the range is used.
#[cfg(test)]
#[must_use]
pub(crate) fn lowest_unused<I>(range: TypecodeRange, used: I) -> Option<i32>
where
    I: IntoIterator<Item = i32>,
{
    // i64 so that a fully used range ending at i32::MAX cannot overflow
    let end = i64::from(range.end());
    let mut candidate = i64::from(range.start());

    for code in used {
        let code = i64::from(code);
        if code < candidate {
            continue;
        }
        if code > candidate || candidate > end {
            break;
        }
        candidate += 1;
    }

    if candidate > end {
        return None;
    }
    i32::try_from(candidate).ok()
}

/// Scope-to-range configuration, built once at startup and handed to the allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeRegistry {
    shared: TypecodeRange,
    project: TypecodeRange,
    hybris: TypecodeRange,
}

impl RangeRegistry {
    /// Builds a registry from per-scope ranges. Ranges must be pairwise disjoint
    /// so that codes from different scopes can never collide.
    ///
    /// # Errors
    /// Returns [`RangeError::Overlap`] for the first pair of overlapping ranges.
    pub fn new(
        shared: TypecodeRange,
        project: TypecodeRange,
        hybris: TypecodeRange,
    ) -> Result<Self, RangeError> {
        let registry = Self {
            shared,
            project,
            hybris,
        };

        for (index, first) in Scope::ALL.iter().enumerate() {
            for second in &Scope::ALL[index + 1..] {
                let first_range = registry.range(*first);
                let second_range = registry.range(*second);
                if first_range.overlaps(second_range) {
                    return Err(RangeError::Overlap {
                        first: *first,
                        first_range,
                        second: *second,
                        second_range,
                    });
                }
            }
        }

        Ok(registry)
    }

    #[must_use]
    pub const fn range(&self, scope: Scope) -> TypecodeRange {
        match scope {
            Scope::Shared => self.shared,
            Scope::Project => self.project,
            Scope::Hybris => self.hybris,
        }
    }

    #[must_use]
    pub const fn shared(&self) -> TypecodeRange {
        self.shared
    }

    #[must_use]
    pub const fn project(&self) -> TypecodeRange {
        self.project
    }

    #[must_use]
    pub const fn hybris(&self) -> TypecodeRange {
        self.hybris
    }
}

impl Default for RangeRegistry {
    fn default() -> Self {
        Self {
            shared: SHARED_RANGE,
            project: PROJECT_RANGE,
            hybris: HYBRIS_RANGE,
        }
    }
}
