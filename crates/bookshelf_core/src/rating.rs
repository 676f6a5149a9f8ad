//! crates/bookshelf_core/src/rating.rs
//!
//! In-app rating arithmetic: the validated `Rating` value, the signed delta
//! produced when one shelf rating changes, the running aggregate kept on a
//! book, and the resolver that picks the rating shown to users.

use crate::ports::PortError;

/// Minimum number of in-app ratings before they outrank the catalog rating.
pub const TRUSTED_SAMPLE_SIZE: i64 = 3;

/// A whole-star rating between 1 and 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: i64) -> Result<Self, PortError> {
        if (i64::from(Self::MIN)..=i64::from(Self::MAX)).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(invalid_rating())
        }
    }

    /// Accepts a JSON number, rejecting fractions like `3.5`.
    pub fn from_f64(value: f64) -> Result<Self, PortError> {
        if !value.is_finite() || value.fract() != 0.0 {
            return Err(invalid_rating());
        }
        Self::new(value as i64)
    }

    pub fn value(self) -> i64 {
        i64::from(self.0)
    }
}

impl TryFrom<i32> for Rating {
    type Error = PortError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::new(i64::from(value))
    }
}

impl From<Rating> for i32 {
    fn from(rating: Rating) -> Self {
        i32::from(rating.0)
    }
}

fn invalid_rating() -> PortError {
    PortError::InvalidArgument("rating must be a whole number between 1 and 5, or null".to_string())
}

/// Signed change to a book's running sum and count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RatingDelta {
    pub sum: i64,
    pub count: i64,
}

impl RatingDelta {
    /// Delta caused by one shelf item's rating going from `old` to `new`.
    pub fn between(old: Option<Rating>, new: Option<Rating>) -> Self {
        match (old, new) {
            (None, Some(new)) => Self {
                sum: new.value(),
                count: 1,
            },
            (Some(old), Some(new)) => Self {
                sum: new.value() - old.value(),
                count: 0,
            },
            (Some(old), None) => Self {
                sum: -old.value(),
                count: -1,
            },
            (None, None) => Self::default(),
        }
    }

    pub fn is_noop(&self) -> bool {
        self.sum == 0 && self.count == 0
    }
}

/// Running sum/count of in-app ratings for one book.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RatingAggregate {
    pub sum: i64,
    pub count: i64,
}

impl RatingAggregate {
    pub fn apply(self, delta: RatingDelta) -> Self {
        Self {
            sum: self.sum + delta.sum,
            count: self.count + delta.count,
        }
    }

    /// `sum / count`, or 0 when nothing has been rated.
    pub fn average(&self) -> f64 {
        if self.count > 0 {
            self.sum as f64 / self.count as f64
        } else {
            0.0
        }
    }
}

/// Picks the rating shown to users.
///
/// A large enough in-app sample wins; otherwise the catalog's rating is used
/// when present, and a small in-app sample is only a last resort.
pub fn display_rating(external: Option<f64>, aggregate: &RatingAggregate) -> Option<f64> {
    let resolved = if aggregate.count >= TRUSTED_SAMPLE_SIZE {
        Some(aggregate.average())
    } else if let Some(rate) = external {
        Some(rate)
    } else if aggregate.count > 0 {
        Some(aggregate.average())
    } else {
        None
    };
    resolved.map(round_one_decimal)
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
