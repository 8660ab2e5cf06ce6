//! Saturating cost values
//!
//! Provides [`Penalty`], the cost unit attached to loaders, converters and
//! whole pipelines. Lower is better; [`Penalty::INFINITE`] marks an
//! ineligible candidate.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::iter::Sum;
use std::ops::Add;

/// Non-negative, saturating cost estimate
///
/// # Invariants
/// - Never negative: construction clamps to [`Penalty::ZERO`]
/// - Addition saturates at [`Penalty::INFINITE`] instead of overflowing
/// - `INFINITE + x == INFINITE` for every `x`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub struct Penalty(i32);

impl Penalty {
    /// Free operation
    pub const ZERO: Self = Self(0);

    /// Sentinel meaning "ineligible"
    pub const INFINITE: Self = Self(i32::MAX);

    /// Create penalty, clamping negative values to zero
    #[inline]
    #[must_use]
    pub const fn new(value: i32) -> Self {
        if value < 0 {
            Self::ZERO
        } else {
            Self(value)
        }
    }

    /// Raw value (`i32::MAX` for [`Penalty::INFINITE`])
    #[inline]
    #[must_use]
    pub const fn value(self) -> i32 {
        self.0
    }

    /// Whether this is the ineligible sentinel
    #[inline]
    #[must_use]
    pub const fn is_infinite(self) -> bool {
        self.0 == i32::MAX
    }

    /// Whether this penalty can still be selected
    #[inline]
    #[must_use]
    pub const fn is_finite(self) -> bool {
        !self.is_infinite()
    }

    /// Saturating addition
    #[inline]
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }
}

impl Add for Penalty {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        self.saturating_add(rhs)
    }
}

impl Sum for Penalty {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl From<i32> for Penalty {
    #[inline]
    fn from(value: i32) -> Self {
        Self::new(value)
    }
}

impl From<Penalty> for i32 {
    #[inline]
    fn from(penalty: Penalty) -> Self {
        penalty.0
    }
}

impl Display for Penalty {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_infinite() {
            f.write_str("infinite")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde::de::value::{Error as ValueError, I32Deserializer};
    use serde::de::IntoDeserializer;

    #[test]
    fn negative_clamps_to_zero() {
        assert_eq!(Penalty::new(-5), Penalty::ZERO);
    }

    #[test]
    fn deserialized_negative_clamps_to_zero() {
        let deserializer: I32Deserializer<ValueError> = (-7i32).into_deserializer();
        assert_eq!(Penalty::deserialize(deserializer).unwrap(), Penalty::ZERO);

        let deserializer: I32Deserializer<ValueError> = 9i32.into_deserializer();
        assert_eq!(Penalty::deserialize(deserializer).unwrap(), Penalty::new(9));
    }

    #[test]
    fn infinite_absorbs_everything() {
        assert_eq!(Penalty::INFINITE + Penalty::new(3), Penalty::INFINITE);
        assert_eq!(Penalty::ZERO + Penalty::INFINITE, Penalty::INFINITE);
        assert!(Penalty::INFINITE.is_infinite());
    }

    #[test]
    fn sum_of_steps() {
        let total: Penalty = [5, 3].into_iter().map(Penalty::new).sum();
        assert_eq!(total, Penalty::new(8));
    }

    #[test]
    fn display() {
        assert_eq!(Penalty::new(12).to_string(), "12");
        assert_eq!(Penalty::INFINITE.to_string(), "infinite");
    }

    proptest! {
        #[test]
        fn prop_add_never_wraps(a in 0..=i32::MAX, b in 0..=i32::MAX) {
            let sum = Penalty::new(a) + Penalty::new(b);
            prop_assert!(sum.value() >= 0);
            prop_assert!(sum >= Penalty::new(a));
            prop_assert!(sum >= Penalty::new(b));
        }

        #[test]
        fn prop_order_preserving(a in 0..1_000_000i32, b in 0..1_000_000i32, c in 0..1_000_000i32) {
            let (pa, pb, pc) = (Penalty::new(a), Penalty::new(b), Penalty::new(c));
            if pa <= pb {
                prop_assert!(pa + pc <= pb + pc);
            }
        }
    }
}
