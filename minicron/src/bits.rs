//! Compact bit-mask sets of the values allowed in each cron field.
//!
//! Every field gets its own type backed by the narrowest integer that can address
//! all of its values. Bit `i` is set when value `i` is allowed, so day of month
//! and month leave bit 0 unused.

use crate::internal::Sealed;
use crate::parse::Field;
use core::fmt::Debug;
use core::ops::BitOr;

macro_rules! debug_assert_pattern {
    ($pat:expr, $mask:expr) => {
        debug_assert!(
            ($pat & !($mask)) == 0,
            "Value mapped out of range of valid bit patterns"
        )
    };
}

/// A set of values for one cron field.
///
/// This trait is sealed, it's only implemented for the five field sets in this module.
pub trait FieldSet: Copy + Eq + Debug + Sealed {
    /// The field this set holds values for
    const FIELD: Field;
    /// Number of bits in the backing integer
    const WIDTH: u32;
    /// A set containing every valid value of the field
    const ALL: Self;
    /// A set without any values
    const EMPTY: Self;

    /// Returns the raw bit pattern of this set.
    fn bits(self) -> u64;

    #[doc(hidden)]
    fn from_bits(bits: u64) -> Self;

    /// Returns whether the value is in the set. Values past the width of the set are never
    /// contained.
    #[inline]
    fn contains(self, value: u32) -> bool {
        value < Self::WIDTH && self.bits() & (1 << value) != 0
    }

    /// Returns whether no values are set.
    #[inline]
    fn is_empty(self) -> bool {
        self.bits() == 0
    }

    /// Combines the values of both sets.
    #[inline]
    fn union(self, other: Self) -> Self {
        Self::from_bits(self.bits() | other.bits())
    }

    /// Returns the lowest value in the set that is greater than or equal to `value`.
    #[inline]
    fn first_set_from(self, value: u32) -> Option<u32> {
        if value >= Self::WIDTH {
            return None;
        }

        let bottom_cleared = (self.bits() >> value) << value;
        match bottom_cleared.trailing_zeros() {
            64 => None,
            next => Some(next),
        }
    }

    /// Creates a set of every `step`-th value from `start` to `end` (inclusive).
    ///
    /// # Panics
    ///
    /// Panics if `step` is zero.
    fn range(start: u32, end: u32, step: u32) -> Self {
        let bits = (start..=end)
            .step_by(step as usize)
            .fold(0u64, |bits, value| bits | (1 << value));

        debug_assert_pattern!(bits, Self::ALL.bits());

        Self::from_bits(bits)
    }

    /// Iterates over the values in the set from lowest to highest.
    #[inline]
    fn values(self) -> Values<Self> {
        Values {
            set: self,
            next: 0,
        }
    }
}

macro_rules! field_set {
    ($(#[$meta:meta])* $name:ident($int:ty) = $field:ident, $all:expr) => {
        $(#[$meta])*
        #[derive(Debug, Default, PartialEq, Eq, Hash, Clone, Copy)]
        pub struct $name($int);

        impl Sealed for $name {}

        impl FieldSet for $name {
            const FIELD: Field = Field::$field;
            const WIDTH: u32 = <$int>::BITS;
            const ALL: Self = Self($all);
            const EMPTY: Self = Self(0);

            #[inline]
            fn bits(self) -> u64 {
                u64::from(self.0)
            }

            #[inline]
            fn from_bits(bits: u64) -> Self {
                debug_assert_pattern!(bits, Self::ALL.bits());

                Self(bits as $int)
            }
        }

        impl BitOr for $name {
            type Output = Self;

            #[inline]
            fn bitor(self, rhs: Self) -> Self {
                self.union(rhs)
            }
        }
    };
}

field_set! {
    /// A bit-mask of all minutes in an hour, 0-59.
    Minutes(u64) = Minute, 0x0FFF_FFFF_FFFF_FFFF
}

field_set! {
    /// A bit-mask of all hours in a day, 0-23.
    Hours(u32) = Hour, 0x00FF_FFFF
}

field_set! {
    /// A bit-mask of the days of a month, 1-31.
    DaysOfMonth(u32) = DayOfMonth, 0xFFFF_FFFE
}

field_set! {
    /// A bit-mask of the months of a year, 1-12.
    Months(u16) = Month, 0x1FFE
}

field_set! {
    /// A bit-mask of the days of the week, 0-6 (Sun-Sat).
    DaysOfWeek(u8) = DayOfWeek, 0b0111_1111
}

/// An iterator over the values in a [`FieldSet`], created with [`FieldSet::values`].
///
/// [`FieldSet`]: trait.FieldSet.html
/// [`FieldSet::values`]: trait.FieldSet.html#method.values
#[derive(Debug, Clone)]
pub struct Values<S> {
    set: S,
    next: u32,
}

impl<S: FieldSet> Iterator for Values<S> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        let value = self.set.first_set_from(self.next)?;
        self.next = value + 1;
        Some(value)
    }
}

impl<S: FieldSet> core::iter::FusedIterator for Values<S> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::field;

    fn collect<S: FieldSet>(set: S) -> Vec<u32> {
        set.values().collect()
    }

    #[test]
    fn all_matches_bounds() {
        fn check<S: FieldSet>() {
            let bounds = S::FIELD.bounds();
            let expected = (bounds.min..=bounds.max).collect::<Vec<_>>();
            assert_eq!(expected, collect(S::ALL), "{}", S::FIELD);
            assert_eq!(S::ALL, S::range(bounds.min, bounds.max, 1), "{}", S::FIELD);
        }

        check::<Minutes>();
        check::<Hours>();
        check::<DaysOfMonth>();
        check::<Months>();
        check::<DaysOfWeek>();
    }

    #[test]
    fn contains_ignores_values_past_width() {
        assert!(Minutes::ALL.contains(59));
        assert!(!Minutes::ALL.contains(60));
        assert!(!Minutes::ALL.contains(64));
        assert!(!Minutes::ALL.contains(u32::MAX));
        assert!(!DaysOfWeek::ALL.contains(7));
        assert!(!DaysOfWeek::ALL.contains(8));
        assert!(!Months::ALL.contains(0));
    }

    #[test]
    fn range_steps() {
        assert_eq!(vec![0, 15, 30, 45], collect(Minutes::range(0, 59, 15)));
        assert_eq!(vec![5], collect(Hours::range(5, 5, 1)));
        assert_eq!(vec![1, 8, 15, 22, 29], collect(DaysOfMonth::range(1, 31, 7)));
        assert_eq!(vec![3], collect(Months::range(3, 12, 10)));
    }

    #[test]
    fn union_combines() {
        let set = Minutes::range(0, 10, 5) | Minutes::range(30, 31, 1);
        assert_eq!(vec![0, 5, 10, 30, 31], collect(set));
        assert_eq!(set, Minutes::range(30, 31, 1).union(Minutes::range(0, 10, 5)));
        assert_eq!(set, set | Minutes::EMPTY);
    }

    #[test]
    fn first_set_from() {
        let months: Months = field("3,6,9").unwrap();

        assert_eq!(Some(3), months.first_set_from(0));
        assert_eq!(Some(3), months.first_set_from(3));
        assert_eq!(Some(6), months.first_set_from(4));
        assert_eq!(Some(9), months.first_set_from(7));
        assert_eq!(None, months.first_set_from(10));
        assert_eq!(None, months.first_set_from(16));
        assert_eq!(None, months.first_set_from(100));
    }

    #[test]
    fn first_set_from_top_bit() {
        let minutes: Minutes = field("59").unwrap();
        assert_eq!(Some(59), minutes.first_set_from(59));
        assert_eq!(None, minutes.first_set_from(60));

        let dows: DaysOfWeek = field("6").unwrap();
        assert_eq!(Some(6), dows.first_set_from(1));
        assert_eq!(None, dows.first_set_from(7));
    }

    #[test]
    fn empty() {
        assert!(Hours::EMPTY.is_empty());
        assert!(!Hours::ALL.is_empty());
        assert_eq!(None, Hours::EMPTY.first_set_from(0));
        assert_eq!(0, Hours::EMPTY.values().count());
    }
}
