//! Exact rational numbers used as expression coefficients and exponents.

use num_bigint::BigInt;
use num_integer::Integer;
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Integer exponents above this are never folded into a constant.
const MAX_EXACT_EXPONENT: u64 = 4096;
/// Size limit, in bits, for the numerator or denominator of a folded power.
const MAX_EXACT_BITS: u64 = 1 << 16;

/// An arbitrary-precision fraction in lowest terms with a positive
/// denominator, so derived equality and hashing are structural.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rational(BigRational);

impl Rational {
    /// Creates `num / den` in lowest terms.
    ///
    /// # Panics
    /// Panics if `den` is zero, like integer division does.
    pub fn new(num: i128, den: i128) -> Self {
        Self(BigRational::new(BigInt::from(num), BigInt::from(den)))
    }

    pub fn integer(value: i128) -> Self {
        Self(BigRational::from_integer(BigInt::from(value)))
    }

    pub fn zero() -> Self { Self(BigRational::zero()) }
    pub fn one() -> Self { Self(BigRational::one()) }

    pub fn numer(&self) -> &BigInt { self.0.numer() }
    pub fn denom(&self) -> &BigInt { self.0.denom() }

    pub fn is_zero(&self) -> bool { self.0.is_zero() }
    pub fn is_one(&self) -> bool { self.0.is_one() }
    pub fn is_integer(&self) -> bool { self.0.is_integer() }
    pub fn is_positive(&self) -> bool { self.0.is_positive() }
    pub fn is_negative(&self) -> bool { self.0.is_negative() }

    /// True when the numerator is even (`2`, `-4/3`, `0`).
    pub fn has_even_numer(&self) -> bool { self.0.numer().is_even() }

    /// True when the denominator is even, i.e. an exponent taking an even root.
    pub fn has_even_denom(&self) -> bool { self.0.denom().is_even() }

    /// The value as an `i64`, when it is an integer that fits.
    pub fn to_i64(&self) -> Option<i64> {
        if self.is_integer() {
            self.0.numer().to_i64()
        } else {
            None
        }
    }

    pub fn recip(&self) -> Option<Self> {
        if self.is_zero() {
            None
        } else {
            Some(Self(self.0.recip()))
        }
    }

    pub fn abs(&self) -> Self { Self(self.0.abs()) }

    pub fn to_f64(&self) -> f64 {
        let (num, den) = (self.0.numer(), self.0.denom());
        match (num.to_f64(), den.to_f64()) {
            (Some(n), Some(d)) if n.is_finite() && d.is_finite() => n / d,
            _ => {
                // Scale both down so they fit a float; the ratio survives.
                let shift = num.bits().max(den.bits()).saturating_sub(1000);
                let n = (num >> shift).to_f64().unwrap_or(f64::NAN);
                let d = (den >> shift).to_f64().unwrap_or(f64::NAN);
                n / d
            }
        }
    }

    /// Integer power by repeated squaring. `None` for `0^-n` or when the
    /// result would be unreasonably large.
    pub fn powi(&self, exp: i64) -> Option<Self> {
        let magnitude = exp.unsigned_abs();
        if magnitude > MAX_EXACT_EXPONENT {
            return None;
        }
        let bits = self.0.numer().bits().max(self.0.denom().bits());
        if bits.saturating_mul(magnitude) > MAX_EXACT_BITS {
            return None;
        }
        let base = if exp < 0 { self.recip()? } else { self.clone() };
        let power = u32::try_from(magnitude).ok()?;
        Some(Self(BigRational::new(base.0.numer().pow(power), base.0.denom().pow(power))))
    }

    /// `self ^ exp` when the result is itself rational (perfect roots only)
    /// and of reasonable size.
    pub fn pow_exact(&self, exp: &Rational) -> Option<Self> {
        let root = exp.denom().to_u32()?;
        let power = exp.numer().to_i64()?;
        let base = if root == 1 {
            self.clone()
        } else if self.is_negative() {
            // Odd roots of negatives stay real; even roots do not.
            if root % 2 == 0 {
                return None;
            }
            -self.abs().root_exact(root)?
        } else {
            self.root_exact(root)?
        };
        base.powi(power)
    }

    fn root_exact(&self, n: u32) -> Option<Self> {
        let num = integer_root(self.0.numer(), n)?;
        let den = integer_root(self.0.denom(), n)?;
        Some(Self(BigRational::new(num, den)))
    }
}

/// Exact `n`-th root of a non-negative integer, if one exists.
fn integer_root(value: &BigInt, n: u32) -> Option<BigInt> {
    if value.is_negative() || n == 0 {
        return None;
    }
    let root = value.nth_root(n);
    (root.pow(n) == *value).then_some(root)
}

impl Default for Rational {
    fn default() -> Self { Self::zero() }
}

impl From<i64> for Rational {
    fn from(value: i64) -> Self { Self::integer(value as i128) }
}

impl From<i32> for Rational {
    fn from(value: i32) -> Self { Self::integer(value as i128) }
}

impl From<BigInt> for Rational {
    fn from(value: BigInt) -> Self { Self(BigRational::from_integer(value)) }
}

macro_rules! impl_rational_ops {
    ($($trait:ident $method:ident),*) => {$(
        impl $trait<&Rational> for &Rational {
            type Output = Rational;
            fn $method(self, rhs: &Rational) -> Rational { Rational($trait::$method(&self.0, &rhs.0)) }
        }
        impl $trait<Rational> for Rational {
            type Output = Rational;
            fn $method(self, rhs: Rational) -> Rational { Rational($trait::$method(self.0, rhs.0)) }
        }
        impl $trait<&Rational> for Rational {
            type Output = Rational;
            fn $method(self, rhs: &Rational) -> Rational { Rational($trait::$method(self.0, &rhs.0)) }
        }
        impl $trait<Rational> for &Rational {
            type Output = Rational;
            fn $method(self, rhs: Rational) -> Rational { Rational($trait::$method(&self.0, rhs.0)) }
        }
    )*};
}

// Division panics on a zero divisor, like integer division.
impl_rational_ops!(Add add, Sub sub, Mul mul, Div div);

impl Neg for Rational {
    type Output = Rational;
    fn neg(self) -> Rational { Rational(-self.0) }
}

impl Neg for &Rational {
    type Output = Rational;
    fn neg(self) -> Rational { Rational(-&self.0) }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_integer() {
            write!(f, "{}", self.0.numer())
        } else {
            write!(f, "{}/{}", self.0.numer(), self.0.denom())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_normalizes_sign_and_gcd() {
        let r = Rational::new(6, -8);
        assert_eq!(r.numer(), &BigInt::from(-3));
        assert_eq!(r.denom(), &BigInt::from(4));
        assert_eq!(r, Rational::new(-3, 4));
    }

    #[test]
    fn test_arithmetic() {
        let half = Rational::new(1, 2);
        let third = Rational::new(1, 3);
        assert_eq!(&half + &third, Rational::new(5, 6));
        assert_eq!(&half - &third, Rational::new(1, 6));
        assert_eq!(&half * &third, Rational::new(1, 6));
        assert_eq!(&half / &third, Rational::new(3, 2));
        assert!(third < half);
    }

    #[rstest]
    #[case(Rational::integer(25), Rational::new(1, 2), Some(Rational::integer(5)))]
    #[case(Rational::new(4, 9), Rational::new(1, 2), Some(Rational::new(2, 3)))]
    #[case(Rational::integer(8), Rational::new(2, 3), Some(Rational::integer(4)))]
    #[case(Rational::integer(-27), Rational::new(1, 3), Some(Rational::integer(-3)))]
    #[case(Rational::integer(2), Rational::new(1, 2), None)]
    #[case(Rational::integer(-4), Rational::new(1, 2), None)]
    #[case(Rational::integer(2), Rational::integer(-1), Some(Rational::new(1, 2)))]
    fn test_pow_exact(#[case] base: Rational, #[case] exp: Rational, #[case] expected: Option<Rational>) {
        assert_eq!(base.pow_exact(&exp), expected);
    }

    #[test]
    fn test_zero_has_no_reciprocal() {
        assert_eq!(Rational::zero().recip(), None);
        assert_eq!(Rational::zero().powi(-1), None);
    }

    #[test]
    fn test_values_beyond_machine_integers_stay_exact() {
        let big = Rational::integer(i128::MAX);
        let sum = &big + &big;
        assert_eq!(&sum - &big, big);

        let power = Rational::integer(100_000).powi(8).unwrap();
        assert_eq!(power.to_string(), format!("1{}", "0".repeat(40)));
        assert!((power.to_f64() - 1e40).abs() / 1e40 < 1e-12);
        assert_eq!(power.pow_exact(&Rational::new(1, 8)), Some(Rational::integer(100_000)));
    }

    #[test]
    fn test_huge_powers_are_not_folded() {
        assert_eq!(Rational::integer(2).powi(i64::MAX), None);
        assert_eq!(Rational::integer(1 << 40).powi(4000), None);
        assert_eq!(Rational::one().powi(4000), Some(Rational::one()));
    }
}
