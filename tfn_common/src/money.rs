use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const INR_CURRENCY_CODE: &str = "INR";
pub const INR_CURRENCY_CODE_LOWER: &str = "inr";

//--------------------------------------      Paise        -----------------------------------------------------------
/// A money amount in integer paise (1/100 of a rupee). All prices, order totals and settlement figures in the system
/// are paise, so that revenue splits never accumulate floating-point dust.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Paise(i64);

op!(binary Paise, Add, add);
op!(binary Paise, Sub, sub);
op!(inplace Paise, SubAssign, sub_assign);
op!(unary Paise, Neg, neg);

impl Mul<i64> for Paise {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Paise {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in paise: {0}")]
pub struct PaiseConversionError(String);

impl From<i64> for Paise {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for Paise {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Paise {}

impl TryFrom<u64> for Paise {
    type Error = PaiseConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(PaiseConversionError(format!("Value {} is too large to convert to Paise", value)))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for Paise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        write!(f, "{sign}₹{}.{:02}", abs / 100, abs % 100)
    }
}

impl Paise {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_rupees(rupees: i64) -> Self {
        Self(rupees * 100)
    }

    /// Applies a basis-point rate (e.g. 2000 = 20%), rounding half-up. Used for commission and tax splits.
    pub fn apply_rate_bp(&self, basis_points: i64) -> Self {
        let scaled = self.0 * basis_points;
        Self((scaled + 5_000 * scaled.signum()) / 10_000)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display_as_rupees() {
        assert_eq!(Paise::from_rupees(250).to_string(), "₹250.00");
        assert_eq!(Paise::from(25_050).to_string(), "₹250.50");
        assert_eq!(Paise::from(5).to_string(), "₹0.05");
        assert_eq!(Paise::from(-125).to_string(), "-₹1.25");
    }

    #[test]
    fn rate_application_rounds_half_up() {
        // 20% of ₹250.00
        assert_eq!(Paise::from_rupees(250).apply_rate_bp(2_000), Paise::from(5_000));
        // 18% of ₹50.00 = ₹9.00
        assert_eq!(Paise::from(5_000).apply_rate_bp(1_800), Paise::from(900));
        // 15% of 33 paise = 4.95 -> 5
        assert_eq!(Paise::from(33).apply_rate_bp(1_500), Paise::from(5));
    }

    #[test]
    fn arithmetic() {
        let gross = Paise::from_rupees(100);
        let commission = gross.apply_rate_bp(2_000);
        let tax = commission.apply_rate_bp(1_800);
        let net = gross - commission - tax;
        assert_eq!(net, Paise::from(7_640));
        assert_eq!(vec![gross, commission].into_iter().sum::<Paise>(), Paise::from(12_000));
    }
}
