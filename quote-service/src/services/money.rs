//! Fixed-point money arithmetic. Every derived amount goes through [`round_money`].

use rust_decimal::{Decimal, RoundingStrategy};

/// Decimal places for stored money amounts.
pub const MONEY_SCALE: u32 = 2;

/// Round to cents, half-up (midpoint away from zero).
pub fn round_money(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(MONEY_SCALE);
    rounded
}

/// Convert an amount at a fixed exchange rate.
pub fn convert(amount: Decimal, rate: Decimal) -> Decimal {
    round_money(amount * rate)
}

/// Amount of one line: quantity × unit price, converted into the quote currency.
pub fn line_amount(quantity: Decimal, unit_price: Decimal, exchange_rate: Decimal) -> Decimal {
    convert(quantity * unit_price, exchange_rate)
}

/// What is still owed. Never negative: an over-confirmed quote owes nothing.
pub fn unpaid_balance(total_amount: Decimal, paid_amount: Decimal) -> Decimal {
    round_money((total_amount - paid_amount).max(Decimal::ZERO))
}

/// Sum and round.
pub fn sum_money<I>(amounts: I) -> Decimal
where
    I: IntoIterator<Item = Decimal>,
{
    round_money(amounts.into_iter().sum())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn rounds_half_up() {
        assert_eq!(round_money(d("1.005")), d("1.01"));
        assert_eq!(round_money(d("1.004")), d("1.00"));
        assert_eq!(round_money(d("-1.005")), d("-1.01"));
        assert_eq!(round_money(d("2.675")), d("2.68"));
    }

    #[test]
    fn rounding_normalises_scale() {
        assert_eq!(round_money(d("7")).to_string(), "7.00");
        assert_eq!(round_money(Decimal::ZERO).to_string(), "0.00");
    }

    #[test]
    fn converts_at_fixed_rate() {
        assert_eq!(convert(d("100.00"), d("7.1234")), d("712.34"));
        assert_eq!(line_amount(d("3"), d("33.335"), Decimal::ONE), d("100.01"));
        assert_eq!(line_amount(d("2.5"), d("10.00"), d("0.5")), d("12.50"));
    }

    #[test]
    fn unpaid_balance_never_goes_negative() {
        assert_eq!(unpaid_balance(d("1000.00"), d("400.00")), d("600.00"));
        assert_eq!(unpaid_balance(d("1000.00"), d("1000.00")), d("0.00"));
        assert_eq!(unpaid_balance(d("1000.00"), d("1200.00")), d("0.00"));
    }

    #[test]
    fn sums_without_float_drift() {
        let total = sum_money(std::iter::repeat(d("0.10")).take(10));
        assert_eq!(total, d("1.00"));
    }
}
