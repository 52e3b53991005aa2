// src/utils/precision.rs
use rust_decimal::Decimal;

/// `value / base * 100`, or None when base is zero.
/// Example: value=-10, base=200 -> -5
pub fn pct_of(value: Decimal, base: Decimal) -> Option<Decimal> {
    if base.is_zero() {
        return None;
    }
    Some(value / base * Decimal::ONE_HUNDRED)
}

/// `Σ(price·amount) / Σ(amount)` over the given pairs, or None if the amounts sum to zero.
pub fn weighted_average<I>(pairs: I) -> Option<Decimal>
where
    I: IntoIterator<Item = (Decimal, Decimal)>,
{
    let (px_qty, qty) = pairs
        .into_iter()
        .fold((Decimal::ZERO, Decimal::ZERO), |(pq, q), (price, amount)| {
            (pq + price * amount, q + amount)
        });
    if qty.is_zero() {
        return None;
    }
    Some(px_qty / qty)
}
