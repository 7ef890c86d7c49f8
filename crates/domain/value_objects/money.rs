use anyhow::{Result, anyhow, bail};
use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};

pub const DEFAULT_CURRENCY: &str = "USD";

/// Currencies Stripe charges in whole units (no minor unit).
/// https://docs.stripe.com/currencies#zero-decimal
const ZERO_DECIMAL_CURRENCIES: &[&str] = &[
    "BIF", "CLP", "DJF", "GNF", "JPY", "KMF", "KRW", "MGA", "PYG", "RWF", "UGX", "VND", "VUV",
    "XAF", "XOF", "XPF",
];

/// Normalizes and validates an ISO-4217 style currency code.
pub fn normalize_currency(raw: &str) -> Result<String> {
    let code = raw.trim().to_ascii_uppercase();
    if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_alphabetic()) {
        bail!("currency must be a 3-letter ISO code, got {raw:?}");
    }
    Ok(code)
}

pub fn minor_unit_exponent(currency: &str) -> u32 {
    let upper = currency.to_ascii_uppercase();
    if ZERO_DECIMAL_CURRENCIES.contains(&upper.as_str()) {
        0
    } else {
        2
    }
}

/// Converts a decimal amount into the provider's integer minor units, rounding half away
/// from zero (150.005 USD -> 15001).
pub fn to_minor_units(amount: Decimal, currency: &str) -> Result<i64> {
    if amount.is_sign_negative() && !amount.is_zero() {
        bail!("amount must not be negative: {amount}");
    }

    let exponent = minor_unit_exponent(currency);
    let scale = Decimal::from(10_i64.pow(exponent));
    let minor = amount
        .checked_mul(scale)
        .ok_or_else(|| anyhow!("amount too large: {amount}"))?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);

    minor
        .to_i64()
        .ok_or_else(|| anyhow!("amount does not fit provider minor units: {amount}"))
}
