//! Deterministic price arithmetic.
//!
//! A base price is multiplied by the service complexity factor, then reduced
//! by the tier discount, and only then is the setup fee added. The setup fee
//! is never multiplied or discounted. Currency conversion, when requested,
//! applies to the discounted amount before the setup fee and needs a
//! [`RateLookup`].

pub mod rates;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::currency::{normalize_currency_code, round_money};
use crate::errors::PricingError;

pub use self::rates::{ExchangeRate, InMemoryRateTable, RateLookup};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTraceStep {
    pub stage: String,
    pub detail: String,
    pub amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustedPrice {
    pub base: Decimal,
    pub after_complexity: Decimal,
    pub after_discount: Decimal,
    pub discount_amount: Decimal,
    pub setup_fee: Decimal,
    pub grand_total: Decimal,
}

impl AdjustedPrice {
    pub fn steps(&self) -> Vec<PricingTraceStep> {
        vec![
            step("base", "base_price", self.base),
            step("complexity", "base_price * complexity_multiplier", self.after_complexity),
            step("tier_discount", "after_complexity * (1 - discount_pct / 100)", self.after_discount),
            step("setup_fee", "setup_fee (not discounted)", self.setup_fee),
            step("grand_total", "after_discount + setup_fee", self.grand_total),
        ]
    }
}

fn step(stage: &str, detail: &str, amount: Decimal) -> PricingTraceStep {
    PricingTraceStep { stage: stage.to_string(), detail: detail.to_string(), amount }
}

pub fn apply_complexity(base_price: Decimal, multiplier: Decimal) -> Result<Decimal, PricingError> {
    ensure_non_negative("base_price", base_price)?;
    if multiplier < Decimal::ZERO {
        return Err(PricingError::InvalidMultiplier { value: multiplier });
    }
    base_price.checked_mul(multiplier).ok_or(PricingError::Overflow { stage: "complexity" })
}

/// `discount_pct` outside `0..=100` is rejected, never clamped.
pub fn apply_tier_discount(amount: Decimal, discount_pct: Decimal) -> Result<Decimal, PricingError> {
    ensure_non_negative("amount", amount)?;
    ensure_percentage("discount_pct", discount_pct)?;
    let factor = Decimal::ONE - discount_pct / Decimal::ONE_HUNDRED;
    amount.checked_mul(factor).ok_or(PricingError::Overflow { stage: "tier_discount" })
}

pub fn fully_adjusted_price(
    base_price: Decimal,
    multiplier: Decimal,
    discount_pct: Decimal,
    setup_fee: Decimal,
) -> Result<AdjustedPrice, PricingError> {
    ensure_non_negative("setup_fee", setup_fee)?;
    let after_complexity = apply_complexity(base_price, multiplier)?;
    let after_discount = apply_tier_discount(after_complexity, discount_pct)?;
    let grand_total =
        after_discount.checked_add(setup_fee).ok_or(PricingError::Overflow { stage: "grand_total" })?;

    Ok(AdjustedPrice {
        base: base_price,
        after_complexity,
        after_discount,
        discount_amount: after_complexity - after_discount,
        setup_fee,
        grand_total,
    })
}

/// Converts using the most recent rate effective on or before `as_of`,
/// rounded to 2 places half away from zero. Identical codes short-circuit
/// without a lookup. A missing rate is an error, never an identity rate.
pub async fn convert_currency(
    rates: &dyn RateLookup,
    amount: Decimal,
    from: &str,
    to: &str,
    as_of: NaiveDate,
) -> Result<Decimal, PricingError> {
    let from = normalize_currency_code(from);
    let to = normalize_currency_code(to);
    if from == to {
        return Ok(amount);
    }

    let Some(rate) = rates.find(&from, &to, as_of).await? else {
        warn!(
            event_name = "pricing.currency.rate_missing",
            from_currency = %from,
            to_currency = %to,
            as_of = %as_of,
            "no exchange rate available"
        );
        return Err(PricingError::RateNotFound { from, to, as_of });
    };

    let converted =
        amount.checked_mul(rate.rate).ok_or(PricingError::Overflow { stage: "conversion" })?;
    let converted = round_money(converted, 2);
    debug!(
        event_name = "pricing.currency.converted",
        from_currency = %from,
        to_currency = %to,
        rate = %rate.rate,
        effective_date = %rate.effective_date,
        "converted amount"
    );
    Ok(converted)
}

/// `(new - old) / old * 100`, rounded to 2 places. An `old` of zero yields
/// `0` rather than an error, so a first price set from nothing reads as no
/// change.
pub fn percentage_change(old: Decimal, new: Decimal) -> Decimal {
    if old.is_zero() {
        return Decimal::ZERO;
    }
    match (new - old).checked_div(old).and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED)) {
        Some(change) => round_money(change, 2),
        None => Decimal::ZERO,
    }
}

pub fn format_percentage_change(old: Decimal, new: Decimal) -> String {
    let change = percentage_change(old, new);
    let sign = if change > Decimal::ZERO { "+" } else { "" };
    format!("{sign}{change:.2}%")
}

fn ensure_non_negative(field: &'static str, value: Decimal) -> Result<(), PricingError> {
    if value < Decimal::ZERO {
        return Err(PricingError::NegativeAmount { field, value });
    }
    Ok(())
}

fn ensure_percentage(field: &'static str, value: Decimal) -> Result<(), PricingError> {
    if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
        return Err(PricingError::InvalidPercentage { field, value });
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub base_price: Decimal,
    pub multiplier: Decimal,
    pub discount_pct: Decimal,
    pub setup_fee: Decimal,
    pub currency: String,
    pub target_currency: Option<String>,
    pub as_of: NaiveDate,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub adjusted: AdjustedPrice,
    pub currency: String,
    pub converted_total: Option<Decimal>,
    pub target_currency: Option<String>,
    pub trace: Vec<PricingTraceStep>,
}

/// Adjusts prices and, when asked, converts the discounted amount through the
/// configured rate source before the setup fee is added.
pub struct PriceCalculator<R> {
    rates: R,
}

impl<R> PriceCalculator<R> {
    pub fn new(rates: R) -> Self {
        Self { rates }
    }
}

impl<R: RateLookup> PriceCalculator<R> {
    pub async fn convert_currency(
        &self,
        amount: Decimal,
        from: &str,
        to: &str,
        as_of: NaiveDate,
    ) -> Result<Decimal, PricingError> {
        convert_currency(&self.rates, amount, from, to, as_of).await
    }

    pub async fn quote(&self, request: &QuoteRequest) -> Result<PriceQuote, PricingError> {
        let adjusted = fully_adjusted_price(
            request.base_price,
            request.multiplier,
            request.discount_pct,
            request.setup_fee,
        )?;
        let mut trace = adjusted.steps();
        let currency = normalize_currency_code(&request.currency);

        let (converted_total, target_currency) = match request.target_currency.as_deref() {
            Some(target) => {
                let target = normalize_currency_code(target);
                let converted = self
                    .convert_currency(adjusted.after_discount, &currency, &target, request.as_of)
                    .await?;
                let total = converted
                    .checked_add(adjusted.setup_fee)
                    .ok_or(PricingError::Overflow { stage: "grand_total" })?;

                // conversion sits between the discount and the setup fee
                trace.insert(
                    3,
                    step(
                        "conversion",
                        &format!("after_discount {currency} -> {target} as of {}", request.as_of),
                        converted,
                    ),
                );
                if let Some(last) = trace.last_mut() {
                    let detail = format!("converted + setup_fee in {target}");
                    *last = step("grand_total", &detail, total);
                }
                (Some(total), Some(target))
            }
            None => (None, None),
        };

        Ok(PriceQuote { adjusted, currency, converted_total, target_currency, trace })
    }
}
