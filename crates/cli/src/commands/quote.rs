use std::str::FromStr;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::Args;
use pricetrail_core::domain::currency::{format_money, normalize_currency_code};
use pricetrail_core::errors::ApplicationError;
use pricetrail_core::pricing::rates::InMemoryRateTable;
use pricetrail_core::pricing::{PriceCalculator, PriceQuote, QuoteRequest};
use pricetrail_db::SqlRateRepository;
use rust_decimal::Decimal;

use crate::commands::{
    application_failure, build_runtime, load_config, open_pool, CommandResult, EXIT_PRICING_INPUT,
};

/// Raw operator input; amounts stay text until validated so a malformed
/// number reports as a pricing-input failure rather than a usage error.
#[derive(Debug, Clone, Args)]
pub struct QuoteArgs {
    #[arg(long, help = "Base price before adjustments")]
    pub base: String,
    #[arg(long, default_value = "1", help = "Service complexity multiplier")]
    pub multiplier: String,
    #[arg(long, default_value = "0", help = "Tier discount percentage (0-100)")]
    pub discount: String,
    #[arg(long = "setup-fee", default_value = "0", help = "One-time setup fee")]
    pub setup_fee: String,
    #[arg(long, help = "Currency of the inputs (defaults to pricing.base_currency)")]
    pub from: Option<String>,
    #[arg(long, help = "Convert the discounted price into this currency before the setup fee")]
    pub to: Option<String>,
    #[arg(long = "as-of", help = "Rate date as YYYY-MM-DD (defaults to today)")]
    pub as_of: Option<String>,
}

impl QuoteArgs {
    pub fn to_request(&self, base_currency: &str) -> anyhow::Result<QuoteRequest> {
        let as_of = match self.as_of.as_deref() {
            Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                .with_context(|| format!("--as-of `{raw}` is not a YYYY-MM-DD date"))?,
            None => Utc::now().date_naive(),
        };

        Ok(QuoteRequest {
            base_price: parse_amount("--base", &self.base)?,
            multiplier: parse_amount("--multiplier", &self.multiplier)?,
            discount_pct: parse_amount("--discount", &self.discount)?,
            setup_fee: parse_amount("--setup-fee", &self.setup_fee)?,
            currency: normalize_currency_code(self.from.as_deref().unwrap_or(base_currency)),
            target_currency: self.to.as_deref().map(normalize_currency_code),
            as_of,
        })
    }
}

fn parse_amount(flag: &str, raw: &str) -> anyhow::Result<Decimal> {
    Decimal::from_str(raw.trim()).with_context(|| format!("{flag} `{raw}` is not a decimal number"))
}

pub fn run(args: &QuoteArgs) -> CommandResult {
    let config = match load_config("quote") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let request = match args.to_request(&config.pricing.base_currency) {
        Ok(request) => request,
        Err(error) => {
            return CommandResult::failure(
                "quote",
                "pricing_input",
                format!("{error:#}"),
                EXIT_PRICING_INPUT,
            );
        }
    };
    let runtime = match build_runtime("quote") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    runtime.block_on(async {
        let needs_rates =
            request.target_currency.as_ref().is_some_and(|target| *target != request.currency);

        let quoted = if needs_rates {
            let pool = match open_pool("quote", &config).await {
                Ok(pool) => pool,
                Err(failure) => return failure,
            };
            let result =
                PriceCalculator::new(SqlRateRepository::new(pool.clone())).quote(&request).await;
            pool.close().await;
            result
        } else {
            PriceCalculator::new(InMemoryRateTable::default()).quote(&request).await
        };

        match quoted {
            Ok(quote) => CommandResult::success_with_data("quote", headline(&quote), &quote),
            Err(error) => application_failure("quote", ApplicationError::from(error)),
        }
    })
}

fn headline(quote: &PriceQuote) -> String {
    let total = format_money(quote.adjusted.grand_total, &quote.currency);
    match (quote.converted_total, quote.target_currency.as_deref()) {
        (Some(converted), Some(target)) => {
            format!("grand total {total} ({})", format_money(converted, target))
        }
        _ => format!("grand total {total}"),
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use super::QuoteArgs;

    fn args(base: &str) -> QuoteArgs {
        QuoteArgs {
            base: base.to_string(),
            multiplier: "1.5".to_string(),
            discount: "20".to_string(),
            setup_fee: "25".to_string(),
            from: None,
            to: Some("eur".to_string()),
            as_of: Some("2024-03-01".to_string()),
        }
    }

    #[test]
    fn request_uses_base_currency_when_from_is_omitted() {
        let request = args("100").to_request("cad").expect("valid args");

        assert_eq!(request.base_price, Decimal::new(100, 0));
        assert_eq!(request.multiplier, Decimal::new(15, 1));
        assert_eq!(request.currency, "CAD");
        assert_eq!(request.target_currency.as_deref(), Some("EUR"));
        assert_eq!(request.as_of, NaiveDate::from_ymd_opt(2024, 3, 1).expect("date"));
    }

    #[test]
    fn malformed_amount_names_the_flag() {
        let error = args("ten").to_request("CAD").expect_err("not a number");
        assert!(format!("{error:#}").contains("--base `ten`"));
    }
}
