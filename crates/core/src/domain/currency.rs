//! Currency symbols and money formatting used by quotes and audit descriptions.
//!
//! The symbol table and decimal places are part of the stored audit text, so
//! changing an entry changes how historical descriptions read.

use rust_decimal::{Decimal, RoundingStrategy};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CurrencyFormat {
    pub code: &'static str,
    pub symbol: &'static str,
    pub decimals: u32,
}

pub const CURRENCY_FORMATS: [CurrencyFormat; 8] = [
    CurrencyFormat { code: "CAD", symbol: "$", decimals: 2 },
    CurrencyFormat { code: "USD", symbol: "$", decimals: 2 },
    CurrencyFormat { code: "EUR", symbol: "€", decimals: 2 },
    CurrencyFormat { code: "GBP", symbol: "£", decimals: 2 },
    CurrencyFormat { code: "AUD", symbol: "$", decimals: 2 },
    CurrencyFormat { code: "JPY", symbol: "¥", decimals: 0 },
    CurrencyFormat { code: "CHF", symbol: "CHF ", decimals: 2 },
    CurrencyFormat { code: "MXN", symbol: "$", decimals: 2 },
];

pub const DEFAULT_CURRENCY: &str = "CAD";

pub fn currency_format(code: &str) -> Option<CurrencyFormat> {
    let code = code.trim();
    CURRENCY_FORMATS.iter().copied().find(|format| format.code.eq_ignore_ascii_case(code))
}

/// Three ASCII letters; support in the symbol table is not required.
pub fn is_valid_currency_code(code: &str) -> bool {
    code.len() == 3 && code.chars().all(|ch| ch.is_ascii_alphabetic())
}

pub fn normalize_currency_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Rounds half away from zero, never banker's rounding.
pub fn round_money(amount: Decimal, decimals: u32) -> Decimal {
    amount.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero)
}

/// Renders `amount` as `"$1,234.56"`, `"¥1,235"`, or `"XYZ 1,234.56"` for
/// codes missing from the symbol table.
pub fn format_money(amount: Decimal, code: &str) -> String {
    let (prefix, decimals) = match currency_format(code) {
        Some(format) => (format.symbol.to_string(), format.decimals),
        None => (format!("{} ", normalize_currency_code(code)), 2),
    };

    let rounded = round_money(amount, decimals);
    let sign = if rounded < Decimal::ZERO { "-" } else { "" };
    let digits = format!("{:.*}", decimals as usize, rounded.abs());
    let (integer, fraction) = match digits.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (digits.as_str(), None),
    };

    let mut rendered = format!("{sign}{prefix}{}", group_thousands(integer));
    if let Some(fraction) = fraction {
        rendered.push('.');
        rendered.push_str(fraction);
    }
    rendered
}

/// `"$100.00 / hour"`; the unit suffix is dropped when blank.
pub fn format_price_with_unit(amount: Decimal, code: &str, unit: Option<&str>) -> String {
    let money = format_money(amount, code);
    match unit.map(str::trim).filter(|unit| !unit.is_empty()) {
        Some(unit) => format!("{money} / {unit}"),
        None => money,
    }
}

fn group_thousands(integer: &str) -> String {
    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (index, ch) in integer.chars().enumerate() {
        if index > 0 && (integer.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}
