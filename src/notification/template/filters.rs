//! Custom minijinja filters used by the alert template.

use std::str::FromStr;

use minijinja::{Error, ErrorKind};
use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};

/// Upper bound on the number of emojis in the alert bar.
pub const MAX_EMOJIS: u64 = 100;

const MARKET_CAP_UNITS: [&str; 5] = ["", "K", "M", "B", "T"];

fn parse_decimal(value: &str, filter: &str) -> Result<Decimal, Error> {
    Decimal::from_str(value.trim()).map_err(|e| {
        Error::new(ErrorKind::InvalidOperation, format!("{filter}: cannot parse {value:?} ({e})"))
    })
}

/// Number of emojis for a buy of `usd` with one emoji per `step`.
///
/// Always between 1 and `MAX_EMOJIS`. A non-positive step yields one emoji.
pub fn emoji_count(usd: Decimal, step: Decimal) -> u64 {
    if step <= Decimal::ZERO {
        return 1;
    }
    let count = match usd.checked_div(step) {
        Some(ratio) => ratio.floor().to_i64().unwrap_or(i64::MAX),
        None => i64::MAX,
    };
    count.clamp(1, MAX_EMOJIS as i64) as u64
}

/// Renders a market cap with a unit suffix, keeping about five significant
/// digits. `1_234_567` becomes `1.2346M` and `950` stays `950`.
pub fn format_market_cap(value: Decimal) -> String {
    let thousand = Decimal::from(1000);
    let mut mantissa = value;
    let mut unit = 0;
    while mantissa >= thousand && unit < MARKET_CAP_UNITS.len() - 1 {
        mantissa /= thousand;
        unit += 1;
    }

    let integer_digits = mantissa.trunc().abs().to_string().len();
    let decimals = 5usize.saturating_sub(integer_digits) as u32;
    let rounded = mantissa
        .round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero)
        .normalize();
    format!("{rounded}{}", MARKET_CAP_UNITS[unit])
}

/// Renders `value` with exactly `precision` decimals.
pub fn format_fixed(value: Decimal, precision: usize) -> String {
    format!("{value:.precision$}")
}

/// Shortens a wallet to its first 2 and last 8 characters.
pub fn shorten_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    let prefix: String = chars.iter().take(2).collect();
    let suffix: String = chars[chars.len().saturating_sub(8)..].iter().collect();
    format!("{prefix}...{suffix}")
}

/// `{{ market.market_cap | market_cap }}`
pub fn market_cap(value: String) -> Result<String, Error> {
    Ok(format_market_cap(parse_decimal(&value, "market_cap")?))
}

/// `{{ market.price | price(15) }}`
pub fn price(value: String, precision: usize) -> Result<String, Error> {
    Ok(format_fixed(parse_decimal(&value, "price")?, precision))
}

/// `{{ trade.usd | usd }}`, two decimals.
pub fn usd(value: String) -> Result<String, Error> {
    Ok(format_fixed(parse_decimal(&value, "usd")?, 2))
}

/// `{{ trade.maker | short_address }}`
pub fn short_address(value: String) -> String {
    shorten_address(&value)
}

/// `{{ emoji | emoji_bar(trade.usd, step) }}`
pub fn emoji_bar(emoji: String, usd: String, step: String) -> Result<String, Error> {
    let count = emoji_count(parse_decimal(&usd, "emoji_bar")?, parse_decimal(&step, "emoji_bar")?);
    Ok(emoji.repeat(count as usize))
}
