use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::Value;
use url::Url;

use crate::api::{Book, BookInput};
use crate::books_repository::ValidationError;

/// Number of decimal places prices are kept with, matches NUMERIC(10, 2)
pub const PRICE_SCALE: u32 = 2;

/// Prices must stay below 10^8 to fit NUMERIC(10, 2)
const PRICE_LIMIT: Decimal = Decimal::from_parts(100_000_000, 0, 0, false, 0);

impl BookInput {
    /// Converts raw input into a [`Book`] with canonical field types.
    pub fn normalize(self) -> Result<Book, ValidationError> {
        let upc = self.upc.trim().to_string();
        if upc.is_empty() {
            return Err(ValidationError::invalid_field(&self.upc, "upc", "must not be empty"));
        }
        let invalid = |field: &'static str, reason: String| ValidationError::InvalidField {
            upc: upc.clone(),
            field,
            reason,
        };

        let price = normalize_price(&self.price).map_err(|reason| invalid("price", reason))?;
        let rating = normalize_integer::<i16>(&self.rating).map_err(|reason| invalid("rating", reason))?;
        let num_available_units = normalize_integer::<i32>(&self.num_available_units)
            .map_err(|reason| invalid("num_available_units", reason))?;
        if num_available_units < 0 {
            return Err(invalid(
                "num_available_units",
                format!("must not be negative, got {num_available_units}"),
            ));
        }
        let image_url = normalize_url(&self.image_url).map_err(|reason| invalid("image_url", reason))?;
        let book_url = normalize_url(&self.book_url).map_err(|reason| invalid("book_url", reason))?;

        Ok(Book {
            title: self.title,
            price,
            rating,
            description: self.description,
            category: self.category,
            upc,
            num_available_units,
            image_url,
            book_url,
        })
    }
}

fn normalize_price(value: &Value) -> Result<Decimal, String> {
    let price = match value {
        Value::Number(number) => Decimal::from_str(&number.to_string())
            .or_else(|_| Decimal::from_scientific(&number.to_string()))
            .map_err(|err| format!("{number} is not a valid decimal: {err}"))?,
        Value::String(text) => Decimal::from_str(text.trim())
            .map_err(|err| format!("{text:?} is not a valid decimal: {err}"))?,
        other => return Err(format!("expected a number, got {other}")),
    };
    if price.is_sign_negative() && !price.is_zero() {
        return Err(format!("must not be negative, got {price}"));
    }
    let price = price.round_dp_with_strategy(PRICE_SCALE, RoundingStrategy::MidpointAwayFromZero);
    if price.abs() >= PRICE_LIMIT {
        return Err(format!("must be less than {PRICE_LIMIT}, got {price}"));
    }
    Ok(price)
}

fn normalize_integer<T>(value: &Value) -> Result<T, String>
where
    T: TryFrom<i64>,
{
    let wide = match value {
        Value::Number(number) => number
            .as_i64()
            .ok_or_else(|| format!("expected an integer, got {number}"))?,
        Value::String(text) => text
            .trim()
            .parse::<i64>()
            .map_err(|_| format!("expected an integer, got {text:?}"))?,
        other => return Err(format!("expected an integer, got {other}")),
    };
    T::try_from(wide).map_err(|_| format!("{wide} is out of range"))
}

fn normalize_url(value: &str) -> Result<String, String> {
    let url = Url::parse(value.trim()).map_err(|err| format!("{value:?} is not a valid url: {err}"))?;
    match url.scheme() {
        "http" | "https" => Ok(url.to_string()),
        scheme => Err(format!("unsupported url scheme {scheme}")),
    }
}
