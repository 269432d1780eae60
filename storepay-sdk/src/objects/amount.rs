//! Exact decimal (de)serialization for money fields.
//!
//! Storefront clients and Monnify send amounts as JSON numbers (`2000`,
//! `19.99`), other clients send strings (`"19.99"`). Both are parsed into a
//! [`Decimal`] through their textual form so no binary floating point value
//! ever decides an amount.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAmount {
    Text(String),
    Number(serde_json::Number),
}

impl RawAmount {
    fn into_decimal<E: serde::de::Error>(self) -> Result<Decimal, E> {
        let text = match self {
            RawAmount::Text(text) => text,
            RawAmount::Number(number) => number.to_string(),
        };
        Decimal::from_str_exact(text.trim()).map_err(E::custom)
    }
}

/// `#[serde(with = "lenient_decimal")]` for required amounts.
pub mod lenient_decimal {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
    where
        D: Deserializer<'de>,
    {
        RawAmount::deserialize(deserializer)?.into_decimal()
    }

    pub fn serialize<S>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_string())
    }
}

/// `#[serde(default, with = "lenient_decimal_opt")]` for optional amounts.
pub mod lenient_decimal_opt {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<RawAmount>::deserialize(deserializer)?
            .map(RawAmount::into_decimal)
            .transpose()
    }

    pub fn serialize<S>(value: &Option<Decimal>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(value) => serializer.serialize_str(&value.to_string()),
            None => serializer.serialize_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use std::str::FromStr;

    #[derive(Debug, Deserialize, Serialize)]
    struct Priced {
        #[serde(with = "lenient_decimal")]
        price: Decimal,
        #[serde(default, with = "lenient_decimal_opt")]
        paid: Option<Decimal>,
    }

    #[test]
    fn numbers_and_strings_parse_exactly() {
        let p: Priced = serde_json::from_str(r#"{"price": 19.99, "paid": "2000.50"}"#).unwrap();
        assert_eq!(p.price, Decimal::from_str("19.99").unwrap());
        assert_eq!(p.paid, Some(Decimal::from_str("2000.50").unwrap()));

        let p: Priced = serde_json::from_str(r#"{"price": 1000}"#).unwrap();
        assert_eq!(p.price, Decimal::from(1000));
        assert_eq!(p.paid, None);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(serde_json::from_str::<Priced>(r#"{"price": "ten"}"#).is_err());
        assert!(serde_json::from_str::<Priced>(r#"{"price": true}"#).is_err());
    }

    #[test]
    fn serializes_as_string() {
        let p = Priced {
            price: Decimal::new(1999, 2),
            paid: None,
        };
        assert_eq!(
            serde_json::to_string(&p).unwrap(),
            r#"{"price":"19.99","paid":null}"#
        );
    }
}
