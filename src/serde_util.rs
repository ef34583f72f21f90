//! The Graph API renders most numeric metrics as JSON strings (`"spend": "12.34"`),
//! but not consistently. These helpers accept either form.

use serde::de::{self, Deserializer};
use serde::Deserialize;
use std::str::FromStr;

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString<T> {
    Number(T),
    String(String),
    Null(()),
}

fn parse<'de, T, D>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + FromStr + Default,
    T::Err: std::fmt::Display,
{
    match NumberOrString::<T>::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) if s.trim().is_empty() => Ok(T::default()),
        NumberOrString::String(s) => s.trim().parse().map_err(de::Error::custom),
        NumberOrString::Null(()) => Ok(T::default()),
    }
}

pub fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    parse(deserializer)
}

pub fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    parse(deserializer)
}

/// Graph ids are usually strings but occasionally arrive as bare numbers.
pub fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        String(String),
        Number(serde_json::Number),
        Null(()),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::String(s) => s,
        Id::Number(n) => n.to_string(),
        Id::Null(()) => String::new(),
    })
}
