//! Sensitive is a New Type for credentials (SASL passwords, API keys, bearer tokens, PEM
//! material) that must never end up in logs, health reports or error messages.
//!
//! `Debug`, `Display` and `Serialize` all print a mask. The wrapped value is reachable by
//! deref or [`Sensitive::expose`], which makes every read of a secret explicit.
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use std::fmt::{Debug, Display, Formatter};
use std::ops::Deref;
use std::str::FromStr;

const MASK: &str = "******";

#[derive(Clone, PartialEq, Eq)]
pub struct Sensitive<T>(T);

impl<T> Sensitive<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl<T> Display for Sensitive<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", MASK)
    }
}

impl<T> Debug for Sensitive<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Sensitive").field(&MASK).finish()
    }
}

impl<T> Serialize for Sensitive<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(MASK)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Sensitive<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        T::deserialize(deserializer).map(Self)
    }
}

impl<T> From<T> for Sensitive<T> {
    fn from(t: T) -> Self {
        Self(t)
    }
}

impl<T: FromStr> FromStr for Sensitive<T> {
    type Err = T::Err;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        T::from_str(s).map(Self)
    }
}

impl<T> Deref for Sensitive<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_the_secret_in_every_output() {
        let sensitive = Sensitive::new("sasl-password".to_string());

        assert_eq!(sensitive.to_string(), MASK);
        assert_eq!(format!("{:?}", sensitive), format!("Sensitive(\"{}\")", MASK));
        assert_eq!(
            serde_json::to_string(&sensitive).unwrap(),
            format!("\"{}\"", MASK)
        );
    }

    #[test]
    fn exposes_the_secret_on_request() {
        let sensitive: Sensitive<String> = "api-key".parse().unwrap();
        let exposed: &str = &sensitive;

        assert_eq!(exposed, "api-key");
        assert_eq!(sensitive.expose(), "api-key");
    }

    #[test]
    fn deserializes_the_plain_value() {
        let sensitive: Sensitive<String> = serde_json::from_str("\"token\"").unwrap();
        assert_eq!(sensitive.expose(), "token");
    }
}
