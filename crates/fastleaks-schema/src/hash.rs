use serde::{Deserialize, Serialize};

/// A validated SHA-256 digest: exactly 64 lowercase hex characters.
///
/// Every content-addressed path and every wire message in this system is
/// keyed by one of these. Validating at construction keeps malformed hashes
/// out of the storage layer rather than surfacing as an I/O error three
/// calls downstream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Sha256Hash(String);

/// A hash string failed validation.
#[derive(thiserror::Error, Debug)]
#[error("invalid sha256 hash: expected 64 lowercase hex chars, got '{0}'")]
pub struct InvalidHash(String);

impl Sha256Hash {
    /// Validate and wrap a hex string.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidHash`] unless `s` is exactly 64 lowercase hex digits.
    pub fn parse(s: impl Into<String>) -> Result<Self, InvalidHash> {
        let s = s.into();
        let is_lower_hex = s
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if s.len() == 64 && is_lower_hex {
            Ok(Self(s))
        } else {
            Err(InvalidHash(s))
        }
    }

    /// Return the hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The two two-hex-digit prefixes used as storage fan-out directories.
    pub fn prefixes(&self) -> (&str, &str) {
        (&self.0[0..2], &self.0[2..4])
    }
}

impl std::fmt::Display for Sha256Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Sha256Hash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Sha256Hash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_64_lowercase_hex() {
        let s = "a".repeat(64);
        assert!(Sha256Hash::parse(s).is_ok());
    }

    #[test]
    fn rejects_uppercase() {
        let s = "A".repeat(64);
        assert!(Sha256Hash::parse(s).is_err());
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(Sha256Hash::parse("abc").is_err());
    }

    #[test]
    fn prefixes_split_first_four_chars() {
        let hash = Sha256Hash::parse(format!("ab12{}", "0".repeat(60))).unwrap();
        assert_eq!(hash.prefixes(), ("ab", "12"));
    }
}
