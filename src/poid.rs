//! Portal object ids.
//!
//! Canonical text form is `"<database> <type> <id> <revision>"`, e.g.
//! `0.0.0.1 /account 12345 0`. The database is four 16-bit segments packed
//! into a `u64`; a bare integer `N` is shorthand for `0.0.0.N`.

use std::fmt;
use std::str::FromStr;

use arrayvec::ArrayVec;
use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use smol_str::SmolStr;

use crate::error::{FlistError, Result};

pub const TYPE_ONLY_ID: i64 = -1;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Poid {
    pub database: u64,
    pub poid_type: SmolStr,
    pub id: i64,
    pub revision: i64,
}

impl Poid {
    pub fn new(database: u64, poid_type: &str, id: i64, revision: i64) -> Result<Self> {
        validate_type(poid_type)?;
        Ok(Self {
            database,
            poid_type: SmolStr::new(poid_type),
            id,
            revision,
        })
    }

    /// A POID naming a storable class rather than one object.
    pub fn type_only(database: u64, poid_type: &str) -> Result<Self> {
        Self::new(database, poid_type, TYPE_ONLY_ID, 0)
    }

    pub fn is_type_only(&self) -> bool {
        self.id == TYPE_ONLY_ID
    }

    /// Parses the 4-token canonical form.
    pub fn parse(text: &str) -> Result<Self> {
        let mut tokens: ArrayVec<&str, 4> = ArrayVec::new();
        for token in text.split_whitespace() {
            tokens
                .try_push(token)
                .map_err(|_| FlistError::InvalidValue(format!("too many POID tokens in {text:?}")))?;
        }
        let [database, poid_type, id, revision] = tokens.as_slice() else {
            return Err(FlistError::InvalidValue(format!(
                "expected \"database type id revision\", got {text:?}"
            )));
        };
        Self::new(
            parse_database(database)?,
            poid_type,
            parse_int(id, "id")?,
            parse_int(revision, "revision")?,
        )
    }
}

impl fmt::Display for Poid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            format_database(self.database),
            self.poid_type,
            self.id,
            self.revision
        )
    }
}

impl FromStr for Poid {
    type Err = FlistError;

    fn from_str(s: &str) -> Result<Self> {
        Poid::parse(s)
    }
}

impl Serialize for Poid {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Poid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Poid::parse(&text).map_err(de::Error::custom)
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────────

fn validate_type(poid_type: &str) -> Result<()> {
    match poid_type.chars().next() {
        None => Err(FlistError::InvalidValue("empty POID type".into())),
        Some(c) if c.is_ascii_digit() => Err(FlistError::InvalidValue(format!(
            "POID type {poid_type:?} starts with a digit; the database goes first"
        ))),
        Some(_) if poid_type.chars().any(char::is_whitespace) => Err(FlistError::InvalidValue(
            format!("POID type {poid_type:?} contains whitespace"),
        )),
        Some(_) => Ok(()),
    }
}

fn parse_int(token: &str, what: &str) -> Result<i64> {
    token
        .parse::<i64>()
        .map_err(|_| FlistError::InvalidValue(format!("POID {what} {token:?} is not an integer")))
}

/// `0.0.0.1` and `1` are the same database.
pub fn parse_database(text: &str) -> Result<u64> {
    let bad = || FlistError::InvalidValue(format!("bad POID database {text:?}"));
    if !text.contains('.') {
        return text.parse::<u64>().map_err(|_| bad());
    }
    let mut segments: ArrayVec<u16, 4> = ArrayVec::new();
    for part in text.split('.') {
        let seg = part.parse::<u16>().map_err(|_| bad())?;
        segments.try_push(seg).map_err(|_| bad())?;
    }
    if !segments.is_full() {
        return Err(bad());
    }
    Ok(segments
        .iter()
        .fold(0u64, |acc, seg| (acc << 16) | u64::from(*seg)))
}

pub fn format_database(database: u64) -> String {
    format!(
        "{}.{}.{}.{}",
        (database >> 48) & 0xFFFF,
        (database >> 32) & 0xFFFF,
        (database >> 16) & 0xFFFF,
        database & 0xFFFF
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_canonical_form() {
        let poid = Poid::parse("0.0.0.1 /account 12345 3").unwrap();
        assert_eq!(poid.database, 1);
        assert_eq!(poid.poid_type, "/account");
        assert_eq!(poid.id, 12345);
        assert_eq!(poid.revision, 3);
        assert!(!poid.is_type_only());
    }

    #[test]
    fn format_uses_dotted_database() {
        let poid = Poid::type_only(1, "/search").unwrap();
        assert_eq!(poid.to_string(), "0.0.0.1 /search -1 0");
        assert!(poid.is_type_only());
    }

    #[test]
    fn database_shorthand_and_segments() {
        assert_eq!(parse_database("1").unwrap(), 1);
        assert_eq!(parse_database("0.0.0.1").unwrap(), 1);
        assert_eq!(parse_database("0.0.1.2").unwrap(), (1 << 16) | 2);
        assert_eq!(format_database((1 << 16) | 2), "0.0.1.2");
        assert!(parse_database("0.0.1").is_err());
        assert!(parse_database("0.0.0.0.1").is_err());
        assert!(parse_database("db").is_err());
    }

    #[test]
    fn rejects_digit_leading_type() {
        assert!(matches!(
            Poid::new(1, "1account", -1, 0),
            Err(FlistError::InvalidValue(_))
        ));
        assert!(matches!(
            Poid::parse("0.0.0.1 2 3 4"),
            Err(FlistError::InvalidValue(_))
        ));
    }

    #[test]
    fn rejects_wrong_token_counts() {
        assert!(Poid::parse("0.0.0.1 /account 1").is_err());
        assert!(Poid::parse("0.0.0.1 /account 1 0 9").is_err());
        assert!(Poid::parse("").is_err());
        assert!(Poid::parse("0.0.0.1 /account one 0").is_err());
    }

    #[test]
    fn serde_as_string() {
        let poid = Poid::new(1, "/service/ip", 42, 1).unwrap();
        let json = serde_json::to_string(&poid).unwrap();
        assert_eq!(json, "\"0.0.0.1 /service/ip 42 1\"");
        let back: Poid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, poid);
    }

    proptest! {
        #[test]
        fn parse_inverts_format(
            database in any::<u64>(),
            poid_type in "/[a-z_]{1,12}(/[a-z_]{1,8})?",
            id in any::<i64>(),
            revision in any::<i64>(),
        ) {
            let poid = Poid::new(database, &poid_type, id, revision).unwrap();
            prop_assert_eq!(Poid::parse(&poid.to_string()).unwrap(), poid);
        }
    }
}
