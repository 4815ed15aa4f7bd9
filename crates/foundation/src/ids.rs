use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Kind of a geographic object as delivered by the data source.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ObjectKind {
    Node,
    Way,
    Relation,
}

impl ObjectKind {
    pub fn prefix(self) -> char {
        match self {
            ObjectKind::Node => 'n',
            ObjectKind::Way => 'w',
            ObjectKind::Relation => 'r',
        }
    }
}

/// Stable identifier of a geographic object.
///
/// Uses the compact `n…`/`w…`/`r…` textual form of the upstream data
/// source for display, parsing and serialization.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId {
    pub kind: ObjectKind,
    pub num: u64,
}

impl ObjectId {
    pub fn new(kind: ObjectKind, num: u64) -> Self {
        Self { kind, num }
    }

    pub fn node(num: u64) -> Self {
        Self::new(ObjectKind::Node, num)
    }

    pub fn way(num: u64) -> Self {
        Self::new(ObjectKind::Way, num)
    }

    pub fn relation(num: u64) -> Self {
        Self::new(ObjectKind::Relation, num)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.prefix(), self.num)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid object id {input:?}")]
pub struct ParseObjectIdError {
    pub input: String,
}

impl FromStr for ObjectId {
    type Err = ParseObjectIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseObjectIdError {
            input: s.to_string(),
        };
        let mut chars = s.chars();
        let kind = match chars.next().ok_or_else(err)? {
            'n' => ObjectKind::Node,
            'w' => ObjectKind::Way,
            'r' => ObjectKind::Relation,
            _ => return Err(err()),
        };
        let num = chars.as_str().parse::<u64>().map_err(|_| err())?;
        Ok(ObjectId { kind, num })
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::{ObjectId, ObjectKind};

    #[test]
    fn display_uses_compact_form() {
        assert_eq!(ObjectId::node(42).to_string(), "n42");
        assert_eq!(ObjectId::way(7).to_string(), "w7");
        assert_eq!(ObjectId::relation(1234).to_string(), "r1234");
    }

    #[test]
    fn parses_compact_form() {
        let id: ObjectId = "n42".parse().unwrap();
        assert_eq!(id, ObjectId::new(ObjectKind::Node, 42));
        assert!("x42".parse::<ObjectId>().is_err());
        assert!("n".parse::<ObjectId>().is_err());
        assert!("".parse::<ObjectId>().is_err());
    }

    #[test]
    fn orders_by_kind_then_number() {
        assert!(ObjectId::node(9) < ObjectId::way(1));
        assert!(ObjectId::node(1) < ObjectId::node(2));
    }
}
