use serde::{Deserialize, Serialize};

/// One of the three card kinds.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Rock,
    Paper,
    Scissors,
}

impl Kind {
    /// Display color tag derived from the kind; clients render cards by it.
    pub fn color(self) -> &'static str {
        match self {
            Kind::Rock => "red",
            Kind::Paper => "green",
            Kind::Scissors => "blue",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Rock => "rock",
            Kind::Paper => "paper",
            Kind::Scissors => "scissors",
        }
    }
}

/// A single card. `id` is stable and unique within one deal; two cards of
/// the same kind are still distinguishable by id.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Card {
    pub id: u8,
    pub kind: Kind,
}

impl Card {
    pub fn color(&self) -> &'static str {
        self.kind.color()
    }
}

// Wire format carries id, kind, and the derived color so clients never
// re-derive it.
impl Serialize for Card {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("Card", 3)?;
        s.serialize_field("id", &self.id)?;
        s.serialize_field("kind", &self.kind)?;
        s.serialize_field("color", self.kind.color())?;
        s.end()
    }
}

impl<'de> Deserialize<'de> for Card {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct CardWire {
            id: u8,
            kind: Kind,
        }
        let wire = CardWire::deserialize(deserializer)?;
        Ok(Card {
            id: wire.id,
            kind: wire.kind,
        })
    }
}
