/// Shared data structures for the application state
///
/// These structs represent the data model that flows between
/// the history database and the card deck.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stable identifier of a card, assigned at creation and never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CardId(Uuid);

impl CardId {
    /// Generate a fresh random identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(value: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(value).map(Self)
    }

    /// A small stable number derived from the id, used to vary card art
    pub fn hue_seed(&self) -> u8 {
        self.0.as_bytes().iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
    }
}

impl Default for CardId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Display payload produced by the artifact source.
///
/// The deck treats this as opaque content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub title: String,
    pub subtitle: String,
    pub description: String,
    /// Reference to the card illustration (URL or file path)
    pub image_url: Option<String>,
}

/// One persisted card in the history
#[derive(Debug, Clone, PartialEq)]
pub struct CardRecord {
    pub id: CardId,
    pub artifact: Artifact,
    pub created_at: DateTime<Utc>,
}

impl CardRecord {
    /// Create a record for a freshly generated artifact
    pub fn new(artifact: Artifact) -> Self {
        Self {
            id: CardId::new(),
            artifact,
            created_at: Utc::now(),
        }
    }

    /// File name used when the card is downloaded as an image
    pub fn download_name(&self) -> String {
        let title = self.artifact.title.trim();
        let stem = if title.is_empty() {
            "concept".to_string()
        } else {
            title.split_whitespace().collect::<Vec<_>>().join("-")
        };
        format!("{stem}-card.png")
    }
}
