use serde::{Deserialize, Serialize};

/// One chart row in chart order. Equality is structural; deduplication
/// keys on the whole (song, artist) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChartEntry {
    pub song_name: String,
    pub artist_name: String,
}

impl ChartEntry {
    pub fn new(song_name: impl Into<String>, artist_name: impl Into<String>) -> Self {
        Self {
            song_name: song_name.into(),
            artist_name: artist_name.into(),
        }
    }
}

/// A candidate playable track attached to a catalog item on extended reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRef {
    pub foreign_id: String,
}

impl TrackRef {
    /// Playable track key: the third `:`-separated field of the foreign id,
    /// e.g. "rdio-DE:track:t1234" -> "t1234". None when the id has fewer
    /// fields or an empty one; such a track contributes no key.
    pub fn playable_key(&self) -> Option<&str> {
        let key = self.foreign_id.split(':').nth(2)?;
        if key.is_empty() {
            None
        } else {
            Some(key)
        }
    }
}

/// Catalog item as returned by reads. `song_id` is remote-assigned and
/// absent until the item has materialized. `item_keyvalues` and `tracks`
/// only come back on extended reads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub song_id: Option<String>,
    #[serde(default)]
    pub song_name: String,
    #[serde(default)]
    pub artist_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_keyvalues: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tracks: Vec<TrackRef>,
}

impl CatalogItem {
    /// The manual `index` order attribute. The catalog echoes keyvalues
    /// back as strings, so both number and numeric string are accepted.
    pub fn order_index(&self) -> Option<u64> {
        match self.item_keyvalues.as_ref()?.get("index")? {
            serde_json::Value::Number(n) => n.as_u64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Playable key of the first candidate track. The first track is the
    /// match the catalog considers best; later candidates are not consulted.
    pub fn first_track_key(&self) -> Option<&str> {
        self.tracks.first().and_then(|t| t.playable_key())
    }
}

/// One page of a catalog read: the total item count the remote reports
/// plus the slice for this page.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogPage {
    pub total: usize,
    #[serde(default)]
    pub items: Vec<CatalogItem>,
}

/// Keyvalues written on fill. `index` is the entry's position in the
/// deduplicated chart, the only ordering the catalog retains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValues {
    pub index: usize,
}

/// One operation of a bulk catalog update. Serializes to the wire shape
/// `{"action": "delete"|"update", "item": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", content = "item", rename_all = "lowercase")]
pub enum BulkOp {
    Delete {
        song_id: String,
    },
    Update {
        song_name: String,
        artist_name: String,
        item_keyvalues: KeyValues,
    },
}

impl BulkOp {
    pub fn delete(song_id: impl Into<String>) -> Self {
        BulkOp::Delete {
            song_id: song_id.into(),
        }
    }

    pub fn update(entry: &ChartEntry, index: usize) -> Self {
        BulkOp::Update {
            song_name: entry.song_name.clone(),
            artist_name: entry.artist_name.clone(),
            item_keyvalues: KeyValues { index },
        }
    }
}

/// Handle for an asynchronous bulk-mutation job.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ticket(pub String);

impl std::fmt::Display for Ticket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ticket state as reported by the status endpoint. Anything other than
/// pending or complete is terminal and fails the job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketStatus {
    Pending,
    Complete,
    Other(String),
}

impl TicketStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "pending" => TicketStatus::Pending,
            "complete" => TicketStatus::Complete,
            other => TicketStatus::Other(other.to_string()),
        }
    }
}

/// A playlist as listed for the authenticated account, with its current
/// track keys.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistSummary {
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "trackKeys")]
    pub track_keys: Vec<String>,
}

/// OAuth access token pair, obtained once interactively and persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessCredentials {
    pub token: String,
    pub token_secret: String,
}
