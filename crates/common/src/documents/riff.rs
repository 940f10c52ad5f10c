use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use serde_with::{serde_as, DefaultOnNull};

/// Every riff carries exactly this many playback slots
pub const PLAYBACK_SLOTS: usize = 8;

/// One recorded multi-track contribution to a jam
///
/// Fields that nothing here interprets (colours, peak data, ..) are kept
///  in `extra` so the document can be handed back to clients unchanged.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiffRecord {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub user_name: String,
    /// unix milliseconds
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub created: i64,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub root: u32,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub scale: u32,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default, rename = "app_version")]
    pub app_version: i64,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub magnitude: f64,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub state: RiffState,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiffState {
    /// tempo in beats per second
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub bps: f64,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub bar_length: i64,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub playback: Vec<PlaybackEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaybackEntry {
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub slot: SlotHolder,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlotHolder {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<PlaybackSlot>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// What one playback slot was doing when the riff was recorded
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSlot {
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub on: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_loop: Option<String>,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub gain: f64,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl PlaybackSlot {
    pub fn enabled(&self) -> bool {
        self.on
    }

    /// Id of the stem loaded into this slot, empty if there is none
    pub fn stem_id(&self) -> &str {
        self.current_loop.as_deref().unwrap_or_default()
    }
}

impl RiffRecord {
    /// The eight playback slots in their original order. Slots missing
    ///  from the document come back empty and disabled.
    pub fn slots(&self) -> [PlaybackSlot; PLAYBACK_SLOTS] {
        std::array::from_fn(|i| {
            self.state
                .playback
                .get(i)
                .and_then(|entry| entry.slot.current.clone())
                .unwrap_or_default()
        })
    }

    pub fn bps(&self) -> f64 {
        self.state.bps
    }

    pub fn bar_length(&self) -> i64 {
        self.state.bar_length
    }
}
