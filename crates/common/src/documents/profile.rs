use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnNull};

/// Id of the document describing a jam to the studio client
pub const PROFILE_DOCUMENT_ID: &str = "Profile";

#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JamProfile {
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub display_name: String,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub bio: String,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub created: i64,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default, rename = "type")]
    pub kind: String,
}

/// A record from the `_users` database
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub name: String,
    /// login secret, also used to lock the user's solo export
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub login: String,
}
