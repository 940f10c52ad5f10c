use serde_json::{json, Value};

use common::documents::PROFILE_DOCUMENT_ID;
use common::store::{jam_database, DocumentStore, StoreError};

use super::snapshot::CuratedJam;

/// Bring a jam's profile document in line with its declared name and bio.
///
/// Returns whether the document was written. A jam whose database does
///  not exist yet is left alone.
pub async fn sync_jam_profile<S: DocumentStore>(
    store: &S,
    jam: &CuratedJam,
) -> Result<bool, StoreError> {
    let database = jam_database(&jam.couch_id);

    let mut profile = match store.get(&database, PROFILE_DOCUMENT_ID).await {
        Ok(profile) => profile,
        Err(StoreError::DocumentMissing { .. }) => json!({}),
        Err(StoreError::DatabaseMissing(_)) => {
            tracing::warn!(cosmid = %jam.cosmid, couch_id = %jam.couch_id, "jam database does not exist");
            return Ok(false);
        }
        Err(e) => return Err(e),
    };

    let current_name = profile.get("displayName").and_then(Value::as_str);
    let current_bio = profile.get("bio").and_then(Value::as_str);
    if current_name == Some(jam.name.as_str()) && current_bio == Some(jam.bio.as_str()) {
        return Ok(false);
    }

    if let Some(fields) = profile.as_object_mut() {
        fields.insert("displayName".to_string(), json!(jam.name));
        fields.insert("bio".to_string(), json!(jam.bio));
        fields.insert("type".to_string(), json!(PROFILE_DOCUMENT_ID));
        fields
            .entry("created")
            .or_insert_with(|| json!(chrono::Utc::now().timestamp_millis()));
    }

    let rev = store.put(&database, PROFILE_DOCUMENT_ID, &profile).await?;
    tracing::info!(cosmid = %jam.cosmid, rev = %rev, "updated jam profile");
    Ok(true)
}
