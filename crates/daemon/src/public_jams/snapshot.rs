use serde::Serialize;

use common::documents::RiffRecord;
use common::identifiers::{IdentifierError, IdentifierResolver};

use crate::config::JamDeclaration;

/// A declared jam with its identifiers resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CuratedJam {
    pub cosmid: String,
    pub couch_id: String,
    pub long_id: String,
    pub name: String,
    pub bio: String,
    pub members: Vec<String>,
}

impl CuratedJam {
    pub fn resolve(
        declaration: &JamDeclaration,
        resolver: &IdentifierResolver,
    ) -> Result<Self, IdentifierError> {
        let record = resolver
            .record(&declaration.cosmid)
            .ok_or_else(|| IdentifierError::Unresolved(declaration.cosmid.clone()))?;
        Ok(Self {
            cosmid: record.cosmid.clone(),
            couch_id: record.couch_id.clone(),
            long_id: record.long_id.clone(),
            name: declaration.name.clone(),
            bio: declaration.bio.clone(),
            members: declaration.members.clone(),
        })
    }
}

/// What the studio client is shown for one curated jam
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicJamSnapshot {
    #[serde(rename = "jamId")]
    pub jam_id: String,
    #[serde(skip)]
    pub couch_id: String,
    pub name: String,
    pub bio: String,
    pub members: Vec<String>,
    /// newest riff, `None` until one is seen
    #[serde(rename = "rifff")]
    pub most_recent_riff: Option<RiffRecord>,
}

impl From<&CuratedJam> for PublicJamSnapshot {
    fn from(jam: &CuratedJam) -> Self {
        Self {
            jam_id: jam.long_id.clone(),
            couch_id: jam.couch_id.clone(),
            name: jam.name.clone(),
            bio: jam.bio.clone(),
            members: jam.members.clone(),
            most_recent_riff: None,
        }
    }
}

/// The most recent riff across all curated jams
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalActivitySynopsis {
    /// unix milliseconds, 0 before any riff is seen
    pub timestamp: i64,
    pub user: String,
    pub jam_name: String,
}

impl GlobalActivitySynopsis {
    /// Fold in the newest riff of `jams`; never moves backwards
    pub fn advance<'a>(mut self, jams: impl IntoIterator<Item = &'a PublicJamSnapshot>) -> Self {
        for jam in jams {
            if let Some(riff) = &jam.most_recent_riff {
                if riff.created > self.timestamp {
                    self.timestamp = riff.created;
                    self.user = riff.user_name.clone();
                    self.jam_name = jam.name.clone();
                }
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(name: &str, created: Option<i64>) -> PublicJamSnapshot {
        PublicJamSnapshot {
            jam_id: format!("long-{}", name),
            couch_id: format!("band-{}", name),
            name: name.to_string(),
            bio: String::new(),
            members: vec![],
            most_recent_riff: created.map(|created| RiffRecord {
                id: format!("riff-{}", name),
                user_name: format!("user-{}", name),
                created,
                ..Default::default()
            }),
        }
    }

    #[test]
    fn test_synopsis_takes_newest() {
        let jams = vec![snapshot("a", Some(100)), snapshot("b", Some(300)), snapshot("c", None)];
        let synopsis = GlobalActivitySynopsis::default().advance(&jams);
        assert_eq!(synopsis.timestamp, 300);
        assert_eq!(synopsis.user, "user-b");
        assert_eq!(synopsis.jam_name, "b");
    }

    #[test]
    fn test_synopsis_never_moves_backwards() {
        let start = GlobalActivitySynopsis {
            timestamp: 500,
            user: "earlier".to_string(),
            jam_name: "x".to_string(),
        };
        let synopsis = start.clone().advance(&[snapshot("a", Some(400))]);
        assert_eq!(synopsis, start);
    }

    #[test]
    fn test_snapshot_wire_shape() {
        let value = serde_json::to_value(snapshot("a", None)).unwrap();
        assert_eq!(value["jamId"], "long-a");
        assert!(value.get("couch_id").is_none());
        assert!(value["rifff"].is_null());
    }
}
