use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnNull};

/// One audio loop referenced by riffs
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StemRecord {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default, rename = "app_version")]
    pub app_version: i64,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub bar_length: i64,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub bps: f64,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default, rename = "cdn_attachments")]
    pub cdn_attachments: CdnAttachments,
    /// unix milliseconds
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub created: i64,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub creator_user_name: String,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub is_bass: bool,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub is_drum: bool,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub is_mic: bool,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub is_note: bool,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default, rename = "length16ths")]
    pub length_16ths: i64,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub original_pitch: f64,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub preset_name: String,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub primary_colour: String,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub sample_rate: f64,
}

/// Encoded audio uploads for a stem
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CdnAttachments {
    /// lossy encoding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ogg_audio: Option<AudioAttachment>,
    /// lossless encoding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flac_audio: Option<AudioAttachment>,
}

#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioAttachment {
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub endpoint: String,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub key: String,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub mime: String,
    /// byte length of the encoded file
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub length: u64,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub hash: String,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub url: String,
}

impl StemRecord {
    /// The attachment an export should point at: the lossless one when it
    ///  was uploaded, otherwise the lossy one.
    pub fn active_attachment(&self) -> Option<&AudioAttachment> {
        match &self.cdn_attachments.flac_audio {
            Some(flac) if !flac.endpoint.is_empty() => Some(flac),
            _ => self.cdn_attachments.ogg_audio.as_ref(),
        }
    }

    /// First character of the id, used to shard the stem cache
    pub fn shard(&self) -> Option<char> {
        self.id.chars().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attachment(endpoint: &str, key: &str) -> AudioAttachment {
        AudioAttachment {
            endpoint: endpoint.to_string(),
            key: key.to_string(),
            mime: "audio/ogg".to_string(),
            length: 1024,
            ..Default::default()
        }
    }

    #[test]
    fn test_lossy_only_is_active() {
        let stem = StemRecord {
            id: "abc".to_string(),
            cdn_attachments: CdnAttachments {
                ogg_audio: Some(attachment("cdn.example", "attachments/oggAudio/abc")),
                flac_audio: None,
            },
            ..Default::default()
        };
        assert_eq!(stem.active_attachment().unwrap().key, "attachments/oggAudio/abc");
    }

    #[test]
    fn test_lossless_takes_precedence() {
        let stem = StemRecord {
            id: "abc".to_string(),
            cdn_attachments: CdnAttachments {
                ogg_audio: Some(attachment("cdn.example", "attachments/oggAudio/abc")),
                flac_audio: Some(attachment("cdn.example", "attachments/flacAudio/abc")),
            },
            ..Default::default()
        };
        assert_eq!(stem.active_attachment().unwrap().key, "attachments/flacAudio/abc");
    }

    #[test]
    fn test_empty_lossless_falls_back() {
        let stem = StemRecord {
            id: "abc".to_string(),
            cdn_attachments: CdnAttachments {
                ogg_audio: Some(attachment("cdn.example", "attachments/oggAudio/abc")),
                flac_audio: Some(AudioAttachment::default()),
            },
            ..Default::default()
        };
        assert_eq!(stem.active_attachment().unwrap().key, "attachments/oggAudio/abc");
    }

    #[test]
    fn test_decode_stem() {
        let stem: StemRecord = serde_json::from_value(json!({
            "_id": "f00dfeed",
            "type": "Loop",
            "bps": 2.5,
            "barLength": 16,
            "length16ths": 64,
            "creatorUserName": "brubeck",
            "isDrum": true,
            "sampleRate": 44100.0,
            "cdn_attachments": {
                "oggAudio": { "endpoint": "cdn.example", "key": "k", "mime": "audio/ogg", "length": 99 }
            }
        }))
        .unwrap();
        assert_eq!(stem.length_16ths, 64);
        assert!(stem.is_drum);
        assert_eq!(stem.active_attachment().unwrap().length, 99);
        assert_eq!(stem.shard(), Some('f'));
    }

    #[test]
    fn test_null_fields_decode_as_defaults() {
        let stem: StemRecord = serde_json::from_value(json!({
            "_id": "s1",
            "presetName": null,
            "primaryColour": null,
            "creatorUserName": null,
            "originalPitch": null,
            "isMic": null,
            "cdn_attachments": {
                "oggAudio": { "endpoint": "cdn.example", "key": "k", "mime": null, "length": 4, "hash": null }
            }
        }))
        .unwrap();
        assert_eq!(stem.preset_name, "");
        assert_eq!(stem.creator_user_name, "");
        assert_eq!(stem.original_pitch, 0.0);
        assert!(!stem.is_mic);
        let attachment = stem.active_attachment().unwrap();
        assert_eq!(attachment.mime, "");
        assert_eq!(attachment.length, 4);
    }
}
