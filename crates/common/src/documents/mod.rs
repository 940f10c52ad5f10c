//! Documents read from jam databases
//!
//! These are snapshots written by the studio client; nothing in this
//!  repository creates or edits riffs and stems. Fields the client
//!  omits fall back to their defaults.

mod profile;
mod riff;
mod stem;

pub use profile::{JamProfile, UserRecord, PROFILE_DOCUMENT_ID};
pub use riff::{PlaybackSlot, RiffRecord, RiffState, PLAYBACK_SLOTS};
pub use stem::{AudioAttachment, CdnAttachments, StemRecord};

/// Document `type` of a riff
pub const RIFF_DOCUMENT_TYPE: &str = "Rifff";
/// Document `type` of a stem
pub const STEM_DOCUMENT_TYPE: &str = "Loop";

/// Creation times are stored in unix milliseconds
pub fn millis_to_secs(millis: i64) -> i64 {
    millis / 1000
}
