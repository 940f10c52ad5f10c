/**
 * Document shapes stored in jam databases:
 *  riffs, stems, jam profiles and user records.
 */
pub mod documents;
/**
 * Lookup tables between the three names a jam
 *  goes by, plus export id derivation.
 */
pub mod identifiers;
/**
 * Document store seam. A CouchDB client over HTTP
 *  and an in-memory store for tests.
 */
pub mod store;

pub mod prelude {
    pub use crate::documents::{
        AudioAttachment, JamProfile, PlaybackSlot, RiffRecord, StemRecord, UserRecord,
    };
    pub use crate::identifiers::{
        derive_export_id, ExportTarget, IdentifierError, IdentifierRecord, IdentifierResolver,
    };
    pub use crate::store::{CouchStore, DocumentStore, MemoryDocumentStore, QueryParams, StoreError};
}
