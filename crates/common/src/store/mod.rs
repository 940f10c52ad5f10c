mod couch;
mod memory;
mod pager;
mod provider;

pub use couch::CouchStore;
pub use memory::MemoryDocumentStore;
pub use pager::{ViewPager, DEFAULT_PAGE_SIZE};
pub use provider::{
    decode_document, jam_database, DocumentStore, QueryParams, StoreError, ViewRow,
    RIFFS_BY_CREATE_TIME, STEMS_BY_CREATE_TIME, TYPES_DESIGN, USERS_DATABASE,
};
