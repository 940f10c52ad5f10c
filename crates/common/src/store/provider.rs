use std::fmt::Debug;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

/// Design document holding the per-type views of a jam database
pub const TYPES_DESIGN: &str = "types";
/// Riffs keyed by creation time
pub const RIFFS_BY_CREATE_TIME: &str = "rifffsByCreateTime";
/// Stems keyed by creation time
pub const STEMS_BY_CREATE_TIME: &str = "loopsByCreateTime";
/// Database of login records
pub const USERS_DATABASE: &str = "_users";

const JAM_DATABASE_PREFIX: &str = "user_appdata$";

/// Name of the database holding a jam (or a user's personal jam)
pub fn jam_database(store_id: &str) -> String {
    format!("{}{}", JAM_DATABASE_PREFIX, store_id)
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached or is not answering
    #[error("document store unavailable: {0}")]
    Unavailable(String),
    #[error("database does not exist: {0}")]
    DatabaseMissing(String),
    #[error("document {id} missing from {database}")]
    DocumentMissing { database: String, id: String },
    #[error("document {id} in {database} was updated concurrently")]
    Conflict { database: String, id: String },
    #[error("unexpected document store response ({status}): {reason}")]
    Unexpected { status: u16, reason: String },
    #[error("failed to decode document {id} from {database}: {source}")]
    Decode {
        database: String,
        id: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    /// True when the thing asked for does not exist, as opposed to the
    ///  store failing to answer
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::DatabaseMissing(_) | StoreError::DocumentMissing { .. }
        )
    }
}

/// Options for a view or all-docs query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pub descending: bool,
    pub limit: Option<u64>,
    pub skip: Option<u64>,
    pub include_docs: bool,
}

impl QueryParams {
    /// Ascending, with documents, no limit
    pub fn with_docs() -> Self {
        Self {
            include_docs: true,
            ..Default::default()
        }
    }

    /// The newest `count` rows, with documents
    pub fn newest(count: u64) -> Self {
        Self {
            descending: true,
            limit: Some(count),
            skip: None,
            include_docs: true,
        }
    }

    pub fn page(mut self, skip: u64, limit: u64) -> Self {
        self.skip = (skip > 0).then_some(skip);
        self.limit = Some(limit);
        self
    }
}

/// One row of a view or all-docs response
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ViewRow {
    pub id: String,
    #[serde(default)]
    pub key: Value,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub doc: Option<Value>,
}

impl ViewRow {
    /// Decode the included document. A row without one (the query did not
    ///  ask for documents, or the document was deleted) is a missing document.
    pub fn decode_doc<T: DeserializeOwned>(&self, database: &str) -> Result<T, StoreError> {
        let doc = self
            .doc
            .as_ref()
            .filter(|doc| !doc.is_null())
            .ok_or_else(|| StoreError::DocumentMissing {
                database: database.to_string(),
                id: self.id.clone(),
            })?;
        decode_document(database, &self.id, doc.clone())
    }

    pub fn is_design_doc(&self) -> bool {
        self.id.starts_with("_design/")
    }
}

pub fn decode_document<T: DeserializeOwned>(
    database: &str,
    id: &str,
    document: Value,
) -> Result<T, StoreError> {
    serde_json::from_value(document).map_err(|source| StoreError::Decode {
        database: database.to_string(),
        id: id.to_string(),
        source,
    })
}

/// The document store the archive pipeline and the public jam cache read from.
///
/// Implementations must return view rows in index order; callers rely on
///  that order and never re-sort.
#[async_trait]
pub trait DocumentStore: Send + Sync + Debug + Clone + 'static {
    /// Query a view
    ///
    /// # Arguments
    /// * `database` - the database to query
    /// * `design` - design document the view lives in
    /// * `view` - name of the view
    /// * `params` - ordering, paging and whether to include documents
    async fn query(
        &self,
        database: &str,
        design: &str,
        view: &str,
        params: &QueryParams,
    ) -> Result<Vec<ViewRow>, StoreError>;

    /// List every document of a database, ordered by id
    async fn all_docs(
        &self,
        database: &str,
        params: &QueryParams,
    ) -> Result<Vec<ViewRow>, StoreError>;

    async fn get(&self, database: &str, id: &str) -> Result<Value, StoreError>;

    /// Create or replace a document, returning its new revision
    async fn put(&self, database: &str, id: &str, document: &Value) -> Result<String, StoreError>;
}
