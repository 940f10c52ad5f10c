use async_trait::async_trait;
use reqwest::{header::HeaderMap, header::HeaderValue, Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use super::provider::{DocumentStore, QueryParams, StoreError, ViewRow};

/// Document store backed by a CouchDB server
#[derive(Debug, Clone)]
pub struct CouchStore {
    base: Url,
    client: Client,
    user: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct ViewResponse {
    #[serde(default)]
    rows: Vec<ViewRow>,
}

#[derive(Debug, Deserialize)]
struct PutResponse {
    rev: String,
}

#[derive(Debug, Default, Deserialize)]
struct CouchErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    reason: String,
}

const DATABASE_MISSING_REASON: &str = "Database does not exist.";

impl CouchStore {
    pub fn new(base: &Url, user: &str, password: &str) -> Result<Self, StoreError> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert("Accept", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(default_headers)
            .build()
            .map_err(|e| StoreError::Unavailable(format!("failed to build client: {}", e)))?;

        Ok(Self {
            base: base.clone(),
            client,
            user: user.to_string(),
            password: password.to_string(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Build a url from path segments; each segment is percent-encoded on
    ///  its own so ids containing `/` stay a single segment
    fn url(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::Unavailable(format!("{} cannot be a base url", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(
        &self,
        request: RequestBuilder,
        database: &str,
        id: Option<&str>,
    ) -> Result<Response, StoreError> {
        let response = request
            .basic_auth(&self.user, Some(&self.password))
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body: CouchErrorBody = response.json().await.unwrap_or_default();
        tracing::debug!(
            database,
            id,
            status = status.as_u16(),
            error = %body.error,
            reason = %body.reason,
            "couch request failed"
        );
        Err(classify(status, body, database, id))
    }

    async fn rows(&self, request: RequestBuilder, database: &str) -> Result<Vec<ViewRow>, StoreError> {
        let response = self.send(request, database, None).await?;
        let body: ViewResponse = response.json().await.map_err(|e| StoreError::Unexpected {
            status: 200,
            reason: format!("malformed view response: {}", e),
        })?;
        Ok(body.rows)
    }
}

fn query_pairs(params: &QueryParams) -> Vec<(&'static str, String)> {
    let mut pairs = vec![
        ("descending", params.descending.to_string()),
        ("include_docs", params.include_docs.to_string()),
    ];
    if let Some(limit) = params.limit {
        pairs.push(("limit", limit.to_string()));
    }
    if let Some(skip) = params.skip {
        pairs.push(("skip", skip.to_string()));
    }
    pairs
}

fn classify(status: StatusCode, body: CouchErrorBody, database: &str, id: Option<&str>) -> StoreError {
    match status {
        StatusCode::NOT_FOUND if body.reason == DATABASE_MISSING_REASON => {
            StoreError::DatabaseMissing(database.to_string())
        }
        StatusCode::NOT_FOUND if id.is_some() => StoreError::DocumentMissing {
            database: database.to_string(),
            id: id.unwrap_or_default().to_string(),
        },
        StatusCode::CONFLICT => StoreError::Conflict {
            database: database.to_string(),
            id: id.unwrap_or_default().to_string(),
        },
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            StoreError::Unavailable(format!("{} {}", status, body.reason))
        }
        _ => StoreError::Unexpected {
            status: status.as_u16(),
            reason: if body.reason.is_empty() {
                body.error
            } else {
                body.reason
            },
        },
    }
}

#[async_trait]
impl DocumentStore for CouchStore {
    async fn query(
        &self,
        database: &str,
        design: &str,
        view: &str,
        params: &QueryParams,
    ) -> Result<Vec<ViewRow>, StoreError> {
        let url = self.url(&[database, "_design", design, "_view", view])?;
        let request = self.client.get(url).query(&query_pairs(params));
        self.rows(request, database).await
    }

    async fn all_docs(
        &self,
        database: &str,
        params: &QueryParams,
    ) -> Result<Vec<ViewRow>, StoreError> {
        let url = self.url(&[database, "_all_docs"])?;
        let request = self.client.get(url).query(&query_pairs(params));
        self.rows(request, database).await
    }

    async fn get(&self, database: &str, id: &str) -> Result<Value, StoreError> {
        let url = self.url(&[database, id])?;
        let response = self.send(self.client.get(url), database, Some(id)).await?;
        response.json().await.map_err(|e| StoreError::Unexpected {
            status: 200,
            reason: format!("malformed document {}: {}", id, e),
        })
    }

    async fn put(&self, database: &str, id: &str, document: &Value) -> Result<String, StoreError> {
        let url = self.url(&[database, id])?;
        let response = self
            .send(self.client.put(url).json(document), database, Some(id))
            .await?;
        let body: PutResponse = response.json().await.map_err(|e| StoreError::Unexpected {
            status: 201,
            reason: format!("malformed put response: {}", e),
        })?;
        Ok(body.rev)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> CouchStore {
        let base = Url::parse("http://couch.local:5984/").unwrap();
        CouchStore::new(&base, "admin", "secret").unwrap()
    }

    #[test]
    fn test_view_url_keeps_database_dollar() {
        let url = store()
            .url(&["user_appdata$band123", "_design", "types", "_view", "loopsByCreateTime"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://couch.local:5984/user_appdata$band123/_design/types/_view/loopsByCreateTime"
        );
    }

    #[test]
    fn test_document_id_is_one_segment() {
        let url = store().url(&["_users", "org.couchdb.user:a/b"]).unwrap();
        assert_eq!(url.path(), "/_users/org.couchdb.user:a%2Fb");
    }

    #[test]
    fn test_classify_not_found() {
        let missing_db = CouchErrorBody {
            error: "not_found".to_string(),
            reason: DATABASE_MISSING_REASON.to_string(),
        };
        assert!(matches!(
            classify(StatusCode::NOT_FOUND, missing_db, "db", Some("doc")),
            StoreError::DatabaseMissing(_)
        ));

        let missing_doc = CouchErrorBody {
            error: "not_found".to_string(),
            reason: "missing".to_string(),
        };
        assert!(matches!(
            classify(StatusCode::NOT_FOUND, missing_doc, "db", Some("doc")),
            StoreError::DocumentMissing { .. }
        ));

        let missing_view = CouchErrorBody {
            error: "not_found".to_string(),
            reason: "missing_named_view".to_string(),
        };
        assert!(matches!(
            classify(StatusCode::NOT_FOUND, missing_view, "db", None),
            StoreError::Unexpected { status: 404, .. }
        ));
    }

    #[test]
    fn test_query_pairs() {
        let pairs = query_pairs(&QueryParams::newest(1));
        assert!(pairs.contains(&("descending", "true".to_string())));
        assert!(pairs.contains(&("limit", "1".to_string())));
        assert!(!pairs.iter().any(|(k, _)| *k == "skip"));
    }
}
