use super::provider::{DocumentStore, QueryParams, StoreError, ViewRow};

/// Rows fetched per round trip when walking a whole view
pub const DEFAULT_PAGE_SIZE: u64 = 500;

#[derive(Debug, Clone)]
enum PageSource {
    View { design: String, view: String },
    AllDocs,
}

/// Walks a view (or all-docs) one page at a time, in index order
#[derive(Debug)]
pub struct ViewPager<'a, S> {
    store: &'a S,
    database: String,
    source: PageSource,
    params: QueryParams,
    page_size: u64,
    offset: u64,
    exhausted: bool,
}

impl<'a, S: DocumentStore> ViewPager<'a, S> {
    pub fn view(store: &'a S, database: &str, design: &str, view: &str) -> Self {
        Self::new(
            store,
            database,
            PageSource::View {
                design: design.to_string(),
                view: view.to_string(),
            },
        )
    }

    pub fn all_docs(store: &'a S, database: &str) -> Self {
        Self::new(store, database, PageSource::AllDocs)
    }

    fn new(store: &'a S, database: &str, source: PageSource) -> Self {
        Self {
            store,
            database: database.to_string(),
            source,
            params: QueryParams::with_docs(),
            page_size: DEFAULT_PAGE_SIZE,
            offset: 0,
            exhausted: false,
        }
    }

    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// Fetch the next page, `None` once the view is exhausted
    pub async fn next_page(&mut self) -> Result<Option<Vec<ViewRow>>, StoreError> {
        if self.exhausted {
            return Ok(None);
        }

        let params = self.params.clone().page(self.offset, self.page_size);
        let rows = match &self.source {
            PageSource::View { design, view } => {
                self.store
                    .query(&self.database, design, view, &params)
                    .await?
            }
            PageSource::AllDocs => self.store.all_docs(&self.database, &params).await?,
        };

        self.offset += rows.len() as u64;
        if (rows.len() as u64) < self.page_size {
            self.exhausted = true;
        }
        if rows.is_empty() {
            return Ok(None);
        }

        tracing::trace!(
            database = %self.database,
            offset = self.offset,
            rows = rows.len(),
            "fetched page"
        );
        Ok(Some(rows))
    }
}
