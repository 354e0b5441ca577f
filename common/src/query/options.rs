use serde::Serialize;

use crate::query::filter::Filter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// What a scan pushes down to a data source: conjoined filters, a single
/// sort key, limit/offset and the projected column set (empty = all).
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryOptions {
    pub filters: Vec<Filter>,
    pub order_by: Option<String>,
    pub order: SortOrder,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub columns: Vec<String>,
    /// Hint that the caller wants every column even though `columns` is
    /// populated, so sources can skip projection work.
    pub select_all: bool,
}

impl QueryOptions {
    pub fn with_filters(filters: Vec<Filter>) -> Self {
        QueryOptions {
            filters,
            ..Default::default()
        }
    }

    pub fn wants_column(&self, name: &str) -> bool {
        self.select_all || self.columns.is_empty() || self.columns.iter().any(|c| c == name)
    }
}
