//! Typed operations produced by the request translator.

use crate::envelope::Document;
use std::fmt;

/// The four operations the gateway knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Store a document.
    Index,
    /// Fetch a document by id.
    Get,
    /// Run a query.
    Search,
    /// Continue a scrolled search.
    Scroll,
}

impl OperationKind {
    /// Look up the operation named by a request's `action` field.
    pub fn from_action(action: &str) -> Option<Self> {
        match action {
            "index" => Some(OperationKind::Index),
            "get" => Some(OperationKind::Get),
            "search" => Some(OperationKind::Search),
            "scroll" => Some(OperationKind::Scroll),
            _ => None,
        }
    }

    /// The `action` value for this operation.
    pub fn action(&self) -> &'static str {
        match self {
            OperationKind::Index => "index",
            OperationKind::Get => "get",
            OperationKind::Search => "search",
            OperationKind::Scroll => "scroll",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OperationKind::Index => "Index",
            OperationKind::Get => "Get",
            OperationKind::Search => "Search",
            OperationKind::Scroll => "Scroll",
        };
        f.write_str(label)
    }
}

/// Parameters for storing a document.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexParams {
    /// Target index.
    pub index: String,
    /// Document type.
    pub doc_type: String,
    /// Document id; `None` or empty lets the engine generate one.
    pub id: Option<String>,
    /// Document body.
    pub source: Document,
}

/// Parameters for fetching a document.
#[derive(Debug, Clone, PartialEq)]
pub struct GetParams {
    /// Index holding the document.
    pub index: String,
    /// Document type.
    pub doc_type: String,
    /// Document id (may be empty).
    pub id: String,
}

/// Parameters for a search.
///
/// Every `Option` left as `None` means the parameter is not sent at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchParams {
    /// Indices to search; empty searches everything.
    pub indices: Vec<String>,
    /// Types to search; empty means no type restriction.
    pub types: Vec<String>,
    /// Query DSL.
    pub query: Option<Document>,
    /// Filter applied to the hits.
    pub filter: Option<Document>,
    /// Facet/aggregation definitions.
    pub facets: Option<Document>,
    /// Search type, e.g. `dfs_query_then_fetch`.
    pub search_type: Option<String>,
    /// Scroll keep-alive, e.g. `1m`.
    pub scroll: Option<String>,
}

/// Parameters for continuing a scrolled search.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollParams {
    /// Opaque cursor from the previous page.
    pub scroll_id: String,
    /// Keep-alive for the next page.
    pub scroll: String,
}

/// A validated request, ready for dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Store a document.
    Index(IndexParams),
    /// Fetch a document by id.
    Get(GetParams),
    /// Run a query.
    Search(SearchParams),
    /// Continue a scrolled search.
    Scroll(ScrollParams),
}

impl Operation {
    /// The kind of this operation.
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Index(_) => OperationKind::Index,
            Operation::Get(_) => OperationKind::Get,
            Operation::Search(_) => OperationKind::Search,
            Operation::Scroll(_) => OperationKind::Scroll,
        }
    }
}
