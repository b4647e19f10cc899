//! Query layer: turns loosely-typed request parameters into filters,
//! projections, sort specs and page windows that the repository executes.

pub mod filter;
pub mod page;
pub mod projection;
pub mod sort;

pub use filter::{FilterBuilder, FilterClause, ListParams, NamePattern, UserFilter};
pub use page::{clamp_limit, PageRequest};
pub use projection::{Document, FieldSelection, Preset, Projection, UserField};
pub use sort::{SortField, SortOrder, SortSpec};
