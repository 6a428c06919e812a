mod builder;
mod document;
mod filter;
mod graph;

pub use builder::{GraphBuilder, build_graph};
pub use document::{CallDocument, DocumentError, EdgeDocument, GraphDocument, NodeDocument};
pub use filter::{DateRange, DurationRange, FilterCriteria, filter, filter_with_cancel};
pub use graph::Graph;
