mod export;
mod query;
mod session;
mod summary;

pub use export::{
    EDGES_CSV_HEADER, ExportPaths, NODES_CSV_HEADER, TabularExport, document_fingerprint,
    export_json, export_json_string, export_tabular, write_export_files,
};
pub use query::{filter_view, highlight_path};
pub use session::{
    AnalysisError, AnalysisReport, AnalysisSession, IngestStats, RejectionSample,
    RejectionSummary, analyze_content,
};
pub use summary::{DateSpan, DurationStats, PhoneActivity, Summary, TOP_PHONES_LIMIT, summarize};
