mod parser;
mod resolver;
mod schema;

pub use parser::{
    ParserOptions, RecordParser, RecordStream, RejectKind, RejectReason, RejectedLine,
    parse_line, parse_lines,
};
pub use resolver::EntityResolver;
pub use schema::{Column, RecordSchema, is_header_line};
