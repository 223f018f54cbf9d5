//! Request header section handling: delimiting and parsing.

mod head_parser;
mod header_reader;

pub use head_parser::parse_head;
pub use header_reader::{HeaderParts, HeaderReader};
