//! Blocklist text format detection and parsing.

mod list;

pub use list::{detect_format, parse, parse_auto, ListFormat};
