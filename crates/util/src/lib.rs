//! Helpers shared by the engine and the binary: JSONPath selection, value
//! rendering, path expansion and log-safe text handling.

pub mod json_path;
pub mod path_processing;
pub mod text_processing;
pub mod values;

pub use json_path::{JsonPathError, select_all, select_first};
pub use path_processing::expand_home;
pub use text_processing::{redact_header_value, redact_sensitive, truncate_for_summary};
pub use values::{canonical_json, stringify_value};
