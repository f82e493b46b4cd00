//! XML source loading: document tree, schema mapping, and the directory loader.

pub mod loader;
pub mod schema;
pub mod tree;

pub use loader::{LoadFailure, LoadReport, XmlLoader};
pub use schema::{map_document, parse_bool, parse_number};
pub use tree::{XmlElement, parse_document};
