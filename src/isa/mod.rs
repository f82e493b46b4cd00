//! Instruction description model, validation, and table generation.
//!
//! Sources are mapped into [`Root`](ast/struct.Root.html)s by the XML loader, validated, and
//! consolidated by the [`TableGenerator`] into a [`TableList`] that can decode and encode
//! instructions and be emitted as JSON or a C++ header.

pub mod ast;
pub mod bitfield;
pub mod builder;
pub mod diagnostic;
pub mod error;
pub mod handle;
pub mod table;
pub mod validator;

pub use builder::RootBuilder;
pub use error::InstError;
pub use handle::TableHandle;
pub use table::{TableGenerator, TableList};
