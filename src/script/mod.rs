//! The Python-like script format generated by the block editor.
//!
//! Source text goes through three passes: [token] splits it into tokens, [layout]
//! turns line breaks and indentation into explicit block markers and [parser] builds
//! the [Program] tree defined in [ast]. Formatted string literals are split by
//! [format] and their holes parsed as expressions.

pub mod ast;
pub mod format;
pub mod layout;
pub mod parser;
pub mod token;

pub use ast::Program;
pub use parser::{ErrorKind, ParseError};
