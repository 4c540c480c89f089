//! Java-- syntax: tree, symbol table, spans, reports, IR, and shared errors.

pub mod ast;
pub mod error;
pub mod ir;
pub mod report;
pub mod span;
pub mod symbols;
pub mod unit;

pub use ast::*;
pub use error::*;
pub use ir::*;
pub use report::*;
pub use span::*;
pub use symbols::*;
pub use unit::*;
