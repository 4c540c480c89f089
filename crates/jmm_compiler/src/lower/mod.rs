//! Lower the syntax tree to IR. Consumes the tree plus its symbol table,
//! produces one `IrClass` per unit.

mod context;
mod expr;
mod stmt;
mod to_ir;

pub use context::{LoweredExpr, LoweringContext};
pub use expr::CallUse;
pub use to_ir::lower_to_ir;
