//! What the front end hands to the back end: tree, symbol table, reports.

use crate::ast::Program;
use crate::report::Report;
use crate::symbols::SymbolTable;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilationUnit {
    pub program: Program,
    pub symbol_table: SymbolTable,
    #[serde(default)]
    pub reports: Vec<Report>,
}

impl CompilationUnit {
    pub fn new(program: Program, symbol_table: SymbolTable) -> Self {
        Self {
            program,
            symbol_table,
            reports: Vec::new(),
        }
    }

    pub fn error_count(&self) -> usize {
        self.reports.iter().filter(|r| r.is_error()).count()
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}
