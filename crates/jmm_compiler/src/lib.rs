//! J-- compiler back end: lowering to IR, liveness, slot allocation, and the
//! per-unit pipeline that ends in Jasmin assembly.

pub mod liveness;
pub mod lower;
pub mod ollir;
pub mod regalloc;

pub use jmm_config::CompilerOptions;
pub use lower::lower_to_ir;

use jmm_syntax::ir::{IrClass, VarTable};
use jmm_syntax::{CompilationUnit, GenerationError};

/// Both text artifacts of one compilation unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifacts {
    pub class_name: String,
    pub ollir: String,
    pub jasmin: String,
}

/// Lower a unit to IR. Units carrying error reports are refused outright.
pub fn lower_unit(unit: &CompilationUnit) -> Result<IrClass, GenerationError> {
    let errors = unit.error_count();
    if errors > 0 {
        return Err(GenerationError::RejectedUnit { errors });
    }
    let class = lower_to_ir(&unit.program, &unit.symbol_table)?;
    class.check_constructors()?;
    Ok(class)
}

/// One slot table per method, index-matched to `class.methods`.
pub fn var_tables(
    class: &IrClass,
    options: &CompilerOptions,
) -> Result<Vec<VarTable>, GenerationError> {
    class
        .methods
        .iter()
        .map(|m| regalloc::var_table(m, options.register_allocation))
        .collect()
}

/// Lower, allocate and emit. Nothing is returned unless every stage succeeds.
pub fn compile_unit(
    unit: &CompilationUnit,
    options: &CompilerOptions,
) -> Result<Artifacts, GenerationError> {
    log::debug!("compiling unit {}", unit.symbol_table.class_name);
    let class = lower_unit(unit)?;
    let ollir = ollir::print_class(&class);
    let tables = var_tables(&class, options)?;
    let jasmin = jmm_codegen_jasmin::emit_class(&class, &tables)?;
    log::debug!(
        "compiled {}: {} methods, {} bytes of assembly",
        class.name,
        class.methods.len(),
        jasmin.len()
    );
    Ok(Artifacts {
        class_name: class.name,
        ollir,
        jasmin,
    })
}

/// Per-method liveness sets of a unit, rendered as text.
pub fn liveness_report(unit: &CompilationUnit) -> Result<String, GenerationError> {
    let class = lower_unit(unit)?;
    let mut out = String::new();
    for m in &class.methods {
        let lv = liveness::analyze(m);
        out.push_str(&lv.render(m));
    }
    Ok(out)
}
