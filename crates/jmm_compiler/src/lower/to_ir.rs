//! Lower a class to IR: imports, fields, constructor, then each method body.

use super::context::LoweringContext;
use jmm_syntax::ast::{AccessModifier, MethodDecl, Program};
use jmm_syntax::ir::{
    Code, InstrKind, Invocation, IrClass, IrField, IrMethod, IrMethodHeader, IrParam, IrType,
};
use jmm_syntax::symbols::SymbolTable;
use jmm_syntax::GenerationError;

/// Lower `program` into one IR class. The first error aborts the whole unit.
pub fn lower_to_ir(program: &Program, symbols: &SymbolTable) -> Result<IrClass, GenerationError> {
    let class = &program.class;
    let constructors = class.methods.iter().filter(|m| m.is_constructor).count();
    if constructors > 1 {
        return Err(GenerationError::MultipleConstructors {
            class: class.name.clone(),
            count: constructors,
        });
    }
    log::debug!(
        "lowering class {} ({} methods, {} fields)",
        class.name,
        class.methods.len(),
        symbols.fields.len()
    );

    let mut ctx = LoweringContext::new(symbols);

    let mut fields = Vec::with_capacity(symbols.fields.len());
    for f in &symbols.fields {
        fields.push(IrField {
            name: f.name.clone(),
            ty: ctx.ir_type(&f.ty)?,
            access: AccessModifier::Default,
            is_static: false,
            is_final: false,
        });
    }

    let mut methods = Vec::with_capacity(class.methods.len() + 1);
    if constructors == 0 {
        methods.push(default_constructor(&ctx)?);
    }
    for m in &class.methods {
        methods.push(lower_method(&mut ctx, m)?);
    }

    let mut imports = symbols.imports.clone();
    for imp in &program.imports {
        let path = imp.path.join(".");
        if !imports.contains(&path) {
            imports.push(path);
        }
    }

    Ok(IrClass {
        name: class.name.clone(),
        access: AccessModifier::Public,
        super_class: class.extends.clone().or_else(|| symbols.super_class.clone()),
        imports,
        fields,
        methods,
    })
}

fn super_init(ctx: &LoweringContext<'_>) -> Code {
    Code::Instr(InstrKind::Call {
        invocation: Invocation::Special,
        target: ctx.this_operand(),
        method: Some("<init>".into()),
        args: Vec::new(),
        ret: IrType::Void,
    })
}

fn default_constructor(ctx: &LoweringContext<'_>) -> Result<IrMethod, GenerationError> {
    let header = IrMethodHeader {
        name: ctx.class_name().to_string(),
        access: AccessModifier::Public,
        is_static: false,
        is_constructor: true,
        params: Vec::new(),
        return_type: IrType::Void,
    };
    IrMethod::assemble(header, vec![super_init(ctx)])
}

fn lower_method(ctx: &mut LoweringContext<'_>, decl: &MethodDecl) -> Result<IrMethod, GenerationError> {
    let symbols = ctx.symbols;
    let sig = symbols.method(&decl.name);
    if sig.is_none() && !decl.is_constructor {
        return Err(GenerationError::UnsupportedNode {
            kind: "MethodDecl".into(),
            detail: format!("method '{}' has no symbol table entry", decl.name),
        });
    }

    let is_static = decl.is_entry();
    let return_type = match sig {
        Some(s) if !decl.is_constructor => ctx.ir_type(&s.return_type)?,
        _ => IrType::Void,
    };
    let mut params = Vec::new();
    for p in sig.map(|s| s.parameters.as_slice()).unwrap_or_default() {
        params.push(IrParam {
            name: p.name.clone(),
            ty: ctx.ir_type(&p.ty)?,
        });
    }

    ctx.enter_method(&decl.name, is_static, return_type.clone());
    let mut code = Vec::new();
    if decl.is_constructor {
        code.push(super_init(ctx));
    }
    code.extend(ctx.lower_stmts(&decl.body)?);

    let ends_in_return = matches!(
        code.last(),
        Some(Code::Instr(InstrKind::Return { .. }))
    );
    // Constructors included: an early `return` must not leave the last path open.
    if return_type == IrType::Void && !ends_in_return {
        code.push(Code::Instr(InstrKind::Return { value: None }));
    }

    let header = IrMethodHeader {
        name: decl.name.clone(),
        access: decl.access,
        is_static,
        is_constructor: decl.is_constructor,
        params,
        return_type,
    };
    let method = IrMethod::assemble(header, code)?;
    log::debug!(
        "lowered {}.{}: {} instructions",
        ctx.class_name(),
        method.name,
        method.instructions.len()
    );
    Ok(method)
}
