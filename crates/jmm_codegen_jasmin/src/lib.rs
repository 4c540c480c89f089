//! Jasmin emission for one lowered class: header, fields, constructor, methods.

mod descriptor;
mod method;
mod stack;

pub use descriptor::{method_descriptor, type_descriptor, ImportMap};
pub use method::MethodEmitter;
pub use stack::StackTracker;

use jmm_syntax::ir::{IrClass, IrField, VarTable};
use jmm_syntax::GenerationError;
use std::fmt::Write as _;

/// Superclass of classes that extend nothing.
pub const OBJECT: &str = "java/lang/Object";

/// Emit `class`. `tables[i]` holds the slots of `class.methods[i]`.
pub fn emit_class(class: &IrClass, tables: &[VarTable]) -> Result<String, GenerationError> {
    class.check_constructors()?;
    if tables.len() != class.methods.len() {
        return Err(GenerationError::unsupported_instruction(format!(
            "{} methods but {} slot tables",
            class.methods.len(),
            tables.len()
        )));
    }
    let imports = ImportMap::new(&class.imports);
    let super_name = class
        .super_class
        .as_deref()
        .map(|s| imports.resolve(s))
        .unwrap_or_else(|| OBJECT.to_string());

    let mut out = String::new();
    let access = class.access.keyword().unwrap_or("public");
    let _ = writeln!(out, ".class {} {}", access, class.name);
    let _ = writeln!(out, ".super {}", super_name);
    out.push('\n');

    for f in &class.fields {
        emit_field(&mut out, f, &imports)?;
    }
    if !class.fields.is_empty() {
        out.push('\n');
    }

    if class.constructor_count() == 0 {
        emit_default_constructor(&mut out, &super_name);
        out.push('\n');
    }
    for (m, vars) in class.methods.iter().zip(tables) {
        out.push_str(&MethodEmitter::new(class, &imports, m, vars).emit()?);
        out.push('\n');
    }
    log::debug!("emitted class {} ({} methods)", class.name, class.methods.len());
    Ok(out)
}

/// Emit `class` with every variable in its own slot.
pub fn emit_class_unallocated(class: &IrClass) -> Result<String, GenerationError> {
    let tables: Vec<VarTable> = class.methods.iter().map(VarTable::one_slot_per_var).collect();
    emit_class(class, &tables)
}

fn emit_field(out: &mut String, f: &IrField, imports: &ImportMap) -> Result<(), GenerationError> {
    out.push_str(".field ");
    if let Some(kw) = f.access.keyword() {
        let _ = write!(out, "{} ", kw);
    }
    if f.is_static {
        out.push_str("static ");
    }
    if f.is_final {
        out.push_str("final ");
    }
    let _ = writeln!(out, "{} {}", f.name, type_descriptor(&f.ty, imports)?);
    Ok(())
}

fn emit_default_constructor(out: &mut String, super_name: &str) {
    out.push_str(".method public <init>()V\n");
    out.push_str("\taload_0\n");
    let _ = writeln!(out, "\tinvokespecial {}/<init>()V", super_name);
    out.push_str("\treturn\n");
    out.push_str(".end method\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use jmm_syntax::ast::{AccessModifier, BinOp};
    use jmm_syntax::ir::{
        Code, InstrKind, Invocation, IrMethod, IrMethodHeader, IrParam, IrType, Operand,
    };

    fn class(methods: Vec<IrMethod>) -> IrClass {
        IrClass {
            name: "Foo".into(),
            access: AccessModifier::Default,
            super_class: None,
            imports: vec!["io".into()],
            fields: vec![IrField {
                name: "x".into(),
                ty: IrType::Int32,
                access: AccessModifier::Default,
                is_static: false,
                is_final: false,
            }],
            methods,
        }
    }

    fn header(name: &str, params: Vec<IrParam>, ret: IrType) -> IrMethodHeader {
        IrMethodHeader {
            name: name.into(),
            access: AccessModifier::Public,
            is_static: false,
            is_constructor: false,
            params,
            return_type: ret,
        }
    }

    fn this() -> Operand {
        Operand::This {
            class: "Foo".into(),
        }
    }

    fn x_field() -> Operand {
        Operand::var("x", IrType::Int32)
    }

    fn y() -> Operand {
        Operand::Param {
            index: 1,
            name: "y".into(),
            ty: IrType::Int32,
        }
    }

    fn t(n: &str) -> Operand {
        Operand::var(n, IrType::Int32)
    }

    fn assign(dest: Operand, rhs: InstrKind) -> Code {
        Code::Instr(InstrKind::Assign {
            ty: dest.ty(),
            dest,
            rhs: Box::new(rhs),
        })
    }

    /// `int bar(int y) { return x + y; }`
    fn bar() -> IrMethod {
        let code = vec![
            assign(
                t("t1"),
                InstrKind::GetField {
                    object: this(),
                    field: x_field(),
                },
            ),
            assign(
                t("t2"),
                InstrKind::BinaryOp {
                    op: BinOp::Add,
                    lhs: t("t1"),
                    rhs: y(),
                },
            ),
            Code::Instr(InstrKind::Return {
                value: Some(t("t2")),
            }),
        ];
        let params = vec![IrParam {
            name: "y".into(),
            ty: IrType::Int32,
        }];
        IrMethod::assemble(header("bar", params, IrType::Int32), code).unwrap()
    }

    #[test]
    fn field_read_add_and_typed_return() {
        let text = emit_class_unallocated(&class(vec![bar()])).unwrap();
        let expected = "\
.method public bar(I)I
\t.limit stack 2
\t.limit locals 4
\taload_0
\tgetfield Foo/x I
\tistore_2
\tiload_2
\tiload_1
\tiadd
\tistore_3
\tiload_3
\tireturn
.end method
";
        assert!(text.contains(expected), "{}", text);
        assert!(text.starts_with(".class public Foo\n.super java/lang/Object\n\n.field x I\n"));
    }

    #[test]
    fn default_constructor_only_when_none_declared() {
        let text = emit_class_unallocated(&class(vec![bar()])).unwrap();
        assert!(text.contains(
            ".method public <init>()V\n\taload_0\n\tinvokespecial java/lang/Object/<init>()V\n\treturn\n.end method\n"
        ));

        let mut ctor_header = header("Foo", Vec::new(), IrType::Void);
        ctor_header.is_constructor = true;
        let ctor = IrMethod::assemble(
            ctor_header,
            vec![Code::Instr(InstrKind::Call {
                invocation: Invocation::Special,
                target: this(),
                method: Some("<init>".into()),
                args: Vec::new(),
                ret: IrType::Void,
            })],
        )
        .unwrap();
        let mut c = class(vec![ctor.clone()]);
        c.super_class = Some("Base".into());
        let text = emit_class_unallocated(&c).unwrap();
        assert_eq!(text.matches("<init>()V\n").count(), 2);
        assert!(text.contains("\tinvokespecial Base/<init>()V\n\treturn\n"));

        let two = class(vec![ctor.clone(), ctor]);
        assert!(matches!(
            emit_class_unallocated(&two),
            Err(GenerationError::MultipleConstructors { count: 2, .. })
        ));
    }

    #[test]
    fn void_method_returns_once() {
        let m = IrMethod::assemble(
            header("f", Vec::new(), IrType::Void),
            vec![Code::Instr(InstrKind::Return { value: None })],
        )
        .unwrap();
        let text = emit_class_unallocated(&class(vec![m])).unwrap();
        assert!(!text.contains("return\n\treturn"));

        let bare = IrMethod::assemble(header("g", Vec::new(), IrType::Void), Vec::new()).unwrap();
        let text = emit_class_unallocated(&class(vec![bare])).unwrap();
        assert!(text.contains(".method public g()V\n\t.limit stack 0\n\t.limit locals 1\n\treturn\n.end method"));
    }

    #[test]
    fn early_return_keeps_trailing_return() {
        let mut ctor_header = header("Foo", Vec::new(), IrType::Void);
        ctor_header.is_constructor = true;
        let code = vec![
            Code::Instr(InstrKind::Branch {
                cond: Box::new(InstrKind::SingleOp(Operand::boolean(true))),
                label: "then_0".into(),
            }),
            Code::Instr(InstrKind::Goto {
                label: "endif_0".into(),
            }),
            Code::Label("then_0".into()),
            Code::Instr(InstrKind::Return { value: None }),
            Code::Label("endif_0".into()),
        ];
        let ctor = IrMethod::assemble(ctor_header, code).unwrap();
        let text = emit_class_unallocated(&class(vec![ctor])).unwrap();
        assert!(
            text.contains("then_0:\n\treturn\nendif_0:\n\tnop\n\treturn\n.end method"),
            "{}",
            text
        );
    }

    #[test]
    fn static_call_and_branch_on_comparison() {
        let code = vec![
            Code::Instr(InstrKind::Branch {
                cond: Box::new(InstrKind::BinaryOp {
                    op: BinOp::Lt,
                    lhs: y(),
                    rhs: Operand::int(100),
                }),
                label: "then_0".into(),
            }),
            Code::Instr(InstrKind::Goto {
                label: "endif_0".into(),
            }),
            Code::Label("then_0".into()),
            Code::Instr(InstrKind::Call {
                invocation: Invocation::Static,
                target: Operand::Class { name: "io".into() },
                method: Some("println".into()),
                args: vec![y()],
                ret: IrType::Void,
            }),
            Code::Label("endif_0".into()),
        ];
        let params = vec![IrParam {
            name: "y".into(),
            ty: IrType::Int32,
        }];
        let m = IrMethod::assemble(header("f", params, IrType::Void), code).unwrap();
        let text = emit_class_unallocated(&class(vec![m])).unwrap();
        assert!(text.contains("\tiload_1\n\tbipush 100\n\tif_icmplt then_0\n\tgoto endif_0\nthen_0:\n\tiload_1\n\tinvokestatic io/println(I)V\nendif_0:\n\tnop\n\treturn\n"), "{}", text);
    }

    #[test]
    fn comparison_value_and_array_store() {
        let arr = Operand::var("a", IrType::int_array());
        let code = vec![
            assign(
                Operand::var("b", IrType::Boolean),
                InstrKind::BinaryOp {
                    op: BinOp::Lt,
                    lhs: y(),
                    rhs: Operand::int(2),
                },
            ),
            assign(
                arr.clone(),
                InstrKind::Call {
                    invocation: Invocation::New,
                    target: Operand::Class {
                        name: "array".into(),
                    },
                    method: None,
                    args: vec![y()],
                    ret: IrType::int_array(),
                },
            ),
            assign(
                Operand::ArrayElem {
                    array: Box::new(arr),
                    index: Box::new(y()),
                    ty: IrType::Int32,
                },
                InstrKind::SingleOp(Operand::int(-1)),
            ),
        ];
        let params = vec![IrParam {
            name: "y".into(),
            ty: IrType::Int32,
        }];
        let m = IrMethod::assemble(header("f", params, IrType::Void), code).unwrap();
        let text = emit_class_unallocated(&class(vec![m])).unwrap();
        assert!(text.contains(
            "\tif_icmplt cmp_true_0\n\ticonst_0\n\tgoto cmp_end_1\ncmp_true_0:\n\ticonst_1\ncmp_end_1:\n\tistore_2\n"
        ));
        assert!(text.contains("\tnewarray int\n\tastore_3\n\taload_3\n\tiload_1\n\ticonst_m1\n\tiastore\n"));
        assert!(text.contains("\t.limit stack 3\n"));
    }

    #[test]
    fn unknown_variable_aborts() {
        let m = IrMethod::assemble(
            header("f", Vec::new(), IrType::Int32),
            vec![Code::Instr(InstrKind::Return {
                value: Some(t("ghost")),
            })],
        )
        .unwrap();
        let err = emit_class(&class(vec![m]), &[VarTable::new()]).unwrap_err();
        assert!(matches!(err, GenerationError::UnsupportedInstruction { .. }));
    }
}
