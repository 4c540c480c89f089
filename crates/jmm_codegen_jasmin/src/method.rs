//! Per-method emission: one dispatch per instruction kind, every load and
//! store reported to the stack tracker.

use crate::descriptor::{method_descriptor, type_descriptor, ImportMap};
use crate::stack::StackTracker;
use jmm_syntax::ast::BinOp;
use jmm_syntax::ir::{InstrKind, Invocation, IrClass, IrMethod, IrType, Operand, UnaryOp, VarTable};
use jmm_syntax::GenerationError;
use std::fmt::Write as _;

pub struct MethodEmitter<'a> {
    class: &'a IrClass,
    imports: &'a ImportMap,
    method: &'a IrMethod,
    vars: &'a VarTable,
    stack: StackTracker,
    /// Numbers the labels this emitter invents for boolean results.
    labels: u32,
    body: String,
}

impl<'a> MethodEmitter<'a> {
    pub fn new(
        class: &'a IrClass,
        imports: &'a ImportMap,
        method: &'a IrMethod,
        vars: &'a VarTable,
    ) -> Self {
        Self {
            class,
            imports,
            method,
            vars,
            stack: StackTracker::new(method.name.clone()),
            labels: 0,
            body: String::new(),
        }
    }

    /// The full `.method ... .end method` block.
    pub fn emit(mut self) -> Result<String, GenerationError> {
        let m = self.method;
        for instr in &m.instructions {
            if let Some(labels) = m.labels.get(&instr.id) {
                for l in labels {
                    let _ = writeln!(self.body, "{}:", l);
                }
            }
            self.instruction(&instr.kind)?;
        }
        if !m.has_return() || (m.return_type == IrType::Void && !m.ends_in_return()) {
            self.op("return");
        }

        let mut out = String::from(".method ");
        if let Some(kw) = m.access.keyword() {
            let _ = write!(out, "{} ", kw);
        }
        if m.is_static {
            out.push_str("static ");
        }
        let name = if m.is_constructor { "<init>" } else { m.name.as_str() };
        let ret = if m.is_constructor {
            IrType::Void
        } else {
            m.return_type.clone()
        };
        let desc = method_descriptor(m.params.iter().map(|p| &p.ty), &ret, self.imports)?;
        let _ = writeln!(out, "{}{}", name, desc);
        let _ = writeln!(out, "\t.limit stack {}", self.stack.max());
        let _ = writeln!(out, "\t.limit locals {}", self.vars.locals_limit());
        out.push_str(&self.body);
        out.push_str(".end method\n");
        log::debug!(
            "emitted {}.{}: stack {}, locals {}",
            self.class.name,
            m.name,
            self.stack.max(),
            self.vars.locals_limit()
        );
        Ok(out)
    }

    fn op(&mut self, text: &str) {
        let _ = writeln!(self.body, "\t{}", text);
    }

    fn fresh_label(&mut self, prefix: &str) -> String {
        let l = format!("{}_{}", prefix, self.labels);
        self.labels += 1;
        l
    }

    fn instruction(&mut self, kind: &InstrKind) -> Result<(), GenerationError> {
        match kind {
            InstrKind::Assign { dest, rhs, .. } => self.assign(dest, rhs),
            InstrKind::Call { .. } => {
                if self.call(kind)? {
                    self.op("pop");
                    self.stack.pop(1)?;
                }
                Ok(())
            }
            InstrKind::Return { value } => self.ret(value.as_ref()),
            InstrKind::Goto { label } => {
                self.op(&format!("goto {}", label));
                Ok(())
            }
            InstrKind::Branch { cond, label } => self.branch(cond, label),
            InstrKind::PutField {
                object,
                field,
                value,
            } => {
                self.load(object)?;
                self.load(value)?;
                let ins = format!("putfield {}", self.field_ref(field)?);
                self.op(&ins);
                self.stack.pop(2)
            }
            InstrKind::GetField { .. }
            | InstrKind::BinaryOp { .. }
            | InstrKind::UnaryOp { .. }
            | InstrKind::SingleOp(_) => {
                self.value(kind)?;
                self.op("pop");
                self.stack.pop(1)
            }
            InstrKind::NoOp => {
                self.op("nop");
                Ok(())
            }
        }
    }

    /// Evaluate `kind`, leaving exactly one value on the stack.
    fn value(&mut self, kind: &InstrKind) -> Result<(), GenerationError> {
        match kind {
            InstrKind::SingleOp(op) => self.load(op),
            InstrKind::BinaryOp { op, lhs, rhs } => self.binary(*op, lhs, rhs),
            InstrKind::UnaryOp {
                op: UnaryOp::Not,
                operand,
            } => {
                self.load(operand)?;
                self.int_const(1);
                self.op("ixor");
                self.stack.pop(1)
            }
            InstrKind::GetField { object, field } => {
                self.load(object)?;
                let ins = format!("getfield {}", self.field_ref(field)?);
                self.op(&ins);
                self.stack.pop(1)?;
                self.stack.push(1);
                Ok(())
            }
            InstrKind::Call { .. } => {
                if self.call(kind)? {
                    Ok(())
                } else {
                    Err(GenerationError::unsupported_instruction(format!(
                        "void call used as a value: {}",
                        kind
                    )))
                }
            }
            other => Err(GenerationError::unsupported_instruction(format!(
                "{} does not produce a value: {}",
                other.kind_name(),
                other
            ))),
        }
    }

    fn assign(&mut self, dest: &Operand, rhs: &InstrKind) -> Result<(), GenerationError> {
        match dest {
            Operand::ArrayElem { array, index, ty } => {
                self.load(array)?;
                self.load(index)?;
                self.value(rhs)?;
                self.op(if ty.is_reference() { "aastore" } else { "iastore" });
                self.stack.pop(3)
            }
            Operand::Var { .. } | Operand::Param { .. } => {
                self.value(rhs)?;
                self.store(dest)
            }
            other => Err(GenerationError::unsupported_instruction(format!(
                "cannot assign to {}",
                other
            ))),
        }
    }

    fn ret(&mut self, value: Option<&Operand>) -> Result<(), GenerationError> {
        match value {
            None => self.op("return"),
            Some(v) => {
                self.load(v)?;
                self.op(if v.ty().is_reference() { "areturn" } else { "ireturn" });
                self.stack.pop(1)?;
            }
        }
        Ok(())
    }

    fn branch(&mut self, cond: &InstrKind, label: &str) -> Result<(), GenerationError> {
        match cond {
            InstrKind::BinaryOp { op, lhs, rhs } if op.is_comparison() => {
                self.load(lhs)?;
                self.load(rhs)?;
                self.op(&format!("{} {}", icmp(*op), label));
                self.stack.pop(2)
            }
            InstrKind::UnaryOp {
                op: UnaryOp::Not,
                operand,
            } => {
                self.load(operand)?;
                self.op(&format!("ifeq {}", label));
                self.stack.pop(1)
            }
            other => {
                self.value(other)?;
                self.op(&format!("ifne {}", label));
                self.stack.pop(1)
            }
        }
    }

    fn binary(&mut self, op: BinOp, lhs: &Operand, rhs: &Operand) -> Result<(), GenerationError> {
        self.load(lhs)?;
        self.load(rhs)?;
        let mnemonic = match op {
            BinOp::Add => "iadd",
            BinOp::Sub => "isub",
            BinOp::Mul => "imul",
            BinOp::Div => "idiv",
            BinOp::And => "iand",
            BinOp::Or => "ior",
            cmp => {
                // true/false materialized through a jump pair
                let yes = self.fresh_label("cmp_true");
                let end = self.fresh_label("cmp_end");
                self.op(&format!("{} {}", icmp(cmp), yes));
                self.stack.pop(2)?;
                self.op("iconst_0");
                self.op(&format!("goto {}", end));
                let _ = writeln!(self.body, "{}:", yes);
                self.op("iconst_1");
                let _ = writeln!(self.body, "{}:", end);
                self.stack.push(1);
                return Ok(());
            }
        };
        self.op(mnemonic);
        self.stack.pop(2)?;
        self.stack.push(1);
        Ok(())
    }

    /// Emit a call. Returns whether a value was left on the stack.
    fn call(&mut self, kind: &InstrKind) -> Result<bool, GenerationError> {
        let InstrKind::Call {
            invocation,
            target,
            method,
            args,
            ret,
        } = kind
        else {
            return Err(GenerationError::unsupported_instruction(kind.to_string()));
        };

        match invocation {
            Invocation::New => return self.new_instance(target, args),
            Invocation::ArrayLength => {
                self.load(target)?;
                self.op("arraylength");
                self.stack.pop(1)?;
                self.stack.push(1);
                return Ok(true);
            }
            _ => {}
        }

        let name = method.as_deref().ok_or_else(|| {
            GenerationError::unsupported_instruction(format!("call without method name: {}", kind))
        })?;
        let arg_tys: Vec<IrType> = args.iter().map(Operand::ty).collect();

        let (mnemonic, owner, ret) = match invocation {
            Invocation::Static => {
                let Operand::Class { name: class } = target else {
                    return Err(GenerationError::unsupported_instruction(format!(
                        "static call on {}",
                        target
                    )));
                };
                ("invokestatic", self.imports.resolve(class), ret.clone())
            }
            Invocation::Virtual => {
                self.load(target)?;
                ("invokevirtual", self.owner_of(target)?, ret.clone())
            }
            _ => {
                self.load(target)?;
                let owner = match target {
                    Operand::This { .. } => self.super_name(),
                    other => self.owner_of(other)?,
                };
                ("invokespecial", owner, IrType::Void)
            }
        };
        for a in args {
            self.load(a)?;
        }
        let desc = method_descriptor(&arg_tys, &ret, self.imports)?;
        self.op(&format!("{} {}/{}{}", mnemonic, owner, name, desc));

        let receiver = u16::from(*invocation != Invocation::Static);
        self.stack.pop(args.len() as u16 + receiver)?;
        if ret == IrType::Void {
            Ok(false)
        } else {
            self.stack.push(1);
            Ok(true)
        }
    }

    fn new_instance(&mut self, target: &Operand, args: &[Operand]) -> Result<bool, GenerationError> {
        match target {
            Operand::Class { name } if name == "array" => {
                let size = args.first().ok_or_else(|| {
                    GenerationError::unsupported_instruction("new array without a size")
                })?;
                self.load(size)?;
                self.op("newarray int");
                self.stack.pop(1)?;
                self.stack.push(1);
                Ok(true)
            }
            Operand::Class { name } => {
                let ins = format!("new {}", self.imports.resolve(name));
                self.op(&ins);
                self.stack.push(1);
                Ok(true)
            }
            other => Err(GenerationError::unsupported_instruction(format!(
                "cannot instantiate {}",
                other
            ))),
        }
    }

    fn owner_of(&self, op: &Operand) -> Result<String, GenerationError> {
        match op.ty() {
            IrType::This(_) => Ok(self.class.name.clone()),
            IrType::Object(name) | IrType::Class(name) => Ok(self.imports.resolve(&name)),
            other => Err(GenerationError::unsupported_instruction(format!(
                "method call on value of type {}",
                other
            ))),
        }
    }

    fn super_name(&self) -> String {
        match &self.class.super_class {
            Some(s) => self.imports.resolve(s),
            None => crate::OBJECT.to_string(),
        }
    }

    fn field_ref(&self, field: &Operand) -> Result<String, GenerationError> {
        let Operand::Var { name, ty } = field else {
            return Err(GenerationError::unsupported_instruction(format!(
                "field operand {}",
                field
            )));
        };
        Ok(format!(
            "{}/{} {}",
            self.class.name,
            name,
            type_descriptor(ty, self.imports)?
        ))
    }

    fn slot(&self, op: &Operand) -> Result<u16, GenerationError> {
        let name = op.var_name().unwrap_or_default();
        self.vars.get(name).map(|d| d.slot).ok_or_else(|| {
            GenerationError::unsupported_instruction(format!(
                "no slot for '{}' in {}",
                name, self.method.name
            ))
        })
    }

    fn int_const(&mut self, value: i32) {
        let ins = match value {
            -1 => "iconst_m1".to_string(),
            0..=5 => format!("iconst_{}", value),
            -128..=127 => format!("bipush {}", value),
            -32768..=32767 => format!("sipush {}", value),
            _ => format!("ldc {}", value),
        };
        self.op(&ins);
        self.stack.push(1);
    }

    fn load(&mut self, op: &Operand) -> Result<(), GenerationError> {
        match op {
            Operand::Literal { value, .. } => {
                self.int_const(*value);
                Ok(())
            }
            Operand::This { .. } => {
                self.op("aload_0");
                self.stack.push(1);
                Ok(())
            }
            Operand::Var { ty, .. } | Operand::Param { ty, .. } => {
                let slot = self.slot(op)?;
                let prefix = if ty.is_reference() { "a" } else { "i" };
                self.op(&slot_op(prefix, "load", slot));
                self.stack.push(1);
                Ok(())
            }
            Operand::ArrayElem { array, index, ty } => {
                self.load(array)?;
                self.load(index)?;
                self.op(if ty.is_reference() { "aaload" } else { "iaload" });
                self.stack.pop(2)?;
                self.stack.push(1);
                Ok(())
            }
            Operand::Class { .. } => Err(GenerationError::unsupported_instruction(format!(
                "class name {} is not a value",
                op
            ))),
        }
    }

    fn store(&mut self, op: &Operand) -> Result<(), GenerationError> {
        let slot = self.slot(op)?;
        let prefix = if op.ty().is_reference() { "a" } else { "i" };
        self.op(&slot_op(prefix, "store", slot));
        self.stack.pop(1)
    }
}

/// `iload_2`, `astore 7`, ...
fn slot_op(prefix: &str, action: &str, slot: u16) -> String {
    if slot <= 3 {
        format!("{}{}_{}", prefix, action, slot)
    } else {
        format!("{}{} {}", prefix, action, slot)
    }
}

fn icmp(op: BinOp) -> &'static str {
    match op {
        BinOp::Lt => "if_icmplt",
        BinOp::Gt => "if_icmpgt",
        BinOp::Le => "if_icmple",
        BinOp::Ge => "if_icmpge",
        BinOp::Eq => "if_icmpeq",
        _ => "if_icmpne",
    }
}
