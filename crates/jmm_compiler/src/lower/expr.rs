//! Expression lowering. Subexpressions are lowered depth-first, left to right,
//! and their prefixes spliced in evaluation order.

use super::context::{LoweredExpr, LoweringContext};
use jmm_syntax::ast::{BinOp, Expr};
use jmm_syntax::ir::{Code, InstrKind, Invocation, IrType, Operand, UnaryOp};
use jmm_syntax::GenerationError;

/// Where a call's value goes; decides the call's result type when the
/// callee's declaration is not visible.
#[derive(Clone, Copy, Debug)]
pub enum CallUse<'t> {
    /// Bare expression statement: result discarded.
    Statement,
    /// Assigned straight into a variable of this type.
    AssignedTo(&'t IrType),
    /// Used as a value; the surrounding expression may expect a type.
    Value(Option<&'t IrType>),
}

impl<'a> LoweringContext<'a> {
    /// Lower `expr`. `hint` is the type the surrounding construct expects and is
    /// only consulted for calls whose return type is not declared in this class.
    pub fn lower_expr(
        &mut self,
        expr: &Expr,
        hint: Option<&IrType>,
    ) -> Result<LoweredExpr, GenerationError> {
        match expr {
            Expr::IntLiteral { value, .. } => Ok(LoweredExpr::value(Operand::int(*value))),
            Expr::BoolLiteral { value, .. } => Ok(LoweredExpr::value(Operand::boolean(*value))),
            Expr::Paren { expr, .. } => self.lower_expr(expr, hint),
            Expr::This { .. } => Ok(LoweredExpr::value(self.this_operand())),
            Expr::Ident { name, .. } => self.lower_ident(name),
            Expr::Not { expr, .. } => self.lower_not(expr),
            Expr::Binary { op, lhs, rhs, .. } => {
                if op.is_logical() {
                    self.lower_short_circuit(*op, lhs, rhs)
                } else {
                    self.lower_binary(*op, lhs, rhs)
                }
            }
            Expr::Index { array, index, .. } => self.lower_index(array, index),
            Expr::Length { array, .. } => self.lower_length(array),
            Expr::Call {
                receiver,
                method,
                args,
                ..
            } => {
                let (prefix, call) =
                    self.lower_call(receiver, method, args, CallUse::Value(hint))?;
                let ret = call.result_type();
                if ret == IrType::Void {
                    return Err(GenerationError::UnsupportedNode {
                        kind: expr.kind_name().into(),
                        detail: format!("void call to '{}' used as a value", method),
                    });
                }
                let dest = self.fresh_temp(ret);
                Ok(LoweredExpr::computed(prefix, dest, call))
            }
            Expr::NewIntArray { size, .. } => {
                let size = self.lower_expr(size, Some(&IrType::Int32))?;
                let dest = self.fresh_temp(IrType::int_array());
                let rhs = InstrKind::Call {
                    invocation: Invocation::New,
                    target: Operand::Class {
                        name: "array".into(),
                    },
                    method: None,
                    args: vec![size.result],
                    ret: IrType::int_array(),
                };
                Ok(LoweredExpr::computed(size.prefix, dest, rhs))
            }
            Expr::NewObject { class, .. } => {
                let ty = self.object_type(class)?;
                let dest = self.fresh_temp(ty);
                let prefix = self.construct_into(&dest, class);
                Ok(LoweredExpr {
                    result: dest,
                    prefix,
                    fresh: false,
                })
            }
        }
    }

    /// Locals and parameters need no code; a field is read into a temporary.
    pub(crate) fn lower_ident(&mut self, name: &str) -> Result<LoweredExpr, GenerationError> {
        if let Some(op) = self.slot_operand(name)? {
            return Ok(LoweredExpr::value(op));
        }
        if let Some(field) = self.field_operand(name)? {
            let dest = self.fresh_temp(field.ty());
            let rhs = InstrKind::GetField {
                object: self.this_operand(),
                field,
            };
            return Ok(LoweredExpr::computed(Vec::new(), dest, rhs));
        }
        if self.symbols.is_known_class(name) {
            return Ok(LoweredExpr::value(Operand::Class {
                name: name.to_string(),
            }));
        }
        Err(self.unresolved(name))
    }

    fn lower_not(&mut self, inner: &Expr) -> Result<LoweredExpr, GenerationError> {
        let inner = self.lower_expr(inner, Some(&IrType::Boolean))?;
        let dest = self.fresh_temp(IrType::Boolean);
        let rhs = InstrKind::UnaryOp {
            op: UnaryOp::Not,
            operand: inner.result,
        };
        Ok(LoweredExpr::computed(inner.prefix, dest, rhs))
    }

    fn lower_binary(
        &mut self,
        op: BinOp,
        lhs: &Expr,
        rhs: &Expr,
    ) -> Result<LoweredExpr, GenerationError> {
        let operand_hint = IrType::Int32;
        let l = self.lower_expr(lhs, Some(&operand_hint))?;
        let r = self.lower_expr(rhs, Some(&operand_hint))?;
        let mut prefix = l.prefix;
        prefix.extend(r.prefix);
        let result_ty = if op.is_arithmetic() {
            IrType::Int32
        } else {
            IrType::Boolean
        };
        let dest = self.fresh_temp(result_ty);
        let rhs = InstrKind::BinaryOp {
            op,
            lhs: l.result,
            rhs: r.result,
        };
        Ok(LoweredExpr::computed(prefix, dest, rhs))
    }

    /// `a && b` / `a || b`: the right operand is skipped once the left one
    /// decides the result.
    fn lower_short_circuit(
        &mut self,
        op: BinOp,
        lhs: &Expr,
        rhs: &Expr,
    ) -> Result<LoweredExpr, GenerationError> {
        let n = self.fresh_label();
        let end = match op {
            BinOp::And => format!("and_end_{}", n),
            _ => format!("or_end_{}", n),
        };
        let l = self.lower_expr(lhs, Some(&IrType::Boolean))?;
        let dest = self.fresh_temp(IrType::Boolean);

        let mut prefix = l.prefix;
        prefix.push(Code::Instr(assign(&dest, InstrKind::SingleOp(l.result))));
        let skip_when = if op == BinOp::And {
            InstrKind::UnaryOp {
                op: UnaryOp::Not,
                operand: dest.clone(),
            }
        } else {
            InstrKind::SingleOp(dest.clone())
        };
        prefix.push(Code::Instr(InstrKind::Branch {
            cond: Box::new(skip_when),
            label: end.clone(),
        }));

        let r = self.lower_expr(rhs, Some(&IrType::Boolean))?;
        prefix.extend(r.prefix);
        prefix.push(Code::Instr(assign(&dest, InstrKind::SingleOp(r.result))));
        prefix.push(Code::Label(end));
        Ok(LoweredExpr {
            result: dest,
            prefix,
            fresh: false,
        })
    }

    fn lower_index(&mut self, array: &Expr, index: &Expr) -> Result<LoweredExpr, GenerationError> {
        let arr = self.lower_expr(array, Some(&IrType::int_array()))?;
        let arr_op = require_slot(arr.result, "Index")?;
        let elem_ty = element_type(&arr_op)?;
        let idx = self.lower_index_operand(index)?;
        let mut prefix = arr.prefix;
        prefix.extend(idx.prefix);
        let dest = self.fresh_temp(elem_ty.clone());
        let rhs = InstrKind::SingleOp(Operand::ArrayElem {
            array: Box::new(arr_op),
            index: Box::new(idx.result),
            ty: elem_ty,
        });
        Ok(LoweredExpr::computed(prefix, dest, rhs))
    }

    /// Index operand of an array access; a literal index is first copied into a
    /// temporary so element operands always index through a variable.
    pub(crate) fn lower_index_operand(&mut self, index: &Expr) -> Result<LoweredExpr, GenerationError> {
        let idx = self.lower_expr(index, Some(&IrType::Int32))?;
        if !idx.result.is_literal() {
            return Ok(idx);
        }
        let dest = self.fresh_temp(IrType::Int32);
        Ok(LoweredExpr::computed(
            idx.prefix,
            dest,
            InstrKind::SingleOp(idx.result),
        ))
    }

    fn lower_length(&mut self, array: &Expr) -> Result<LoweredExpr, GenerationError> {
        let arr = self.lower_expr(array, Some(&IrType::int_array()))?;
        let dest = self.fresh_temp(IrType::Int32);
        let rhs = InstrKind::Call {
            invocation: Invocation::ArrayLength,
            target: arr.result,
            method: None,
            args: Vec::new(),
            ret: IrType::Int32,
        };
        Ok(LoweredExpr::computed(arr.prefix, dest, rhs))
    }

    /// Lower a call to its prefix and the call instruction itself. Calls on an
    /// imported name or this class's name are static; calls on anything else
    /// are virtual on the receiver's type.
    pub(crate) fn lower_call(
        &mut self,
        receiver: &Expr,
        method: &str,
        args: &[Expr],
        usage: CallUse<'_>,
    ) -> Result<(Vec<Code>, InstrKind), GenerationError> {
        let (mut prefix, invocation, target) = match receiver.unparen() {
            Expr::This { .. } => (Vec::new(), Invocation::Virtual, self.this_operand()),
            Expr::Ident { name, .. }
                if self.symbols.resolve(self.method(), name).is_none()
                    && self.symbols.is_known_class(name) =>
            {
                (
                    Vec::new(),
                    Invocation::Static,
                    Operand::Class { name: name.clone() },
                )
            }
            other => {
                let recv = self.lower_expr(other, None)?;
                if matches!(recv.result, Operand::Literal { .. } | Operand::ArrayElem { .. }) {
                    return Err(GenerationError::UnsupportedNode {
                        kind: other.kind_name().into(),
                        detail: format!("cannot call '{}' on {}", method, recv.result),
                    });
                }
                (recv.prefix, Invocation::Virtual, recv.result)
            }
        };

        // Declarations are only visible for this class's own methods.
        let own_class = match &target {
            Operand::This { .. } => true,
            Operand::Class { name } => *name == self.symbols.class_name,
            other => other.ty() == IrType::Object(self.symbols.class_name.clone()),
        };
        let declared = if own_class {
            self.symbols.method(method).cloned()
        } else {
            None
        };

        let mut arg_ops = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            let param_ty = match declared.as_ref().and_then(|d| d.parameters.get(i)) {
                Some(p) => Some(self.ir_type(&p.ty)?),
                None => None,
            };
            let lowered = self.lower_expr(arg, param_ty.as_ref())?;
            prefix.extend(lowered.prefix);
            arg_ops.push(lowered.result);
        }

        let declared_ret = match &declared {
            Some(d) => Some(self.ir_type(&d.return_type)?),
            None => None,
        };
        let ret = match usage {
            CallUse::AssignedTo(ty) => ty.clone(),
            CallUse::Statement => declared_ret.unwrap_or(IrType::Void),
            CallUse::Value(hint) => declared_ret
                .or_else(|| hint.cloned())
                .unwrap_or(IrType::Int32),
        };

        let call = InstrKind::Call {
            invocation,
            target,
            method: Some(method.to_string()),
            args: arg_ops,
            ret,
        };
        Ok((prefix, call))
    }

    /// `dest := new(C).C` followed by the constructor call on `dest`.
    pub(crate) fn construct_into(&mut self, dest: &Operand, class: &str) -> Vec<Code> {
        let ty = dest.ty();
        vec![
            Code::Instr(assign(
                dest,
                InstrKind::Call {
                    invocation: Invocation::New,
                    target: Operand::Class {
                        name: class.to_string(),
                    },
                    method: None,
                    args: Vec::new(),
                    ret: ty,
                },
            )),
            Code::Instr(InstrKind::Call {
                invocation: Invocation::Special,
                target: dest.clone(),
                method: Some("<init>".into()),
                args: Vec::new(),
                ret: IrType::Void,
            }),
        ]
    }

    pub(crate) fn object_type(&self, class: &str) -> Result<IrType, GenerationError> {
        if self.symbols.is_known_class(class) {
            Ok(IrType::Object(class.to_string()))
        } else {
            Err(GenerationError::unmapped(class))
        }
    }

    /// Lower a branch condition to its prefix and the instruction the branch
    /// tests. A comparison or negation bound to a fresh temporary is tested
    /// directly instead of through the temporary.
    pub(crate) fn lower_condition(
        &mut self,
        cond: &Expr,
    ) -> Result<(Vec<Code>, InstrKind), GenerationError> {
        let mut lowered = self.lower_expr(cond, Some(&IrType::Boolean))?;
        if let Some(binding) = lowered.take_binding() {
            match binding {
                InstrKind::Assign { rhs, .. }
                    if matches!(
                        rhs.as_ref(),
                        InstrKind::BinaryOp { op, .. } if op.is_comparison()
                    ) || matches!(rhs.as_ref(), InstrKind::UnaryOp { .. }) =>
                {
                    return Ok((lowered.prefix, *rhs));
                }
                other => lowered.prefix.push(Code::Instr(other)),
            }
        }
        Ok((lowered.prefix, InstrKind::SingleOp(lowered.result)))
    }
}

pub(crate) fn assign(dest: &Operand, rhs: InstrKind) -> InstrKind {
    InstrKind::Assign {
        dest: dest.clone(),
        ty: dest.ty(),
        rhs: Box::new(rhs),
    }
}

/// Array operands must live in a slot.
pub(crate) fn require_slot(op: Operand, kind: &str) -> Result<Operand, GenerationError> {
    match op {
        Operand::Var { .. } | Operand::Param { .. } => Ok(op),
        other => Err(GenerationError::UnsupportedNode {
            kind: kind.into(),
            detail: format!("array operand {} is not a variable", other),
        }),
    }
}

pub(crate) fn element_type(array: &Operand) -> Result<IrType, GenerationError> {
    match array.ty() {
        IrType::Array(elem) => Ok(*elem),
        other => Err(GenerationError::UnsupportedNode {
            kind: "Index".into(),
            detail: format!("indexing non-array value of type {}", other),
        }),
    }
}
