//! Statement lowering: assignments, array stores, returns, and control flow.

use super::context::{LoweredExpr, LoweringContext};
use super::expr::{assign, element_type, require_slot, CallUse};
use jmm_syntax::ast::{Expr, Stmt};
use jmm_syntax::ir::{Code, InstrKind, Operand};
use jmm_syntax::GenerationError;

impl<'a> LoweringContext<'a> {
    pub fn lower_stmts(&mut self, stmts: &[Stmt]) -> Result<Vec<Code>, GenerationError> {
        let mut code = Vec::new();
        for s in stmts {
            code.extend(self.lower_stmt(s)?);
        }
        Ok(code)
    }

    pub fn lower_stmt(&mut self, stmt: &Stmt) -> Result<Vec<Code>, GenerationError> {
        match stmt {
            Stmt::Block { stmts, .. } => self.lower_stmts(stmts),
            Stmt::Expr { expr, .. } => self.lower_expr_stmt(expr),
            Stmt::Assign { target, value, .. } => self.lower_assign(target, value),
            Stmt::ArrayAssign {
                target,
                index,
                value,
                ..
            } => self.lower_array_assign(target, index, value),
            Stmt::Return { value, .. } => self.lower_return(value.as_ref()),
            Stmt::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => self.lower_if(cond, then_branch, else_branch.as_deref()),
            Stmt::While { cond, body, .. } => self.lower_while(cond, body),
        }
    }

    fn lower_expr_stmt(&mut self, expr: &Expr) -> Result<Vec<Code>, GenerationError> {
        match expr.unparen() {
            Expr::Call {
                receiver,
                method,
                args,
                ..
            } => {
                let (mut code, call) = self.lower_call(receiver, method, args, CallUse::Statement)?;
                code.push(Code::Instr(call));
                Ok(code)
            }
            other => Ok(self.lower_expr(other, None)?.prefix),
        }
    }

    fn lower_assign(&mut self, target: &str, value: &Expr) -> Result<Vec<Code>, GenerationError> {
        if let Some(dest) = self.slot_operand(target)? {
            return self.lower_assign_to_slot(dest, value);
        }
        if let Some(field) = self.field_operand(target)? {
            let ty = field.ty();
            let v = self.lower_expr(value, Some(&ty))?;
            let mut code = v.prefix;
            code.push(Code::Instr(InstrKind::PutField {
                object: self.this_operand(),
                field,
                value: v.result,
            }));
            return Ok(code);
        }
        Err(self.unresolved(target))
    }

    /// The instruction producing the value writes `dest` directly whenever the
    /// value is bound to a fresh temporary, so `x = a + b` is one instruction.
    fn lower_assign_to_slot(
        &mut self,
        dest: Operand,
        value: &Expr,
    ) -> Result<Vec<Code>, GenerationError> {
        let ty = dest.ty();
        match value.unparen() {
            Expr::NewObject { class, .. } => {
                self.object_type(class)?;
                return Ok(self.construct_into(&dest, class));
            }
            Expr::Call {
                receiver,
                method,
                args,
                ..
            } => {
                let (mut code, call) =
                    self.lower_call(receiver, method, args, CallUse::AssignedTo(&ty))?;
                code.push(Code::Instr(assign(&dest, call)));
                return Ok(code);
            }
            _ => {}
        }

        let mut v = self.lower_expr(value, Some(&ty))?;
        if let Some(mut binding) = v.take_binding() {
            binding.rename_dest(dest);
            v.prefix.push(Code::Instr(binding));
        } else {
            v.prefix
                .push(Code::Instr(assign(&dest, InstrKind::SingleOp(v.result))));
        }
        Ok(v.prefix)
    }

    fn lower_array_assign(
        &mut self,
        target: &str,
        index: &Expr,
        value: &Expr,
    ) -> Result<Vec<Code>, GenerationError> {
        let arr = match self.slot_operand(target)? {
            Some(op) => LoweredExpr::value(op),
            None => self.lower_ident(target)?,
        };
        let array = require_slot(arr.result, "ArrayAssign")?;
        let elem_ty = element_type(&array)?;
        let idx = self.lower_index_operand(index)?;
        let val = self.lower_expr(value, Some(&elem_ty))?;

        let mut code = arr.prefix;
        code.extend(idx.prefix);
        code.extend(val.prefix);
        code.push(Code::Instr(InstrKind::Assign {
            dest: Operand::ArrayElem {
                array: Box::new(array),
                index: Box::new(idx.result),
                ty: elem_ty.clone(),
            },
            ty: elem_ty,
            rhs: Box::new(InstrKind::SingleOp(val.result)),
        }));
        Ok(code)
    }

    fn lower_return(&mut self, value: Option<&Expr>) -> Result<Vec<Code>, GenerationError> {
        let Some(value) = value else {
            return Ok(vec![Code::Instr(InstrKind::Return { value: None })]);
        };
        let ret_ty = self.return_type().clone();
        let v = self.lower_expr(value, Some(&ret_ty))?;
        let mut code = v.prefix;
        code.push(Code::Instr(InstrKind::Return {
            value: Some(v.result),
        }));
        Ok(code)
    }

    /// ```text
    ///     <cond>; if (cond) goto then_N;
    ///     <else>; goto endif_N;
    /// then_N:
    ///     <then>
    /// endif_N:
    /// ```
    fn lower_if(
        &mut self,
        cond: &Expr,
        then_branch: &Stmt,
        else_branch: Option<&Stmt>,
    ) -> Result<Vec<Code>, GenerationError> {
        let n = self.fresh_label();
        let then_label = format!("then_{}", n);
        let end_label = format!("endif_{}", n);

        let (mut code, test) = self.lower_condition(cond)?;
        code.push(Code::Instr(InstrKind::Branch {
            cond: Box::new(test),
            label: then_label.clone(),
        }));
        if let Some(else_branch) = else_branch {
            code.extend(self.lower_stmt(else_branch)?);
        }
        code.push(Code::Instr(InstrKind::Goto {
            label: end_label.clone(),
        }));
        code.push(Code::Label(then_label));
        code.extend(self.lower_stmt(then_branch)?);
        code.push(Code::Label(end_label));
        Ok(code)
    }

    /// ```text
    /// whilecond_N:
    ///     <cond>; if (cond) goto whilebody_N;
    ///     goto whileend_N;
    /// whilebody_N:
    ///     <body>; goto whilecond_N;
    /// whileend_N:
    /// ```
    fn lower_while(&mut self, cond: &Expr, body: &Stmt) -> Result<Vec<Code>, GenerationError> {
        let n = self.fresh_label();
        let cond_label = format!("whilecond_{}", n);
        let body_label = format!("whilebody_{}", n);
        let end_label = format!("whileend_{}", n);

        let mut code = vec![Code::Label(cond_label.clone())];
        let (cond_code, test) = self.lower_condition(cond)?;
        code.extend(cond_code);
        code.push(Code::Instr(InstrKind::Branch {
            cond: Box::new(test),
            label: body_label.clone(),
        }));
        code.push(Code::Instr(InstrKind::Goto {
            label: end_label.clone(),
        }));
        code.push(Code::Label(body_label));
        code.extend(self.lower_stmt(body)?);
        code.push(Code::Instr(InstrKind::Goto { label: cond_label }));
        code.push(Code::Label(end_label));
        Ok(code)
    }
}
