//! Three-address IR produced by lowering and consumed by liveness analysis and
//! Jasmin emission. One instruction list per method; successor ids form the CFG.

use crate::ast::{AccessModifier, BinOp};
use crate::error::GenerationError;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// IR value type; printed as the dotted suffix on every value-bearing token.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum IrType {
    Int32,
    Boolean,
    String,
    Void,
    Array(Box<IrType>),
    /// Instance of a class (user, super, or imported).
    Object(String),
    /// A class used as a static invocation target.
    Class(String),
    /// The current instance.
    This(String),
}

impl IrType {
    pub fn int_array() -> Self {
        IrType::Array(Box::new(IrType::Int32))
    }

    /// Stored in a reference slot (`aload`/`astore`).
    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            IrType::String | IrType::Array(_) | IrType::Object(_) | IrType::This(_)
        )
    }
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrType::Int32 => f.write_str("i32"),
            IrType::Boolean => f.write_str("bool"),
            IrType::String => f.write_str("String"),
            IrType::Void => f.write_str("V"),
            IrType::Array(elem) => write!(f, "array.{}", elem),
            IrType::Object(name) | IrType::Class(name) | IrType::This(name) => f.write_str(name),
        }
    }
}

/// Instruction operand.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operand {
    Literal {
        value: i32,
        ty: IrType,
    },
    /// Local variable or temporary.
    Var {
        name: String,
        ty: IrType,
    },
    /// Method parameter; `index` is its position counted from 1 in instance
    /// methods and from 0 in the static entry method.
    Param {
        index: u32,
        name: String,
        ty: IrType,
    },
    /// `array[index]`; `ty` is the element type.
    ArrayElem {
        array: Box<Operand>,
        index: Box<Operand>,
        ty: IrType,
    },
    This {
        class: String,
    },
    /// Class name used as a static target, or `array` in `new(array, n)`.
    Class {
        name: String,
    },
}

impl Operand {
    pub fn int(value: i32) -> Self {
        Operand::Literal {
            value,
            ty: IrType::Int32,
        }
    }

    pub fn boolean(value: bool) -> Self {
        Operand::Literal {
            value: value as i32,
            ty: IrType::Boolean,
        }
    }

    pub fn var(name: impl Into<String>, ty: IrType) -> Self {
        Operand::Var {
            name: name.into(),
            ty,
        }
    }

    pub fn ty(&self) -> IrType {
        match self {
            Operand::Literal { ty, .. }
            | Operand::Var { ty, .. }
            | Operand::Param { ty, .. }
            | Operand::ArrayElem { ty, .. } => ty.clone(),
            Operand::This { class } => IrType::This(class.clone()),
            Operand::Class { name } => IrType::Class(name.clone()),
        }
    }

    /// Variable name for slot-backed operands (variables and parameters).
    pub fn var_name(&self) -> Option<&str> {
        match self {
            Operand::Var { name, .. } | Operand::Param { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Operand::Literal { .. })
    }

    /// Names of every variable this operand reads when evaluated.
    pub fn read_vars(&self, out: &mut Vec<String>) {
        match self {
            Operand::Var { name, .. } | Operand::Param { name, .. } => out.push(name.clone()),
            Operand::ArrayElem { array, index, .. } => {
                array.read_vars(out);
                index.read_vars(out);
            }
            Operand::Literal { .. } | Operand::This { .. } | Operand::Class { .. } => {}
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Literal { value, ty } => write!(f, "{}.{}", value, ty),
            Operand::Var { name, ty } => write!(f, "{}.{}", name, ty),
            Operand::Param { index, name, ty } => write!(f, "${}.{}.{}", index, name, ty),
            Operand::ArrayElem { array, index, ty } => {
                match array.as_ref() {
                    Operand::Param { index: p, name, .. } => write!(f, "${}.{}", p, name)?,
                    Operand::Var { name, .. } => f.write_str(name)?,
                    other => write!(f, "{}", other)?,
                }
                write!(f, "[{}].{}", index, ty)
            }
            Operand::This { .. } => f.write_str("this"),
            Operand::Class { name } => f.write_str(name),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Invocation {
    Static,
    Virtual,
    Special,
    New,
    ArrayLength,
}

impl Invocation {
    pub fn keyword(self) -> &'static str {
        match self {
            Invocation::Static => "invokestatic",
            Invocation::Virtual => "invokevirtual",
            Invocation::Special => "invokespecial",
            Invocation::New => "new",
            Invocation::ArrayLength => "arraylength",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
}

/// Instruction kinds. `Assign` nests the instruction that produces its value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InstrKind {
    Assign {
        dest: Operand,
        ty: IrType,
        rhs: Box<InstrKind>,
    },
    BinaryOp {
        op: BinOp,
        lhs: Operand,
        rhs: Operand,
    },
    UnaryOp {
        op: UnaryOp,
        operand: Operand,
    },
    Call {
        invocation: Invocation,
        target: Operand,
        method: Option<String>,
        args: Vec<Operand>,
        ret: IrType,
    },
    Return {
        value: Option<Operand>,
    },
    Goto {
        label: String,
    },
    /// Jump to `label` when `cond` evaluates to true.
    Branch {
        cond: Box<InstrKind>,
        label: String,
    },
    GetField {
        object: Operand,
        field: Operand,
    },
    PutField {
        object: Operand,
        field: Operand,
        value: Operand,
    },
    SingleOp(Operand),
    NoOp,
}

impl InstrKind {
    pub fn kind_name(&self) -> &'static str {
        match self {
            InstrKind::Assign { .. } => "assign",
            InstrKind::BinaryOp { .. } => "binary-op",
            InstrKind::UnaryOp { .. } => "unary-op",
            InstrKind::Call { .. } => "call",
            InstrKind::Return { .. } => "return",
            InstrKind::Goto { .. } => "goto",
            InstrKind::Branch { .. } => "branch",
            InstrKind::GetField { .. } => "get-field",
            InstrKind::PutField { .. } => "put-field",
            InstrKind::SingleOp(_) => "single-op",
            InstrKind::NoOp => "no-op",
        }
    }

    /// Type of the value this instruction leaves behind, `Void` if none.
    pub fn result_type(&self) -> IrType {
        match self {
            InstrKind::BinaryOp { op, .. } => {
                if op.is_arithmetic() {
                    IrType::Int32
                } else {
                    IrType::Boolean
                }
            }
            InstrKind::UnaryOp { .. } => IrType::Boolean,
            InstrKind::Call { ret, .. } => ret.clone(),
            InstrKind::GetField { field, .. } => field.ty(),
            InstrKind::SingleOp(op) => op.ty(),
            _ => IrType::Void,
        }
    }

    /// The variable written by this instruction, if any. Array-element stores
    /// write through the reference and define nothing.
    pub fn defined_var(&self) -> Option<&str> {
        match self {
            InstrKind::Assign { dest, .. } => dest.var_name(),
            _ => None,
        }
    }

    /// Every variable read by this instruction, in operand order.
    pub fn read_vars(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_reads(&mut out);
        out
    }

    fn collect_reads(&self, out: &mut Vec<String>) {
        match self {
            InstrKind::Assign { dest, rhs, .. } => {
                if let Operand::ArrayElem { array, index, .. } = dest {
                    array.read_vars(out);
                    index.read_vars(out);
                }
                rhs.collect_reads(out);
            }
            InstrKind::BinaryOp { lhs, rhs, .. } => {
                lhs.read_vars(out);
                rhs.read_vars(out);
            }
            InstrKind::UnaryOp { operand, .. } | InstrKind::SingleOp(operand) => {
                operand.read_vars(out)
            }
            InstrKind::Call { target, args, .. } => {
                target.read_vars(out);
                for a in args {
                    a.read_vars(out);
                }
            }
            InstrKind::Return { value } => {
                if let Some(v) = value {
                    v.read_vars(out);
                }
            }
            InstrKind::Branch { cond, .. } => cond.collect_reads(out),
            InstrKind::GetField { object, .. } => object.read_vars(out),
            InstrKind::PutField { object, value, .. } => {
                object.read_vars(out);
                value.read_vars(out);
            }
            InstrKind::Goto { .. } | InstrKind::NoOp => {}
        }
    }

    /// Visit every value operand, including those nested in `Assign`/`Branch`
    /// and array elements. Field designators of `getfield`/`putfield` name a
    /// field, not a slot, and are skipped.
    pub fn for_each_operand(&self, f: &mut dyn FnMut(&Operand)) {
        fn visit(op: &Operand, f: &mut dyn FnMut(&Operand)) {
            f(op);
            if let Operand::ArrayElem { array, index, .. } = op {
                visit(array, f);
                visit(index, f);
            }
        }
        match self {
            InstrKind::Assign { dest, rhs, .. } => {
                visit(dest, f);
                rhs.for_each_operand(f);
            }
            InstrKind::BinaryOp { lhs, rhs, .. } => {
                visit(lhs, f);
                visit(rhs, f);
            }
            InstrKind::UnaryOp { operand, .. } | InstrKind::SingleOp(operand) => visit(operand, f),
            InstrKind::Call { target, args, .. } => {
                visit(target, f);
                for a in args {
                    visit(a, f);
                }
            }
            InstrKind::Return { value } => {
                if let Some(v) = value {
                    visit(v, f);
                }
            }
            InstrKind::Branch { cond, .. } => cond.for_each_operand(f),
            InstrKind::GetField { object, .. } => visit(object, f),
            InstrKind::PutField { object, value, .. } => {
                visit(object, f);
                visit(value, f);
            }
            InstrKind::Goto { .. } | InstrKind::NoOp => {}
        }
    }

    /// Rename the variable an `Assign` writes. Returns false for other kinds.
    pub fn rename_dest(&mut self, new_dest: Operand) -> bool {
        match self {
            InstrKind::Assign { dest, ty, .. } => {
                *ty = new_dest.ty();
                *dest = new_dest;
                true
            }
            _ => false,
        }
    }
}

impl fmt::Display for InstrKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstrKind::Assign { dest, ty, rhs } => write!(f, "{} :=.{} {}", dest, ty, rhs),
            InstrKind::BinaryOp { op, lhs, rhs } => {
                write!(f, "{} {}.{} {}", lhs, op, self.result_type(), rhs)
            }
            InstrKind::UnaryOp {
                op: UnaryOp::Not,
                operand,
            } => write!(f, "!.bool {}", operand),
            InstrKind::Call {
                invocation,
                target,
                method,
                args,
                ret,
            } => {
                write!(f, "{}({}", invocation.keyword(), target)?;
                if let Some(m) = method {
                    write!(f, ", \"{}\"", m)?;
                }
                for a in args {
                    write!(f, ", {}", a)?;
                }
                write!(f, ").{}", ret)
            }
            InstrKind::Return { value: Some(v) } => write!(f, "ret.{} {}", v.ty(), v),
            InstrKind::Return { value: None } => f.write_str("ret.V"),
            InstrKind::Goto { label } => write!(f, "goto {}", label),
            InstrKind::Branch { cond, label } => write!(f, "if ({}) goto {}", cond, label),
            InstrKind::GetField { object, field } => {
                write!(f, "getfield({}, {}).{}", object, field, field.ty())
            }
            InstrKind::PutField {
                object,
                field,
                value,
            } => write!(f, "putfield({}, {}, {}).V", object, field, value),
            InstrKind::SingleOp(op) => write!(f, "{}", op),
            InstrKind::NoOp => f.write_str("nop"),
        }
    }
}

/// Lowering output before instruction ids are assigned: a label or an instruction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Code {
    Label(String),
    Instr(InstrKind),
}

/// One instruction with its stable id and CFG successors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instruction {
    pub id: u32,
    pub kind: InstrKind,
    pub successors: Vec<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IrParam {
    pub name: String,
    pub ty: IrType,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IrMethod {
    pub name: String,
    pub access: AccessModifier,
    pub is_static: bool,
    pub is_constructor: bool,
    pub params: Vec<IrParam>,
    pub return_type: IrType,
    pub instructions: Vec<Instruction>,
    /// Labels attached to the instruction with the given id.
    pub labels: BTreeMap<u32, Vec<String>>,
}

impl IrMethod {
    /// Assign ids (from 1) to `code`, attach labels to the instruction that
    /// follows them, and link successors. A trailing label gets a `NoOp`.
    pub fn assemble(header: IrMethodHeader, code: Vec<Code>) -> Result<IrMethod, GenerationError> {
        let mut instructions: Vec<Instruction> = Vec::new();
        let mut labels: BTreeMap<u32, Vec<String>> = BTreeMap::new();
        let mut pending: Vec<String> = Vec::new();
        let mut next_id = 1u32;

        let mut push = |kind: InstrKind, pending: &mut Vec<String>| {
            let id = next_id;
            next_id += 1;
            if !pending.is_empty() {
                labels.insert(id, std::mem::take(pending));
            }
            instructions.push(Instruction {
                id,
                kind,
                successors: Vec::new(),
            });
        };
        for c in code {
            match c {
                Code::Label(l) => pending.push(l),
                Code::Instr(kind) => push(kind, &mut pending),
            }
        }
        if !pending.is_empty() {
            push(InstrKind::NoOp, &mut pending);
        }

        let label_ids: HashMap<&str, u32> = labels
            .iter()
            .flat_map(|(id, ls)| ls.iter().map(move |l| (l.as_str(), *id)))
            .collect();
        let target = |label: &str| {
            label_ids
                .get(label)
                .copied()
                .ok_or_else(|| GenerationError::UnsupportedInstruction {
                    detail: format!("jump to undefined label '{}' in {}", label, header.name),
                })
        };

        let mut successors = Vec::with_capacity(instructions.len());
        for (i, instr) in instructions.iter().enumerate() {
            let next = instructions.get(i + 1).map(|n| n.id);
            let succ: Vec<u32> = match &instr.kind {
                InstrKind::Goto { label } => vec![target(label)?],
                InstrKind::Branch { label, .. } => {
                    let taken = target(label)?;
                    let mut v = vec![taken];
                    if let Some(n) = next.filter(|n| *n != taken) {
                        v.push(n);
                    }
                    v
                }
                InstrKind::Return { .. } => Vec::new(),
                _ => next.into_iter().collect(),
            };
            successors.push(succ);
        }
        for (instr, succ) in instructions.iter_mut().zip(successors) {
            instr.successors = succ;
        }

        Ok(IrMethod {
            name: header.name,
            access: header.access,
            is_static: header.is_static,
            is_constructor: header.is_constructor,
            params: header.params,
            return_type: header.return_type,
            instructions,
            labels,
        })
    }

    pub fn has_return(&self) -> bool {
        self.instructions
            .iter()
            .any(|i| matches!(i.kind, InstrKind::Return { .. }))
    }

    /// The last instruction is a return, so control cannot run off the end.
    pub fn ends_in_return(&self) -> bool {
        matches!(
            self.instructions.last().map(|i| &i.kind),
            Some(InstrKind::Return { .. })
        )
    }
}

/// Signature part of an [`IrMethod`], filled in before the body is assembled.
#[derive(Clone, Debug)]
pub struct IrMethodHeader {
    pub name: String,
    pub access: AccessModifier,
    pub is_static: bool,
    pub is_constructor: bool,
    pub params: Vec<IrParam>,
    pub return_type: IrType,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IrField {
    pub name: String,
    pub ty: IrType,
    pub access: AccessModifier,
    pub is_static: bool,
    pub is_final: bool,
}

/// Lowered class: the unit handed to the emitter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IrClass {
    pub name: String,
    pub access: AccessModifier,
    pub super_class: Option<String>,
    /// Dotted import paths.
    pub imports: Vec<String>,
    pub fields: Vec<IrField>,
    pub methods: Vec<IrMethod>,
}

impl IrClass {
    pub fn constructor_count(&self) -> usize {
        self.methods.iter().filter(|m| m.is_constructor).count()
    }

    pub fn check_constructors(&self) -> Result<(), GenerationError> {
        let count = self.constructor_count();
        if count > 1 {
            return Err(GenerationError::MultipleConstructors {
                class: self.name.clone(),
                count,
            });
        }
        Ok(())
    }
}

/// Slot assigned to one local/parameter/temporary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VarDescriptor {
    pub slot: u16,
    pub ty: IrType,
}

/// Per-method slot table, built immediately before emission.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VarTable {
    vars: BTreeMap<String, VarDescriptor>,
}

impl VarTable {
    pub const THIS: &'static str = "this";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, slot: u16, ty: IrType) {
        self.vars.insert(name.into(), VarDescriptor { slot, ty });
    }

    pub fn get(&self, name: &str) -> Option<&VarDescriptor> {
        self.vars.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &VarDescriptor)> {
        self.vars.iter()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Distinct slots in use: highest slot + 1.
    pub fn locals_limit(&self) -> u16 {
        self.vars.values().map(|d| d.slot + 1).max().unwrap_or(0)
    }

    /// Fixed slots: `this` at 0 for instance methods, then parameters in order.
    /// Returns the table and the first free slot.
    pub fn with_fixed_slots(method: &IrMethod) -> (VarTable, u16) {
        let mut table = VarTable::new();
        let mut next = 0u16;
        if !method.is_static {
            table.insert(Self::THIS, 0, IrType::This(String::new()));
            next = 1;
        }
        for p in &method.params {
            table.insert(p.name.clone(), next, p.ty.clone());
            next += 1;
        }
        (table, next)
    }

    /// One slot per variable, in order of first appearance. No reuse.
    pub fn one_slot_per_var(method: &IrMethod) -> VarTable {
        let (mut table, mut next) = Self::with_fixed_slots(method);
        for var in method_vars(method) {
            if !table.contains(&var.0) {
                table.insert(var.0, next, var.1);
                next += 1;
            }
        }
        table
    }
}

/// Variables and temporaries a method body mentions (excluding parameters),
/// in first-appearance order.
pub fn method_vars(method: &IrMethod) -> Vec<(String, IrType)> {
    let mut seen: Vec<(String, IrType)> = Vec::new();
    for instr in &method.instructions {
        instr.kind.for_each_operand(&mut |op| {
            if let Operand::Var { name, ty } = op {
                if !seen.iter().any(|(n, _)| n == name) {
                    seen.push((name.clone(), ty.clone()));
                }
            }
        });
    }
    seen
}
