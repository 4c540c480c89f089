//! Per-unit lowering state and the `(result, prefix)` pair every expression lowers to.

use jmm_syntax::ir::{Code, InstrKind, IrType, Operand};
use jmm_syntax::symbols::{Storage, SymbolTable, Type};
use jmm_syntax::GenerationError;

/// An expression after lowering: `prefix` must run before `result` is valid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoweredExpr {
    pub result: Operand,
    pub prefix: Vec<Code>,
    /// `result` is a temporary bound by the final instruction of `prefix`.
    pub fresh: bool,
}

impl LoweredExpr {
    /// A literal or slot reference that needs no code.
    pub fn value(result: Operand) -> Self {
        Self {
            result,
            prefix: Vec::new(),
            fresh: false,
        }
    }

    /// `prefix` followed by `dest := rhs`, yielding `dest`.
    pub fn computed(mut prefix: Vec<Code>, dest: Operand, rhs: InstrKind) -> Self {
        prefix.push(Code::Instr(InstrKind::Assign {
            ty: dest.ty(),
            dest: dest.clone(),
            rhs: Box::new(rhs),
        }));
        Self {
            result: dest,
            prefix,
            fresh: true,
        }
    }

    /// Detach the instruction that binds a fresh temporary, so the caller can
    /// retarget it. Returns `None` when `result` is not such a temporary.
    pub fn take_binding(&mut self) -> Option<InstrKind> {
        if !self.fresh {
            return None;
        }
        match self.prefix.pop() {
            Some(Code::Instr(kind @ InstrKind::Assign { .. })) => {
                self.fresh = false;
                Some(kind)
            }
            Some(other) => {
                self.prefix.push(other);
                None
            }
            None => None,
        }
    }
}

/// Counters and scope for lowering one compilation unit. Temporaries and labels
/// are numbered across the whole unit.
pub struct LoweringContext<'a> {
    pub symbols: &'a SymbolTable,
    method: String,
    is_static: bool,
    return_type: IrType,
    temp_counter: u32,
    label_counter: u32,
}

impl<'a> LoweringContext<'a> {
    pub fn new(symbols: &'a SymbolTable) -> Self {
        Self {
            symbols,
            method: String::new(),
            is_static: false,
            return_type: IrType::Void,
            temp_counter: 0,
            label_counter: 0,
        }
    }

    pub fn enter_method(&mut self, name: &str, is_static: bool, return_type: IrType) {
        self.method = name.to_string();
        self.is_static = is_static;
        self.return_type = return_type;
    }

    pub fn return_type(&self) -> &IrType {
        &self.return_type
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn class_name(&self) -> &str {
        &self.symbols.class_name
    }

    /// Fresh temporary `tN`, skipping names the source already declares.
    pub fn fresh_temp(&mut self, ty: IrType) -> Operand {
        loop {
            self.temp_counter += 1;
            let name = format!("t{}", self.temp_counter);
            if !self.symbols.is_declared_in(&self.method, &name) {
                return Operand::var(name, ty);
            }
        }
    }

    /// Next label number; callers derive every label of one construct from it.
    pub fn fresh_label(&mut self) -> u32 {
        let n = self.label_counter;
        self.label_counter += 1;
        n
    }

    pub fn this_operand(&self) -> Operand {
        Operand::This {
            class: self.symbols.class_name.clone(),
        }
    }

    /// Map a source type to its IR type. Arrays exist over `int` (and `String`
    /// for the entry method's arguments); class names must be known to the unit.
    pub fn ir_type(&self, ty: &Type) -> Result<IrType, GenerationError> {
        let base = match ty.name.as_str() {
            Type::INT => IrType::Int32,
            Type::BOOLEAN => IrType::Boolean,
            Type::STRING => IrType::String,
            Type::VOID => IrType::Void,
            name if self.symbols.is_known_class(name) => IrType::Object(name.to_string()),
            _ => return Err(GenerationError::unmapped(ty)),
        };
        if !ty.is_array {
            return Ok(base);
        }
        match base {
            IrType::Int32 | IrType::String => Ok(IrType::Array(Box::new(base))),
            _ => Err(GenerationError::unmapped(ty)),
        }
    }

    /// Slot-backed operand for a local or parameter; `None` for fields and
    /// unknown names.
    pub fn slot_operand(&self, name: &str) -> Result<Option<Operand>, GenerationError> {
        let Some(binding) = self.symbols.resolve(&self.method, name) else {
            return Ok(None);
        };
        let ty = self.ir_type(&binding.symbol.ty)?;
        Ok(match binding.storage {
            Storage::Local => Some(Operand::var(name, ty)),
            Storage::Param(pos) => Some(Operand::Param {
                index: pos + if self.is_static { 0 } else { 1 },
                name: name.to_string(),
                ty,
            }),
            Storage::Field => None,
        })
    }

    /// Field operand (`name.T`) when `name` resolves to a field.
    pub fn field_operand(&self, name: &str) -> Result<Option<Operand>, GenerationError> {
        match self.symbols.resolve(&self.method, name) {
            Some(b) if b.storage == Storage::Field => {
                if self.is_static {
                    return Err(GenerationError::UnsupportedNode {
                        kind: "Ident".into(),
                        detail: format!("field '{}' used in static method '{}'", name, self.method),
                    });
                }
                Ok(Some(Operand::var(name, self.ir_type(&b.symbol.ty)?)))
            }
            _ => Ok(None),
        }
    }

    pub fn unresolved(&self, name: &str) -> GenerationError {
        GenerationError::UnresolvedIdentifier {
            name: name.to_string(),
            method: self.method.clone(),
        }
    }
}
