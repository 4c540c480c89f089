//! Resolved static model of one class: types, symbols, and the per-method scopes
//! the back end resolves identifiers against.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Source-level type: a primitive or class name, optionally an array of it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Type {
    pub name: String,
    #[serde(default)]
    pub is_array: bool,
}

impl Type {
    pub const INT: &'static str = "int";
    pub const BOOLEAN: &'static str = "boolean";
    pub const STRING: &'static str = "String";
    pub const VOID: &'static str = "void";

    pub fn new(name: impl Into<String>, is_array: bool) -> Self {
        Self {
            name: name.into(),
            is_array,
        }
    }

    pub fn int() -> Self {
        Self::new(Self::INT, false)
    }

    pub fn int_array() -> Self {
        Self::new(Self::INT, true)
    }

    pub fn boolean() -> Self {
        Self::new(Self::BOOLEAN, false)
    }

    pub fn string() -> Self {
        Self::new(Self::STRING, false)
    }

    pub fn void() -> Self {
        Self::new(Self::VOID, false)
    }

    pub fn class(name: impl Into<String>) -> Self {
        Self::new(name, false)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_array {
            write!(f, "{}[]", self.name)
        } else {
            f.write_str(&self.name)
        }
    }
}

/// A named, typed binding: field, parameter, or local.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Type,
}

impl Symbol {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Signature and scope of one method.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodSymbols {
    pub name: String,
    pub return_type: Type,
    #[serde(default)]
    pub parameters: Vec<Symbol>,
    #[serde(default)]
    pub locals: Vec<Symbol>,
}

impl MethodSymbols {
    pub fn new(name: impl Into<String>, return_type: Type) -> Self {
        Self {
            name: name.into(),
            return_type,
            parameters: Vec::new(),
            locals: Vec::new(),
        }
    }

    pub fn param(mut self, name: impl Into<String>, ty: Type) -> Self {
        self.parameters.push(Symbol::new(name, ty));
        self
    }

    pub fn local(mut self, name: impl Into<String>, ty: Type) -> Self {
        self.locals.push(Symbol::new(name, ty));
        self
    }
}

/// Where an identifier lives inside a method.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Storage {
    Local,
    /// Zero-based declaration position among the method's parameters.
    Param(u32),
    Field,
}

/// Result of resolving an identifier: its storage class and symbol.
#[derive(Clone, Copy, Debug)]
pub struct Binding<'a> {
    pub storage: Storage,
    pub symbol: &'a Symbol,
}

/// Built once by the semantic pass; read-only to the back end.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolTable {
    pub class_name: String,
    #[serde(default)]
    pub super_class: Option<String>,
    /// Dotted import paths in declaration order, e.g. `java.util.List`.
    #[serde(default)]
    pub imports: Vec<String>,
    #[serde(default)]
    pub fields: Vec<Symbol>,
    #[serde(default)]
    pub methods: Vec<MethodSymbols>,
}

impl SymbolTable {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            ..Self::default()
        }
    }

    pub fn with_super(mut self, super_class: impl Into<String>) -> Self {
        self.super_class = Some(super_class.into());
        self
    }

    pub fn with_import(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        if !self.imports.contains(&path) {
            self.imports.push(path);
        }
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, ty: Type) -> Self {
        self.fields.push(Symbol::new(name, ty));
        self
    }

    pub fn with_method(mut self, method: MethodSymbols) -> Self {
        self.methods.push(method);
        self
    }

    pub fn method(&self, name: &str) -> Option<&MethodSymbols> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&Symbol> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Resolve `name` inside `method`: local, then parameter, then field.
    pub fn resolve(&self, method: &str, name: &str) -> Option<Binding<'_>> {
        if let Some(m) = self.method(method) {
            if let Some(symbol) = m.locals.iter().find(|s| s.name == name) {
                return Some(Binding {
                    storage: Storage::Local,
                    symbol,
                });
            }
            if let Some((i, symbol)) = m
                .parameters
                .iter()
                .enumerate()
                .find(|(_, s)| s.name == name)
            {
                return Some(Binding {
                    storage: Storage::Param(i as u32),
                    symbol,
                });
            }
        }
        self.field(name).map(|symbol| Binding {
            storage: Storage::Field,
            symbol,
        })
    }

    /// Dotted import whose last segment is `simple`, if any.
    pub fn import_path(&self, simple: &str) -> Option<&str> {
        self.imports
            .iter()
            .find(|i| i.rsplit('.').next() == Some(simple))
            .map(String::as_str)
    }

    pub fn is_imported(&self, simple: &str) -> bool {
        self.import_path(simple).is_some()
    }

    /// True if `name` denotes a class the unit can reference: itself, its
    /// superclass, or an import.
    pub fn is_known_class(&self, name: &str) -> bool {
        name == self.class_name
            || self.super_class.as_deref() == Some(name)
            || self.is_imported(name)
    }

    /// True if any scope of `method` (or the class fields) already uses `name`.
    pub fn is_declared_in(&self, method: &str, name: &str) -> bool {
        self.resolve(method, name).is_some()
    }
}
