//! Syntax tree for Java-- (class, methods, statements, expressions).

use crate::span::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Root of a compilation unit: imports plus the single class.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Program {
    #[serde(default)]
    pub imports: Vec<ImportDecl>,
    pub class: ClassDecl,
}

/// `import a.b.C;`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImportDecl {
    #[serde(default)]
    pub span: Span,
    pub path: Vec<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessModifier {
    Public,
    Private,
    Protected,
    #[default]
    Default,
}

impl AccessModifier {
    /// Keyword as written in IR/assembly; `None` for package-private.
    pub fn keyword(self) -> Option<&'static str> {
        match self {
            AccessModifier::Public => Some("public"),
            AccessModifier::Private => Some("private"),
            AccessModifier::Protected => Some("protected"),
            AccessModifier::Default => None,
        }
    }
}

/// Class declaration. Fields are kept in the symbol table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClassDecl {
    #[serde(default)]
    pub span: Span,
    pub name: String,
    #[serde(default)]
    pub extends: Option<String>,
    #[serde(default)]
    pub methods: Vec<MethodDecl>,
}

/// Method or constructor declaration. Parameters and locals come from the
/// symbol table; the body is the statement list.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MethodDecl {
    #[serde(default)]
    pub span: Span,
    #[serde(default)]
    pub access: AccessModifier,
    #[serde(default)]
    pub is_constructor: bool,
    pub name: String,
    #[serde(default)]
    pub body: Vec<Stmt>,
}

impl MethodDecl {
    /// The designated entry method is the only static method.
    pub fn is_entry(&self) -> bool {
        !self.is_constructor && self.name == "main"
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Sub,
    #[serde(rename = "*")]
    Mul,
    #[serde(rename = "/")]
    Div,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "&&")]
    And,
    #[serde(rename = "||")]
    Or,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(self, BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div)
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge | BinOp::Eq | BinOp::Ne
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinOp::And | BinOp::Or)
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Statement.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Stmt {
    Block {
        #[serde(default)]
        span: Span,
        stmts: Vec<Stmt>,
    },
    If {
        #[serde(default)]
        span: Span,
        cond: Expr,
        then_branch: Box<Stmt>,
        #[serde(default)]
        else_branch: Option<Box<Stmt>>,
    },
    While {
        #[serde(default)]
        span: Span,
        cond: Expr,
        body: Box<Stmt>,
    },
    Expr {
        #[serde(default)]
        span: Span,
        expr: Expr,
    },
    /// `name = value;`
    Assign {
        #[serde(default)]
        span: Span,
        target: String,
        value: Expr,
    },
    /// `name[index] = value;`
    ArrayAssign {
        #[serde(default)]
        span: Span,
        target: String,
        index: Expr,
        value: Expr,
    },
    Return {
        #[serde(default)]
        span: Span,
        #[serde(default)]
        value: Option<Expr>,
    },
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Block { span, .. }
            | Stmt::If { span, .. }
            | Stmt::While { span, .. }
            | Stmt::Expr { span, .. }
            | Stmt::Assign { span, .. }
            | Stmt::ArrayAssign { span, .. }
            | Stmt::Return { span, .. } => *span,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Stmt::Block { .. } => "Block",
            Stmt::If { .. } => "If",
            Stmt::While { .. } => "While",
            Stmt::Expr { .. } => "ExprStmt",
            Stmt::Assign { .. } => "Assign",
            Stmt::ArrayAssign { .. } => "ArrayAssign",
            Stmt::Return { .. } => "Return",
        }
    }
}

/// Expression.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Expr {
    IntLiteral {
        #[serde(default)]
        span: Span,
        value: i32,
    },
    BoolLiteral {
        #[serde(default)]
        span: Span,
        value: bool,
    },
    Ident {
        #[serde(default)]
        span: Span,
        name: String,
    },
    This {
        #[serde(default)]
        span: Span,
    },
    Paren {
        #[serde(default)]
        span: Span,
        expr: Box<Expr>,
    },
    Not {
        #[serde(default)]
        span: Span,
        expr: Box<Expr>,
    },
    Binary {
        #[serde(default)]
        span: Span,
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `array[index]`
    Index {
        #[serde(default)]
        span: Span,
        array: Box<Expr>,
        index: Box<Expr>,
    },
    /// `array.length`
    Length {
        #[serde(default)]
        span: Span,
        array: Box<Expr>,
    },
    /// `receiver.method(args)`
    Call {
        #[serde(default)]
        span: Span,
        receiver: Box<Expr>,
        method: String,
        #[serde(default)]
        args: Vec<Expr>,
    },
    /// `new int[size]`
    NewIntArray {
        #[serde(default)]
        span: Span,
        size: Box<Expr>,
    },
    /// `new C()`
    NewObject {
        #[serde(default)]
        span: Span,
        class: String,
    },
}

impl Expr {
    /// Span of this expression in source.
    pub fn span(&self) -> Span {
        match self {
            Expr::IntLiteral { span, .. }
            | Expr::BoolLiteral { span, .. }
            | Expr::Ident { span, .. }
            | Expr::This { span }
            | Expr::Paren { span, .. }
            | Expr::Not { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Index { span, .. }
            | Expr::Length { span, .. }
            | Expr::Call { span, .. }
            | Expr::NewIntArray { span, .. }
            | Expr::NewObject { span, .. } => *span,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Expr::IntLiteral { .. } => "IntLiteral",
            Expr::BoolLiteral { .. } => "BoolLiteral",
            Expr::Ident { .. } => "Ident",
            Expr::This { .. } => "This",
            Expr::Paren { .. } => "Paren",
            Expr::Not { .. } => "Not",
            Expr::Binary { .. } => "Binary",
            Expr::Index { .. } => "Index",
            Expr::Length { .. } => "Length",
            Expr::Call { .. } => "Call",
            Expr::NewIntArray { .. } => "NewIntArray",
            Expr::NewObject { .. } => "NewObject",
        }
    }

    /// Strip any number of enclosing parentheses.
    pub fn unparen(&self) -> &Expr {
        let mut e = self;
        while let Expr::Paren { expr, .. } = e {
            e = expr;
        }
        e
    }
}

/// Small constructors used by tests and tools that build trees by hand.
pub mod build {
    use super::*;

    pub fn int(value: i32) -> Expr {
        Expr::IntLiteral {
            span: Span::default(),
            value,
        }
    }

    pub fn boolean(value: bool) -> Expr {
        Expr::BoolLiteral {
            span: Span::default(),
            value,
        }
    }

    pub fn ident(name: &str) -> Expr {
        Expr::Ident {
            span: Span::default(),
            name: name.to_string(),
        }
    }

    pub fn this() -> Expr {
        Expr::This {
            span: Span::default(),
        }
    }

    pub fn not(expr: Expr) -> Expr {
        Expr::Not {
            span: Span::default(),
            expr: Box::new(expr),
        }
    }

    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary {
            span: Span::default(),
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn index(array: Expr, index: Expr) -> Expr {
        Expr::Index {
            span: Span::default(),
            array: Box::new(array),
            index: Box::new(index),
        }
    }

    pub fn length(array: Expr) -> Expr {
        Expr::Length {
            span: Span::default(),
            array: Box::new(array),
        }
    }

    pub fn call(receiver: Expr, method: &str, args: Vec<Expr>) -> Expr {
        Expr::Call {
            span: Span::default(),
            receiver: Box::new(receiver),
            method: method.to_string(),
            args,
        }
    }

    pub fn new_int_array(size: Expr) -> Expr {
        Expr::NewIntArray {
            span: Span::default(),
            size: Box::new(size),
        }
    }

    pub fn new_object(class: &str) -> Expr {
        Expr::NewObject {
            span: Span::default(),
            class: class.to_string(),
        }
    }

    pub fn assign(target: &str, value: Expr) -> Stmt {
        Stmt::Assign {
            span: Span::default(),
            target: target.to_string(),
            value,
        }
    }

    pub fn array_assign(target: &str, index: Expr, value: Expr) -> Stmt {
        Stmt::ArrayAssign {
            span: Span::default(),
            target: target.to_string(),
            index,
            value,
        }
    }

    pub fn expr(expr: Expr) -> Stmt {
        Stmt::Expr {
            span: Span::default(),
            expr,
        }
    }

    pub fn ret(value: Option<Expr>) -> Stmt {
        Stmt::Return {
            span: Span::default(),
            value,
        }
    }

    pub fn if_else(cond: Expr, then_branch: Stmt, else_branch: Option<Stmt>) -> Stmt {
        Stmt::If {
            span: Span::default(),
            cond,
            then_branch: Box::new(then_branch),
            else_branch: else_branch.map(Box::new),
        }
    }

    pub fn while_loop(cond: Expr, body: Stmt) -> Stmt {
        Stmt::While {
            span: Span::default(),
            cond,
            body: Box::new(body),
        }
    }

    pub fn block(stmts: Vec<Stmt>) -> Stmt {
        Stmt::Block {
            span: Span::default(),
            stmts,
        }
    }

    pub fn method(name: &str, body: Vec<Stmt>) -> MethodDecl {
        MethodDecl {
            span: Span::default(),
            access: AccessModifier::Public,
            is_constructor: false,
            name: name.to_string(),
            body,
        }
    }

    pub fn constructor(name: &str, body: Vec<Stmt>) -> MethodDecl {
        MethodDecl {
            is_constructor: true,
            ..method(name, body)
        }
    }

    pub fn class(name: &str, extends: Option<&str>, methods: Vec<MethodDecl>) -> ClassDecl {
        ClassDecl {
            span: Span::default(),
            name: name.to_string(),
            extends: extends.map(str::to_string),
            methods,
        }
    }
}
