//! IR text form: imports, class header, fields, then one block per method.

use jmm_syntax::ir::{IrClass, IrField, IrMethod};
use std::fmt::Write as _;

pub fn print_class(class: &IrClass) -> String {
    let mut out = String::new();
    for imp in &class.imports {
        let _ = writeln!(out, "import {};", imp);
    }
    if !class.imports.is_empty() {
        out.push('\n');
    }

    out.push_str(&class.name);
    if let Some(sup) = &class.super_class {
        let _ = write!(out, " extends {}", sup);
    }
    out.push_str(" {\n");

    for f in &class.fields {
        print_field(&mut out, f);
    }
    if !class.fields.is_empty() {
        out.push('\n');
    }
    for (i, m) in class.methods.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        print_method(&mut out, m);
    }
    out.push_str("}\n");
    out
}

fn print_field(out: &mut String, f: &IrField) {
    out.push_str("    .field ");
    if let Some(kw) = f.access.keyword() {
        let _ = write!(out, "{} ", kw);
    }
    if f.is_static {
        out.push_str("static ");
    }
    if f.is_final {
        out.push_str("final ");
    }
    let _ = writeln!(out, "{}.{};", f.name, f.ty);
}

fn print_method(out: &mut String, m: &IrMethod) {
    let params: Vec<String> = m
        .params
        .iter()
        .map(|p| format!("{}.{}", p.name, p.ty))
        .collect();
    if m.is_constructor {
        let _ = writeln!(out, "    .construct {}({}).V {{", m.name, params.join(", "));
    } else {
        out.push_str("    .method ");
        if let Some(kw) = m.access.keyword() {
            let _ = write!(out, "{} ", kw);
        }
        if m.is_static {
            out.push_str("static ");
        }
        let _ = writeln!(
            out,
            "{}({}).{} {{",
            m.name,
            params.join(", "),
            m.return_type
        );
    }
    for instr in &m.instructions {
        if let Some(labels) = m.labels.get(&instr.id) {
            for l in labels {
                let _ = writeln!(out, "      {}:", l);
            }
        }
        let _ = writeln!(out, "        {};", instr.kind);
    }
    out.push_str("    }\n");
}
