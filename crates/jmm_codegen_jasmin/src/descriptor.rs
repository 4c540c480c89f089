//! Type and method descriptors.

use jmm_syntax::ir::IrType;
use jmm_syntax::GenerationError;
use std::collections::HashMap;

/// Simple class name to its slash-separated import path.
#[derive(Clone, Debug, Default)]
pub struct ImportMap {
    paths: HashMap<String, String>,
}

impl ImportMap {
    pub fn new(imports: &[String]) -> Self {
        let mut paths = HashMap::new();
        for imp in imports {
            let simple = imp.rsplit('.').next().unwrap_or(imp);
            paths.insert(simple.to_string(), imp.replace('.', "/"));
        }
        Self { paths }
    }

    /// Qualified internal name for `class`; unimported names stay as they are.
    pub fn resolve(&self, class: &str) -> String {
        self.paths
            .get(class)
            .cloned()
            .unwrap_or_else(|| class.to_string())
    }
}

pub fn type_descriptor(ty: &IrType, imports: &ImportMap) -> Result<String, GenerationError> {
    Ok(match ty {
        IrType::Int32 => "I".to_string(),
        IrType::Boolean => "Z".to_string(),
        IrType::String => "Ljava/lang/String;".to_string(),
        IrType::Void => "V".to_string(),
        IrType::Array(elem) => {
            if **elem == IrType::Void {
                return Err(GenerationError::unmapped(ty));
            }
            format!("[{}", type_descriptor(elem, imports)?)
        }
        IrType::Object(name) | IrType::Class(name) | IrType::This(name) => {
            if name.is_empty() {
                return Err(GenerationError::unmapped(ty));
            }
            format!("L{};", imports.resolve(name))
        }
    })
}

/// `(params)ret`, e.g. `(I[Z)V`.
pub fn method_descriptor<'t>(
    params: impl IntoIterator<Item = &'t IrType>,
    ret: &IrType,
    imports: &ImportMap,
) -> Result<String, GenerationError> {
    let mut d = String::from("(");
    for p in params {
        d.push_str(&type_descriptor(p, imports)?);
    }
    d.push(')');
    d.push_str(&type_descriptor(ret, imports)?);
    Ok(d)
}
