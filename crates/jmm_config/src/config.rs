//! jmm.toml parsing.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "jmm.toml";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub compiler: CompilerOptions,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerOptions {
    /// Absent: one slot per variable. `0`: reuse slots freely. `n`: reuse,
    /// with at most `n` slots beyond `this` and the parameters.
    pub register_allocation: Option<u32>,
    pub debug: bool,
    pub emit_ollir: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            register_allocation: None,
            debug: false,
            emit_ollir: true,
        }
    }
}

pub fn load_config(path: &Path) -> io::Result<Config> {
    let s = std::fs::read_to_string(path)?;
    toml::from_str(&s).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// `jmm.toml` in the directory of `input`, if there is one.
pub fn find_config(input: &Path) -> Option<PathBuf> {
    let dir = input.parent()?;
    let candidate = dir.join(CONFIG_FILE);
    candidate.is_file().then_some(candidate)
}

/// Contents written by `jmmc init`.
pub fn default_config_text() -> String {
    "[compiler]\n\
     # register_allocation = 0\n\
     debug = false\n\
     emit_ollir = true\n"
        .to_string()
}
