//! Compiler configuration: `jmm.toml` next to the unit, or an explicit file.

mod config;

pub use config::{default_config_text, find_config, load_config, CompilerOptions, Config, CONFIG_FILE};
