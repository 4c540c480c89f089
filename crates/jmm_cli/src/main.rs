//! jmmc: compile front-end units (JSON) to OLLIR and Jasmin.

use clap::{Args, Parser, Subcommand};
use jmm_compiler::CompilerOptions;
use jmm_config::{default_config_text, find_config, load_config, CONFIG_FILE};
use jmm_syntax::CompilationUnit;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "jmmc")]
#[command(about = "Java-- compiler back end")]
struct Cli {
    /// Debug logging (same as JMM_DEBUG=1)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write <Class>.j (and <Class>.ollir) for a unit
    Build {
        #[command(flatten)]
        unit: UnitArgs,
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// Do not write the .ollir file
        #[arg(long)]
        no_ollir: bool,
    },
    /// Print the IR text of a unit
    Ollir {
        #[command(flatten)]
        unit: UnitArgs,
    },
    /// Print the Jasmin assembly of a unit
    Jasmin {
        #[command(flatten)]
        unit: UnitArgs,
    },
    /// Print per-instruction def/use/in/out sets
    Liveness {
        #[command(flatten)]
        unit: UnitArgs,
    },
    /// Write a default jmm.toml
    Init {
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
}

#[derive(Args)]
struct UnitArgs {
    /// Serialized compilation unit (tree, symbol table, reports)
    path: PathBuf,
    #[arg(long)]
    config: Option<PathBuf>,
    /// Reuse local slots, at most N beyond `this` and parameters (0: no cap)
    #[arg(short = 'r', long = "registers")]
    registers: Option<u32>,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn init_logging(debug: bool) {
    let mut builder = env_logger::Builder::from_default_env();
    if debug || std::env::var("JMM_DEBUG").is_ok() {
        builder.filter_level(log::LevelFilter::Debug);
    }
    let _ = builder.try_init();
}

fn run(cli: Cli) -> Result<(), String> {
    match cli.command {
        Commands::Build {
            unit,
            out_dir,
            no_ollir,
        } => {
            let mut options = resolve_options(&unit)?;
            if no_ollir {
                options.emit_ollir = false;
            }
            init_logging(cli.verbose || options.debug);
            let written = cmd_build(&unit.path, out_dir.as_deref(), &options)?;
            for p in written {
                println!("Wrote {}", p.display());
            }
            Ok(())
        }
        Commands::Ollir { unit } => {
            let options = resolve_options(&unit)?;
            init_logging(cli.verbose || options.debug);
            let class =
                jmm_compiler::lower_unit(&read_unit(&unit.path)?).map_err(|e| e.to_string())?;
            print!("{}", jmm_compiler::ollir::print_class(&class));
            Ok(())
        }
        Commands::Jasmin { unit } => {
            let options = resolve_options(&unit)?;
            init_logging(cli.verbose || options.debug);
            let artifacts = jmm_compiler::compile_unit(&read_unit(&unit.path)?, &options)
                .map_err(|e| e.to_string())?;
            print!("{}", artifacts.jasmin);
            Ok(())
        }
        Commands::Liveness { unit } => {
            let options = resolve_options(&unit)?;
            init_logging(cli.verbose || options.debug);
            let report =
                jmm_compiler::liveness_report(&read_unit(&unit.path)?).map_err(|e| e.to_string())?;
            print!("{}", report);
            Ok(())
        }
        Commands::Init { dir } => {
            init_logging(cli.verbose);
            let path = cmd_init(&dir)?;
            println!("Created {}", path.display());
            Ok(())
        }
    }
}

/// Options from `--config`, else `jmm.toml` beside the unit, then flags on top.
fn resolve_options(unit: &UnitArgs) -> Result<CompilerOptions, String> {
    let config_path = unit.config.clone().or_else(|| find_config(&unit.path));
    let mut options = match config_path {
        Some(p) => {
            load_config(&p)
                .map_err(|e| format!("{}: {}", p.display(), e))?
                .compiler
        }
        None => CompilerOptions::default(),
    };
    if unit.registers.is_some() {
        options.register_allocation = unit.registers;
    }
    Ok(options)
}

fn read_unit(path: &Path) -> Result<CompilationUnit, String> {
    let text = std::fs::read_to_string(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    CompilationUnit::from_json(&text).map_err(|e| format!("{}: {}", path.display(), e))
}

/// Compile `path` and write the artifacts; returns the files written.
fn cmd_build(
    path: &Path,
    out_dir: Option<&Path>,
    options: &CompilerOptions,
) -> Result<Vec<PathBuf>, String> {
    let unit = read_unit(path)?;
    for r in &unit.reports {
        eprintln!("{}", r);
    }
    let artifacts = jmm_compiler::compile_unit(&unit, options).map_err(|e| e.to_string())?;

    let out_dir = match out_dir {
        Some(d) => d.to_path_buf(),
        None => path.parent().unwrap_or(Path::new(".")).to_path_buf(),
    };
    std::fs::create_dir_all(&out_dir).map_err(|e| e.to_string())?;

    let mut written = Vec::new();
    let j = out_dir.join(format!("{}.j", artifacts.class_name));
    std::fs::write(&j, &artifacts.jasmin).map_err(|e| e.to_string())?;
    written.push(j);
    if options.emit_ollir {
        let o = out_dir.join(format!("{}.ollir", artifacts.class_name));
        std::fs::write(&o, &artifacts.ollir).map_err(|e| e.to_string())?;
        written.push(o);
    }
    Ok(written)
}

fn cmd_init(dir: &Path) -> Result<PathBuf, String> {
    let path = dir.join(CONFIG_FILE);
    if path.exists() {
        return Err(format!("{} already exists", path.display()));
    }
    std::fs::create_dir_all(dir).map_err(|e| e.to_string())?;
    std::fs::write(&path, default_config_text()).map_err(|e| e.to_string())?;
    Ok(path)
}
