use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use miette::{IntoDiagnostic, Result, WrapErr};
use thiserror::Error;
use tracing::debug;
use vfr::{
    Compilation, CompileOptions, SequentialStrings, StringResolver, StringTable, compile_source,
    render_diagnostics, render_error,
};
use vfr_core::strings::StringTableError;

/// vfrc - compile VFR form descriptions into an IFR Form Package
#[derive(Parser, Debug)]
#[command(name = "vfrc")]
#[command(about = "Compile VFR source into a UEFI Form Package", long_about = None)]
struct Args {
    /// VFR source file
    input: PathBuf,

    /// Where to write the package (stdout if omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Bin)]
    format: Format,

    /// Name of the C array for `--format c` (default: `<input stem>Bin`)
    #[arg(long)]
    array_name: Option<String>,

    /// String table of `NAME = ID` lines; without one, names get
    /// sequential ids from 1
    #[arg(long)]
    strings: Option<PathBuf>,

    /// Write the symbol map (forms, questions, rules, stores) to this file
    #[arg(long)]
    symbols: Option<PathBuf>,

    /// Print a record listing to stdout. The package is then only written
    /// when `--output` is given.
    #[arg(long)]
    listing: bool,

    /// Accept the Framework dialect, where a suppressif/grayoutif pair
    /// shares one endif
    #[arg(long)]
    compatible_framework: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    /// Raw Form Package bytes
    Bin,
    /// EDK II style C byte array
    C,
}

#[derive(Debug, Error, miette::Diagnostic)]
enum CliError {
    #[error("{path}: compilation failed")]
    #[diagnostic(code(vfrc::compile), help("see the diagnostics above"))]
    Compile { path: String },

    #[error("{path}: invalid string table")]
    #[diagnostic(code(vfrc::strings))]
    Strings {
        path: String,
        #[source]
        source: StringTableError,
    },
}

fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    // RUST_LOG controls the level; default to WARN if not set
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn compile(
    path: &str,
    source: &str,
    strings: &dyn StringResolver,
    options: CompileOptions,
) -> Result<Compilation, CliError> {
    match compile_source(source, strings, options) {
        Ok(compiled) => {
            if !compiled.warnings.is_empty() {
                render_diagnostics(path, source, &compiled.warnings, &mut std::io::stderr(), true)
                    .ok();
            }
            Ok(compiled)
        }
        Err(e) => {
            render_error(&e, path);
            Err(CliError::Compile {
                path: path.to_string(),
            })
        }
    }
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("reading {}", path.display()))
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging();

    let source = read(&args.input)?;
    let path = args.input.display().to_string();
    let options = CompileOptions {
        framework_compatible: args.compatible_framework,
        ..CompileOptions::default()
    };

    let compiled = match &args.strings {
        Some(strings_path) => {
            let table = StringTable::parse(&read(strings_path)?).map_err(|source| {
                CliError::Strings {
                    path: strings_path.display().to_string(),
                    source,
                }
            })?;
            debug!(strings = table.len(), "loaded string table");
            compile(&path, &source, &table, options)?
        }
        None => compile(&path, &source, &SequentialStrings::new(), options)?,
    };
    debug!(
        bytes = compiled.package.len(),
        warnings = compiled.warnings.len(),
        "compiled {}",
        path
    );

    if let Some(symbols_path) = &args.symbols {
        fs::write(symbols_path, compiled.symbols.to_string())
            .into_diagnostic()
            .wrap_err_with(|| format!("writing {}", symbols_path.display()))?;
    }

    if args.listing {
        print!("{}", compiled.listing().into_diagnostic()?);
    }

    let bytes = match args.format {
        Format::Bin => compiled.package.clone(),
        Format::C => {
            let name = args.array_name.clone().unwrap_or_else(|| {
                let stem = args
                    .input
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("Vfr");
                format!("{}Bin", stem)
            });
            compiled.to_c_array(&name).into_bytes()
        }
    };

    match &args.output {
        Some(out) => fs::write(out, &bytes)
            .into_diagnostic()
            .wrap_err_with(|| format!("writing {}", out.display()))?,
        None if !args.listing => std::io::stdout().write_all(&bytes).into_diagnostic()?,
        None => {}
    }

    Ok(())
}
