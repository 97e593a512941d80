//! `takoc` — a thin development CLI around [`tako::compile`].
//!
//! Not part of the core: it is the one place in this crate that touches a
//! filesystem, implementing [`tako::SourceProvider`] by resolving import
//! specifiers as paths relative to the entry file's directory. Gated
//! behind the `cli` feature so the library target itself stays free of
//! `clap`/`log` dependencies (see `SPEC_FULL.md` §1, "Logging").

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use tako::{compile, Diagnostic, Severity, SourceProvider};

#[derive(Parser, Debug)]
#[command(author, version, about = "Compile a TakoMusic source file to IR JSON", long_about = None)]
struct Args {
    /// Path to the entry `.tako` source file.
    input_file: PathBuf,

    /// Print the IR document as pretty-printed JSON instead of compact.
    #[arg(long)]
    pretty: bool,
}

/// Resolves non-`std:` import specifiers as file paths relative to the
/// directory of whichever file imported them.
struct FileSystemProvider {
    root: PathBuf,
}

impl SourceProvider for FileSystemProvider {
    fn load(&self, specifier: &str) -> Option<(String, String)> {
        let path = self.root.join(specifier);
        let source = fs::read_to_string(&path).ok()?;
        Some((source, path.to_string_lossy().into_owned()))
    }
}

fn print_diagnostic(d: &Diagnostic) {
    match d.severity {
        Severity::Error => log::error!("{}", d),
        Severity::Warning => log::warn!("{}", d),
        Severity::Info => log::info!("{}", d),
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let source = match fs::read_to_string(&args.input_file) {
        Ok(text) => text,
        Err(err) => {
            log::error!("failed to read {}: {}", args.input_file.display(), err);
            std::process::exit(1);
        }
    };

    let root = args.input_file.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
    let provider = FileSystemProvider { root };

    let outcome = compile(&source, &provider);
    for diagnostic in &outcome.diagnostics {
        print_diagnostic(diagnostic);
    }

    match outcome.ir {
        Some(doc) => {
            let json = if args.pretty {
                serde_json::to_string_pretty(&doc)
            } else {
                serde_json::to_string(&doc)
            }
            .expect("IR document is always serializable");
            println!("{}", json);
        }
        None => {
            log::error!("compilation failed with {} diagnostic(s)", outcome.diagnostics.len());
            std::process::exit(1);
        }
    }
}
