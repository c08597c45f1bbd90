use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    process::ExitCode,
};

use brpc::{
    checker::Analysis,
    codegen, compiler, lexer,
    parser::ParseOptions,
    util::{
        fmt::{tree, Context, Show},
        intern::Names,
    },
};
use clap::Parser;
use thiserror::Error;

/// Compiles a brpc schema into a Rust module
#[derive(Parser)]
#[clap(version, about)]
struct Cli {
    /// Path to the schema to compile
    #[clap(name = "INPUT")]
    input: PathBuf,
    /// Package name of the generated module
    ///
    /// Defaults to the schema's `package` property, then to the input file
    /// stem.
    #[clap(long)]
    package: Option<String>,
    /// Path of the generated module, printed to stdout when absent
    #[clap(long, short)]
    output: Option<PathBuf>,
    /// Reject type names not starting with an uppercase letter and field
    /// names not starting with a lowercase one
    #[clap(long)]
    strict_identifiers: bool,
    /// Print the lexed tokens to stderr
    #[clap(long)]
    dump_tokens: bool,
    /// Print the syntax tree to stderr, even if there are errors
    #[clap(long)]
    dump_ast: bool,
}

#[derive(Debug, Error)]
enum Failure {
    #[error("could not compile {file} due to {count} previous error(s)")]
    Diagnostics { file: String, count: usize },
    #[error("failed to read {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to write {dest}: {source}")]
    Write { dest: String, source: io::Error },
}

impl Failure {
    fn exit_code(&self) -> ExitCode {
        match self {
            Failure::Diagnostics { .. } => ExitCode::from(1),
            Failure::Read { .. } | Failure::Write { .. } => ExitCode::from(2),
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(failure) => {
            eprintln!("error: {failure}");
            failure.exit_code()
        }
    }
}

fn run(cli: &Cli) -> Result<(), Failure> {
    let src = fs::read_to_string(&cli.input).map_err(|source| Failure::Read {
        path: cli.input.clone(),
        source,
    })?;
    let file = cli.input.display().to_string();

    if cli.dump_tokens {
        dump_tokens(&src);
    }

    let options = ParseOptions {
        strict_identifiers: cli.strict_identifiers,
    };
    let names = &mut Names::new();
    let result = compiler::compile(&src, names, options);

    if cli.dump_ast {
        let (Ok(analysis) | Err((analysis, _))) = &result;
        eprint!("{}", tree::print_schema_string(names, &analysis.schema));
    }

    let analysis = match result {
        Ok(analysis) => analysis,
        Err((_, diagnostics)) => {
            let ctx = Context {
                names,
                file: &file,
            };
            for diagnostic in &diagnostics {
                eprintln!("{:#}", diagnostic.display(&ctx));
            }
            return Err(Failure::Diagnostics {
                file,
                count: diagnostics.len(),
            });
        }
    };

    let package = match &cli.package {
        Some(package) => package.clone(),
        None => package_name(&analysis, names, &cli.input),
    };
    // Generated fully before anything is written.
    let code = codegen::generate(&analysis, names, &package);

    match &cli.output {
        Some(path) => fs::write(path, code).map_err(|source| Failure::Write {
            dest: format!("{path:?}"),
            source,
        }),
        None => io::stdout()
            .lock()
            .write_all(code.as_bytes())
            .map_err(|source| Failure::Write {
                dest: "stdout".into(),
                source,
            }),
    }
}

fn package_name(analysis: &Analysis, names: &Names, input: &Path) -> String {
    names
        .lookup("package")
        .and_then(|name| analysis.properties.get(name))
        .map(str::to_owned)
        .or_else(|| {
            input
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
        })
        .unwrap_or_default()
}

fn dump_tokens(src: &str) {
    let mut stderr = io::stderr().lock();
    for token in lexer::lex_in_new(src) {
        _ = writeln!(
            stderr,
            "{} {:?} {:?}",
            token.span(),
            token.kind,
            token.lexeme(src)
        );
    }
}
