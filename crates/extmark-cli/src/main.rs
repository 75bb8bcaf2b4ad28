mod config;

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::Context;
use clap::Parser;
use log::LevelFilter;

use config::{Config, OutputFormat};
use extmark_core::{
    DefaultFetcher, Diagnostic, Diagnostics, Flavour, IncludeOptions, Includer, emit_html,
    emit_html_sanitized, emit_markdown, expand_directives, flavour_of,
};

#[derive(Parser)]
#[command(
    name = "extmark",
    version,
    about = "Expand `external` include directives in a Markdown document"
)]
struct Cli {
    /// Host document; read from stdin when omitted
    input: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Clean HTML output against an allow-list
    #[arg(long)]
    sanitized: bool,

    /// Directory that relative include paths resolve against
    #[arg(long, value_name = "DIR")]
    base_dir: Option<PathBuf>,

    /// Refuse http(s) includes
    #[arg(long)]
    no_remote: bool,

    /// Report diagnostics on stderr
    #[arg(long, value_enum, value_name = "MODE")]
    diagnostics: Option<DiagnosticsMode>,

    /// Config file (default: extmark.toml next to the input)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// More log output; repeat for more
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum DiagnosticsMode {
    Json,
    Pretty,
}

/// Effective options after merging the config file under the flags.
#[derive(Debug)]
struct Settings {
    base_dir: PathBuf,
    remote: bool,
    sanitize: bool,
    include_heading: bool,
    format: OutputFormat,
}

impl Settings {
    fn resolve(cli: &Cli, config: Config) -> Self {
        let base_dir = cli
            .base_dir
            .clone()
            .or(config.base_dir)
            .or_else(|| {
                cli.input
                    .as_deref()
                    .and_then(Path::parent)
                    .map(Path::to_path_buf)
            })
            .unwrap_or_default();
        Self {
            base_dir,
            remote: !cli.no_remote && config.remote.unwrap_or(true),
            sanitize: cli.sanitized || config.sanitize.unwrap_or(false),
            include_heading: config.include_heading.unwrap_or(true),
            format: cli.format.or(config.format).unwrap_or_default(),
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.diagnostics.is_some());

    match run(&cli) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(err) => {
            eprintln!("error: {err:#}");
            process::exit(1);
        }
    }
}

/// Diagnostics are mirrored to the log, so the log stays quiet by default
/// when a structured report was requested.
fn init_logging(verbose: u8, reporting: bool) {
    let level = match verbose {
        0 if reporting => LevelFilter::Off,
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .parse_default_env()
        .init();
}

/// Returns whether the run finished without error diagnostics.
fn run(cli: &Cli) -> anyhow::Result<bool> {
    let source = read_input(cli.input.as_deref())?;
    let config = load_config(cli)?;
    let settings = Settings::resolve(cli, config);
    log::debug!("{settings:?}");

    let fetcher = DefaultFetcher::new(&settings.base_dir, settings.remote);
    let includer = Includer::new(fetcher).with_options(IncludeOptions {
        include_heading: settings.include_heading,
        ..IncludeOptions::default()
    });
    let flavour = cli
        .input
        .as_deref()
        .and_then(|path| flavour_of(&path.to_string_lossy()))
        .unwrap_or(Flavour::Markdown);

    let mut diagnostics = Diagnostics::new();
    let document = expand_directives(&source, flavour, &includer, &mut diagnostics);

    if let Some(mode) = cli.diagnostics {
        emit_diagnostics(diagnostics.as_slice(), mode)?;
    }

    let output = match settings.format {
        OutputFormat::Html if settings.sanitize => emit_html_sanitized(&document.blocks),
        OutputFormat::Html => emit_html(&document.blocks),
        OutputFormat::Markdown => emit_markdown(&document.blocks),
    };
    print!("{output}");

    Ok(!diagnostics.has_errors())
}

fn read_input(input: Option<&Path>) -> anyhow::Result<String> {
    match input {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read stdin")?;
            Ok(buffer)
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let config = match (&cli.config, &cli.input) {
        (Some(path), _) => Some(Config::load(path)?),
        (None, Some(input)) => Config::beside(input)?,
        (None, None) => None,
    };
    Ok(config.unwrap_or_default())
}

fn emit_diagnostics(diagnostics: &[Diagnostic], mode: DiagnosticsMode) -> anyhow::Result<()> {
    match mode {
        DiagnosticsMode::Json => {
            eprintln!("{}", serde_json::to_string_pretty(diagnostics)?);
        }
        DiagnosticsMode::Pretty => {
            for diagnostic in diagnostics {
                eprintln!("{}", diagnostic_to_pretty(diagnostic));
            }
        }
    }
    Ok(())
}

fn diagnostic_to_pretty(diagnostic: &Diagnostic) -> String {
    let severity = diagnostic.severity.label();
    match diagnostic.range {
        Some(range) => format!(
            "{}:{}:{} {} {}",
            range.start.line + 1,
            range.start.character + 1,
            severity,
            diagnostic.code,
            diagnostic.message
        ),
        None => format!("{} {} {}", severity, diagnostic.code, diagnostic.message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("extmark").chain(args.iter().copied()))
            .expect("valid arguments")
    }

    #[test]
    fn flags_override_config() {
        let cli = cli(&["--format", "html", "--sanitized", "--no-remote", "doc/book.md"]);
        let config = Config {
            remote: Some(true),
            sanitize: Some(false),
            format: Some(OutputFormat::Markdown),
            ..Config::default()
        };
        let settings = Settings::resolve(&cli, config);
        assert_eq!(settings.format, OutputFormat::Html);
        assert!(settings.sanitize);
        assert!(!settings.remote);
        assert_eq!(settings.base_dir, PathBuf::from("doc"));
    }

    #[test]
    fn config_fills_unset_flags() {
        let cli = cli(&["book.md"]);
        let config = Config {
            base_dir: Some(PathBuf::from("/srv/parts")),
            include_heading: Some(false),
            format: Some(OutputFormat::Markdown),
            ..Config::default()
        };
        let settings = Settings::resolve(&cli, config);
        assert_eq!(settings.base_dir, PathBuf::from("/srv/parts"));
        assert!(!settings.include_heading);
        assert_eq!(settings.format, OutputFormat::Markdown);
        assert!(settings.remote);
    }

    #[test]
    fn pretty_lines_are_one_based() {
        use extmark_core::{DiagnosticSeverity, Position, Range};
        let diagnostic = Diagnostic::new(
            DiagnosticSeverity::Error,
            extmark_core::E_TARGET_ORPHAN,
            "parser",
            "orphan",
        )
        .with_range(Range {
            start: Position {
                line: 2,
                character: 0,
            },
            end: Position {
                line: 2,
                character: 4,
            },
        });
        assert_eq!(
            diagnostic_to_pretty(&diagnostic),
            "3:1:error E_TARGET_ORPHAN orphan"
        );
    }
}
