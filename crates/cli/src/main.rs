mod spec;
mod tree;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Result, bail};
use argtree::{ArgParser, Bind, ParseError, ParseResult};
use tracing_subscriber::{EnvFilter, fmt};

use crate::tree::MatchTree;

const ABOUT: &str = "Parse command-line tokens against a JSON spec and report what matched.";

/// Exit status for token lists that fail to parse.
const PARSE_FAILURE: u8 = 2;

#[derive(Bind, Default)]
struct Cli {
    /// Log parser decisions to stderr
    #[arg(alias = "v")]
    verbose: bool,

    #[arg(subcommand, help = "Parse tokens against a spec and print the matches as JSON")]
    parse: ParseArgs,

    #[arg(subcommand, help = "Print the help text a spec describes")]
    usage: UsageArgs,

    #[arg(subcommand, help = "Validate a spec and print it normalized")]
    schema: SchemaArgs,
}

#[derive(Bind, Default)]
struct ParseArgs {
    /// JSON spec describing the command line
    #[arg(alias = "s", required, metavar = "FILE")]
    spec: PathBuf,

    /// Tokens to parse, after `--`
    #[arg(name = "-", rest, metavar = "TOKENS")]
    tokens: Vec<String>,
}

#[derive(Bind, Default)]
struct UsageArgs {
    /// JSON spec describing the command line
    #[arg(alias = "s", required, metavar = "FILE")]
    spec: PathBuf,

    /// Subcommand path to describe
    #[arg(positional)]
    path: Vec<String>,
}

#[derive(Bind, Default)]
struct SchemaArgs {
    /// JSON spec describing the command line
    #[arg(alias = "s", required, metavar = "FILE")]
    spec: PathBuf,
}

fn main() -> Result<ExitCode> {
    // A first pass only picks up `--verbose`, so the real one is logged.
    let mut early = Cli::default();
    let _ = parse_cli(&mut early);
    init_tracing(early.verbose);

    let mut cli = Cli::default();
    let (parsed, command, usage) = parse_cli(&mut cli);

    match parsed {
        Ok(()) => {}
        Err(ParseError::HelpRequested(text)) => {
            print!("{text}");
            return Ok(ExitCode::SUCCESS);
        }
        Err(err) => {
            eprintln!("error: {err}");
            return Ok(ExitCode::from(PARSE_FAILURE));
        }
    }

    match command.as_deref() {
        Some("parse") => parse_command(&cli.parse),
        Some("usage") => usage_command(&cli.usage),
        Some("schema") => schema_command(&cli.schema),
        _ => {
            eprintln!("error: no command given");
            eprint!("{usage}");
            Ok(ExitCode::from(PARSE_FAILURE))
        }
    }
}

/// Parse the process arguments into `cli`, returning the outcome, the chosen
/// command and the usage line.
fn parse_cli(cli: &mut Cli) -> (ParseResult<()>, Option<String>, String) {
    let mut parser = ArgParser::with_help("argtree").description(ABOUT);
    cli.bind(&mut parser);

    let parsed = parser.parse_args();
    let command = parser.selected_name().map(str::to_string);
    (parsed, command, parser.usage())
}

fn parse_command(args: &ParseArgs) -> Result<ExitCode> {
    tracing::debug!("executing parse command");

    let schema = spec::load(&args.spec)?;
    let tree = MatchTree::new(&schema);
    let mut parser = tree.parser(&schema)?;

    match parser.parse(args.tokens.iter().map(String::as_str)) {
        Ok(()) => {
            let report = tree.report(&parser);
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(ParseError::HelpRequested(text)) => {
            print!("{text}");
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            eprintln!("error: {err}");
            Ok(ExitCode::from(PARSE_FAILURE))
        }
    }
}

fn usage_command(args: &UsageArgs) -> Result<ExitCode> {
    tracing::debug!("executing usage command");

    let schema = spec::load(&args.spec)?;
    let tree = MatchTree::new(&schema);
    let parser = tree.parser(&schema)?;

    let mut target = &parser;
    for name in &args.path {
        let Some(child) = target.subcommand(name) else {
            bail!("{} has no subcommand {name:?}", target.prog());
        };
        target = child;
    }
    print!("{}", target.help());
    Ok(ExitCode::SUCCESS)
}

fn schema_command(args: &SchemaArgs) -> Result<ExitCode> {
    tracing::debug!("executing schema command");

    let schema = spec::load(&args.spec)?;
    let tree = MatchTree::new(&schema);
    let parser = tree.parser(&schema)?;
    println!("{}", serde_json::to_string_pretty(&parser.schema())?);
    Ok(ExitCode::SUCCESS)
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
