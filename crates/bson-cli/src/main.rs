//! `bson-dump` — inspect, validate, and render `.bson` files from the
//! command line.
//!
//! Examples:
//!   bson-dump a.bson
//!   bson-dump a.bson b.bson --summary
//!   cat a.bson | bson-dump - --json
//!   bson-dump a.bson --reject-dollar-keys --reject-dot-keys --require-utf8

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use yansi::{Color, Paint};

use bson::{validate, Document, ValidationFlags};

#[derive(Parser, Debug)]
#[command(name = "bson-dump", version, about = "Inspect, validate, and render BSON documents")]
struct Cli {
    /// File(s) to read, or `-` for stdin (only valid alone).
    inputs: Vec<PathBuf>,

    /// Print the document as canonical extended JSON (the default view
    /// when no other view is requested).
    #[arg(long)]
    json: bool,

    /// Print a one-line structural summary (byte length, field count).
    #[arg(long)]
    summary: bool,

    /// Run semantic validation and report pass/fail.
    #[arg(long)]
    check: bool,

    /// Under `--check`, reject keys beginning with `$`.
    #[arg(long)]
    reject_dollar_keys: bool,

    /// Under `--check`, reject keys containing `.`.
    #[arg(long)]
    reject_dot_keys: bool,

    /// Under `--check`, reject invalid UTF-8 in keys and string values.
    #[arg(long)]
    require_utf8: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    if let Err(err) = run(Cli::parse()) {
        eprintln!("{} {err:#}", "error:".paint(Color::Red).bold());
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    if cli.inputs.is_empty() {
        return Err(anyhow!("no input given; try `bson-dump a.bson` or `bson-dump - --json`"));
    }

    let use_stdin = cli.inputs.len() == 1 && cli.inputs[0] == PathBuf::from("-");
    if use_stdin {
        let bytes = read_stdin()?;
        process_one(&bytes, "<stdin>", &cli)
    } else {
        let mut saw_failure = false;
        for path in &cli.inputs {
            let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
            if let Err(err) = process_one(&bytes, &path.display().to_string(), &cli) {
                eprintln!("{} {}: {err:#}", "error:".paint(Color::Red).bold(), path.display());
                saw_failure = true;
            }
        }
        if saw_failure {
            return Err(anyhow!("one or more inputs failed"));
        }
        Ok(())
    }
}

fn read_stdin() -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    io::stdin().read_to_end(&mut buf).context("reading stdin")?;
    Ok(buf)
}

fn process_one(bytes: &[u8], name: &str, cli: &Cli) -> Result<()> {
    let doc = Document::from_bytes(bytes.to_vec()).with_context(|| format!("{name}: not a well-formed document"))?;

    if cli.summary {
        print_summary(&doc, name);
    }

    if cli.check {
        let flags = ValidationFlags {
            reject_dollar_keys: cli.reject_dollar_keys,
            reject_dot_keys: cli.reject_dot_keys,
            require_utf8: cli.require_utf8,
        };
        match validate(doc.as_bytes(), flags) {
            Ok(()) => eprintln!("{} {name}: valid", "\u{2713}".paint(Color::Green)),
            Err(err) => return Err(anyhow!("{name}: {err}")),
        }
    }

    if cli.json || (!cli.summary && !cli.check) {
        println!("{}", bson::to_json(doc.as_bytes()).with_context(|| format!("{name}: rendering"))?);
    }

    Ok(())
}

fn print_summary(doc: &Document, name: &str) {
    let title = format!("== {name} ==");
    eprintln!("{}", title.paint(Color::Cyan).bold());
    eprintln!(
        "{} bytes={}, fields={}",
        "\u{2022}".paint(Color::Blue),
        doc.len(),
        doc.count_fields()
    );
}
