use std::io::{self, Write};
use std::path::PathBuf;

use docopt::Docopt;
use serde::{Deserialize, Serialize};

use lumen::{Error, FieldValue, IndexBuilder, Operator};

static USAGE: &str = "
Searches an index and prints hits as JSON, best first.

Usage:
    lumen search <query> [options]
    lumen search --help

Options:
    -p, --path <path>     Path of the index [default: .]
    -n, --limit <n>       Maximum number of hits to print [default: 10]
    --and                 Combine bare terms with AND
    --lenient             Search the words of a query that does not parse
    -h, --help            Show this message
";

#[derive(Deserialize)]
struct Args {
    arg_query: String,
    flag_path: String,
    flag_limit: usize,
    flag_and: bool,
    flag_lenient: bool,
}

#[derive(Serialize)]
struct PrintedHit<'a> {
    uri: &'a str,
    score: f32,
    fields: Vec<(&'a str, &'a FieldValue)>,
}

pub fn run(argv: &[&str]) -> Result<(), Error> {
    let args: Args = Docopt::new(USAGE)
        .and_then(|d| d.argv(argv.iter().copied()).deserialize())
        .unwrap_or_else(|e| e.exit());
    let mut builder = IndexBuilder::new();
    if args.flag_and {
        builder = builder.default_operator(Operator::And);
    }
    let index = builder.open(PathBuf::from(args.flag_path))?;
    let searcher = index.searcher()?;
    let query = if args.flag_lenient {
        searcher.parser().parse_lenient(&args.arg_query)
    } else {
        searcher.parser().parse(&args.arg_query)?
    };
    let hits = searcher.search(&query)?;
    eprintln!("{} hits for {}", hits.total(), query);
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for hit in hits.take(args.flag_limit) {
        let hit = hit?;
        let printed = PrintedHit {
            uri: &hit.uri,
            score: hit.score,
            fields: hit
                .document
                .fields
                .iter()
                .map(|(name, value)| (name.as_str(), value))
                .collect(),
        };
        serde_json::to_writer(&mut out, &printed)?;
        writeln!(out).map_err(Error::from)?;
    }
    Ok(())
}
