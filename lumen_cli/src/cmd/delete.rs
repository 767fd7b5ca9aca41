use std::path::PathBuf;

use docopt::Docopt;
use serde::Deserialize;

use lumen::{Error, IndexBuilder, Term};

static USAGE: &str = "
Deletes documents from an index.

Usage:
    lumen delete [options] [<uri>...]
    lumen delete --help

Options:
    -p, --path <path>    Path of the index [default: .]
    -t, --term <term>    Delete every document containing field:value
    -h, --help                  Show this message
";

#[derive(Deserialize)]
struct Args {
    arg_uri: Vec<String>,
    flag_path: String,
    flag_term: Option<String>,
}

pub fn run(argv: &[&str]) -> Result<(), Error> {
    let args: Args = Docopt::new(USAGE)
        .and_then(|d| d.argv(argv.iter().copied()).deserialize())
        .unwrap_or_else(|e| e.exit());
    let index = IndexBuilder::new().open(PathBuf::from(args.flag_path))?;
    let writer = index.writer();
    let mut deleted = 0;
    if let Some(term) = args.flag_term {
        deleted += writer.delete_documents(parse_term(&term)?)?;
    }
    for uri in &args.arg_uri {
        deleted += writer.delete_document(uri)?;
    }
    writer.close()?;
    eprintln!("Deleted {} documents", deleted);
    Ok(())
}

fn parse_term(term: &str) -> Result<Term, Error> {
    match term.find(':') {
        Some(i) => Ok(Term::new(&term[..i], &term[i + 1..])),
        None => Err(Error::InvalidArgument(format!(
            "expected field:value, got {:?}",
            term
        ))),
    }
}
