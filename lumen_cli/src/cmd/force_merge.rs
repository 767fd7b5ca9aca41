use std::path::PathBuf;

use docopt::Docopt;
use serde::Deserialize;

use lumen::{Error, IndexBuilder};

static USAGE: &str = "
Merges all segments of an index into one, purging deleted documents.

Usage:
    lumen force-merge [options]
    lumen force-merge --help

Options:
    -p, --path <path>    Path of the index [default: .]
    -h, --help           Show this message
";

#[derive(Deserialize)]
struct Args {
    flag_path: String,
}

pub fn run(argv: &[&str]) -> Result<(), Error> {
    let args: Args = Docopt::new(USAGE)
        .and_then(|d| d.argv(argv.iter().copied()).deserialize())
        .unwrap_or_else(|e| e.exit());
    let index = IndexBuilder::new().open(PathBuf::from(args.flag_path))?;
    index.writer().force_merge()
}
