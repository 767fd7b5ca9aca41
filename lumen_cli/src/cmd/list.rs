use std::path::PathBuf;

use docopt::Docopt;
use serde::Deserialize;

use lumen::{Error, IndexBuilder};

static USAGE: &str = "
Lists the segments of the current generation.

Usage:
    lumen list [options]
    lumen list --help

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
    let reader = index.reader()?;
    println!("generation {}", reader.version());
    reader.with_segments(|segments| {
        for segment in segments {
            let entry = segment.entry();
            println!(
                "{}\tdocs: {}\tlive: {}\tdeletions: {}",
                entry.name,
                segment.max_doc(),
                segment.num_docs(),
                entry.del_gen
            );
        }
        Ok(())
    })?;
    println!("total live documents: {}", reader.num_docs()?);
    Ok(())
}
