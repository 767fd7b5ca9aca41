use std::path::PathBuf;

use docopt::Docopt;
use serde::Deserialize;

use lumen::{Error, IndexBuilder, IndexConfig};

static USAGE: &str = "
Creates an empty index.

Usage:
    lumen create [options]
    lumen create --help

Options:
    -p, --path <path>       Path of the index [default: .]
    -c, --config <file>     JSON file with index settings
    -h, --help              Show this message
";

#[derive(Deserialize)]
struct Args {
    flag_path: String,
    flag_config: Option<String>,
}

pub fn run(argv: &[&str]) -> Result<(), Error> {
    let args: Args = Docopt::new(USAGE)
        .and_then(|d| d.argv(argv.iter().copied()).deserialize())
        .unwrap_or_else(|e| e.exit());
    let config = match args.flag_config {
        Some(file) => IndexConfig::from_json_file(&PathBuf::from(file))?,
        None => IndexConfig::default(),
    };
    let index = IndexBuilder::with_config(config).create(PathBuf::from(args.flag_path))?;
    eprintln!("Created index at {:?}", index.path());
    Ok(())
}
