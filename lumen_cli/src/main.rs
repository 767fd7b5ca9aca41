use std::env;
use std::process;

use docopt::Docopt;
use log::error;
use serde::Deserialize;

mod cmd;

static USAGE: &str = "
Command line access to a lumen index.

Usage:
    lumen <command> [<args>...]
    lumen --help

Commands:
    create        Create an empty index
    index         Index JSON documents read from standard input
    search        Search and print ranked hits
    delete        Delete documents by uri or term
    list          List the segments of the current generation
    force-merge   Merge all segments into one
    lock-status   Show who holds the index locks

Options:
    -h, --help    Show this message
";

#[derive(Deserialize)]
struct Args {
    arg_command: String,
}

fn main() {
    env_logger::init();
    let args: Args = Docopt::new(USAGE)
        .and_then(|d| d.options_first(true).deserialize())
        .unwrap_or_else(|e| e.exit());
    let argv: Vec<String> = env::args().collect();
    let argv: Vec<&str> = argv.iter().map(String::as_str).collect();
    let result = match args.arg_command.as_str() {
        "create" => cmd::create::run(&argv),
        "index" => cmd::index::run(&argv),
        "search" => cmd::search::run(&argv),
        "delete" => cmd::delete::run(&argv),
        "list" => cmd::list::run(&argv),
        "force-merge" => cmd::force_merge::run(&argv),
        "lock-status" => cmd::lock_status::run(&argv),
        other => {
            eprintln!("Unknown command {:?}.\n{}", other, USAGE);
            process::exit(2);
        }
    };
    if let Err(e) = result {
        error!("{} failed: {}", args.arg_command, e);
        eprintln!("error: {}", e);
        process::exit(1);
    }
}
