use std::path::PathBuf;

use docopt::Docopt;
use serde::Deserialize;

use lumen::lock::{index_lock, pid_alive, COMMIT_LOCK_NAME, WRITE_LOCK_NAME};
use lumen::Error;

static USAGE: &str = "
Shows whether the index locks are held and by which process.

Usage:
    lumen lock-status [options]
    lumen lock-status --help

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
    let path = PathBuf::from(args.flag_path);
    for name in &[WRITE_LOCK_NAME, COMMIT_LOCK_NAME] {
        let lock = index_lock(&path, name, false, Default::default());
        match (lock.is_locked(), lock.holder()) {
            (false, _) => println!("{}: free", name),
            (true, Some(pid)) => match pid_alive(pid) {
                Some(false) => println!("{}: stale, pid {} is not running", name, pid),
                _ => println!("{}: held by pid {}", name, pid),
            },
            (true, None) => println!("{}: held by an unknown process", name),
        }
    }
    Ok(())
}
