use std::collections::BTreeMap;
use std::io;
use std::io::BufReader;
use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Utc};
use docopt::Docopt;
use serde::Deserialize;

use lumen::{Document, Error, IndexBuilder};

static USAGE: &str = "
Indexes JSON documents from standard input, one object per document:

    {\"uri\": \"file:///a.txt\", \"text\": {\"title\": \"...\"},
     \"keyword\": {\"mime\": \"text/plain\"},
     \"date\": {\"modified\": \"2024-03-01T12:00:00Z\"},
     \"number\": {\"size\": 1024}}

Documents replace earlier documents with the same uri.

Usage:
    lumen index [options]
    lumen index --help

Options:
    -p, --path <path>    Path of the index [default: .]
    -v, --verbose        Report progress
    -h, --help           Show this message
";

#[derive(Deserialize)]
struct Args {
    flag_path: String,
    flag_verbose: bool,
}

#[derive(Deserialize)]
struct JsonDoc {
    uri: String,
    #[serde(default)]
    text: BTreeMap<String, String>,
    #[serde(default)]
    keyword: BTreeMap<String, String>,
    #[serde(default)]
    date: BTreeMap<String, DateTime<Utc>>,
    #[serde(default)]
    number: BTreeMap<String, i64>,
}

impl JsonDoc {
    fn into_document(self) -> Document {
        let mut doc = Document::new(self.uri);
        for (name, value) in self.text {
            doc = doc.text(name, value);
        }
        for (name, value) in self.keyword {
            doc = doc.keyword(name, value);
        }
        for (name, value) in self.date {
            doc = doc.date(name, value);
        }
        for (name, value) in self.number {
            doc = doc.number(name, value);
        }
        doc
    }
}

pub fn run(argv: &[&str]) -> Result<(), Error> {
    let args: Args = Docopt::new(USAGE)
        .and_then(|d| d.argv(argv.iter().copied()).deserialize())
        .unwrap_or_else(|e| e.exit());
    let index = IndexBuilder::new().open(PathBuf::from(args.flag_path))?;
    let writer = index.writer();
    let start = Instant::now();
    let stream =
        serde_json::Deserializer::from_reader(BufReader::new(io::stdin())).into_iter::<JsonDoc>();
    let mut count = 0u64;
    for doc in stream {
        let doc = doc?.into_document();
        writer.delete_document(doc.uri())?;
        writer.add_document(doc)?;
        count += 1;
        if args.flag_verbose && count % 10_000 == 0 {
            eprintln!("Indexed: {} took: {:?}", count, start.elapsed());
        }
    }
    writer.close()?;
    if args.flag_verbose {
        eprintln!("Indexing {} documents took: {:?}", count, start.elapsed());
    }
    Ok(())
}
