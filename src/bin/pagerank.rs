use std::env;
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::process;

use anyhow::{Context, Result};

use webrank::rank;
use webrank::report;

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("pagerank: {err:#}");
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let mut args = env::args().skip(1);
    let input = args
        .next()
        .context("usage: pagerank CRAWLER_OUTPUT [PAGERANK_OUTPUT]")?;
    let output = args.next();

    let text =
        fs::read_to_string(&input).with_context(|| format!("failed to read {input}"))?;
    let report = report::parse(&text).with_context(|| format!("failed to parse {input}"))?;

    let ranks = rank::pagerank(&report.edges);
    let ranked = rank::ranked_urls(&report.urls, &ranks);

    match output {
        Some(path) => {
            let file =
                File::create(&path).with_context(|| format!("failed to create {path}"))?;
            rank::write_ranked(&mut BufWriter::new(file), &ranked)
                .with_context(|| format!("failed to write {path}"))?;
        }
        None => {
            rank::write_ranked(&mut io::stdout().lock(), &ranked)
                .context("failed to write ranks")?;
        }
    }
    Ok(())
}
