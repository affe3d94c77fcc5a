use std::env;
use std::fs::File;
use std::io::{self, BufWriter};
use std::process;

use anyhow::{Context, Result};

use webrank::bloom;
use webrank::crawl::{crawl, CrawlOptions};
use webrank::fetch::{FetchEngine, TcpConnector};
use webrank::report;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::init();
    if let Err(err) = run().await {
        eprintln!("crawler: {err:#}");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    let mut args = env::args().skip(1);
    let seed = args.next().context("usage: crawler URL [OUTPUT_FILE]")?;
    let output = args.next();

    let opts = CrawlOptions::default();
    let engine = FetchEngine::new(TcpConnector, opts.fetch.clone());
    let graph = crawl(&engine, &opts, &seed).await;

    match output {
        Some(path) => {
            let file =
                File::create(&path).with_context(|| format!("failed to create {path}"))?;
            report::write_report(&mut BufWriter::new(file), &graph)
                .with_context(|| format!("failed to write {path}"))?;
        }
        None => {
            report::write_report(&mut io::stdout().lock(), &graph)
                .context("failed to write report")?;
        }
    }

    // Every filter is scoped to the crawl; anything still alive leaked.
    debug_assert_eq!(bloom::live_filters(), 0);
    Ok(())
}
