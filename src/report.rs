//! The crawler's two-block text report.
//!
//! Block 1 lists `<index> <url>` in URL-sort order; a blank line separates
//! it from block 2, which lists `<src> <dst>` edges in insertion order.
//! Index fields are left-justified to width 3.

use std::collections::BTreeMap;
use std::io::{self, Write};

use anyhow::{Context, Result};

use crate::graph::LinkGraph;

pub fn write_report<W: Write>(out: &mut W, graph: &LinkGraph) -> io::Result<()> {
    for (url, index) in graph.urls() {
        writeln!(out, "{index:<3} {url}")?;
    }
    writeln!(out)?;
    for &(src, dst) in graph.edges() {
        writeln!(out, "{src:<3} {dst:<3}")?;
    }
    Ok(())
}

/// A parsed report: the URL table keyed by index, and the edge multiset.
#[derive(Debug, Default)]
pub struct Report {
    pub urls: BTreeMap<usize, String>,
    pub edges: Vec<(usize, usize)>,
}

/// Parse a crawler report. Blank lines before block 1 are tolerated; the
/// first blank line after a URL line switches to the edge block.
pub fn parse(input: &str) -> Result<Report> {
    let mut report = Report::default();
    let mut in_edges = false;

    for line in input.lines() {
        if line.trim().is_empty() {
            if !report.urls.is_empty() {
                in_edges = true;
            }
            continue;
        }

        let mut fields = line.split_whitespace();
        if !in_edges {
            let index = parse_field(fields.next(), line).context("bad url line")?;
            let url = fields
                .next()
                .with_context(|| format!("url line without a url: {line:?}"))?;
            report.urls.insert(index, url.to_string());
        } else {
            let src = parse_field(fields.next(), line).context("bad edge line")?;
            let dst = parse_field(fields.next(), line).context("bad edge line")?;
            report.edges.push((src, dst));
        }
    }

    Ok(report)
}

fn parse_field(field: Option<&str>, line: &str) -> Result<usize> {
    field
        .with_context(|| format!("missing index in line: {line:?}"))?
        .parse()
        .with_context(|| format!("non-numeric index in line: {line:?}"))
}
