//! PageRank over the crawler's edge multiset.
//!
//! Standard power iteration:
//!
//! ```text
//! rank'(i) = (1 - d) / N + d * Σ rank(j) / out_degree(j)   for each j → i
//! ```
//!
//! with the rank vector L1-normalized after every step and iteration halting
//! once the squared per-node change drops below epsilon. Dangling nodes keep
//! only the teleport term; their mass is not redistributed. Self-loops and
//! duplicate edges count like any other edge.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::{self, Write};

/// Probability of following a link rather than teleporting.
pub const DAMPING_FACTOR: f64 = 0.85;
/// Squared-change threshold below which the iteration stops.
pub const CONVERGENCE_EPSILON: f64 = 1e-6;

/// Rank every node index appearing on either side of an edge. The returned
/// vector sums to 1 (within floating-point error) unless `edges` is empty.
pub fn pagerank(edges: &[(usize, usize)]) -> BTreeMap<usize, f64> {
    let nodes: BTreeSet<usize> = edges.iter().flat_map(|&(src, dst)| [src, dst]).collect();
    let n = nodes.len();
    if n == 0 {
        return BTreeMap::new();
    }

    let mut out_degree: HashMap<usize, usize> = HashMap::new();
    let mut incoming: HashMap<usize, Vec<usize>> = HashMap::new();
    for &(src, dst) in edges {
        *out_degree.entry(src).or_insert(0) += 1;
        incoming.entry(dst).or_default().push(src);
    }

    let teleport = (1.0 - DAMPING_FACTOR) / n as f64;
    let mut ranks: BTreeMap<usize, f64> = nodes.iter().map(|&i| (i, 1.0 / n as f64)).collect();

    loop {
        let next: BTreeMap<usize, f64> = nodes
            .iter()
            .map(|&i| {
                let incoming_rank: f64 = match incoming.get(&i) {
                    Some(sources) => sources
                        .iter()
                        .map(|j| ranks[j] / out_degree[j] as f64)
                        .sum(),
                    None => 0.0,
                };
                (i, teleport + DAMPING_FACTOR * incoming_rank)
            })
            .collect();
        let next = normalize(next);

        let delta: f64 = nodes
            .iter()
            .map(|i| {
                let d = ranks[i] - next[i];
                d * d
            })
            .sum();
        ranks = next;
        if delta < CONVERGENCE_EPSILON {
            break;
        }
    }

    ranks
}

fn normalize(mut ranks: BTreeMap<usize, f64>) -> BTreeMap<usize, f64> {
    let norm: f64 = ranks.values().sum();
    if norm > 0.0 {
        for rank in ranks.values_mut() {
            *rank /= norm;
        }
    }
    ranks
}

/// Pair ranks with their URLs, sorted by rank descending. The sort is
/// stable, so equal ranks keep index order.
pub fn ranked_urls(
    urls: &BTreeMap<usize, String>,
    ranks: &BTreeMap<usize, f64>,
) -> Vec<(f64, String)> {
    let mut out: Vec<(f64, String)> = urls
        .iter()
        .filter_map(|(index, url)| ranks.get(index).map(|&rank| (rank, url.clone())))
        .collect();
    out.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
    out
}

/// Write one `<rank> <url>` line per entry.
pub fn write_ranked<W: Write>(out: &mut W, ranked: &[(f64, String)]) -> io::Result<()> {
    for (rank, url) in ranked {
        writeln!(out, "{} {url}", format_rank(*rank))?;
    }
    Ok(())
}

/// Format a rank with six significant digits. Fixed notation scales its
/// decimal places to the rank's magnitude; ranks small enough that fixed
/// notation would lose leading digits switch to scientific, so a node in a
/// very large graph never prints as a bare `0.000000`.
pub fn format_rank(rank: f64) -> String {
    if rank > 0.0 && rank < 1e-4 {
        return format!("{rank:.5e}");
    }
    let magnitude = if rank > 0.0 {
        rank.log10().floor() as i32
    } else {
        0
    };
    let decimals = (5 - magnitude).max(0) as usize;
    format!("{rank:.decimals$}")
}
