//! URL canonicalization.
//!
//! The crawl works on canonical URLs of the form `host[:port]/path` with the
//! scheme, query, and fragment removed. Comparison is byte-exact: nothing is
//! percent-decoded or lowercased, so two spellings of the same resource are
//! two URLs.

const HTTP_SCHEME: &str = "http://";

/// Schemes the crawler refuses to follow.
const REJECTED_SCHEMES: [&str; 3] = ["https://", "file://", "ftp://"];

/// Host piece of a canonical or `http://`-prefixed URL: the bytes up to the
/// first `/` (or the whole string when there is no path).
pub fn parse_host(url: &str) -> &str {
    let rest = url.strip_prefix(HTTP_SCHEME).unwrap_or(url);
    match rest.find('/') {
        Some(i) => &rest[..i],
        None => rest,
    }
}

/// Path piece beginning with `/`; `/` when the URL has none.
pub fn parse_path(url: &str) -> &str {
    let rest = url.strip_prefix(HTTP_SCHEME).unwrap_or(url);
    match rest.find('/') {
        Some(i) => &rest[i..],
        None => "/",
    }
}

/// Port to dial. Ports spelled inside the URL stay part of the host piece
/// and are interpreted by the connector, not here.
pub fn parse_port(_url: &str) -> u16 {
    80
}

/// Canonicalize `raw` against an optional referring page.
///
/// * `https://`, `file://`, and `ftp://` references are rejected.
/// * `http://host[/path]` becomes `host/path` with query and fragment
///   stripped (`/` when the path is absent).
/// * Anything else needs a canonical referrer (`host/abs-path`): rooted
///   references replace the referrer's path, relative ones resolve against
///   the referrer's path base, walking one `/`-segment up per leading `../`
///   and stopping at the root.
///
/// Returns `None` when no rule applies.
pub fn fix_url(raw: &str, referrer: Option<&str>) -> Option<String> {
    if REJECTED_SCHEMES.iter().any(|s| raw.starts_with(s)) {
        return None;
    }

    if let Some(rest) = raw.strip_prefix(HTTP_SCHEME) {
        let (host, path) = match rest.find('/') {
            Some(i) => (&rest[..i], &rest[i..]),
            None => (rest, "/"),
        };
        return Some(format!("{host}{path}", path = strip_query_fragment(path)));
    }

    // A relative reference is meaningless without a page to resolve against.
    let referrer = referrer?;
    let slash = referrer.find('/')?;
    let (ref_host, ref_path) = referrer.split_at(slash);

    if raw.starts_with('/') {
        return Some(format!("{ref_host}{path}", path = strip_query_fragment(raw)));
    }

    let mut rest = raw;
    let mut ups = 0;
    while let Some(r) = rest.strip_prefix("../") {
        rest = r;
        ups += 1;
    }
    let rest = strip_query_fragment(rest);

    // Base is the referrer path up to its last '/'; each up-step retreats to
    // the preceding '/', clamped at the root.
    let mut end = ref_path.rfind('/')?;
    for _ in 0..ups {
        if end == 0 {
            break;
        }
        end = ref_path[..end].rfind('/')?;
    }
    let base = &ref_path[..=end];

    Some(format!("{ref_host}{base}{rest}"))
}

fn strip_query_fragment(path: &str) -> &str {
    match path.find(['?', '#']) {
        Some(i) => &path[..i],
        None => path,
    }
}
