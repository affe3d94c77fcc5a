use std::sync::atomic::{AtomicUsize, Ordering};

/// Bits in the crawl-wide fetched-URL filter.
pub const GLOBAL_FILTER_BITS: usize = 16_000_000;
/// Bits in the per-page link filter created for each successful fetch.
pub const PAGE_FILTER_BITS: usize = 100_000;

static LIVE_FILTERS: AtomicUsize = AtomicUsize::new(0);

/// Number of filters currently alive in the process.
///
/// The crawler asserts this drops back to zero after a crawl so that a filter
/// accidentally kept past its page's lifetime shows up in debug runs.
pub fn live_filters() -> usize {
    LIVE_FILTERS.load(Ordering::Relaxed)
}

/// Append-only probabilistic string set: `test` after `add` is always true,
/// and a positive `test` for a string never added is an accepted false
/// positive.
#[derive(Debug)]
pub struct BloomFilter {
    bits: Vec<u8>,
    m: usize,
}

impl BloomFilter {
    /// Create a filter over `m` bits. Each string indexes one bit per hash
    /// function.
    pub fn new(m: usize) -> Self {
        LIVE_FILTERS.fetch_add(1, Ordering::Relaxed);
        Self {
            bits: vec![0; m / 8 + 1],
            m,
        }
    }

    pub fn add(&mut self, s: &str) {
        for hash in HASHES {
            let bit = hash(s.as_bytes()) as usize % self.m;
            self.bits[bit / 8] |= 1 << (bit % 8);
        }
    }

    pub fn test(&self, s: &str) -> bool {
        HASHES.iter().all(|hash| {
            let bit = hash(s.as_bytes()) as usize % self.m;
            self.bits[bit / 8] & (1 << (bit % 8)) != 0
        })
    }
}

impl Drop for BloomFilter {
    fn drop(&mut self) {
        LIVE_FILTERS.fetch_sub(1, Ordering::Relaxed);
    }
}

// The classic general-purpose string hash family (Arash Partow's
// collection), each a single pass over the bytes.
const HASHES: [fn(&[u8]) -> u32; 8] = [
    rs_hash, js_hash, pjw_hash, elf_hash, bkdr_hash, djb_hash, dek_hash, ap_hash,
];

fn rs_hash(s: &[u8]) -> u32 {
    let b = 378551u32;
    let mut a = 63689u32;
    let mut hash = 0u32;
    for &c in s {
        hash = hash.wrapping_mul(a).wrapping_add(c as u32);
        a = a.wrapping_mul(b);
    }
    hash
}

fn js_hash(s: &[u8]) -> u32 {
    let mut hash = 1315423911u32;
    for &c in s {
        hash ^= (hash << 5).wrapping_add(c as u32).wrapping_add(hash >> 2);
    }
    hash
}

fn pjw_hash(s: &[u8]) -> u32 {
    const BITS: u32 = 32;
    const THREE_QUARTERS: u32 = BITS * 3 / 4;
    const ONE_EIGHTH: u32 = BITS / 8;
    const HIGH_BITS: u32 = 0xFFFF_FFFF << (BITS - ONE_EIGHTH);

    let mut hash = 0u32;
    for &c in s {
        hash = (hash << ONE_EIGHTH).wrapping_add(c as u32);
        let test = hash & HIGH_BITS;
        if test != 0 {
            hash = (hash ^ (test >> THREE_QUARTERS)) & !HIGH_BITS;
        }
    }
    hash
}

fn elf_hash(s: &[u8]) -> u32 {
    let mut hash = 0u32;
    for &c in s {
        hash = (hash << 4).wrapping_add(c as u32);
        let x = hash & 0xF000_0000;
        if x != 0 {
            hash ^= x >> 24;
        }
        hash &= !x;
    }
    hash
}

fn bkdr_hash(s: &[u8]) -> u32 {
    let seed = 131u32;
    let mut hash = 0u32;
    for &c in s {
        hash = hash.wrapping_mul(seed).wrapping_add(c as u32);
    }
    hash
}

fn djb_hash(s: &[u8]) -> u32 {
    let mut hash = 5381u32;
    for &c in s {
        hash = (hash << 5).wrapping_add(hash).wrapping_add(c as u32);
    }
    hash
}

fn dek_hash(s: &[u8]) -> u32 {
    let mut hash = s.len() as u32;
    for &c in s {
        hash = ((hash << 5) ^ (hash >> 27)) ^ c as u32;
    }
    hash
}

fn ap_hash(s: &[u8]) -> u32 {
    let mut hash = 0xAAAA_AAAAu32;
    for (i, &c) in s.iter().enumerate() {
        if i & 1 == 0 {
            hash ^= (hash << 7) ^ (c as u32).wrapping_mul(hash >> 3);
        } else {
            hash ^= !((hash << 11).wrapping_add((c as u32) ^ (hash >> 5)));
        }
    }
    hash
}
