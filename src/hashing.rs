use std::collections::VecDeque;

/// Base seed shared with the query-side tooling; shortened to the k-mer
/// width so the XOR only touches the packed bits.
pub const MINIMISER_SEED: u64 = 0x8F3F73B5CF1C9ADE;

pub fn adjust_seed(kmer_size: u8) -> u64 {
    MINIMISER_SEED >> (64 - 2 * kmer_size as u32)
}

// 2-bit rank; anything outside ACGT (N and friends) ranks as A.
#[inline]
fn rank(base: u8) -> u64 {
    match base {
        b'C' | b'c' => 1,
        b'G' | b'g' => 2,
        b'T' | b't' => 3,
        _ => 0,
    }
}

/// Canonical minimiser hashing: every k-mer maps to
/// `min(forward ^ seed, revcomp ^ seed)` and each window of
/// `window_size - kmer_size + 1` consecutive k-mers yields its smallest
/// value. The stream is deterministic for a given `(k, w, seed)`.
#[derive(Debug, Clone, Copy)]
pub struct MinimiserHasher {
    kmer_size: usize,
    window_size: usize,
    seed: u64,
    mask: u64,
}

impl MinimiserHasher {
    /// `kmer_size` must be in 1..=32 and `window_size >= kmer_size`;
    /// both are enforced by `Config::validate` before any hashing runs.
    pub fn new(kmer_size: u8, window_size: u32) -> Self {
        let k = kmer_size as usize;
        let mask = if k == 32 { u64::MAX } else { (1u64 << (2 * k)) - 1 };
        Self {
            kmer_size: k,
            window_size: window_size as usize,
            seed: adjust_seed(kmer_size),
            mask,
        }
    }

    /// Minimiser stream over `seq`. Sequences shorter than the window
    /// yield nothing.
    pub fn hashes<'a>(&self, seq: &'a [u8]) -> Minimisers<'a> {
        Minimisers {
            seq,
            k: self.kmer_size,
            window_kmers: self.window_size - self.kmer_size + 1,
            window_size: self.window_size,
            seed: self.seed,
            mask: self.mask,
            pos: 0,
            fwd: 0,
            rc: 0,
            deque: VecDeque::new(),
            last_min: None,
        }
    }
}

pub struct Minimisers<'a> {
    seq: &'a [u8],
    k: usize,
    window_kmers: usize,
    window_size: usize,
    seed: u64,
    mask: u64,
    pos: usize,
    fwd: u64,
    rc: u64,
    // (k-mer index, canonical value), values ascending front to back
    deque: VecDeque<(usize, u64)>,
    last_min: Option<u64>,
}

impl Iterator for Minimisers<'_> {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        while self.pos < self.seq.len() {
            let pos = self.pos;
            self.pos += 1;

            let r = rank(self.seq[pos]);
            self.fwd = ((self.fwd << 2) | r) & self.mask;
            self.rc = (self.rc >> 2) | ((3 - r) << (2 * (self.k - 1)));

            if pos + 1 < self.k {
                continue;
            }
            let kmer_idx = pos + 1 - self.k;
            let value = (self.fwd ^ self.seed).min(self.rc ^ self.seed);

            while matches!(self.deque.back(), Some(&(_, v)) if v > value) {
                self.deque.pop_back();
            }
            self.deque.push_back((kmer_idx, value));

            if pos + 1 < self.window_size {
                continue;
            }
            // first k-mer still inside the current window
            let window_start = kmer_idx + 1 - self.window_kmers;
            while matches!(self.deque.front(), Some(&(i, _)) if i < window_start) {
                self.deque.pop_front();
            }

            let &(_, min_val) = self.deque.front()?;
            if self.last_min != Some(min_val) {
                self.last_min = Some(min_val);
                return Some(min_val);
            }
        }
        None
    }
}
