//! Closed-form Bloom filter arithmetic shared by the geometry search and
//! the realised false-positive report. All formulas operate in double
//! precision and round up where a bit count comes out.

use crate::manifest::HashesCount;
use std::f64::consts::LN_2;

/// Bits needed for one bin holding `n_hashes` elements at rate `max_fp`,
/// assuming the optimal number of hash functions.
pub fn bin_size(max_fp: f64, n_hashes: u64) -> u64 {
    ((n_hashes as f64 * max_fp.ln()) / (1.0 / 2f64.powf(LN_2)).ln()).ceil() as u64
}

/// Bits needed for one bin with a fixed number of hash functions.
pub fn bin_size_fixed(max_fp: f64, n_hashes: u64, hash_functions: u8) -> u64 {
    let k = hash_functions as f64;
    (n_hashes as f64 * (-k / (1.0 - (max_fp.ln() / k).exp()).ln())).ceil() as u64
}

/// Optimal hash-function count for a bin of `bin_size_bits` bits holding
/// `n_hashes` elements.
pub fn hash_functions_from_ratio(bin_size_bits: u64, n_hashes: u64) -> u8 {
    (LN_2 * (bin_size_bits as f64 / n_hashes as f64)) as u8
}

/// Requested count, or the ratio-derived one when 0; out-of-range values
/// collapse to `max_hash_functions`.
pub fn optimal_hash_functions(
    bin_size_bits: u64,
    n_hashes: u64,
    hash_functions: u8,
    max_hash_functions: u8,
) -> u8 {
    let mut optimal = hash_functions;
    if optimal == 0 {
        optimal = hash_functions_from_ratio(bin_size_bits, n_hashes);
    }
    if optimal > max_hash_functions || optimal == 0 {
        optimal = max_hash_functions;
    }
    optimal
}

/// Technical bins needed over all targets at a per-bin capacity of
/// `n_hashes` (split bins included).
pub fn number_of_bins(hashes_count: &HashesCount, n_hashes: u64) -> u64 {
    hashes_count.values().map(|&count| count.div_ceil(n_hashes)).sum()
}

/// Multiplier on the single-bin size so a target split across
/// `max_split_bins` bins still meets `max_fp` as a group.
pub fn correction_rate(
    max_split_bins: u64,
    max_fp: f64,
    hash_functions: u8,
    n_hashes: u64,
) -> f64 {
    let target_fpr = 1.0 - ((1.0 - max_fp).ln() / max_split_bins as f64).exp();
    let new_bin_size = bin_size_fixed(target_fpr, n_hashes, hash_functions);
    let original_bin_size = bin_size_fixed(max_fp, n_hashes, hash_functions);
    new_bin_size as f64 / original_bin_size as f64
}

/// Physical bin count of the IBF: next multiple of 64.
pub fn optimal_bins(n_bins: u64) -> u64 {
    n_bins.div_ceil(64) * 64
}

/// Theoretical single-bin false positive rate.
pub fn false_positive(bin_size_bits: u64, hash_functions: u8, n_hashes: u64) -> f64 {
    let k = hash_functions as f64;
    (1.0 - (-k / (bin_size_bits as f64 / n_hashes as f64)).exp()).powi(hash_functions as i32)
}

/// Largest per-target hash count.
pub fn max_hashes(hashes_count: &HashesCount) -> u64 {
    hashes_count.values().copied().max().unwrap_or(0)
}
