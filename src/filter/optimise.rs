//! Geometry search: sweep candidate per-bin capacities, size each
//! candidate either for a false-positive bound or a fixed filter size,
//! and pick the one minimising a mode-weighted harmonic mean of the
//! size/FP ratio and the bin-count ratio.

use crate::config::Mode;
use crate::filter::math::{
    bin_size, bin_size_fixed, correction_rate, false_positive, max_hashes, number_of_bins,
    optimal_bins, optimal_hash_functions,
};
use crate::manifest::HashesCount;
use serde::{Deserialize, Serialize};
use std::fmt;

const BITS_PER_MIB: f64 = 8_388_608.0;

/// Everything needed to rebuild the filter on the query side.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IbfConfig {
    pub kmer_size: u8,
    pub window_size: u32,
    /// Per-bin capacity the geometry was chosen for.
    pub max_hashes_bin: u64,
    /// Logical (technical) bin count, before rounding up to 64.
    pub n_bins: u64,
    pub bin_size_bits: u64,
    pub hash_functions: u8,
    /// Targeted maximum FP per split-target group.
    pub max_fp: f64,
    /// Realised FP over the final geometry.
    pub true_max_fp: f64,
    pub true_avg_fp: f64,
}

impl fmt::Display for IbfConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "IBFConfig")?;
        writeln!(f, "  kmer_size      {}", self.kmer_size)?;
        writeln!(f, "  window_size    {}", self.window_size)?;
        writeln!(f, "  max_hashes_bin {}", self.max_hashes_bin)?;
        writeln!(f, "  n_bins         {}", self.n_bins)?;
        writeln!(f, "  bin_size_bits  {}", self.bin_size_bits)?;
        writeln!(f, "  hash_functions {}", self.hash_functions)?;
        writeln!(f, "  max_fp         {}", self.max_fp)?;
        writeln!(f, "  true_max_fp    {}", self.true_max_fp)?;
        writeln!(f, "  true_avg_fp    {}", self.true_avg_fp)
    }
}

struct SimParam {
    n_hashes: u64,
    n_bins: u64,
    filter_size_bits: u64,
    fp: f64,
}

/// Sweeps per-bin capacities and fills `ibf_config` with the winning
/// geometry. Exactly one of `max_fp` / `filter_size` (MiB) is active;
/// `filter_size > 0` wins.
pub fn optimal_hashes(
    max_fp: f64,
    filter_size: f64,
    ibf_config: &mut IbfConfig,
    hashes_count: &HashesCount,
    hash_functions: u8,
    max_hash_functions: u8,
    mode: Mode,
) {
    let max_target_hashes = max_hashes(hashes_count);
    if max_target_hashes == 0 {
        // nothing extracted; n_bins stays 0 and the caller aborts
        return;
    }

    let mut min_filter_size: u64 = 0;
    let mut min_bins: u64 = 0;
    let mut min_fp: f64 = 1.0;
    let mut simulations: Vec<SimParam> = Vec::new();

    // one candidate every 100 elements, or a single one for tiny inputs
    let iter = 100.min(max_target_hashes);

    let mut n = max_target_hashes + 1;
    while n > iter {
        let n_hashes = n - 1;
        n -= iter;

        // actual bin count for this capacity, not yet a multiple of 64
        let n_bins = number_of_bins(hashes_count, n_hashes);

        let mut bin_size_bits: u64 = 0;
        let hf;
        if filter_size > 0.0 {
            bin_size_bits = ((filter_size / optimal_bins(n_bins) as f64) * BITS_PER_MIB) as u64;
            hf = optimal_hash_functions(bin_size_bits, n_hashes, hash_functions, max_hash_functions);
        } else if hash_functions == 0 {
            // size first, then the hash-function count from the ratio
            bin_size_bits = bin_size(max_fp, n_hashes);
            hf = optimal_hash_functions(bin_size_bits, n_hashes, hash_functions, max_hash_functions);
        } else {
            // requested count is clamped before any size exists; keeps the
            // upstream ordering
            hf = optimal_hash_functions(bin_size_bits, n_hashes, hash_functions, max_hash_functions);
            bin_size_bits = bin_size_fixed(max_fp, n_hashes, hf);
        }

        // worst split factor over all targets
        let max_split_bins = max_target_hashes.div_ceil(n_hashes);

        let mut fp = 0.0;
        let mut filter_size_bits: u64 = 0;
        if filter_size > 0.0 {
            fp = 1.0
                - (1.0 - false_positive(bin_size_bits, hf, n_hashes)).powf(max_split_bins as f64);
            if fp < min_fp {
                min_fp = fp;
            }
        } else {
            // bins of a split target hold the average share, not the cap
            let avg_n_hashes = max_target_hashes.div_ceil(max_split_bins);
            let mut approx_fp = false_positive(bin_size_bits, hf, avg_n_hashes);
            if approx_fp > max_fp {
                approx_fp = max_fp;
            }

            let crate_rate = correction_rate(max_split_bins, approx_fp, hf, n_hashes);
            bin_size_bits = (bin_size_bits as f64 * crate_rate) as u64;
            filter_size_bits = match bin_size_bits.checked_mul(optimal_bins(n_bins)) {
                Some(bits) => bits,
                None => break,
            };

            // small capacities blow the correction up; stop the sweep there
            if filter_size_bits == 0 || crate_rate.is_infinite() {
                break;
            }

            if filter_size_bits < min_filter_size || min_filter_size == 0 {
                min_filter_size = filter_size_bits;
            }
        }

        simulations.push(SimParam {
            n_hashes,
            n_bins,
            filter_size_bits,
            fp,
        });

        if n_bins < min_bins || min_bins == 0 {
            min_bins = n_bins;
        }
    }

    // mode weighting: 1 keeps the plain harmonic mean, 0.5 biases one
    // axis, 0 drops it entirely
    let mode_val: f64 = match mode {
        Mode::Avg => 1.0,
        Mode::Smaller | Mode::Faster => 0.5,
        Mode::Smallest | Mode::Fastest => 0.0,
    };
    let mut var_val = 1.0;
    let mut bins_val = 1.0;
    match mode {
        Mode::Smaller | Mode::Smallest => var_val = mode_val,
        Mode::Faster | Mode::Fastest => bins_val = mode_val,
        Mode::Avg => {}
    }

    let mut min_avg = 0.0;
    for params in &simulations {
        let var_ratio = if filter_size > 0.0 {
            params.fp / min_fp
        } else {
            params.filter_size_bits as f64 / min_filter_size as f64
        };
        let bins_ratio = params.n_bins as f64 / min_bins as f64;

        // (1 + mode_val^2) keeps the score positive when an axis is dropped
        let avg = (1.0 + mode_val.powi(2))
            * ((var_ratio * bins_ratio) / (var_val * var_ratio + bins_val * bins_ratio));

        if avg < min_avg || min_avg == 0.0 {
            min_avg = avg;
            if filter_size > 0.0 {
                ibf_config.bin_size_bits =
                    ((filter_size / optimal_bins(params.n_bins) as f64) * BITS_PER_MIB) as u64;
                ibf_config.max_fp = params.fp;
            } else {
                ibf_config.bin_size_bits = params.filter_size_bits / optimal_bins(params.n_bins);
                ibf_config.max_fp = max_fp;
            }
            ibf_config.max_hashes_bin = params.n_hashes;
            ibf_config.n_bins = params.n_bins;
            ibf_config.hash_functions = optimal_hash_functions(
                ibf_config.bin_size_bits,
                params.n_hashes,
                hash_functions,
                max_hash_functions,
            );
        }
    }
}

/// Realised FP of the chosen geometry: per target, the split-group FP
/// over its actual bins; returns `(max, mean)` over all targets.
pub fn true_false_positive(
    hashes_count: &HashesCount,
    max_hashes_bin: u64,
    bin_size_bits: u64,
    hash_functions: u8,
) -> (f64, f64) {
    let mut highest_fp: f64 = 0.0;
    let mut average_fp: f64 = 0.0;

    for &count in hashes_count.values() {
        if count == 0 {
            // occupies no bins, never fires
            continue;
        }
        let n_bins_target = count.div_ceil(max_hashes_bin);
        let n_hashes_bin = count.div_ceil(n_bins_target);

        let real_fp = 1.0
            - (1.0 - false_positive(bin_size_bits, hash_functions, n_hashes_bin))
                .powf(n_bins_target as f64);

        if real_fp > highest_fp {
            highest_fp = real_fp;
        }
        average_fp += real_fp;
    }
    average_fp /= hashes_count.len() as f64;

    (highest_fp, average_fp)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(entries: &[(&str, u64)]) -> HashesCount {
        entries.iter().map(|&(t, c)| (t.to_string(), c)).collect()
    }

    fn fit(
        max_fp: f64,
        filter_size: f64,
        hashes_count: &HashesCount,
        hash_functions: u8,
        mode: Mode,
    ) -> IbfConfig {
        let mut config = IbfConfig::default();
        optimal_hashes(max_fp, filter_size, &mut config, hashes_count, hash_functions, 5, mode);
        config
    }

    #[test]
    fn tiny_input_yields_a_single_candidate() {
        let hc = counts(&[("T", 50)]);
        let config = fit(0.05, 0.0, &hc, 0, Mode::Avg);
        assert_eq!(config.max_hashes_bin, 50);
        assert_eq!(config.n_bins, 1);
        assert!(config.bin_size_bits > 0);
        assert!(config.hash_functions >= 1 && config.hash_functions <= 5);
    }

    #[test]
    fn bin_total_matches_chosen_capacity() {
        let hc = counts(&[("A", 1_000), ("B", 2_500), ("C", 400)]);
        let config = fit(0.05, 0.0, &hc, 0, Mode::Avg);
        assert!(config.n_bins > 0);
        assert_eq!(config.n_bins, number_of_bins(&hc, config.max_hashes_bin));
    }

    #[test]
    fn zero_counts_leave_n_bins_zero() {
        let hc = counts(&[("T", 0)]);
        let config = fit(0.05, 0.0, &hc, 0, Mode::Avg);
        assert_eq!(config.n_bins, 0);
    }

    #[test]
    fn mode_extremes_pull_opposite_axes() {
        let hc = counts(&[("T", 1_000_000)]);
        let smallest = fit(0.05, 0.0, &hc, 0, Mode::Smallest);
        let fastest = fit(0.05, 0.0, &hc, 0, Mode::Fastest);

        // fastest ignores size and goes straight to the fewest bins
        assert_eq!(fastest.n_bins, 1);
        assert!(smallest.n_bins >= fastest.n_bins);

        let size_of = |c: &IbfConfig| c.bin_size_bits * optimal_bins(c.n_bins);
        assert!(size_of(&smallest) <= size_of(&fastest));

        // both stay feasible against the requested bound, modulo rounding
        for config in [&smallest, &fastest] {
            let (max, avg) = true_false_positive(
                &hc,
                config.max_hashes_bin,
                config.bin_size_bits,
                config.hash_functions,
            );
            assert!(max <= 0.06, "true max fp {max}");
            assert!(avg <= max);
        }
    }

    #[test]
    fn filter_size_mode_reports_realised_fp() {
        let hc = counts(&[("T", 500_000)]);
        let config = fit(0.0, 64.0, &hc, 0, Mode::Avg);

        assert!(config.max_fp > 0.0 && config.max_fp < 1.0, "fp={}", config.max_fp);
        let total_bits = config.bin_size_bits * optimal_bins(config.n_bins);
        let requested_bits = (64.0 * 8_388_608.0) as u64;
        // the per-bin truncation can only lose less than one bit per bin
        assert!(total_bits <= requested_bits);
        assert!(requested_bits - total_bits < optimal_bins(config.n_bins));
    }

    #[test]
    fn requested_hash_functions_pass_through() {
        let hc = counts(&[("T", 100_000)]);
        let config = fit(0.05, 0.0, &hc, 3, Mode::Avg);
        assert_eq!(config.hash_functions, 3);
        // above the cap they collapse to it
        let config = fit(0.05, 0.0, &hc, 9, Mode::Avg);
        assert_eq!(config.hash_functions, 5);
    }

    #[test]
    fn dominant_target_sweep_terminates() {
        let hc = counts(&[("big", 2_000_000), ("small", 200_000)]);
        let config = fit(0.01, 0.0, &hc, 0, Mode::Avg);
        assert!(config.n_bins >= 2);
        assert_eq!(config.n_bins, number_of_bins(&hc, config.max_hashes_bin));
    }

    #[test]
    fn realised_fp_is_bounded_and_ordered() {
        let hc = counts(&[("a", 10_000), ("b", 150_000), ("empty", 0)]);
        let config = fit(0.05, 0.0, &hc, 0, Mode::Avg);
        let (max, avg) = true_false_positive(
            &hc,
            config.max_hashes_bin,
            config.bin_size_bits,
            config.hash_functions,
        );
        assert!((0.0..=1.0).contains(&max));
        assert!((0.0..=1.0).contains(&avg));
        assert!(max >= avg);
    }
}
