use crate::filter::IbfConfig;
use crate::manifest::HashesCount;
use anyhow::{Result, ensure};

/// One technical bin: an inclusive index range into the target's scratch
/// hash sequence. The bin number is the position in the returned vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinSpan {
    pub target: String,
    pub hashes_idx_start: u64,
    pub hashes_idx_end: u64,
}

/// Splits every target's hash range into bins of the chosen capacity, in
/// `hashes_count` order. Targets without hashes occupy no bins.
pub fn create_bin_map(ibf_config: &IbfConfig, hashes_count: &HashesCount) -> Result<Vec<BinSpan>> {
    let mut bin_map: Vec<BinSpan> = Vec::with_capacity(ibf_config.n_bins as usize);

    for (target, &count) in hashes_count {
        if count == 0 {
            continue;
        }
        let n_bins_target = count.div_ceil(ibf_config.max_hashes_bin);
        // spread hashes evenly instead of filling bins to the brim
        let n_hashes_bin = count.div_ceil(n_bins_target).min(ibf_config.max_hashes_bin);

        for i in 0..n_bins_target {
            let start = i * n_hashes_bin;
            if start >= count {
                break;
            }
            let end = (start + n_hashes_bin - 1).min(count - 1);
            bin_map.push(BinSpan {
                target: target.clone(),
                hashes_idx_start: start,
                hashes_idx_end: end,
            });
        }
    }

    ensure!(
        bin_map.len() as u64 == ibf_config.n_bins,
        "Bin map size {} does not match the expected {} bins",
        bin_map.len(),
        ibf_config.n_bins
    );
    Ok(bin_map)
}
