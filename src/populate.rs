use crate::binmap::BinSpan;
use crate::filter::Ibf;
use crate::scratch::ScratchDir;
use anyhow::{Result, ensure};
use rayon::prelude::*;
use rustc_hash::FxHashMap;

/// Bins handed to a worker at a time. A 64-bin batch maps exactly onto
/// one aligned word group of the interleaved matrix, so batches touch
/// disjoint words; the atomic insert keeps this safe either way.
pub const BIN_BATCH_SIZE: usize = 64;

/// Fills the IBF from the scratch files on the current rayon pool, one
/// worker per bin batch. Each batch loads a target's scratch file at most
/// once, whatever number of its bins land in the batch.
pub fn populate_ibf(ibf: &Ibf, bin_map: &[BinSpan], scratch: &ScratchDir) -> Result<()> {
    let max_batch = bin_map.len().div_ceil(BIN_BATCH_SIZE);

    (0..max_batch).into_par_iter().try_for_each(|batch| {
        let batch_start = batch * BIN_BATCH_SIZE;
        let batch_end = (batch_start + BIN_BATCH_SIZE).min(bin_map.len());

        // per-batch cache: bins of one target often cluster together
        let mut target_hashes: FxHashMap<&str, Vec<u64>> = FxHashMap::default();

        for (binno, span) in (batch_start..batch_end).zip(&bin_map[batch_start..batch_end]) {
            if !target_hashes.contains_key(span.target.as_str()) {
                target_hashes.insert(span.target.as_str(), scratch.load(&span.target)?);
            }
            let hashes = &target_hashes[span.target.as_str()];
            ensure!(
                (span.hashes_idx_end as usize) < hashes.len(),
                "Scratch file for target {} is shorter than its bin map",
                span.target
            );

            for pos in span.hashes_idx_start..=span.hashes_idx_end {
                ibf.insert(hashes[pos as usize], binno as u64);
            }
        }
        Ok(())
    })
}
