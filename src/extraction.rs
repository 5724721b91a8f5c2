use crate::config::Config;
use crate::hashing::MinimiserHasher;
use crate::manifest::HashesCount;
use crate::scratch::ScratchDir;
use crate::sequence::SequenceReader;
use crate::stats::Total;
use anyhow::Result;
use indexmap::IndexMap;
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use std::path::PathBuf;

/// Hard cap on distinct minimiser hashes per target; extraction stops
/// early once a target reaches it.
pub const MAX_HASHES_TARGET: usize = 2_000_000;

/// Runs minimiser extraction for every target on the current rayon pool,
/// spilling each target's hash set to its scratch file and adding the
/// cardinality to `hashes_count`. Each target is handled by exactly one
/// worker; per-worker counters come back for the caller to merge.
///
/// Per-file parse errors are warned about and skipped; scratch I/O errors
/// abort the whole stage.
pub fn count_and_store_hashes(
    input_map: &IndexMap<String, Vec<PathBuf>>,
    hashes_count: &mut HashesCount,
    config: &Config,
    scratch: &ScratchDir,
) -> Result<Vec<Total>> {
    let hasher = MinimiserHasher::new(config.kmer_size, config.window_size);

    let entries: Vec<(&String, &Vec<PathBuf>)> = input_map.iter().collect();
    let results: Vec<(String, u64, Total)> = entries
        .par_iter()
        .map(|(target, files)| {
            process_target(
                target,
                files,
                &hasher,
                config.min_length,
                MAX_HASHES_TARGET,
                config.quiet,
                scratch,
            )
            .map(|(count, total)| ((*target).clone(), count, total))
        })
        .collect::<Result<_>>()?;

    let mut totals = Vec::with_capacity(results.len());
    for (target, count, total) in results {
        if let Some(entry) = hashes_count.get_mut(&target) {
            *entry += count;
        }
        totals.push(total);
    }
    Ok(totals)
}

// One target: union the minimiser hashes of all its files up to `cap`,
// then append them to the target's scratch file in one go.
fn process_target(
    target: &str,
    files: &[PathBuf],
    hasher: &MinimiserHasher,
    min_length: u64,
    cap: usize,
    quiet: bool,
    scratch: &ScratchDir,
) -> Result<(u64, Total)> {
    let mut total = Total::default();
    let mut target_hashes: FxHashSet<u64> = FxHashSet::default();

    'files: for file in files {
        if target_hashes.len() >= cap {
            break;
        }
        let mut reader = match SequenceReader::open(file) {
            Ok(reader) => reader,
            Err(e) => {
                if !quiet {
                    eprintln!("Error parsing file [{}]. {:#}", file.display(), e);
                }
                total.parse_errors += 1;
                continue;
            }
        };

        loop {
            let record = match reader.next_record() {
                Ok(Some(record)) => record,
                Ok(None) => break,
                Err(e) => {
                    if !quiet {
                        eprintln!("Error parsing file [{}]. {:#}", file.display(), e);
                    }
                    total.parse_errors += 1;
                    break;
                }
            };

            if (record.seq.len() as u64) < min_length {
                total.skipped_sequences += 1;
                continue;
            }
            total.sequences += 1;
            total.length_bp += record.seq.len() as u64;

            for hash in hasher.hashes(&record.seq) {
                if target_hashes.len() >= cap {
                    break;
                }
                target_hashes.insert(hash);
            }
            if target_hashes.len() >= cap {
                break 'files;
            }
        }
    }

    let count = target_hashes.len() as u64;
    scratch.store(target, &target_hashes)?;
    Ok((count, total))
}
