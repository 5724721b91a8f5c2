use crate::binmap::BinSpan;
use crate::config::Config;
use crate::filter::{Ibf, IbfConfig};
use crate::manifest::HashesCount;
use anyhow::{Context, Result};
use bincode2::{deserialize_from, serialize_into};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

// Bumped together with the crate version; the query-side tool checks it.
pub const VERSION_MAJOR: u32 = 0;
pub const VERSION_MINOR: u32 = 1;
pub const VERSION_PATCH: u32 = 0;

/// A loaded filter file, header blocks plus the bit matrix.
#[derive(Debug)]
pub struct FilterFile {
    pub version: (u32, u32, u32),
    pub ibf_config: IbfConfig,
    pub hashes_count: Vec<(String, u64)>,
    pub bin_map: Vec<(u64, String)>,
    pub ibf: Ibf,
}

/// Writes the filter file: version triple, `IbfConfig`, per-target hash
/// counts, the `(bin, target)` map, and the IBF payload, in that order.
/// Strings are length-prefixed and everything is little-endian, so the
/// layout is stable across runs and platforms.
pub fn save_filter(
    config: &Config,
    ibf: &Ibf,
    ibf_config: &IbfConfig,
    hashes_count: &HashesCount,
    bin_map: &[BinSpan],
) -> Result<()> {
    let file = File::create(&config.output_file).with_context(|| {
        format!("Cannot create output file: {}", config.output_file.display())
    })?;
    let mut writer = BufWriter::new(file);

    // start/end indices only matter during construction
    let bin_map_std: Vec<(u64, String)> = bin_map
        .iter()
        .enumerate()
        .map(|(binno, span)| (binno as u64, span.target.clone()))
        .collect();
    let hashes_count_std: Vec<(String, u64)> =
        hashes_count.iter().map(|(target, &count)| (target.clone(), count)).collect();

    serialize_into(&mut writer, &(VERSION_MAJOR, VERSION_MINOR, VERSION_PATCH))?;
    serialize_into(&mut writer, ibf_config)?;
    serialize_into(&mut writer, &hashes_count_std)?;
    serialize_into(&mut writer, &bin_map_std)?;
    ibf.write_into(&mut writer)?;

    writer.flush().with_context(|| {
        format!("Cannot write output file: {}", config.output_file.display())
    })
}

pub fn load_filter(path: &Path) -> Result<FilterFile> {
    let file = File::open(path)
        .with_context(|| format!("Cannot open filter file: {}", path.display()))?;
    let mut reader = BufReader::new(file);

    let version: (u32, u32, u32) = deserialize_from(&mut reader)
        .with_context(|| format!("Not a filter file: {}", path.display()))?;
    let ibf_config: IbfConfig = deserialize_from(&mut reader)
        .with_context(|| format!("Corrupted filter config in {}", path.display()))?;
    let hashes_count: Vec<(String, u64)> = deserialize_from(&mut reader)
        .with_context(|| format!("Corrupted hash counts in {}", path.display()))?;
    let bin_map: Vec<(u64, String)> = deserialize_from(&mut reader)
        .with_context(|| format!("Corrupted bin map in {}", path.display()))?;
    let ibf = Ibf::read_from(&mut reader)
        .with_context(|| format!("Corrupted IBF payload in {}", path.display()))?;

    Ok(FilterFile {
        version,
        ibf_config,
        hashes_count,
        bin_map,
        ibf,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Mode;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn test_config(output_file: PathBuf) -> Config {
        Config {
            input_file: PathBuf::new(),
            output_file,
            tmp_output_folder: PathBuf::new(),
            kmer_size: 19,
            window_size: 31,
            min_length: 0,
            max_fp: 0.05,
            filter_size: 0.0,
            hash_functions: 0,
            max_hash_functions: 5,
            mode: Mode::Avg,
            threads: 1,
            quiet: true,
            verbose: false,
        }
    }

    fn fixture() -> (Ibf, IbfConfig, HashesCount, Vec<BinSpan>) {
        let ibf = Ibf::new(3, 1024, 3).unwrap();
        ibf.insert(17, 0);
        ibf.insert(99, 2);
        let ibf_config = IbfConfig {
            kmer_size: 19,
            window_size: 31,
            max_hashes_bin: 15,
            n_bins: 3,
            bin_size_bits: 1024,
            hash_functions: 3,
            max_fp: 0.05,
            true_max_fp: 0.01,
            true_avg_fp: 0.005,
        };
        let hashes_count: HashesCount =
            [("A".to_string(), 10u64), ("B".to_string(), 20)].into_iter().collect();
        let bin_map = vec![
            BinSpan { target: "A".into(), hashes_idx_start: 0, hashes_idx_end: 9 },
            BinSpan { target: "B".into(), hashes_idx_start: 0, hashes_idx_end: 9 },
            BinSpan { target: "B".into(), hashes_idx_start: 10, hashes_idx_end: 19 },
        ];
        (ibf, ibf_config, hashes_count, bin_map)
    }

    #[test]
    fn filter_file_roundtrips() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("test.ibf");
        let (ibf, ibf_config, hashes_count, bin_map) = fixture();
        save_filter(&test_config(out.clone()), &ibf, &ibf_config, &hashes_count, &bin_map)
            .unwrap();

        let loaded = load_filter(&out).unwrap();
        assert_eq!(loaded.version, (VERSION_MAJOR, VERSION_MINOR, VERSION_PATCH));
        assert_eq!(loaded.ibf_config.n_bins, 3);
        assert_eq!(loaded.ibf_config.max_hashes_bin, 15);
        assert_eq!(
            loaded.hashes_count,
            vec![("A".to_string(), 10), ("B".to_string(), 20)]
        );
        assert_eq!(
            loaded.bin_map,
            vec![(0, "A".to_string()), (1, "B".to_string()), (2, "B".to_string())]
        );
        assert_eq!(loaded.ibf.snapshot(), ibf.snapshot());
    }

    #[test]
    fn serialisation_is_deterministic() {
        let dir = TempDir::new().unwrap();
        let (ibf, ibf_config, hashes_count, bin_map) = fixture();
        let out1 = dir.path().join("one.ibf");
        let out2 = dir.path().join("two.ibf");
        save_filter(&test_config(out1.clone()), &ibf, &ibf_config, &hashes_count, &bin_map)
            .unwrap();
        save_filter(&test_config(out2.clone()), &ibf, &ibf_config, &hashes_count, &bin_map)
            .unwrap();
        assert_eq!(fs::read(&out1).unwrap(), fs::read(&out2).unwrap());
    }

    #[test]
    fn garbage_input_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("junk.ibf");
        fs::write(&path, b"definitely not a filter").unwrap();
        assert!(load_filter(&path).is_err());
    }
}
