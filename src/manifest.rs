use crate::stats::Total;
use anyhow::{Context, Result};
use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use std::{
    fs::{self, File},
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

/// Hash-set cardinality per target, kept in manifest order so bin
/// numbering and serialisation are reproducible across runs.
pub type HashesCount = IndexMap<String, u64>;

/// Parses the tab-separated input manifest: `file [<tab> target]`.
///
/// Lines with a single field use the file's basename as target. Files that
/// are missing or empty are counted as invalid and skipped. Rows with more
/// than two fields are legacy entries and are ignored. Returns the map
/// `{target: [files]}` in manifest order and seeds `hashes_count` with a
/// zero entry per target.
pub fn parse_manifest(
    manifest: &Path,
    hashes_count: &mut HashesCount,
    quiet: bool,
    total: &mut Total,
) -> Result<IndexMap<String, Vec<PathBuf>>> {
    let file = File::open(manifest)
        .with_context(|| format!("Cannot open input manifest: {}", manifest.display()))?;
    let reader = BufReader::new(file);

    let mut input_map: IndexMap<String, Vec<PathBuf>> = IndexMap::new();
    let mut seen_files: FxHashSet<PathBuf> = FxHashSet::default();

    for line in reader.lines() {
        let line = line.with_context(|| format!("Error reading {}", manifest.display()))?;
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        let path = PathBuf::from(fields[0]);

        let valid = fs::metadata(&path).map(|m| m.is_file() && m.len() > 0).unwrap_or(false);
        if !valid {
            if !quiet {
                eprintln!("WARNING: input file not found/empty: {}", path.display());
            }
            total.invalid_files += 1;
            continue;
        }

        seen_files.insert(path.clone());

        match fields.len() {
            1 => {
                // target is the file itself, without its directory
                let target = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| fields[0].to_string());
                input_map.entry(target.clone()).or_default().push(path);
                hashes_count.entry(target).or_insert(0);
            }
            2 => {
                let target = fields[1].to_string();
                input_map.entry(target.clone()).or_default().push(path);
                hashes_count.entry(target).or_insert(0);
            }
            // legacy rows carried a per-sequence id as a third field
            _ => {}
        }
    }

    total.files = seen_files.len() as u64;
    Ok(input_map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    fn parse(dir: &TempDir, manifest: &str) -> (IndexMap<String, Vec<PathBuf>>, HashesCount, Total) {
        let mpath = write_file(dir, "manifest.tsv", manifest);
        let mut hashes_count = HashesCount::default();
        let mut total = Total::default();
        let map = parse_manifest(&mpath, &mut hashes_count, true, &mut total).unwrap();
        (map, hashes_count, total)
    }

    #[test]
    fn single_field_uses_basename_as_target() {
        let dir = TempDir::new().unwrap();
        let fa = write_file(&dir, "seqs.fa", ">s\nACGT\n");
        let (map, counts, total) = parse(&dir, &format!("{}\n", fa.display()));
        assert_eq!(map.len(), 1);
        assert_eq!(map["seqs.fa"], vec![fa]);
        assert_eq!(counts["seqs.fa"], 0);
        assert_eq!(total.files, 1);
        assert_eq!(total.invalid_files, 0);
    }

    #[test]
    fn two_fields_group_by_target() {
        let dir = TempDir::new().unwrap();
        let a = write_file(&dir, "a.fa", ">a\nACGT\n");
        let b = write_file(&dir, "b.fa", ">b\nACGT\n");
        let manifest = format!("{}\tT1\n{}\tT1\n", a.display(), b.display());
        let (map, counts, total) = parse(&dir, &manifest);
        assert_eq!(map.len(), 1);
        assert_eq!(map["T1"].len(), 2);
        assert_eq!(counts.len(), 1);
        assert_eq!(total.files, 2);
    }

    #[test]
    fn missing_and_empty_files_are_invalid() {
        let dir = TempDir::new().unwrap();
        let ok = write_file(&dir, "ok.fa", ">a\nACGT\n");
        let empty = write_file(&dir, "empty.fa", "");
        let manifest = format!(
            "{}\n{}\n{}/nope.fa\n",
            ok.display(),
            empty.display(),
            dir.path().display()
        );
        let (map, _, total) = parse(&dir, &manifest);
        assert_eq!(map.len(), 1);
        assert_eq!(total.invalid_files, 2);
        assert_eq!(total.files, 1);
    }

    #[test]
    fn distinct_file_count_ignores_repeats() {
        let dir = TempDir::new().unwrap();
        let a = write_file(&dir, "a.fa", ">a\nACGT\n");
        let manifest = format!("{}\tT\n{}\tT\n", a.display(), a.display());
        let (map, _, total) = parse(&dir, &manifest);
        // duplicates are kept in the file list, but counted once
        assert_eq!(map["T"].len(), 2);
        assert_eq!(total.files, 1);
    }

    #[test]
    fn legacy_three_field_rows_are_ignored() {
        let dir = TempDir::new().unwrap();
        let a = write_file(&dir, "a.fa", ">a\nACGT\n");
        let manifest = format!("{}\tT\tSEQID1\n", a.display());
        let (map, counts, total) = parse(&dir, &manifest);
        assert!(map.is_empty());
        assert!(counts.is_empty());
        // the file itself is still accounted for
        assert_eq!(total.files, 1);
    }

    #[test]
    fn unreadable_manifest_is_fatal() {
        let dir = TempDir::new().unwrap();
        let mut hashes_count = HashesCount::default();
        let mut total = Total::default();
        let missing = dir.path().join("no-such-manifest.tsv");
        assert!(parse_manifest(&missing, &mut hashes_count, true, &mut total).is_err());
    }
}
