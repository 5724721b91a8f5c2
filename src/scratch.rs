use crate::manifest::HashesCount;
use anyhow::{Context, Result, bail};
use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use memmap2::Mmap;
use rustc_hash::FxHashSet;
use std::{
    fs::{self, File, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

/// Per-target overflow between extraction and IBF population: one
/// `<target>.min` file per target, a raw little-endian `u64` sequence
/// with no header. Written by exactly one extraction worker, read by the
/// population stage, deleted before the build returns.
#[derive(Debug, Clone)]
pub struct ScratchDir {
    dir: PathBuf,
}

impl ScratchDir {
    /// An empty path means the current directory.
    pub fn new(dir: &Path) -> Self {
        Self { dir: dir.to_path_buf() }
    }

    pub fn hash_path(&self, target: &str) -> PathBuf {
        let base = if self.dir.as_os_str().is_empty() {
            Path::new(".")
        } else {
            self.dir.as_path()
        };
        base.join(format!("{target}.min"))
    }

    /// Creates the directory when it does not exist yet; otherwise clears
    /// `.min` files left behind by an earlier run for the known targets.
    pub fn prepare(&self, hashes_count: &HashesCount) -> Result<()> {
        if !self.dir.as_os_str().is_empty() && !self.dir.exists() {
            fs::create_dir_all(&self.dir).with_context(|| {
                format!("Cannot create scratch directory: {}", self.dir.display())
            })?;
        } else {
            self.delete(hashes_count)?;
        }
        Ok(())
    }

    /// Appends the set to the target's scratch file.
    pub fn store(&self, target: &str, hashes: &FxHashSet<u64>) -> Result<()> {
        let path = self.hash_path(target);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Cannot open scratch file: {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        for &h in hashes {
            writer.write_u64::<LittleEndian>(h)?;
        }
        writer
            .flush()
            .with_context(|| format!("Cannot write scratch file: {}", path.display()))
    }

    pub fn load(&self, target: &str) -> Result<Vec<u64>> {
        let path = self.hash_path(target);
        let file = File::open(&path)
            .with_context(|| format!("Cannot open scratch file: {}", path.display()))?;
        let mmap = unsafe { Mmap::map(&file) }
            .with_context(|| format!("mmap failed for {}", path.display()))?;
        if mmap.len() % 8 != 0 {
            bail!("Corrupted scratch file (not aligned to u64): {}", path.display());
        }
        let mut hashes = Vec::with_capacity(mmap.len() / 8);
        for chunk in mmap.chunks_exact(8) {
            hashes.push(LittleEndian::read_u64(chunk));
        }
        Ok(hashes)
    }

    /// Removes the scratch files of every known target.
    pub fn delete(&self, hashes_count: &HashesCount) -> Result<()> {
        for target in hashes_count.keys() {
            let path = self.hash_path(target);
            if path.exists() {
                fs::remove_file(&path).with_context(|| {
                    format!("Cannot remove scratch file: {}", path.display())
                })?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn counts(targets: &[&str]) -> HashesCount {
        targets.iter().map(|t| (t.to_string(), 1u64)).collect()
    }

    #[test]
    fn store_then_load_roundtrips() {
        let dir = TempDir::new().unwrap();
        let scratch = ScratchDir::new(dir.path());
        let hashes: FxHashSet<u64> = [7u64, 1 << 40, u64::MAX].into_iter().collect();
        scratch.store("T", &hashes).unwrap();

        let mut loaded = scratch.load("T").unwrap();
        loaded.sort_unstable();
        let mut expected: Vec<u64> = hashes.into_iter().collect();
        expected.sort_unstable();
        assert_eq!(loaded, expected);
    }

    #[test]
    fn store_appends() {
        let dir = TempDir::new().unwrap();
        let scratch = ScratchDir::new(dir.path());
        scratch.store("T", &[1u64].into_iter().collect()).unwrap();
        scratch.store("T", &[2u64].into_iter().collect()).unwrap();
        assert_eq!(scratch.load("T").unwrap().len(), 2);
    }

    #[test]
    fn prepare_creates_missing_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("tmp").join("hashes");
        let scratch = ScratchDir::new(&nested);
        scratch.prepare(&counts(&["T"])).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn prepare_clears_stale_files_for_known_targets() {
        let dir = TempDir::new().unwrap();
        let scratch = ScratchDir::new(dir.path());
        scratch.store("T", &[1u64].into_iter().collect()).unwrap();
        scratch.prepare(&counts(&["T"])).unwrap();
        assert!(!scratch.hash_path("T").exists());
    }

    #[test]
    fn delete_removes_only_known_targets() {
        let dir = TempDir::new().unwrap();
        let scratch = ScratchDir::new(dir.path());
        scratch.store("A", &[1u64].into_iter().collect()).unwrap();
        scratch.store("B", &[2u64].into_iter().collect()).unwrap();
        scratch.delete(&counts(&["A"])).unwrap();
        assert!(!scratch.hash_path("A").exists());
        assert!(scratch.hash_path("B").exists());
    }

    #[test]
    fn load_rejects_misaligned_files() {
        let dir = TempDir::new().unwrap();
        let scratch = ScratchDir::new(dir.path());
        fs::write(scratch.hash_path("T"), [0u8; 7]).unwrap();
        assert!(scratch.load("T").is_err());
    }
}
