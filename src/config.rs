use anyhow::{Result, bail};
use clap::ValueEnum;
use std::{fmt, path::PathBuf};

/// Weighting applied to the geometry search objective: `avg` balances
/// filter size (or FP) against bin count, `smaller`/`smallest` favour the
/// size/FP axis, `faster`/`fastest` favour fewer bins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    Avg,
    Smaller,
    Smallest,
    Faster,
    Fastest,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Mode::Avg => "avg",
            Mode::Smaller => "smaller",
            Mode::Smallest => "smallest",
            Mode::Faster => "faster",
            Mode::Fastest => "fastest",
        };
        f.write_str(s)
    }
}

/// Validated build parameters, assembled from the CLI arguments.
#[derive(Debug, Clone)]
pub struct Config {
    pub input_file: PathBuf,
    pub output_file: PathBuf,
    /// Scratch directory for the per-target hash files; empty means the
    /// current directory.
    pub tmp_output_folder: PathBuf,
    pub kmer_size: u8,
    pub window_size: u32,
    pub min_length: u64,
    /// Targeted maximum false positive rate; active when `filter_size` is 0.
    pub max_fp: f64,
    /// Fixed filter size in MiB; 0 disables it and `max_fp` governs.
    pub filter_size: f64,
    /// 0 means derive the count from the bin size.
    pub hash_functions: u8,
    pub max_hash_functions: u8,
    pub mode: Mode,
    pub threads: usize,
    pub quiet: bool,
    pub verbose: bool,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.kmer_size == 0 || self.kmer_size > 32 {
            bail!("--kmer-size must be in 1..=32 (got {})", self.kmer_size);
        }
        if self.window_size < self.kmer_size as u32 {
            bail!(
                "--window-size ({}) must be at least --kmer-size ({})",
                self.window_size,
                self.kmer_size
            );
        }
        if self.filter_size < 0.0 {
            bail!("--filter-size must not be negative");
        }
        if self.filter_size == 0.0 && !(self.max_fp > 0.0 && self.max_fp < 1.0) {
            bail!("--max-fp must be in (0, 1) when no --filter-size is given");
        }
        if self.max_hash_functions == 0 || self.max_hash_functions > 5 {
            bail!(
                "--max-hash-functions must be in 1..=5 (got {})",
                self.max_hash_functions
            );
        }
        if self.threads == 0 {
            bail!("--threads must be at least 1");
        }
        Ok(())
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--input-file       {}", self.input_file.display())?;
        writeln!(f, "--output-file      {}", self.output_file.display())?;
        writeln!(f, "--tmp-output-folder {}", self.tmp_output_folder.display())?;
        writeln!(f, "--kmer-size        {}", self.kmer_size)?;
        writeln!(f, "--window-size      {}", self.window_size)?;
        writeln!(f, "--min-length       {}", self.min_length)?;
        writeln!(f, "--max-fp           {}", self.max_fp)?;
        writeln!(f, "--filter-size      {}", self.filter_size)?;
        writeln!(f, "--hash-functions   {}", self.hash_functions)?;
        writeln!(f, "--max-hash-functions {}", self.max_hash_functions)?;
        writeln!(f, "--mode             {}", self.mode)?;
        writeln!(f, "--threads          {}", self.threads)
    }
}
