use crate::binmap::create_bin_map;
use crate::config::{Config, Mode};
use crate::extraction::count_and_store_hashes;
use crate::filter::{Ibf, IbfConfig, optimal_bins, optimal_hashes, true_false_positive};
use crate::manifest::{HashesCount, parse_manifest};
use crate::populate::populate_ibf;
use crate::scratch::ScratchDir;
use crate::serialise::save_filter;
use crate::stats::{Stats, print_stats};
use crate::utils::timing::StageTimer;
use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(
    about = "Build an interleaved Bloom filter from reference sequences",
    long_about = "Reads a tab-separated manifest of FASTA/FASTQ files grouped into targets, \
                  extracts canonical minimiser hashes, fits the filter geometry and writes a \
                  single serialised interleaved Bloom filter."
)]
pub struct BuildArgs {
    /// Tab-separated manifest: file path [<tab> target]
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output filter file
    #[arg(short, long)]
    pub output: PathBuf,

    /// Folder for the temporary .min hash files (default: current directory)
    #[arg(long, default_value = "")]
    pub tmp_output_folder: PathBuf,

    #[arg(short, long, default_value_t = 19)]
    pub kmer_size: u8,

    #[arg(short, long, default_value_t = 31)]
    pub window_size: u32,

    /// Skip sequences shorter than this many bases
    #[arg(long, default_value_t = 0)]
    pub min_length: u64,

    /// Maximum false positive rate per target
    #[arg(long, default_value_t = 0.05)]
    pub max_fp: f64,

    /// Fixed filter size in MiB; overrides --max-fp
    #[arg(long, default_value_t = 0.0)]
    pub filter_size: f64,

    /// Hash functions per bin; 0 derives the count from the bin size
    #[arg(long, default_value_t = 0)]
    pub hash_functions: u8,

    #[arg(long, default_value_t = 5)]
    pub max_hash_functions: u8,

    /// Trade-off for the geometry search
    #[arg(short, long, value_enum, default_value_t = Mode::Avg)]
    pub mode: Mode,

    /// Threads for extraction and filter population
    #[arg(short = 't', long, default_value_t = num_cpus::get())]
    pub threads: usize,

    #[arg(short, long, default_value_t = false)]
    pub quiet: bool,

    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl BuildArgs {
    pub fn to_config(&self) -> Config {
        Config {
            input_file: self.input.clone(),
            output_file: self.output.clone(),
            tmp_output_folder: self.tmp_output_folder.clone(),
            kmer_size: self.kmer_size,
            window_size: self.window_size,
            min_length: self.min_length,
            max_fp: self.max_fp,
            filter_size: self.filter_size,
            hash_functions: self.hash_functions,
            max_hash_functions: self.max_hash_functions,
            mode: self.mode,
            threads: self.threads,
            quiet: self.quiet,
            verbose: self.verbose,
        }
    }
}

pub fn run(args: &BuildArgs) -> Result<()> {
    build(args.to_config())
}

/// The whole pipeline: manifest -> scratch prep -> parallel extraction ->
/// geometry fit -> bin map -> parallel population -> scratch cleanup ->
/// serialisation.
pub fn build(config: Config) -> Result<()> {
    config.validate()?;
    if config.verbose {
        eprint!("{config}");
    }

    let started = Instant::now();
    let timer = StageTimer::new(config.verbose);
    let mut stats = Stats::default();

    let mut ibf_config = IbfConfig {
        kmer_size: config.kmer_size,
        window_size: config.window_size,
        ..IbfConfig::default()
    };

    let mut hashes_count = HashesCount::default();
    let input_map = timer.time("parse manifest", || {
        parse_manifest(&config.input_file, &mut hashes_count, config.quiet, &mut stats.total)
    })?;
    if input_map.is_empty() {
        bail!("No valid input files");
    }

    let scratch = ScratchDir::new(&config.tmp_output_folder);
    scratch.prepare(&hashes_count)?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads)
        .build()
        .context("Cannot build thread pool")?;

    let totals = timer.time("count/store hashes", || {
        pool.install(|| count_and_store_hashes(&input_map, &mut hashes_count, &config, &scratch))
    })?;
    stats.add_totals(&totals);

    timer.time("estimate params", || {
        optimal_hashes(
            config.max_fp,
            config.filter_size,
            &mut ibf_config,
            &hashes_count,
            config.hash_functions,
            config.max_hash_functions,
            config.mode,
        );
    });
    if ibf_config.n_bins == 0 {
        bail!("No valid sequences to build");
    }
    let (true_max_fp, true_avg_fp) = true_false_positive(
        &hashes_count,
        ibf_config.max_hashes_bin,
        ibf_config.bin_size_bits,
        ibf_config.hash_functions,
    );
    ibf_config.true_max_fp = true_max_fp;
    ibf_config.true_avg_fp = true_avg_fp;

    if config.verbose {
        eprint!("{ibf_config}");
        let bits = optimal_bins(ibf_config.n_bins) * ibf_config.bin_size_bits;
        eprintln!("Filter size: {} Bits ({:.2} Megabytes)", bits, bits as f64 / 8_388_608.0);
    }

    let bin_map = create_bin_map(&ibf_config, &hashes_count)?;

    let ibf = Ibf::new(ibf_config.n_bins, ibf_config.bin_size_bits, ibf_config.hash_functions)?;
    timer.time("build filter", || pool.install(|| populate_ibf(&ibf, &bin_map, &scratch)))?;

    scratch.delete(&hashes_count)?;

    timer.time("save filter", || {
        save_filter(&config, &ibf, &ibf_config, &hashes_count, &bin_map)
    })?;

    if !config.quiet {
        if config.verbose {
            timer.report("ibfx build");
        }
        print_stats(&stats, &ibf_config, started.elapsed());
    }

    Ok(())
}
