use crate::filter::optimal_bins;
use crate::serialise::load_filter;
use anyhow::Result;
use clap::Parser;
use rustc_hash::FxHashMap;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(about = "Print the metadata of a built filter")]
pub struct InspectArgs {
    /// Filter file produced by `ibfx build`
    #[arg(short, long)]
    pub input: PathBuf,

    /// Also list per-target hash counts and bins
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

pub fn run(args: &InspectArgs) -> Result<()> {
    let filter = load_filter(&args.input)?;

    let (major, minor, patch) = filter.version;
    println!("version        {major}.{minor}.{patch}");
    print!("{}", filter.ibf_config);
    println!("targets        {}", filter.hashes_count.len());
    println!("technical bins {}", filter.bin_map.len());
    let bits = optimal_bins(filter.ibf_config.n_bins) * filter.ibf_config.bin_size_bits;
    println!("filter size    {:.2}MB ({bits} bits)", bits as f64 / 8_388_608.0);

    if args.verbose {
        let mut bins_per_target: FxHashMap<&str, u64> = FxHashMap::default();
        for (_, target) in &filter.bin_map {
            *bins_per_target.entry(target.as_str()).or_insert(0) += 1;
        }
        for (target, count) in &filter.hashes_count {
            let bins = bins_per_target.get(target.as_str()).copied().unwrap_or(0);
            println!(" - {target}: {count} hashes in {bins} bin(s)");
        }
    }

    Ok(())
}
