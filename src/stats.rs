use crate::filter::{IbfConfig, optimal_bins};
use std::time::Duration;

/// Per-worker counters, merged once the extraction workers have joined.
#[derive(Debug, Default, Clone)]
pub struct Total {
    pub files: u64,
    pub invalid_files: u64,
    pub sequences: u64,
    pub skipped_sequences: u64,
    pub length_bp: u64,
    pub parse_errors: u64,
}

impl Total {
    pub fn merge(&mut self, other: &Total) {
        self.files += other.files;
        self.invalid_files += other.invalid_files;
        self.sequences += other.sequences;
        self.skipped_sequences += other.skipped_sequences;
        self.length_bp += other.length_bp;
        self.parse_errors += other.parse_errors;
    }
}

#[derive(Debug, Default)]
pub struct Stats {
    pub total: Total,
}

impl Stats {
    pub fn add_totals(&mut self, totals: &[Total]) {
        for t in totals {
            self.total.merge(t);
        }
    }
}

pub fn print_stats(stats: &Stats, ibf_config: &IbfConfig, elapsed: Duration) {
    let secs = elapsed.as_secs_f64();
    let mbp = stats.total.length_bp as f64 / 1_000_000.0;
    let rate = if secs > 0.0 { mbp / (secs / 60.0) } else { 0.0 };
    eprintln!(
        "ibfx processed {} sequences / {} files ({:.2} Mbp) in {:.2} seconds ({:.2} Mbp/m)",
        stats.total.sequences, stats.total.files, mbp, secs, rate
    );

    if stats.total.invalid_files > 0 {
        eprintln!(" - {} invalid files skipped", stats.total.invalid_files);
    }
    if stats.total.parse_errors > 0 {
        eprintln!(" - {} files with parse errors skipped", stats.total.parse_errors);
    }
    if stats.total.skipped_sequences > 0 {
        eprintln!(" - {} sequences skipped", stats.total.skipped_sequences);
    }

    eprintln!(
        " - max. false positive: {:.4} (avg.: {:.4})",
        ibf_config.true_max_fp, ibf_config.true_avg_fp
    );
    eprintln!(
        " - filter size: {:.2}MB",
        (optimal_bins(ibf_config.n_bins) * ibf_config.bin_size_bits) as f64 / 8_388_608.0
    );
}
