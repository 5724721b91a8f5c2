pub mod ibf;
pub mod math;
pub mod optimise;

pub use ibf::Ibf;
pub use math::{
    bin_size, bin_size_fixed, correction_rate, false_positive, max_hashes, number_of_bins,
    optimal_bins, optimal_hash_functions,
};
pub use optimise::{IbfConfig, optimal_hashes, true_false_positive};
