// src/lib.rs
pub mod binmap;
pub mod build;
pub mod config;
pub mod extraction;
pub mod filter;
pub mod hashing;
pub mod inspect;
pub mod manifest;
pub mod populate;
pub mod scratch;
pub mod sequence;
pub mod serialise;
pub mod stats;
pub mod utils;

pub use binmap::{BinSpan, create_bin_map};
pub use config::{Config, Mode};
pub use filter::{Ibf, IbfConfig, optimal_bins, optimal_hashes, true_false_positive};
pub use hashing::MinimiserHasher;
pub use manifest::{HashesCount, parse_manifest};
pub use scratch::ScratchDir;
pub use sequence::{SequenceReader, SequenceRecord};
pub use serialise::{FilterFile, load_filter, save_filter};
