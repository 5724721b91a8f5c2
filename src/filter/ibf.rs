use crate::filter::math::optimal_bins;
use anyhow::{Context, Result, bail};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::{
    io::{Read, Write},
    sync::atomic::{AtomicU64, Ordering},
};

// One odd mixing constant per hash function; five is the supported cap.
const HASH_SEEDS: [u64; 5] = [
    0x9E37_79B9_7F4A_7C15,
    0xC2B2_AE3D_27D4_EB4F,
    0x1656_67B1_9E37_79F9,
    0xD6E8_FEB8_6659_FD93,
    0xFF51_AFD7_ED55_8CCD,
];

/// Interleaved Bloom filter bit matrix. The physical bin count is the
/// next multiple of 64 above the requested (technical) count, and the bit
/// for hash position `p` of bin `b` sits at absolute bit
/// `p * physical_bins + b`, so one 64-bit word always holds the same
/// position of one aligned 64-bin group. Insertions OR whole words
/// atomically, which keeps concurrent writers safe regardless of how bins
/// are batched across threads.
#[derive(Debug)]
pub struct Ibf {
    technical_bins: u64,
    bin_count: u64,
    bin_size_bits: u64,
    hash_functions: u8,
    words: Vec<AtomicU64>,
}

impl Ibf {
    pub fn new(technical_bins: u64, bin_size_bits: u64, hash_functions: u8) -> Result<Self> {
        if technical_bins == 0 || bin_size_bits == 0 {
            bail!("IBF needs at least one bin and a non-zero bin size");
        }
        if hash_functions == 0 || hash_functions as usize > HASH_SEEDS.len() {
            bail!(
                "IBF supports 1..={} hash functions (got {})",
                HASH_SEEDS.len(),
                hash_functions
            );
        }
        let bin_count = optimal_bins(technical_bins);
        let total_bits = bin_count
            .checked_mul(bin_size_bits)
            .with_context(|| format!("IBF too large: {bin_count} bins x {bin_size_bits} bits"))?;
        let words = (0..total_bits / 64).map(|_| AtomicU64::new(0)).collect();
        Ok(Self {
            technical_bins,
            bin_count,
            bin_size_bits,
            hash_functions,
            words,
        })
    }

    pub fn technical_bins(&self) -> u64 {
        self.technical_bins
    }

    pub fn bin_count(&self) -> u64 {
        self.bin_count
    }

    pub fn bin_size_bits(&self) -> u64 {
        self.bin_size_bits
    }

    pub fn hash_functions(&self) -> u8 {
        self.hash_functions
    }

    /// Total size of the bit matrix.
    pub fn size_bits(&self) -> u64 {
        self.bin_count * self.bin_size_bits
    }

    #[inline]
    fn positions(&self, hash: u64) -> impl Iterator<Item = u64> + '_ {
        HASH_SEEDS[..self.hash_functions as usize].iter().map(move |&seed| {
            let mut h = hash.wrapping_mul(seed);
            h ^= h >> 33;
            h % self.bin_size_bits
        })
    }

    /// Sets the bits of `hash` in the given technical bin.
    #[inline]
    pub fn insert(&self, hash: u64, bin_index: u64) {
        debug_assert!(bin_index < self.technical_bins);
        for pos in self.positions(hash) {
            let bit = pos * self.bin_count + bin_index;
            self.words[(bit / 64) as usize].fetch_or(1 << (bit % 64), Ordering::Relaxed);
        }
    }

    /// Streams the geometry header and the raw little-endian words.
    pub fn write_into<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u64::<LittleEndian>(self.technical_bins)?;
        writer.write_u64::<LittleEndian>(self.bin_count)?;
        writer.write_u64::<LittleEndian>(self.bin_size_bits)?;
        writer.write_u8(self.hash_functions)?;
        writer.write_u64::<LittleEndian>(self.words.len() as u64)?;
        for word in &self.words {
            writer.write_u64::<LittleEndian>(word.load(Ordering::Relaxed))?;
        }
        Ok(())
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let technical_bins = reader.read_u64::<LittleEndian>()?;
        let bin_count = reader.read_u64::<LittleEndian>()?;
        let bin_size_bits = reader.read_u64::<LittleEndian>()?;
        let hash_functions = reader.read_u8()?;
        let n_words = reader.read_u64::<LittleEndian>()?;

        if bin_count != optimal_bins(technical_bins) {
            bail!("Corrupted IBF: physical bin count {bin_count} does not fit {technical_bins} bins");
        }
        let expected_words = bin_count
            .checked_mul(bin_size_bits)
            .map(|bits| bits / 64)
            .with_context(|| "Corrupted IBF: geometry overflows")?;
        if n_words != expected_words {
            bail!("Corrupted IBF: word count {n_words} does not match geometry");
        }
        let mut words = Vec::with_capacity(n_words as usize);
        for _ in 0..n_words {
            words.push(AtomicU64::new(reader.read_u64::<LittleEndian>()?));
        }
        Ok(Self {
            technical_bins,
            bin_count,
            bin_size_bits,
            hash_functions,
            words,
        })
    }

    #[cfg(test)]
    fn is_set(&self, pos: u64, bin_index: u64) -> bool {
        let bit = pos * self.bin_count + bin_index;
        self.words[(bit / 64) as usize].load(Ordering::Relaxed) & (1 << (bit % 64)) != 0
    }

    #[cfg(test)]
    pub(crate) fn snapshot(&self) -> Vec<u64> {
        self.words.iter().map(|w| w.load(Ordering::Relaxed)).collect()
    }
}
