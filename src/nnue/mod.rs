// src/nnue/mod.rs
//! NNUE (Efficiently Updatable Neural Network) position evaluation.
//!
//! Architecture: (768 -> 768)x2 -> SCReLU -> 2*768 -> 1
//!
//! - Input: 768 binary features per perspective (2 colors x 6 pieces x 64
//!   squares, king-relative orientation in `features.rs`)
//! - Feature transformer: one i16 accumulator per perspective, maintained
//!   incrementally by `accumulator.rs`
//! - SCReLU activation: clamp(x, 0, QA) squared on both accumulators
//! - Output: dot product with i16 weights, rescaled to centipawns
//!
//! All arithmetic is fixed-point integer and exactly reproducible: the AVX2
//! path and the scalar path compute bit-identical results (the scalar code
//! reproduces the i16 truncation of `_mm256_mullo_epi16`).

pub mod accumulator;
pub mod features;

use crate::defs::{Color, WHITE};
use accumulator::{Accumulator, HIDDEN_SIZE};
use anyhow::{bail, Result};
use features::NUM_FEATURES;
use std::io::Read;
use std::path::Path;

#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

// ============================================================================
// QUANTIZATION CONSTANTS
// ============================================================================

/// Accumulator quantization factor (clamp ceiling for SCReLU).
pub const QA: i16 = 255;

/// Output weight quantization factor. Chosen so v*w fits in i16 for the
/// mullo/madd SIMD trick: 255 * 127 = 32385 < 32767.
pub const QB: i32 = 64;

/// Centipawn rescale: sigmoid(cp / SCALE) approximates win probability.
pub const SCALE: i32 = 400;

pub const QAB: i32 = QA as i32 * QB;

/// Magic bytes for the weight file format.
pub const NNUE_MAGIC: &[u8; 4] = b"LRCH";

pub const NNUE_VERSION: u32 = 1;

pub const DEFAULT_NNUE_PATH: &str = "larch.nnue";

// ============================================================================
// NETWORK
// ============================================================================

/// The pre-trained, read-only parameter set. Loaded once at startup, shared
/// by reference into every search worker, never mutated.
pub struct NnueNetwork {
    /// Feature transformer weights, row-major:
    /// `ft_weights[feature * HIDDEN_SIZE + i]`.
    pub ft_weights: Vec<i16>,
    /// Feature transformer biases: `[HIDDEN_SIZE]`.
    pub ft_biases: Vec<i16>,
    /// Output weights: `[2 * HIDDEN_SIZE]`, "us" half then "them" half.
    pub output_weights: Vec<i16>,
    pub output_bias: i16,
}

impl NnueNetwork {
    /// The weight column for one feature.
    #[inline]
    pub fn ft_column(&self, feature: usize) -> &[i16] {
        &self.ft_weights[feature * HIDDEN_SIZE..(feature + 1) * HIDDEN_SIZE]
    }

    /// Evaluate an accumulator pair from `stm`'s perspective, in centipawns.
    #[inline]
    pub fn evaluate(&self, acc: &Accumulator, stm: Color) -> i32 {
        let us = &acc.views[stm as usize];
        let them = &acc.views[(stm ^ 1) as usize];

        #[cfg(target_arch = "x86_64")]
        {
            if is_x86_feature_detected!("avx2") {
                return unsafe { self.evaluate_avx2(us, them) };
            }
        }

        self.evaluate_scalar(us, them)
    }

    /// Scalar path. Mirrors the SIMD arithmetic exactly: the v*w product is
    /// truncated to i16 before the final multiply, and sums wrap in i32.
    fn evaluate_scalar(&self, us: &[i16; HIDDEN_SIZE], them: &[i16; HIDDEN_SIZE]) -> i32 {
        let mut sum: i32 = 0;

        for i in 0..HIDDEN_SIZE {
            let v = us[i].clamp(0, QA);
            let vw = v.wrapping_mul(self.output_weights[i]);
            sum = sum.wrapping_add(vw as i32 * v as i32);
        }
        for i in 0..HIDDEN_SIZE {
            let v = them[i].clamp(0, QA);
            let vw = v.wrapping_mul(self.output_weights[HIDDEN_SIZE + i]);
            sum = sum.wrapping_add(vw as i32 * v as i32);
        }

        (sum / QA as i32 + self.output_bias as i32) * SCALE / QAB
    }

    /// AVX2 path: 16 i16 lanes per iteration. Clamp, multiply by the weight
    /// (low 16 bits), then madd by the clamped value to get the squared-ReLU
    /// dot product in i32 lanes.
    #[cfg(target_arch = "x86_64")]
    #[target_feature(enable = "avx2")]
    unsafe fn evaluate_avx2(&self, us: &[i16; HIDDEN_SIZE], them: &[i16; HIDDEN_SIZE]) -> i32 {
        let zero = _mm256_setzero_si256();
        let qa_vec = _mm256_set1_epi16(QA);

        let mut sum = _mm256_setzero_si256();

        for (acc, weights) in [
            (us.as_ptr(), self.output_weights.as_ptr()),
            (them.as_ptr(), self.output_weights.as_ptr().add(HIDDEN_SIZE)),
        ] {
            let mut i = 0;
            while i < HIDDEN_SIZE {
                let v = _mm256_loadu_si256(acc.add(i) as *const __m256i);
                let w = _mm256_loadu_si256(weights.add(i) as *const __m256i);

                let clamped = _mm256_min_epi16(_mm256_max_epi16(v, zero), qa_vec);
                let vw = _mm256_mullo_epi16(clamped, w);
                let prod = _mm256_madd_epi16(vw, clamped);

                sum = _mm256_add_epi32(sum, prod);
                i += 16;
            }
        }

        // Horizontal reduction of 8 i32 lanes.
        let hi128 = _mm256_extracti128_si256(sum, 1);
        let lo128 = _mm256_castsi256_si128(sum);
        let sum128 = _mm_add_epi32(lo128, hi128);
        let hi64 = _mm_shuffle_epi32(sum128, 0b_01_00_11_10);
        let sum64 = _mm_add_epi32(sum128, hi64);
        let hi32 = _mm_shuffle_epi32(sum64, 0b_00_00_00_01);
        let total = _mm_add_epi32(sum64, hi32);
        let dot = _mm_cvtsi128_si32(total);

        (dot / QA as i32 + self.output_bias as i32) * SCALE / QAB
    }

    /// Load weights from a binary file.
    ///
    /// Format (little-endian):
    /// - magic "LRCH" (4 bytes)
    /// - version: u32
    /// - hidden size: u32 (must equal `HIDDEN_SIZE`)
    /// - ft_weights: i16[768 * HIDDEN_SIZE]
    /// - ft_biases: i16[HIDDEN_SIZE]
    /// - output_weights: i16[2 * HIDDEN_SIZE]
    /// - output_bias: i16
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        Self::from_bytes(&data)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut cursor = std::io::Cursor::new(data);

        let mut magic = [0u8; 4];
        cursor.read_exact(&mut magic)?;
        if &magic != NNUE_MAGIC {
            bail!("bad NNUE magic: expected {:?}, got {:?}", NNUE_MAGIC, magic);
        }

        let mut buf4 = [0u8; 4];
        cursor.read_exact(&mut buf4)?;
        let version = u32::from_le_bytes(buf4);
        if version != NNUE_VERSION {
            bail!("unsupported NNUE version {} (expected {})", version, NNUE_VERSION);
        }

        cursor.read_exact(&mut buf4)?;
        let hidden = u32::from_le_bytes(buf4) as usize;
        if hidden != HIDDEN_SIZE {
            bail!("NNUE hidden size {} does not match build ({})", hidden, HIDDEN_SIZE);
        }

        let ft_weights = read_i16_vec(&mut cursor, NUM_FEATURES * HIDDEN_SIZE)?;
        let ft_biases = read_i16_vec(&mut cursor, HIDDEN_SIZE)?;
        let output_weights = read_i16_vec(&mut cursor, 2 * HIDDEN_SIZE)?;

        let mut buf2 = [0u8; 2];
        cursor.read_exact(&mut buf2)?;
        let output_bias = i16::from_le_bytes(buf2);

        Ok(Self {
            ft_weights,
            ft_biases,
            output_weights,
            output_bias,
        })
    }

    /// Serialize back to the binary format.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(
            12 + 2 * (self.ft_weights.len() + self.ft_biases.len() + self.output_weights.len())
                + 2,
        );
        buf.extend_from_slice(NNUE_MAGIC);
        buf.extend_from_slice(&NNUE_VERSION.to_le_bytes());
        buf.extend_from_slice(&(HIDDEN_SIZE as u32).to_le_bytes());
        for &w in &self.ft_weights {
            buf.extend_from_slice(&w.to_le_bytes());
        }
        for &b in &self.ft_biases {
            buf.extend_from_slice(&b.to_le_bytes());
        }
        for &w in &self.output_weights {
            buf.extend_from_slice(&w.to_le_bytes());
        }
        buf.extend_from_slice(&self.output_bias.to_le_bytes());
        buf
    }

    /// Deterministic pseudo-random weights for tests and bootstrapping.
    /// Values are kept in [-128, 127] so the i16 product trick never
    /// overflows.
    pub fn random(seed: u64) -> Self {
        let mut state = seed | 1;
        let mut next = || {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            ((state >> 48) as i16) / 256
        };

        let mut ft_weights = vec![0i16; NUM_FEATURES * HIDDEN_SIZE];
        let mut ft_biases = vec![0i16; HIDDEN_SIZE];
        let mut output_weights = vec![0i16; 2 * HIDDEN_SIZE];
        for w in ft_weights.iter_mut() {
            *w = next();
        }
        for b in ft_biases.iter_mut() {
            *b = next();
        }
        for w in output_weights.iter_mut() {
            *w = next();
        }

        Self {
            ft_weights,
            ft_biases,
            output_weights,
            output_bias: 0,
        }
    }

    /// Evaluate a position from scratch, without accumulator reuse.
    pub fn evaluate_position(&self, pos: &crate::position::Position) -> i32 {
        let mut stack = accumulator::AccumulatorStack::new();
        stack.reset(self, pos);
        self.evaluate(stack.current(), pos.side)
    }
}

fn read_i16_vec<R: Read>(reader: &mut R, count: usize) -> Result<Vec<i16>> {
    let mut bytes = vec![0u8; count * 2];
    reader.read_exact(&mut bytes)?;
    Ok(bytes
        .chunks_exact(2)
        .map(|c| i16::from_le_bytes([c[0], c[1]]))
        .collect())
}
