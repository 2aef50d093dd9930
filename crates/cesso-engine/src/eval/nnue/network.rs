//! NNUE network structure and forward pass.
//!
//! Network weights are an external asset (trained via a separate pipeline,
//! not part of this crate); loading the trained binary is out of scope here.
//! [`Network::get`] loads from the path named by `CESSO_NNUE_PATH` if set,
//! falling back to a zeroed network so the evaluator is always well-formed.

use std::sync::OnceLock;

use super::accumulator::Accumulator;

/// Hidden-layer dimension: 1024 neurons.
pub const HIDDEN: usize = 1024;

/// Number of output buckets (MaterialCount<8>).
pub const NUM_BUCKETS: usize = 8;

/// First-layer quantization factor.
const QA: i16 = 255;

/// Output-layer quantization factor.
const QB: i16 = 64;

/// Evaluation scale (maps to centipawns).
const SCALE: i32 = 400;

/// Quantized NNUE network loaded at compile time.
///
/// Binary layout (little-endian, `repr(C)`):
/// - `feature_weights`: 768 [`Accumulator`]s (768 * 1024 i16)
/// - `feature_bias`: 1 [`Accumulator`] (1024 i16)
/// - `output_weights`: NUM_BUCKETS * 2 * HIDDEN i16 (transposed, bucket-contiguous)
/// - `output_bias`: NUM_BUCKETS i16
#[repr(C)]
pub struct Network {
    /// Column-major `HIDDEN x 768` weight matrix. Quantization: QA.
    pub(crate) feature_weights: [Accumulator; 768],
    /// Bias vector of dimension HIDDEN. Quantization: QA.
    pub(crate) feature_bias: Accumulator,
    /// Row vectors `NUM_BUCKETS x (2 * HIDDEN)` output weights, bucket-contiguous. Quantization: QB.
    output_weights: [i16; NUM_BUCKETS * 2 * HIDDEN],
    /// Per-bucket scalar output bias. Quantization: QA * QB.
    output_bias: [i16; NUM_BUCKETS],
}

static NNUE: OnceLock<Network> = OnceLock::new();

impl Network {
    /// A network whose weights and biases are all zero.
    ///
    /// Evaluates every position to 0; a well-formed placeholder until a
    /// trained binary is supplied via `CESSO_NNUE_PATH`.
    fn zeroed() -> Network {
        Network {
            feature_weights: [Accumulator::zeroed(); 768],
            feature_bias: Accumulator::zeroed(),
            output_weights: [0; NUM_BUCKETS * 2 * HIDDEN],
            output_bias: [0; NUM_BUCKETS],
        }
    }

    /// Load a network from a raw little-endian binary in the layout
    /// documented on [`Network`]. Returns `None` if `bytes` isn't exactly
    /// `size_of::<Network>()` long.
    fn from_bytes(bytes: &[u8]) -> Option<Network> {
        if bytes.len() != std::mem::size_of::<Network>() {
            return None;
        }
        // SAFETY: Network is `repr(C)` plain-old-data and `bytes` was just
        // checked to match its size exactly.
        Some(unsafe { std::ptr::read_unaligned(bytes.as_ptr() as *const Network) })
    }

    /// Return a reference to the process-wide NNUE network.
    ///
    /// Loads from the file named by the `CESSO_NNUE_PATH` environment
    /// variable on first call; falls back to a zeroed network if the
    /// variable is unset or the file can't be read or parsed.
    pub fn get() -> &'static Network {
        NNUE.get_or_init(|| {
            std::env::var_os("CESSO_NNUE_PATH")
                .and_then(|path| std::fs::read(path).ok())
                .and_then(|bytes| Network::from_bytes(&bytes))
                .unwrap_or_else(Network::zeroed)
        })
    }

    /// Forward pass: SCReLU activation, output dequantization.
    ///
    /// Returns centipawn evaluation from the `us` perspective.
    /// `bucket` selects the output head corresponding to the current material count.
    pub fn evaluate(&self, us: &Accumulator, them: &Accumulator, bucket: usize) -> i32 {
        let mut output = 0i32;
        let base = bucket * 2 * HIDDEN;

        for (&x, &w) in us.vals.iter().zip(&self.output_weights[base..base + HIDDEN]) {
            output += screlu(x) * i32::from(w);
        }

        for (&x, &w) in them.vals.iter().zip(&self.output_weights[base + HIDDEN..base + 2 * HIDDEN]) {
            output += screlu(x) * i32::from(w);
        }

        // Dequantize: QA*QA*QB -> QA*QB
        output /= i32::from(QA);
        output += i32::from(self.output_bias[bucket]);
        output *= SCALE;
        // Final dequantization: remove QA*QB
        output /= i32::from(QA) * i32::from(QB);

        output
    }
}

/// SCReLU activation: clamp to [0, QA] then square.
#[inline]
fn screlu(x: i16) -> i32 {
    let y = i32::from(x).clamp(0, i32::from(QA));
    y * y
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeroed_network_forward_pass_is_zero() {
        let net = Network::zeroed();
        let us = Accumulator::zeroed();
        let them = Accumulator::zeroed();
        assert_eq!(net.evaluate(&us, &them, 0), 0);
    }

    #[test]
    fn output_bias_alone_scales_to_centipawns() {
        let mut net = Network::zeroed();
        net.output_bias[0] = i16::from(QA) * i16::from(QB);
        let us = Accumulator::zeroed();
        let them = Accumulator::zeroed();
        assert_eq!(net.evaluate(&us, &them, 0), SCALE);
    }

    #[test]
    fn from_bytes_rejects_wrong_length() {
        assert!(Network::from_bytes(&[0u8; 16]).is_none());
    }

    #[test]
    fn from_bytes_accepts_exact_length() {
        let bytes = vec![0u8; std::mem::size_of::<Network>()];
        assert!(Network::from_bytes(&bytes).is_some());
    }
}
