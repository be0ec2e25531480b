/// Rate 1/4 mother code, constraint length 5.
#[derive(Debug, Default, Clone)]
pub struct ConvEncoder {
    /// Shift register, `delayed[0]` is the most recent input bit
    delayed: [u8; 4],
}

impl ConvEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn encode_bit(&mut self, bit: u8) -> [u8; 4] {
        let b = bit & 1;
        let [d0, d1, d2, d3] = self.delayed;
        let g1 = b ^ d0 ^ d3;
        let g2 = b ^ d1 ^ d2 ^ d3;
        let g3 = b ^ d0 ^ d1 ^ d3;
        let g4 = b ^ d0 ^ d2 ^ d3;
        self.delayed = [b, d0, d1, d2];
        [g1, g2, g3, g4]
    }

    /// Encodes `input` into `out`, which must hold `4 * input.len()` bits.
    pub fn encode(&mut self, input: &[u8], out: &mut [u8]) {
        assert!(out.len() >= 4 * input.len());
        for (i, &b) in input.iter().enumerate() {
            out[4 * i..4 * i + 4].copy_from_slice(&self.encode_bit(b));
        }
    }
}

/// Rate 2/3 puncturing: three of every eight mother code bits survive.
const PUNCT_P: [usize; 4] = [0, 1, 2, 5];
const PUNCT_T: usize = 3;
const PUNCT_PERIOD: usize = 8;

/// Position (1-based) in the mother code of punctured bit `j` (1-based).
#[inline]
fn mother_pos(j: usize) -> usize {
    let blk = (j - 1) / PUNCT_T;
    PUNCT_PERIOD * blk + PUNCT_P[j - PUNCT_T * blk]
}

/// Number of bits the 2/3 puncturer produces from `mother_bits` coded bits.
pub const fn punctured_len(mother_bits: usize) -> usize {
    mother_bits * PUNCT_T / PUNCT_PERIOD
}

pub fn puncture_2_3(mother: &[u8], out: &mut [u8]) {
    for j in 1..=out.len() {
        out[j - 1] = mother[mother_pos(j) - 1];
    }
}

/// Reverse of [`puncture_2_3`]. Positions not covered by `input` are left untouched,
/// so `mother` should be pre-filled with erasures.
pub fn depuncture_2_3(input: &[u8], mother: &mut [u8]) {
    for j in 1..=input.len() {
        mother[mother_pos(j) - 1] = input[j - 1];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoder_impulse_response() {
        let mut enc = ConvEncoder::new();
        let mut out = [0u8; 20];
        enc.encode(&[1, 0, 0, 0, 0], &mut out);
        // Each generator taps the current input, then its own subset of the register
        assert_eq!(&out[0..4], &[1, 1, 1, 1]);
        assert_eq!(&out[4..8], &[1, 0, 1, 1]);
        assert_eq!(&out[8..12], &[0, 1, 1, 0]);
        assert_eq!(&out[12..16], &[0, 1, 0, 1]);
        assert_eq!(&out[16..20], &[1, 1, 1, 1]);
    }

    #[test]
    fn test_puncture_positions() {
        assert_eq!(punctured_len(4 * 80), 120);
        assert_eq!(punctured_len(4 * 288), 432);
        let mother: Vec<u8> = (0..16).collect();
        let mut out = [0u8; 6];
        puncture_2_3(&mother, &mut out);
        assert_eq!(out, [0, 1, 4, 8, 9, 12]);

        let mut back = [0xffu8; 16];
        depuncture_2_3(&out, &mut back);
        assert_eq!(back[4], 4);
        assert_eq!(back[2], 0xff);
    }
}
