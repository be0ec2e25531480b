use dmo_core::LogicalChannel;

/// Sizes of one logical channel block through the coding chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecParams {
    /// Payload bits
    pub type1_bits: usize,
    /// Payload + 16 CRC + 4 tail bits
    pub type2_bits: usize,
    /// Bits on air, after puncturing
    pub type5_bits: usize,
    /// Block interleaver step `a`; `None` for uncoded channels
    pub interleave_a: Option<usize>,
}

impl CodecParams {
    pub const fn is_coded(&self) -> bool {
        self.interleave_a.is_some()
    }

    pub const fn mother_bits(&self) -> usize {
        4 * self.type2_bits
    }
}

pub const fn codec_params(lchan: LogicalChannel) -> CodecParams {
    match lchan {
        LogicalChannel::SchS => CodecParams { type1_bits: 60, type2_bits: 80, type5_bits: 120, interleave_a: Some(11) },
        LogicalChannel::SchH | LogicalChannel::Stch => CodecParams { type1_bits: 124, type2_bits: 144, type5_bits: 216, interleave_a: Some(101) },
        LogicalChannel::SchF => CodecParams { type1_bits: 268, type2_bits: 288, type5_bits: 432, interleave_a: Some(103) },
        LogicalChannel::Tch => CodecParams { type1_bits: 432, type2_bits: 432, type5_bits: 432, interleave_a: None },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::convenc::punctured_len;

    #[test]
    fn test_params_are_consistent() {
        for lchan in [LogicalChannel::SchS, LogicalChannel::SchH, LogicalChannel::SchF, LogicalChannel::Stch] {
            let p = codec_params(lchan);
            assert_eq!(p.type2_bits, p.type1_bits + 20);
            assert_eq!(punctured_len(p.mother_bits()), p.type5_bits);
            assert_eq!(p.type1_bits, lchan.type1_bits());
            assert_eq!(p.type5_bits, lchan.type5_bits());
        }
        assert!(!codec_params(LogicalChannel::Tch).is_coded());
    }
}
