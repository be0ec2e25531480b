use core::fmt;

use dmo_core::{BitBuffer, LogicalChannel};

use super::codec_params::codec_params;
use super::convenc::{depuncture_2_3, puncture_2_3, ConvEncoder};
use super::crc16::{append_crc, check_crc};
use super::interleaver::{block_deinterleave, block_interleave};
use super::scrambler::scramble_bits;
use super::viterbi::{self, InvalidSoftBit, ERASURE};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    WrongLength { lchan: LogicalChannel, expected: usize, found: usize },
    InvalidSoftBit(u8),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::WrongLength { lchan, expected, found } => {
                write!(f, "{} block has {} bits, expected {}", lchan, found, expected)
            }
            CodecError::InvalidSoftBit(v) => write!(f, "invalid soft bit value {:#x}", v),
        }
    }
}

impl std::error::Error for CodecError {}

impl From<InvalidSoftBit> for CodecError {
    fn from(e: InvalidSoftBit) -> Self {
        CodecError::InvalidSoftBit(e.0)
    }
}

/// Block coding between logical channel payloads and on-air bits.
pub trait ChannelCodec: Send {
    /// Descramble and decode one received block. Returns the type-1 payload and
    /// whether its CRC matched.
    fn decode(&self, lchan: LogicalChannel, block: &BitBuffer, scrambling_code: u32) -> Result<(BitBuffer, bool), CodecError>;

    /// Encode and scramble one type-1 payload into on-air bits.
    fn encode(&self, lchan: LogicalChannel, payload: &BitBuffer, scrambling_code: u32) -> Result<BitBuffer, CodecError>;
}

/// CRC-16, rate 1/4 convolutional code punctured to 2/3, block interleaving and scrambling.
#[derive(Debug, Default, Clone, Copy)]
pub struct TetraCodec;

fn check_len(lchan: LogicalChannel, expected: usize, found: usize) -> Result<(), CodecError> {
    if expected != found {
        return Err(CodecError::WrongLength { lchan, expected, found });
    }
    Ok(())
}

impl ChannelCodec for TetraCodec {
    fn decode(&self, lchan: LogicalChannel, block: &BitBuffer, scrambling_code: u32) -> Result<(BitBuffer, bool), CodecError> {
        let p = codec_params(lchan);
        check_len(lchan, p.type5_bits, block.get_len())?;
        let Some(a) = p.interleave_a else {
            let mut out = block.clone();
            out.seek(0);
            return Ok((out, true));
        };

        let mut descrambled = block.clone();
        descrambled.seek(0);
        scramble_bits(scrambling_code, &mut descrambled);
        let type5 = descrambled.to_bitvec();

        let mut type4 = vec![0u8; p.type5_bits];
        block_deinterleave(p.type5_bits, a, &type5, &mut type4);

        let mut mother = vec![ERASURE; p.mother_bits()];
        depuncture_2_3(&type4, &mut mother);

        let mut type2 = vec![0u8; p.type2_bits];
        viterbi::decode(&mother, &mut type2)?;

        let crc_ok = check_crc(&type2[..p.type1_bits + 16]);
        Ok((BitBuffer::from_bitarr(&type2[..p.type1_bits]), crc_ok))
    }

    fn encode(&self, lchan: LogicalChannel, payload: &BitBuffer, scrambling_code: u32) -> Result<BitBuffer, CodecError> {
        let p = codec_params(lchan);
        check_len(lchan, p.type1_bits, payload.get_len())?;
        let Some(a) = p.interleave_a else {
            let mut out = payload.clone();
            out.seek(0);
            return Ok(out);
        };

        let type1 = payload.to_bitvec();
        let mut type2 = vec![0u8; p.type2_bits];
        type2[..p.type1_bits].copy_from_slice(&type1);
        append_crc(&type1, &mut type2[p.type1_bits..p.type1_bits + 16]);

        let mut mother = vec![0u8; p.mother_bits()];
        ConvEncoder::new().encode(&type2, &mut mother);

        let mut type4 = vec![0u8; p.type5_bits];
        puncture_2_3(&mother, &mut type4);

        let mut type5 = vec![0u8; p.type5_bits];
        block_interleave(p.type5_bits, a, &type4, &mut type5);

        let mut out = BitBuffer::from_bitarr(&type5);
        scramble_bits(scrambling_code, &mut out);
        Ok(out)
    }
}
