pub mod channel_codec;
pub mod codec_params;
pub mod convenc;
pub mod crc16;
pub mod interleaver;
pub mod scrambler;
pub mod viterbi;

pub use channel_codec::{ChannelCodec, CodecError, TetraCodec};
