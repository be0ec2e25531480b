pub mod frag_reassembler;

pub use frag_reassembler::{FragError, FragReassembler, MAX_REASSEMBLY_BITS};
