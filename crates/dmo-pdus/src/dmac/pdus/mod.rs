pub mod dmac_data;
pub mod dmac_frag_end;
pub mod dmac_sync;
pub mod dpres_sync;
pub mod sync_pdu;
