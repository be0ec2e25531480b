pub mod address_type;
pub mod communication_type;
pub mod dmac_pdu_type;
pub mod dmo_message_type;
pub mod sync_pdu_type;
