//! DM-MAC PDU parsing and building
//!
//! Covers the synchronisation PDUs carried in SCH/S + SCH/H (DMAC-SYNC, DPRES-SYNC),
//! the DMAC-DATA / DMAC-FRAG / DMAC-END headers carried in SCH/F and STCH, and the
//! message-dependent elements the repeater needs to inspect.

pub mod dmac;
