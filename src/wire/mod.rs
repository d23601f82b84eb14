//! # RSL wire format
//!
//! Pure encoding/decoding layer for GSM TS 08.58 messages: protocol
//! constants, the common/channel header variants, the TLV codec and the
//! constructors for every outbound message the BTS emits. Nothing in
//! here touches channel state.

pub mod build;
pub mod header;
pub mod ie;
pub mod tlv;

pub use header::{MsgDiscr, MsgType, RslHeader};
pub use ie::{Cause, ChanMode, ChanNr, SiType};
pub use tlv::{RslMsg, TlvReader};
