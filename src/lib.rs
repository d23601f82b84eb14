//! # BTS-side A-bis RSL
//!
//! BTS-side implementation of the GSM TS 08.58 Radio Signalling Link:
//! the control-plane protocol a Base Station Controller uses to drive a
//! BTS. The crate decodes inbound RSL messages, keeps the logical
//! channel and timeslot state, coordinates dynamic channel
//! reconfiguration with the PHY and the PCU, manages RTP endpoints for
//! the ip.access dialect, and emits the matching ACK/NACK/IND messages.
//!
//! The crate performs no I/O: the PHY, LAPDm, the PCU, the RTP socket
//! pool and the A-bis transport are reached through the traits in
//! [`backend`]. The embedding application owns the event loop, feeds
//! inbound messages into [`Bts::rsl_rx`] and delivers the asynchronous
//! confirmations of its collaborators into the callback methods
//! ([`Bts::ts_connected`], [`Bts::ts_disconnected`],
//! [`Bts::lchan_act_confirm`], [`Bts::lchan_rel_confirm`],
//! [`Bts::dyn_pdch_complete`], [`Bts::lapdm_rx`]).
//!
//! ```no_run
//! # fn demo<B: abis_rsl::Backend>(backend: &mut B, frame: &[u8]) {
//! use abis_rsl::{Bts, BtsConfig, Pchan, RslMsg};
//!
//! let mut bts = Bts::new(BtsConfig::default());
//! bts.configure_ts(0, 0, Pchan::CcchSdcch4);
//! bts.configure_ts(0, 1, Pchan::TchF);
//!
//! // event loop: one framed RSL message from the A-bis link
//! let msg = RslMsg::from_slice(frame).unwrap();
//! let _ = bts.rsl_rx(backend, 0, msg);
//! # }
//! ```

#![no_std]

pub mod amr;
pub mod backend;
pub mod bts;
mod cchan;
pub mod chan;
mod dchan;
mod dispatch;
mod dyn_ts;
mod ipacc;
pub mod sysinfo;
pub mod time;
pub mod wire;

pub use backend::{Abis, Backend, Lapdm, Pcu, Phy, RtpBackend, RtpHandle, RtpStats};
pub use bts::{Bts, BtsConfig};
pub use chan::{Lchan, LchanId, LchanState, LchanType, Pchan, RelActKind, TsFlags};
pub use time::GsmTime;
pub use wire::{Cause, ChanNr, MsgDiscr, MsgType, RslMsg};

/// Faults of the dispatcher itself: framing problems and replies that
/// cannot be encoded. Protocol-level failures are not errors here; they
/// are reported to the BSC as NACKs or ERROR REPORTs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RslError {
    /// Message shorter than its header.
    MsgTooShort,
    /// Unknown message discriminator.
    UnknownDiscr(u8),
    /// Message type not handled by its group.
    UnknownMsgType(u8),
    /// An IE overran the message payload.
    MalformedIe,
    /// An outbound message exceeded the buffer capacity.
    MsgOverflow,
    /// A request that contradicts the current channel state.
    InvalidState,
}
