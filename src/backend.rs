//! # Collaborator interfaces
//!
//! The RSL core never performs I/O itself: the PHY, the PCU link, LAPDm,
//! the RTP socket pool, paging/SMSCB and the A-bis transport are reached
//! through the traits below. The embedding BTS application implements
//! them and feeds asynchronous confirmations back through the callback
//! methods on [`Bts`](crate::Bts).

use crate::chan::{Lchan, LchanId, Pchan};
use crate::time::GsmTime;
use crate::wire::ie::Cause;
use crate::wire::tlv::RslMsg;

/// Physical layer control. Requests are asynchronous: a successful
/// return only means the request was accepted; completion arrives via
/// `Bts::ts_connected`, `Bts::ts_disconnected`, `Bts::lchan_act_confirm`
/// and `Bts::lchan_rel_confirm`.
pub trait Phy {
    fn ts_connect(&mut self, trx: u8, tn: u8, as_pchan: Pchan) -> Result<(), Cause>;
    fn ts_disconnect(&mut self, trx: u8, tn: u8) -> Result<(), Cause>;
    /// Activate a logical channel with the configuration already applied
    /// to `lchan`. An error carries the cause reported in the NACK.
    fn lchan_activate(&mut self, id: LchanId, lchan: &Lchan) -> Result<(), Cause>;
    fn lchan_deactivate(&mut self, id: LchanId) -> Result<(), Cause>;
    fn lchan_modify(&mut self, id: LchanId, lchan: &Lchan) -> Result<(), Cause>;
    fn sacch_deactivate(&mut self, id: LchanId) -> Result<(), Cause>;
    /// Apply the MS power level currently set on the lchan.
    fn adjust_ms_power(&mut self, id: LchanId, lchan: &Lchan);
}

/// Packet control unit link.
pub trait Pcu {
    fn connected(&self) -> bool;
    /// Push the current timeslot configuration to the PCU; it reacts
    /// with SAPI (de)activation requests that eventually drive
    /// `Bts::dyn_pdch_complete`.
    fn tx_info_ind(&mut self) -> Result<(), ()>;
    fn tx_pag_req(&mut self, identity_lv: &[u8], chan_needed: u8);
}

/// LAPDm entity. `submit` transfers message ownership.
pub trait Lapdm {
    fn submit(&mut self, id: LchanId, msg: RslMsg);
    /// Tear down the LAPDm state of a released channel.
    fn release(&mut self, id: LchanId);
}

/// Opaque reference to one RTP/RTCP socket pair owned by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RtpHandle(pub u32);

/// RTP socket statistics, reported in DLCX ACK and DLCX IND.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RtpStats {
    pub packets_sent: u32,
    pub octets_sent: u32,
    pub packets_recv: u32,
    pub octets_recv: u32,
    pub packets_lost: u32,
    pub arrival_jitter: u32,
    pub avg_tx_delay: u32,
}

impl RtpStats {
    /// Packed big-endian Connection Statistics IE value.
    pub fn encode(&self) -> [u8; 28] {
        let mut out = [0u8; 28];
        for (i, v) in [
            self.packets_sent,
            self.octets_sent,
            self.packets_recv,
            self.octets_recv,
            self.packets_lost,
            self.arrival_jitter,
            self.avg_tx_delay,
        ]
        .iter()
        .enumerate()
        {
            out[i * 4..i * 4 + 4].copy_from_slice(&v.to_be_bytes());
        }
        out
    }
}

/// RTP socket pool. Sockets are created in poll mode; uplink frames are
/// routed by the backend to the L1 path of the owning channel.
///
/// Addresses are IPv4 in host order.
pub trait RtpBackend {
    fn create(&mut self, owner: LchanId) -> Option<RtpHandle>;
    fn set_jitter(&mut self, sock: RtpHandle, adaptive: bool, buf_ms: u16) -> Result<(), ()>;
    /// Bind locally to `local_ip` with an ephemeral port.
    fn bind(&mut self, sock: RtpHandle, local_ip: u32) -> Result<(), ()>;
    fn connect(&mut self, sock: RtpHandle, remote_ip: u32, remote_port: u16) -> Result<(), ()>;
    fn set_payload_type(&mut self, sock: RtpHandle, pt: u8);
    fn bound_ip_port(&self, sock: RtpHandle) -> (u32, u16);
    fn stats(&self, sock: RtpHandle) -> RtpStats;
    fn close(&mut self, sock: RtpHandle);
    /// Local address of the RSL signalling link, used as the bind
    /// address when a CRCX names no remote endpoint.
    fn rsl_local_ip(&self, trx: u8) -> Option<u32>;
    /// Remote (BSC) address of the RSL signalling link, substituted for
    /// a 0.0.0.0 connect address.
    fn rsl_peer_ip(&self, trx: u8) -> u32;
}

/// Everything else the core needs from its host: the A-bis transport,
/// the frame clock, paging and SMSCB.
pub trait Abis {
    /// Transmit a framed RSL message towards the BSC.
    fn send(&mut self, trx: u8, msg: RslMsg);
    fn gsm_time(&self) -> GsmTime;
    fn paging_add_identity(
        &mut self,
        paging_group: u8,
        identity_lv: &[u8],
        chan_needed: u8,
    ) -> Result<(), ()>;
    fn smscb_command(&mut self, cmd_type: u8, msg: &[u8]);
    /// System information changed; transmit paths re-read the SI store.
    fn new_sysinfo(&mut self);
}

/// The full collaborator set the dispatcher is driven against.
pub trait Backend: Phy + Pcu + Lapdm + RtpBackend + Abis {}

impl<T: Phy + Pcu + Lapdm + RtpBackend + Abis> Backend for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_block_is_big_endian() {
        let stats = RtpStats {
            packets_sent: 0x01020304,
            arrival_jitter: 0x0a0b0c0d,
            ..Default::default()
        };
        let enc = stats.encode();
        assert_eq!(enc.len(), 28);
        assert_eq!(&enc[0..4], &[1, 2, 3, 4]);
        assert_eq!(&enc[20..24], &[0x0a, 0x0b, 0x0c, 0x0d]);
    }
}
