//! # Channel data model
//!
//! TRX, timeslot and logical channel state: the physical channel
//! configuration of each timeslot, the per-lchan signalling state
//! machine, and the channel-number addressing that ties RSL messages to
//! logical channels.

use bitflags::bitflags;
use heapless::{Deque, Vec};

use crate::amr::{AmrConfig, MR_CONFIG_MAX};
use crate::backend::RtpHandle;
use crate::sysinfo::SacchStore;
use crate::wire::ie::{self, ChanNr, SpeechInd, TchMode};
use crate::wire::tlv::RslMsg;

/// Logical channel slots per timeslot: eight SDCCH/8 subchannels is the
/// densest layout; the combined CCCH keeps its own slot.
pub const LCHANS_PER_TS: usize = 8;

/// Slot of the CCCH lchan on a CCCH-bearing timeslot.
pub const CCCH_LCHAN: usize = 4;

/// Downlink TCH frames buffered towards the PHY.
pub const DL_TCH_QUEUE_LEN: usize = 8;

pub type TchFrame = Vec<u8, 40>;

/// Physical channel configuration of a timeslot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Pchan {
    #[default]
    None,
    Ccch,
    CcchSdcch4,
    Sdcch8,
    TchF,
    TchH,
    Pdch,
    /// ip.access style dynamic TCH/F / PDCH timeslot.
    TchFPdch,
    /// Three-way dynamic timeslot.
    TchFTchHPdch,
    Unknown,
}

impl Pchan {
    /// True for the two dynamically reconfigurable types.
    pub fn is_dynamic(&self) -> bool {
        matches!(self, Pchan::TchFPdch | Pchan::TchFTchHPdch)
    }
}

/// What a single lchan slot currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LchanType {
    #[default]
    None,
    Sdcch,
    TchF,
    TchH,
    Ccch,
    Pdtch,
}

/// Signalling state of an lchan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LchanState {
    #[default]
    None,
    ActReq,
    Active,
    Inactive,
    RelReq,
}

/// Who asked for the current activation/release, deciding whether an
/// RSL ACK is owed once the PHY confirms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RelActKind {
    #[default]
    Rsl,
    Pcu,
    /// Deactivated locally and re-activated as soon as the release
    /// confirms (CCCH reconfiguration).
    Reactivate,
}

bitflags! {
    /// Reconfiguration state of a TCH/F+PDCH timeslot.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TsFlags: u8 {
        const PDCH_ACTIVE = 0x01;
        const PDCH_ACT_PENDING = 0x02;
        const PDCH_DEACT_PENDING = 0x04;
    }
}

impl TsFlags {
    pub const PDCH_PENDING_MASK: TsFlags =
        TsFlags::PDCH_ACT_PENDING.union(TsFlags::PDCH_DEACT_PENDING);
}

/// Ciphering parameters from the Encryption Information IE.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Encryption {
    pub alg_id: u8,
    pub key: Vec<u8, 8>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MsPowerCtrl {
    pub current: u8,
    /// Set by MS POWER CONTROL: the BSC overrides autonomous power
    /// control.
    pub fixed: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Handover {
    pub active: bool,
    pub reference: u8,
}

/// Measurement state feeding MEASurement RESult.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeasState {
    pub res_nr: u8,
    /// Encoded Uplink Measurements IE value, set by the measurement
    /// path when a result period completes.
    pub ul_res: Option<[u8; 3]>,
    pub l1_info: Option<[u8; 2]>,
    pub bts_tx_pwr: u8,
}

/// RTP endpoint bound to a traffic channel, alive between a successful
/// CRCX and the matching DLCX or channel release.
#[derive(Debug, Clone, Copy)]
pub struct RtpEndpoint {
    pub socket: RtpHandle,
    pub conn_id: u16,
    pub bound_ip: u32,
    pub bound_port: u16,
    pub connect_ip: u32,
    pub connect_port: u16,
    pub rtp_payload: u8,
    pub rtp_payload2: u8,
    pub speech_mode: u8,
}

/// One logical channel.
#[derive(Default)]
pub struct Lchan {
    pub lchan_type: LchanType,
    pub state: LchanState,
    pub rsl_cmode: Option<SpeechInd>,
    pub tch_mode: TchMode,
    pub encr: Option<Encryption>,
    pub ms_power: u8,
    pub ms_power_ctrl: MsPowerCtrl,
    pub bs_power: u8,
    pub rqd_ta: u8,
    pub ho: Handover,
    pub rel_act_kind: RelActKind,
    pub sacch: SacchStore,
    /// Raw MultiRate Configuration as length + value, handed to the PHY.
    pub mr_conf_lv: Vec<u8, { MR_CONFIG_MAX + 1 }>,
    pub amr: Option<AmrConfig>,
    pub rtp: Option<RtpEndpoint>,
    pub dl_tch_queue: Deque<TchFrame, DL_TCH_QUEUE_LEN>,
    pub meas: MeasState,
}

impl Lchan {
    pub fn is_tch(&self) -> bool {
        matches!(self.lchan_type, LchanType::TchF | LchanType::TchH)
    }

    pub fn flush_dl_tch_queue(&mut self) {
        self.dl_tch_queue.clear();
    }

    /// Back to an unused channel: everything except the slot type is
    /// reset.
    pub fn reset(&mut self) {
        let lchan_type = self.lchan_type;
        *self = Lchan {
            lchan_type,
            ..Lchan::default()
        };
    }
}

/// Reconfiguration state of a three-way dynamic timeslot.
#[derive(Default)]
pub struct DynTsState {
    /// What the PHY currently has the timeslot connected as.
    pub pchan_is: Pchan,
    /// What the pending activity needs it to be.
    pub pchan_want: Pchan,
    /// CHANnel ACTIVation parked while the PHY reconnects; replayed from
    /// the connect callback. At most one.
    pub pending_chan_activ: Option<RslMsg>,
}

/// One of the eight timeslots of a TRX.
pub struct Timeslot {
    pub tn: u8,
    pub pchan: Pchan,
    pub flags: TsFlags,
    pub dynamic: DynTsState,
    pub lchan: [Lchan; LCHANS_PER_TS],
}

impl Timeslot {
    fn new(tn: u8) -> Timeslot {
        Timeslot {
            tn,
            pchan: Pchan::None,
            flags: TsFlags::empty(),
            dynamic: DynTsState::default(),
            lchan: Default::default(),
        }
    }

    /// Set the lchan slot types for operating this timeslot as
    /// `as_pchan`, as done on initial configuration and on every dynamic
    /// reconnect.
    pub fn configure_lchans_for(&mut self, as_pchan: Pchan) {
        for lc in self.lchan.iter_mut() {
            lc.lchan_type = LchanType::None;
        }
        match as_pchan {
            Pchan::Ccch => self.lchan[CCCH_LCHAN].lchan_type = LchanType::Ccch,
            Pchan::CcchSdcch4 => {
                for lc in self.lchan[..4].iter_mut() {
                    lc.lchan_type = LchanType::Sdcch;
                }
                self.lchan[CCCH_LCHAN].lchan_type = LchanType::Ccch;
            }
            Pchan::Sdcch8 => {
                for lc in self.lchan.iter_mut() {
                    lc.lchan_type = LchanType::Sdcch;
                }
            }
            Pchan::TchF | Pchan::TchFPdch => self.lchan[0].lchan_type = LchanType::TchF,
            Pchan::TchH => {
                for lc in self.lchan[..2].iter_mut() {
                    lc.lchan_type = LchanType::TchH;
                }
            }
            Pchan::Pdch => self.lchan[0].lchan_type = LchanType::Pdtch,
            Pchan::None | Pchan::TchFTchHPdch | Pchan::Unknown => {}
        }
    }

    /// Channel number of the lchan in slot `ss`, as used in outbound
    /// messages.
    pub fn lchan_chan_nr(&self, ss: u8) -> ChanNr {
        let lc = &self.lchan[ss as usize];
        match lc.lchan_type {
            LchanType::TchF => ChanNr::tch_f(self.tn),
            LchanType::TchH => ChanNr::tch_h(self.tn, ss),
            LchanType::Sdcch => {
                if self.pchan == Pchan::CcchSdcch4 {
                    ChanNr::sdcch4(self.tn, ss)
                } else {
                    ChanNr::sdcch8(self.tn, ss)
                }
            }
            LchanType::Ccch => ChanNr::bcch(),
            LchanType::Pdtch => {
                if self.pchan == Pchan::TchFTchHPdch {
                    ChanNr::osmo_pdch(self.tn)
                } else {
                    // TCH/F+PDCH keeps the TCH channel number.
                    ChanNr::tch_f(self.tn)
                }
            }
            LchanType::None => ChanNr::new(0, self.tn),
        }
    }
}

/// One transceiver.
pub struct Trx {
    pub nr: u8,
    pub ts: [Timeslot; 8],
}

impl Trx {
    pub fn new(nr: u8) -> Trx {
        Trx {
            nr,
            ts: core::array::from_fn(|tn| Timeslot::new(tn as u8)),
        }
    }
}

/// Index-based reference to an lchan; stable across collaborator calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LchanId {
    pub trx: u8,
    pub tn: u8,
    pub ss: u8,
}

impl core::fmt::Display for LchanId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "(trx={},ts={},ss={})", self.trx, self.tn, self.ss)
    }
}

/// Resolve a channel number within a TRX. Returns the lchan slot and
/// whether the timeslot's configuration actually matches the C-bits; a
/// mismatch is logged by the caller but still resolves, so that dynamic
/// reconfiguration can address a slot before the PHY has caught up.
pub fn lchan_lookup(trx: &Trx, chan_nr: ChanNr) -> Option<(LchanId, bool)> {
    let tn = chan_nr.tn();
    let ts = &trx.ts[tn as usize];
    let cbits = chan_nr.cbits();

    let (ss, ok) = if cbits == ie::CBITS_TCH_F {
        let ok = matches!(ts.pchan, Pchan::TchF | Pchan::TchFPdch)
            || (ts.pchan == Pchan::TchFTchHPdch && ts.dynamic.pchan_is == Pchan::TchF);
        (0, ok)
    } else if cbits >> 1 == ie::CBITS_TCH_H >> 1 {
        let ok = ts.pchan == Pchan::TchH
            || (ts.pchan == Pchan::TchFTchHPdch && ts.dynamic.pchan_is == Pchan::TchH);
        (cbits & 1, ok)
    } else if cbits >> 2 == ie::CBITS_SDCCH4 >> 2 {
        (cbits & 3, ts.pchan == Pchan::CcchSdcch4)
    } else if cbits >> 3 == ie::CBITS_SDCCH8 >> 3 {
        (cbits & 7, ts.pchan == Pchan::Sdcch8)
    } else if cbits == ie::CBITS_BCCH || cbits == ie::CBITS_RACH || cbits == ie::CBITS_PCH_AGCH {
        let ok = matches!(ts.pchan, Pchan::Ccch | Pchan::CcchSdcch4);
        (CCCH_LCHAN as u8, ok)
    } else if cbits == ie::CBITS_OSMO_PDCH {
        (0, ts.pchan == Pchan::TchFTchHPdch)
    } else {
        return None;
    };

    Some((
        LchanId {
            trx: trx.nr,
            tn,
            ss,
        },
        ok,
    ))
}

/// Target physical channel of a CHANnel ACTIVation on a three-way
/// dynamic timeslot, derived from the C-bits.
pub fn dyn_pchan_from_chan_nr(chan_nr: ChanNr) -> Pchan {
    let cbits = chan_nr.cbits();
    if cbits == ie::CBITS_TCH_F {
        Pchan::TchF
    } else if cbits >> 1 == ie::CBITS_TCH_H >> 1 {
        Pchan::TchH
    } else if cbits == ie::CBITS_OSMO_PDCH {
        Pchan::Pdch
    } else {
        Pchan::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trx_with(pchan: Pchan, tn: usize) -> Trx {
        let mut trx = Trx::new(0);
        trx.ts[tn].pchan = pchan;
        trx.ts[tn].configure_lchans_for(pchan);
        trx
    }

    #[test]
    fn lookup_tch_f() {
        let trx = trx_with(Pchan::TchF, 2);
        let (id, ok) = lchan_lookup(&trx, ChanNr::tch_f(2)).unwrap();
        assert!(ok);
        assert_eq!((id.tn, id.ss), (2, 0));
    }

    #[test]
    fn lookup_tch_h_subslots() {
        let trx = trx_with(Pchan::TchH, 3);
        let (id, ok) = lchan_lookup(&trx, ChanNr::tch_h(3, 1)).unwrap();
        assert!(ok);
        assert_eq!(id.ss, 1);
        assert_eq!(trx.ts[3].lchan_chan_nr(1), ChanNr::tch_h(3, 1));
    }

    #[test]
    fn lookup_ccch_maps_to_ccch_slot() {
        let trx = trx_with(Pchan::CcchSdcch4, 0);
        let (id, ok) = lchan_lookup(&trx, ChanNr::pch_agch()).unwrap();
        assert!(ok);
        assert_eq!(id.ss as usize, CCCH_LCHAN);
        let (id, ok) = lchan_lookup(&trx, ChanNr::sdcch4(0, 3)).unwrap();
        assert!(ok);
        assert_eq!(id.ss, 3);
    }

    #[test]
    fn lookup_mismatch_still_resolves() {
        let trx = trx_with(Pchan::TchF, 2);
        let (id, ok) = lchan_lookup(&trx, ChanNr::tch_h(2, 0)).unwrap();
        assert!(!ok);
        assert_eq!(id.ss, 0);
    }

    #[test]
    fn lookup_unknown_cbits_fails() {
        let trx = trx_with(Pchan::TchF, 0);
        assert!(lchan_lookup(&trx, ChanNr::new(0x1f, 0)).is_none());
    }

    #[test]
    fn dyn_pchan_derivation() {
        assert_eq!(dyn_pchan_from_chan_nr(ChanNr::tch_f(1)), Pchan::TchF);
        assert_eq!(dyn_pchan_from_chan_nr(ChanNr::tch_h(1, 0)), Pchan::TchH);
        assert_eq!(dyn_pchan_from_chan_nr(ChanNr::tch_h(1, 1)), Pchan::TchH);
        assert_eq!(dyn_pchan_from_chan_nr(ChanNr::osmo_pdch(1)), Pchan::Pdch);
        assert_eq!(dyn_pchan_from_chan_nr(ChanNr::bcch()), Pchan::Unknown);
    }

    #[test]
    fn pdtch_chan_nr_depends_on_scheme() {
        let mut trx = trx_with(Pchan::TchFPdch, 4);
        trx.ts[4].configure_lchans_for(Pchan::Pdch);
        assert_eq!(trx.ts[4].lchan_chan_nr(0), ChanNr::tch_f(4));

        let mut trx = trx_with(Pchan::TchFTchHPdch, 4);
        trx.ts[4].configure_lchans_for(Pchan::Pdch);
        assert_eq!(trx.ts[4].lchan_chan_nr(0), ChanNr::osmo_pdch(4));
    }

    #[test]
    fn lchan_reset_keeps_type() {
        let mut lc = Lchan {
            lchan_type: LchanType::TchF,
            state: LchanState::Active,
            ..Default::default()
        };
        lc.dl_tch_queue.push_back(TchFrame::new()).unwrap();
        lc.reset();
        assert_eq!(lc.lchan_type, LchanType::TchF);
        assert_eq!(lc.state, LchanState::None);
        assert!(lc.dl_tch_queue.is_empty());
    }
}
