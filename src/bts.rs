//! # BTS state
//!
//! The process-wide state the RSL handlers operate on: the TRX set with
//! their timeslots, the system information store, the AGCH queue and the
//! static configuration. Initialized at bring-up; accessed only from the
//! event loop.

use heapless::{Deque, Vec};
use log::warn;

use crate::chan::{lchan_lookup, Lchan, LchanId, Pchan, Timeslot, Trx};
use crate::sysinfo::SysinfoStore;
use crate::wire::ie::ChanNr;
use crate::wire::tlv::RslMsg;

/// Maximum number of TRX per BTS.
pub const MAX_TRX: usize = 4;

/// Immediate assignments waiting for an AGCH block.
pub const AGCH_QUEUE_LEN: usize = 16;

/// Static configuration, fixed after bring-up.
#[derive(Debug, Clone, Copy)]
pub struct BtsConfig {
    pub num_trx: u8,
    /// Supported A5 ciphers: bit n-1 set means A5/n is available. A5/0
    /// is always accepted.
    pub ciphers: u8,
    /// Power control level applied to a channel before the BSC names
    /// one.
    pub default_ms_power: u8,
    pub rtp_jitter_adaptive: bool,
    pub rtp_jitter_buf_ms: u16,
}

impl Default for BtsConfig {
    fn default() -> Self {
        BtsConfig {
            num_trx: 1,
            ciphers: 0x01,
            default_ms_power: 0,
            rtp_jitter_adaptive: false,
            rtp_jitter_buf_ms: 100,
        }
    }
}

/// The BTS as seen by the RSL core.
pub struct Bts {
    pub config: BtsConfig,
    pub si: SysinfoStore,
    agch_queue: Deque<RslMsg, AGCH_QUEUE_LEN>,
    trx: Vec<Trx, MAX_TRX>,
}

impl Bts {
    pub fn new(config: BtsConfig) -> Bts {
        let num = (config.num_trx as usize).min(MAX_TRX);
        let mut trx = Vec::new();
        for nr in 0..num {
            let _ = trx.push(Trx::new(nr as u8));
        }
        Bts {
            config,
            si: SysinfoStore::default(),
            agch_queue: Deque::new(),
            trx,
        }
    }

    pub fn trx(&self, nr: u8) -> Option<&Trx> {
        self.trx.get(nr as usize)
    }

    pub fn trx_mut(&mut self, nr: u8) -> Option<&mut Trx> {
        self.trx.get_mut(nr as usize)
    }

    pub fn ts(&self, trx: u8, tn: u8) -> Option<&Timeslot> {
        self.trx(trx).map(|t| &t.ts[tn as usize & 7])
    }

    pub fn ts_mut(&mut self, trx: u8, tn: u8) -> Option<&mut Timeslot> {
        self.trx_mut(trx).map(|t| &mut t.ts[tn as usize & 7])
    }

    pub fn lchan(&self, id: LchanId) -> Option<&Lchan> {
        self.ts(id.trx, id.tn).map(|ts| &ts.lchan[id.ss as usize])
    }

    pub fn lchan_mut(&mut self, id: LchanId) -> Option<&mut Lchan> {
        self.ts_mut(id.trx, id.tn)
            .map(|ts| &mut ts.lchan[id.ss as usize])
    }

    /// Channel number of an lchan, for outbound messages.
    pub fn chan_nr(&self, id: LchanId) -> ChanNr {
        match self.ts(id.trx, id.tn) {
            Some(ts) => ts.lchan_chan_nr(id.ss),
            None => ChanNr(0),
        }
    }

    /// Resolve a channel number, logging mismatches the way the
    /// dispatcher expects.
    pub fn lookup(&self, trx: u8, chan_nr: ChanNr) -> Option<LchanId> {
        let trx = self.trx(trx)?;
        let (id, ok) = lchan_lookup(trx, chan_nr)?;
        if !ok {
            warn!("{id} mismatching chan_nr=0x{:02x}", chan_nr.0);
        }
        Some(id)
    }

    /// Set a timeslot's physical channel configuration (O&M bring-up).
    pub fn configure_ts(&mut self, trx: u8, tn: u8, pchan: Pchan) {
        if let Some(ts) = self.ts_mut(trx, tn) {
            ts.pchan = pchan;
            match pchan {
                // Dynamic slots start out in their TCH configuration.
                Pchan::TchFPdch => ts.configure_lchans_for(Pchan::TchF),
                Pchan::TchFTchHPdch => {
                    ts.dynamic.pchan_is = Pchan::None;
                    ts.dynamic.pchan_want = Pchan::None;
                }
                _ => ts.configure_lchans_for(pchan),
            }
        }
    }

    /// Queue a trimmed IMMEDIATE ASSIGN for the AGCH. The message is
    /// dropped when the queue is full; the BSC finds out through its own
    /// repetition timers.
    pub fn agch_enqueue(&mut self, msg: RslMsg) -> Result<(), RslMsg> {
        self.agch_queue.push_back(msg)
    }

    /// Next immediate assignment to transmit, taken by the CCCH transmit
    /// path.
    pub fn agch_dequeue(&mut self) -> Option<RslMsg> {
        self.agch_queue.pop_front()
    }

    pub fn agch_queue_len(&self) -> usize {
        self.agch_queue.len()
    }

    /// A5/0 needs no key material and is always available; other
    /// algorithms must be enabled in the configuration.
    pub fn supports_cipher(&self, alg_id: u8) -> bool {
        match alg_id {
            1 => true,
            2..=8 => self.config.ciphers & (1 << (alg_id - 2)) != 0,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chan::LchanType;

    #[test]
    fn configure_and_look_up() {
        let mut bts = Bts::new(BtsConfig::default());
        bts.configure_ts(0, 1, Pchan::TchF);
        assert_eq!(
            bts.ts(0, 1).unwrap().lchan[0].lchan_type,
            LchanType::TchF
        );
        let id = bts.lookup(0, ChanNr::tch_f(1)).unwrap();
        assert_eq!(bts.chan_nr(id), ChanNr::tch_f(1));
    }

    #[test]
    fn agch_queue_is_bounded() {
        let mut bts = Bts::new(BtsConfig::default());
        for _ in 0..AGCH_QUEUE_LEN {
            bts.agch_enqueue(RslMsg::new()).unwrap();
        }
        assert!(bts.agch_enqueue(RslMsg::new()).is_err());
        assert!(bts.agch_dequeue().is_some());
    }

    #[test]
    fn cipher_support_mask() {
        let bts = Bts::new(BtsConfig {
            ciphers: 0b0001, // A5/1 only
            ..BtsConfig::default()
        });
        assert!(bts.supports_cipher(1));
        assert!(bts.supports_cipher(2));
        assert!(!bts.supports_cipher(3));
        assert!(!bts.supports_cipher(0));
    }
}
