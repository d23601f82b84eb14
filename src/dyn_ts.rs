//! # Dynamic timeslot reconfiguration
//!
//! Two schemes share this module. TCH/F+PDCH timeslots are switched by
//! the PDCH ACTIVATION/DEACTIVATION messages, gated by the pending
//! flags:
//!
//! PDCH ACT (TCH/F → PDCH): disconnect the timeslot, reconnect it as
//! PDCH, then hand it to the PCU; the PCU's SAPI activation drives
//! [`Bts::dyn_pdch_complete`], which acks. PDCH DEACT runs the inverse
//! order: PCU first, then disconnect, reconnect as TCH/F, complete.
//!
//! Three-way TCH/F+TCH/H+PDCH timeslots are switched by CHANnel
//! ACTIVation alone: the activation is parked on the timeslot, the PHY
//! reconnects, and the parked message is replayed from the connect
//! callback. `pchan_is` follows the PHY; `pchan_want` leads it.

use log::{debug, error, info, warn};

use crate::backend::Backend;
use crate::bts::Bts;
use crate::chan::{LchanId, Pchan, TsFlags};
use crate::dispatch::send_reply;
use crate::wire::build;
use crate::wire::ie::{Cause, ChanNr};
use crate::RslError;

impl Bts {
    /// PDCH ACTIVATION / DEACTIVATION on a TCH/F+PDCH timeslot.
    pub(crate) fn rx_dyn_pdch<B: Backend>(
        &mut self,
        b: &mut B,
        id: LchanId,
        pdch_act: bool,
    ) -> Result<(), RslError> {
        let chan_nr = self.chan_nr(id);
        let Some(ts) = self.ts_mut(id.trx, id.tn) else {
            return Ok(());
        };

        if ts.flags.intersects(TsFlags::PDCH_PENDING_MASK) {
            error!(
                "{id} request to PDCH {}, but a reconfiguration is still pending",
                act_name(pdch_act)
            );
            send_reply(
                b,
                id.trx,
                build::dyn_pdch_nack(chan_nr, pdch_act, Cause::NORMAL_UNSPEC),
            );
            return Ok(());
        }

        ts.flags.insert(if pdch_act {
            TsFlags::PDCH_ACT_PENDING
        } else {
            TsFlags::PDCH_DEACT_PENDING
        });

        if ts.pchan != Pchan::TchFPdch {
            error!(
                "{id} PDCH {} on a timeslot that is not TCH/F+PDCH ({:?})",
                act_name(pdch_act),
                ts.pchan
            );
            self.dyn_pdch_complete(b, id.trx, id.tn, false);
            return Ok(());
        }

        if ts.flags.contains(TsFlags::PDCH_ACTIVE) == pdch_act {
            info!("{id} request to PDCH {}, but already so", act_name(pdch_act));
            self.dyn_pdch_complete(b, id.trx, id.tn, true);
            return Ok(());
        }

        let rc = if pdch_act {
            // Take the TCH down first; the PDCH comes up from the
            // disconnect callback.
            b.ts_disconnect(id.trx, id.tn).is_ok()
        } else if b.connected() {
            // Let the PCU give the PDCH up; it comes back as TCH/F once
            // the SAPIs are gone.
            b.tx_info_ind().is_ok()
        } else {
            b.ts_disconnect(id.trx, id.tn).is_ok()
        };

        if !rc {
            self.dyn_pdch_complete(b, id.trx, id.tn, false);
        }
        Ok(())
    }

    /// Release of a three-way dynamic timeslot currently in PDCH mode.
    /// Returns true when the release completed locally (no PCU to ask).
    pub(crate) fn dyn_ts_pdch_release<B: Backend>(
        &mut self,
        b: &mut B,
        id: LchanId,
    ) -> Result<bool, RslError> {
        let Some(ts) = self.ts_mut(id.trx, id.tn) else {
            return Err(RslError::InvalidState);
        };
        if ts.dynamic.pchan_is != ts.dynamic.pchan_want {
            error!("{id} PDCH release requested while a switchover is in progress");
            return Err(RslError::InvalidState);
        }

        ts.dynamic.pchan_want = Pchan::None;
        if !b.connected() {
            // PCU not there yet: record the new state, it will catch up
            // when it connects.
            ts.dynamic.pchan_is = Pchan::None;
            return Ok(true);
        }
        if b.tx_info_ind().is_err() {
            warn!("{id} PCU rejected the configuration update");
        }
        Ok(false)
    }

    /// PHY reports the timeslot disconnected.
    pub fn ts_disconnected<B: Backend>(&mut self, b: &mut B, trx: u8, tn: u8) {
        let Some(ts) = self.ts(trx, tn) else { return };
        match ts.pchan {
            Pchan::TchFPdch => self.ipacc_pdch_ts_disconnected(b, trx, tn),
            Pchan::TchFTchHPdch => self.dyn3_ts_disconnected(b, trx, tn),
            _ => {}
        }
    }

    /// PHY reports the timeslot connected in its new configuration.
    pub fn ts_connected<B: Backend>(&mut self, b: &mut B, trx: u8, tn: u8) {
        let Some(ts) = self.ts(trx, tn) else { return };
        match ts.pchan {
            Pchan::TchFPdch => self.ipacc_pdch_ts_connected(b, trx, tn),
            Pchan::TchFTchHPdch => self.dyn3_ts_connected(b, trx, tn),
            _ => {}
        }
    }

    fn ipacc_pdch_ts_disconnected<B: Backend>(&mut self, b: &mut B, trx: u8, tn: u8) {
        let Some(ts) = self.ts_mut(trx, tn) else { return };
        let as_pchan = if ts.flags.contains(TsFlags::PDCH_DEACT_PENDING) {
            debug!("(trx={trx},ts={tn}) PDCH DEACT: disconnected, reconnecting as TCH/F");
            Pchan::TchF
        } else if ts.flags.contains(TsFlags::PDCH_ACT_PENDING) {
            debug!("(trx={trx},ts={tn}) PDCH ACT: disconnected, reconnecting as PDCH");
            Pchan::Pdch
        } else {
            // no reconnect pending
            return;
        };

        ts.configure_lchans_for(as_pchan);
        if b.ts_connect(trx, tn, as_pchan).is_err() {
            self.dyn_pdch_complete(b, trx, tn, false);
        }
    }

    fn ipacc_pdch_ts_connected<B: Backend>(&mut self, b: &mut B, trx: u8, tn: u8) {
        let Some(ts) = self.ts(trx, tn) else { return };
        if ts.flags.contains(TsFlags::PDCH_DEACT_PENDING) {
            debug!("(trx={trx},ts={tn}) PDCH DEACT: timeslot back as TCH/F");
            // nothing further to bring up
            self.dyn_pdch_complete(b, trx, tn, true);
        } else if ts.flags.contains(TsFlags::PDCH_ACT_PENDING) {
            debug!("(trx={trx},ts={tn}) PDCH ACT: timeslot connected as PDCH");
            if !b.connected() {
                // The PCU catches up when it connects; done for now.
                self.dyn_pdch_complete(b, trx, tn, true);
                return;
            }
            // The PCU activates the PDTCH SAPIs and calls back into
            // dyn_pdch_complete() when they are up.
            if b.tx_info_ind().is_err() {
                self.dyn_pdch_complete(b, trx, tn, false);
            }
        }
    }

    /// Final step of a TCH/F+PDCH switchover, also reached directly from
    /// the PCU glue once SAPI activation finishes. Clears the pending
    /// flags, flips PDCH_ACTIVE and acks (or nacks) to the BSC.
    pub fn dyn_pdch_complete<B: Backend>(&mut self, b: &mut B, trx: u8, tn: u8, success: bool) {
        let Some(ts) = self.ts_mut(trx, tn) else { return };
        let pdch_act = ts.flags.contains(TsFlags::PDCH_ACT_PENDING);
        if ts.flags.contains(TsFlags::PDCH_PENDING_MASK) {
            error!("(trx={trx},ts={tn}) both PDCH ACT and PDCH DEACT pending");
        }
        ts.flags.remove(TsFlags::PDCH_PENDING_MASK);

        let chan_nr = ts.lchan_chan_nr(0);
        if !success {
            error!(
                "(trx={trx},ts={tn}) PDCH {} on dynamic timeslot failed",
                act_name(pdch_act)
            );
            send_reply(
                b,
                trx,
                build::dyn_pdch_nack(chan_nr, pdch_act, Cause::NORMAL_UNSPEC),
            );
            return;
        }

        ts.flags.set(TsFlags::PDCH_ACTIVE, pdch_act);
        debug!(
            "(trx={trx},ts={tn}) switched to {} mode",
            if pdch_act { "PDCH" } else { "TCH/F" }
        );
        info!("(trx={trx},ts={tn}) tx PDCH {} ACK", act_name(pdch_act));
        send_reply(b, trx, build::dyn_pdch_ack(chan_nr, pdch_act));
    }

    fn dyn3_ts_disconnected<B: Backend>(&mut self, b: &mut B, trx: u8, tn: u8) {
        let Some(ts) = self.ts_mut(trx, tn) else { return };
        debug!("(trx={trx},ts={tn}) disconnected");
        ts.dynamic.pchan_is = Pchan::None;

        let want = ts.dynamic.pchan_want;
        match want {
            Pchan::TchF | Pchan::TchH | Pchan::Pdch => {}
            _ => {
                error!("(trx={trx},ts={tn}) disconnected, but no valid target pchan ({want:?})");
                ts.dynamic.pchan_want = Pchan::None;
                return;
            }
        }

        ts.configure_lchans_for(want);
        debug!("(trx={trx},ts={tn}) connecting as {want:?}");
        if let Err(cause) = b.ts_connect(trx, tn, want) {
            error!("(trx={trx},ts={tn}) connect failed: 0x{:02x}", cause.0);
        }
    }

    fn dyn3_ts_connected<B: Backend>(&mut self, b: &mut B, trx: u8, tn: u8) {
        let Some(ts) = self.ts_mut(trx, tn) else { return };
        let Some(msg) = ts.dynamic.pending_chan_activ.take() else {
            error!("(trx={trx},ts={tn}) reconnected, but no channel activation pending");
            return;
        };

        ts.dynamic.pchan_is = ts.dynamic.pchan_want;
        debug!("(trx={trx},ts={tn}) connected as {:?}", ts.dynamic.pchan_is);

        // continue where the parked activation left off
        let chan_nr = ChanNr(msg.get(3).copied().unwrap_or(0));
        let l3_off = 4;
        if let Err(e) = self.rx_chan_activ(b, trx, chan_nr, msg, l3_off) {
            warn!("(trx={trx},ts={tn}) replayed channel activation failed: {e:?}");
        }
    }
}

fn act_name(pdch_act: bool) -> &'static str {
    if pdch_act { "ACT" } else { "DEACT" }
}
