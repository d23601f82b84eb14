//! # Dedicated channel management
//!
//! CHANnel ACTIVation, RF CHANnel RELease, ENCRYPTION COMMAND, MODE
//! MODIFY, MS POWER CONTROL and SACCH INFO MODIFY, together with the
//! lchan state machine driven by the PHY confirmations and the
//! measurement-report rerouting from LAPDm.
//!
//! State machine: NONE → ACT_REQ → ACTIVE → REL_REQ → NONE. The PHY
//! confirmations arrive through [`Bts::lchan_act_confirm`] and
//! [`Bts::lchan_rel_confirm`]; a NACK from the PHY drops the channel
//! back to NONE and surfaces a CHAN ACT NACK.

use log::{debug, error, info, warn};

use crate::amr::{AmrConfig, MR_CONFIG_MAX};
use crate::backend::{Abis, Backend};
use crate::bts::Bts;
use crate::chan::{
    dyn_pchan_from_chan_nr, Encryption, LchanId, LchanState, Pchan, RelActKind,
};
use crate::dispatch::send_reply;
use crate::wire::build::{self, MeasResParts};
use crate::wire::header::{MsgType, RslHeader};
use crate::wire::ie::{act_type, tag, Cause, ChanMode, ChanNr, SiType, TchMode};
use crate::wire::tlv::{for_each_ie, RslMsg, TlvReader};
use crate::RslError;

/// IEs of a CHANnel ACTIVation. Only the activation type is mandatory;
/// the channel mode joins it for everything except PDCH activation.
struct ChanActivReq<'a> {
    act_type: u8,
    chan_mode: Option<ChanMode>,
    encr_info: Option<&'a [u8]>,
    ho_ref: Option<u8>,
    bs_power: Option<u8>,
    ms_power: Option<u8>,
    timing_advance: Option<u8>,
    sacch_info: Option<&'a [u8]>,
    mr_config: Option<&'a [u8]>,
}

impl<'a> ChanActivReq<'a> {
    fn parse(l3: &'a [u8]) -> Result<ChanActivReq<'a>, Cause> {
        let mut act = None;
        let mut chan_mode = None;
        let mut encr_info = None;
        let mut ho_ref = None;
        let mut bs_power = None;
        let mut ms_power = None;
        let mut timing_advance = None;
        let mut sacch_info = None;
        let mut mr_config = None;
        for_each_ie(l3, |t, v| match t {
            tag::ACT_TYPE => act = v.first().copied(),
            tag::CHAN_MODE => chan_mode = Some(v),
            tag::ENCR_INFO => encr_info = Some(v),
            tag::HANDO_REF => ho_ref = v.first().copied(),
            tag::BS_POWER => bs_power = v.first().copied(),
            tag::MS_POWER => ms_power = v.first().copied(),
            tag::TIMING_ADVANCE => timing_advance = v.first().copied(),
            tag::SACCH_INFO => sacch_info = Some(v),
            tag::MR_CONFIG => mr_config = Some(v),
            _ => {}
        })
        .map_err(|_| Cause::IE_CONTENT)?;

        // 9.3.3 Activation Type
        let act_type = act.ok_or(Cause::MAND_IE_ERROR)? & 0x0f;
        // 9.3.6 Channel Mode, unless the timeslot goes to PDCH
        let chan_mode = match chan_mode {
            Some(v) => Some(ChanMode::parse(v).ok_or(Cause::IE_CONTENT)?),
            None => None,
        };
        Ok(ChanActivReq {
            act_type,
            chan_mode,
            encr_info,
            ho_ref,
            bs_power,
            ms_power,
            timing_advance,
            sacch_info,
            mr_config,
        })
    }
}

impl Bts {
    /// CHANNEL ACTIVATION ACK or NACK, depending on `cause`. Nothing is
    /// sent for activations the BSC did not ask for.
    fn tx_chan_act_acknack<B: Abis>(&mut self, b: &mut B, id: LchanId, cause: Option<Cause>) {
        let chan_nr = self.chan_nr(id);
        let Some(lchan) = self.lchan_mut(id) else {
            return;
        };
        if lchan.rel_act_kind != RelActKind::Rsl {
            info!(
                "{id} not sending CHAN ACT {}",
                if cause.is_some() { "NACK" } else { "ACK" }
            );
            return;
        }
        match cause {
            Some(cause) => {
                warn!("{id} tx CHAN ACT NACK, cause=0x{:02x}", cause.0);
                send_reply(b, id.trx, build::chan_act_nack(chan_nr, cause));
            }
            None => {
                // activation succeeded, measurement numbering restarts
                lchan.meas.res_nr = 0;
                info!("{id} tx CHAN ACT ACK");
                let time = b.gsm_time();
                send_reply(b, id.trx, build::chan_act_ack(chan_nr, &time));
            }
        }
    }

    /// 8.4.1 CHANnel ACTIVation. Takes the message by value: a dynamic
    /// timeslot that must change its PHY configuration first parks it
    /// and replays it from the connect callback.
    pub(crate) fn rx_chan_activ<B: Backend>(
        &mut self,
        b: &mut B,
        trx: u8,
        chan_nr: ChanNr,
        msg: RslMsg,
        l3_off: usize,
    ) -> Result<(), RslError> {
        let Some(id) = self.lookup(trx, chan_nr) else {
            return self.tx_error_report(b, trx, Cause::IE_CONTENT);
        };

        let state = self.lchan(id).map(|l| l.state).unwrap_or_default();
        if state != LchanState::None {
            error!("{id} chan activ, but lchan is in state {state:?}");
            self.tx_chan_act_acknack(b, id, Some(Cause::EQUIPMENT_FAIL));
            return Ok(());
        }

        let Some(ts) = self.ts_mut(trx, id.tn) else {
            return Ok(());
        };
        if ts.pchan == Pchan::TchFTchHPdch {
            let want = dyn_pchan_from_chan_nr(chan_nr);
            if want == Pchan::Unknown {
                self.tx_chan_act_acknack(b, id, Some(Cause::NORMAL_UNSPEC));
                return Ok(());
            }
            ts.dynamic.pchan_want = want;
            if ts.dynamic.pchan_is != want {
                // The PHY has the timeslot connected in a different
                // mode. Park the activation, reconnect, then replay it
                // from ts_connected().
                if ts.dynamic.pending_chan_activ.is_some() {
                    warn!("{id} channel activation already pending on this timeslot");
                    self.tx_chan_act_acknack(b, id, Some(Cause::NORMAL_UNSPEC));
                    return Ok(());
                }
                ts.dynamic.pending_chan_activ = Some(msg);
                debug!("{id} reconnecting timeslot as {want:?}");
                if b.ts_disconnect(trx, id.tn).is_err() {
                    if let Some(ts) = self.ts_mut(trx, id.tn) {
                        ts.dynamic.pending_chan_activ = None;
                    }
                    self.tx_chan_act_acknack(b, id, Some(Cause::NORMAL_UNSPEC));
                }
                return Ok(());
            }
        }

        let req = match ChanActivReq::parse(&msg[l3_off..]) {
            Ok(req) => req,
            Err(cause) => {
                warn!("{id} chan activ with bad IEs: cause=0x{:02x}", cause.0);
                self.tx_chan_act_acknack(b, id, Some(cause));
                return Ok(());
            }
        };

        if req.act_type != act_type::OSMO_PDCH && req.chan_mode.is_none() {
            warn!("{id} missing Channel Mode");
            self.tx_chan_act_acknack(b, id, Some(Cause::MAND_IE_ERROR));
            return Ok(());
        }

        // Channel defaults before the BSC's overrides
        let default_ms_power = self.config.default_ms_power;
        if let Some(lchan) = self.lchan_mut(id) {
            lchan.ms_power = default_ms_power;
            lchan.ms_power_ctrl.current = default_ms_power;
            lchan.ms_power_ctrl.fixed = false;

            if let Some(cm) = &req.chan_mode {
                lchan.rsl_cmode = Some(cm.spd_ind);
                if let Some(mode) = TchMode::from_chan_mode(cm) {
                    lchan.tch_mode = mode;
                }
            }

            // 9.3.9 Handover Reference, inter-cell activations only
            if matches!(req.act_type, act_type::INTER_ASYNC | act_type::INTER_SYNC) {
                if let Some(ho_ref) = req.ho_ref {
                    lchan.ho.active = true;
                    lchan.ho.reference = ho_ref;
                }
            }
            if let Some(bs_power) = req.bs_power {
                lchan.bs_power = bs_power;
            }
            if let Some(ms_power) = req.ms_power {
                lchan.ms_power = ms_power;
                lchan.ms_power_ctrl.current = ms_power;
                lchan.ms_power_ctrl.fixed = false;
            }
            if let Some(ta) = req.timing_advance {
                lchan.rqd_ta = ta;
            }
        }

        // 9.3.7 Encryption Information
        match req.encr_info {
            Some(val) => {
                if let Err(cause) = self.encr_info_to_lchan(id, val) {
                    return self.tx_error_report(b, trx, cause);
                }
            }
            None => {
                if let Some(lchan) = self.lchan_mut(id) {
                    lchan.encr = None;
                }
            }
        }

        // 9.3.29 SACCH Information: channel-specific filling, otherwise
        // the BTS-wide one
        match req.sacch_info {
            Some(val) => {
                if let Err(cause) = self.sacch_info_to_lchan(id, val) {
                    return self.tx_error_report(b, trx, cause);
                }
            }
            None => {
                let si = self.si.clone();
                if let Some(lchan) = self.lchan_mut(id) {
                    lchan.sacch.copy_from_bts(&si);
                }
            }
        }

        // 9.3.52 MultiRate Configuration
        if let Some(val) = req.mr_config {
            if let Err(cause) = self.mr_config_to_lchan(id, val) {
                return self.tx_error_report(b, trx, cause);
            }
        }

        debug!(
            "{id} chan_nr=0x{:02x} type=0x{:02x}",
            chan_nr.0, req.act_type
        );

        // A PDCH activation on the three-way dynamic timeslot is acked
        // right away and carried out by the PCU; the BSC must not wait
        // on PCU readiness.
        let Some(ts) = self.ts(trx, id.tn) else {
            return Ok(());
        };
        if ts.pchan == Pchan::TchFTchHPdch && ts.dynamic.pchan_want == Pchan::Pdch {
            let time = b.gsm_time();
            send_reply(b, trx, build::chan_act_ack(chan_nr, &time));
            if b.connected() {
                debug!("{id} activating PDCH via PCU");
                if b.tx_info_ind().is_err() {
                    return self.tx_error_report(b, trx, Cause::NORMAL_UNSPEC);
                }
            } else {
                debug!("{id} PDCH activation deferred until the PCU connects");
            }
            return Ok(());
        }

        // The ACK is owed once the PHY confirms
        if let Some(lchan) = self.lchan_mut(id) {
            lchan.rel_act_kind = RelActKind::Rsl;
            lchan.state = LchanState::ActReq;
        }
        let rc = match self.lchan(id) {
            Some(lchan) => b.lchan_activate(id, lchan),
            None => return Ok(()),
        };
        if let Err(cause) = rc {
            if let Some(lchan) = self.lchan_mut(id) {
                lchan.state = LchanState::None;
            }
            self.tx_chan_act_acknack(b, id, Some(cause));
        }
        Ok(())
    }

    fn encr_info_to_lchan(&mut self, id: LchanId, val: &[u8]) -> Result<(), Cause> {
        let alg_id = *val.first().ok_or(Cause::IE_CONTENT)?;
        if !self.supports_cipher(alg_id) {
            warn!("{id} unsupported cipher alg_id={alg_id}");
            return Err(Cause::IE_CONTENT);
        }
        let lchan = self.lchan_mut(id).ok_or(Cause::IE_CONTENT)?;
        let key = &val[1..val.len().min(9)];
        let mut encr = Encryption {
            alg_id,
            ..Default::default()
        };
        // never fails, the slice is clamped to the key capacity
        let _ = encr.key.extend_from_slice(key);
        lchan.encr = Some(encr);
        Ok(())
    }

    /// Per-channel SACCH filling: a count followed by {type, len, value}
    /// triplets.
    fn sacch_info_to_lchan(&mut self, id: LchanId, val: &[u8]) -> Result<(), Cause> {
        let num_msgs = *val.first().ok_or(Cause::IE_CONTENT)?;
        let mut cur = &val[1..];
        for _ in 0..num_msgs {
            let (&rsl_si, rest) = cur.split_first().ok_or(Cause::IE_CONTENT)?;
            let (&len, rest) = rest.split_first().ok_or(Cause::IE_CONTENT)?;
            if rest.len() < len as usize {
                error!("{id} error parsing SACCH INFO IE");
                return Err(Cause::IE_CONTENT);
            }
            let (payload, rest) = rest.split_at(len as usize);

            let si = SiType::from_rsl(rsl_si).ok_or(Cause::IE_CONTENT)?;
            if !si.is_sacch() {
                return Err(Cause::IE_CONTENT);
            }
            let lchan = self.lchan_mut(id).ok_or(Cause::IE_CONTENT)?;
            lchan.sacch.set(si, payload);
            cur = rest;
        }
        Ok(())
    }

    fn mr_config_to_lchan(&mut self, id: LchanId, val: &[u8]) -> Result<(), Cause> {
        if val.len() > MR_CONFIG_MAX {
            error!("{id} multirate configuration IE too long ({})", val.len());
            return Err(Cause::IE_CONTENT);
        }
        let amr = AmrConfig::parse(val);
        if amr.is_none() {
            warn!("{id} unparseable multirate configuration");
        }
        let lchan = self.lchan_mut(id).ok_or(Cause::IE_CONTENT)?;
        lchan.mr_conf_lv.clear();
        let _ = lchan.mr_conf_lv.push(val.len() as u8);
        let _ = lchan.mr_conf_lv.extend_from_slice(val);
        lchan.amr = amr;
        Ok(())
    }

    /// 8.4.14 RF CHANnel RELease.
    pub(crate) fn rx_rf_chan_rel<B: Backend>(
        &mut self,
        b: &mut B,
        id: LchanId,
    ) -> Result<(), RslError> {
        if self.lchan(id).is_some_and(|l| l.rtp.is_some()) {
            self.tx_ipac_dlcx_ind(b, id, Cause::NORMAL_UNSPEC);
            self.free_rtp_endpoint(b, id);
        }

        if let Some(lchan) = self.lchan_mut(id) {
            lchan.ho = Default::default();
            lchan.rel_act_kind = RelActKind::Rsl;
        }

        // A dynamic timeslot in PDCH mode is released through the PCU.
        let Some(ts) = self.ts(id.trx, id.tn) else {
            return Ok(());
        };
        if ts.pchan == Pchan::TchFTchHPdch && ts.dynamic.pchan_is == Pchan::Pdch {
            if self.dyn_ts_pdch_release(b, id)? {
                // PCU absent: the release is already complete.
                self.tx_rf_rel_ack(b, id);
                if let Some(lchan) = self.lchan_mut(id) {
                    lchan.reset();
                }
            }
            return Ok(());
        }

        if let Some(lchan) = self.lchan_mut(id) {
            lchan.state = LchanState::RelReq;
        }
        if let Err(cause) = b.lchan_deactivate(id) {
            warn!("{id} PHY release request failed: 0x{:02x}", cause.0);
        }
        Ok(())
    }

    /// 8.4.19 RF CHANnel RELease ACKnowledge, with the guard deciding
    /// which releases are acked: RSL-initiated ones, plus the
    /// non-standard case of a PCU release of a dynamic timeslot in PDCH
    /// mode (the release request came from RSL originally).
    pub(crate) fn tx_rf_rel_ack<B: Backend>(&mut self, b: &mut B, id: LchanId) {
        let chan_nr = self.chan_nr(id);
        let Some(ts) = self.ts(id.trx, id.tn) else {
            return;
        };
        let kind = ts.lchan[id.ss as usize].rel_act_kind;
        let dyn_pcu_ack = ts.pchan == Pchan::TchFTchHPdch
            && ts.dynamic.pchan_is == Pchan::Pdch
            && kind == RelActKind::Pcu;
        if kind != RelActKind::Rsl && !dyn_pcu_ack {
            info!("{id} not sending REL ACK");
            return;
        }

        // The BTS is done with the channel; free the LAPDm side too.
        b.release(id);

        info!("{id} tx RF CHAN REL ACK");
        send_reply(b, id.trx, build::rf_chan_rel_ack(chan_nr));
    }

    /// PHY confirmation of a channel activation.
    pub fn lchan_act_confirm<B: Backend>(
        &mut self,
        b: &mut B,
        id: LchanId,
        result: Result<(), Cause>,
    ) {
        match result {
            Ok(()) => {
                if let Some(lchan) = self.lchan_mut(id) {
                    lchan.state = LchanState::Active;
                }
                self.tx_chan_act_acknack(b, id, None);
            }
            Err(cause) => {
                if let Some(lchan) = self.lchan_mut(id) {
                    lchan.state = LchanState::None;
                }
                self.tx_chan_act_acknack(b, id, Some(cause));
            }
        }
    }

    /// PHY confirmation of a channel release.
    pub fn lchan_rel_confirm<B: Backend>(&mut self, b: &mut B, id: LchanId) {
        let kind = self
            .lchan(id)
            .map(|l| l.rel_act_kind)
            .unwrap_or_default();

        if kind == RelActKind::Reactivate {
            // CCCH reconfiguration: bring the channel straight back up.
            if let Some(lchan) = self.lchan_mut(id) {
                lchan.reset();
                lchan.state = LchanState::ActReq;
            }
            if let Some(lchan) = self.lchan(id) {
                if let Err(cause) = b.lchan_activate(id, lchan) {
                    error!("{id} reactivation failed: 0x{:02x}", cause.0);
                    if let Some(lchan) = self.lchan_mut(id) {
                        lchan.state = LchanState::None;
                    }
                }
            }
            return;
        }

        self.tx_rf_rel_ack(b, id);
        if let Some(lchan) = self.lchan_mut(id) {
            lchan.reset();
        }
    }

    /// 8.4.6 ENCRYPTION COMMAND: update the cipher state and rewrap the
    /// L3 payload as a LAPDm DATA REQuest.
    pub(crate) fn rx_encr_cmd<B: Backend>(
        &mut self,
        b: &mut B,
        id: LchanId,
        chan_nr: ChanNr,
        l3: &[u8],
    ) -> Result<(), RslError> {
        let mut encr_info = None;
        let mut l3_info = None;
        let mut link_id = None;
        for_each_ie(l3, |t, v| match t {
            tag::ENCR_INFO => encr_info = Some(v),
            tag::L3_INFO => l3_info = Some(v),
            tag::LINK_IDENT => link_id = v.first().copied(),
            _ => {}
        })
        .ok();

        let (Some(encr_info), Some(l3_info), Some(link_id)) = (encr_info, l3_info, link_id)
        else {
            return self.tx_error_report(b, id.trx, Cause::MAND_IE_ERROR);
        };

        if let Err(cause) = self.encr_info_to_lchan(id, encr_info) {
            return self.tx_error_report(b, id.trx, cause);
        }

        let alg_id = self
            .lchan(id)
            .and_then(|l| l.encr.as_ref())
            .map(|e| e.alg_id)
            .unwrap_or(0);
        info!("{id} fwd ENCR CMD (alg {alg_id}) to LAPDm");
        let wrapped = build::rll_data_req(chan_nr, link_id, l3_info)?;
        b.submit(id, wrapped);
        Ok(())
    }

    /// 8.4.9 MODE MODIFY.
    pub(crate) fn rx_mode_modify<B: Backend>(
        &mut self,
        b: &mut B,
        id: LchanId,
        l3: &[u8],
    ) -> Result<(), RslError> {
        let chan_nr = self.chan_nr(id);
        let mut chan_mode = None;
        let mut encr_info = None;
        let mut mr_config = None;
        for_each_ie(l3, |t, v| match t {
            tag::CHAN_MODE => chan_mode = Some(v),
            tag::ENCR_INFO => encr_info = Some(v),
            tag::MR_CONFIG => mr_config = Some(v),
            _ => {}
        })
        .ok();

        // 9.3.6 Channel Mode
        let Some(cm) = chan_mode.and_then(ChanMode::parse) else {
            warn!("{id} missing Channel Mode");
            send_reply(
                b,
                id.trx,
                build::mode_modify_nack(chan_nr, Cause::MAND_IE_ERROR),
            );
            return Ok(());
        };
        if let Some(lchan) = self.lchan_mut(id) {
            lchan.rsl_cmode = Some(cm.spd_ind);
            if let Some(mode) = TchMode::from_chan_mode(&cm) {
                lchan.tch_mode = mode;
            }
        }

        // 9.3.7 Encryption Information
        if let Some(val) = encr_info {
            if let Err(cause) = self.encr_info_to_lchan(id, val) {
                return self.tx_error_report(b, id.trx, cause);
            }
        }

        // 9.3.52 MultiRate Configuration
        if let Some(val) = mr_config {
            if let Err(cause) = self.mr_config_to_lchan(id, val) {
                return self.tx_error_report(b, id.trx, cause);
            }
        }

        if let Some(lchan) = self.lchan(id) {
            if let Err(cause) = b.lchan_modify(id, lchan) {
                warn!("{id} PHY mode modify failed: 0x{:02x}", cause.0);
            }
        }

        info!("{id} tx MODE MODIF ACK");
        send_reply(b, id.trx, build::mode_modify_ack(chan_nr));
        Ok(())
    }

    /// 8.4.15 MS POWER CONTROL: the BSC takes over power control.
    pub(crate) fn rx_ms_pwr_ctrl<B: Backend>(
        &mut self,
        b: &mut B,
        id: LchanId,
        l3: &[u8],
    ) -> Result<(), RslError> {
        if let Some(val) = TlvReader::find(l3, tag::MS_POWER) {
            let pwr = val.first().copied().unwrap_or(0) & 0x1f;
            if let Some(lchan) = self.lchan_mut(id) {
                lchan.ms_power_ctrl.fixed = true;
                lchan.ms_power_ctrl.current = pwr;
            }
            info!("{id} forcing MS power to {pwr}");
            if let Some(lchan) = self.lchan(id) {
                b.adjust_ms_power(id, lchan);
            }
        }
        Ok(())
    }

    /// 8.4.20 SACCH INFO MODify.
    pub(crate) fn rx_sacch_info_modify<B: Backend>(
        &mut self,
        b: &mut B,
        id: LchanId,
        l3: &[u8],
    ) -> Result<(), RslError> {
        let mut starting_time = false;
        let mut si_type = None;
        let mut l3_info = None;
        for_each_ie(l3, |t, v| match t {
            tag::STARTING_TIME => starting_time = true,
            tag::SYSINFO_TYPE => si_type = v.first().copied(),
            tag::L3_INFO => l3_info = Some(v),
            _ => {}
        })
        .ok();

        if starting_time {
            warn!("{id} SACCH INFO MODIFY with starting time not supported");
            return self.tx_error_report(b, id.trx, Cause::SERV_OPT_UNIMPL);
        }
        let Some(rsl_si) = si_type else {
            return self.tx_error_report(b, id.trx, Cause::MAND_IE_ERROR);
        };
        let si = match SiType::from_rsl(rsl_si) {
            Some(si) if si.is_sacch() => si,
            _ => return self.tx_error_report(b, id.trx, Cause::IE_CONTENT),
        };

        let Some(lchan) = self.lchan_mut(id) else {
            return Ok(());
        };
        match l3_info {
            Some(payload) => {
                lchan.sacch.set(si, payload);
                info!("{id} rx SACCH INFO MODIFY ({si:?})");
            }
            None => {
                lchan.sacch.clear(si);
                info!("{id} rx disabling SACCH ({si:?})");
            }
        }
        Ok(())
    }

    /// 8.4.8 MEASurement RESult, rerouting an uplink measurement report
    /// received on the SACCH.
    fn tx_meas_res<B: Abis>(&mut self, b: &mut B, id: LchanId, l3: &[u8]) {
        let chan_nr = self.chan_nr(id);
        let Some(lchan) = self.lchan_mut(id) else {
            return;
        };
        let meas_res_nr = lchan.meas.res_nr;
        lchan.meas.res_nr = meas_res_nr.wrapping_add(1);
        let ul_res = lchan.meas.ul_res.take();
        let l1_info = lchan.meas.l1_info.take();
        let parts = MeasResParts {
            meas_res_nr,
            uplink_meas: ul_res.as_ref().map(|r| &r[..]),
            bs_power: lchan.meas.bts_tx_pwr,
            l1_info,
            l3,
        };
        debug!("{id} tx MEAS RES nr={meas_res_nr}");
        send_reply(b, id.trx, build::meas_res(chan_nr, &parts));
    }

    /// Uplink callback from LAPDm: measurement reports become MEAS RES,
    /// everything else goes to the A-bis link unchanged. Takes the
    /// message, matching the LAPDm ownership contract.
    pub fn lapdm_rx<B: Backend>(&mut self, b: &mut B, id: LchanId, msg: RslMsg) {
        let state = self.lchan(id).map(|l| l.state).unwrap_or_default();
        if state != LchanState::Active {
            info!("{id} is not active ({state:?}), dropping uplink message");
            return;
        }

        if let Some(l3) = rll_meas_report(&msg) {
            debug!("{id} handing uplink report from LAPDm to MEAS RES");
            self.tx_meas_res(b, id, l3);
            return;
        }

        debug!("{id} fwd uplink message from LAPDm to A-bis");
        b.send(id.trx, msg);
    }

    /// 8.4.4 CONNECTION FAILURE INDICATION.
    pub fn tx_conn_fail<B: Abis>(&self, b: &mut B, id: LchanId, cause: Cause) {
        warn!("{id} tx CONN FAIL, cause=0x{:02x}", cause.0);
        send_reply(b, id.trx, build::conn_fail(self.chan_nr(id), cause));
    }

    /// 8.4.7 HANDOver DETection.
    pub fn tx_hando_det<B: Abis>(&self, b: &mut B, id: LchanId, acc_delay: Option<u8>) {
        info!("{id} tx HANDO DET");
        send_reply(b, id.trx, build::hando_det(self.chan_nr(id), acc_delay));
    }
}

/// A measurement report is an RLL UNIT DATA INDication on a SACCH link
/// carrying an RR MEASUREMENT REPORT (or the extended variant). Returns
/// its L3 part.
fn rll_meas_report(msg: &RslMsg) -> Option<&[u8]> {
    const GSM48_PDISC_RR: u8 = 0x06;
    const GSM48_MT_RR_MEAS_REP: u8 = 0x15;
    const GSM48_MT_RR_EXT_MEAS_REP: u8 = 0x36;

    let (hdr, l3_off) = RslHeader::parse(msg).ok()?;
    let RslHeader::Rll {
        msg_type, link_id, ..
    } = hdr
    else {
        return None;
    };
    if MsgType::from_byte(msg_type) != Some(MsgType::UnitDataInd) {
        return None;
    }
    if !crate::wire::ie::link_id_is_sacch(link_id) {
        return None;
    }
    let l3 = TlvReader::find(&msg[l3_off..], tag::L3_INFO)?;
    if l3.len() < 2 || l3[0] & 0x0f != GSM48_PDISC_RR {
        return None;
    }
    matches!(l3[1], GSM48_MT_RR_MEAS_REP | GSM48_MT_RR_EXT_MEAS_REP).then_some(l3)
}
