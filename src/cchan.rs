//! # Common channel management
//!
//! BCCH system information storage, SACCH filling, paging, SMS cell
//! broadcast and the AGCH immediate-assignment queue, plus the outbound
//! CCCH load reports.

use heapless::Vec;
use log::{info, warn};

use crate::backend::{Abis, Backend};
use crate::bts::Bts;
use crate::chan::{LchanId, CCCH_LCHAN, RelActKind};
use crate::dispatch::send_reply;
use crate::time::GsmTime;
use crate::wire::build;
use crate::wire::ie::{tag, Cause, ChanNr, SiType};
use crate::wire::tlv::{for_each_ie, RslMsg};
use crate::RslError;

/// 8.5.1 BCCH INFOrmation / 8.6.2 SACCH FILLING, which share their IE
/// layout: the SI type is mandatory, the payload optional (its absence
/// disables the filling).
struct SysinfoReq<'a> {
    si: SiType,
    full_bcch: Option<&'a [u8]>,
    l3_info: Option<&'a [u8]>,
}

impl<'a> SysinfoReq<'a> {
    fn parse(l3: &'a [u8], sacch: bool) -> Result<SysinfoReq<'a>, Cause> {
        let mut si_type = None;
        let mut full_bcch = None;
        let mut l3_info = None;
        for_each_ie(l3, |t, v| match t {
            tag::SYSINFO_TYPE => si_type = v.first().copied(),
            tag::FULL_BCCH_INFO => full_bcch = Some(v),
            tag::L3_INFO => l3_info = Some(v),
            _ => {}
        })
        .map_err(|_| Cause::IE_CONTENT)?;

        // 9.3.30 System Info Type
        let rsl_si = si_type.ok_or(Cause::MAND_IE_ERROR)?;
        let si = SiType::from_rsl(rsl_si).ok_or_else(|| {
            warn!("rx SI type 0x{rsl_si:02x} not supported");
            Cause::IE_CONTENT
        })?;
        if si.is_sacch() != sacch {
            return Err(Cause::IE_CONTENT);
        }
        Ok(SysinfoReq {
            si,
            full_bcch,
            l3_info,
        })
    }
}

/// SI2quater rest octets carry a segment index and count; only the
/// single-segment form (0/0) is supported.
fn si2quater_single_segment(payload: &[u8]) -> bool {
    // rest octets start after the 3-byte header; index and count are the
    // two 4-bit fields at bit offset 3
    let Some(rest) = payload.get(3..5) else {
        return false;
    };
    let v = u16::from_be_bytes([rest[0], rest[1]]);
    let index = (v >> 9) & 0xf;
    let count = (v >> 5) & 0xf;
    if index != 0 || count != 0 {
        warn!("rx SI2quater with unsupported index {index}, count {count}");
        return false;
    }
    true
}

impl Bts {
    /// 8.5.1 BCCH INFOrmation.
    pub(crate) fn rx_bcch_info<B: Backend>(
        &mut self,
        b: &mut B,
        trx: u8,
        l3: &[u8],
    ) -> Result<(), RslError> {
        let req = match SysinfoReq::parse(l3, false) {
            Ok(req) => req,
            Err(cause) => return self.tx_error_report(b, trx, cause),
        };

        match req.full_bcch.or(req.l3_info) {
            Some(payload) => {
                if req.si == SiType::Si2quater && !si2quater_single_segment(payload) {
                    return self.tx_error_report(b, trx, Cause::IE_CONTENT);
                }
                self.si.set_bcch(req.si, payload);
                info!("rx BCCH INFO ({:?})", req.si);

                // A changed AGCH split forces the CCCH through a
                // deactivate/reactivate cycle.
                if req.si == SiType::Si3 && trx == 0 && self.si.num_agch() != 1 {
                    let ccch = LchanId {
                        trx: 0,
                        tn: 0,
                        ss: CCCH_LCHAN as u8,
                    };
                    if let Some(lchan) = self.lchan_mut(ccch) {
                        lchan.rel_act_kind = RelActKind::Reactivate;
                        lchan.encr = None;
                    }
                    if let Err(cause) = b.lchan_deactivate(ccch) {
                        warn!("{ccch} CCCH deactivation failed: 0x{:02x}", cause.0);
                    }
                }
            }
            None => {
                self.si.clear(req.si);
                info!("rx disabling BCCH INFO ({:?})", req.si);
            }
        }
        b.new_sysinfo();
        Ok(())
    }

    /// 8.6.2 SACCH FILLING (TRX scope).
    pub(crate) fn rx_sacch_fill<B: Backend>(
        &mut self,
        b: &mut B,
        trx: u8,
        l3: &[u8],
    ) -> Result<(), RslError> {
        let req = match SysinfoReq::parse(l3, true) {
            Ok(req) => req,
            Err(cause) => return self.tx_error_report(b, trx, cause),
        };

        match req.l3_info {
            Some(payload) => {
                self.si.set_sacch(req.si, payload);
                info!("rx SACCH FILLING ({:?})", req.si);
            }
            None => {
                self.si.clear(req.si);
                info!("rx disabling SACCH FILLING ({:?})", req.si);
            }
        }
        b.new_sysinfo();
        Ok(())
    }

    /// 8.5.5 PAGING COMMAND.
    pub(crate) fn rx_paging_cmd<B: Backend>(
        &mut self,
        b: &mut B,
        trx: u8,
        l3: &[u8],
    ) -> Result<(), RslError> {
        let mut paging_group = None;
        let mut identity = None;
        let mut chan_needed = 0;
        for_each_ie(l3, |t, v| match t {
            tag::PAGING_GROUP => paging_group = v.first().copied(),
            tag::MS_IDENTITY => identity = Some(v),
            tag::CHAN_NEEDED => chan_needed = v.first().copied().unwrap_or(0),
            _ => {}
        })
        .ok();

        let (Some(group), Some(identity)) = (paging_group, identity) else {
            return self.tx_error_report(b, trx, Cause::MAND_IE_ERROR);
        };

        // The paging layer and the PCU both take the identity as LV.
        let mut identity_lv: Vec<u8, 17> = Vec::new();
        if identity_lv.push(identity.len() as u8).is_err()
            || identity_lv.extend_from_slice(identity).is_err()
        {
            return self.tx_error_report(b, trx, Cause::IE_CONTENT);
        }

        if b.paging_add_identity(group, &identity_lv, chan_needed).is_err() {
            warn!("paging queue rejected identity (group {group})");
        }
        b.tx_pag_req(&identity_lv, chan_needed);
        Ok(())
    }

    /// 8.5.8 SMS BROADCAST COMMAND.
    pub(crate) fn rx_sms_bcast_cmd<B: Backend>(
        &mut self,
        b: &mut B,
        trx: u8,
        l3: &[u8],
    ) -> Result<(), RslError> {
        let mut cmd_type = None;
        let mut smscb_msg = None;
        for_each_ie(l3, |t, v| match t {
            tag::CB_CMD_TYPE => cmd_type = v.first().copied(),
            tag::SMSCB_MSG => smscb_msg = Some(v),
            _ => {}
        })
        .ok();

        let (Some(cmd_type), Some(msg)) = (cmd_type, smscb_msg) else {
            return self.tx_error_report(b, trx, Cause::MAND_IE_ERROR);
        };
        b.smscb_command(cmd_type, msg);
        Ok(())
    }

    /// 8.5.6 IMMEDIATE ASSIGN COMMAND: keep only the 04.08 RR part and
    /// queue it for the AGCH.
    pub(crate) fn rx_imm_ass<B: Backend>(
        &mut self,
        b: &mut B,
        trx: u8,
        l3: &[u8],
    ) -> Result<(), RslError> {
        let mut full_imm_ass = None;
        for_each_ie(l3, |t, v| {
            if t == tag::FULL_IMM_ASS_INFO {
                full_imm_ass = Some(v);
            }
        })
        .ok();

        let Some(rr_part) = full_imm_ass else {
            return self.tx_error_report(b, trx, Cause::MAND_IE_ERROR);
        };

        let trimmed = RslMsg::from_slice(rr_part)?;
        if self.agch_enqueue(trimmed).is_err() {
            // No AGCH capacity; the BSC recovers via its own repetition.
            warn!("AGCH queue full, dropping IMMEDIATE ASSIGN");
        }
        Ok(())
    }

    /// 8.5.2 CCCH LOAD INDICATION, paging form.
    pub fn tx_ccch_load_ind_pch<B: Abis>(&self, b: &mut B, paging_avail: u16) {
        info!("tx CCCH LOAD IND (PCH), paging_avail={paging_avail}");
        send_reply(b, 0, build::ccch_load_ind_pch(paging_avail));
    }

    /// 8.5.2 CCCH LOAD INDICATION, RACH form.
    pub fn tx_ccch_load_ind_rach<B: Abis>(&self, b: &mut B, total: u16, busy: u16, access: u16) {
        info!("tx CCCH LOAD IND (RACH), total={total} busy={busy} access={access}");
        send_reply(b, 0, build::ccch_load_ind_rach(total, busy, access));
    }

    /// 8.5.3 CHANnel ReQuireD, reporting a RACH burst to the BSC. The
    /// caller names the RACH the burst arrived on.
    pub fn tx_chan_rqd<B: Abis>(
        &self,
        b: &mut B,
        trx: u8,
        chan_nr: ChanNr,
        ra: u8,
        time: &GsmTime,
        acc_delay: u8,
    ) {
        info!("tx CHAN RQD, ra=0x{ra:02x}");
        send_reply(b, trx, build::chan_rqd(chan_nr, ra, time, acc_delay));
    }
}
