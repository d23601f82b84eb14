//! # Outbound message constructors
//!
//! One constructor per message the BTS transmits towards the BSC. Each
//! returns a fully framed [`RslMsg`]; the callers only decide *whether*
//! to send, never *how* to encode.

use super::header::{MsgDiscr, MsgType};
use super::ie::{tag, Cause, ChanNr};
use super::tlv::RslMsg;
use crate::backend::RtpStats;
use crate::time::GsmTime;
use crate::RslError;

fn trx_msg(mt: MsgType) -> Result<RslMsg, RslError> {
    let mut msg = RslMsg::new();
    msg.put_u8(MsgDiscr::Trx as u8)?;
    msg.put_u8(mt as u8)?;
    Ok(msg)
}

fn cchan_msg(mt: MsgType, chan_nr: ChanNr) -> Result<RslMsg, RslError> {
    let mut msg = RslMsg::new();
    msg.put_u8(MsgDiscr::Cchan as u8)?;
    msg.put_u8(mt as u8)?;
    msg.put_tv(tag::CHAN_NR, chan_nr.0)?;
    Ok(msg)
}

fn dchan_msg(mt: MsgType, chan_nr: ChanNr) -> Result<RslMsg, RslError> {
    let mut msg = RslMsg::new();
    msg.put_u8(MsgDiscr::Dchan as u8)?;
    msg.put_u8(mt as u8)?;
    msg.put_tv(tag::CHAN_NR, chan_nr.0)?;
    Ok(msg)
}

fn ipac_msg(mt: MsgType, chan_nr: ChanNr) -> Result<RslMsg, RslError> {
    let mut msg = RslMsg::new();
    msg.put_u8(MsgDiscr::Ipaccess as u8)?;
    msg.put_u8(mt as u8)?;
    msg.put_tv(tag::CHAN_NR, chan_nr.0)?;
    Ok(msg)
}

/// 8.6.4 ERROR REPORT.
pub fn error_report(cause: Cause) -> Result<RslMsg, RslError> {
    let mut msg = trx_msg(MsgType::ErrorReport)?;
    msg.put_tlv(tag::CAUSE, &[cause.0])?;
    Ok(msg)
}

/// 8.6.1 RF RESOURCE INDICATION.
pub fn rf_res_ind() -> Result<RslMsg, RslError> {
    trx_msg(MsgType::RfResInd)
}

/// 8.5.2 CCCH LOAD INDICATION, paging load form.
pub fn ccch_load_ind_pch(paging_avail: u16) -> Result<RslMsg, RslError> {
    let mut msg = cchan_msg(MsgType::CcchLoadInd, ChanNr::pch_agch())?;
    msg.put_tv16(tag::PAGING_LOAD, paging_avail)?;
    Ok(msg)
}

/// 8.5.2 CCCH LOAD INDICATION, RACH load form.
pub fn ccch_load_ind_rach(total: u16, busy: u16, access: u16) -> Result<RslMsg, RslError> {
    let mut msg = cchan_msg(MsgType::CcchLoadInd, ChanNr::rach())?;
    let mut load = [0u8; 6];
    load[0..2].copy_from_slice(&total.to_be_bytes());
    load[2..4].copy_from_slice(&busy.to_be_bytes());
    load[4..6].copy_from_slice(&access.to_be_bytes());
    msg.put_tlv(tag::RACH_LOAD, &load)?;
    Ok(msg)
}

/// 8.5.3 CHANNEL REQUIRED, reporting one RACH burst. `chan_nr` is the
/// RACH the request arrived on.
pub fn chan_rqd(
    chan_nr: ChanNr,
    ra: u8,
    time: &GsmTime,
    acc_delay: u8,
) -> Result<RslMsg, RslError> {
    let mut msg = cchan_msg(MsgType::ChanRqd, chan_nr)?;
    // 9.3.19 Request Reference
    let st = time.starting_time();
    msg.put_tv_fixed(tag::REQ_REFERENCE, &[ra, st[0], st[1]])?;
    // 9.3.17 Access Delay
    msg.put_tv(tag::ACCESS_DELAY, acc_delay)?;
    Ok(msg)
}

/// 8.4.2 CHANNEL ACTIVATION ACKNOWLEDGE.
pub fn chan_act_ack(chan_nr: ChanNr, time: &GsmTime) -> Result<RslMsg, RslError> {
    let mut msg = dchan_msg(MsgType::ChanActivAck, chan_nr)?;
    msg.put_tv_fixed(tag::FRAME_NUMBER, &time.starting_time())?;
    Ok(msg)
}

/// 8.4.3 CHANNEL ACTIVATION NEGATIVE ACKNOWLEDGE.
pub fn chan_act_nack(chan_nr: ChanNr, cause: Cause) -> Result<RslMsg, RslError> {
    let mut msg = dchan_msg(MsgType::ChanActivNack, chan_nr)?;
    msg.put_tlv(tag::CAUSE, &[cause.0])?;
    Ok(msg)
}

/// 8.4.19 RF CHANNEL RELEASE ACKNOWLEDGE.
pub fn rf_chan_rel_ack(chan_nr: ChanNr) -> Result<RslMsg, RslError> {
    dchan_msg(MsgType::RfChanRelAck, chan_nr)
}

/// 8.4.4 CONNECTION FAILURE INDICATION.
pub fn conn_fail(chan_nr: ChanNr, cause: Cause) -> Result<RslMsg, RslError> {
    let mut msg = dchan_msg(MsgType::ConnFail, chan_nr)?;
    msg.put_tlv(tag::CAUSE, &[cause.0])?;
    Ok(msg)
}

/// 8.4.7 HANDOVER DETECTION.
pub fn hando_det(chan_nr: ChanNr, acc_delay: Option<u8>) -> Result<RslMsg, RslError> {
    let mut msg = dchan_msg(MsgType::HandoDet, chan_nr)?;
    if let Some(delay) = acc_delay {
        msg.put_tv(tag::ACCESS_DELAY, delay)?;
    }
    Ok(msg)
}

/// 8.4.10 MODE MODIFY ACKNOWLEDGE.
pub fn mode_modify_ack(chan_nr: ChanNr) -> Result<RslMsg, RslError> {
    dchan_msg(MsgType::ModeModifyAck, chan_nr)
}

/// 8.4.11 MODE MODIFY NEGATIVE ACKNOWLEDGE.
pub fn mode_modify_nack(chan_nr: ChanNr, cause: Cause) -> Result<RslMsg, RslError> {
    let mut msg = dchan_msg(MsgType::ModeModifyNack, chan_nr)?;
    msg.put_tlv(tag::CAUSE, &[cause.0])?;
    Ok(msg)
}

/// PDCH ACTIVATION / DEACTIVATION ACKNOWLEDGE (ip.access dialect,
/// carried in the dedicated channel group).
pub fn dyn_pdch_ack(chan_nr: ChanNr, pdch_act: bool) -> Result<RslMsg, RslError> {
    let mt = if pdch_act {
        MsgType::IpacPdchActAck
    } else {
        MsgType::IpacPdchDeactAck
    };
    dchan_msg(mt, chan_nr)
}

/// PDCH ACTIVATION / DEACTIVATION NEGATIVE ACKNOWLEDGE.
pub fn dyn_pdch_nack(chan_nr: ChanNr, pdch_act: bool, cause: Cause) -> Result<RslMsg, RslError> {
    let mt = if pdch_act {
        MsgType::IpacPdchActNack
    } else {
        MsgType::IpacPdchDeactNack
    };
    let mut msg = dchan_msg(mt, chan_nr)?;
    msg.put_tlv(tag::CAUSE, &[cause.0])?;
    Ok(msg)
}

/// CRCX/MDCX ACKNOWLEDGE. `payload2` is echoed only when the request
/// carried RTP Payload 2.
pub fn ipac_cx_ack(
    orig: MsgType,
    chan_nr: ChanNr,
    conn_id: u16,
    local_ip: u32,
    local_port: u16,
    payload2: Option<u8>,
) -> Result<RslMsg, RslError> {
    let mt = match orig {
        MsgType::IpacCrcx => MsgType::IpacCrcxAck,
        _ => MsgType::IpacMdcxAck,
    };
    let mut msg = ipac_msg(mt, chan_nr)?;
    msg.put_tv16(tag::IPAC_CONN_ID, conn_id)?;
    msg.put_u8(tag::IPAC_LOCAL_IP)?;
    msg.put_u32(local_ip)?;
    msg.put_tv16(tag::IPAC_LOCAL_PORT, local_port)?;
    if let Some(pt2) = payload2 {
        msg.put_tv(tag::IPAC_RTP_PAYLOAD2, pt2)?;
    }
    Ok(msg)
}

/// CRCX/MDCX NEGATIVE ACKNOWLEDGE. `remote` echoes the requested remote
/// endpoint when the CRCX carried one.
pub fn ipac_cx_nack(
    orig: MsgType,
    chan_nr: ChanNr,
    cause: Cause,
    remote: Option<(u32, u16)>,
) -> Result<RslMsg, RslError> {
    let mt = match orig {
        MsgType::IpacCrcx => MsgType::IpacCrcxNack,
        _ => MsgType::IpacMdcxNack,
    };
    let mut msg = ipac_msg(mt, chan_nr)?;
    if let Some((ip, port)) = remote {
        msg.put_u8(tag::IPAC_REMOTE_IP)?;
        msg.put_u32(ip)?;
        msg.put_tv16(tag::IPAC_REMOTE_PORT, port)?;
    }
    msg.put_tlv(tag::CAUSE, &[cause.0])?;
    Ok(msg)
}

/// DLCX ACKNOWLEDGE; connection id and stats included when the request
/// carried a connection id.
pub fn ipac_dlcx_ack(
    chan_nr: ChanNr,
    conn: Option<(u16, &RtpStats)>,
) -> Result<RslMsg, RslError> {
    let mut msg = ipac_msg(MsgType::IpacDlcxAck, chan_nr)?;
    if let Some((conn_id, stats)) = conn {
        msg.put_tv16(tag::IPAC_CONN_ID, conn_id)?;
        msg.put_tlv(tag::IPAC_CONN_STAT, &stats.encode())?;
    }
    Ok(msg)
}

/// DLCX NEGATIVE ACKNOWLEDGE.
pub fn ipac_dlcx_nack(
    chan_nr: ChanNr,
    conn_id: Option<u16>,
    cause: Cause,
) -> Result<RslMsg, RslError> {
    let mut msg = ipac_msg(MsgType::IpacDlcxNack, chan_nr)?;
    if let Some(id) = conn_id {
        msg.put_tv16(tag::IPAC_CONN_ID, id)?;
    }
    msg.put_tlv(tag::CAUSE, &[cause.0])?;
    Ok(msg)
}

/// Spontaneous DLCX INDICATION, sent when the BTS tears an endpoint down
/// on its own (RF channel release).
pub fn ipac_dlcx_ind(
    chan_nr: ChanNr,
    conn_id: u16,
    stats: &RtpStats,
    cause: Cause,
) -> Result<RslMsg, RslError> {
    let mut msg = ipac_msg(MsgType::IpacDlcxInd, chan_nr)?;
    msg.put_tv16(tag::IPAC_CONN_ID, conn_id)?;
    msg.put_tlv(tag::IPAC_CONN_STAT, &stats.encode())?;
    msg.put_tlv(tag::CAUSE, &[cause.0])?;
    Ok(msg)
}

/// 8.4.8 MEASUREMENT RESULT carrying a rerouted uplink report.
pub struct MeasResParts<'a> {
    pub meas_res_nr: u8,
    pub uplink_meas: Option<&'a [u8]>,
    pub bs_power: u8,
    pub l1_info: Option<[u8; 2]>,
    pub l3: &'a [u8],
}

pub fn meas_res(chan_nr: ChanNr, parts: &MeasResParts<'_>) -> Result<RslMsg, RslError> {
    let mut msg = dchan_msg(MsgType::MeasRes, chan_nr)?;
    msg.put_tv(tag::MEAS_RES_NR, parts.meas_res_nr)?;
    if let Some(ul) = parts.uplink_meas {
        msg.put_tlv(tag::UPLINK_MEAS, ul)?;
    }
    msg.put_tv(tag::BS_POWER, parts.bs_power)?;
    if let Some(l1) = parts.l1_info {
        msg.put_tv_fixed(tag::L1_INFO, &l1)?;
    }
    msg.put_tl16v(tag::L3_INFO, parts.l3)?;
    Ok(msg)
}

/// RLL DATA REQUEST wrapper: rebuilds an L3 payload as a radio link
/// layer message for LAPDm, as done when rewrapping an ENCRYPTION
/// COMMAND.
pub fn rll_data_req(chan_nr: ChanNr, link_id: u8, l3: &[u8]) -> Result<RslMsg, RslError> {
    let mut msg = RslMsg::new();
    msg.put_u8(MsgDiscr::Rll as u8)?;
    msg.put_u8(MsgType::DataReq as u8)?;
    msg.put_tv(tag::CHAN_NR, chan_nr.0)?;
    msg.put_tv(tag::LINK_IDENT, link_id)?;
    msg.put_tl16v(tag::L3_INFO, l3)?;
    Ok(msg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_report_frame() {
        let msg = error_report(Cause::MAND_IE_ERROR).unwrap();
        assert_eq!(
            msg.as_slice(),
            &[0x10, 0x1c, tag::CAUSE, 0x01, 0x61]
        );
    }

    #[test]
    fn chan_act_ack_carries_frame_number() {
        let gt = GsmTime::from_fn(42);
        let msg = chan_act_ack(ChanNr::tch_f(1), &gt).unwrap();
        let st = gt.starting_time();
        assert_eq!(
            msg.as_slice(),
            &[0x08, 0x22, tag::CHAN_NR, 0x09, tag::FRAME_NUMBER, st[0], st[1]]
        );
    }

    #[test]
    fn rach_load_is_a_six_byte_ie() {
        let msg = ccch_load_ind_rach(0x0102, 0x0304, 0x0506).unwrap();
        assert_eq!(
            msg.as_slice(),
            &[
                0x0c, 0x12, tag::CHAN_NR, 0x88, tag::RACH_LOAD, 6, 1, 2, 3, 4, 5, 6
            ]
        );
    }

    #[test]
    fn crcx_ack_payload2_is_optional() {
        let with = ipac_cx_ack(MsgType::IpacCrcx, ChanNr::tch_f(0), 1, 0, 4000, Some(98)).unwrap();
        let without = ipac_cx_ack(MsgType::IpacCrcx, ChanNr::tch_f(0), 1, 0, 4000, None).unwrap();
        assert_eq!(with.len(), without.len() + 2);
        assert_eq!(with.as_slice()[1], 0x71);
    }
}
