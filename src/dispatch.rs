//! # RSL dispatcher
//!
//! Entry point for every message arriving from the BSC: validates the
//! header, resolves the addressed channel, and hands the message to the
//! common-channel, dedicated-channel, TRX or ip.access handler. Radio
//! link layer messages go straight to LAPDm, which takes ownership.

use log::{debug, info, warn};

use crate::backend::{Abis, Backend};
use crate::bts::Bts;
use crate::wire::build;
use crate::wire::header::{MsgType, RslHeader};
use crate::wire::ie::{Cause, ChanNr};
use crate::wire::tlv::RslMsg;
use crate::RslError;

/// Transmit a built reply, logging instead of failing when the encoder
/// reports overflow.
pub(crate) fn send_reply<B: Abis>(b: &mut B, trx: u8, msg: Result<RslMsg, RslError>) {
    match msg {
        Ok(msg) => b.send(trx, msg),
        Err(e) => warn!("dropping unencodable reply: {e:?}"),
    }
}

impl Bts {
    /// 8.6.4 ERROR REPORT towards the BSC.
    pub fn tx_error_report<B: Abis>(
        &self,
        b: &mut B,
        trx: u8,
        cause: Cause,
    ) -> Result<(), RslError> {
        info!("tx RSL ERROR REPORT, cause=0x{:02x}", cause.0);
        send_reply(b, trx, build::error_report(cause));
        Ok(())
    }

    /// 8.6.1 RF RESOURCE INDICATION.
    pub fn tx_rf_res_ind<B: Abis>(&self, b: &mut B, trx: u8) {
        info!("tx RSL RF RESOURCE INDICATION");
        send_reply(b, trx, build::rf_res_ind());
    }

    /// Dispatch one inbound RSL message. Undersized or unaddressable
    /// messages are dropped with an error; handlers produce any wire
    /// reply themselves.
    pub fn rsl_rx<B: Backend>(
        &mut self,
        b: &mut B,
        trx: u8,
        msg: RslMsg,
    ) -> Result<(), RslError> {
        let (hdr, l3_off) = match RslHeader::parse(&msg) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("RSL message dropped: {e:?}");
                return Err(e);
            }
        };

        match hdr {
            RslHeader::Rll { msg_type, chan_nr, .. } => {
                self.rx_rll(b, trx, msg_type, chan_nr, msg)
            }
            RslHeader::Cchan { msg_type, chan_nr } => {
                self.rx_cchan(b, trx, msg_type, chan_nr, &msg[l3_off..])
            }
            RslHeader::Dchan { msg_type, chan_nr } => {
                self.rx_dchan(b, trx, msg_type, chan_nr, msg, l3_off)
            }
            RslHeader::Trx { msg_type } => self.rx_trx(b, trx, msg_type, &msg[l3_off..]),
            RslHeader::Ipac { msg_type, chan_nr } => {
                self.rx_ipac(b, trx, msg_type, chan_nr, &msg[l3_off..])
            }
        }
    }

    /// Radio link layer: ownership moves to LAPDm, which may queue the
    /// message indefinitely.
    fn rx_rll<B: Backend>(
        &mut self,
        b: &mut B,
        trx: u8,
        msg_type: u8,
        chan_nr: ChanNr,
        msg: RslMsg,
    ) -> Result<(), RslError> {
        let Some(id) = self.lookup(trx, chan_nr) else {
            warn!("rx RLL 0x{msg_type:02x} for unknown lchan");
            return self.tx_error_report(b, trx, Cause::IE_CONTENT);
        };
        debug!("{id} rx RLL 0x{msg_type:02x} A-bis -> LAPDm");
        b.submit(id, msg);
        Ok(())
    }

    fn rx_cchan<B: Backend>(
        &mut self,
        b: &mut B,
        trx: u8,
        msg_type: u8,
        chan_nr: ChanNr,
        l3: &[u8],
    ) -> Result<(), RslError> {
        let Some(id) = self.lookup(trx, chan_nr) else {
            warn!("rx cchan 0x{msg_type:02x} for unknown lchan");
            return self.tx_error_report(b, trx, Cause::IE_CONTENT);
        };
        debug!("{id} rx RSL cchan 0x{msg_type:02x}");

        match MsgType::from_byte(msg_type) {
            Some(MsgType::BcchInfo) => self.rx_bcch_info(b, trx, l3),
            Some(MsgType::ImmediateAssignCmd) => self.rx_imm_ass(b, trx, l3),
            Some(MsgType::PagingCmd) => self.rx_paging_cmd(b, trx, l3),
            Some(MsgType::SmsBcCmd) => self.rx_sms_bcast_cmd(b, trx, l3),
            Some(MsgType::SmsBcReq) | Some(MsgType::NotCmd) => {
                info!("unimplemented RSL cchan msg_type 0x{msg_type:02x}");
                Ok(())
            }
            _ => {
                warn!("undefined RSL cchan msg_type 0x{msg_type:02x}");
                Err(RslError::UnknownMsgType(msg_type))
            }
        }
    }

    fn rx_dchan<B: Backend>(
        &mut self,
        b: &mut B,
        trx: u8,
        msg_type: u8,
        chan_nr: ChanNr,
        msg: RslMsg,
        l3_off: usize,
    ) -> Result<(), RslError> {
        let Some(id) = self.lookup(trx, chan_nr) else {
            warn!("rx dchan 0x{msg_type:02x} for unknown lchan");
            return self.tx_error_report(b, trx, Cause::IE_CONTENT);
        };
        debug!("{id} rx RSL dchan 0x{msg_type:02x}");

        match MsgType::from_byte(msg_type) {
            Some(MsgType::ChanActiv) => {
                return self.rx_chan_activ(b, trx, chan_nr, msg, l3_off);
            }
            Some(MsgType::RfChanRel) => self.rx_rf_chan_rel(b, id),
            Some(MsgType::SacchInfoModify) => self.rx_sacch_info_modify(b, id, &msg[l3_off..]),
            Some(MsgType::DeactivateSacch) => {
                if let Err(cause) = b.sacch_deactivate(id) {
                    warn!("{id} SACCH deactivation failed: 0x{:02x}", cause.0);
                }
                Ok(())
            }
            Some(MsgType::EncrCmd) => self.rx_encr_cmd(b, id, chan_nr, &msg[l3_off..]),
            Some(MsgType::ModeModifyReq) => self.rx_mode_modify(b, id, &msg[l3_off..]),
            Some(MsgType::MsPowerControl) => self.rx_ms_pwr_ctrl(b, id, &msg[l3_off..]),
            Some(MsgType::IpacPdchAct) => self.rx_dyn_pdch(b, id, true),
            Some(MsgType::IpacPdchDeact) => self.rx_dyn_pdch(b, id, false),
            Some(
                MsgType::PhyContextReq
                | MsgType::PreprocConfig
                | MsgType::RtdRep
                | MsgType::PreHandoNotif
                | MsgType::MrCodecModReq
                | MsgType::TfoModReq,
            ) => {
                info!("unimplemented RSL dchan msg_type 0x{msg_type:02x}");
                Ok(())
            }
            _ => {
                warn!("undefined RSL dchan msg_type 0x{msg_type:02x}");
                Err(RslError::UnknownMsgType(msg_type))
            }
        }
    }

    fn rx_trx<B: Backend>(
        &mut self,
        b: &mut B,
        trx: u8,
        msg_type: u8,
        l3: &[u8],
    ) -> Result<(), RslError> {
        match MsgType::from_byte(msg_type) {
            Some(MsgType::SacchFill) => self.rx_sacch_fill(b, trx, l3),
            _ => {
                warn!("undefined RSL TRX msg_type 0x{msg_type:02x}");
                Err(RslError::UnknownMsgType(msg_type))
            }
        }
    }

    fn rx_ipac<B: Backend>(
        &mut self,
        b: &mut B,
        trx: u8,
        msg_type: u8,
        chan_nr: ChanNr,
        l3: &[u8],
    ) -> Result<(), RslError> {
        let Some(id) = self.lookup(trx, chan_nr) else {
            warn!("rx ip.access 0x{msg_type:02x} for unknown lchan");
            return self.tx_error_report(b, trx, Cause::IE_CONTENT);
        };
        debug!("{id} rx RSL ip.access 0x{msg_type:02x}");

        match MsgType::from_byte(msg_type) {
            Some(mt @ (MsgType::IpacCrcx | MsgType::IpacMdcx)) => {
                self.rx_ipac_crcx_mdcx(b, id, chan_nr, mt, l3)
            }
            Some(MsgType::IpacDlcx) => self.rx_ipac_dlcx(b, id, chan_nr, l3),
            _ => {
                warn!("unsupported RSL ip.access msg_type 0x{msg_type:02x}");
                Err(RslError::UnknownMsgType(msg_type))
            }
        }
    }
}
