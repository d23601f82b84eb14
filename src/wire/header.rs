//! # Message headers
//!
//! The first bytes of every RSL message: a discriminator selecting the
//! management group, the message type, and for most groups a channel
//! number (plus, for radio link layer messages, a link identifier).
//! The four C-style header layouts become one sum type discriminated on
//! parse.

use super::ie::{self, ChanNr};
use crate::RslError;

/// Message discriminator, GSM 08.58 9.1. The transparency bit (bit 1)
/// is masked off before matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MsgDiscr {
    /// Radio link layer management (tunneled LAPDm).
    Rll = 0x02,
    /// Dedicated channel management.
    Dchan = 0x08,
    /// Common channel management.
    Cchan = 0x0c,
    /// TRX management.
    Trx = 0x10,
    /// ip.access vendor messages.
    Ipaccess = 0x7e,
}

impl MsgDiscr {
    pub fn from_byte(b: u8) -> Option<MsgDiscr> {
        match b & 0xfe {
            0x02 => Some(MsgDiscr::Rll),
            0x08 => Some(MsgDiscr::Dchan),
            0x0c => Some(MsgDiscr::Cchan),
            0x10 => Some(MsgDiscr::Trx),
            0x7e => Some(MsgDiscr::Ipaccess),
            _ => None,
        }
    }
}

/// Message types, GSM 08.58 9.1 plus the ip.access vendor range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MsgType {
    // Radio link layer management
    DataReq = 0x01,
    DataInd = 0x02,
    ErrorInd = 0x03,
    EstReq = 0x04,
    EstConf = 0x05,
    EstInd = 0x06,
    RelReq = 0x07,
    RelConf = 0x08,
    RelInd = 0x09,
    UnitDataReq = 0x0a,
    UnitDataInd = 0x0b,
    // Common channel management
    BcchInfo = 0x11,
    CcchLoadInd = 0x12,
    ChanRqd = 0x13,
    DeleteInd = 0x14,
    PagingCmd = 0x15,
    ImmediateAssignCmd = 0x16,
    SmsBcReq = 0x17,
    // TRX management
    RfResInd = 0x19,
    SacchFill = 0x1a,
    Overload = 0x1b,
    ErrorReport = 0x1c,
    SmsBcCmd = 0x1d,
    CbchLoadInd = 0x1e,
    NotCmd = 0x1f,
    // Dedicated channel management
    ChanActiv = 0x21,
    ChanActivAck = 0x22,
    ChanActivNack = 0x23,
    ConnFail = 0x24,
    DeactivateSacch = 0x25,
    EncrCmd = 0x26,
    HandoDet = 0x27,
    MeasRes = 0x28,
    ModeModifyReq = 0x29,
    ModeModifyAck = 0x2a,
    ModeModifyNack = 0x2b,
    PhyContextReq = 0x2c,
    PhyContextConf = 0x2d,
    RfChanRel = 0x2e,
    MsPowerControl = 0x2f,
    BsPowerControl = 0x30,
    PreprocConfig = 0x31,
    PreprocMeasRes = 0x32,
    RfChanRelAck = 0x33,
    SacchInfoModify = 0x34,
    TalkerDet = 0x35,
    ListenerDet = 0x36,
    RemoteCodecConfRep = 0x37,
    RtdRep = 0x38,
    PreHandoNotif = 0x39,
    MrCodecModReq = 0x3a,
    TfoModReq = 0x3f,
    // ip.access vendor
    IpacPdchAct = 0x48,
    IpacPdchActAck = 0x49,
    IpacPdchActNack = 0x4a,
    IpacPdchDeact = 0x4b,
    IpacPdchDeactAck = 0x4c,
    IpacPdchDeactNack = 0x4d,
    IpacCrcx = 0x70,
    IpacCrcxAck = 0x71,
    IpacCrcxNack = 0x72,
    IpacMdcx = 0x73,
    IpacMdcxAck = 0x74,
    IpacMdcxNack = 0x75,
    IpacDlcxInd = 0x76,
    IpacDlcx = 0x77,
    IpacDlcxAck = 0x78,
    IpacDlcxNack = 0x79,
}

impl MsgType {
    pub fn from_byte(b: u8) -> Option<MsgType> {
        Some(match b {
            0x01 => MsgType::DataReq,
            0x02 => MsgType::DataInd,
            0x03 => MsgType::ErrorInd,
            0x04 => MsgType::EstReq,
            0x05 => MsgType::EstConf,
            0x06 => MsgType::EstInd,
            0x07 => MsgType::RelReq,
            0x08 => MsgType::RelConf,
            0x09 => MsgType::RelInd,
            0x0a => MsgType::UnitDataReq,
            0x0b => MsgType::UnitDataInd,
            0x11 => MsgType::BcchInfo,
            0x12 => MsgType::CcchLoadInd,
            0x13 => MsgType::ChanRqd,
            0x14 => MsgType::DeleteInd,
            0x15 => MsgType::PagingCmd,
            0x16 => MsgType::ImmediateAssignCmd,
            0x17 => MsgType::SmsBcReq,
            0x19 => MsgType::RfResInd,
            0x1a => MsgType::SacchFill,
            0x1b => MsgType::Overload,
            0x1c => MsgType::ErrorReport,
            0x1d => MsgType::SmsBcCmd,
            0x1e => MsgType::CbchLoadInd,
            0x1f => MsgType::NotCmd,
            0x21 => MsgType::ChanActiv,
            0x22 => MsgType::ChanActivAck,
            0x23 => MsgType::ChanActivNack,
            0x24 => MsgType::ConnFail,
            0x25 => MsgType::DeactivateSacch,
            0x26 => MsgType::EncrCmd,
            0x27 => MsgType::HandoDet,
            0x28 => MsgType::MeasRes,
            0x29 => MsgType::ModeModifyReq,
            0x2a => MsgType::ModeModifyAck,
            0x2b => MsgType::ModeModifyNack,
            0x2c => MsgType::PhyContextReq,
            0x2d => MsgType::PhyContextConf,
            0x2e => MsgType::RfChanRel,
            0x2f => MsgType::MsPowerControl,
            0x30 => MsgType::BsPowerControl,
            0x31 => MsgType::PreprocConfig,
            0x32 => MsgType::PreprocMeasRes,
            0x33 => MsgType::RfChanRelAck,
            0x34 => MsgType::SacchInfoModify,
            0x35 => MsgType::TalkerDet,
            0x36 => MsgType::ListenerDet,
            0x37 => MsgType::RemoteCodecConfRep,
            0x38 => MsgType::RtdRep,
            0x39 => MsgType::PreHandoNotif,
            0x3a => MsgType::MrCodecModReq,
            0x3f => MsgType::TfoModReq,
            0x48 => MsgType::IpacPdchAct,
            0x49 => MsgType::IpacPdchActAck,
            0x4a => MsgType::IpacPdchActNack,
            0x4b => MsgType::IpacPdchDeact,
            0x4c => MsgType::IpacPdchDeactAck,
            0x4d => MsgType::IpacPdchDeactNack,
            0x70 => MsgType::IpacCrcx,
            0x71 => MsgType::IpacCrcxAck,
            0x72 => MsgType::IpacCrcxNack,
            0x73 => MsgType::IpacMdcx,
            0x74 => MsgType::IpacMdcxAck,
            0x75 => MsgType::IpacMdcxNack,
            0x76 => MsgType::IpacDlcxInd,
            0x77 => MsgType::IpacDlcx,
            0x78 => MsgType::IpacDlcxAck,
            0x79 => MsgType::IpacDlcxNack,
            _ => return None,
        })
    }
}

/// Parsed message header. The payload (TLV part) starts at `l3_offset`
/// bytes into the raw message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RslHeader {
    Rll {
        msg_type: u8,
        chan_nr: ChanNr,
        link_id: u8,
    },
    Cchan {
        msg_type: u8,
        chan_nr: ChanNr,
    },
    Dchan {
        msg_type: u8,
        chan_nr: ChanNr,
    },
    Trx {
        msg_type: u8,
    },
    Ipac {
        msg_type: u8,
        chan_nr: ChanNr,
    },
}

/// RLL header: discr, type, chan nr IE, link id IE.
const RLL_HDR_LEN: usize = 6;
/// Channel-bearing header: discr, type, chan nr IE.
const CHAN_HDR_LEN: usize = 4;
/// Common header: discr, type.
const COMMON_HDR_LEN: usize = 2;

impl RslHeader {
    /// Parse the header of a raw RSL message. Returns the header and the
    /// offset where the IE payload begins.
    ///
    /// Undersized messages and unknown discriminators are rejected
    /// without looking further; the caller drops them.
    pub fn parse(raw: &[u8]) -> Result<(RslHeader, usize), RslError> {
        if raw.len() < COMMON_HDR_LEN {
            return Err(RslError::MsgTooShort);
        }
        let discr = MsgDiscr::from_byte(raw[0]).ok_or(RslError::UnknownDiscr(raw[0]))?;
        let msg_type = raw[1];

        match discr {
            MsgDiscr::Rll => {
                if raw.len() < RLL_HDR_LEN {
                    return Err(RslError::MsgTooShort);
                }
                if raw[2] != ie::tag::CHAN_NR || raw[4] != ie::tag::LINK_IDENT {
                    return Err(RslError::MalformedIe);
                }
                Ok((
                    RslHeader::Rll {
                        msg_type,
                        chan_nr: ChanNr(raw[3]),
                        link_id: raw[5],
                    },
                    RLL_HDR_LEN,
                ))
            }
            MsgDiscr::Cchan | MsgDiscr::Dchan | MsgDiscr::Ipaccess => {
                if raw.len() < CHAN_HDR_LEN {
                    return Err(RslError::MsgTooShort);
                }
                if raw[2] != ie::tag::CHAN_NR {
                    return Err(RslError::MalformedIe);
                }
                let chan_nr = ChanNr(raw[3]);
                let hdr = match discr {
                    MsgDiscr::Cchan => RslHeader::Cchan { msg_type, chan_nr },
                    MsgDiscr::Dchan => RslHeader::Dchan { msg_type, chan_nr },
                    _ => RslHeader::Ipac { msg_type, chan_nr },
                };
                Ok((hdr, CHAN_HDR_LEN))
            }
            MsgDiscr::Trx => Ok((RslHeader::Trx { msg_type }, COMMON_HDR_LEN)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dchan_header() {
        let raw = [0x08, 0x21, 0x01, 0x0a, 0x03, 0x00];
        let (hdr, off) = RslHeader::parse(&raw).unwrap();
        assert_eq!(off, 4);
        assert_eq!(
            hdr,
            RslHeader::Dchan {
                msg_type: 0x21,
                chan_nr: ChanNr(0x0a)
            }
        );
    }

    #[test]
    fn parses_rll_header() {
        let raw = [0x02, 0x0b, 0x01, 0x0a, 0x02, 0x40];
        let (hdr, off) = RslHeader::parse(&raw).unwrap();
        assert_eq!(off, 6);
        assert_eq!(
            hdr,
            RslHeader::Rll {
                msg_type: 0x0b,
                chan_nr: ChanNr(0x0a),
                link_id: 0x40
            }
        );
    }

    #[test]
    fn transparency_bit_is_masked() {
        let raw = [0x09, 0x21, 0x01, 0x0a];
        assert!(matches!(
            RslHeader::parse(&raw),
            Ok((RslHeader::Dchan { .. }, 4))
        ));
    }

    #[test]
    fn rejects_short_and_unknown() {
        assert_eq!(RslHeader::parse(&[0x08]), Err(RslError::MsgTooShort));
        assert_eq!(RslHeader::parse(&[0x08, 0x21, 0x01]), Err(RslError::MsgTooShort));
        assert_eq!(
            RslHeader::parse(&[0x40, 0x21, 0x01, 0x0a]),
            Err(RslError::UnknownDiscr(0x40))
        );
    }
}
