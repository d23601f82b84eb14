//! # Information elements
//!
//! Identifiers and value codings for the GSM 08.58 information elements
//! consumed and produced by the BTS, plus the ip.access vendor additions.

/// Information Element Identifiers, GSM 08.58 9.3.1 and ip.access.
pub mod tag {
    pub const CHAN_NR: u8 = 0x01;
    pub const LINK_IDENT: u8 = 0x02;
    pub const ACT_TYPE: u8 = 0x03;
    pub const BS_POWER: u8 = 0x04;
    pub const CHAN_IDENT: u8 = 0x05;
    pub const CHAN_MODE: u8 = 0x06;
    pub const ENCR_INFO: u8 = 0x07;
    pub const FRAME_NUMBER: u8 = 0x08;
    pub const HANDO_REF: u8 = 0x09;
    pub const L1_INFO: u8 = 0x0a;
    pub const L3_INFO: u8 = 0x0b;
    pub const MS_IDENTITY: u8 = 0x0c;
    pub const MS_POWER: u8 = 0x0d;
    pub const PAGING_GROUP: u8 = 0x0e;
    pub const PAGING_LOAD: u8 = 0x0f;
    pub const PHYS_CONTEXT: u8 = 0x10;
    pub const ACCESS_DELAY: u8 = 0x11;
    pub const RACH_LOAD: u8 = 0x12;
    pub const REQ_REFERENCE: u8 = 0x13;
    pub const RELEASE_MODE: u8 = 0x14;
    pub const RESOURCE_INFO: u8 = 0x15;
    pub const RLM_CAUSE: u8 = 0x16;
    pub const STARTING_TIME: u8 = 0x17;
    pub const TIMING_ADVANCE: u8 = 0x18;
    pub const UPLINK_MEAS: u8 = 0x19;
    pub const CAUSE: u8 = 0x1a;
    pub const MEAS_RES_NR: u8 = 0x1b;
    pub const MSG_ID: u8 = 0x1c;
    pub const SYSINFO_TYPE: u8 = 0x1e;
    pub const MS_POWER_PARAM: u8 = 0x1f;
    pub const BS_POWER_PARAM: u8 = 0x20;
    pub const PREPROC_PARAM: u8 = 0x21;
    pub const PREPROC_MEAS: u8 = 0x22;
    pub const IMM_ASS_INFO: u8 = 0x23;
    pub const SMSCB_INFO: u8 = 0x24;
    pub const MS_TIMING_OFFSET: u8 = 0x25;
    pub const ERR_MSG: u8 = 0x26;
    pub const FULL_BCCH_INFO: u8 = 0x27;
    pub const CHAN_NEEDED: u8 = 0x28;
    pub const CB_CMD_TYPE: u8 = 0x29;
    pub const SMSCB_MSG: u8 = 0x2a;
    pub const FULL_IMM_ASS_INFO: u8 = 0x2b;
    pub const SACCH_INFO: u8 = 0x2c;
    pub const CBCH_LOAD_INFO: u8 = 0x2d;
    pub const SMSCB_CHAN_INDICATOR: u8 = 0x2e;
    pub const GROUP_CALL_REF: u8 = 0x2f;
    pub const CHAN_DESC: u8 = 0x30;
    pub const NCH_DRX_INFO: u8 = 0x31;
    pub const CMD_INDICATOR: u8 = 0x32;
    pub const EMLPP_PRIO: u8 = 0x33;
    pub const UIC: u8 = 0x34;
    pub const MAIN_CHAN_REF: u8 = 0x35;
    pub const MR_CONFIG: u8 = 0x36;
    pub const MR_CONTROL: u8 = 0x37;
    pub const SUP_CODEC_TYPES: u8 = 0x38;
    pub const CODEC_CONFIG: u8 = 0x39;

    pub const IPAC_REMOTE_IP: u8 = 0xf0;
    pub const IPAC_REMOTE_PORT: u8 = 0xf1;
    pub const IPAC_RTP_PAYLOAD: u8 = 0xf2;
    pub const IPAC_LOCAL_PORT: u8 = 0xf3;
    pub const IPAC_SPEECH_MODE: u8 = 0xf4;
    pub const IPAC_LOCAL_IP: u8 = 0xf5;
    pub const IPAC_CONN_STAT: u8 = 0xf6;
    pub const IPAC_HO_C_PARMS: u8 = 0xf7;
    pub const IPAC_CONN_ID: u8 = 0xf8;
    pub const IPAC_RTP_CSD_FMT: u8 = 0xf9;
    pub const IPAC_RTP_JIT_BUF: u8 = 0xfa;
    pub const IPAC_RTP_COMPR: u8 = 0xfb;
    pub const IPAC_RTP_PAYLOAD2: u8 = 0xfc;
    pub const IPAC_RTP_MPLEX: u8 = 0xfd;
    pub const IPAC_RTP_MPLEX_ID: u8 = 0xfe;
}

/// Encoding form of an IE on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IeForm {
    /// Tag followed by one value byte.
    Tv,
    /// Tag followed by a fixed number of value bytes.
    TvFixed(u8),
    /// Tag, one length byte, value.
    Tlv,
    /// Tag, 16-bit big-endian length, value.
    Tl16v,
}

/// Wire form of a given IE tag, GSM 08.58 9.3 / ip.access.
///
/// Unlisted tags default to TLV, which matches every optional IE the BSC
/// is allowed to send us.
pub fn ie_form(t: u8) -> IeForm {
    match t {
        tag::CHAN_NR
        | tag::LINK_IDENT
        | tag::ACT_TYPE
        | tag::BS_POWER
        | tag::HANDO_REF
        | tag::MS_POWER
        | tag::PAGING_GROUP
        | tag::ACCESS_DELAY
        | tag::RELEASE_MODE
        | tag::TIMING_ADVANCE
        | tag::MEAS_RES_NR
        | tag::MSG_ID
        | tag::SYSINFO_TYPE
        | tag::MS_TIMING_OFFSET
        | tag::CHAN_NEEDED
        | tag::CB_CMD_TYPE
        | tag::SMSCB_CHAN_INDICATOR
        | tag::CMD_INDICATOR
        | tag::EMLPP_PRIO
        | tag::MAIN_CHAN_REF
        | tag::MR_CONTROL
        | tag::IPAC_RTP_PAYLOAD
        | tag::IPAC_SPEECH_MODE
        | tag::IPAC_RTP_CSD_FMT
        | tag::IPAC_RTP_COMPR
        | tag::IPAC_RTP_PAYLOAD2 => IeForm::Tv,
        tag::FRAME_NUMBER | tag::L1_INFO | tag::STARTING_TIME | tag::PAGING_LOAD => {
            IeForm::TvFixed(2)
        }
        tag::REQ_REFERENCE => IeForm::TvFixed(3),
        tag::SMSCB_INFO => IeForm::TvFixed(23),
        tag::IPAC_REMOTE_PORT
        | tag::IPAC_LOCAL_PORT
        | tag::IPAC_CONN_ID
        | tag::IPAC_RTP_JIT_BUF => IeForm::TvFixed(2),
        tag::IPAC_REMOTE_IP | tag::IPAC_LOCAL_IP => IeForm::TvFixed(4),
        tag::L3_INFO | tag::FULL_IMM_ASS_INFO => IeForm::Tl16v,
        _ => IeForm::Tlv,
    }
}

/// Cause values, GSM 08.58 9.3.26.
///
/// Kept as a transparent byte so that causes we do not know are carried
/// through verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Cause(pub u8);

impl Cause {
    pub const RADIO_IF_FAIL: Cause = Cause(0x00);
    pub const RADIO_LINK_FAIL: Cause = Cause(0x01);
    pub const HANDOVER_ACC_FAIL: Cause = Cause(0x02);
    pub const OM_INTERVENTION: Cause = Cause(0x07);
    pub const NORMAL_UNSPEC: Cause = Cause(0x0f);
    pub const EQUIPMENT_FAIL: Cause = Cause(0x20);
    pub const RR_UNAVAIL: Cause = Cause(0x21);
    pub const TERR_CH_FAIL: Cause = Cause(0x22);
    pub const CCCH_OVERLOAD: Cause = Cause(0x23);
    pub const ACCH_OVERLOAD: Cause = Cause(0x24);
    pub const PROCESSOR_OVERLOAD: Cause = Cause(0x25);
    pub const RES_UNAVAIL: Cause = Cause(0x2a);
    pub const TRANSC_UNAVAIL: Cause = Cause(0x2b);
    pub const SERV_OPT_UNAVAIL: Cause = Cause(0x2c);
    pub const ENCR_UNIMPL: Cause = Cause(0x2d);
    pub const SERV_OPT_UNIMPL: Cause = Cause(0x2e);
    pub const INVALID_MESSAGE: Cause = Cause(0x50);
    pub const MSG_DISCR_ERROR: Cause = Cause(0x51);
    pub const MSG_TYPE_ERROR: Cause = Cause(0x52);
    pub const MSG_SEQ_ERROR: Cause = Cause(0x53);
    pub const IE_ERROR: Cause = Cause(0x60);
    pub const MAND_IE_ERROR: Cause = Cause(0x61);
    pub const OPT_IE_ERROR: Cause = Cause(0x62);
    pub const IE_NONEXIST: Cause = Cause(0x63);
    pub const IE_LENGTH: Cause = Cause(0x64);
    pub const IE_CONTENT: Cause = Cause(0x65);
    pub const PROTO_ERROR: Cause = Cause(0x66);
    pub const INTERWORKING: Cause = Cause(0x7f);
}

/// Channel number, GSM 08.58 9.3.1: C-bits (channel type + subchannel)
/// in bits 7..3, timeslot number in bits 2..0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChanNr(pub u8);

pub const CBITS_TCH_F: u8 = 0x01;
pub const CBITS_TCH_H: u8 = 0x02; // 0b0001s, s = subchannel
pub const CBITS_SDCCH4: u8 = 0x04; // 0b001ss
pub const CBITS_SDCCH8: u8 = 0x08; // 0b01sss
pub const CBITS_BCCH: u8 = 0x10;
pub const CBITS_RACH: u8 = 0x11;
pub const CBITS_PCH_AGCH: u8 = 0x12;
/// Non-standard extension for PDCH activation on dynamic timeslots.
pub const CBITS_OSMO_PDCH: u8 = 0x18;

impl ChanNr {
    pub fn new(cbits: u8, tn: u8) -> ChanNr {
        ChanNr((cbits << 3) | (tn & 7))
    }

    pub fn tch_f(tn: u8) -> ChanNr {
        ChanNr::new(CBITS_TCH_F, tn)
    }

    pub fn tch_h(tn: u8, subslot: u8) -> ChanNr {
        ChanNr::new(CBITS_TCH_H | (subslot & 1), tn)
    }

    pub fn sdcch4(tn: u8, subslot: u8) -> ChanNr {
        ChanNr::new(CBITS_SDCCH4 | (subslot & 3), tn)
    }

    pub fn sdcch8(tn: u8, subslot: u8) -> ChanNr {
        ChanNr::new(CBITS_SDCCH8 | (subslot & 7), tn)
    }

    pub fn bcch() -> ChanNr {
        ChanNr::new(CBITS_BCCH, 0)
    }

    pub fn rach() -> ChanNr {
        ChanNr::new(CBITS_RACH, 0)
    }

    pub fn pch_agch() -> ChanNr {
        ChanNr::new(CBITS_PCH_AGCH, 0)
    }

    pub fn osmo_pdch(tn: u8) -> ChanNr {
        ChanNr::new(CBITS_OSMO_PDCH, tn)
    }

    /// The 5 C-bits (channel type and subchannel).
    pub fn cbits(&self) -> u8 {
        self.0 >> 3
    }

    /// Timeslot number 0..7.
    pub fn tn(&self) -> u8 {
        self.0 & 7
    }
}

/// Activation Type, GSM 08.58 9.3.3 (low nibble, R bit masked off).
pub mod act_type {
    pub const INTRA_IMM_ASS: u8 = 0x00;
    pub const INTRA_NORM_ASS: u8 = 0x01;
    pub const INTER_ASYNC: u8 = 0x02;
    pub const INTER_SYNC: u8 = 0x03;
    pub const SECOND_ADD: u8 = 0x04;
    pub const SECOND_MULTI: u8 = 0x05;
    /// Non-standard: activate the timeslot as PDCH.
    pub const OSMO_PDCH: u8 = 0x0f;
}

/// Speech or data indicator inside the Channel Mode IE, 9.3.6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpeechInd {
    Speech = 0x01,
    Data = 0x02,
    Signalling = 0x03,
}

impl From<u8> for SpeechInd {
    fn from(value: u8) -> Self {
        match value {
            0x02 => SpeechInd::Data,
            0x03 => SpeechInd::Signalling,
            _ => SpeechInd::Speech,
        }
    }
}

/// Channel rate and type field of the Channel Mode IE, 9.3.6.
pub mod chan_rate {
    pub const SP_GSM1: u8 = 0x01;
    pub const SP_GSM2: u8 = 0x11;
    pub const SP_GSM3: u8 = 0x21;
    pub const NT_14K5: u8 = 0x58;
    pub const NT_12K0: u8 = 0x50;
    pub const NT_6K0: u8 = 0x51;
}

pub const CMOD_DTX_UL: u8 = 0x01;
pub const CMOD_DTX_DL: u8 = 0x02;

/// Decoded Channel Mode IE, GSM 08.58 9.3.6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChanMode {
    pub dtx: u8,
    pub spd_ind: SpeechInd,
    pub chan_rt: u8,
    pub chan_rate: u8,
}

impl ChanMode {
    /// Decode the 4-byte fixed part; longer values (e.g. multirate) keep
    /// their extra octets out of scope here.
    pub fn parse(val: &[u8]) -> Option<ChanMode> {
        if val.len() < 4 {
            return None;
        }
        Some(ChanMode {
            dtx: val[0],
            spd_ind: SpeechInd::from(val[1]),
            chan_rt: val[2],
            chan_rate: val[3],
        })
    }
}

/// TCH operating mode derived from the Channel Mode IE (GSM 04.08
/// channel mode values).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TchMode {
    #[default]
    Signalling = 0x00,
    SpeechV1 = 0x01,
    SpeechEfr = 0x21,
    SpeechAmr = 0x41,
    Data14k5 = 0x0f,
    Data12k0 = 0x0b,
    Data6k0 = 0x13,
}

impl TchMode {
    /// Map the Channel Mode IE rate field, as applied on CHANnel
    /// ACTIVation and MODE MODIFY.
    pub fn from_chan_mode(cm: &ChanMode) -> Option<TchMode> {
        match cm.chan_rate {
            chan_rate::SP_GSM1 => Some(TchMode::SpeechV1),
            chan_rate::SP_GSM2 => Some(TchMode::SpeechEfr),
            chan_rate::SP_GSM3 => Some(TchMode::SpeechAmr),
            chan_rate::NT_14K5 => Some(TchMode::Data14k5),
            chan_rate::NT_12K0 => Some(TchMode::Data12k0),
            chan_rate::NT_6K0 => Some(TchMode::Data6k0),
            _ => None,
        }
    }
}

/// System information types addressable over RSL, GSM 08.58 9.3.30.
///
/// The discriminants index the BTS SI buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SiType {
    Si1 = 0,
    Si2 = 1,
    Si3 = 2,
    Si4 = 3,
    Si5 = 4,
    Si6 = 5,
    Si7 = 6,
    Si8 = 7,
    Si9 = 8,
    Si13 = 9,
    Si16 = 10,
    Si17 = 11,
    Si2bis = 12,
    Si2ter = 13,
    Si2quater = 14,
    Si5bis = 15,
    Si5ter = 16,
    ExtMeasOrder = 17,
    MeasInfo = 18,
}

/// Number of distinct SI types, sizing the BTS SI store.
pub const SI_NUM: usize = 19;

impl SiType {
    /// Decode the RSL System Info Type IE value.
    pub fn from_rsl(v: u8) -> Option<SiType> {
        match v {
            0x00 => Some(SiType::Si8),
            0x01 => Some(SiType::Si1),
            0x02 => Some(SiType::Si2),
            0x03 => Some(SiType::Si3),
            0x04 => Some(SiType::Si4),
            0x05 => Some(SiType::Si5),
            0x06 => Some(SiType::Si6),
            0x07 => Some(SiType::Si7),
            0x08 => Some(SiType::Si16),
            0x09 => Some(SiType::Si17),
            0x0a => Some(SiType::Si2bis),
            0x0b => Some(SiType::Si2ter),
            0x0d => Some(SiType::Si5bis),
            0x0e => Some(SiType::Si5ter),
            0x28 => Some(SiType::Si13),
            0x29 => Some(SiType::Si2quater),
            0x2a => Some(SiType::Si9),
            0x47 => Some(SiType::ExtMeasOrder),
            0x48 => Some(SiType::MeasInfo),
            _ => None,
        }
    }

    /// True for the SI types broadcast on the SACCH; everything else
    /// belongs on the BCCH.
    pub fn is_sacch(&self) -> bool {
        matches!(
            self,
            SiType::Si5
                | SiType::Si6
                | SiType::Si5bis
                | SiType::Si5ter
                | SiType::ExtMeasOrder
                | SiType::MeasInfo
        )
    }

    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// The SI types accepted as SACCH filling.
pub const SACCH_SI_TYPES: [SiType; 6] = [
    SiType::Si5,
    SiType::Si6,
    SiType::Si5bis,
    SiType::Si5ter,
    SiType::ExtMeasOrder,
    SiType::MeasInfo,
];

/// Encryption algorithm identifier: 0x01 = A5/0 (none), 0x02 = A5/1, ...
pub fn a5_alg(n: u8) -> u8 {
    n + 1
}

/// SACCH uses the link identifier range 0x40..0x7f.
pub fn link_id_is_sacch(link_id: u8) -> bool {
    link_id >> 6 == 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chan_nr_fields() {
        let cn = ChanNr::tch_h(5, 1);
        assert_eq!(cn.0, 0x1d);
        assert_eq!(cn.cbits(), CBITS_TCH_H | 1);
        assert_eq!(cn.tn(), 5);
        assert_eq!(ChanNr::rach().0, 0x88);
        assert_eq!(ChanNr::pch_agch().0, 0x90);
        assert_eq!(ChanNr::osmo_pdch(2).0, 0xc2);
    }

    #[test]
    fn sacch_si_classification() {
        assert!(SiType::from_rsl(0x05).unwrap().is_sacch());
        assert!(SiType::from_rsl(0x48).unwrap().is_sacch());
        assert!(!SiType::from_rsl(0x03).unwrap().is_sacch());
        assert_eq!(SiType::from_rsl(0x29), Some(SiType::Si2quater));
        assert_eq!(SiType::from_rsl(0x0c), None);
    }

    #[test]
    fn chan_mode_decoding() {
        let cm = ChanMode::parse(&[0x00, 0x01, 0x08, chan_rate::SP_GSM1]).unwrap();
        assert_eq!(cm.spd_ind, SpeechInd::Speech);
        assert_eq!(TchMode::from_chan_mode(&cm), Some(TchMode::SpeechV1));
        assert!(ChanMode::parse(&[0x00, 0x01]).is_none());
    }
}
