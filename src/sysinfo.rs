//! # System information store
//!
//! The BTS-wide buffer of broadcast system information and the per-lchan
//! SACCH filling derived from it. Buffers are one MAC block each; unused
//! octets carry the 0x2B padding pattern, and SACCH entries are prefixed
//! with the two-byte LAPDm UI header so the transmit path can hand them
//! to the radio verbatim.

use crate::wire::ie::{SiType, SACCH_SI_TYPES, SI_NUM};

/// One GSM MAC block.
pub const SYSINFO_BUF: usize = 23;

/// GSM L2 fill octet.
pub const GSM_PADDING: u8 = 0x2b;

/// LAPDm address octet for an unnumbered information frame (C/R + EA),
/// followed by the UI control octet.
pub const LAPDM_UI_HDR: [u8; 2] = [0x03, 0x03];

fn fill(buf: &mut [u8; SYSINFO_BUF], payload: &[u8], ui_prefix: bool) {
    *buf = [GSM_PADDING; SYSINFO_BUF];
    let body = if ui_prefix {
        buf[0..2].copy_from_slice(&LAPDM_UI_HDR);
        &mut buf[2..]
    } else {
        &mut buf[..]
    };
    let len = payload.len().min(body.len());
    body[..len].copy_from_slice(&payload[..len]);
}

/// BTS-global system information, written only by the common-channel
/// handler and read by the BCCH/SACCH transmit paths.
#[derive(Clone)]
pub struct SysinfoStore {
    valid: u32,
    buf: [[u8; SYSINFO_BUF]; SI_NUM],
}

impl Default for SysinfoStore {
    fn default() -> Self {
        SysinfoStore {
            valid: 0,
            buf: [[GSM_PADDING; SYSINFO_BUF]; SI_NUM],
        }
    }
}

impl SysinfoStore {
    /// Store a BCCH filling: payload padded to one MAC block.
    pub fn set_bcch(&mut self, si: SiType, payload: &[u8]) {
        fill(&mut self.buf[si.index()], payload, false);
        self.valid |= 1 << si.index();
    }

    /// Store a SACCH filling: LAPDm UI header, payload, padding.
    pub fn set_sacch(&mut self, si: SiType, payload: &[u8]) {
        fill(&mut self.buf[si.index()], payload, true);
        self.valid |= 1 << si.index();
    }

    pub fn clear(&mut self, si: SiType) {
        self.valid &= !(1 << si.index());
    }

    pub fn is_valid(&self, si: SiType) -> bool {
        self.valid & (1 << si.index()) != 0
    }

    pub fn get(&self, si: SiType) -> Option<&[u8; SYSINFO_BUF]> {
        self.is_valid(si).then(|| &self.buf[si.index()])
    }

    /// Number of AGCH blocks reserved, from the BS-AG-BLKS-RES field of
    /// the stored SI3 control channel description. An absent SI3 counts
    /// as one block.
    pub fn num_agch(&self) -> u8 {
        match self.get(SiType::Si3) {
            Some(buf) => (buf[10] >> 3) & 7,
            None => 1,
        }
    }
}

/// Per-lchan SACCH filling: the six SACCH SI types, individually valid.
#[derive(Clone)]
pub struct SacchStore {
    valid: u8,
    buf: [[u8; SYSINFO_BUF]; SACCH_SI_TYPES.len()],
}

impl Default for SacchStore {
    fn default() -> Self {
        SacchStore {
            valid: 0,
            buf: [[GSM_PADDING; SYSINFO_BUF]; SACCH_SI_TYPES.len()],
        }
    }
}

fn sacch_slot(si: SiType) -> Option<usize> {
    SACCH_SI_TYPES.iter().position(|&t| t == si)
}

impl SacchStore {
    /// Store one SACCH filling with the LAPDm UI prefix. Non-SACCH SI
    /// types are not representable here and are ignored.
    pub fn set(&mut self, si: SiType, payload: &[u8]) {
        let Some(slot) = sacch_slot(si) else { return };
        fill(&mut self.buf[slot], payload, true);
        self.valid |= 1 << slot;
    }

    pub fn clear(&mut self, si: SiType) {
        if let Some(slot) = sacch_slot(si) {
            self.valid &= !(1 << slot);
        }
    }

    pub fn is_valid(&self, si: SiType) -> bool {
        sacch_slot(si).is_some_and(|slot| self.valid & (1 << slot) != 0)
    }

    pub fn get(&self, si: SiType) -> Option<&[u8; SYSINFO_BUF]> {
        let slot = sacch_slot(si)?;
        (self.valid & (1 << slot) != 0).then(|| &self.buf[slot])
    }

    /// Adopt the BTS-wide SACCH filling, used when a CHANnel ACTIVation
    /// carries no channel-specific SACCH Information IE.
    pub fn copy_from_bts(&mut self, bts_si: &SysinfoStore) {
        for (slot, &si) in SACCH_SI_TYPES.iter().enumerate() {
            match bts_si.get(si) {
                Some(buf) => {
                    self.buf[slot] = *buf;
                    self.valid |= 1 << slot;
                }
                None => self.valid &= !(1 << slot),
            }
        }
    }

    pub fn reset(&mut self) {
        self.valid = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bcch_filling_is_padded() {
        let mut store = SysinfoStore::default();
        let payload = [0x49u8; 21];
        store.set_bcch(SiType::Si3, &payload);
        let buf = store.get(SiType::Si3).unwrap();
        assert_eq!(&buf[..21], &payload);
        assert_eq!(&buf[21..], &[GSM_PADDING; 2]);
        store.clear(SiType::Si3);
        assert!(store.get(SiType::Si3).is_none());
    }

    #[test]
    fn sacch_filling_has_ui_header() {
        let mut store = SysinfoStore::default();
        store.set_sacch(SiType::Si5, &[0xaa, 0xbb]);
        let buf = store.get(SiType::Si5).unwrap();
        assert_eq!(&buf[..4], &[0x03, 0x03, 0xaa, 0xbb]);
        assert_eq!(buf[4], GSM_PADDING);
    }

    #[test]
    fn num_agch_reads_si3() {
        let mut store = SysinfoStore::default();
        assert_eq!(store.num_agch(), 1);
        let mut si3 = [0u8; 23];
        si3[10] = 2 << 3;
        store.set_bcch(SiType::Si3, &si3);
        assert_eq!(store.num_agch(), 2);
    }

    #[test]
    fn lchan_store_follows_bts() {
        let mut bts = SysinfoStore::default();
        bts.set_sacch(SiType::Si5, &[1, 2, 3]);
        bts.set_sacch(SiType::Si6, &[4]);
        let mut lchan = SacchStore::default();
        lchan.set(SiType::Si5bis, &[9]);
        lchan.copy_from_bts(&bts);
        assert!(lchan.is_valid(SiType::Si5));
        assert!(lchan.is_valid(SiType::Si6));
        assert!(!lchan.is_valid(SiType::Si5bis));
        assert_eq!(&lchan.get(SiType::Si5).unwrap()[..5], &[3, 3, 1, 2, 3]);
    }
}
