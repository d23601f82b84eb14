//! # TLV codec
//!
//! Streaming reader over the IE payload of an inbound message and the
//! owned message buffer with put-helpers used to construct outbound
//! messages. The reader consults the per-tag form table in [`ie`] so it
//! can walk TV, fixed-TV, TLV and TL16V elements without a registry of
//! parsed pointers.

use heapless::Vec;

use super::ie::{self, IeForm};
use crate::RslError;

/// Capacity of one RSL message. Covers the largest L3 payloads the BSC
/// may tunnel (TL16V) with room for the header.
pub const RSL_MSG_MAX: usize = 512;

/// One owned RSL message, inbound or outbound.
///
/// Handlers that keep a message past their return take it by value;
/// everything else borrows.
#[derive(Clone, Default)]
pub struct RslMsg {
    buf: Vec<u8, RSL_MSG_MAX>,
}

impl RslMsg {
    pub fn new() -> RslMsg {
        RslMsg { buf: Vec::new() }
    }

    pub fn from_slice(raw: &[u8]) -> Result<RslMsg, RslError> {
        let mut msg = RslMsg::new();
        msg.put(raw)?;
        Ok(msg)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn put(&mut self, bytes: &[u8]) -> Result<(), RslError> {
        self.buf
            .extend_from_slice(bytes)
            .map_err(|_| RslError::MsgOverflow)
    }

    pub fn put_u8(&mut self, v: u8) -> Result<(), RslError> {
        self.buf.push(v).map_err(|_| RslError::MsgOverflow)
    }

    pub fn put_u16(&mut self, v: u16) -> Result<(), RslError> {
        self.put(&v.to_be_bytes())
    }

    pub fn put_u32(&mut self, v: u32) -> Result<(), RslError> {
        self.put(&v.to_be_bytes())
    }

    /// Tag + single value byte.
    pub fn put_tv(&mut self, tag: u8, v: u8) -> Result<(), RslError> {
        self.put_u8(tag)?;
        self.put_u8(v)
    }

    /// Tag + 16-bit value.
    pub fn put_tv16(&mut self, tag: u8, v: u16) -> Result<(), RslError> {
        self.put_u8(tag)?;
        self.put_u16(v)
    }

    /// Tag + fixed-size value, no length octet.
    pub fn put_tv_fixed(&mut self, tag: u8, v: &[u8]) -> Result<(), RslError> {
        self.put_u8(tag)?;
        self.put(v)
    }

    /// Tag + length octet + value.
    pub fn put_tlv(&mut self, tag: u8, v: &[u8]) -> Result<(), RslError> {
        if v.len() > u8::MAX as usize {
            return Err(RslError::MsgOverflow);
        }
        self.put_u8(tag)?;
        self.put_u8(v.len() as u8)?;
        self.put(v)
    }

    /// Tag + 16-bit length + value.
    pub fn put_tl16v(&mut self, tag: u8, v: &[u8]) -> Result<(), RslError> {
        self.put_u8(tag)?;
        self.put_u16(v.len() as u16)?;
        self.put(v)
    }
}

impl core::ops::Deref for RslMsg {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.buf
    }
}

impl core::fmt::Debug for RslMsg {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "RslMsg[{} bytes]", self.buf.len())
    }
}

/// Streaming IE reader. Yields `(tag, value)` pairs in wire order;
/// a malformed element terminates the walk with an error.
pub struct TlvReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> TlvReader<'a> {
    pub fn new(buf: &'a [u8]) -> TlvReader<'a> {
        TlvReader { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], RslError> {
        if self.pos + n > self.buf.len() {
            return Err(RslError::MalformedIe);
        }
        let v = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(v)
    }

    /// Find the value of the first occurrence of `tag`, scanning from
    /// the start of the payload.
    pub fn find(buf: &'a [u8], tag: u8) -> Option<&'a [u8]> {
        let mut rd = TlvReader::new(buf);
        while let Some(item) = rd.next() {
            match item {
                Ok((t, v)) if t == tag => return Some(v),
                Ok(_) => continue,
                Err(_) => return None,
            }
        }
        None
    }
}

impl<'a> Iterator for TlvReader<'a> {
    type Item = Result<(u8, &'a [u8]), RslError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.buf.len() {
            return None;
        }
        let tag = self.buf[self.pos];
        self.pos += 1;
        let res = match ie::ie_form(tag) {
            IeForm::Tv => self.take(1),
            IeForm::TvFixed(n) => self.take(n as usize),
            IeForm::Tlv => match self.take(1) {
                Ok(l) => self.take(l[0] as usize),
                Err(e) => Err(e),
            },
            IeForm::Tl16v => match self.take(2) {
                Ok(l) => self.take(u16::from_be_bytes([l[0], l[1]]) as usize),
                Err(e) => Err(e),
            },
        };
        Some(res.map(|v| (tag, v)))
    }
}

/// Walk `buf` and hand every IE to `f`; used by the per-message request
/// parsers. Stops at the first malformed element.
pub fn for_each_ie<'a>(
    buf: &'a [u8],
    mut f: impl FnMut(u8, &'a [u8]),
) -> Result<(), RslError> {
    for item in TlvReader::new(buf) {
        let (tag, val) = item?;
        f(tag, val);
    }
    Ok(())
}
