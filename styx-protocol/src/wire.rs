//! Little-endian primitives shared by every message codec.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::messages::{Fid, Qid, QidType, Tag};
use crate::ProtocolError;

/// Append-only buffer for building one frame body.
pub struct Serializer {
    data: Vec<u8>,
}

impl Serializer {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn with_capacity(n: usize) -> Self {
        Self {
            data: Vec::with_capacity(n),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    pub fn write_u8(&mut self, data: u8) {
        self.data.push(data);
    }

    pub fn write_u16(&mut self, data: u16) {
        self.data.extend_from_slice(&data.to_le_bytes());
    }

    pub fn write_u32(&mut self, data: u32) {
        self.data.extend_from_slice(&data.to_le_bytes());
    }

    pub fn write_u64(&mut self, data: u64) {
        self.data.extend_from_slice(&data.to_le_bytes());
    }

    pub fn write_tag(&mut self, tag: Tag) {
        self.write_u16(tag.0);
    }

    pub fn write_fid(&mut self, fid: Fid) {
        self.write_u32(fid.0);
    }

    pub fn write_qid(&mut self, qid: &Qid) {
        self.write_u8(qid.typ.bits());
        self.write_u32(qid.version);
        self.write_u64(qid.path);
    }

    /// Write a `u16`-length-prefixed string.
    pub fn write_string(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
        if data.len() > u16::MAX as usize {
            return Err(ProtocolError::TooLong);
        }
        self.write_u16(data.len() as u16);
        self.data.extend_from_slice(data);
        Ok(())
    }

    pub fn write_data(&mut self, data: &[u8]) {
        self.data.extend_from_slice(data);
    }
}

impl Default for Serializer {
    fn default() -> Self {
        Self::new()
    }
}

/// Bounded reader over one frame body.
///
/// Reads take `&self`; the offset lives in an atomic so a decoder can
/// thread one of these through helper calls without mutable plumbing.
/// Any read past the end of the slice fails with
/// [`ProtocolError::Truncated`], which aborts the whole decode, so the
/// overshot offset is never observed.
pub struct Deserializer<'a> {
    data: &'a [u8],
    off: AtomicUsize,
}

impl<'a> Deserializer<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            off: AtomicUsize::new(0),
        }
    }

    /// Bytes of the body not yet consumed.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.off.load(Ordering::Acquire))
    }

    pub fn read_u8(&self) -> Result<u8, ProtocolError> {
        let off = self.off.fetch_add(1, Ordering::AcqRel);
        if off + 1 > self.data.len() {
            return Err(ProtocolError::Truncated);
        }
        Ok(self.data[off])
    }

    pub fn read_u16(&self) -> Result<u16, ProtocolError> {
        let off = self.off.fetch_add(2, Ordering::AcqRel);
        if off + 2 > self.data.len() {
            return Err(ProtocolError::Truncated);
        }
        Ok(u16::from_le_bytes(self.data[off..off + 2].try_into().unwrap()))
    }

    pub fn read_u32(&self) -> Result<u32, ProtocolError> {
        let off = self.off.fetch_add(4, Ordering::AcqRel);
        if off + 4 > self.data.len() {
            return Err(ProtocolError::Truncated);
        }
        Ok(u32::from_le_bytes(self.data[off..off + 4].try_into().unwrap()))
    }

    pub fn read_u64(&self) -> Result<u64, ProtocolError> {
        let off = self.off.fetch_add(8, Ordering::AcqRel);
        if off + 8 > self.data.len() {
            return Err(ProtocolError::Truncated);
        }
        Ok(u64::from_le_bytes(self.data[off..off + 8].try_into().unwrap()))
    }

    pub fn read_tag(&self) -> Result<Tag, ProtocolError> {
        Ok(Tag(self.read_u16()?))
    }

    pub fn read_fid(&self) -> Result<Fid, ProtocolError> {
        Ok(Fid(self.read_u32()?))
    }

    pub fn read_qid(&self) -> Result<Qid, ProtocolError> {
        Ok(Qid {
            typ: QidType::from_bits_retain(self.read_u8()?),
            version: self.read_u32()?,
            path: self.read_u64()?,
        })
    }

    /// Read a `u16`-length-prefixed string.
    pub fn read_string(&self) -> Result<&'a [u8], ProtocolError> {
        let len = self.read_u16()? as usize;
        self.read_data(len)
    }

    pub fn read_data(&self, len: usize) -> Result<&'a [u8], ProtocolError> {
        let off = self.off.fetch_add(len, Ordering::AcqRel);
        if off + len > self.data.len() {
            return Err(ProtocolError::Truncated);
        }
        Ok(&self.data[off..off + len])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_round_trip_little_endian() {
        let mut s = Serializer::new();
        s.write_u8(0xab);
        s.write_u16(0x1234);
        s.write_u32(0xdead_beef);
        s.write_u64(0x0102_0304_0506_0708);
        let buf = s.into_inner();
        assert_eq!(buf[1..3], [0x34, 0x12]);

        let d = Deserializer::new(&buf);
        assert_eq!(d.read_u8().unwrap(), 0xab);
        assert_eq!(d.read_u16().unwrap(), 0x1234);
        assert_eq!(d.read_u32().unwrap(), 0xdead_beef);
        assert_eq!(d.read_u64().unwrap(), 0x0102_0304_0506_0708);
        assert_eq!(d.remaining(), 0);
    }

    #[test]
    fn string_carries_length_prefix() {
        let mut s = Serializer::new();
        s.write_string(b"9P2000").unwrap();
        let buf = s.into_inner();
        assert_eq!(buf, b"\x06\x009P2000");

        let d = Deserializer::new(&buf);
        assert_eq!(d.read_string().unwrap(), b"9P2000");
    }

    #[test]
    fn short_reads_fail() {
        let d = Deserializer::new(&[0x01, 0x02]);
        assert_eq!(d.read_u32(), Err(ProtocolError::Truncated));

        let d = Deserializer::new(&[0x05, 0x00, b'a']);
        assert_eq!(d.read_string(), Err(ProtocolError::Truncated));
    }

    #[test]
    fn oversized_string_is_rejected() {
        let mut s = Serializer::new();
        let big = vec![0u8; u16::MAX as usize + 1];
        assert_eq!(s.write_string(&big), Err(ProtocolError::TooLong));
    }
}
