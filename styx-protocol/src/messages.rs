//! Typed records for every 9P2000 message and the structures they share.
//!
//! Field names follow the Plan 9 manual (intro(5) and friends): `msize`,
//! `afid`, `uname`, `aname`, `wname`, `ename` and so on, so the structs
//! read against the protocol documentation.  Strings are kept as opaque
//! bytes; the wire declares no encoding.

use std::fmt;

use bitflags::bitflags;
use bytes::Bytes;

use crate::wire::{Deserializer, Serializer};
use crate::ProtocolError;

/// Per-request identifier chosen by the client and echoed by the server.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct Tag(pub u16);

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag(0x{:04x})", self.0)
    }
}

/// Connection-local file handle chosen by the client, reusable after
/// clunk or remove.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct Fid(pub u32);

impl fmt::Display for Fid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fid(0x{:08x})", self.0)
    }
}

bitflags! {
    /// File type bits carried in the first byte of a [`Qid`].
    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
    pub struct QidType: u8 {
        const FILE    = 0x00;
        const LINK    = 0x01;
        const SYMLINK = 0x02;
        const TMP     = 0x04;
        const AUTH    = 0x08;
        const MOUNT   = 0x10;
        const EXCL    = 0x20;
        const APPEND  = 0x40;
        const DIR     = 0x80;
    }

    /// Permissions and mode of a file.
    ///
    /// The low nine bits are the usual rwx triples; the high bits mirror
    /// [`QidType`] shifted up by 24.
    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
    pub struct FileMode: u32 {
        const DMDIR       = 0x8000_0000;
        const DMAPPEND    = 0x4000_0000;
        const DMEXCL      = 0x2000_0000;
        const DMMOUNT     = 0x1000_0000;
        const DMAUTH      = 0x0800_0000;
        const DMTMP       = 0x0400_0000;
        const DMSYMLINK   = 0x0200_0000;
        const DMLINK      = 0x0100_0000;
        const DMDEVICE    = 0x0080_0000;
        const DMNAMEDPIPE = 0x0020_0000;
        const DMSOCKET    = 0x0010_0000;
        const DMSETUID    = 0x0008_0000;
        const DMSETGID    = 0x0004_0000;
        const DMREAD      = 0x4;
        const DMWRITE     = 0x2;
        const DMEXEC      = 0x1;
    }

    /// How a fid is to be opened.
    ///
    /// The low two bits select the access mode; the rest are flags.
    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
    pub struct OpenMode: u8 {
        const OREAD   = 0;
        const OWRITE  = 1;
        const ORDWR   = 2;
        const OEXEC   = 3;
        const OTRUNC  = 0x10;
        const OCEXEC  = 0x20;
        const ORCLOSE = 0x40;
    }
}

impl FileMode {
    /// Permission bits only.
    pub fn perm(self) -> u32 {
        self.bits() & 0o777
    }

    pub fn is_dir(self) -> bool {
        self.contains(Self::DMDIR)
    }

    /// The [`QidType`] implied by the high mode byte.
    pub fn qid_type(self) -> QidType {
        QidType::from_bits_retain((self.bits() >> 24) as u8)
    }
}

impl OpenMode {
    /// The access mode in the low two bits.
    pub fn access(self) -> u8 {
        self.bits() & 3
    }

    pub fn is_readable(self) -> bool {
        matches!(self.access(), 0 | 2)
    }

    pub fn is_writable(self) -> bool {
        matches!(self.access(), 1 | 2)
    }
}

/// Server-assigned unique identity of a file.
///
/// `path` is unique per file within a server for its lifetime; `version`
/// usually increments on every modification.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct Qid {
    pub typ: QidType,
    pub version: u32,
    pub path: u64,
}

impl Qid {
    /// Encoded size: type byte, version, path.
    pub const SIZE: usize = 1 + 4 + 8;
}

/// A field value that means "leave unchanged" in a wstat request.
///
/// The sentinel is the maximum value of each integer width, the empty
/// string, and the all-ones qid.
pub trait DontTouch {
    fn is_dont_touch(&self) -> bool;
}

impl DontTouch for u16 {
    fn is_dont_touch(&self) -> bool {
        *self == u16::MAX
    }
}

impl DontTouch for u32 {
    fn is_dont_touch(&self) -> bool {
        *self == u32::MAX
    }
}

impl DontTouch for u64 {
    fn is_dont_touch(&self) -> bool {
        *self == u64::MAX
    }
}

impl DontTouch for Vec<u8> {
    fn is_dont_touch(&self) -> bool {
        self.is_empty()
    }
}

impl DontTouch for FileMode {
    fn is_dont_touch(&self) -> bool {
        self.bits() == u32::MAX
    }
}

impl DontTouch for Qid {
    fn is_dont_touch(&self) -> bool {
        self.typ.bits() == u8::MAX && self.version.is_dont_touch() && self.path.is_dont_touch()
    }
}

/// Directory entry metadata, called "Dir" in Plan 9 itself.
///
/// On the wire a stat starts with a `u16` holding the length of the rest
/// of the stat body; [`Rstat`] and [`Twstat`] wrap the whole thing in a
/// second `u16` length on top of that.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct Stat {
    /// Reserved for kernel use.
    pub typ: u16,
    /// Reserved for kernel use.
    pub dev: u32,
    pub qid: Qid,
    pub mode: FileMode,
    /// Last access time, seconds since the epoch.
    pub atime: u32,
    /// Last modification time, seconds since the epoch.
    pub mtime: u32,
    /// File length in bytes, 0 for directories.
    pub length: u64,
    pub name: Vec<u8>,
    /// Owning user.
    pub uid: Vec<u8>,
    /// Owning group.
    pub gid: Vec<u8>,
    /// User who last modified the file.
    pub muid: Vec<u8>,
}

impl Stat {
    /// All fixed fields plus the four string length prefixes.
    const FIXED_SIZE: usize = 2 + 2 + 4 + Qid::SIZE + 4 + 4 + 4 + 8 + 2 + 2 + 2 + 2;

    /// A stat whose every field means "leave unchanged".
    ///
    /// Writing one of these back unmodified turns the wstat into a sync
    /// request.
    pub fn dont_touch() -> Stat {
        Stat {
            typ: u16::MAX,
            dev: u32::MAX,
            qid: Qid {
                typ: QidType::from_bits_retain(u8::MAX),
                version: u32::MAX,
                path: u64::MAX,
            },
            mode: FileMode::from_bits_retain(u32::MAX),
            atime: u32::MAX,
            mtime: u32::MAX,
            length: u64::MAX,
            name: Vec::new(),
            uid: Vec::new(),
            gid: Vec::new(),
            muid: Vec::new(),
        }
    }

    /// Encoded size including the leading `u16` size field.
    pub fn encoded_length(&self) -> usize {
        Self::FIXED_SIZE + self.name.len() + self.uid.len() + self.gid.len() + self.muid.len()
    }

    pub fn encode(&self, s: &mut Serializer) -> Result<(), ProtocolError> {
        let len = self.encoded_length() - 2;
        if len > u16::MAX as usize {
            return Err(ProtocolError::TooLong);
        }
        s.write_u16(len as u16);
        s.write_u16(self.typ);
        s.write_u32(self.dev);
        s.write_qid(&self.qid);
        s.write_u32(self.mode.bits());
        s.write_u32(self.atime);
        s.write_u32(self.mtime);
        s.write_u64(self.length);
        s.write_string(&self.name)?;
        s.write_string(&self.uid)?;
        s.write_string(&self.gid)?;
        s.write_string(&self.muid)?;
        Ok(())
    }

    pub fn decode(d: &Deserializer) -> Result<Stat, ProtocolError> {
        // The leading size is informational; the fields bound themselves.
        let _ = d.read_u16()?;
        Ok(Stat {
            typ: d.read_u16()?,
            dev: d.read_u32()?,
            qid: d.read_qid()?,
            mode: FileMode::from_bits_retain(d.read_u32()?),
            atime: d.read_u32()?,
            mtime: d.read_u32()?,
            length: d.read_u64()?,
            name: d.read_string()?.to_vec(),
            uid: d.read_string()?.to_vec(),
            gid: d.read_string()?.to_vec(),
            muid: d.read_string()?.to_vec(),
        })
    }
}

impl DontTouch for Stat {
    fn is_dont_touch(&self) -> bool {
        self.typ.is_dont_touch()
            && self.dev.is_dont_touch()
            && self.qid.is_dont_touch()
            && self.mode.is_dont_touch()
            && self.atime.is_dont_touch()
            && self.mtime.is_dont_touch()
            && self.length.is_dont_touch()
            && self.name.is_dont_touch()
            && self.uid.is_dont_touch()
            && self.gid.is_dont_touch()
            && self.muid.is_dont_touch()
    }
}

/// Opens version negotiation.  Must be the first message on a
/// connection, and must carry [`NOTAG`](crate::NOTAG).
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct Tversion {
    pub tag: Tag,
    /// Largest frame the sender is prepared to handle.
    pub msize: u32,
    /// Highest protocol version the sender speaks.
    pub version: Vec<u8>,
}

impl Tversion {
    pub fn encoded_length(&self) -> usize {
        2 + 4 + 2 + self.version.len()
    }

    pub fn encode(&self, s: &mut Serializer) -> Result<(), ProtocolError> {
        s.write_tag(self.tag);
        s.write_u32(self.msize);
        s.write_string(&self.version)
    }

    pub fn decode(d: &Deserializer) -> Result<Self, ProtocolError> {
        Ok(Self {
            tag: d.read_tag()?,
            msize: d.read_u32()?,
            version: d.read_string()?.to_vec(),
        })
    }
}

/// Concludes version negotiation.  `msize` must not exceed the
/// request's; `version` is "unknown" if negotiation failed.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct Rversion {
    pub tag: Tag,
    pub msize: u32,
    pub version: Vec<u8>,
}

impl Rversion {
    pub fn encoded_length(&self) -> usize {
        2 + 4 + 2 + self.version.len()
    }

    pub fn encode(&self, s: &mut Serializer) -> Result<(), ProtocolError> {
        s.write_tag(self.tag);
        s.write_u32(self.msize);
        s.write_string(&self.version)
    }

    pub fn decode(d: &Deserializer) -> Result<Self, ProtocolError> {
        Ok(Self {
            tag: d.read_tag()?,
            msize: d.read_u32()?,
            version: d.read_string()?.to_vec(),
        })
    }
}

/// Requests an authentication file for `uname` against `aname`.  The
/// authentication protocol itself is not part of 9P2000.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct Tauth {
    pub tag: Tag,
    pub afid: Fid,
    pub uname: Vec<u8>,
    pub aname: Vec<u8>,
}

impl Tauth {
    pub fn encoded_length(&self) -> usize {
        2 + 4 + 2 + self.uname.len() + 2 + self.aname.len()
    }

    pub fn encode(&self, s: &mut Serializer) -> Result<(), ProtocolError> {
        s.write_tag(self.tag);
        s.write_fid(self.afid);
        s.write_string(&self.uname)?;
        s.write_string(&self.aname)
    }

    pub fn decode(d: &Deserializer) -> Result<Self, ProtocolError> {
        Ok(Self {
            tag: d.read_tag()?,
            afid: d.read_fid()?,
            uname: d.read_string()?.to_vec(),
            aname: d.read_string()?.to_vec(),
        })
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct Rauth {
    pub tag: Tag,
    /// Qid of the authentication file; its type must contain
    /// [`QidType::AUTH`].
    pub aqid: Qid,
}

impl Rauth {
    pub fn encoded_length(&self) -> usize {
        2 + Qid::SIZE
    }

    pub fn encode(&self, s: &mut Serializer) -> Result<(), ProtocolError> {
        s.write_tag(self.tag);
        s.write_qid(&self.aqid);
        Ok(())
    }

    pub fn decode(d: &Deserializer) -> Result<Self, ProtocolError> {
        Ok(Self {
            tag: d.read_tag()?,
            aqid: d.read_qid()?,
        })
    }
}

/// Binds `fid` to the root of the service `aname` as user `uname`.
/// `afid` carries an authentication fid, or [`NOFID`](crate::NOFID).
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct Tattach {
    pub tag: Tag,
    pub fid: Fid,
    pub afid: Fid,
    pub uname: Vec<u8>,
    pub aname: Vec<u8>,
}

impl Tattach {
    pub fn encoded_length(&self) -> usize {
        2 + 4 + 4 + 2 + self.uname.len() + 2 + self.aname.len()
    }

    pub fn encode(&self, s: &mut Serializer) -> Result<(), ProtocolError> {
        s.write_tag(self.tag);
        s.write_fid(self.fid);
        s.write_fid(self.afid);
        s.write_string(&self.uname)?;
        s.write_string(&self.aname)
    }

    pub fn decode(d: &Deserializer) -> Result<Self, ProtocolError> {
        Ok(Self {
            tag: d.read_tag()?,
            fid: d.read_fid()?,
            afid: d.read_fid()?,
            uname: d.read_string()?.to_vec(),
            aname: d.read_string()?.to_vec(),
        })
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct Rattach {
    pub tag: Tag,
    /// Qid of the service root.
    pub qid: Qid,
}

impl Rattach {
    pub fn encoded_length(&self) -> usize {
        2 + Qid::SIZE
    }

    pub fn encode(&self, s: &mut Serializer) -> Result<(), ProtocolError> {
        s.write_tag(self.tag);
        s.write_qid(&self.qid);
        Ok(())
    }

    pub fn decode(d: &Deserializer) -> Result<Self, ProtocolError> {
        Ok(Self {
            tag: d.read_tag()?,
            qid: d.read_qid()?,
        })
    }
}

/// Error reply.  There is no T-form; a request either succeeds with its
/// R-message or fails with one of these carrying the server's reason.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct Rerror {
    pub tag: Tag,
    pub ename: Vec<u8>,
}

impl Rerror {
    pub fn encoded_length(&self) -> usize {
        2 + 2 + self.ename.len()
    }

    pub fn encode(&self, s: &mut Serializer) -> Result<(), ProtocolError> {
        s.write_tag(self.tag);
        s.write_string(&self.ename)
    }

    pub fn decode(d: &Deserializer) -> Result<Self, ProtocolError> {
        Ok(Self {
            tag: d.read_tag()?,
            ename: d.read_string()?.to_vec(),
        })
    }
}

/// Cancels the pending request identified by `oldtag`.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct Tflush {
    pub tag: Tag,
    pub oldtag: Tag,
}

impl Tflush {
    pub fn encoded_length(&self) -> usize {
        2 + 2
    }

    pub fn encode(&self, s: &mut Serializer) -> Result<(), ProtocolError> {
        s.write_tag(self.tag);
        s.write_tag(self.oldtag);
        Ok(())
    }

    pub fn decode(d: &Deserializer) -> Result<Self, ProtocolError> {
        Ok(Self {
            tag: d.read_tag()?,
            oldtag: d.read_tag()?,
        })
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct Rflush {
    pub tag: Tag,
}

impl Rflush {
    pub fn encoded_length(&self) -> usize {
        2
    }

    pub fn encode(&self, s: &mut Serializer) -> Result<(), ProtocolError> {
        s.write_tag(self.tag);
        Ok(())
    }

    pub fn decode(d: &Deserializer) -> Result<Self, ProtocolError> {
        Ok(Self { tag: d.read_tag()? })
    }
}

/// Walks `wname` elements starting at `fid`, binding the destination to
/// `newfid`.  At most [`MAXWELEM`](crate::MAXWELEM) names per message;
/// zero names aliases `newfid` to `fid`.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct Twalk {
    pub tag: Tag,
    pub fid: Fid,
    pub newfid: Fid,
    pub wname: Vec<Vec<u8>>,
}

impl Twalk {
    pub fn encoded_length(&self) -> usize {
        2 + 4 + 4 + 2 + self.wname.iter().map(|n| 2 + n.len()).sum::<usize>()
    }

    pub fn encode(&self, s: &mut Serializer) -> Result<(), ProtocolError> {
        if self.wname.len() > u16::MAX as usize {
            return Err(ProtocolError::TooLong);
        }
        s.write_tag(self.tag);
        s.write_fid(self.fid);
        s.write_fid(self.newfid);
        s.write_u16(self.wname.len() as u16);
        for name in &self.wname {
            s.write_string(name)?;
        }
        Ok(())
    }

    pub fn decode(d: &Deserializer) -> Result<Self, ProtocolError> {
        let tag = d.read_tag()?;
        let fid = d.read_fid()?;
        let newfid = d.read_fid()?;
        let count = d.read_u16()?;
        let mut wname = Vec::with_capacity(count as usize);
        for _ in 0..count {
            wname.push(d.read_string()?.to_vec());
        }
        Ok(Self {
            tag,
            fid,
            newfid,
            wname,
        })
    }
}

/// One qid per successfully walked element.  A full walk returns as many
/// qids as names; a shorter reply means the walk stopped early and
/// neither fid was touched.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct Rwalk {
    pub tag: Tag,
    pub wqid: Vec<Qid>,
}

impl Rwalk {
    pub fn encoded_length(&self) -> usize {
        2 + 2 + Qid::SIZE * self.wqid.len()
    }

    pub fn encode(&self, s: &mut Serializer) -> Result<(), ProtocolError> {
        if self.wqid.len() > u16::MAX as usize {
            return Err(ProtocolError::TooLong);
        }
        s.write_tag(self.tag);
        s.write_u16(self.wqid.len() as u16);
        for qid in &self.wqid {
            s.write_qid(qid);
        }
        Ok(())
    }

    pub fn decode(d: &Deserializer) -> Result<Self, ProtocolError> {
        let tag = d.read_tag()?;
        let count = d.read_u16()?;
        let mut wqid = Vec::with_capacity(count as usize);
        for _ in 0..count {
            wqid.push(d.read_qid()?);
        }
        Ok(Self { tag, wqid })
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct Topen {
    pub tag: Tag,
    pub fid: Fid,
    pub mode: OpenMode,
}

impl Topen {
    pub fn encoded_length(&self) -> usize {
        2 + 4 + 1
    }

    pub fn encode(&self, s: &mut Serializer) -> Result<(), ProtocolError> {
        s.write_tag(self.tag);
        s.write_fid(self.fid);
        s.write_u8(self.mode.bits());
        Ok(())
    }

    pub fn decode(d: &Deserializer) -> Result<Self, ProtocolError> {
        Ok(Self {
            tag: d.read_tag()?,
            fid: d.read_fid()?,
            mode: OpenMode::from_bits_retain(d.read_u8()?),
        })
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct Ropen {
    pub tag: Tag,
    pub qid: Qid,
    /// Largest read or write the server guarantees to perform atomically,
    /// or 0 for no guarantee.
    pub iounit: u32,
}

impl Ropen {
    pub fn encoded_length(&self) -> usize {
        2 + Qid::SIZE + 4
    }

    pub fn encode(&self, s: &mut Serializer) -> Result<(), ProtocolError> {
        s.write_tag(self.tag);
        s.write_qid(&self.qid);
        s.write_u32(self.iounit);
        Ok(())
    }

    pub fn decode(d: &Deserializer) -> Result<Self, ProtocolError> {
        Ok(Self {
            tag: d.read_tag()?,
            qid: d.read_qid()?,
            iounit: d.read_u32()?,
        })
    }
}

/// Creates `name` in the directory `fid` with permissions `perm`, then
/// opens it with `mode`; `fid` moves to the new file.  Directories are
/// created by setting [`FileMode::DMDIR`] in `perm`.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct Tcreate {
    pub tag: Tag,
    pub fid: Fid,
    pub name: Vec<u8>,
    pub perm: FileMode,
    pub mode: OpenMode,
}

impl Tcreate {
    pub fn encoded_length(&self) -> usize {
        2 + 4 + 2 + self.name.len() + 4 + 1
    }

    pub fn encode(&self, s: &mut Serializer) -> Result<(), ProtocolError> {
        s.write_tag(self.tag);
        s.write_fid(self.fid);
        s.write_string(&self.name)?;
        s.write_u32(self.perm.bits());
        s.write_u8(self.mode.bits());
        Ok(())
    }

    pub fn decode(d: &Deserializer) -> Result<Self, ProtocolError> {
        Ok(Self {
            tag: d.read_tag()?,
            fid: d.read_fid()?,
            name: d.read_string()?.to_vec(),
            perm: FileMode::from_bits_retain(d.read_u32()?),
            mode: OpenMode::from_bits_retain(d.read_u8()?),
        })
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct Rcreate {
    pub tag: Tag,
    pub qid: Qid,
    pub iounit: u32,
}

impl Rcreate {
    pub fn encoded_length(&self) -> usize {
        2 + Qid::SIZE + 4
    }

    pub fn encode(&self, s: &mut Serializer) -> Result<(), ProtocolError> {
        s.write_tag(self.tag);
        s.write_qid(&self.qid);
        s.write_u32(self.iounit);
        Ok(())
    }

    pub fn decode(d: &Deserializer) -> Result<Self, ProtocolError> {
        Ok(Self {
            tag: d.read_tag()?,
            qid: d.read_qid()?,
            iounit: d.read_u32()?,
        })
    }
}

/// Reads up to `count` bytes at `offset`.  Directory reads must use
/// offset 0 or the running total of bytes already returned.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct Tread {
    pub tag: Tag,
    pub fid: Fid,
    pub offset: u64,
    pub count: u32,
}

impl Tread {
    pub fn encoded_length(&self) -> usize {
        2 + 4 + 8 + 4
    }

    pub fn encode(&self, s: &mut Serializer) -> Result<(), ProtocolError> {
        s.write_tag(self.tag);
        s.write_fid(self.fid);
        s.write_u64(self.offset);
        s.write_u32(self.count);
        Ok(())
    }

    pub fn decode(d: &Deserializer) -> Result<Self, ProtocolError> {
        Ok(Self {
            tag: d.read_tag()?,
            fid: d.read_fid()?,
            offset: d.read_u64()?,
            count: d.read_u32()?,
        })
    }
}

/// Data read, possibly shorter than requested.  For directories this is
/// a concatenation of encoded [`Stat`] entries.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct Rread {
    pub tag: Tag,
    pub data: Bytes,
}

impl Rread {
    pub fn encoded_length(&self) -> usize {
        2 + 4 + self.data.len()
    }

    pub fn encode(&self, s: &mut Serializer) -> Result<(), ProtocolError> {
        if self.data.len() > u32::MAX as usize {
            return Err(ProtocolError::TooLong);
        }
        s.write_tag(self.tag);
        s.write_u32(self.data.len() as u32);
        s.write_data(&self.data);
        Ok(())
    }

    pub fn decode(d: &Deserializer) -> Result<Self, ProtocolError> {
        let tag = d.read_tag()?;
        let count = d.read_u32()?;
        let data = Bytes::copy_from_slice(d.read_data(count as usize)?);
        Ok(Self { tag, data })
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct Twrite {
    pub tag: Tag,
    pub fid: Fid,
    pub offset: u64,
    pub data: Bytes,
}

impl Twrite {
    pub fn encoded_length(&self) -> usize {
        2 + 4 + 8 + 4 + self.data.len()
    }

    pub fn encode(&self, s: &mut Serializer) -> Result<(), ProtocolError> {
        if self.data.len() > u32::MAX as usize {
            return Err(ProtocolError::TooLong);
        }
        s.write_tag(self.tag);
        s.write_fid(self.fid);
        s.write_u64(self.offset);
        s.write_u32(self.data.len() as u32);
        s.write_data(&self.data);
        Ok(())
    }

    pub fn decode(d: &Deserializer) -> Result<Self, ProtocolError> {
        let tag = d.read_tag()?;
        let fid = d.read_fid()?;
        let offset = d.read_u64()?;
        let count = d.read_u32()?;
        let data = Bytes::copy_from_slice(d.read_data(count as usize)?);
        Ok(Self {
            tag,
            fid,
            offset,
            data,
        })
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct Rwrite {
    pub tag: Tag,
    /// Bytes actually written.
    pub count: u32,
}

impl Rwrite {
    pub fn encoded_length(&self) -> usize {
        2 + 4
    }

    pub fn encode(&self, s: &mut Serializer) -> Result<(), ProtocolError> {
        s.write_tag(self.tag);
        s.write_u32(self.count);
        Ok(())
    }

    pub fn decode(d: &Deserializer) -> Result<Self, ProtocolError> {
        Ok(Self {
            tag: d.read_tag()?,
            count: d.read_u32()?,
        })
    }
}

/// Releases `fid`.  The fid may be reused afterwards even if the clunk
/// itself failed.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct Tclunk {
    pub tag: Tag,
    pub fid: Fid,
}

impl Tclunk {
    pub fn encoded_length(&self) -> usize {
        2 + 4
    }

    pub fn encode(&self, s: &mut Serializer) -> Result<(), ProtocolError> {
        s.write_tag(self.tag);
        s.write_fid(self.fid);
        Ok(())
    }

    pub fn decode(d: &Deserializer) -> Result<Self, ProtocolError> {
        Ok(Self {
            tag: d.read_tag()?,
            fid: d.read_fid()?,
        })
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct Rclunk {
    pub tag: Tag,
}

impl Rclunk {
    pub fn encoded_length(&self) -> usize {
        2
    }

    pub fn encode(&self, s: &mut Serializer) -> Result<(), ProtocolError> {
        s.write_tag(self.tag);
        Ok(())
    }

    pub fn decode(d: &Deserializer) -> Result<Self, ProtocolError> {
        Ok(Self { tag: d.read_tag()? })
    }
}

/// Clunks `fid` and removes its file.  The fid is released even when the
/// removal fails.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct Tremove {
    pub tag: Tag,
    pub fid: Fid,
}

impl Tremove {
    pub fn encoded_length(&self) -> usize {
        2 + 4
    }

    pub fn encode(&self, s: &mut Serializer) -> Result<(), ProtocolError> {
        s.write_tag(self.tag);
        s.write_fid(self.fid);
        Ok(())
    }

    pub fn decode(d: &Deserializer) -> Result<Self, ProtocolError> {
        Ok(Self {
            tag: d.read_tag()?,
            fid: d.read_fid()?,
        })
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct Rremove {
    pub tag: Tag,
}

impl Rremove {
    pub fn encoded_length(&self) -> usize {
        2
    }

    pub fn encode(&self, s: &mut Serializer) -> Result<(), ProtocolError> {
        s.write_tag(self.tag);
        Ok(())
    }

    pub fn decode(d: &Deserializer) -> Result<Self, ProtocolError> {
        Ok(Self { tag: d.read_tag()? })
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct Tstat {
    pub tag: Tag,
    pub fid: Fid,
}

impl Tstat {
    pub fn encoded_length(&self) -> usize {
        2 + 4
    }

    pub fn encode(&self, s: &mut Serializer) -> Result<(), ProtocolError> {
        s.write_tag(self.tag);
        s.write_fid(self.fid);
        Ok(())
    }

    pub fn decode(d: &Deserializer) -> Result<Self, ProtocolError> {
        Ok(Self {
            tag: d.read_tag()?,
            fid: d.read_fid()?,
        })
    }
}

/// Carries the requested stat behind an extra `u16` length holding the
/// stat's full encoded size.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct Rstat {
    pub tag: Tag,
    pub stat: Stat,
}

impl Rstat {
    pub fn encoded_length(&self) -> usize {
        2 + 2 + self.stat.encoded_length()
    }

    pub fn encode(&self, s: &mut Serializer) -> Result<(), ProtocolError> {
        let len = self.stat.encoded_length();
        if len > u16::MAX as usize {
            return Err(ProtocolError::TooLong);
        }
        s.write_tag(self.tag);
        s.write_u16(len as u16);
        self.stat.encode(s)
    }

    pub fn decode(d: &Deserializer) -> Result<Self, ProtocolError> {
        let tag = d.read_tag()?;
        // Outer stat size, informational like the inner one.
        let _ = d.read_u16()?;
        Ok(Self {
            tag,
            stat: Stat::decode(d)?,
        })
    }
}

/// Applies `stat` to the file of `fid`, all or nothing.  Fields at their
/// "don't touch" value are left alone; a stat that touches nothing asks
/// the server to commit the file to stable storage.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct Twstat {
    pub tag: Tag,
    pub fid: Fid,
    pub stat: Stat,
}

impl Twstat {
    pub fn encoded_length(&self) -> usize {
        2 + 4 + 2 + self.stat.encoded_length()
    }

    pub fn encode(&self, s: &mut Serializer) -> Result<(), ProtocolError> {
        let len = self.stat.encoded_length();
        if len > u16::MAX as usize {
            return Err(ProtocolError::TooLong);
        }
        s.write_tag(self.tag);
        s.write_fid(self.fid);
        s.write_u16(len as u16);
        self.stat.encode(s)
    }

    pub fn decode(d: &Deserializer) -> Result<Self, ProtocolError> {
        let tag = d.read_tag()?;
        let fid = d.read_fid()?;
        let _ = d.read_u16()?;
        Ok(Self {
            tag,
            fid,
            stat: Stat::decode(d)?,
        })
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct Rwstat {
    pub tag: Tag,
}

impl Rwstat {
    pub fn encoded_length(&self) -> usize {
        2
    }

    pub fn encode(&self, s: &mut Serializer) -> Result<(), ProtocolError> {
        s.write_tag(self.tag);
        Ok(())
    }

    pub fn decode(d: &Deserializer) -> Result<Self, ProtocolError> {
        Ok(Self { tag: d.read_tag()? })
    }
}
