//! # Codec
//!
//! A bounded TLV encoder and a zero-copy decoder, the byte layer under the
//! interchange format.
//!
//! ## Format
//!
//! - **Scalars**: `[Tag: 1b][Data: N]`
//! - **Blobs**: `[Tag: 1b][Len: 4b][Data: Len]`
//! - **Containers**: `[Tag: 1b][Len: 4b][Body: Len]`
//!
//! All integers are little-endian. Tag bytes are shared with every other
//! binding of the platform and must never be renumbered.

use std::fmt;

/// Interchange errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Buffer exhausted while reading.
    UnexpectedEnd,
    /// Byte does not correspond to a valid `Tag`, or not the one expected here.
    InvalidTag(u8),
    /// String data is not valid UTF-8.
    InvalidUtf8,
    /// Closing a scope that does not match the active scope.
    ScopeMismatch { expected: Scope, actual: Scope },
    /// Attempted to close a scope when only the root remains.
    ScopeUnderflow,
    /// Attempted to finalize the buffer with open scopes.
    ScopeStillOpen,
    /// Attempted to write more than one payload into a variant.
    TooManyItems,
    /// Closed a variant without a payload.
    EmptyVariant,
    /// Attempted to write a non-variant directly into a map.
    InvalidMapEntry,
    /// Blob or container length exceeds `u32::MAX`.
    BlobTooLarge(usize),
    /// A variant name not known to the model.
    UnknownVariant(String),
    /// A required entry was absent from a map.
    MissingEntry(&'static str),
    /// Nesting deeper than the decoder allows.
    RecursionLimitExceeded,
    /// A timestamp or duration outside the representable range.
    OutOfRange,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTag(b) => write!(f, "invalid tag byte: {:#04x}", b),
            Self::ScopeMismatch { expected, actual } => {
                write!(f, "scope mismatch: expected {:?}, found {:?}", expected, actual)
            }
            Self::UnknownVariant(name) => write!(f, "unknown variant: {}", name),
            Self::MissingEntry(key) => write!(f, "missing map entry: {}", key),
            _ => write!(f, "{:?}", self),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// Identifies the type of an encoded item.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    BoolTrue = 0x01,
    BoolFalse = 0x02,
    U32 = 0x05,
    S64 = 0x0A,
    F64 = 0x0C,
    Unit = 0x0E,

    // Blobs (Tag + u32 Len + Bytes)
    String = 0x10,
    Bytes = 0x11,

    // Containers (Tag + u32 Len + Body)
    List = 0x20,
    Map = 0x21,
    Variant = 0x33,
}

impl Tag {
    pub fn from_u8(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Tag::BoolTrue),
            0x02 => Some(Tag::BoolFalse),
            0x05 => Some(Tag::U32),
            0x0A => Some(Tag::S64),
            0x0C => Some(Tag::F64),
            0x0E => Some(Tag::Unit),
            0x10 => Some(Tag::String),
            0x11 => Some(Tag::Bytes),
            0x20 => Some(Tag::List),
            0x21 => Some(Tag::Map),
            0x33 => Some(Tag::Variant),
            _ => None,
        }
    }
}

/// Kind of an open container on the encoder stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The virtual root; allows any item.
    Root,
    /// Ordered sequence; any number of items.
    List,
    /// Key-value container; only variants.
    Map,
    /// Named payload; exactly one item after the name.
    Variant,
}

struct Frame {
    start: usize,
    scope: Scope,
    count: usize,
}

/// A bounded, state-machine driven encoder.
///
/// Keeps a stack of open scopes and back-patches length headers on close.
pub struct Encoder {
    buf: Vec<u8>,
    /// Bottom is always `Scope::Root`.
    stack: Vec<Frame>,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder {
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(256),
            stack: vec![Frame { start: 0, scope: Scope::Root, count: 0 }],
        }
    }

    /// Consumes the encoder and returns the final bytes.
    ///
    /// # Errors
    /// Returns `Error::ScopeStillOpen` if any container is still open.
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        if self.stack.len() > 1 {
            return Err(Error::ScopeStillOpen);
        }
        Ok(self.buf)
    }

    fn current_frame(&mut self) -> Result<&mut Frame> {
        self.stack.last_mut().ok_or(Error::ScopeUnderflow)
    }

    fn check_write(&mut self, tag: Tag) -> Result<()> {
        let frame = self.current_frame()?;
        match frame.scope {
            Scope::Root | Scope::List => Ok(()),
            Scope::Map if tag != Tag::Variant => Err(Error::InvalidMapEntry),
            Scope::Map => Ok(()),
            Scope::Variant if frame.count >= 1 => Err(Error::TooManyItems),
            Scope::Variant => Ok(()),
        }
    }

    fn on_item_written(&mut self) -> Result<()> {
        self.current_frame()?.count += 1;
        Ok(())
    }

    fn write_tag(&mut self, tag: Tag) -> Result<()> {
        self.check_write(tag)?;
        self.buf.push(tag as u8);
        Ok(())
    }

    fn write_len(&mut self, len: usize) -> Result<()> {
        let len = u32::try_from(len).map_err(|_| Error::BlobTooLarge(len))?;
        self.buf.extend_from_slice(&len.to_le_bytes());
        Ok(())
    }

    fn begin_scope(&mut self, tag: Tag, scope: Scope) -> Result<()> {
        self.write_tag(tag)?;
        self.buf.extend_from_slice(&[0, 0, 0, 0]);
        self.stack.push(Frame { start: self.buf.len(), scope, count: 0 });
        Ok(())
    }

    fn end_scope(&mut self, expected: Scope) -> Result<()> {
        if self.stack.len() <= 1 {
            return Err(Error::ScopeUnderflow);
        }

        let frame = self.stack.pop().ok_or(Error::ScopeUnderflow)?;
        if frame.scope != expected {
            let actual = frame.scope;
            self.stack.push(frame);
            return Err(Error::ScopeMismatch { expected, actual });
        }
        if frame.scope == Scope::Variant && frame.count == 0 {
            self.stack.push(frame);
            return Err(Error::EmptyVariant);
        }

        let body_len = self.buf.len() - frame.start;
        let len = u32::try_from(body_len).map_err(|_| Error::BlobTooLarge(body_len))?;
        self.buf[frame.start - 4..frame.start].copy_from_slice(&len.to_le_bytes());

        self.on_item_written()
    }

    pub fn bool(&mut self, v: bool) -> Result<()> {
        self.write_tag(if v { Tag::BoolTrue } else { Tag::BoolFalse })?;
        self.on_item_written()
    }

    pub fn u32(&mut self, v: u32) -> Result<()> {
        self.write_tag(Tag::U32)?;
        self.buf.extend_from_slice(&v.to_le_bytes());
        self.on_item_written()
    }

    pub fn s64(&mut self, v: i64) -> Result<()> {
        self.write_tag(Tag::S64)?;
        self.buf.extend_from_slice(&v.to_le_bytes());
        self.on_item_written()
    }

    pub fn f64(&mut self, v: f64) -> Result<()> {
        self.write_tag(Tag::F64)?;
        self.buf.extend_from_slice(&v.to_le_bytes());
        self.on_item_written()
    }

    pub fn unit(&mut self) -> Result<()> {
        self.write_tag(Tag::Unit)?;
        self.on_item_written()
    }

    pub fn str(&mut self, v: &str) -> Result<()> {
        self.blob(Tag::String, v.as_bytes())
    }

    pub fn bytes(&mut self, v: &[u8]) -> Result<()> {
        self.blob(Tag::Bytes, v)
    }

    fn blob(&mut self, tag: Tag, v: &[u8]) -> Result<()> {
        if u32::try_from(v.len()).is_err() {
            return Err(Error::BlobTooLarge(v.len()));
        }
        self.write_tag(tag)?;
        self.write_len(v.len())?;
        self.buf.extend_from_slice(v);
        self.on_item_written()
    }

    /// Begins a list; close with `list_end()`.
    pub fn list_begin(&mut self) -> Result<()> { self.begin_scope(Tag::List, Scope::List) }
    pub fn list_end(&mut self) -> Result<()> { self.end_scope(Scope::List) }

    /// Begins a map; only `variant_begin()` may write directly into it.
    pub fn map_begin(&mut self) -> Result<()> { self.begin_scope(Tag::Map, Scope::Map) }
    pub fn map_end(&mut self) -> Result<()> { self.end_scope(Scope::Map) }

    /// Begins a named payload. Exactly one item must follow before `variant_end()`.
    pub fn variant_begin(&mut self, name: &str) -> Result<()> {
        self.begin_scope(Tag::Variant, Scope::Variant)?;
        self.str(name)?;
        // The name is metadata, not payload.
        self.current_frame()?.count = 0;
        Ok(())
    }
    pub fn variant_end(&mut self) -> Result<()> { self.end_scope(Scope::Variant) }
}

/// A zero-copy, bounds-checked view over encoded bytes.
///
/// Container reads return new decoders restricted to the container body.
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    buf: &'a [u8],
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    /// Peeks the next tag without advancing.
    pub fn peek_tag(&self) -> Result<Tag> {
        let b = *self.buf.first().ok_or(Error::UnexpectedEnd)?;
        Tag::from_u8(b).ok_or(Error::InvalidTag(b))
    }

    fn consume(&mut self, n: usize) -> Result<()> {
        self.read_bytes(n).map(|_| ())
    }

    fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.buf.len() {
            return Err(Error::UnexpectedEnd);
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    fn read_len(&mut self) -> Result<usize> {
        Ok(u32::from_le_bytes(self.read_array()?) as usize)
    }

    fn check_tag(&mut self, expected: Tag) -> Result<()> {
        let tag = self.peek_tag()?;
        if tag != expected {
            return Err(Error::InvalidTag(tag as u8));
        }
        self.consume(1)
    }

    /// Skips the next item and its nested children.
    pub fn skip(&mut self) -> Result<()> {
        let tag = self.peek_tag()?;
        self.consume(1)?;
        match tag {
            Tag::BoolTrue | Tag::BoolFalse | Tag::Unit => Ok(()),
            Tag::U32 => self.consume(4),
            Tag::S64 | Tag::F64 => self.consume(8),
            Tag::String | Tag::Bytes | Tag::List | Tag::Map | Tag::Variant => {
                let len = self.read_len()?;
                self.consume(len)
            }
        }
    }

    pub fn bool(&mut self) -> Result<bool> {
        match self.peek_tag()? {
            Tag::BoolTrue => { self.consume(1)?; Ok(true) }
            Tag::BoolFalse => { self.consume(1)?; Ok(false) }
            tag => Err(Error::InvalidTag(tag as u8)),
        }
    }

    pub fn u32(&mut self) -> Result<u32> {
        self.check_tag(Tag::U32)?;
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn s64(&mut self) -> Result<i64> {
        self.check_tag(Tag::S64)?;
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    pub fn f64(&mut self) -> Result<f64> {
        self.check_tag(Tag::F64)?;
        Ok(f64::from_le_bytes(self.read_array()?))
    }

    pub fn unit(&mut self) -> Result<()> {
        self.check_tag(Tag::Unit)
    }

    pub fn str(&mut self) -> Result<&'a str> {
        self.check_tag(Tag::String)?;
        let len = self.read_len()?;
        std::str::from_utf8(self.read_bytes(len)?).map_err(|_| Error::InvalidUtf8)
    }

    pub fn bytes(&mut self) -> Result<&'a [u8]> {
        self.check_tag(Tag::Bytes)?;
        let len = self.read_len()?;
        self.read_bytes(len)
    }

    fn enter_container(&mut self, expected: Tag) -> Result<Decoder<'a>> {
        self.check_tag(expected)?;
        let len = self.read_len()?;
        Ok(Decoder::new(self.read_bytes(len)?))
    }

    pub fn list(&mut self) -> Result<ListIter<'a>> {
        Ok(ListIter { dec: self.enter_container(Tag::List)? })
    }

    pub fn map(&mut self) -> Result<MapIter<'a>> {
        Ok(MapIter { dec: self.enter_container(Tag::Map)? })
    }

    /// Decodes a variant, returning `(name, payload decoder)`.
    pub fn variant(&mut self) -> Result<(&'a str, Decoder<'a>)> {
        let mut inner = self.enter_container(Tag::Variant)?;
        let name = inner.str()?;
        Ok((name, inner))
    }
}

/// Items within a list.
#[derive(Debug)]
pub struct ListIter<'a> {
    dec: Decoder<'a>,
}

impl<'a> ListIter<'a> {
    /// Returns a decoder for the next item, or `None` at the end.
    pub fn next_item(&mut self) -> Result<Option<Decoder<'a>>> {
        if self.dec.remaining() == 0 {
            return Ok(None);
        }
        let mut lookahead = self.dec.clone();
        lookahead.skip()?;
        let len = self.dec.remaining() - lookahead.remaining();
        Ok(Some(Decoder::new(self.dec.read_bytes(len)?)))
    }
}

/// Key-value pairs (variants) within a map.
#[derive(Debug)]
pub struct MapIter<'a> {
    dec: Decoder<'a>,
}

impl<'a> MapIter<'a> {
    /// Returns `(key, value decoder)` for the next entry, or `None` at the end.
    pub fn next_entry(&mut self) -> Result<Option<(&'a str, Decoder<'a>)>> {
        if self.dec.remaining() == 0 {
            return Ok(None);
        }
        let tag = self.dec.peek_tag()?;
        if tag != Tag::Variant {
            return Err(Error::InvalidTag(tag as u8));
        }
        self.dec.variant().map(Some)
    }
}
