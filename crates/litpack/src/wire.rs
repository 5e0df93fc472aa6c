//! # Interchange
//!
//! Maps `WireType` and `Literal` onto the codec. Every model variant is written
//! as a codec variant named by its stable snake_case tag, so other bindings can
//! read the bytes without sharing any Rust type.
//!
//! ## Invariants
//! - **Recursion Safety**: encoding and decoding stop at `MAX_DEPTH` nesting levels.
//! - **Forward Compatibility**: unknown map entries are skipped, unknown variant
//!   names are rejected.

use std::collections::BTreeMap;

use chrono::DateTime;

use crate::codec::Decoder;
use crate::codec::Encoder;
use crate::codec::Error;
use crate::codec::MapIter;
use crate::codec::Result;
use crate::types::Blob;
use crate::types::BlobType;
use crate::types::Dimensionality;
use crate::types::Field;
use crate::types::Literal;
use crate::types::Primitive;
use crate::types::PrimitiveKind;
use crate::types::RecordType;
use crate::types::Scalar;
use crate::types::UnionType;
use crate::types::WireType;
use crate::types::delta_from_parts;

/// The maximum nesting depth accepted on either side of the wire.
pub const MAX_DEPTH: usize = 64;

// ============================================================================
//  WIRE TYPES
// ============================================================================

/// Encodes a type descriptor into the encoder stream.
pub fn encode_wire_type(enc: &mut Encoder, ty: &WireType) -> Result<()> {
    encode_wire_type_impl(enc, ty, 0)
}

fn encode_wire_type_impl(enc: &mut Encoder, ty: &WireType, depth: usize) -> Result<()> {
    if depth > MAX_DEPTH {
        return Err(Error::RecursionLimitExceeded);
    }

    enc.variant_begin(ty.kind())?;
    match ty {
        WireType::Primitive(kind) => enc.str(kind.as_str())?,
        WireType::Collection(el) | WireType::Mapping(el) => {
            encode_wire_type_impl(enc, el, depth + 1)?
        }
        WireType::Union(u) => {
            enc.map_begin()?;
            enc.variant_begin("members")?;
            enc.list_begin()?;
            for member in &u.members {
                encode_wire_type_impl(enc, member, depth + 1)?;
            }
            enc.list_end()?;
            enc.variant_end()?;
            write_map_str(enc, "tag_field", &u.tag_field)?;
            enc.map_end()?;
        }
        WireType::Blob(b) => {
            enc.map_begin()?;
            write_map_str(enc, "format", &b.format)?;
            write_map_str(enc, "dimensionality", b.dimensionality.as_str())?;
            enc.map_end()?;
        }
        WireType::Record(r) => {
            // A list of named entries, not a map: field order is part of the type.
            enc.list_begin()?;
            for field in &r.fields {
                enc.variant_begin(&field.name)?;
                encode_wire_type_impl(enc, &field.ty, depth + 1)?;
                enc.variant_end()?;
            }
            enc.list_end()?;
        }
    }
    enc.variant_end()
}

/// Decodes a type descriptor.
pub fn decode_wire_type(dec: &mut Decoder) -> Result<WireType> {
    decode_wire_type_impl(dec, 0)
}

fn decode_wire_type_impl(dec: &mut Decoder, depth: usize) -> Result<WireType> {
    if depth > MAX_DEPTH {
        return Err(Error::RecursionLimitExceeded);
    }

    let (name, mut body) = dec.variant()?;
    match name {
        "primitive" => {
            let kind = body.str()?;
            PrimitiveKind::from_name(kind)
                .map(WireType::Primitive)
                .ok_or_else(|| Error::UnknownVariant(kind.to_string()))
        }
        "collection" => Ok(WireType::collection(decode_wire_type_impl(&mut body, depth + 1)?)),
        "mapping" => Ok(WireType::mapping(decode_wire_type_impl(&mut body, depth + 1)?)),
        "union" => {
            let mut members = None;
            let mut tag_field = None;
            let mut iter = body.map()?;
            while let Some((key, mut value)) = iter.next_entry()? {
                match key {
                    "members" => {
                        let mut list = value.list()?;
                        let mut out = Vec::new();
                        while let Some(mut item) = list.next_item()? {
                            out.push(decode_wire_type_impl(&mut item, depth + 1)?);
                        }
                        members = Some(out);
                    }
                    "tag_field" => tag_field = Some(value.str()?.to_string()),
                    _ => value.skip()?,
                }
            }
            let members = members.ok_or(Error::MissingEntry("members"))?;
            let tag_field = tag_field.ok_or(Error::MissingEntry("tag_field"))?;
            Ok(WireType::Union(UnionType::new(members).with_tag_field(tag_field)))
        }
        "blob" => {
            let mut iter = body.map()?;
            Ok(WireType::Blob(read_blob_type(&mut iter)?.1))
        }
        "record" => {
            let mut list = body.list()?;
            let mut fields = Vec::new();
            while let Some(mut item) = list.next_item()? {
                let (field_name, mut field_body) = item.variant()?;
                let ty = decode_wire_type_impl(&mut field_body, depth + 1)?;
                fields.push(Field::new(field_name, ty));
            }
            Ok(WireType::Record(RecordType::new(fields)))
        }
        other => Err(Error::UnknownVariant(other.to_string())),
    }
}

// ============================================================================
//  LITERALS
// ============================================================================

/// Encodes a literal into the encoder stream.
pub fn encode_literal(enc: &mut Encoder, lit: &Literal) -> Result<()> {
    encode_literal_impl(enc, lit, 0)
}

fn encode_literal_impl(enc: &mut Encoder, lit: &Literal, depth: usize) -> Result<()> {
    if depth > MAX_DEPTH {
        return Err(Error::RecursionLimitExceeded);
    }

    match lit {
        Literal::Scalar(Scalar::None) => {
            enc.variant_begin("none")?;
            enc.unit()?;
        }
        Literal::Scalar(Scalar::Primitive(p)) => {
            enc.variant_begin(p.kind().as_str())?;
            match p {
                Primitive::Integer(v) => enc.s64(*v)?,
                Primitive::Float(v) => enc.f64(*v)?,
                Primitive::String(v) => enc.str(v)?,
                Primitive::Boolean(v) => enc.bool(*v)?,
                Primitive::Datetime(v) => {
                    enc.map_begin()?;
                    write_map_s64(enc, "seconds", v.timestamp())?;
                    enc.variant_begin("nanos")?;
                    enc.u32(v.timestamp_subsec_nanos())?;
                    enc.variant_end()?;
                    enc.map_end()?;
                }
                Primitive::Duration(v) => {
                    enc.map_begin()?;
                    write_map_s64(enc, "seconds", v.num_seconds())?;
                    write_map_s64(enc, "nanos", v.subsec_nanos() as i64)?;
                    enc.map_end()?;
                }
                Primitive::Binary(v) => enc.bytes(v)?,
            }
        }
        Literal::Scalar(Scalar::Blob(b)) => {
            enc.variant_begin("blob")?;
            enc.map_begin()?;
            write_map_str(enc, "uri", &b.uri)?;
            write_map_str(enc, "format", &b.format)?;
            write_map_str(enc, "dimensionality", b.dimensionality.as_str())?;
            enc.map_end()?;
        }
        Literal::Collection(items) => {
            enc.variant_begin("collection")?;
            enc.list_begin()?;
            for item in items {
                encode_literal_impl(enc, item, depth + 1)?;
            }
            enc.list_end()?;
        }
        Literal::Mapping(entries) | Literal::Record(entries) => {
            enc.variant_begin(lit.kind())?;
            enc.map_begin()?;
            for (key, value) in entries {
                enc.variant_begin(key)?;
                encode_literal_impl(enc, value, depth + 1)?;
                enc.variant_end()?;
            }
            enc.map_end()?;
        }
        Literal::Union(uv) => {
            enc.variant_begin("union")?;
            enc.map_begin()?;
            enc.variant_begin("type")?;
            encode_wire_type_impl(enc, &uv.ty, depth + 1)?;
            enc.variant_end()?;
            enc.variant_begin("value")?;
            encode_literal_impl(enc, &uv.value, depth + 1)?;
            enc.variant_end()?;
            enc.map_end()?;
        }
    }
    enc.variant_end()
}

/// Decodes a literal.
pub fn decode_literal(dec: &mut Decoder) -> Result<Literal> {
    decode_literal_impl(dec, 0)
}

fn decode_literal_impl(dec: &mut Decoder, depth: usize) -> Result<Literal> {
    if depth > MAX_DEPTH {
        return Err(Error::RecursionLimitExceeded);
    }

    let (name, mut body) = dec.variant()?;
    let lit = match name {
        "none" => {
            body.unit()?;
            Literal::none()
        }
        "integer" => Literal::integer(body.s64()?),
        "float" => Literal::float(body.f64()?),
        "string" => Literal::string(body.str()?),
        "boolean" => Literal::boolean(body.bool()?),
        "binary" => Literal::primitive(Primitive::Binary(body.bytes()?.to_vec())),
        "datetime" => {
            let mut seconds = None;
            let mut nanos = None;
            let mut iter = body.map()?;
            while let Some((key, mut value)) = iter.next_entry()? {
                match key {
                    "seconds" => seconds = Some(value.s64()?),
                    "nanos" => nanos = Some(value.u32()?),
                    _ => value.skip()?,
                }
            }
            let seconds = seconds.ok_or(Error::MissingEntry("seconds"))?;
            let nanos = nanos.ok_or(Error::MissingEntry("nanos"))?;
            let ts = DateTime::from_timestamp(seconds, nanos).ok_or(Error::OutOfRange)?;
            Literal::primitive(Primitive::Datetime(ts))
        }
        "duration" => {
            let mut seconds = None;
            let mut nanos = None;
            let mut iter = body.map()?;
            while let Some((key, mut value)) = iter.next_entry()? {
                match key {
                    "seconds" => seconds = Some(value.s64()?),
                    "nanos" => nanos = Some(value.s64()?),
                    _ => value.skip()?,
                }
            }
            let seconds = seconds.ok_or(Error::MissingEntry("seconds"))?;
            let nanos = nanos.ok_or(Error::MissingEntry("nanos"))?;
            let delta = delta_from_parts(seconds, nanos).ok_or(Error::OutOfRange)?;
            Literal::primitive(Primitive::Duration(delta))
        }
        "blob" => {
            let mut iter = body.map()?;
            let (uri, ty) = read_blob_type(&mut iter)?;
            let uri = uri.ok_or(Error::MissingEntry("uri"))?;
            Literal::blob(Blob::new(uri, ty))
        }
        "collection" => {
            let mut list = body.list()?;
            let mut items = Vec::new();
            while let Some(mut item) = list.next_item()? {
                items.push(decode_literal_impl(&mut item, depth + 1)?);
            }
            Literal::Collection(items)
        }
        "mapping" | "record" => {
            let mut entries = BTreeMap::new();
            let mut iter = body.map()?;
            while let Some((key, mut value)) = iter.next_entry()? {
                entries.insert(key.to_string(), decode_literal_impl(&mut value, depth + 1)?);
            }
            if name == "mapping" {
                Literal::Mapping(entries)
            } else {
                Literal::Record(entries)
            }
        }
        "union" => {
            let mut ty = None;
            let mut value = None;
            let mut iter = body.map()?;
            while let Some((key, mut entry)) = iter.next_entry()? {
                match key {
                    "type" => ty = Some(decode_wire_type_impl(&mut entry, depth + 1)?),
                    "value" => value = Some(decode_literal_impl(&mut entry, depth + 1)?),
                    _ => entry.skip()?,
                }
            }
            let ty = ty.ok_or(Error::MissingEntry("type"))?;
            let value = value.ok_or(Error::MissingEntry("value"))?;
            Literal::union(ty, value)
        }
        other => return Err(Error::UnknownVariant(other.to_string())),
    };
    Ok(lit)
}

// ============================================================================
//  CONVENIENCE
// ============================================================================

impl WireType {
    /// Serializes this descriptor to interchange bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut enc = Encoder::new();
        encode_wire_type(&mut enc, self)?;
        enc.into_bytes()
    }

    /// Parses a descriptor, rejecting trailing bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut dec = Decoder::new(bytes);
        let ty = decode_wire_type(&mut dec)?;
        if dec.remaining() != 0 {
            return Err(Error::InvalidTag(bytes[bytes.len() - dec.remaining()]));
        }
        Ok(ty)
    }
}

impl Literal {
    /// Serializes this literal to interchange bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut enc = Encoder::new();
        encode_literal(&mut enc, self)?;
        enc.into_bytes()
    }

    /// Parses a literal, rejecting trailing bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut dec = Decoder::new(bytes);
        let lit = decode_literal(&mut dec)?;
        if dec.remaining() != 0 {
            return Err(Error::InvalidTag(bytes[bytes.len() - dec.remaining()]));
        }
        Ok(lit)
    }
}

// Helpers for map construction
fn write_map_str(enc: &mut Encoder, key: &str, val: &str) -> Result<()> {
    enc.variant_begin(key)?;
    enc.str(val)?;
    enc.variant_end()
}

fn write_map_s64(enc: &mut Encoder, key: &str, val: i64) -> Result<()> {
    enc.variant_begin(key)?;
    enc.s64(val)?;
    enc.variant_end()
}

/// Reads `format`/`dimensionality` (and `uri`, when present) from a blob map.
fn read_blob_type(iter: &mut MapIter) -> Result<(Option<String>, BlobType)> {
    let mut uri = None;
    let mut format = None;
    let mut dimensionality = None;
    while let Some((key, mut value)) = iter.next_entry()? {
        match key {
            "uri" => uri = Some(value.str()?.to_string()),
            "format" => format = Some(value.str()?.to_string()),
            "dimensionality" => {
                let raw = value.str()?;
                let dim = Dimensionality::from_name(raw)
                    .ok_or_else(|| Error::UnknownVariant(raw.to_string()))?;
                dimensionality = Some(dim);
            }
            _ => value.skip()?,
        }
    }
    let format = format.ok_or(Error::MissingEntry("format"))?;
    let dimensionality = dimensionality.ok_or(Error::MissingEntry("dimensionality"))?;
    Ok((uri, BlobType::new(format, dimensionality)))
}
