use std::collections::BTreeMap;

use chrono::DateTime;
use chrono::TimeDelta;

use crate::*;

fn record_type() -> WireType {
    WireType::Record(RecordType::new(vec![
        Field::new("name", WireType::Primitive(PrimitiveKind::String)),
        Field::new("tags", WireType::collection(WireType::Primitive(PrimitiveKind::String))),
        Field::new("score", WireType::optional(WireType::Primitive(PrimitiveKind::Float))),
    ]))
}

// ============================================================================
//  CODEC STRUCTURE
// ============================================================================

#[test]
fn test_integer_literal_bytes_are_stable() -> Result<()> {
    let bytes = Literal::integer(7).to_bytes()?;
    let mut expected = vec![0x33, 0x15, 0, 0, 0, 0x10, 7, 0, 0, 0];
    expected.extend_from_slice(b"integer");
    expected.extend_from_slice(&[0x0A, 7, 0, 0, 0, 0, 0, 0, 0]);
    assert_eq!(bytes, expected);
    Ok(())
}

#[test]
fn test_map_rejects_non_variant_entries() -> Result<()> {
    let mut enc = Encoder::new();
    enc.map_begin()?;
    assert_eq!(enc.s64(1), Err(Error::InvalidMapEntry));
    Ok(())
}

#[test]
fn test_variant_requires_exactly_one_payload() -> Result<()> {
    let mut enc = Encoder::new();
    enc.variant_begin("v")?;
    assert_eq!(enc.variant_end(), Err(Error::EmptyVariant));
    enc.unit()?;
    assert_eq!(enc.unit(), Err(Error::TooManyItems));
    enc.variant_end()?;
    Ok(())
}

#[test]
fn test_open_scope_blocks_finalization() -> Result<()> {
    let mut enc = Encoder::new();
    enc.list_begin()?;
    assert!(matches!(enc.into_bytes(), Err(Error::ScopeStillOpen)));
    Ok(())
}

#[test]
fn test_scope_mismatch_is_reported() -> Result<()> {
    let mut enc = Encoder::new();
    enc.list_begin()?;
    assert_eq!(
        enc.map_end(),
        Err(Error::ScopeMismatch { expected: codec::Scope::Map, actual: codec::Scope::List })
    );
    enc.list_end()?;
    assert_eq!(enc.list_end(), Err(Error::ScopeUnderflow));
    Ok(())
}

#[test]
fn test_skip_walks_nested_containers() -> Result<()> {
    let mut enc = Encoder::new();
    enc.list_begin()?;
    enc.str("a")?;
    enc.map_begin()?;
    enc.variant_begin("k")?;
    enc.f64(1.5)?;
    enc.variant_end()?;
    enc.map_end()?;
    enc.list_end()?;
    enc.bool(true)?;
    let bytes = enc.into_bytes()?;

    let mut dec = Decoder::new(&bytes);
    dec.skip()?;
    assert!(dec.bool()?);
    assert_eq!(dec.remaining(), 0);
    Ok(())
}

#[test]
fn test_truncated_input_fails() -> Result<()> {
    let bytes = Literal::string("hello").to_bytes()?;
    let cut = &bytes[..bytes.len() - 2];
    assert_eq!(Literal::from_bytes(cut), Err(Error::UnexpectedEnd));
    Ok(())
}

#[test]
fn test_invalid_tag_byte() {
    assert_eq!(Decoder::new(&[0xFF]).peek_tag(), Err(Error::InvalidTag(0xFF)));
}

// ============================================================================
//  INTERCHANGE
// ============================================================================

#[test]
fn test_record_type_roundtrip_keeps_field_order() -> Result<()> {
    let ty = record_type();
    let back = WireType::from_bytes(&ty.to_bytes()?)?;
    assert_eq!(back, ty);

    let WireType::Record(r) = back else { panic!("expected record") };
    let names: Vec<_> = r.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["name", "tags", "score"]);
    Ok(())
}

#[test]
fn test_blob_and_union_types_roundtrip() -> Result<()> {
    let ty = WireType::mapping(WireType::Union(
        UnionType::new([
            WireType::Blob(BlobType::multipart("parquet")),
            WireType::Primitive(PrimitiveKind::Integer),
        ])
        .with_tag_field("kind"),
    ));
    assert_eq!(WireType::from_bytes(&ty.to_bytes()?)?, ty);
    Ok(())
}

#[test]
fn test_nested_literal_roundtrip() -> Result<()> {
    let ts = DateTime::from_timestamp(1_700_000_000, 123_456_789).expect("valid timestamp");
    let mut fields = BTreeMap::new();
    fields.insert("when".to_string(), Literal::primitive(Primitive::Datetime(ts)));
    fields.insert(
        "took".to_string(),
        Literal::primitive(Primitive::Duration(TimeDelta::milliseconds(-1_500))),
    );
    fields.insert("raw".to_string(), Literal::primitive(Primitive::Binary(vec![0, 1, 2])));
    fields.insert(
        "file".to_string(),
        Literal::blob(Blob::new("memory://raw/ab/x.csv", BlobType::single("csv"))),
    );
    fields.insert(
        "pick".to_string(),
        Literal::union(WireType::Primitive(PrimitiveKind::String), Literal::string("x")),
    );
    fields.insert("nothing".to_string(), Literal::none());
    let lit = Literal::Collection(vec![Literal::Record(fields), Literal::Collection(vec![])]);

    assert_eq!(Literal::from_bytes(&lit.to_bytes()?)?, lit);
    Ok(())
}

#[test]
fn test_unknown_variant_is_rejected() -> Result<()> {
    let mut enc = Encoder::new();
    enc.variant_begin("tensor")?;
    enc.unit()?;
    enc.variant_end()?;
    let bytes = enc.into_bytes()?;
    assert_eq!(Literal::from_bytes(&bytes), Err(Error::UnknownVariant("tensor".into())));
    Ok(())
}

#[test]
fn test_decoder_bounds_nesting() -> Result<()> {
    let mut enc = Encoder::new();
    for _ in 0..(wire::MAX_DEPTH + 2) {
        enc.variant_begin("collection")?;
    }
    enc.variant_begin("primitive")?;
    enc.str("integer")?;
    enc.variant_end()?;
    for _ in 0..(wire::MAX_DEPTH + 2) {
        enc.variant_end()?;
    }
    let bytes = enc.into_bytes()?;
    assert_eq!(WireType::from_bytes(&bytes), Err(Error::RecursionLimitExceeded));
    Ok(())
}

#[test]
fn test_trailing_bytes_are_rejected() -> Result<()> {
    let mut bytes = Literal::boolean(true).to_bytes()?;
    bytes.push(0x0E);
    assert!(Literal::from_bytes(&bytes).is_err());
    Ok(())
}

// ============================================================================
//  MODEL
// ============================================================================

#[test]
fn test_union_members_are_an_ordered_set() {
    let int = WireType::Primitive(PrimitiveKind::Integer);
    let string = WireType::Primitive(PrimitiveKind::String);
    let u = UnionType::new([int.clone(), string.clone(), int.clone()]);
    assert_eq!(u.members, vec![int, string]);
    assert_eq!(u.tag_field, DEFAULT_TAG_FIELD);
}

#[test]
fn test_optional_inner() {
    let int = WireType::Primitive(PrimitiveKind::Integer);
    let WireType::Union(u) = WireType::optional(int.clone()) else { panic!("expected union") };
    assert_eq!(u.optional_inner(), Some(&int));

    let plain = UnionType::new([int, WireType::Primitive(PrimitiveKind::String)]);
    assert_eq!(plain.optional_inner(), None);
}

#[test]
fn test_conformance() {
    let ty = record_type();
    let mut fields = BTreeMap::new();
    fields.insert("name".to_string(), Literal::string("a"));
    fields.insert("tags".to_string(), Literal::Collection(vec![Literal::string("t")]));
    fields.insert("score".to_string(), Literal::none());
    let lit = Literal::Record(fields.clone());
    assert!(lit.conforms_to(&ty));

    // Optionals travel untagged.
    fields.insert("score".to_string(), Literal::float(0.5));
    assert!(Literal::Record(fields.clone()).conforms_to(&ty));

    fields.insert("score".to_string(), Literal::integer(1));
    assert!(!Literal::Record(fields.clone()).conforms_to(&ty));

    fields.remove("name");
    assert!(!Literal::Record(fields).conforms_to(&ty));

    let any_blob = WireType::Blob(BlobType::single(""));
    let csv = Literal::blob(Blob::new("memory://x", BlobType::single("csv")));
    assert!(csv.conforms_to(&any_blob));
    assert!(!csv.conforms_to(&WireType::Blob(BlobType::multipart(""))));
}

#[test]
fn test_json_interchange_uses_snake_case_tags() {
    let ty = WireType::collection(WireType::Primitive(PrimitiveKind::Integer));
    let json = serde_json::to_value(&ty).expect("serialize");
    assert_eq!(json, serde_json::json!({ "collection": { "primitive": "integer" } }));

    let lit = Literal::primitive(Primitive::Duration(TimeDelta::seconds(90)));
    let text = serde_json::to_string(&lit).expect("serialize");
    let back: Literal = serde_json::from_str(&text).expect("deserialize");
    assert_eq!(back, lit);
}
