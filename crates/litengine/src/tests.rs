use std::collections::BTreeMap;

use litpack::BlobType;
use litpack::Literal;
use litpack::PrimitiveKind;
use litpack::WireType;

use crate::*;

/// Encodes everything as its own name, so tests can see who was picked.
struct Marker {
    key: &'static str,
    name: &'static str,
    kind: PrimitiveKind,
}

impl Marker {
    fn new(key: &'static str, name: &'static str) -> Self {
        Self { key, name, kind: PrimitiveKind::String }
    }
}

impl Transformer for Marker {
    fn name(&self) -> &str {
        self.name
    }

    fn key(&self) -> HostKey {
        HostKey::exact(self.key)
    }

    fn describe(&self, _cx: &Context, _ty: &HostType) -> Result<WireType> {
        Ok(WireType::Primitive(self.kind))
    }

    fn check_value(&self, _cx: &Context, _ty: &HostType, _value: &Value) -> Result<()> {
        Ok(())
    }

    fn encode(&self, _cx: &Context, _value: &Value, _ty: &HostType, _expected: &WireType) -> Result<Literal> {
        Ok(Literal::string(self.name))
    }

    fn decode(&self, _cx: &Context, _literal: &Literal, _ty: &HostType) -> Result<Value> {
        Ok(Value::str(self.name))
    }
}

/// Claims one blob format for one key.
struct Claimer {
    key: &'static str,
    blob: BlobType,
}

impl Transformer for Claimer {
    fn name(&self) -> &str {
        self.key
    }

    fn key(&self) -> HostKey {
        HostKey::exact(self.key)
    }

    fn describe(&self, _cx: &Context, _ty: &HostType) -> Result<WireType> {
        Ok(WireType::Blob(self.blob.clone()))
    }

    fn check_value(&self, cx: &Context, _ty: &HostType, value: &Value) -> Result<()> {
        match value {
            Value::Blob(_) => Ok(()),
            other => Err(cx.mismatch(self.key, other)),
        }
    }

    fn encode(&self, cx: &Context, value: &Value, _ty: &HostType, _expected: &WireType) -> Result<Literal> {
        match value {
            Value::Blob(b) => Ok(Literal::blob(b.clone())),
            other => Err(cx.mismatch(self.key, other)),
        }
    }

    fn decode(&self, cx: &Context, literal: &Literal, _ty: &HostType) -> Result<Value> {
        literal
            .as_blob()
            .map(|b| Value::Blob(b.clone()))
            .ok_or_else(|| cx.decode_error(self.key, literal))
    }

    fn infer_host_type(&self, _cx: &Context, _wire: &WireType) -> Result<HostType> {
        Ok(HostType::named(self.key))
    }

    fn blob_formats(&self) -> Vec<BlobType> {
        vec![self.blob.clone()]
    }
}

// ============================================================================
//  PATHS & CONFIG
// ============================================================================

#[test]
fn test_field_path_display() {
    let path = FieldPath::root()
        .child(PathSegment::Field("a".into()))
        .child(PathSegment::Index(2))
        .child(PathSegment::Key("k".into()));
    assert_eq!(path.to_string(), r#"$.a[2]["k"]"#);
    assert_eq!(FieldPath::root().to_string(), "$");
}

#[test]
fn test_config_from_lookup() {
    let vars: BTreeMap<&str, &str> = [
        (config::ENV_MAX_DEPTH, "8"),
        (config::ENV_OUTPUT_PREFIX, "out"),
        (config::ENV_VERIFY_LITERALS, "false"),
    ]
    .into_iter()
    .collect();
    let config = EngineConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
    assert_eq!(config.max_depth, 8);
    assert_eq!(config.output_prefix, "out");
    assert!(!config.verify_literals);
    assert_eq!(config.bridge_thread_name, config::DEFAULT_BRIDGE_THREAD);
}

#[test]
fn test_config_ignores_bad_values() {
    let config = EngineConfig::from_lookup(|k| match k {
        config::ENV_MAX_DEPTH => Some("deep".to_string()),
        config::ENV_VERIFY_LITERALS => Some("maybe".to_string()),
        _ => None,
    });
    assert_eq!(config, EngineConfig::default());

    let zero = EngineConfig::from_lookup(|k| (k == config::ENV_MAX_DEPTH).then(|| "0".to_string()));
    assert_eq!(zero.max_depth, config::DEFAULT_MAX_DEPTH);
}

// ============================================================================
//  REGISTRY
// ============================================================================

#[test]
fn test_builtins_are_protected() {
    let engine = TypeEngine::new();
    let err = engine.register(Marker::new(keys::INT, "fake int"));
    assert!(matches!(err, Err(Error::Protected(_))));
    assert_eq!(engine.resolve(&HostType::int()).map(|t| t.name().to_string()).ok(), Some("int".into()));
}

#[test]
fn test_builtins_cannot_be_unregistered() -> Result<()> {
    let engine = TypeEngine::new();
    let err = engine.unregister(&HostKey::exact(keys::INT));
    assert!(matches!(err, Err(Error::Protected(_))));
    assert_eq!(engine.to_wire_type(&HostType::int())?, WireType::Primitive(PrimitiveKind::Integer));

    // Plugins still come and go.
    engine.register(Marker::new("my.T", "mine"))?;
    assert!(engine.unregister(&HostKey::exact("my.T"))?.is_some());
    assert!(engine.unregister(&HostKey::exact("my.T"))?.is_none());
    Ok(())
}

#[test]
fn test_override_returns_previous() -> Result<()> {
    let engine = TypeEngine::new();
    assert!(engine.register(Marker::new("my.T", "first"))?.is_none());
    let previous = engine.register(Marker::new("my.T", "second"))?;
    assert_eq!(previous.map(|t| t.name().to_string()), Some("first".into()));
    assert_eq!(engine.to_literal(&Value::None, &HostType::named("my.T"))?, Literal::string("second"));

    let registration = engine.registry().get(&HostKey::exact("my.T")).expect("registered");
    assert!(!registration.is_default);
    let int = engine.registry().get(&HostKey::exact(keys::INT)).expect("built in");
    assert!(int.is_default);
    Ok(())
}

#[test]
fn test_ancestors_are_depth_first_left_to_right() {
    let registry = Registry::new();
    registry.declare_parents("D", [TypeKey::new("B"), TypeKey::new("C")]);
    registry.declare_parents("B", [TypeKey::new("A")]);
    registry.declare_parents("C", [TypeKey::new("A")]);
    let names: Vec<String> = registry.ancestors(&TypeKey::new("D")).iter().map(|k| k.to_string()).collect();
    assert_eq!(names, ["B", "A", "C"]);
    assert!(registry.is_subtype(&TypeKey::new("D"), &TypeKey::new("A")));
    assert!(!registry.is_subtype(&TypeKey::new("A"), &TypeKey::new("D")));
}

#[test]
fn test_ancestor_cycles_terminate() {
    let registry = Registry::new();
    registry.declare_parents("X", [TypeKey::new("Y")]);
    registry.declare_parents("Y", [TypeKey::new("X")]);
    assert_eq!(registry.ancestors(&TypeKey::new("X")), vec![TypeKey::new("Y")]);
}

#[test]
fn test_first_registered_ancestor_wins() -> Result<()> {
    let engine = TypeEngine::new();
    engine.register(Marker::new("B", "from B"))?;
    engine.register(Marker::new("C", "from C"))?;
    engine.declare_parents("D", [TypeKey::new("B"), TypeKey::new("C")]);
    let d = HostType::named("D");
    for _ in 0..3 {
        assert_eq!(engine.to_literal(&Value::None, &d)?, Literal::string("from B"));
    }
    Ok(())
}

#[test]
fn test_wildcard_is_last_resort() -> Result<()> {
    let engine = TypeEngine::new();
    let unknown = HostType::named("my.Unknown");
    assert!(matches!(engine.to_wire_type(&unknown), Err(Error::UnsupportedType(_))));

    engine.register_as(HostKey::Wildcard, Marker::new("*", "fallback"))?;
    assert_eq!(engine.to_literal(&Value::None, &unknown)?, Literal::string("fallback"));
    // Built-ins still win.
    assert_eq!(engine.to_literal(&Value::Int(1), &HostType::int())?, Literal::integer(1));

    engine.unregister(&HostKey::Wildcard)?;
    assert!(matches!(engine.to_wire_type(&unknown), Err(Error::UnsupportedType(_))));
    Ok(())
}

#[test]
fn test_registration_invalidates_wire_cache() -> Result<()> {
    let engine = TypeEngine::new();
    let ty = HostType::sequence(HostType::named("my.T"));
    engine.register(Marker::new("my.T", "text"))?;
    assert_eq!(engine.to_wire_type(&ty)?, WireType::collection(WireType::Primitive(PrimitiveKind::String)));

    engine.register(Marker { key: "my.T", name: "number", kind: PrimitiveKind::Integer })?;
    assert_eq!(engine.to_wire_type(&ty)?, WireType::collection(WireType::Primitive(PrimitiveKind::Integer)));
    Ok(())
}

#[test]
fn test_concurrent_overrides_never_serve_partial_or_stale_types() -> Result<()> {
    let engine = TypeEngine::new();
    engine.register(Marker::new("my.T", "string"))?;
    let named = HostType::named("my.T");
    let ty = HostType::sequence(named.clone());
    let strings = WireType::collection(WireType::Primitive(PrimitiveKind::String));
    let integers = WireType::collection(WireType::Primitive(PrimitiveKind::Integer));

    std::thread::scope(|s| {
        for writer in 0..2 {
            let engine = &engine;
            s.spawn(move || {
                for i in 0..200 {
                    let kind = if (i + writer) % 2 == 0 { PrimitiveKind::Integer } else { PrimitiveKind::String };
                    engine.register(Marker { key: "my.T", name: "marker", kind }).expect("override");
                }
            });
        }
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..200 {
                    let wire = engine.to_wire_type(&ty).expect("describe");
                    assert!(wire == strings || wire == integers, "unexpected wire type {}", wire);
                }
            });
        }
    });

    // Whatever registration landed last is what the cache serves.
    let current = engine.resolve(&named)?.describe(&engine.context(), &named)?;
    assert_eq!(engine.to_wire_type(&ty)?, WireType::collection(current));

    engine.register(Marker { key: "my.T", name: "last", kind: PrimitiveKind::Integer })?;
    assert_eq!(engine.to_wire_type(&ty)?, integers);
    Ok(())
}

#[test]
fn test_format_conflicts_are_reported() -> Result<()> {
    let engine = TypeEngine::new();
    engine.register(Claimer { key: "a.Csv", blob: BlobType::single("csv") })?;
    engine.register(Claimer { key: "b.Csv", blob: BlobType::single("csv") })?;

    let conflicts = engine.registry().format_conflicts();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].previous, TypeKey::new("a.Csv"));
    assert_eq!(conflicts[0].current, TypeKey::new("b.Csv"));

    let guessed = engine.guess_host_type(&WireType::Blob(BlobType::single("csv")))?;
    assert_eq!(guessed, HostType::named("b.Csv"));
    Ok(())
}

#[test]
fn test_unclaimed_blob_format_falls_back_to_generic_reference() -> Result<()> {
    let engine = TypeEngine::new();
    assert_eq!(engine.guess_host_type(&WireType::Blob(BlobType::single("parquet")))?, HostType::file());
    assert_eq!(
        engine.guess_host_type(&WireType::Blob(BlobType::multipart("parquet")))?,
        HostType::directory()
    );
    Ok(())
}

#[test]
fn test_unclaimed_blob_format_without_generic_is_ambiguous() -> Result<()> {
    let engine = TypeEngine::builder().without_defaults().build();
    engine.register(Claimer { key: "a.Csv", blob: BlobType::single("csv") })?;
    engine.register(Claimer { key: "b.Tsv", blob: BlobType::single("tsv") })?;

    match engine.guess_host_type(&WireType::Blob(BlobType::single("parquet"))) {
        Err(Error::AmbiguousType { candidates, .. }) => assert_eq!(candidates, ["a.Csv", "b.Tsv"]),
        other => panic!("expected ambiguity, got {:?}", other.map(|t| t.to_string())),
    }
    assert!(matches!(
        engine.guess_host_type(&WireType::Blob(BlobType::multipart("parquet"))),
        Err(Error::UnsupportedType(_))
    ));
    Ok(())
}

#[test]
fn test_unregister_drops_format_claims() -> Result<()> {
    let engine = TypeEngine::new();
    engine.register(Claimer { key: "a.Csv", blob: BlobType::single("csv") })?;
    assert!(engine.unregister(&HostKey::exact("a.Csv"))?.is_some());
    assert_eq!(engine.guess_host_type(&WireType::Blob(BlobType::single("csv")))?, HostType::file());
    Ok(())
}

// ============================================================================
//  LIMITS & HELPERS
// ============================================================================

#[test]
fn test_nesting_limit() {
    let engine = TypeEngine::builder().max_depth(3).build();
    let ty = (0..4).fold(HostType::int(), |t, _| HostType::sequence(t));
    let value = (0..4).fold(Value::Int(1), |v, _| Value::list([v]));
    match engine.to_literal(&value, &ty) {
        Err(Error::RecursionLimitExceeded { path }) => assert_eq!(path.to_string(), "$[0][0][0][0]"),
        other => panic!("expected depth error, got {:?}", other),
    }
}

#[test]
fn test_untyped_roundtrip() -> Result<()> {
    let mut inner = BTreeMap::new();
    inner.insert("xs".to_string(), Value::list([Value::Int(1), Value::Float(2.5)]));
    inner.insert("flag".to_string(), Value::Bool(true));
    let value = Value::Map(inner);

    let literal = untyped::literal_from_value(&value, &FieldPath::root())?;
    assert_eq!(untyped::value_from_literal(&literal), value);

    let empty = Value::stream(Vec::new());
    assert!(matches!(
        untyped::literal_from_value(&empty, &FieldPath::root()),
        Err(Error::EmptyStream { .. })
    ));
    Ok(())
}

#[test]
fn test_stream_failure_ends_the_stream() -> Result<()> {
    let items = vec![
        Ok(Value::Int(1)),
        Err(Error::Decode { path: FieldPath::root(), expected: "int".into(), found: "junk".into() }),
        Ok(Value::Int(3)),
    ];
    let stream = ValueStream::fallible(items);
    assert_eq!(stream.try_next()?, Some(Value::Int(1)));
    assert!(matches!(stream.try_next(), Err(Error::Decode { .. })));
    assert_eq!(stream.try_next()?, None);

    let engine = TypeEngine::new();
    let failing = Value::Stream(ValueStream::fallible(vec![
        Ok(Value::Int(1)),
        Err(Error::Cancelled),
    ]));
    let result = engine.to_literal(&failing, &HostType::sequence(HostType::int()));
    assert!(matches!(result, Err(Error::Cancelled)));
    Ok(())
}

#[test]
fn test_native_roundtrip() -> Result<()> {
    let engine = TypeEngine::new();
    let literal = engine.to_literal_native(vec![Some(1i64), None, Some(3)])?;
    assert_eq!(engine.to_native::<Vec<Option<i64>>>(&literal)?, vec![Some(1), None, Some(3)]);

    let mut scores = std::collections::HashMap::new();
    scores.insert("a".to_string(), 0.5f64);
    let literal = engine.to_literal_native(scores.clone())?;
    assert_eq!(engine.to_native::<std::collections::HashMap<String, f64>>(&literal)?, scores);
    Ok(())
}

#[test]
fn test_native_i32_range_is_checked() {
    assert!(matches!(i32::from_value(Value::Int(1 << 40)), Err(Error::TypeMismatch { .. })));
    assert_eq!(i32::from_value(Value::Int(-5)).ok(), Some(-5));
}

#[test]
fn test_host_type_display() {
    let ty = HostType::mapping(HostType::optional(HostType::union([HostType::int(), HostType::str()])));
    assert_eq!(ty.to_string(), "dict[str, Optional[Union[int, str]]]");
    assert_eq!(HostType::sequence(HostType::bytes()).to_string(), "list[bytes]");
}
