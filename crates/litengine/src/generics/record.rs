use std::collections::BTreeMap;
use std::sync::Arc;

use litpack::Field;
use litpack::Literal;
use litpack::RecordType;
use litpack::WireType;
use tracing::trace;

use crate::error::Error;
use crate::error::PathSegment;
use crate::error::Result;
use crate::host::GenericOrigin;
use crate::host::HostType;
use crate::host::RecordSchema;
use crate::host::keys;
use crate::transformer::Context;
use crate::transformer::HostKey;
use crate::transformer::Transformer;
use crate::untyped;
use crate::value::RecordValue;
use crate::value::Value;

/// Records of declared, typed fields.
///
/// Handles inline schemas and named types declared with
/// `Registry::declare_record`. Open records carry undeclared fields through
/// untyped; closed records refuse them on encode and drop them on decode.
/// A named type with no schema of its own uses its nearest declared ancestor's.
pub struct RecordTransformer;

impl RecordTransformer {
    fn schema(cx: &Context, ty: &HostType) -> Result<Arc<RecordSchema>> {
        match ty {
            HostType::Record(schema) => Ok(schema.clone()),
            HostType::Named(key) => cx
                .engine()
                .registry()
                .nearest_record_schema(key)
                .ok_or_else(|| Error::UnsupportedType(ty.to_string())),
            other => Err(Error::UnsupportedType(other.to_string())),
        }
    }

    /// The fields of `value`, once its concrete type is known to fit `schema`.
    fn fields<'v>(cx: &Context, schema: &RecordSchema, value: &'v Value) -> Result<&'v BTreeMap<String, Value>> {
        let record = match value {
            Value::Record(r) => r,
            other => return Err(cx.mismatch(&schema.name, other)),
        };
        if let Some(name) = &record.type_name {
            if !cx.engine().registry().is_subtype(name, &schema.name) {
                return Err(cx.mismatch(&schema.name, value));
            }
        }
        for field in &schema.fields {
            if !record.fields.contains_key(&field.name) {
                return Err(Error::MissingField { path: cx.path().clone(), field: field.name.clone() });
            }
        }
        if !schema.open {
            if let Some(extra) = record.fields.keys().find(|k| schema.get(k).is_none()) {
                return Err(Error::UnexpectedField { path: cx.path().clone(), field: extra.clone() });
            }
        }
        Ok(&record.fields)
    }
}

impl Transformer for RecordTransformer {
    fn name(&self) -> &str {
        "record"
    }

    fn key(&self) -> HostKey {
        HostKey::Origin(GenericOrigin::Record)
    }

    fn describe(&self, cx: &Context, ty: &HostType) -> Result<WireType> {
        let schema = Self::schema(cx, ty)?;
        let mut fields = Vec::with_capacity(schema.fields.len());
        for field in &schema.fields {
            let child = cx.enter(PathSegment::Field(field.name.clone()))?;
            fields.push(Field::new(field.name.clone(), child.describe(&field.ty)?));
        }
        Ok(WireType::Record(RecordType::new(fields)))
    }

    fn check_value(&self, cx: &Context, ty: &HostType, value: &Value) -> Result<()> {
        let schema = Self::schema(cx, ty)?;
        let fields = Self::fields(cx, &schema, value)?;
        for field in &schema.fields {
            if let Some(v) = fields.get(&field.name) {
                cx.enter(PathSegment::Field(field.name.clone()))?.check(&field.ty, v)?;
            }
        }
        Ok(())
    }

    fn encode(&self, cx: &Context, value: &Value, ty: &HostType, expected: &WireType) -> Result<Literal> {
        let schema = Self::schema(cx, ty)?;
        let fields = Self::fields(cx, &schema, value)?;
        let WireType::Record(expected) = expected else {
            return Err(Error::TypeMismatch {
                path: cx.path().clone(),
                expected: "record".into(),
                found: expected.to_string(),
            });
        };

        let mut out = BTreeMap::new();
        for (name, v) in fields {
            let child = cx.enter(PathSegment::Field(name.clone()))?;
            let literal = match (schema.get(name), expected.field(name)) {
                (Some(field_ty), Some(field_wire)) => child.encode(v, field_ty, field_wire)?,
                (Some(field_ty), None) => child.encode(v, field_ty, &child.describe(field_ty)?)?,
                (None, _) => untyped::literal_from_value(v, child.path())?,
            };
            out.insert(name.clone(), literal);
        }
        Ok(Literal::Record(out))
    }

    fn decode(&self, cx: &Context, literal: &Literal, ty: &HostType) -> Result<Value> {
        let schema = Self::schema(cx, ty)?;
        let Literal::Record(entries) = literal else {
            return Err(cx.decode_error(&schema.name, literal));
        };

        let type_name = match ty {
            HostType::Named(key) => key.clone(),
            _ => schema.name.clone(),
        };
        let mut record = RecordValue::new(type_name);
        for field in &schema.fields {
            let child = cx.enter(PathSegment::Field(field.name.clone()))?;
            let lit = entries.get(&field.name).ok_or_else(|| Error::Decode {
                path: child.path().clone(),
                expected: field.ty.to_string(),
                found: "nothing".into(),
            })?;
            record.fields.insert(field.name.clone(), child.decode(lit, &field.ty)?);
        }
        for (name, lit) in entries {
            if schema.get(name).is_some() {
                continue;
            }
            if schema.open {
                record.fields.insert(name.clone(), untyped::value_from_literal(lit));
            } else {
                trace!(record = %schema.name, field = %name, "dropping undeclared field");
            }
        }
        Ok(Value::Record(record))
    }

    fn infer_host_type(&self, cx: &Context, wire: &WireType) -> Result<HostType> {
        let WireType::Record(rt) = wire else {
            return Err(Error::UnsupportedType(wire.to_string()));
        };
        for schema in cx.engine().registry().records() {
            let named = HostType::Named(schema.name.clone());
            if cx.describe(&named).is_ok_and(|w| w == *wire) {
                return Ok(named);
            }
        }
        let mut schema = RecordSchema::new(keys::ANONYMOUS_RECORD);
        for field in &rt.fields {
            schema = schema.field(field.name.clone(), cx.infer(&field.ty)?);
        }
        Ok(HostType::record(schema))
    }
}
