use litpack::Literal;
use litpack::PrimitiveKind;
use litpack::UnionType;
use litpack::WireType;

use crate::error::Error;
use crate::error::Result;
use crate::host::GenericOrigin;
use crate::host::HostType;
use crate::transformer::Context;
use crate::transformer::HostKey;
use crate::transformer::Transformer;
use crate::value::Value;

/// How a union annotation is actually handled.
enum Shape<'a> {
    /// A single member: the union is just that type.
    Plain(&'a HostType),
    /// One member plus `none`: tag-free optional.
    Optional(&'a HostType),
    Tagged(&'a [HostType]),
}

fn shape(members: &[HostType]) -> Shape<'_> {
    let mut rest = members.iter().filter(|m| !m.is_none());
    let has_none = members.iter().any(HostType::is_none);
    match (rest.next(), rest.next(), has_none, members.len()) {
        (Some(only), None, true, _) => Shape::Optional(only),
        (Some(only), None, false, 1) => Shape::Plain(only),
        _ => Shape::Tagged(members),
    }
}

/// Errors that mean "this member does not fit", as opposed to real failures.
fn is_rejection(e: &Error) -> bool {
    matches!(
        e,
        Error::TypeMismatch { .. }
            | Error::MissingField { .. }
            | Error::UnexpectedField { .. }
            | Error::NoMatchingUnionMember { .. }
    )
}

// ============================================================================
//  OPTIONAL
// ============================================================================

/// `Optional[T]`: described as `T | none`, encoded without a union tag.
pub struct OptionalTransformer;

impl OptionalTransformer {
    fn inner(ty: &HostType) -> Result<&HostType> {
        match ty {
            HostType::Optional(inner) => Ok(inner),
            other => Err(Error::UnsupportedType(other.to_string())),
        }
    }

    fn describe_inner(cx: &Context, inner: &HostType) -> Result<WireType> {
        let none = WireType::Primitive(PrimitiveKind::None);
        Ok(match cx.describe(inner)? {
            // Optional[Union[..]] flattens into the union.
            WireType::Union(u) => {
                let tag_field = u.tag_field.clone();
                let members = u.members.into_iter().chain(std::iter::once(none));
                WireType::Union(UnionType::new(members).with_tag_field(tag_field))
            }
            other => WireType::optional(other),
        })
    }

    fn check_inner(cx: &Context, inner: &HostType, value: &Value) -> Result<()> {
        match value {
            Value::None => Ok(()),
            other => cx.check(inner, other),
        }
    }

    fn encode_inner(cx: &Context, inner: &HostType, value: &Value) -> Result<Literal> {
        match value {
            Value::None => Ok(Literal::none()),
            other => cx.encode(other, inner, &cx.describe(inner)?),
        }
    }

    fn decode_inner(cx: &Context, inner: &HostType, literal: &Literal) -> Result<Value> {
        if literal.is_none() {
            Ok(Value::None)
        } else {
            cx.decode(literal, inner)
        }
    }
}

impl Transformer for OptionalTransformer {
    fn name(&self) -> &str {
        "optional"
    }

    fn key(&self) -> HostKey {
        HostKey::Origin(GenericOrigin::Optional)
    }

    fn describe(&self, cx: &Context, ty: &HostType) -> Result<WireType> {
        Self::describe_inner(cx, Self::inner(ty)?)
    }

    fn check_value(&self, cx: &Context, ty: &HostType, value: &Value) -> Result<()> {
        Self::check_inner(cx, Self::inner(ty)?, value)
    }

    fn encode(&self, cx: &Context, value: &Value, ty: &HostType, _expected: &WireType) -> Result<Literal> {
        Self::encode_inner(cx, Self::inner(ty)?, value)
    }

    fn decode(&self, cx: &Context, literal: &Literal, ty: &HostType) -> Result<Value> {
        Self::decode_inner(cx, Self::inner(ty)?, literal)
    }

    fn infer_host_type(&self, cx: &Context, wire: &WireType) -> Result<HostType> {
        match wire {
            WireType::Union(u) => match u.optional_inner() {
                Some(inner) => Ok(HostType::optional(cx.infer(inner)?)),
                None => Err(Error::UnsupportedType(wire.to_string())),
            },
            other => Err(Error::UnsupportedType(other.to_string())),
        }
    }
}

// ============================================================================
//  UNION
// ============================================================================

/// Tagged unions. Encoding picks the first member that accepts the value.
pub struct UnionTransformer;

impl UnionTransformer {
    fn members(ty: &HostType) -> Result<&[HostType]> {
        match ty {
            HostType::Union(members) if !members.is_empty() => Ok(members),
            other => Err(Error::UnsupportedType(other.to_string())),
        }
    }

    fn describe_tagged(cx: &Context, members: &[HostType]) -> Result<WireType> {
        let mut wires: Vec<WireType> = Vec::with_capacity(members.len());
        for member in members {
            let wire = cx.describe(member)?;
            if let Some(i) = wires.iter().position(|w| *w == wire) {
                return Err(Error::AmbiguousType {
                    wire: wire.to_string(),
                    candidates: vec![members[i].to_string(), member.to_string()],
                });
            }
            wires.push(wire);
        }
        Ok(WireType::Union(UnionType::new(wires)))
    }

    fn encode_tagged(cx: &Context, members: &[HostType], ty: &HostType, value: &Value) -> Result<Literal> {
        for member in members {
            match cx.check(member, value) {
                Ok(()) => {
                    let wire = cx.describe(member)?;
                    let literal = cx.encode(value, member, &wire)?;
                    return Ok(Literal::union(wire, literal));
                }
                Err(e) if is_rejection(&e) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(Error::NoMatchingUnionMember {
            path: cx.path().clone(),
            union: ty.to_string(),
            found: value.describe(),
        })
    }

    fn decode_tagged(cx: &Context, members: &[HostType], ty: &HostType, literal: &Literal) -> Result<Value> {
        if let Literal::Union(uv) = literal {
            for member in members {
                if cx.describe(member)? == uv.ty {
                    return cx.decode(&uv.value, member);
                }
            }
            return Err(Error::Decode {
                path: cx.path().clone(),
                expected: ty.to_string(),
                found: format!("union member {}", uv.ty),
            });
        }

        // Untagged literals from older writers: accept when exactly one member fits.
        let mut fitting = Vec::new();
        for member in members {
            if literal.conforms_to(&cx.describe(member)?) {
                fitting.push(member);
            }
        }
        match fitting.as_slice() {
            [only] => cx.decode(literal, only),
            _ => Err(cx.decode_error(ty, literal)),
        }
    }
}

impl Transformer for UnionTransformer {
    fn name(&self) -> &str {
        "union"
    }

    fn key(&self) -> HostKey {
        HostKey::Origin(GenericOrigin::Union)
    }

    fn describe(&self, cx: &Context, ty: &HostType) -> Result<WireType> {
        match shape(Self::members(ty)?) {
            Shape::Plain(only) => cx.describe(only),
            Shape::Optional(inner) => OptionalTransformer::describe_inner(cx, inner),
            Shape::Tagged(members) => Self::describe_tagged(cx, members),
        }
    }

    fn check_value(&self, cx: &Context, ty: &HostType, value: &Value) -> Result<()> {
        let members = match shape(Self::members(ty)?) {
            Shape::Plain(only) => return cx.check(only, value),
            Shape::Optional(inner) => return OptionalTransformer::check_inner(cx, inner, value),
            Shape::Tagged(members) => members,
        };
        for member in members {
            match cx.check(member, value) {
                Ok(()) => return Ok(()),
                Err(e) if is_rejection(&e) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(Error::NoMatchingUnionMember {
            path: cx.path().clone(),
            union: ty.to_string(),
            found: value.describe(),
        })
    }

    fn encode(&self, cx: &Context, value: &Value, ty: &HostType, expected: &WireType) -> Result<Literal> {
        match shape(Self::members(ty)?) {
            Shape::Plain(only) => cx.encode(value, only, expected),
            Shape::Optional(inner) => OptionalTransformer::encode_inner(cx, inner, value),
            Shape::Tagged(members) => Self::encode_tagged(cx, members, ty, value),
        }
    }

    fn decode(&self, cx: &Context, literal: &Literal, ty: &HostType) -> Result<Value> {
        match shape(Self::members(ty)?) {
            Shape::Plain(only) => cx.decode(literal, only),
            Shape::Optional(inner) => OptionalTransformer::decode_inner(cx, inner, literal),
            Shape::Tagged(members) => Self::decode_tagged(cx, members, ty, literal),
        }
    }

    fn infer_host_type(&self, cx: &Context, wire: &WireType) -> Result<HostType> {
        match wire {
            WireType::Union(u) => match u.optional_inner() {
                Some(inner) => Ok(HostType::optional(cx.infer(inner)?)),
                None => {
                    let members = u.members.iter().map(|m| cx.infer(m)).collect::<Result<Vec<_>>>()?;
                    Ok(HostType::Union(members))
                }
            },
            other => Err(Error::UnsupportedType(other.to_string())),
        }
    }
}
