//! Type descriptors: the static side of the model.
//!
//! Descriptors are immutable once built. Every constructor validates, so a
//! `Union` or `Intersection` in hand always has at least two structurally
//! distinct members, and a `Shape` never declares the same field twice.
//!
//! Rendering (`Display`) is TypeScript-flavoured and round-trips through
//! [`crate::syntax::parse_type`].
use std::fmt;

use indexmap::IndexMap;
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, TypeError};
use crate::value::{KindSet, ValueKind};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// The closed set of primitive names. There is deliberately no `any`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive { String, Number, Boolean, Null }

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDescriptor {
    Primitive(Primitive),
    Union(Union),
    Intersection(Intersection),
    Shape(Shape),
    Array(Box<TypeDescriptor>),
}

/// `A | B | ...`, members in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Union { members: Vec<TypeDescriptor> }

/// `A & B & ...`, members in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intersection { members: Vec<TypeDescriptor> }

/// `{ name: T; ... }`. Equality ignores field order; rendering keeps it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Shape { fields: IndexMap<String, TypeDescriptor> }

// ————————————————————————————————————————————————————————————————————————————
// CONSTRUCTION
// ————————————————————————————————————————————————————————————————————————————

impl Primitive {
    pub fn name(self) -> &'static str {
        match self {
            Primitive::String  => "string",
            Primitive::Number  => "number",
            Primitive::Boolean => "boolean",
            Primitive::Null    => "null",
        }
    }

    pub fn kind(self) -> ValueKind {
        match self {
            Primitive::String  => ValueKind::String,
            Primitive::Number  => ValueKind::Number,
            Primitive::Boolean => ValueKind::Boolean,
            Primitive::Null    => ValueKind::Null,
        }
    }
}

impl std::str::FromStr for Primitive {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "string"  => Ok(Primitive::String),
            "number"  => Ok(Primitive::Number),
            "boolean" => Ok(Primitive::Boolean),
            "null"    => Ok(Primitive::Null),
            other => Err(TypeError::invalid(format!(
                "unknown primitive `{other}` (expected string, number, boolean or null)"
            ))),
        }
    }
}

/// Drop structural duplicates (first occurrence wins) and enforce arity.
fn distinct_members(what: &str, members: impl IntoIterator<Item = TypeDescriptor>) -> Result<Vec<TypeDescriptor>> {
    let mut out: Vec<TypeDescriptor> = Vec::new();
    for m in members {
        if !out.contains(&m) {
            out.push(m);
        }
    }
    if out.len() < 2 {
        return Err(TypeError::invalid(format!(
            "{what} needs at least 2 distinct members, got {}",
            out.len()
        )));
    }
    Ok(out)
}

impl Union {
    pub fn new(members: impl IntoIterator<Item = TypeDescriptor>) -> Result<Self> {
        Ok(Union { members: distinct_members("union", members)? })
    }
    pub fn members(&self) -> &[TypeDescriptor] { &self.members }
}

impl Intersection {
    pub fn new(members: impl IntoIterator<Item = TypeDescriptor>) -> Result<Self> {
        Ok(Intersection { members: distinct_members("intersection", members)? })
    }
    pub fn members(&self) -> &[TypeDescriptor] { &self.members }
}

impl Shape {
    pub fn new<K: Into<String>>(fields: impl IntoIterator<Item = (K, TypeDescriptor)>) -> Result<Self> {
        let mut map = IndexMap::new();
        for (name, ty) in fields {
            let name = name.into();
            if map.contains_key(&name) {
                return Err(TypeError::invalid(format!("shape declares field `{name}` more than once")));
            }
            map.insert(name, ty);
        }
        Ok(Shape { fields: map })
    }
    pub fn fields(&self) -> impl Iterator<Item = (&str, &TypeDescriptor)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
    pub fn get(&self, name: &str) -> Option<&TypeDescriptor> { self.fields.get(name) }
    pub fn contains(&self, name: &str) -> bool { self.fields.contains_key(name) }
}

impl TypeDescriptor {
    pub fn string() -> Self { TypeDescriptor::Primitive(Primitive::String) }
    pub fn number() -> Self { TypeDescriptor::Primitive(Primitive::Number) }
    pub fn boolean() -> Self { TypeDescriptor::Primitive(Primitive::Boolean) }
    pub fn null() -> Self { TypeDescriptor::Primitive(Primitive::Null) }

    /// `Primitive(name)`; unknown names are an `InvalidDescriptor`.
    pub fn primitive(name: &str) -> Result<Self> {
        Ok(TypeDescriptor::Primitive(name.parse()?))
    }
    pub fn union(members: impl IntoIterator<Item = TypeDescriptor>) -> Result<Self> {
        Ok(TypeDescriptor::Union(Union::new(members)?))
    }
    pub fn intersection(members: impl IntoIterator<Item = TypeDescriptor>) -> Result<Self> {
        Ok(TypeDescriptor::Intersection(Intersection::new(members)?))
    }
    pub fn shape<K: Into<String>>(fields: impl IntoIterator<Item = (K, TypeDescriptor)>) -> Result<Self> {
        Ok(TypeDescriptor::Shape(Shape::new(fields)?))
    }
    pub fn array(element: TypeDescriptor) -> Self {
        TypeDescriptor::Array(Box::new(element))
    }

    pub fn as_union(&self) -> Option<&Union> {
        match self {
            TypeDescriptor::Union(u) => Some(u),
            _ => None,
        }
    }

    /// Runtime kinds a value of this type can have. Empty means uninhabited.
    pub fn kinds(&self) -> KindSet {
        match self {
            TypeDescriptor::Primitive(p) => KindSet::of(p.kind()),
            TypeDescriptor::Union(u) => u.members.iter().fold(KindSet::EMPTY, |acc, m| acc.union(m.kinds())),
            TypeDescriptor::Intersection(i) => i.members.iter().fold(KindSet::FULL, |acc, m| acc.intersect(m.kinds())),
            TypeDescriptor::Shape(_) => KindSet::of(ValueKind::Object),
            TypeDescriptor::Array(_) => KindSet::of(ValueKind::Array),
        }
    }

    /// Whether the type mentions `field` in some object shape it can take.
    pub fn declares_field(&self, field: &str) -> bool {
        match self {
            TypeDescriptor::Shape(s) => s.contains(field),
            TypeDescriptor::Union(u) => u.members.iter().any(|m| m.declares_field(field)),
            TypeDescriptor::Intersection(i) => i.members.iter().any(|m| m.declares_field(field)),
            TypeDescriptor::Primitive(_) | TypeDescriptor::Array(_) => false,
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            TypeDescriptor::Union(_) => 0,
            TypeDescriptor::Intersection(_) => 1,
            _ => 2,
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// RENDERING
// ————————————————————————————————————————————————————————————————————————————

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TypeDescriptor {
    fn fmt_at(&self, f: &mut fmt::Formatter<'_>, min_prec: u8) -> fmt::Result {
        if self.precedence() < min_prec {
            f.write_str("(")?;
            self.fmt_at(f, 0)?;
            return f.write_str(")");
        }
        match self {
            TypeDescriptor::Primitive(p) => write!(f, "{p}"),
            TypeDescriptor::Union(u) => fmt_joined(f, &u.members, " | ", 1),
            TypeDescriptor::Intersection(i) => fmt_joined(f, &i.members, " & ", 2),
            TypeDescriptor::Shape(s) => write!(f, "{s}"),
            TypeDescriptor::Array(el) => {
                el.fmt_at(f, 2)?;
                f.write_str("[]")
            }
        }
    }
}

fn fmt_joined(f: &mut fmt::Formatter<'_>, members: &[TypeDescriptor], sep: &str, min_prec: u8) -> fmt::Result {
    for (i, m) in members.iter().enumerate() {
        if i > 0 { f.write_str(sep)?; }
        m.fmt_at(f, min_prec)?;
    }
    Ok(())
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_at(f, 0)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fields.is_empty() {
            return f.write_str("{}");
        }
        f.write_str("{ ")?;
        for (i, (name, ty)) in self.fields.iter().enumerate() {
            if i > 0 { f.write_str("; ")?; }
            if is_plain_ident(name) {
                write!(f, "{name}: {ty}")?;
            } else {
                // JSON string escaping is also what the parser accepts back
                write!(f, "{}: {ty}", serde_json::Value::from(name.as_str()))?;
            }
        }
        f.write_str(" }")
    }
}

fn is_plain_ident(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

impl fmt::Display for Union {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_joined(f, &self.members, " | ", 1)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// JSON FORM
// ————————————————————————————————————————————————————————————————————————————
//
//   "string" | {"union": [..]} | {"intersection": [..]} | {"shape": {..}} | {"array": ..}

const COMPOUND_KEYS: &[&str] = &["union", "intersection", "shape", "array"];

impl Serialize for TypeDescriptor {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            TypeDescriptor::Primitive(p) => serializer.serialize_str(p.name()),
            TypeDescriptor::Union(u) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("union", &u.members)?;
                map.end()
            }
            TypeDescriptor::Intersection(i) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("intersection", &i.members)?;
                map.end()
            }
            TypeDescriptor::Shape(s) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("shape", &s.fields)?;
                map.end()
            }
            TypeDescriptor::Array(el) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("array", el.as_ref())?;
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for TypeDescriptor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(DescriptorVisitor)
    }
}

struct DescriptorVisitor;

impl<'de> Visitor<'de> for DescriptorVisitor {
    type Value = TypeDescriptor;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a primitive name or a single-key object (union, intersection, shape, array)")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Self::Value, E> {
        TypeDescriptor::primitive(v).map_err(E::custom)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Self::Value, A::Error> {
        let key: String = map
            .next_key()?
            .ok_or_else(|| de::Error::custom("empty descriptor object"))?;
        let desc = match key.as_str() {
            "union" => {
                let members: Vec<TypeDescriptor> = map.next_value()?;
                TypeDescriptor::union(members).map_err(de::Error::custom)?
            }
            "intersection" => {
                let members: Vec<TypeDescriptor> = map.next_value()?;
                TypeDescriptor::intersection(members).map_err(de::Error::custom)?
            }
            "shape" => {
                let FieldList(fields) = map.next_value()?;
                TypeDescriptor::shape(fields).map_err(de::Error::custom)?
            }
            "array" => TypeDescriptor::array(map.next_value()?),
            other => return Err(de::Error::unknown_field(other, COMPOUND_KEYS)),
        };
        if let Some(extra) = map.next_key::<String>()? {
            return Err(de::Error::custom(format!(
                "descriptor object must have exactly one key, found extra `{extra}`"
            )));
        }
        Ok(desc)
    }
}

/// Shape fields as written, so duplicate keys reach `Shape::new` instead of
/// silently overwriting each other.
struct FieldList(Vec<(String, TypeDescriptor)>);

impl<'de> Deserialize<'de> for FieldList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct FieldListVisitor;

        impl<'de> Visitor<'de> for FieldListVisitor {
            type Value = FieldList;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object mapping field names to descriptors")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<FieldList, A::Error> {
                let mut out = Vec::new();
                while let Some((k, v)) = map.next_entry::<String, TypeDescriptor>()? {
                    out.push((k, v));
                }
                Ok(FieldList(out))
            }
        }

        deserializer.deserialize_map(FieldListVisitor)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;

    fn person() -> TypeDescriptor {
        TypeDescriptor::shape([("name", TypeDescriptor::string())]).unwrap()
    }

    #[test]
    fn single_member_union_is_invalid() {
        let err = TypeDescriptor::union([TypeDescriptor::string()]).unwrap_err();
        assert_eq!(err.error_name(), "InvalidDescriptor");
        assert!(TypeDescriptor::intersection(Vec::new()).is_err());
    }

    #[test]
    fn duplicates_collapse_before_the_arity_check() {
        let u = Union::new([
            TypeDescriptor::string(),
            TypeDescriptor::number(),
            TypeDescriptor::string(),
        ]).unwrap();
        assert_eq!(u.members(), &[TypeDescriptor::string(), TypeDescriptor::number()]);

        let err = TypeDescriptor::union([TypeDescriptor::string(), TypeDescriptor::string()]);
        assert!(matches!(err, Err(TypeError::InvalidDescriptor { .. })));
    }

    #[test]
    fn shape_equality_ignores_field_order() {
        let a = TypeDescriptor::shape([("x", TypeDescriptor::number()), ("y", TypeDescriptor::string())]).unwrap();
        let b = TypeDescriptor::shape([("y", TypeDescriptor::string()), ("x", TypeDescriptor::number())]).unwrap();
        assert_eq!(a, b);
        // so a union of the two is a single member
        assert!(TypeDescriptor::union([a, b]).is_err());
    }

    #[test]
    fn shape_rejects_repeated_fields() {
        let err = Shape::new([("a", TypeDescriptor::null()), ("a", TypeDescriptor::null())]).unwrap_err();
        assert!(err.to_string().contains("`a`"));
    }

    #[test]
    fn unknown_primitive_is_invalid() {
        assert!(TypeDescriptor::primitive("any").is_err());
        assert_eq!(TypeDescriptor::primitive("boolean").unwrap(), TypeDescriptor::boolean());
    }

    #[test]
    fn rendering_is_typescript_like() {
        let u = TypeDescriptor::union([TypeDescriptor::string(), TypeDescriptor::number()]).unwrap();
        assert_eq!(u.to_string(), "string | number");

        let company = TypeDescriptor::shape([("company", TypeDescriptor::string())]).unwrap();
        let i = TypeDescriptor::intersection([person(), company]).unwrap();
        assert_eq!(i.to_string(), "{ name: string } & { company: string }");

        let arr = TypeDescriptor::array(u.clone());
        assert_eq!(arr.to_string(), "(string | number)[]");

        let mixed = TypeDescriptor::intersection([u, person()]).unwrap();
        assert_eq!(mixed.to_string(), "(string | number) & { name: string }");

        let odd = TypeDescriptor::shape([("first name", TypeDescriptor::string())]).unwrap();
        assert_eq!(odd.to_string(), "{ \"first name\": string }");
        assert_eq!(TypeDescriptor::shape(Vec::<(String, _)>::new()).unwrap().to_string(), "{}");
    }

    #[test]
    fn kinds_of_compound_types() {
        let u = TypeDescriptor::union([TypeDescriptor::string(), person()]).unwrap();
        assert!(u.kinds().contains(ValueKind::String));
        assert!(u.kinds().contains(ValueKind::Object));

        let never = TypeDescriptor::intersection([TypeDescriptor::string(), TypeDescriptor::number()]).unwrap();
        assert!(never.kinds().is_empty());
        assert!(u.declares_field("name"));
        assert!(!u.declares_field("company"));
    }

    #[test]
    fn json_form_loads_and_validates() {
        let src = serde_json::json!({
            "intersection": [
                {"shape": {"name": "string"}},
                {"shape": {"tags": {"array": "string"}}}
            ]
        });
        let d: TypeDescriptor = serde_json::from_value(src.clone()).unwrap();
        assert_eq!(d.to_string(), "{ name: string } & { tags: string[] }");
        assert_eq!(serde_json::to_value(&d).unwrap(), src);

        let bad = serde_json::json!({"union": ["string"]});
        let err = serde_json::from_value::<TypeDescriptor>(bad).unwrap_err();
        assert!(err.to_string().contains("at least 2"));

        let bad = serde_json::json!({"shape": {"a": "string"}, "array": "string"});
        assert!(serde_json::from_value::<TypeDescriptor>(bad).is_err());

        let bad = serde_json::json!("any");
        assert!(serde_json::from_value::<TypeDescriptor>(bad).is_err());
    }

    #[test]
    fn json_form_rejects_duplicate_shape_fields() {
        let src = r#"{"shape": {"a": "string", "a": "number"}}"#;
        let err = serde_json::from_str::<TypeDescriptor>(src).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }
}
