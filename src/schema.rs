//! JSON Schema view of a descriptor.
//!
//! Unions map to `oneOf`, intersections to `allOf`, shapes to `object` with
//! every declared field `required` (extra properties stay allowed, matching
//! the structural checker).
use serde_json::{json, Map, Value};

use crate::descriptor::{Primitive, TypeDescriptor};

pub fn schema_for(desc: &TypeDescriptor) -> Value {
    match desc {
        TypeDescriptor::Primitive(p) => primitive_schema(*p),
        TypeDescriptor::Union(u) => {
            json!({ "oneOf": u.members().iter().map(schema_for).collect::<Vec<_>>() })
        }
        TypeDescriptor::Intersection(i) => {
            json!({ "allOf": i.members().iter().map(schema_for).collect::<Vec<_>>() })
        }
        TypeDescriptor::Shape(s) => {
            let mut props = Map::new();
            let mut required = Vec::new();
            for (name, ty) in s.fields() {
                props.insert(name.to_string(), schema_for(ty));
                required.push(Value::from(name));
            }
            let mut o = json!({ "type": "object", "properties": props });
            if !required.is_empty() {
                o["required"] = Value::Array(required);
            }
            o
        }
        TypeDescriptor::Array(el) => json!({ "type": "array", "items": schema_for(el) }),
    }
}

fn primitive_schema(p: Primitive) -> Value {
    json!({ "type": p.name() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_type;

    #[test]
    fn unions_and_intersections() {
        let ty = parse_type("string | number").unwrap();
        assert_eq!(schema_for(&ty), json!({"oneOf": [{"type": "string"}, {"type": "number"}]}));

        let ty = parse_type("{ name: string } & { company: string }").unwrap();
        let schema = schema_for(&ty);
        assert_eq!(schema["allOf"][0]["required"], json!(["name"]));
        assert_eq!(schema["allOf"][1]["properties"]["company"], json!({"type": "string"}));
    }

    #[test]
    fn arrays_and_empty_shapes() {
        let ty = parse_type("{}[]").unwrap();
        assert_eq!(
            schema_for(&ty),
            json!({"type": "array", "items": {"type": "object", "properties": {}}})
        );
        assert_eq!(schema_for(&TypeDescriptor::null()), json!({"type": "null"}));
    }
}
