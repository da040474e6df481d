//! Descriptor inference from sample values.
//!
//! Stream JSON samples in, keep one evidence arm per value kind, and solve to
//! the narrowest `TypeDescriptor` that accepts every sample:
//! - Join ⊔ is associative/commutative/idempotent → order-independent.
//! - Objects keep only fields present in every observed object (there is no
//!   optional-field notion in the descriptor model).
//! - Mixed kinds become a union, in a fixed arm order.
use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::debug;

use crate::descriptor::{Shape, TypeDescriptor};
use crate::error::{Result, TypeError};

// ------------------------------ State ------------------------------------- //

#[derive(Clone, Debug, Default, PartialEq)]
pub struct U {
    pub string: bool,
    pub number: bool,
    pub boolean: bool,
    pub null: bool,
    pub arr: Option<ArrC>,
    pub obj: Option<ObjC>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ArrC {
    /// Joined element evidence; bottom when only empty arrays were seen.
    pub item: Box<U>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObjC {
    pub fields: IndexMap<String, FieldC>,
    pub seen_objects: u64,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldC {
    pub ty: U,
    pub present_in: u64,
}

impl U {
    pub fn empty() -> Self { Self::default() }
    pub fn is_bottom(&self) -> bool {
        !self.string && !self.number && !self.boolean && !self.null
            && self.arr.is_none() && self.obj.is_none()
    }
}

// ------------------------------ Observe ----------------------------------- //

pub fn observe_value(v: &Value) -> U {
    match v {
        Value::Null => U { null: true, ..U::default() },
        Value::Bool(_) => U { boolean: true, ..U::default() },
        Value::Number(_) => U { number: true, ..U::default() },
        Value::String(_) => U { string: true, ..U::default() },
        Value::Array(xs) => {
            let item = xs.iter().fold(U::empty(), |acc, el| join(&acc, &observe_value(el)));
            U { arr: Some(ArrC { item: Box::new(item) }), ..U::default() }
        }
        Value::Object(m) => observe_object(m),
    }
}

fn observe_object(map: &Map<String, Value>) -> U {
    let fields = map.iter()
        .map(|(k, v)| (k.clone(), FieldC { ty: observe_value(v), present_in: 1 }))
        .collect();
    U { obj: Some(ObjC { fields, seen_objects: 1 }), ..U::default() }
}

// -------------------------------- Join (⊔) -------------------------------- //

pub fn join(a: &U, b: &U) -> U {
    U {
        string: a.string || b.string,
        number: a.number || b.number,
        boolean: a.boolean || b.boolean,
        null: a.null || b.null,
        arr: match (&a.arr, &b.arr) {
            (None, None) => None,
            (Some(x), None) | (None, Some(x)) => Some(x.clone()),
            (Some(x), Some(y)) => Some(ArrC { item: Box::new(join(&x.item, &y.item)) }),
        },
        obj: match (&a.obj, &b.obj) {
            (None, None) => None,
            (Some(x), None) | (None, Some(x)) => Some(x.clone()),
            (Some(x), Some(y)) => Some(join_obj(x, y)),
        },
    }
}

fn join_obj(a: &ObjC, b: &ObjC) -> ObjC {
    let mut out = ObjC {
        fields: IndexMap::new(),
        seen_objects: a.seen_objects + b.seen_objects,
    };
    for (k, fa) in &a.fields {
        let merged = match b.fields.get(k) {
            None => fa.clone(),
            Some(fb) => FieldC {
                ty: join(&fa.ty, &fb.ty),
                present_in: fa.present_in + fb.present_in,
            },
        };
        out.fields.insert(k.clone(), merged);
    }
    for (k, fb) in &b.fields {
        if !out.fields.contains_key(k) {
            out.fields.insert(k.clone(), fb.clone());
        }
    }
    out
}

// ------------------------------- Solve ------------------------------------ //

/// Lower evidence to a descriptor. Arm order: string, number, boolean,
/// array, object, null.
pub fn solve(u: &U) -> Result<TypeDescriptor> {
    let mut arms: Vec<TypeDescriptor> = Vec::new();
    if u.string { arms.push(TypeDescriptor::string()); }
    if u.number { arms.push(TypeDescriptor::number()); }
    if u.boolean { arms.push(TypeDescriptor::boolean()); }
    if let Some(arr) = &u.arr {
        if arr.item.is_bottom() {
            return Err(TypeError::invalid("cannot infer the element type of arrays that were always empty"));
        }
        arms.push(TypeDescriptor::array(solve(&arr.item)?));
    }
    if let Some(obj) = &u.obj {
        let mut fields = Vec::new();
        for (name, f) in &obj.fields {
            if f.present_in == obj.seen_objects {
                fields.push((name.clone(), solve(&f.ty)?));
            } else {
                debug!(field = %name, present_in = f.present_in, seen = obj.seen_objects, "dropping optional field");
            }
        }
        arms.push(TypeDescriptor::Shape(Shape::new(fields)?));
    }
    if u.null { arms.push(TypeDescriptor::null()); }

    match arms.len() {
        0 => Err(TypeError::invalid("no samples observed")),
        1 => Ok(arms.remove(0)),
        _ => TypeDescriptor::union(arms),
    }
}

// ------------------------------- Front API -------------------------------- //

#[derive(Debug, Default)]
pub struct Inference { state: U }

impl Inference {
    pub fn new() -> Self { Self { state: U::empty() } }

    pub fn observe_value(&mut self, v: &Value) {
        let obs = observe_value(v);
        self.state = join(&self.state, &obs);
    }

    pub fn solve(&self) -> Result<TypeDescriptor> {
        solve(&self.state)
    }
}

pub fn infer_from_values<'a, I>(values: I) -> Result<TypeDescriptor>
where
    I: IntoIterator<Item = &'a Value>
{
    let mut st = U::empty();
    for v in values {
        st = join(&st, &observe_value(v));
    }
    solve(&st)
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::is_assignable;
    use serde_json::json;

    #[test]
    fn single_primitive() {
        let ty = infer_from_values([&json!("abc")]).unwrap();
        assert_eq!(ty, TypeDescriptor::string());
    }

    #[test]
    fn mixed_kinds_become_a_union() {
        let ty = infer_from_values([&json!(1), &json!(null), &json!("a"), &json!(2)]).unwrap();
        assert_eq!(ty.to_string(), "string | number | null");
    }

    #[test]
    fn objects_keep_only_common_fields() {
        let a = json!({"name": "Carlos", "company": "TechCorp", "age": 30});
        let b = json!({"name": "Ana", "age": "unknown"});
        let ty = infer_from_values([&a, &b]).unwrap();
        assert_eq!(ty.to_string(), "{ name: string; age: string | number }");
        assert!(is_assignable(&a, &ty));
        assert!(is_assignable(&b, &ty));
    }

    #[test]
    fn arrays_join_their_elements() {
        let ty = infer_from_values([&json!([1, 2]), &json!([]), &json!(["x"])]).unwrap();
        assert_eq!(ty.to_string(), "(string | number)[]");
    }

    #[test]
    fn only_empty_arrays_cannot_be_described() {
        let err = infer_from_values([&json!({"tags": []})]).unwrap_err();
        assert_eq!(err.error_name(), "InvalidDescriptor");
        assert!(infer_from_values(std::iter::empty()).is_err());
    }

    #[test]
    fn join_laws_idempotent_commutative_associative() {
        let a = observe_value(&json!({"x": [1, "a"], "y": null}));
        let b = observe_value(&json!({"x": [true]}));
        let c = observe_value(&json!("z"));

        assert_eq!(solve(&join(&a, &a)), solve(&a));
        assert_eq!(solve(&join(&a, &b)), solve(&join(&b, &a)));
        assert_eq!(
            solve(&join(&join(&a, &b), &c)),
            solve(&join(&a, &join(&b, &c))),
        );
    }

    #[test]
    fn every_sample_is_assignable_to_the_result() {
        let samples = vec![
            json!({"kind": "cat", "maullar": true, "lives": 9}),
            json!({"kind": "dog", "ladrar": true, "lives": 1}),
            json!("stray"),
            json!([{"kind": "fish"}]),
        ];
        let mut inf = Inference::new();
        for s in &samples { inf.observe_value(s); }
        let ty = inf.solve().unwrap();
        for s in &samples {
            assert!(is_assignable(s, &ty), "{s} not assignable to {ty}");
        }
    }
}
