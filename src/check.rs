//! Compatibility checker: is a runtime value assignable to a descriptor?
//!
//! The boolean answer comes with diagnostics. Semantic problems found along
//! the way (currently only conflicting intersections) are collected rather
//! than returned early, so one pass can report all of them.
use serde_json::Value;
use tracing::{debug, trace};

use crate::descriptor::{Intersection, Shape, TypeDescriptor};
use crate::error::{Result, TypeError};
use crate::value::kind_of;

/// Outcome of [`check`].
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict<'t> {
    pub assignable: bool,
    /// For a union target: the first member (declaration order) that accepted.
    pub matched: Option<&'t TypeDescriptor>,
    /// Deduplicated, in discovery order.
    pub diagnostics: Vec<TypeError>,
}

pub fn is_assignable(value: &Value, target: &TypeDescriptor) -> bool {
    check(value, target).assignable
}

/// Like [`is_assignable`] but surfaces the first diagnostic as an error.
pub fn try_assignable(value: &Value, target: &TypeDescriptor) -> Result<bool> {
    let verdict = check(value, target);
    match verdict.diagnostics.into_iter().next() {
        Some(error) => Err(error),
        None => Ok(verdict.assignable),
    }
}

pub fn check<'t>(value: &Value, target: &'t TypeDescriptor) -> Verdict<'t> {
    let mut cx = Checker::default();
    let (assignable, matched) = match target {
        TypeDescriptor::Union(u) => {
            let hit = cx.first_accepting(value, u.members());
            (hit.is_some(), hit)
        }
        _ => (cx.accepts(value, target), None),
    };
    debug!(%target, assignable, diagnostics = cx.diagnostics.len(), "checked value");
    Verdict { assignable, matched, diagnostics: cx.diagnostics }
}

/// Every `IncompatibleIntersection` inside `target`, without needing a value.
pub fn intersection_conflicts(target: &TypeDescriptor) -> Vec<TypeError> {
    let mut out = Vec::new();
    collect_conflicts(target, &mut out);
    out
}

fn collect_conflicts(target: &TypeDescriptor, out: &mut Vec<TypeError>) {
    match target {
        TypeDescriptor::Primitive(_) => {}
        TypeDescriptor::Union(u) => u.members().iter().for_each(|m| collect_conflicts(m, out)),
        TypeDescriptor::Intersection(i) => {
            for e in conflicts_in(i) {
                push_unique(out, e);
            }
            i.members().iter().for_each(|m| collect_conflicts(m, out));
        }
        TypeDescriptor::Shape(s) => s.fields().for_each(|(_, ty)| collect_conflicts(ty, out)),
        TypeDescriptor::Array(el) => collect_conflicts(el, out),
    }
}

// ————————————————————————————————————————————————————————————————————————————
// CHECKER
// ————————————————————————————————————————————————————————————————————————————

#[derive(Default)]
struct Checker {
    diagnostics: Vec<TypeError>,
}

impl Checker {
    fn accepts(&mut self, value: &Value, target: &TypeDescriptor) -> bool {
        match target {
            TypeDescriptor::Primitive(p) => kind_of(value) == p.kind(),
            TypeDescriptor::Union(u) => self.first_accepting(value, u.members()).is_some(),
            TypeDescriptor::Intersection(i) => self.accepts_all(value, i),
            TypeDescriptor::Shape(s) => self.accepts_shape(value, s),
            TypeDescriptor::Array(el) => match value.as_array() {
                Some(items) => items.iter().all(|item| self.accepts(item, el)),
                None => false,
            },
        }
    }

    fn first_accepting<'t>(&mut self, value: &Value, members: &'t [TypeDescriptor]) -> Option<&'t TypeDescriptor> {
        let hit = members.iter().find(|m| self.accepts(value, m));
        if let Some(m) = hit {
            trace!(member = %m, "union member accepted value");
        }
        hit
    }

    /// No partial credit. Every member is visited so nested diagnostics are
    /// all collected.
    fn accepts_all(&mut self, value: &Value, inter: &Intersection) -> bool {
        let conflicts = conflicts_in(inter);
        let mut ok = conflicts.is_empty();
        for e in conflicts {
            debug!(error = %e, "intersection cannot be satisfied");
            push_unique(&mut self.diagnostics, e);
        }
        for m in inter.members() {
            ok &= self.accepts(value, m);
        }
        ok
    }

    fn accepts_shape(&mut self, value: &Value, shape: &Shape) -> bool {
        let Some(obj) = value.as_object() else {
            return false;
        };
        shape.fields().all(|(name, ty)| match obj.get(name) {
            Some(field) => self.accepts(field, ty),
            None => {
                trace!(field = name, "required field missing");
                false
            }
        })
    }
}

fn push_unique(out: &mut Vec<TypeError>, e: TypeError) {
    if !out.contains(&e) {
        out.push(e);
    }
}

// ————————————————————————————————————————————————————————————————————————————
// SHAPE MERGING
// ————————————————————————————————————————————————————————————————————————————

/// Conflicts between the shape members of one intersection, including shapes
/// reached through nested intersection members.
fn conflicts_in(inter: &Intersection) -> Vec<TypeError> {
    let mut shapes = Vec::new();
    for m in inter.members() {
        flat_shapes(m, &mut shapes);
    }
    let mut out = Vec::new();
    if shapes.len() >= 2 {
        shape_conflicts(&shapes, "", &mut out);
    }
    out
}

/// Merge `shapes` field by field. Two declarations of a field conflict when no
/// runtime kind satisfies both; nested shapes under a shared field are merged
/// recursively with a dotted path.
fn shape_conflicts(shapes: &[&Shape], prefix: &str, out: &mut Vec<TypeError>) {
    let mut names: Vec<&str> = Vec::new();
    for s in shapes {
        for (name, _) in s.fields() {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }

    for name in names {
        let decls: Vec<&TypeDescriptor> = shapes.iter().filter_map(|s| s.get(name)).collect();
        if decls.len() < 2 {
            continue;
        }
        let path = if prefix.is_empty() { name.to_string() } else { format!("{prefix}.{name}") };

        let mut clashed = false;
        for (i, left) in decls.iter().enumerate() {
            for right in &decls[i + 1..] {
                if left.kinds().intersect(right.kinds()).is_empty() {
                    clashed = true;
                    push_unique(out, TypeError::IncompatibleIntersection {
                        field: path.clone(),
                        left: left.to_string(),
                        right: right.to_string(),
                    });
                }
            }
        }
        if clashed {
            continue;
        }

        let mut nested = Vec::new();
        for d in &decls {
            flat_shapes(d, &mut nested);
        }
        if nested.len() >= 2 {
            shape_conflicts(&nested, &path, out);
        }
    }
}

/// Shapes that `desc` contributes to an enclosing intersection. `(A & B) & C`
/// merges exactly like `A & B & C`.
fn flat_shapes<'t>(desc: &'t TypeDescriptor, out: &mut Vec<&'t Shape>) {
    match desc {
        TypeDescriptor::Shape(s) => out.push(s),
        TypeDescriptor::Intersection(i) => {
            for m in i.members() {
                flat_shapes(m, out);
            }
        }
        _ => {}
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn shape(fields: &[(&str, TypeDescriptor)]) -> TypeDescriptor {
        TypeDescriptor::shape(fields.iter().cloned()).unwrap()
    }

    fn string_or_number() -> TypeDescriptor {
        TypeDescriptor::union([TypeDescriptor::string(), TypeDescriptor::number()]).unwrap()
    }

    fn employee() -> TypeDescriptor {
        TypeDescriptor::intersection([
            shape(&[("name", TypeDescriptor::string())]),
            shape(&[("company", TypeDescriptor::string())]),
        ]).unwrap()
    }

    #[test]
    fn primitives_accept_their_own_kind() {
        let cases = [
            (json!("x"), TypeDescriptor::string()),
            (json!(1), TypeDescriptor::number()),
            (json!(2.5), TypeDescriptor::number()),
            (json!(false), TypeDescriptor::boolean()),
            (json!(null), TypeDescriptor::null()),
        ];
        for (value, ty) in &cases {
            assert!(is_assignable(value, ty), "{value} should be a {ty}");
        }
        assert!(!is_assignable(&json!("1"), &TypeDescriptor::number()));
        assert!(!is_assignable(&json!(null), &TypeDescriptor::string()));
    }

    #[test]
    fn string_is_assignable_to_string_or_number() {
        let target = string_or_number();
        let verdict = check(&json!("abc"), &target);
        assert!(verdict.assignable);
        assert_eq!(verdict.matched, Some(&TypeDescriptor::string()));
        assert!(verdict.diagnostics.is_empty());

        let verdict = check(&json!(42), &target);
        assert_eq!(verdict.matched, Some(&TypeDescriptor::number()));
        assert!(!is_assignable(&json!(true), &target));
    }

    #[test]
    fn union_is_monotone_in_its_members() {
        let members = [
            TypeDescriptor::string(),
            shape(&[("id", TypeDescriptor::number())]),
            TypeDescriptor::array(TypeDescriptor::boolean()),
        ];
        let target = TypeDescriptor::union(members.clone()).unwrap();
        let values = [json!("s"), json!({"id": 1, "extra": true}), json!([true, false]), json!([]), json!(null)];
        for m in &members {
            for v in &values {
                if is_assignable(v, m) {
                    assert!(is_assignable(v, &target), "{v} accepted by {m} but not by {target}");
                }
            }
        }
    }

    #[test]
    fn first_matching_member_is_reported() {
        let narrow = shape(&[("name", TypeDescriptor::string())]);
        let wide = shape(&[]);
        let target = TypeDescriptor::union([wide.clone(), narrow]).unwrap();
        let verdict = check(&json!({"name": "Ana"}), &target);
        assert_eq!(verdict.matched, Some(&wide));
    }

    #[test]
    fn employee_intersection() {
        let target = employee();
        assert!(is_assignable(&json!({"name": "Carlos", "company": "TechCorp"}), &target));
        assert!(!is_assignable(&json!({"name": "Carlos"}), &target));
        assert!(!is_assignable(&json!({"name": "Carlos", "company": 7}), &target));
        assert!(!is_assignable(&json!("Carlos"), &target));
    }

    #[test]
    fn intersection_gives_no_partial_credit() {
        let target = employee();
        let values = [
            json!({"name": "a", "company": "b"}),
            json!({"name": "a"}),
            json!({"company": "b"}),
            json!({}),
        ];
        let TypeDescriptor::Intersection(i) = &target else { unreachable!() };
        for v in &values {
            let every = i.members().iter().all(|m| is_assignable(v, m));
            assert_eq!(is_assignable(v, &target), every, "{v}");
        }
    }

    #[test]
    fn conflicting_intersection_is_reported_not_coerced() {
        let target = TypeDescriptor::intersection([
            shape(&[("id", TypeDescriptor::string())]),
            shape(&[("id", TypeDescriptor::number())]),
        ]).unwrap();

        let verdict = check(&json!({"id": "x"}), &target);
        assert!(!verdict.assignable);
        assert_eq!(verdict.diagnostics, vec![TypeError::IncompatibleIntersection {
            field: "id".into(),
            left: "string".into(),
            right: "number".into(),
        }]);
        assert!(matches!(
            try_assignable(&json!({"id": 1}), &target),
            Err(TypeError::IncompatibleIntersection { .. })
        ));
    }

    #[test]
    fn overlapping_field_types_do_not_conflict() {
        let target = TypeDescriptor::intersection([
            shape(&[("id", string_or_number())]),
            shape(&[("id", TypeDescriptor::number())]),
        ]).unwrap();
        assert!(intersection_conflicts(&target).is_empty());
        assert_eq!(try_assignable(&json!({"id": 3}), &target), Ok(true));
        assert_eq!(try_assignable(&json!({"id": "3"}), &target), Ok(false));
    }

    #[test]
    fn nested_shapes_merge_with_dotted_paths() {
        let target = TypeDescriptor::intersection([
            shape(&[("address", shape(&[("zip", TypeDescriptor::string())]))]),
            shape(&[("address", shape(&[("zip", TypeDescriptor::number()), ("city", TypeDescriptor::string())]))]),
        ]).unwrap();
        let conflicts = intersection_conflicts(&target);
        assert_eq!(conflicts.len(), 1);
        assert!(matches!(&conflicts[0], TypeError::IncompatibleIntersection { field, .. } if field == "address.zip"));
    }

    #[test]
    fn grouped_intersections_merge_like_flat_ones() {
        let grouped: TypeDescriptor = "({ id: string } & { x: number }) & { id: number }".parse().unwrap();
        let flat: TypeDescriptor = "{ id: string } & { x: number } & { id: number }".parse().unwrap();
        let value = json!({"id": "a", "x": 1});

        let expected = vec![TypeError::IncompatibleIntersection {
            field: "id".into(),
            left: "string".into(),
            right: "number".into(),
        }];
        assert_eq!(check(&value, &grouped).diagnostics, expected);
        assert_eq!(check(&value, &flat).diagnostics, expected);
        assert_eq!(intersection_conflicts(&grouped), intersection_conflicts(&flat));
        assert!(matches!(
            try_assignable(&value, &grouped),
            Err(TypeError::IncompatibleIntersection { .. })
        ));

        let right_grouped: TypeDescriptor = "{ id: number } & ({ x: number } & { id: string })".parse().unwrap();
        assert_eq!(intersection_conflicts(&right_grouped).len(), 1);
    }

    #[test]
    fn field_declared_as_intersection_is_merged() {
        let target: TypeDescriptor = "{ p: { a: string } } & { p: { a: number } & { b: string } }".parse().unwrap();
        let conflicts = intersection_conflicts(&target);
        assert_eq!(conflicts, vec![TypeError::IncompatibleIntersection {
            field: "p.a".into(),
            left: "string".into(),
            right: "number".into(),
        }]);

        let verdict = check(&json!({"p": {"a": "s", "b": "t"}}), &target);
        assert!(!verdict.assignable);
        assert_eq!(verdict.diagnostics, conflicts);
    }

    #[test]
    fn compatible_grouped_intersection_stays_silent() {
        let target: TypeDescriptor = "({ id: number } & { x: number }) & { p: { a: string } & { b: number } }".parse().unwrap();
        assert!(intersection_conflicts(&target).is_empty());
        assert_eq!(try_assignable(&json!({"id": 1, "x": 2, "p": {"a": "s", "b": 3}}), &target), Ok(true));
        assert_eq!(try_assignable(&json!({"id": 1, "x": 2, "p": {"a": "s"}}), &target), Ok(false));
    }

    #[test]
    fn diagnostics_from_one_pass_are_all_collected() {
        let bad_a = TypeDescriptor::intersection([
            shape(&[("a", TypeDescriptor::string())]),
            shape(&[("a", TypeDescriptor::boolean())]),
        ]).unwrap();
        let bad_b = TypeDescriptor::intersection([
            shape(&[("b", TypeDescriptor::null())]),
            shape(&[("b", TypeDescriptor::number())]),
        ]).unwrap();
        let target = TypeDescriptor::intersection([bad_a, bad_b]).unwrap();
        let verdict = check(&json!({"a": "x", "b": null}), &target);
        assert!(!verdict.assignable);
        assert_eq!(verdict.diagnostics.len(), 2);
        assert_eq!(intersection_conflicts(&target).len(), 2);
    }

    #[test]
    fn shapes_are_structural_and_recursive() {
        let target = shape(&[
            ("name", TypeDescriptor::string()),
            ("pet", shape(&[("sound", TypeDescriptor::string())])),
        ]);
        assert!(is_assignable(&json!({"name": "a", "pet": {"sound": "miau"}, "age": 3}), &target));
        assert!(!is_assignable(&json!({"name": "a", "pet": {}}), &target));
        assert!(!is_assignable(&json!({"name": "a", "pet": null}), &target));
        assert!(!is_assignable(&json!(["name"]), &target));
    }

    #[test]
    fn arrays_check_every_element() {
        let target = TypeDescriptor::array(string_or_number());
        assert!(is_assignable(&json!([]), &target));
        assert!(is_assignable(&json!(["a", 1, "b"]), &target));
        assert!(!is_assignable(&json!(["a", null]), &target));
        assert!(!is_assignable(&json!("a"), &target));
    }

    #[test]
    fn checker_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TypeDescriptor>();

        let target = std::sync::Arc::new(employee());
        let handles: Vec<_> = (0..4).map(|i| {
            let target = std::sync::Arc::clone(&target);
            std::thread::spawn(move || {
                let v = if i % 2 == 0 { json!({"name": "n", "company": "c"}) } else { json!({"name": "n"}) };
                is_assignable(&v, &target)
            })
        }).collect();
        let results: Vec<bool> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results, vec![true, false, true, false]);
    }
}
