use std::fmt::Write as _;

use byterun_core::vm::Value;

use crate::heap::{Heap, Object};
use crate::tag::de_hash;

/// Nesting depth after which aggregates are elided, so cyclic data still prints.
const MAX_DEPTH: usize = 256;

/// Printed form of `v`, as produced by `Lstring`.
pub fn render(heap: &Heap, v: Value) -> String {
    let mut out = String::new();
    render_into(heap, v, &mut out, 0);
    out
}

fn render_into(heap: &Heap, v: Value, out: &mut String, depth: usize) {
    let object = match v {
        Value::Ref(r) => match heap.get(r) {
            Ok(object) => object,
            Err(_) => {
                let _ = write!(out, "<dangling @{}>", r.index());
                return;
            }
        },
        other => {
            let _ = write!(out, "{other}");
            return;
        }
    };
    if depth >= MAX_DEPTH {
        out.push_str("...");
        return;
    }
    match object {
        Object::Str(bytes) => {
            out.push('"');
            out.push_str(&String::from_utf8_lossy(bytes));
            out.push('"');
        }
        Object::Array(items) => {
            out.push('[');
            render_list(heap, items, out, depth);
            out.push(']');
        }
        Object::Sexp { tag, fields } => {
            let name = de_hash(*tag);
            if name == "cons" {
                render_cons(heap, fields, out, depth);
            } else {
                out.push_str(&name);
                if !fields.is_empty() {
                    out.push_str(" (");
                    render_list(heap, fields, out, depth);
                    out.push(')');
                }
            }
        }
        Object::Closure { entry, captured } => {
            let _ = write!(out, "<closure 0x{entry:x}");
            for c in captured {
                out.push_str(", ");
                render_into(heap, *c, out, depth + 1);
            }
            out.push('>');
        }
    }
}

fn render_list(heap: &Heap, items: &[Value], out: &mut String, depth: usize) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        render_into(heap, *item, out, depth + 1);
    }
}

/// `cons(head, tail)` chains print as `{a, b, c}`; the chain ends at the first scalar tail.
fn render_cons(heap: &Heap, fields: &[Value], out: &mut String, depth: usize) {
    out.push('{');
    let mut cell = fields;
    let mut steps = 0;
    while let [head, tail, ..] = cell {
        render_into(heap, *head, out, depth + 1);
        match heap.deref(*tail) {
            Some(Object::Sexp { fields, .. }) => {
                out.push_str(", ");
                if steps >= MAX_DEPTH {
                    out.push_str("...");
                    break;
                }
                cell = fields;
                steps += 1;
            }
            Some(_) => {
                out.push_str(", ");
                render_into(heap, *tail, out, depth + 1);
                break;
            }
            None => break,
        }
    }
    out.push('}');
}
