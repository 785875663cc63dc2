use anyhow::{Context, Result, ensure};

use crate::vm::bytecode::BinOp;
use crate::vm::value::Value;

/// `x op y`. Arithmetic wraps in the scalar domain; only the equality
/// operators accept references, which they compare by identity.
pub(super) fn binop(op: BinOp, x: Value, y: Value) -> Result<Value> {
    match op {
        BinOp::Eq => return Ok(Value::bool(x == y)),
        BinOp::Ne => return Ok(Value::bool(x != y)),
        _ => {}
    }
    let a = x.as_int().with_context(|| format!("left operand of {}", op.symbol()))?;
    let b = y.as_int().with_context(|| format!("right operand of {}", op.symbol()))?;
    Ok(match op {
        BinOp::Add => Value::int(a.wrapping_add(b)),
        BinOp::Sub => Value::int(a.wrapping_sub(b)),
        BinOp::Mul => Value::int(a.wrapping_mul(b)),
        BinOp::Div => {
            ensure!(b != 0, "division by zero");
            Value::int(a.wrapping_div(b))
        }
        BinOp::Mod => {
            ensure!(b != 0, "division by zero");
            Value::int(a.wrapping_rem(b))
        }
        BinOp::Lt => Value::bool(a < b),
        BinOp::Le => Value::bool(a <= b),
        BinOp::Gt => Value::bool(a > b),
        BinOp::Ge => Value::bool(a >= b),
        BinOp::And => Value::bool(a != 0 && b != 0),
        BinOp::Or => Value::bool(a != 0 || b != 0),
        BinOp::Eq | BinOp::Ne => unreachable!("handled above"),
    })
}
