//! Expression evaluation, builtins and argument conversion for device calls.

use std::fmt;
use std::time::Duration;

use itertools::Itertools;

use crate::emulator::color;
use crate::emulator::framebuffer::MAX_TEXT_SIZE;
use crate::emulator::{Button, DeviceOp, Emulator};
use crate::script::ast::{BinaryOp, Builtin, DeviceMethod, Expr, FormatPart, UnaryOp};
use crate::value::Value;

use super::Context;

/// Something a statement asked for that cannot be done. Reported to the child as a
/// program fault on the statement's line.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeError {
    DivisionByZero,
    NotANumber {
        what: &'static str,
        value: String,
    },
    BreakOutsideLoop,
    ContinueOutsideLoop,
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RuntimeError::DivisionByZero => write!(f, "you can't divide by zero"),
            RuntimeError::NotANumber { what, value } =>
                write!(f, "`{}` needs a number, but got \"{}\"", what, value),
            RuntimeError::BreakOutsideLoop => write!(f, "`break` only works inside a loop"),
            RuntimeError::ContinueOutsideLoop => write!(f, "`continue` only works inside a loop"),
        }
    }
}

type Result<T> = std::result::Result<T, RuntimeError>;

/// Numeric view of `value`, failing for text that is not a number.
pub fn number(value: &Value, what: &'static str) -> Result<f64> {
    value.as_number().ok_or_else(|| RuntimeError::NotANumber {
        what,
        value: value.to_text(),
    })
}

/// Reads a variable. Unset names fall back to the named colours and then to
/// [Value::Empty].
pub fn lookup(ctx: &Context, name: &str) -> Value {
    match ctx.variables.get(name) {
        Some(value) => value.clone(),
        None => color::named(name)
            .map(|c| Value::Number(c as f64))
            .unwrap_or(Value::Empty),
    }
}

pub fn evaluate(expr: &Expr, ctx: &Context, device: &Emulator) -> Result<Value> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Variable(name) => Ok(lookup(ctx, name)),
        Expr::Format(parts) => {
            let mut out = String::new();

            for part in parts {
                match part {
                    FormatPart::Text(text) => out.push_str(text),
                    FormatPart::Hole(expr) => out.push_str(&evaluate(expr, ctx, device)?.to_text()),
                }
            }

            Ok(Value::Text(out))
        },
        Expr::Unary { op: UnaryOp::Negate, operand } => {
            let value = evaluate(operand, ctx, device)?;
            Ok(Value::Number(-number(&value, "-")?))
        },
        Expr::Unary { op: UnaryOp::Not, operand } => {
            Ok(Value::Boolean(!evaluate(operand, ctx, device)?.is_truthy()))
        },
        Expr::Binary { op: BinaryOp::And, left, right } => {
            let left = evaluate(left, ctx, device)?;

            if !left.is_truthy() {
                return Ok(left);
            }

            evaluate(right, ctx, device)
        },
        Expr::Binary { op: BinaryOp::Or, left, right } => {
            let left = evaluate(left, ctx, device)?;

            if left.is_truthy() {
                return Ok(left);
            }

            evaluate(right, ctx, device)
        },
        Expr::Binary { op, left, right } => {
            let left = evaluate(left, ctx, device)?;
            let right = evaluate(right, ctx, device)?;

            binary(*op, left, right)
        },
        Expr::Call { function, args } => {
            let args = args.iter()
                .map(|arg| evaluate(arg, ctx, device))
                .collect::<Result<Vec<_>>>()?;

            call(*function, &args, device)
        },
    }
}

fn symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Subtract => "-",
        BinaryOp::Multiply => "*",
        BinaryOp::Divide => "/",
        BinaryOp::FloorDivide => "//",
        BinaryOp::Modulo => "%",
        BinaryOp::Equal => "==",
        BinaryOp::NotEqual => "!=",
        BinaryOp::Less => "<",
        BinaryOp::LessEqual => "<=",
        BinaryOp::Greater => ">",
        BinaryOp::GreaterEqual => ">=",
        BinaryOp::And => "and",
        BinaryOp::Or => "or",
    }
}

/// Applies a non-short-circuiting binary operator. Also used by augmented assignment.
pub fn binary(op: BinaryOp, left: Value, right: Value) -> Result<Value> {
    match op {
        BinaryOp::Add if left.is_text() || right.is_text() => {
            Ok(Value::Text(left.to_text() + &right.to_text()))
        },
        BinaryOp::Equal => Ok(Value::Boolean(equal(&left, &right))),
        BinaryOp::NotEqual => Ok(Value::Boolean(!equal(&left, &right))),
        BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual => {
            let ordering = match (&left, &right) {
                (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
                _ => number(&left, symbol(op))?.partial_cmp(&number(&right, symbol(op))?),
            };

            let result = match ordering {
                None => false,
                Some(ordering) => match op {
                    BinaryOp::Less => ordering.is_lt(),
                    BinaryOp::LessEqual => ordering.is_le(),
                    BinaryOp::Greater => ordering.is_gt(),
                    _ => ordering.is_ge(),
                },
            };

            Ok(Value::Boolean(result))
        },
        BinaryOp::And => Ok(if left.is_truthy() { right } else { left }),
        BinaryOp::Or => Ok(if left.is_truthy() { left } else { right }),
        _ => {
            let a = number(&left, symbol(op))?;
            let b = number(&right, symbol(op))?;

            let result = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Subtract => a - b,
                BinaryOp::Multiply => a * b,
                BinaryOp::Divide if b == 0.0 => return Err(RuntimeError::DivisionByZero),
                BinaryOp::Divide => a / b,
                BinaryOp::FloorDivide if b == 0.0 => return Err(RuntimeError::DivisionByZero),
                BinaryOp::FloorDivide => (a / b).floor(),
                BinaryOp::Modulo if b == 0.0 => return Err(RuntimeError::DivisionByZero),
                // the result takes the sign of the divisor
                _ => a - b * (a / b).floor(),
            };

            Ok(Value::Number(result))
        },
    }
}

/// Equality: text only equals text, everything else compares numerically.
fn equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Text(a), Value::Text(b)) => a == b,
        (Value::Text(a), Value::Empty) | (Value::Empty, Value::Text(a)) => a.is_empty(),
        (Value::Text(_), _) | (_, Value::Text(_)) => false,
        _ => left.as_number() == right.as_number(),
    }
}

fn button_of(value: &Value) -> Option<Button> {
    match value {
        Value::Text(name) => match name.trim() {
            "A" | "a" => Some(Button::A),
            "B" | "b" => Some(Button::B),
            _ => None,
        },
        other => match other.as_number() {
            Some(n) if n == 0.0 => Some(Button::A),
            Some(n) if n == 1.0 => Some(Button::B),
            _ => None,
        },
    }
}

/// Calls a builtin. The argument count has been checked by the parser.
fn call(function: Builtin, args: &[Value], device: &Emulator) -> Result<Value> {
    let name = function.name();

    let value = match function {
        Builtin::Str => Value::Text(args[0].to_text()),
        Builtin::Int => Value::Number(number(&args[0], name)?.trunc()),
        Builtin::Abs => Value::Number(number(&args[0], name)?.abs()),
        Builtin::Min => Value::Number(number(&args[0], name)?.min(number(&args[1], name)?)),
        Builtin::Max => Value::Number(number(&args[0], name)?.max(number(&args[1], name)?)),
        Builtin::ReadButton => Value::Boolean(
            button_of(&args[0])
                .map(|button| device.button(button))
                .unwrap_or(false),
        ),
        Builtin::ButtonA => Value::Boolean(device.button(Button::A)),
        Builtin::ButtonB => Value::Boolean(device.button(Button::B)),
        Builtin::ReadTiltX => Value::Number(device.tilt().x),
        Builtin::ReadTiltY => Value::Number(device.tilt().y),
        Builtin::ReadTiltZ => Value::Number(device.tilt().z),
        Builtin::Color565 => Value::Number(color::color565(
            number(&args[0], name)?,
            number(&args[1], name)?,
            number(&args[2], name)?,
        ) as f64),
    };

    Ok(value)
}

/// Converts evaluated arguments of a device call into a [DeviceOp].
pub fn device_op(method: DeviceMethod, args: &[Value]) -> Result<DeviceOp> {
    let name = method.name();

    let int = |i: usize| -> Result<i64> { Ok(number(&args[i], name)? as i64) };
    let colour = |i: usize| -> Result<u16> { Ok(color::from_number(number(&args[i], name)?)) };

    let op = match method {
        DeviceMethod::FillScreen => DeviceOp::FillScreen { color: colour(0)? },
        DeviceMethod::DrawString => DeviceOp::DrawString {
            text: args[0].to_text(),
            x: int(1)?,
            y: int(2)?,
            color: colour(3)?,
            size: match args.get(4) {
                Some(size) => number(size, name)?.max(1.0).min(MAX_TEXT_SIZE as f64) as u8,
                None => 1,
            },
        },
        DeviceMethod::FillRect => DeviceOp::FillRect {
            x: int(0)?,
            y: int(1)?,
            w: int(2)?,
            h: int(3)?,
            color: colour(4)?,
        },
        DeviceMethod::DrawRect => DeviceOp::DrawRect {
            x: int(0)?,
            y: int(1)?,
            w: int(2)?,
            h: int(3)?,
            color: colour(4)?,
        },
        DeviceMethod::FillCircle => DeviceOp::FillCircle {
            x: int(0)?,
            y: int(1)?,
            r: int(2)?,
            color: colour(3)?,
        },
        DeviceMethod::DrawCircle => DeviceOp::DrawCircle {
            x: int(0)?,
            y: int(1)?,
            r: int(2)?,
            color: colour(3)?,
        },
        DeviceMethod::DrawLine => DeviceOp::DrawLine {
            x1: int(0)?,
            y1: int(1)?,
            x2: int(2)?,
            y2: int(3)?,
            color: colour(4)?,
        },
        DeviceMethod::DrawPixel => DeviceOp::DrawPixel {
            x: int(0)?,
            y: int(1)?,
            color: colour(2)?,
        },
        DeviceMethod::Tone => DeviceOp::Tone {
            frequency: number(&args[0], name)?,
            duration: tone_duration(number(&args[1], name)?),
        },
        DeviceMethod::NoTone => DeviceOp::NoTone,
        DeviceMethod::Print => DeviceOp::Print {
            text: args.iter().map(Value::to_text).join(" "),
        },
    };

    Ok(op)
}

/// Length of a tone given in milliseconds. Non-positive and non-finite lengths play
/// until `noTone()`.
fn tone_duration(millis: f64) -> Duration {
    if millis.is_finite() && millis > 0.0 {
        Duration::from_millis(millis.min(std::u32::MAX as f64) as u64)
    } else {
        Duration::from_secs(0)
    }
}
