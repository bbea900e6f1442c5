// ABOUTME: Native standard-library shims: math, getch, clear and input

use crate::error::{CirnoError, EvalError};
use crate::interp::{Interp, NativeCtx};
use crate::value::Value;
use std::io::{BufRead, Read};

/// Script-side prototypes for the native shims. Natives are registered
/// signatureless; these bodyless forward declarations give them their
/// parameter lists and return types.
pub const PRELUDE: &str = include_str!("prelude.crn");

/// Bind every shim and run the prelude so scripts can call them.
pub fn install(interp: &mut Interp) -> Result<(), CirnoError> {
    register_math(interp);
    register_stdlib(interp);
    interp.run_source(PRELUDE, "<prelude>")
}

/// f32 math: sin, cos, pow, sqrt.
pub fn register_math(interp: &mut Interp) {
    interp.bind("sin", native_sin);
    interp.bind("cos", native_cos);
    interp.bind("pow", native_pow);
    interp.bind("sqrt", native_sqrt);
}

/// Console shims: getch, clear, input.
pub fn register_stdlib(interp: &mut Interp) {
    interp.bind("getch", native_getch);
    interp.bind("clear", native_clear);
    interp.bind("input", native_input);
}

fn native_sin(ctx: &mut NativeCtx) -> Result<Value, EvalError> {
    let theta = ctx.arg_f32("theta")?;
    Ok(Value::from_f32(theta.sin()))
}

fn native_cos(ctx: &mut NativeCtx) -> Result<Value, EvalError> {
    let theta = ctx.arg_f32("theta")?;
    Ok(Value::from_f32(theta.cos()))
}

fn native_pow(ctx: &mut NativeCtx) -> Result<Value, EvalError> {
    let x = ctx.arg_f32("x")?;
    let y = ctx.arg_f32("y")?;
    Ok(Value::from_f32(x.powf(y)))
}

fn native_sqrt(ctx: &mut NativeCtx) -> Result<Value, EvalError> {
    let x = ctx.arg_f32("x")?;
    Ok(Value::from_f32(x.sqrt()))
}

/// Read one byte from stdin; -1 at end of input.
fn native_getch(_ctx: &mut NativeCtx) -> Result<Value, EvalError> {
    let mut byte = [0u8; 1];
    let n = std::io::stdin().read(&mut byte).unwrap_or(0);
    Ok(Value::from_i32(if n == 0 { -1 } else { byte[0] as i32 }))
}

fn native_clear(ctx: &mut NativeCtx) -> Result<Value, EvalError> {
    ctx.write("\x1b[2J\x1b[1;1H");
    Ok(Value::none())
}

/// Print the prompt, read one line, return it without the trailing newline.
fn native_input(ctx: &mut NativeCtx) -> Result<Value, EvalError> {
    let prompt = ctx.arg_str("prompt")?;
    ctx.write(&prompt);

    let mut line = String::new();
    let _ = std::io::stdin().lock().read_line(&mut line);
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(ctx.alloc_string(&line))
}
