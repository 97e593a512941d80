//! # Always-Present Intrinsics
//!
//! The embedded stdlib (`std:core`, `std:theory`, ...) is ordinary
//! TakoMusic source, but it is written against a small, closed set of
//! host-level building blocks — constructing a `Clip` from a flat event
//! list, reading a `Pitch`'s fields, stepping a PRNG. These are not
//! "native functions" in the host-extension sense described in
//! `SPEC_FULL.md` §4.5 (a handle a later integration could register); they
//! are always present, the same way a language runtime ships `Array.prototype`
//! regardless of what any one library does with it.
//!
//! Each intrinsic is installed into the evaluator's root scope as an
//! ordinary `RuntimeValue::Function(Native)` binding, so a call site never
//! needs to special-case them — `eval_call` dispatches a native exactly
//! like a closure.

use std::rc::Rc;

use crate::error::EvalError;
use crate::pitch::Pitch;
use crate::rational::Rat;

use super::scope::Scope;
use super::value::{
    ClipValue, CurveValue, LyricTokenValue, LyricValue, ObjectMap, RngValue, RuntimeValue,
};

pub fn install(root: &Scope) {
    register(root, "len", len);
    register(root, "floor", floor);
    register(root, "pitchOf", pitch_of);
    register(root, "midiOf", midi_of);
    register(root, "centsOf", cents_of);
    register(root, "clipFromEvents", clip_from_events);
    register(root, "clipEvents", clip_events);
    register(root, "clipLength", clip_length);
    register(root, "lyricOf", lyric_of);
    register(root, "lyricTokens", lyric_tokens);
    register(root, "curveOf", curve_of);
    register(root, "rngNew", rng_new);
    register(root, "rngNext", rng_next);
    register(root, "okOf", ok_of);
    register(root, "errOf", err_of);
    register(root, "isOkOf", is_ok_of);
    register(root, "unwrapOf", unwrap_of);
}

fn register(
    root: &Scope,
    name: &'static str,
    handler: impl Fn(&[RuntimeValue]) -> Result<RuntimeValue, EvalError> + 'static,
) {
    let value = RuntimeValue::Function(Rc::new(super::value::FunctionValue::Native(name, Rc::new(handler))));
    root.declare(name, value, false);
}

fn arg(args: &[RuntimeValue], index: usize, name: &'static str) -> Result<RuntimeValue, EvalError> {
    args.get(index).cloned().ok_or_else(|| EvalError::MissingArgument {
        name: name.to_string(),
        param: format!("arg{}", index),
    })
}

fn expect_int(value: &RuntimeValue, intrinsic: &'static str) -> Result<i64, EvalError> {
    match value {
        RuntimeValue::Int(n) => Ok(*n),
        RuntimeValue::Float(f) => Ok(*f as i64),
        RuntimeValue::Rat(r) if r.d == 1 => Ok(r.n),
        _ => Err(EvalError::InvalidOperation {
            message: format!("{} expected an integer argument, found {}", intrinsic, value.type_name()),
        }),
    }
}

fn expect_number(value: &RuntimeValue, intrinsic: &'static str) -> Result<f64, EvalError> {
    match value {
        RuntimeValue::Int(n) => Ok(*n as f64),
        RuntimeValue::Float(f) => Ok(*f),
        RuntimeValue::Rat(r) => Ok(r.to_f64()),
        _ => Err(EvalError::InvalidOperation {
            message: format!("{} expected a number argument, found {}", intrinsic, value.type_name()),
        }),
    }
}

fn expect_rat(value: &RuntimeValue, intrinsic: &'static str) -> Result<Rat, EvalError> {
    match value {
        RuntimeValue::Rat(r) => Ok(*r),
        RuntimeValue::Int(n) => Ok(Rat::from_int(*n)),
        RuntimeValue::Float(f) => Ok(Rat::from_f64_approx(*f)),
        _ => Err(EvalError::InvalidOperation {
            message: format!("{} expected a Dur argument, found {}", intrinsic, value.type_name()),
        }),
    }
}

fn expect_pitch(value: &RuntimeValue, intrinsic: &'static str) -> Result<Pitch, EvalError> {
    match value {
        RuntimeValue::Pitch(p) => Ok(*p),
        _ => Err(EvalError::InvalidOperation {
            message: format!("{} expected a Pitch argument, found {}", intrinsic, value.type_name()),
        }),
    }
}

fn expect_clip(value: &RuntimeValue, intrinsic: &'static str) -> Result<Rc<ClipValue>, EvalError> {
    match value {
        RuntimeValue::Clip(c) => Ok(Rc::clone(c)),
        _ => Err(EvalError::InvalidOperation {
            message: format!("{} expected a Clip argument, found {}", intrinsic, value.type_name()),
        }),
    }
}

fn len(args: &[RuntimeValue]) -> Result<RuntimeValue, EvalError> {
    match arg(args, 0, "len")? {
        RuntimeValue::Array(items) => Ok(RuntimeValue::Int(items.borrow().len() as i64)),
        RuntimeValue::Object(map) => Ok(RuntimeValue::Int(map.borrow().len() as i64)),
        RuntimeValue::Str(s) => Ok(RuntimeValue::Int(s.chars().count() as i64)),
        other => Err(EvalError::InvalidOperation {
            message: format!("len expected an Array, Object, or String, found {}", other.type_name()),
        }),
    }
}

fn floor(args: &[RuntimeValue]) -> Result<RuntimeValue, EvalError> {
    let value = expect_number(&arg(args, 0, "floor")?, "floor")?;
    Ok(RuntimeValue::Int(value.floor() as i64))
}

fn pitch_of(args: &[RuntimeValue]) -> Result<RuntimeValue, EvalError> {
    let midi = expect_int(&arg(args, 0, "pitchOf")?, "pitchOf")?;
    let cents = expect_int(&arg(args, 1, "pitchOf")?, "pitchOf")?;
    Ok(RuntimeValue::Pitch(Pitch { midi: midi as i32, cents: cents as i32 }))
}

fn midi_of(args: &[RuntimeValue]) -> Result<RuntimeValue, EvalError> {
    let pitch = expect_pitch(&arg(args, 0, "midiOf")?, "midiOf")?;
    Ok(RuntimeValue::Int(pitch.midi as i64))
}

fn cents_of(args: &[RuntimeValue]) -> Result<RuntimeValue, EvalError> {
    let pitch = expect_pitch(&arg(args, 0, "centsOf")?, "centsOf")?;
    Ok(RuntimeValue::Int(pitch.cents as i64))
}

fn clip_from_events(args: &[RuntimeValue]) -> Result<RuntimeValue, EvalError> {
    let events_value = arg(args, 0, "clipFromEvents")?;
    let length = expect_rat(&arg(args, 1, "clipFromEvents")?, "clipFromEvents")?;
    let events = match events_value {
        RuntimeValue::Array(items) => items
            .borrow()
            .iter()
            .map(|item| match item {
                RuntimeValue::Object(map) => Ok(map.borrow().clone()),
                other => Err(EvalError::InvalidOperation {
                    message: format!("clipFromEvents expected an Array of Object, found {}", other.type_name()),
                }),
            })
            .collect::<Result<Vec<ObjectMap>, EvalError>>()?,
        other => {
            return Err(EvalError::InvalidOperation {
                message: format!("clipFromEvents expected an Array, found {}", other.type_name()),
            })
        }
    };
    Ok(RuntimeValue::Clip(Rc::new(ClipValue { events, length: Some(length) })))
}

fn clip_events(args: &[RuntimeValue]) -> Result<RuntimeValue, EvalError> {
    let clip = expect_clip(&arg(args, 0, "clipEvents")?, "clipEvents")?;
    let items = clip.events.iter().map(|ev| RuntimeValue::object(ev.clone())).collect();
    Ok(RuntimeValue::array(items))
}

fn clip_length(args: &[RuntimeValue]) -> Result<RuntimeValue, EvalError> {
    let clip = expect_clip(&arg(args, 0, "clipLength")?, "clipLength")?;
    Ok(RuntimeValue::Rat(clip.length.unwrap_or(Rat::ZERO)))
}

fn lyric_of(args: &[RuntimeValue]) -> Result<RuntimeValue, EvalError> {
    match arg(args, 0, "lyricOf")? {
        RuntimeValue::Str(s) => Ok(RuntimeValue::Lyric(Rc::new(LyricValue { text: s.to_string() }))),
        other => Err(EvalError::InvalidOperation {
            message: format!("lyricOf expected a String, found {}", other.type_name()),
        }),
    }
}

fn lyric_tokens(args: &[RuntimeValue]) -> Result<RuntimeValue, EvalError> {
    match arg(args, 0, "lyricTokens")? {
        RuntimeValue::Lyric(lyric) => {
            let tokens = lyric
                .text
                .split_whitespace()
                .map(|tok| RuntimeValue::LyricToken(Rc::new(LyricTokenValue { text: tok.to_string() })))
                .collect();
            Ok(RuntimeValue::array(tokens))
        }
        other => Err(EvalError::InvalidOperation {
            message: format!("lyricTokens expected a Lyric, found {}", other.type_name()),
        }),
    }
}

fn curve_of(args: &[RuntimeValue]) -> Result<RuntimeValue, EvalError> {
    let points_value = arg(args, 0, "curveOf")?;
    let points = match points_value {
        RuntimeValue::Array(items) => items
            .borrow()
            .iter()
            .map(|item| match item {
                RuntimeValue::Object(map) => {
                    let map = map.borrow();
                    let t = expect_rat(&map.get("t"), "curveOf")?;
                    let v = expect_rat(&map.get("v"), "curveOf")?;
                    Ok((t, v))
                }
                other => Err(EvalError::InvalidOperation {
                    message: format!("curveOf expected an Array of {{t, v}} objects, found {}", other.type_name()),
                }),
            })
            .collect::<Result<Vec<(Rat, Rat)>, EvalError>>()?,
        other => {
            return Err(EvalError::InvalidOperation {
                message: format!("curveOf expected an Array, found {}", other.type_name()),
            })
        }
    };
    Ok(RuntimeValue::Curve(Rc::new(CurveValue { points })))
}

fn rng_new(args: &[RuntimeValue]) -> Result<RuntimeValue, EvalError> {
    let seed = expect_int(&arg(args, 0, "rngNew")?, "rngNew")?;
    Ok(RuntimeValue::Rng(RngValue::seeded(seed)))
}

fn rng_next(args: &[RuntimeValue]) -> Result<RuntimeValue, EvalError> {
    match arg(args, 0, "rngNext")? {
        RuntimeValue::Rng(rng) => {
            let (next, sample) = rng.next();
            Ok(RuntimeValue::array(vec![RuntimeValue::Float(sample), RuntimeValue::Rng(next)]))
        }
        other => Err(EvalError::InvalidOperation {
            message: format!("rngNext expected an Rng, found {}", other.type_name()),
        }),
    }
}

fn ok_of(args: &[RuntimeValue]) -> Result<RuntimeValue, EvalError> {
    let payload = arg(args, 0, "okOf")?;
    Ok(RuntimeValue::EnumVariant(Rc::new(super::value::EnumVariantValue {
        tag: "Ok".to_string(),
        payload,
    })))
}

fn err_of(args: &[RuntimeValue]) -> Result<RuntimeValue, EvalError> {
    let message = arg(args, 0, "errOf")?;
    Ok(RuntimeValue::EnumVariant(Rc::new(super::value::EnumVariantValue {
        tag: "Err".to_string(),
        payload: message,
    })))
}

fn is_ok_of(args: &[RuntimeValue]) -> Result<RuntimeValue, EvalError> {
    match arg(args, 0, "isOkOf")? {
        RuntimeValue::EnumVariant(variant) => Ok(RuntimeValue::Bool(variant.tag == "Ok")),
        other => Err(EvalError::InvalidOperation {
            message: format!("isOkOf expected a Result EnumVariant, found {}", other.type_name()),
        }),
    }
}

fn unwrap_of(args: &[RuntimeValue]) -> Result<RuntimeValue, EvalError> {
    match arg(args, 0, "unwrapOf")? {
        RuntimeValue::EnumVariant(variant) => Ok(variant.payload.clone()),
        other => Err(EvalError::InvalidOperation {
            message: format!("unwrapOf expected a Result EnumVariant, found {}", other.type_name()),
        }),
    }
}
