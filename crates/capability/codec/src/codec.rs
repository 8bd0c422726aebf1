//! 解码与编码。

use crate::error::CodecError;
use crate::order::{bytes_to_registers, registers_to_bytes, swap_words};
use crate::spec::CodecSpec;
use domain::{StringLayout, Value, ValueType, WordOrder};

/// 2^63，整数折叠的上界。
const I64_LIMIT: f64 = 9_223_372_036_854_775_808.0;

/// 把寄存器解码为点位值。
///
/// 取整规则：设置了 `precision` 时四舍五入并始终返回 `Value::Float`；
/// 未设置时整数类型的缩放结果若无小数部分则折叠为整数，浮点类型保持浮点。
pub fn decode(registers: &[u16], spec: &CodecSpec) -> Result<Value, CodecError> {
    spec.validate()?;
    if registers.len() != usize::from(spec.register_count) {
        return Err(CodecError::LengthMismatch {
            expected: spec.register_count,
            actual: registers.len(),
        });
    }

    let bytes = ordered_bytes(registers, spec);
    let value = match spec.value_type {
        ValueType::Int => {
            let raw = sign_extend(be_u64(&bytes), spec.bits());
            if spec.is_exact() {
                Value::Int(raw)
            } else {
                present(raw as f64 * spec.scaling + spec.offset, spec)
            }
        }
        ValueType::UInt => {
            let raw = be_u64(&bytes);
            if spec.is_exact() {
                Value::UInt(raw)
            } else {
                present(raw as f64 * spec.scaling + spec.offset, spec)
            }
        }
        ValueType::Float => {
            let raw = if spec.register_count == 2 {
                let mut buf = [0u8; 4];
                buf.copy_from_slice(&bytes[..4]);
                f64::from(f32::from_be_bytes(buf))
            } else {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&bytes[..8]);
                f64::from_be_bytes(buf)
            };
            let scaled = raw * spec.scaling + spec.offset;
            match spec.precision {
                Some(places) => Value::Float(round_to(scaled, places)),
                None => Value::Float(scaled),
            }
        }
        ValueType::String => Value::Text(decode_text(&bytes, spec.string_layout)),
    };
    Ok(value)
}

/// 把点位值编码为寄存器，`decode` 的逆过程。
pub fn encode(value: &Value, spec: &CodecSpec) -> Result<Vec<u16>, CodecError> {
    spec.validate()?;
    let mut bytes = match spec.value_type {
        ValueType::Int | ValueType::UInt => encode_integer(value, spec)?,
        ValueType::Float => encode_float(value, spec)?,
        ValueType::String => encode_text(value, spec)?,
    };
    if spec.word_order == WordOrder::Swap && spec.register_count > 1 {
        swap_words(&mut bytes);
    }
    Ok(bytes_to_registers(&bytes, spec.byte_order))
}

fn ordered_bytes(registers: &[u16], spec: &CodecSpec) -> Vec<u8> {
    let mut bytes = registers_to_bytes(registers, spec.byte_order);
    if spec.word_order == WordOrder::Swap && spec.register_count > 1 {
        swap_words(&mut bytes);
    }
    bytes
}

fn be_u64(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte))
}

fn sign_extend(raw: u64, bits: u32) -> i64 {
    if bits >= 64 {
        return raw as i64;
    }
    let shift = 64 - bits;
    ((raw << shift) as i64) >> shift
}

/// 整数类型缩放后的取值：有精度时取整为 Float；无精度时小数部分为 0 则折叠为整数。
/// Float 类型不经过这里，无精度时始终保持 Float。
fn present(scaled: f64, spec: &CodecSpec) -> Value {
    if let Some(places) = spec.precision {
        return Value::Float(round_to(scaled, places));
    }
    if scaled.fract() == 0.0 && scaled.abs() < I64_LIMIT {
        if spec.value_type == ValueType::UInt && scaled >= 0.0 {
            return Value::UInt(scaled as u64);
        }
        return Value::Int(scaled as i64);
    }
    Value::Float(scaled)
}

fn round_to(value: f64, places: u8) -> f64 {
    let factor = 10f64.powi(i32::from(places));
    let rounded = (value * factor).round() / factor;
    if rounded.is_finite() { rounded } else { value }
}

fn decode_text(bytes: &[u8], layout: StringLayout) -> String {
    let mut text = String::new();
    for pair in bytes.chunks_exact(2) {
        let code = match layout {
            StringLayout::PerRegister => u32::from(u16::from_be_bytes([pair[0], pair[1]])),
            StringLayout::LowByte => u32::from(pair[1]),
        };
        if code == 0 {
            break;
        }
        text.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
    }
    text
}

fn numeric(value: &Value, spec: &CodecSpec) -> Result<f64, CodecError> {
    value.as_f64().ok_or_else(|| CodecError::TypeMismatch {
        value: format!("{value:?}"),
        expected: spec.value_type,
    })
}

fn overflow(value: &Value, spec: &CodecSpec) -> CodecError {
    CodecError::Overflow {
        value: value.to_string(),
        value_type: spec.value_type,
        count: spec.register_count,
    }
}

fn encode_integer(value: &Value, spec: &CodecSpec) -> Result<Vec<u8>, CodecError> {
    let target: i128 = match (value, spec.is_exact()) {
        (Value::Int(v), true) => i128::from(*v),
        (Value::UInt(v), true) => i128::from(*v),
        _ => {
            let unscaled = ((numeric(value, spec)? - spec.offset) / spec.scaling).round();
            if !unscaled.is_finite() || unscaled.abs() > 1e30 {
                return Err(overflow(value, spec));
            }
            unscaled as i128
        }
    };

    let bits = spec.bits();
    let mask = (1i128 << bits) - 1;
    // 有符号类型允许 [-2^(n-1), 2^n - 1]：超过有符号上限的部分按补码回绕
    let min = match spec.value_type {
        ValueType::Int => -(1i128 << (bits - 1)),
        _ => 0,
    };
    if target < min || target > mask {
        return Err(overflow(value, spec));
    }

    let raw = (target & mask) as u64;
    let width = usize::from(spec.register_count) * 2;
    Ok(raw.to_be_bytes()[8 - width..].to_vec())
}

fn encode_float(value: &Value, spec: &CodecSpec) -> Result<Vec<u8>, CodecError> {
    let unscaled = (numeric(value, spec)? - spec.offset) / spec.scaling;
    if spec.register_count == 2 {
        let narrowed = unscaled as f32;
        if unscaled.is_finite() && !narrowed.is_finite() {
            return Err(overflow(value, spec));
        }
        Ok(narrowed.to_be_bytes().to_vec())
    } else {
        Ok(unscaled.to_be_bytes().to_vec())
    }
}

fn encode_text(value: &Value, spec: &CodecSpec) -> Result<Vec<u8>, CodecError> {
    let Value::Text(text) = value else {
        return Err(CodecError::TypeMismatch {
            value: format!("{value:?}"),
            expected: spec.value_type,
        });
    };
    let width = usize::from(spec.register_count);
    if text.chars().count() > width {
        return Err(overflow(value, spec));
    }

    let mut bytes = Vec::with_capacity(width * 2);
    for ch in text.chars() {
        let code = u32::from(ch);
        if code == 0 {
            return Err(CodecError::InvalidText("embedded NUL".to_string()));
        }
        match spec.string_layout {
            StringLayout::PerRegister => {
                let unit = u16::try_from(code).map_err(|_| {
                    CodecError::InvalidText(format!("{ch:?} does not fit in one register"))
                })?;
                bytes.extend_from_slice(&unit.to_be_bytes());
            }
            StringLayout::LowByte => {
                let byte = u8::try_from(code).map_err(|_| {
                    CodecError::InvalidText(format!("{ch:?} does not fit in one byte"))
                })?;
                bytes.extend_from_slice(&[0, byte]);
            }
        }
    }
    bytes.resize(width * 2, 0);
    Ok(bytes)
}
