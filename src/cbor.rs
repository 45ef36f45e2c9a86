//! Minimal CBOR codec (RFC 7049 subset).
//!
//! Used to talk to a cache/fetch server that speaks a small CBOR subset.
//! Supported major types: 0/1 (uint/negint), 2/3 (byte/text strings,
//! definite and indefinite), 4 (arrays, definite and indefinite), 5 (maps,
//! definite and indefinite), 6 (tags — skipped), 7
//! (bool/null/undefined/simple/half/float32/float64/break). Floats are
//! always emitted as float64 on encode.

use crate::error::CborError;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Uint(u64),
    /// CBOR major type 1: represents the negative integer `-1 - n`.
    NegInt(u64),
    Float(f64),
    Bytes(Vec<u8>),
    Text(String),
    Array(Vec<Value>),
    Map(Vec<(Value, Value)>),
}

impl Value {
    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn map_get(&self, key: &str) -> Option<&Value> {
        self.as_map()?.iter().find_map(|(k, v)| match k {
            Value::Text(s) if s == key => Some(v),
            _ => None,
        })
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Uint(n) => i64::try_from(*n).ok(),
            Value::NegInt(n) => i64::try_from(*n).ok().map(|n| -1 - n),
            _ => None,
        }
    }
}

pub fn encode(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    encode_into(value, &mut out);
    out
}

fn encode_into(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Null => out.push(0xF6),
        Value::Bool(false) => out.push(0xF4),
        Value::Bool(true) => out.push(0xF5),
        Value::Uint(n) => out.extend(encode_type_and_len(0, *n)),
        Value::NegInt(n) => out.extend(encode_type_and_len(1, *n)),
        Value::Float(f) => {
            out.push(0xFB);
            out.extend(f.to_be_bytes());
        }
        Value::Bytes(b) => {
            out.extend(encode_type_and_len(2, b.len() as u64));
            out.extend_from_slice(b);
        }
        Value::Text(s) => {
            let bytes = s.as_bytes();
            out.extend(encode_type_and_len(3, bytes.len() as u64));
            out.extend_from_slice(bytes);
        }
        Value::Array(items) => {
            out.extend(encode_type_and_len(4, items.len() as u64));
            for item in items {
                encode_into(item, out);
            }
        }
        Value::Map(pairs) => {
            out.extend(encode_type_and_len(5, pairs.len() as u64));
            for (k, v) in pairs {
                encode_into(k, out);
                encode_into(v, out);
            }
        }
    }
}

fn encode_type_and_len(major: u8, len: u64) -> Vec<u8> {
    let prefix = major << 5;
    if len < 24 {
        vec![prefix | (len as u8)]
    } else if len < 256 {
        vec![prefix | 24, len as u8]
    } else if len < 65536 {
        let mut v = vec![prefix | 25];
        v.extend((len as u16).to_be_bytes());
        v
    } else if len <= u32::MAX as u64 {
        let mut v = vec![prefix | 26];
        v.extend((len as u32).to_be_bytes());
        v
    } else {
        let mut v = vec![prefix | 27];
        v.extend(len.to_be_bytes());
        v
    }
}

pub fn decode(data: &[u8]) -> Result<Value, CborError> {
    let (value, idx) = decode_value(data, 0)?;
    if idx != data.len() {
        return Err(CborError(format!(
            "trailing bytes after CBOR value: {}",
            data.len() - idx
        )));
    }
    Ok(value)
}

/// Sentinel returned for the "break" stop code (major 7, additional 31).
enum Decoded {
    Value(Value),
    Break,
}

fn decode_value(data: &[u8], idx: usize) -> Result<(Value, usize), CborError> {
    match decode_item(data, idx)? {
        (Decoded::Value(v), idx) => Ok((v, idx)),
        (Decoded::Break, _) => Err(CborError("unexpected break outside indefinite container".into())),
    }
}

fn decode_item(data: &[u8], mut idx: usize) -> Result<(Decoded, usize), CborError> {
    let initial = *data
        .get(idx)
        .ok_or_else(|| CborError("unexpected end of data".into()))?;
    idx += 1;
    let major = initial >> 5;
    let addl = initial & 0x1F;

    if major == 7 {
        return decode_simple(addl, data, idx);
    }

    let length = read_uint(data, idx, addl)?;
    let idx = length.1;
    let length = length.0;

    match major {
        0 => {
            let n = length.ok_or_else(|| CborError("indefinite length on uint".into()))?;
            Ok((Decoded::Value(Value::Uint(n)), idx))
        }
        1 => {
            let n = length.ok_or_else(|| CborError("indefinite length on negint".into()))?;
            Ok((Decoded::Value(Value::NegInt(n)), idx))
        }
        2 => decode_bytes(data, idx, length),
        3 => decode_text(data, idx, length),
        4 => decode_array(data, idx, length),
        5 => decode_map(data, idx, length),
        6 => {
            // Tag: skip the tag number, decode and return the inner value.
            let (inner, idx) = decode_value(data, idx)?;
            Ok((Decoded::Value(inner), idx))
        }
        _ => Err(CborError(format!("unsupported major type: {major}"))),
    }
}

fn decode_simple(addl: u8, data: &[u8], idx: usize) -> Result<(Decoded, usize), CborError> {
    match addl {
        20 => Ok((Decoded::Value(Value::Bool(false)), idx)),
        21 => Ok((Decoded::Value(Value::Bool(true)), idx)),
        22 => Ok((Decoded::Value(Value::Null), idx)),
        23 => Ok((Decoded::Value(Value::Null), idx)), // undefined -> null
        24 => {
            let (b, idx) = read_n(data, idx, 1)?;
            Ok((Decoded::Value(Value::Uint(b[0] as u64)), idx))
        }
        25 => {
            let (b, idx) = read_n(data, idx, 2)?;
            let h = u16::from_be_bytes([b[0], b[1]]);
            Ok((Decoded::Value(Value::Float(half_to_f64(h))), idx))
        }
        26 => {
            let (b, idx) = read_n(data, idx, 4)?;
            let f = f32::from_be_bytes([b[0], b[1], b[2], b[3]]);
            Ok((Decoded::Value(Value::Float(f as f64)), idx))
        }
        27 => {
            let (b, idx) = read_n(data, idx, 8)?;
            let arr: [u8; 8] = b.try_into().unwrap();
            Ok((Decoded::Value(Value::Float(f64::from_be_bytes(arr))), idx))
        }
        31 => Ok((Decoded::Break, idx)),
        other => Ok((Decoded::Value(Value::Uint(other as u64)), idx)),
    }
}

fn decode_bytes(data: &[u8], idx: usize, length: Option<u64>) -> Result<(Decoded, usize), CborError> {
    match length {
        Some(n) => {
            let (b, idx) = read_n(data, idx, n as usize)?;
            Ok((Decoded::Value(Value::Bytes(b.to_vec())), idx))
        }
        None => {
            let mut out = Vec::new();
            let mut idx = idx;
            loop {
                match decode_item(data, idx)? {
                    (Decoded::Break, next) => {
                        idx = next;
                        break;
                    }
                    (Decoded::Value(Value::Bytes(chunk)), next) => {
                        out.extend(chunk);
                        idx = next;
                    }
                    _ => return Err(CborError("indefinite byte string contained non-bytes chunk".into())),
                }
            }
            Ok((Decoded::Value(Value::Bytes(out)), idx))
        }
    }
}

fn decode_text(data: &[u8], idx: usize, length: Option<u64>) -> Result<(Decoded, usize), CborError> {
    match length {
        Some(n) => {
            let (b, idx) = read_n(data, idx, n as usize)?;
            let s = std::str::from_utf8(b)
                .map_err(|_| CborError("invalid utf-8 text string".into()))?;
            Ok((Decoded::Value(Value::Text(s.to_string())), idx))
        }
        None => {
            let mut out = String::new();
            let mut idx = idx;
            loop {
                match decode_item(data, idx)? {
                    (Decoded::Break, next) => {
                        idx = next;
                        break;
                    }
                    (Decoded::Value(Value::Text(part)), next) => {
                        out.push_str(&part);
                        idx = next;
                    }
                    _ => return Err(CborError("indefinite text string contained non-text chunk".into())),
                }
            }
            Ok((Decoded::Value(Value::Text(out)), idx))
        }
    }
}

fn decode_array(data: &[u8], idx: usize, length: Option<u64>) -> Result<(Decoded, usize), CborError> {
    let mut items = Vec::new();
    let mut idx = idx;
    match length {
        Some(n) => {
            for _ in 0..n {
                let (item, next) = decode_value(data, idx)?;
                items.push(item);
                idx = next;
            }
        }
        None => loop {
            match decode_item(data, idx)? {
                (Decoded::Break, next) => {
                    idx = next;
                    break;
                }
                (Decoded::Value(v), next) => {
                    items.push(v);
                    idx = next;
                }
            }
        },
    }
    Ok((Decoded::Value(Value::Array(items)), idx))
}

fn decode_map(data: &[u8], idx: usize, length: Option<u64>) -> Result<(Decoded, usize), CborError> {
    let mut pairs = Vec::new();
    let mut idx = idx;
    match length {
        Some(n) => {
            for _ in 0..n {
                let (k, next) = decode_value(data, idx)?;
                let (v, next) = decode_value(data, next)?;
                pairs.push((k, v));
                idx = next;
            }
        }
        None => loop {
            match decode_item(data, idx)? {
                (Decoded::Break, next) => {
                    idx = next;
                    break;
                }
                (Decoded::Value(k), next) => {
                    let (v, next) = decode_value(data, next)?;
                    pairs.push((k, v));
                    idx = next;
                }
            }
        },
    }
    Ok((Decoded::Value(Value::Map(pairs)), idx))
}

fn read_n(data: &[u8], idx: usize, n: usize) -> Result<(&[u8], usize), CborError> {
    let end = idx + n;
    data.get(idx..end)
        .map(|b| (b, end))
        .ok_or_else(|| CborError("unexpected end of data".into()))
}

/// Reads the "additional info" length. Returns `None` for indefinite length (addl == 31).
fn read_uint(data: &[u8], idx: usize, addl: u8) -> Result<(Option<u64>, usize), CborError> {
    match addl {
        0..=23 => Ok((Some(addl as u64), idx)),
        24 => {
            let (b, idx) = read_n(data, idx, 1)?;
            Ok((Some(b[0] as u64), idx))
        }
        25 => {
            let (b, idx) = read_n(data, idx, 2)?;
            Ok((Some(u16::from_be_bytes([b[0], b[1]]) as u64), idx))
        }
        26 => {
            let (b, idx) = read_n(data, idx, 4)?;
            Ok((Some(u32::from_be_bytes([b[0], b[1], b[2], b[3]]) as u64), idx))
        }
        27 => {
            let (b, idx) = read_n(data, idx, 8)?;
            let arr: [u8; 8] = b.try_into().unwrap();
            Ok((Some(u64::from_be_bytes(arr)), idx))
        }
        31 => Ok((None, idx)),
        other => Err(CborError(format!("invalid additional info: {other}"))),
    }
}

fn half_to_f64(h: u16) -> f64 {
    let sign = (h >> 15) & 0x1;
    let exp = (h >> 10) & 0x1F;
    let frac = (h & 0x3FF) as f64;
    let sign_mul = if sign == 1 { -1.0 } else { 1.0 };

    if exp == 0 {
        if frac == 0.0 {
            return sign_mul * 0.0;
        }
        return sign_mul * (frac / 1024.0) * 2f64.powi(-14);
    }
    if exp == 0x1F {
        if frac == 0.0 {
            return sign_mul * f64::INFINITY;
        }
        return f64::NAN;
    }
    sign_mul * (1.0 + frac / 1024.0) * 2f64.powi(exp as i32 - 15)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_scalars() {
        for v in [
            Value::Null,
            Value::Bool(true),
            Value::Bool(false),
            Value::Uint(0),
            Value::Uint(23),
            Value::Uint(24),
            Value::Uint(1000),
            Value::Uint(u64::from(u32::MAX) + 1),
            Value::NegInt(0),
            Value::NegInt(1000),
            Value::Text("hello".to_string()),
            Value::Bytes(vec![1, 2, 3]),
        ] {
            let encoded = encode(&v);
            let decoded = decode(&encoded).expect("decode");
            assert_eq!(decoded, v);
        }
    }

    #[test]
    fn round_trips_float_as_float64() {
        let v = Value::Float(1.5);
        let encoded = encode(&v);
        assert_eq!(encoded[0], 0xFB);
        assert_eq!(decode(&encoded).unwrap(), v);
    }

    #[test]
    fn round_trips_array_and_map() {
        let arr = Value::Array(vec![Value::Uint(1), Value::Text("x".into())]);
        assert_eq!(decode(&encode(&arr)).unwrap(), arr);

        let map = Value::Map(vec![
            (Value::Text("url".into()), Value::Text("http://x".into())),
            (Value::Text("status".into()), Value::Uint(200)),
        ]);
        assert_eq!(decode(&encode(&map)).unwrap(), map);
    }

    #[test]
    fn rejects_trailing_bytes() {
        let mut encoded = encode(&Value::Uint(1));
        encoded.push(0xFF);
        assert!(decode(&encoded).is_err());
    }

    #[test]
    fn decodes_indefinite_length_array() {
        // [_ 1, 2] -> 0x9f 01 02 0xff
        let data = [0x9f, 0x01, 0x02, 0xff];
        let v = decode(&data).unwrap();
        assert_eq!(v, Value::Array(vec![Value::Uint(1), Value::Uint(2)]));
    }

    #[test]
    fn decodes_half_float_subnormal_and_special() {
        // 0x0000 = 0.0
        assert_eq!(half_to_f64(0x0000), 0.0);
        // 0x3C00 = 1.0
        assert_eq!(half_to_f64(0x3C00), 1.0);
        // 0x7C00 = +inf
        assert!(half_to_f64(0x7C00).is_infinite());
        // 0x7E00 = NaN
        assert!(half_to_f64(0x7E00).is_nan());
    }

    #[test]
    fn skips_tags() {
        // Tag 0 (0xc0) wrapping text "2013-03-21" -> just returns the text.
        let tagged = {
            let mut out = vec![0xc0];
            out.extend(encode(&Value::Text("x".into())));
            out
        };
        assert_eq!(decode(&tagged).unwrap(), Value::Text("x".into()));
    }
}
