//! PackStream encoding: [`Value`] trees to bytes.

use bytes::{BufMut, BytesMut};

use super::marker;
use super::value::{Structure, Value};
use super::PackStreamError;

/// Encode a single value to a fresh byte vector.
pub fn encode(value: &Value) -> Result<Vec<u8>, PackStreamError> {
    let mut buf = BytesMut::with_capacity(64);
    encode_value(&mut buf, value)?;
    Ok(buf.to_vec())
}

/// Encode a value into `buf`.
pub fn encode_value(buf: &mut BytesMut, value: &Value) -> Result<(), PackStreamError> {
    match value {
        Value::Null => buf.put_u8(marker::NULL),
        Value::Boolean(true) => buf.put_u8(marker::TRUE),
        Value::Boolean(false) => buf.put_u8(marker::FALSE),
        Value::Integer(i) => encode_int(buf, *i),
        Value::Float(f) => {
            buf.put_u8(marker::FLOAT_64);
            buf.put_f64(*f);
        }
        Value::Bytes(b) => encode_bytes(buf, b)?,
        Value::String(s) => encode_string(buf, s)?,
        Value::List(items) => {
            write_size_header(
                buf,
                items.len(),
                Some(marker::TINY_LIST),
                [marker::LIST_8, marker::LIST_16, marker::LIST_32],
                "list",
            )?;
            for item in items {
                encode_value(buf, item)?;
            }
        }
        Value::Map(map) => {
            write_size_header(
                buf,
                map.len(),
                Some(marker::TINY_MAP),
                [marker::MAP_8, marker::MAP_16, marker::MAP_32],
                "map",
            )?;
            for (key, item) in map {
                encode_string(buf, key)?;
                encode_value(buf, item)?;
            }
        }
        Value::Structure(s) => encode_structure(buf, s)?,
    }
    Ok(())
}

/// Encode an integer in its smallest representation.
pub fn encode_int(buf: &mut BytesMut, value: i64) {
    if (marker::TINY_INT_MIN..=marker::TINY_INT_MAX).contains(&value) {
        buf.put_u8(value as u8);
    } else if i64::from(i8::MIN) <= value && value <= i64::from(i8::MAX) {
        buf.put_u8(marker::INT_8);
        buf.put_i8(value as i8);
    } else if i64::from(i16::MIN) <= value && value <= i64::from(i16::MAX) {
        buf.put_u8(marker::INT_16);
        buf.put_i16(value as i16);
    } else if i64::from(i32::MIN) <= value && value <= i64::from(i32::MAX) {
        buf.put_u8(marker::INT_32);
        buf.put_i32(value as i32);
    } else {
        buf.put_u8(marker::INT_64);
        buf.put_i64(value);
    }
}

/// Encode a string (size is the byte length, not the char count).
pub fn encode_string(buf: &mut BytesMut, value: &str) -> Result<(), PackStreamError> {
    write_size_header(
        buf,
        value.len(),
        Some(marker::TINY_STRING),
        [marker::STRING_8, marker::STRING_16, marker::STRING_32],
        "string",
    )?;
    buf.put_slice(value.as_bytes());
    Ok(())
}

fn encode_bytes(buf: &mut BytesMut, value: &[u8]) -> Result<(), PackStreamError> {
    // Byte arrays have no tiny form.
    write_size_header(
        buf,
        value.len(),
        None,
        [marker::BYTES_8, marker::BYTES_16, marker::BYTES_32],
        "bytes",
    )?;
    buf.put_slice(value);
    Ok(())
}

/// Encode a structure: size-marked header, tag byte, then the fields.
pub fn encode_structure(buf: &mut BytesMut, s: &Structure) -> Result<(), PackStreamError> {
    let len = s.fields.len();
    if len <= marker::TINY_SIZE_MAX {
        buf.put_u8(marker::TINY_STRUCT | len as u8);
    } else if len <= u8::MAX as usize {
        buf.put_u8(marker::STRUCT_8);
        buf.put_u8(len as u8);
    } else if len <= u16::MAX as usize {
        buf.put_u8(marker::STRUCT_16);
        buf.put_u16(len as u16);
    } else {
        return Err(PackStreamError::TooLarge("structure", len));
    }
    buf.put_u8(s.tag);
    for field in &s.fields {
        encode_value(buf, field)?;
    }
    Ok(())
}

fn write_size_header(
    buf: &mut BytesMut,
    len: usize,
    tiny: Option<u8>,
    wide: [u8; 3],
    what: &'static str,
) -> Result<(), PackStreamError> {
    match tiny {
        Some(nibble) if len <= marker::TINY_SIZE_MAX => {
            buf.put_u8(nibble | len as u8);
            return Ok(());
        }
        _ => {}
    }
    if len <= u8::MAX as usize {
        buf.put_u8(wide[0]);
        buf.put_u8(len as u8);
    } else if len <= u16::MAX as usize {
        buf.put_u8(wide[1]);
        buf.put_u16(len as u16);
    } else if len <= u32::MAX as usize {
        buf.put_u8(wide[2]);
        buf.put_u32(len as u32);
    } else {
        return Err(PackStreamError::TooLarge(what, len));
    }
    Ok(())
}
