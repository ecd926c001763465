//! PackStream decoding: bytes back to [`Value`] trees.

use std::collections::HashMap;

use super::marker;
use super::value::{Structure, Value};
use super::PackStreamError;

/// Cursor-style decoder over a byte slice.
pub struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    /// Create a decoder over `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes left to consume.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Decode the next value.
    pub fn decode_value(&mut self) -> Result<Value, PackStreamError> {
        let m = self.take_u8()?;

        if marker::is_tiny_int(m) {
            return Ok(Value::Integer(m as i8 as i64));
        }

        match marker::tiny_family(m) {
            marker::TINY_STRING => return self.take_string(marker::tiny_size(m)),
            marker::TINY_LIST => return self.take_list(marker::tiny_size(m)),
            marker::TINY_MAP => return self.take_map(marker::tiny_size(m)),
            marker::TINY_STRUCT => return self.take_structure(marker::tiny_size(m)),
            _ => {}
        }

        match m {
            marker::NULL => Ok(Value::Null),
            marker::TRUE => Ok(Value::Boolean(true)),
            marker::FALSE => Ok(Value::Boolean(false)),
            marker::FLOAT_64 => Ok(Value::Float(f64::from_be_bytes(self.take_array()?))),
            marker::INT_8 => Ok(Value::Integer(self.take_u8()? as i8 as i64)),
            marker::INT_16 => Ok(Value::Integer(
                i16::from_be_bytes(self.take_array()?) as i64
            )),
            marker::INT_32 => Ok(Value::Integer(
                i32::from_be_bytes(self.take_array()?) as i64
            )),
            marker::INT_64 => Ok(Value::Integer(i64::from_be_bytes(self.take_array()?))),
            marker::BYTES_8 => {
                let n = self.take_u8()? as usize;
                Ok(Value::Bytes(self.take_slice(n)?.to_vec()))
            }
            marker::BYTES_16 => {
                let n = u16::from_be_bytes(self.take_array()?) as usize;
                Ok(Value::Bytes(self.take_slice(n)?.to_vec()))
            }
            marker::BYTES_32 => {
                let n = u32::from_be_bytes(self.take_array()?) as usize;
                Ok(Value::Bytes(self.take_slice(n)?.to_vec()))
            }
            marker::STRING_8 => {
                let n = self.take_u8()? as usize;
                self.take_string(n)
            }
            marker::STRING_16 => {
                let n = u16::from_be_bytes(self.take_array()?) as usize;
                self.take_string(n)
            }
            marker::STRING_32 => {
                let n = u32::from_be_bytes(self.take_array()?) as usize;
                self.take_string(n)
            }
            marker::LIST_8 => {
                let n = self.take_u8()? as usize;
                self.take_list(n)
            }
            marker::LIST_16 => {
                let n = u16::from_be_bytes(self.take_array()?) as usize;
                self.take_list(n)
            }
            marker::LIST_32 => {
                let n = u32::from_be_bytes(self.take_array()?) as usize;
                self.take_list(n)
            }
            marker::MAP_8 => {
                let n = self.take_u8()? as usize;
                self.take_map(n)
            }
            marker::MAP_16 => {
                let n = u16::from_be_bytes(self.take_array()?) as usize;
                self.take_map(n)
            }
            marker::MAP_32 => {
                let n = u32::from_be_bytes(self.take_array()?) as usize;
                self.take_map(n)
            }
            marker::STRUCT_8 => {
                let n = self.take_u8()? as usize;
                self.take_structure(n)
            }
            marker::STRUCT_16 => {
                let n = u16::from_be_bytes(self.take_array()?) as usize;
                self.take_structure(n)
            }
            other => Err(PackStreamError::UnknownMarker(other)),
        }
    }

    fn take_string(&mut self, len: usize) -> Result<Value, PackStreamError> {
        let bytes = self.take_slice(len)?;
        let s = std::str::from_utf8(bytes).map_err(|_| PackStreamError::InvalidUtf8)?;
        Ok(Value::String(s.to_string()))
    }

    fn take_list(&mut self, len: usize) -> Result<Value, PackStreamError> {
        let mut items = Vec::with_capacity(len.min(1024));
        for _ in 0..len {
            items.push(self.decode_value()?);
        }
        Ok(Value::List(items))
    }

    fn take_map(&mut self, len: usize) -> Result<Value, PackStreamError> {
        let mut map = HashMap::with_capacity(len.min(1024));
        for _ in 0..len {
            let key = match self.decode_value()? {
                Value::String(s) => s,
                _ => return Err(PackStreamError::InvalidMapKey),
            };
            map.insert(key, self.decode_value()?);
        }
        Ok(Value::Map(map))
    }

    fn take_structure(&mut self, field_count: usize) -> Result<Value, PackStreamError> {
        let tag = self.take_u8()?;
        let mut fields = Vec::with_capacity(field_count.min(64));
        for _ in 0..field_count {
            fields.push(self.decode_value()?);
        }
        Ok(Value::Structure(Structure::new(tag, fields)))
    }

    fn take_u8(&mut self) -> Result<u8, PackStreamError> {
        if self.remaining() < 1 {
            return Err(PackStreamError::UnexpectedEof);
        }
        let b = self.data[self.pos];
        self.pos += 1;
        Ok(b)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], PackStreamError> {
        let slice = self.take_slice(N)?;
        let mut arr = [0u8; N];
        arr.copy_from_slice(slice);
        Ok(arr)
    }

    fn take_slice(&mut self, len: usize) -> Result<&'a [u8], PackStreamError> {
        if self.remaining() < len {
            return Err(PackStreamError::UnexpectedEof);
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }
}

/// Decode exactly one value; trailing bytes are an error.
pub fn decode(data: &[u8]) -> Result<Value, PackStreamError> {
    let mut decoder = Decoder::new(data);
    let value = decoder.decode_value()?;
    if decoder.remaining() > 0 {
        return Err(PackStreamError::TrailingBytes(decoder.remaining()));
    }
    Ok(value)
}
