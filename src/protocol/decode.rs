//! Recursive decoder.
//!
//! Decoding is driven by a [`Cursor`], which owns the read offset and the byte order
//! declared by the message header. A cursor is created per message and threaded
//! through every nested call, so independent messages can be decoded concurrently
//! without sharing state.
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use uuid::Uuid;

use crate::value::{
    Atom, Date, Datetime, Dictionary, Minute, Month, Second, Table, Time, Timespan, Timestamp,
    Value, Vector,
};

use super::{Endian, Kind, MalformedCause, ProtocolError, TypeCode, header::MAX_DEPTH};

/// Read position inside one message.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    buf: &'a [u8],
    offset: usize,
    endian: Endian,
    /// Values currently being decoded, outermost included.
    depth: usize,
}

macro_rules! read_ordered {
    ($($name:ident -> $ty:ty, $width:expr, $read:ident;)*) => {
        $(
            pub fn $name(&mut self) -> Result<$ty, ProtocolError> {
                let bytes = self.take($width)?;
                Ok(match self.endian {
                    Endian::Big => BigEndian::$read(bytes),
                    Endian::Little => LittleEndian::$read(bytes),
                })
            }
        )*
    };
}

impl<'a> Cursor<'a> {
    pub fn new(buf: &'a [u8], endian: Endian) -> Self {
        Self::at(buf, 0, endian)
    }

    pub fn at(buf: &'a [u8], offset: usize, endian: Endian) -> Self {
        Self {
            buf,
            offset,
            endian,
            depth: 0,
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.offset)
    }

    pub(crate) fn malformed(&self, cause: MalformedCause) -> ProtocolError {
        ProtocolError::Malformed {
            offset: self.offset,
            cause,
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ProtocolError> {
        if n > self.remaining() {
            return Err(self.malformed(MalformedCause::Truncated {
                needed: n,
                remaining: self.remaining(),
            }));
        }
        let bytes = &self.buf[self.offset..self.offset + n];
        self.offset += n;
        Ok(bytes)
    }

    fn skip_to_end(&mut self) {
        self.offset = self.buf.len();
    }

    pub fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8, ProtocolError> {
        Ok(self.read_u8()? as i8)
    }

    read_ordered! {
        read_i16 -> i16, 2, read_i16;
        read_i32 -> i32, 4, read_i32;
        read_i64 -> i64, 8, read_i64;
        read_f32 -> f32, 4, read_f32;
        read_f64 -> f64, 8, read_f64;
    }

    pub fn read_guid(&mut self) -> Result<Uuid, ProtocolError> {
        let mut raw = [0u8; 16];
        raw.copy_from_slice(self.take(16)?);
        Ok(Uuid::from_bytes(raw))
    }

    /// NUL-terminated UTF-8 text; the terminator is consumed.
    pub fn read_symbol(&mut self) -> Result<String, ProtocolError> {
        let rest = &self.buf[self.offset.min(self.buf.len())..];
        let Some(len) = rest.iter().position(|&b| b == 0) else {
            return Err(self.malformed(MalformedCause::Truncated {
                needed: rest.len() + 1,
                remaining: rest.len(),
            }));
        };
        let start = self.offset;
        let bytes = self.take(len + 1)?;
        std::str::from_utf8(&bytes[..len])
            .map(str::to_owned)
            .map_err(|_| ProtocolError::Malformed {
                offset: start,
                cause: MalformedCause::InvalidSymbol,
            })
    }

    /// Element count of a vector whose elements take at least `min_width` bytes each.
    fn read_count(&mut self, min_width: usize) -> Result<usize, ProtocolError> {
        let at = self.offset;
        let count = self.read_i32()?;
        let count = usize::try_from(count).map_err(|_| ProtocolError::Malformed {
            offset: at,
            cause: MalformedCause::NegativeCount(count),
        })?;
        let needed = count.saturating_mul(min_width);
        if needed > self.remaining() {
            return Err(self.malformed(MalformedCause::Truncated {
                needed,
                remaining: self.remaining(),
            }));
        }
        Ok(count)
    }
}

/// Decodes one value starting at the cursor.
///
/// Values nested more than [`MAX_DEPTH`] levels deep are rejected as malformed.
pub fn decode(cursor: &mut Cursor<'_>) -> Result<Value, ProtocolError> {
    if cursor.depth >= MAX_DEPTH {
        return Err(cursor.malformed(MalformedCause::Depth(MAX_DEPTH)));
    }
    cursor.depth += 1;
    let value = decode_nested(cursor);
    cursor.depth -= 1;
    value
}

fn decode_nested(cursor: &mut Cursor<'_>) -> Result<Value, ProtocolError> {
    let start = cursor.offset();
    let code = cursor.read_i8()?;
    let type_code = TypeCode::try_from(code).map_err(|cause| ProtocolError::Malformed {
        offset: start,
        cause,
    })?;

    match type_code {
        TypeCode::Atom(kind) => read_atom(cursor, kind).map(Value::Atom),
        TypeCode::List => {
            // attribute
            cursor.read_u8()?;
            let count = cursor.read_count(1)?;
            let items = (0..count)
                .map(|_| decode(cursor))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::List(items))
        }
        TypeCode::Vector(kind) => {
            cursor.read_u8()?;
            let count = cursor.read_count(kind.width().max(1))?;
            read_vector(cursor, kind, count).map(Value::Vector)
        }
        TypeCode::Dictionary => {
            let keys = decode(cursor)?;
            let values = decode(cursor)?;
            Dictionary::new(keys, values)
                .map(Value::Dictionary)
                .map_err(|e| ProtocolError::Malformed {
                    offset: start,
                    cause: MalformedCause::Container(e.to_string()),
                })
        }
        TypeCode::Table => {
            cursor.read_u8()?;
            let inner_at = cursor.offset();
            let inner = cursor.read_i8()?;
            if inner != TypeCode::DICTIONARY {
                return Err(ProtocolError::Malformed {
                    offset: inner_at,
                    cause: MalformedCause::Container(format!(
                        "table wraps type {inner}, expected a dictionary"
                    )),
                });
            }
            let names = decode(cursor)?;
            let columns = decode(cursor)?;
            table(names, columns)
                .map(Value::Table)
                .map_err(|cause| ProtocolError::Malformed {
                    offset: start,
                    cause,
                })
        }
        TypeCode::Function(TypeCode::LAMBDA) => {
            // context of the lambda; the source text follows as the payload
            cursor.read_symbol()?;
            decode(cursor)
        }
        TypeCode::Function(code) if code <= TypeCode::LAST_MARKED => {
            let marker = cursor.read_u8()?;
            if code == TypeCode::UNARY_PRIMITIVE && marker == 0 {
                Ok(Value::Null)
            } else {
                Ok(Value::Function(code))
            }
        }
        TypeCode::Function(code) => {
            cursor.skip_to_end();
            Ok(Value::Function(code))
        }
    }
}

fn table(names: Value, columns: Value) -> Result<Table, MalformedCause> {
    let names = match names {
        Value::Vector(Vector::Symbol(names)) => names,
        other => {
            return Err(MalformedCause::Container(format!(
                "column names have type {}",
                other.type_code().code()
            )));
        }
    };
    let columns = match columns {
        Value::List(columns) => columns,
        other => {
            return Err(MalformedCause::Container(format!(
                "columns have type {}",
                other.type_code().code()
            )));
        }
    };
    Table::new(names, columns).map_err(|e| MalformedCause::Container(e.to_string()))
}

fn read_atom(cursor: &mut Cursor<'_>, kind: Kind) -> Result<Atom, ProtocolError> {
    Ok(match kind {
        Kind::Boolean => Atom::Boolean(cursor.read_u8()? != 0),
        Kind::Guid => Atom::Guid(cursor.read_guid()?),
        Kind::Byte => Atom::Byte(cursor.read_u8()?),
        Kind::Short => Atom::Short(cursor.read_i16()?),
        Kind::Int => Atom::Int(cursor.read_i32()?),
        Kind::Long => Atom::Long(cursor.read_i64()?),
        Kind::Real => Atom::Real(cursor.read_f32()?),
        Kind::Float => Atom::Float(cursor.read_f64()?),
        Kind::Char => Atom::Char(cursor.read_u8()?),
        Kind::Symbol => Atom::Symbol(cursor.read_symbol()?),
        Kind::Timestamp => Atom::Timestamp(Timestamp(cursor.read_i64()?)),
        Kind::Month => Atom::Month(Month(cursor.read_i32()?)),
        Kind::Date => Atom::Date(Date(cursor.read_i32()?)),
        Kind::Datetime => Atom::Datetime(Datetime(cursor.read_f64()?)),
        Kind::Timespan => Atom::Timespan(Timespan(cursor.read_i64()?)),
        Kind::Minute => Atom::Minute(Minute(cursor.read_i32()?)),
        Kind::Second => Atom::Second(Second(cursor.read_i32()?)),
        Kind::Time => Atom::Time(Time(cursor.read_i32()?)),
    })
}

fn repeat<T>(
    count: usize,
    mut read: impl FnMut() -> Result<T, ProtocolError>,
) -> Result<Vec<T>, ProtocolError> {
    (0..count).map(|_| read()).collect()
}

fn read_vector(cursor: &mut Cursor<'_>, kind: Kind, count: usize) -> Result<Vector, ProtocolError> {
    Ok(match kind {
        Kind::Boolean => Vector::Boolean(repeat(count, || Ok(cursor.read_u8()? != 0))?),
        Kind::Guid => Vector::Guid(repeat(count, || cursor.read_guid())?),
        Kind::Byte => Vector::Byte(cursor.take(count)?.to_vec()),
        Kind::Char => Vector::Char(cursor.take(count)?.to_vec()),
        Kind::Short => Vector::Short(repeat(count, || cursor.read_i16())?),
        Kind::Int => Vector::Int(repeat(count, || cursor.read_i32())?),
        Kind::Long => Vector::Long(repeat(count, || cursor.read_i64())?),
        Kind::Real => Vector::Real(repeat(count, || cursor.read_f32())?),
        Kind::Float => Vector::Float(repeat(count, || cursor.read_f64())?),
        Kind::Symbol => Vector::Symbol(repeat(count, || cursor.read_symbol())?),
        Kind::Timestamp => {
            Vector::Timestamp(repeat(count, || cursor.read_i64().map(Timestamp))?)
        }
        Kind::Month => Vector::Month(repeat(count, || cursor.read_i32().map(Month))?),
        Kind::Date => Vector::Date(repeat(count, || cursor.read_i32().map(Date))?),
        Kind::Datetime => Vector::Datetime(repeat(count, || cursor.read_f64().map(Datetime))?),
        Kind::Timespan => Vector::Timespan(repeat(count, || cursor.read_i64().map(Timespan))?),
        Kind::Minute => Vector::Minute(repeat(count, || cursor.read_i32().map(Minute))?),
        Kind::Second => Vector::Second(repeat(count, || cursor.read_i32().map(Second))?),
        Kind::Time => Vector::Time(repeat(count, || cursor.read_i32().map(Time))?),
    })
}
