use std::io::Write;

use byteorder::{BigEndian, ByteOrder, LittleEndian, WriteBytesExt};

use crate::value::{Atom, Value, Vector};

use super::{
    Endian, Kind, ProtocolError, TypeCode,
    header::FEATURE_VERSION,
};

/// Serializes values for a peer speaking a given protocol version.
///
/// Guids, timestamps, timespans and symbol vectors need a remote version of at least
/// [`FEATURE_VERSION`]; encoding them for an older peer fails with
/// [`ProtocolError::Version`] instead of writing bytes the peer would misread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Encoder {
    version: u8,
    endian: Endian,
}

impl Encoder {
    /// Big-endian encoder for a peer at `version`.
    pub fn new(version: u8) -> Self {
        Self {
            version,
            endian: Endian::Big,
        }
    }

    pub fn with_endian(self, endian: Endian) -> Self {
        Self { endian, ..self }
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Writes the type byte and payload of `value` to `sink`.
    pub fn encode<W: Write>(&self, value: &Value, sink: &mut W) -> Result<(), ProtocolError> {
        match self.endian {
            Endian::Big => self.write::<BigEndian, W>(value, sink),
            Endian::Little => self.write::<LittleEndian, W>(value, sink),
        }
    }

    fn require(&self, feature: &'static str) -> Result<(), ProtocolError> {
        if self.version < FEATURE_VERSION {
            return Err(ProtocolError::Version {
                feature,
                required: FEATURE_VERSION,
                remote: self.version,
            });
        }
        Ok(())
    }

    fn check(&self, kind: Kind, vector: bool) -> Result<(), ProtocolError> {
        match kind {
            Kind::Guid => self.require("guid"),
            Kind::Timestamp => self.require("timestamp"),
            Kind::Timespan => self.require("timespan"),
            Kind::Symbol if vector => self.require("symbol vector"),
            _ => Ok(()),
        }
    }

    fn write<B: ByteOrder, W: Write>(
        &self,
        value: &Value,
        sink: &mut W,
    ) -> Result<(), ProtocolError> {
        match value {
            Value::Atom(atom) => {
                self.check(atom.kind(), false)?;
                sink.write_i8(TypeCode::Atom(atom.kind()).code())?;
                write_atom::<B, W>(atom, sink)
            }
            Value::Vector(vector) => {
                self.check(vector.kind(), true)?;
                write_vector_header::<B, W>(vector.kind().code(), vector.len(), sink)?;
                write_elements::<B, W>(vector, sink)
            }
            Value::List(items) => self.write_list::<B, W>(items, sink),
            Value::Dictionary(dict) => {
                sink.write_i8(TypeCode::DICTIONARY)?;
                self.write::<B, W>(dict.keys(), sink)?;
                self.write::<B, W>(dict.values(), sink)
            }
            Value::Table(table) => {
                self.check(Kind::Symbol, true)?;
                sink.write_i8(TypeCode::TABLE)?;
                sink.write_u8(0)?;
                sink.write_i8(TypeCode::DICTIONARY)?;

                let names = table.names();
                write_vector_header::<B, W>(Kind::Symbol.code(), names.len(), sink)?;
                for name in names {
                    write_symbol(name, sink)?;
                }
                self.write_list::<B, W>(table.columns(), sink)
            }
            Value::Null => {
                sink.write_i8(TypeCode::UNARY_PRIMITIVE)?;
                sink.write_u8(0)?;
                Ok(())
            }
            Value::Function(code) => Err(ProtocolError::UnsupportedType(format!(
                "function (type {code})"
            ))),
        }
    }

    fn write_list<B: ByteOrder, W: Write>(
        &self,
        items: &[Value],
        sink: &mut W,
    ) -> Result<(), ProtocolError> {
        write_vector_header::<B, W>(0, items.len(), sink)?;
        for item in items {
            self.write::<B, W>(item, sink)?;
        }
        Ok(())
    }
}

fn write_vector_header<B: ByteOrder, W: Write>(
    code: i8,
    len: usize,
    sink: &mut W,
) -> Result<(), ProtocolError> {
    let count = i32::try_from(len).map_err(|_| ProtocolError::MessageTooLarge(len))?;
    sink.write_i8(code)?;
    // attribute byte
    sink.write_u8(0)?;
    sink.write_i32::<B>(count)?;
    Ok(())
}

fn write_symbol<W: Write>(symbol: &str, sink: &mut W) -> Result<(), ProtocolError> {
    if symbol.as_bytes().contains(&0) {
        return Err(ProtocolError::UnsupportedType(format!(
            "symbol {symbol:?} contains NUL"
        )));
    }
    sink.write_all(symbol.as_bytes())?;
    sink.write_u8(0)?;
    Ok(())
}

fn write_atom<B: ByteOrder, W: Write>(atom: &Atom, sink: &mut W) -> Result<(), ProtocolError> {
    match atom {
        Atom::Boolean(b) => sink.write_u8(*b as u8)?,
        Atom::Guid(g) => sink.write_all(g.as_bytes())?,
        Atom::Byte(b) | Atom::Char(b) => sink.write_u8(*b)?,
        Atom::Short(v) => sink.write_i16::<B>(*v)?,
        Atom::Int(v) => sink.write_i32::<B>(*v)?,
        Atom::Long(v) => sink.write_i64::<B>(*v)?,
        Atom::Real(v) => sink.write_f32::<B>(*v)?,
        Atom::Float(v) => sink.write_f64::<B>(*v)?,
        Atom::Symbol(s) => write_symbol(s, sink)?,
        Atom::Timestamp(v) => sink.write_i64::<B>(v.0)?,
        Atom::Month(v) => sink.write_i32::<B>(v.0)?,
        Atom::Date(v) => sink.write_i32::<B>(v.0)?,
        Atom::Datetime(v) => sink.write_f64::<B>(v.0)?,
        Atom::Timespan(v) => sink.write_i64::<B>(v.0)?,
        Atom::Minute(v) => sink.write_i32::<B>(v.0)?,
        Atom::Second(v) => sink.write_i32::<B>(v.0)?,
        Atom::Time(v) => sink.write_i32::<B>(v.0)?,
    }
    Ok(())
}

fn write_elements<B: ByteOrder, W: Write>(
    vector: &Vector,
    sink: &mut W,
) -> Result<(), ProtocolError> {
    match vector {
        Vector::Boolean(v) => {
            for b in v {
                sink.write_u8(*b as u8)?;
            }
        }
        Vector::Guid(v) => {
            for g in v {
                sink.write_all(g.as_bytes())?;
            }
        }
        Vector::Byte(v) | Vector::Char(v) => sink.write_all(v)?,
        Vector::Short(v) => {
            for x in v {
                sink.write_i16::<B>(*x)?;
            }
        }
        Vector::Int(v) => {
            for x in v {
                sink.write_i32::<B>(*x)?;
            }
        }
        Vector::Long(v) => {
            for x in v {
                sink.write_i64::<B>(*x)?;
            }
        }
        Vector::Real(v) => {
            for x in v {
                sink.write_f32::<B>(*x)?;
            }
        }
        Vector::Float(v) => {
            for x in v {
                sink.write_f64::<B>(*x)?;
            }
        }
        Vector::Symbol(v) => {
            for s in v {
                write_symbol(s, sink)?;
            }
        }
        Vector::Timestamp(v) => {
            for x in v {
                sink.write_i64::<B>(x.0)?;
            }
        }
        Vector::Month(v) => {
            for x in v {
                sink.write_i32::<B>(x.0)?;
            }
        }
        Vector::Date(v) => {
            for x in v {
                sink.write_i32::<B>(x.0)?;
            }
        }
        Vector::Datetime(v) => {
            for x in v {
                sink.write_f64::<B>(x.0)?;
            }
        }
        Vector::Timespan(v) => {
            for x in v {
                sink.write_i64::<B>(x.0)?;
            }
        }
        Vector::Minute(v) => {
            for x in v {
                sink.write_i32::<B>(x.0)?;
            }
        }
        Vector::Second(v) => {
            for x in v {
                sink.write_i32::<B>(x.0)?;
            }
        }
        Vector::Time(v) => {
            for x in v {
                sink.write_i32::<B>(x.0)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use crate::{
        Dictionary, Table,
        protocol::size_of,
        value::{Date, Minute, Timespan, Timestamp},
    };

    use super::*;

    fn encode(encoder: Encoder, value: &Value) -> Vec<u8> {
        let mut out = Vec::new();
        encoder.encode(value, &mut out).unwrap();
        out
    }

    fn samples() -> Vec<Value> {
        let table = Table::new(
            vec!["sym".into(), "px".into()],
            vec![Value::symbols(["a", "bc"]), Value::from(vec![1.5f64, 2.5])],
        )
        .unwrap();
        let keys = Table::new(vec!["id".into()], vec![Value::from(vec![1i64, 2])]).unwrap();
        let keyed = Dictionary::new(Value::Table(keys), Value::Table(table.clone())).unwrap();

        vec![
            Value::from(true),
            Value::from(Uuid::from_u128(0x1234)),
            Value::Atom(Atom::Byte(0xff)),
            Value::from(-3i16),
            Value::from(42i32),
            Value::from(i64::MAX),
            Value::from(1.25f32),
            Value::from(-0.5f64),
            Value::Atom(Atom::Char(b'x')),
            Value::symbol("trade"),
            Value::from(Timestamp(123)),
            Value::from(Date(-1)),
            Value::from(Minute(61)),
            Value::from(Timespan(-5)),
            Value::string(""),
            Value::string("select from t"),
            Value::from(Vec::<i32>::new()),
            Value::symbols(Vec::<String>::new()),
            Value::symbols(["a", "", "ccc"]),
            Value::from(vec![Uuid::nil(), Uuid::from_u128(u128::MAX)]),
            Value::List(vec![]),
            Value::List(vec![Value::from(1i64), Value::List(vec![Value::symbol("x")])]),
            Value::Dictionary(Dictionary::new(Value::List(vec![]), Value::List(vec![])).unwrap()),
            Value::Dictionary(
                Dictionary::new(Value::symbols(["a", "b"]), Value::from(vec![1i32, 2])).unwrap(),
            ),
            Value::Table(table),
            Value::Dictionary(keyed),
            Value::Null,
        ]
    }

    #[test]
    fn int_vector_layout() {
        let value = Value::from(vec![1i32, 2, 3]);

        let big = encode(Encoder::new(3), &value);
        assert_eq!(
            big,
            [6, 0, 0, 0, 0, 3, 0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0, 3]
        );

        let little = encode(Encoder::new(3).with_endian(Endian::Little), &value);
        assert_eq!(
            little,
            [6, 0, 3, 0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0]
        );
        assert_eq!(size_of(&value).unwrap(), 18);
    }

    #[test]
    fn symbol_atom_is_nul_terminated() {
        assert_eq!(encode(Encoder::new(3), &Value::symbol("ab")), [245, b'a', b'b', 0]);
    }

    #[test]
    fn table_layout() {
        let table = Table::new(vec!["a".into()], vec![Value::from(vec![true])]).unwrap();
        assert_eq!(
            encode(Encoder::new(3), &Value::Table(table)),
            [98, 0, 99, 11, 0, 0, 0, 0, 1, b'a', 0, 0, 0, 0, 0, 0, 1, 1, 0, 0, 0, 0, 1, 1]
        );
    }

    #[test]
    fn size_matches_encoding() {
        for endian in [Endian::Big, Endian::Little] {
            let encoder = Encoder::new(3).with_endian(endian);
            for value in samples() {
                let bytes = encode(encoder, &value);
                assert_eq!(size_of(&value).unwrap(), bytes.len(), "{value:?}");
            }
        }
    }

    #[test]
    fn version_gated_features() {
        let gated = [
            Value::from(Timestamp(0)),
            Value::from(Timespan(0)),
            Value::from(vec![Timestamp(0)]),
            Value::from(vec![Timespan(0)]),
            Value::symbols(["a"]),
            Value::from(Uuid::nil()),
        ];
        for value in &gated {
            let err = Encoder::new(2).encode(value, &mut Vec::new()).unwrap_err();
            assert!(matches!(err, ProtocolError::Version { remote: 2, .. }), "{value:?}");
            assert!(Encoder::new(3).encode(value, &mut Vec::new()).is_ok());
        }
    }

    #[test]
    fn symbol_atoms_need_no_version() {
        assert!(Encoder::new(0).encode(&Value::symbol("a"), &mut Vec::new()).is_ok());
    }

    #[test]
    fn symbols_with_nul_rejected() {
        let err = Encoder::new(3)
            .encode(&Value::symbol("a\0b"), &mut Vec::new())
            .unwrap_err();
        assert!(matches!(err, ProtocolError::UnsupportedType(_)));
    }

    #[test]
    fn functions_not_encodable() {
        let err = Encoder::new(3)
            .encode(&Value::Function(100), &mut Vec::new())
            .unwrap_err();
        assert!(matches!(err, ProtocolError::UnsupportedType(_)));
    }

    #[test]
    fn encoding_leaves_input_untouched() {
        let value = Value::List(vec![Value::symbol("a"), Value::from(vec![1i64])]);
        let before = value.clone();
        encode(Encoder::new(3), &value);
        assert_eq!(value, before);
    }
}
