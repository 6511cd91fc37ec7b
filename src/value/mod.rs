//! In-memory value model.
//!
//! This module defines [`Value`], the closed set of shapes that can travel over the
//! kdb+ IPC protocol, together with its building blocks:
//!
//! - [`Atom`]: a single scalar of one [`Kind`].
//! - [`Vector`]: a homogeneous sequence of one [`Kind`].
//! - [`Value::List`]: a generic (mixed) list of values.
//! - [`Dictionary`] and [`Table`]: the recursive containers.
//!
//! Values are plain owned data. They are built by the application before a request is
//! sent, or by the [decoder](crate::protocol::decode) when a response arrives, and are
//! never mutated by the codec.
//!
//! # Example
//! ```rust
//! use qipc::{Value, Vector};
//!
//! let query = Value::string("select from trade where sym=`AAPL");
//! assert_eq!(query.count(), 33);
//!
//! let prices = Value::from(vec![1.5f64, 2.5]);
//! assert_eq!(prices, Value::Vector(Vector::Float(vec![1.5, 2.5])));
//! ```
use std::fmt;

use thiserror::Error;
use uuid::Uuid;

use crate::protocol::{Kind, TypeCode};

mod table;
pub mod temporal;

pub use table::{Dictionary, Table};
pub use temporal::{Date, Datetime, Minute, Month, Second, Time, Timespan, Timestamp};

/// Errors raised while constructing values, before anything reaches the wire.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    #[error("dictionary has {keys} keys but {values} values")]
    DictionaryLength { keys: usize, values: usize },

    #[error("table has {names} column names but {columns} columns")]
    ColumnCount { names: usize, columns: usize },

    #[error("column '{name}' has {actual} rows, expected {expected}")]
    ColumnLength {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("column '{0}' is not a vector")]
    NotAColumn(String),

    #[error("expected a table or a dictionary of two tables")]
    NotKeyed,

    #[error("temporal value out of range")]
    TemporalRange,
}

/// A single scalar.
#[derive(Debug, Clone, PartialEq)]
pub enum Atom {
    Boolean(bool),
    Guid(Uuid),
    Byte(u8),
    Short(i16),
    Int(i32),
    Long(i64),
    Real(f32),
    Float(f64),
    Char(u8),
    Symbol(String),
    Timestamp(Timestamp),
    Month(Month),
    Date(Date),
    Datetime(Datetime),
    Timespan(Timespan),
    Minute(Minute),
    Second(Second),
    Time(Time),
}

/// A homogeneous sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum Vector {
    Boolean(Vec<bool>),
    Guid(Vec<Uuid>),
    Byte(Vec<u8>),
    Short(Vec<i16>),
    Int(Vec<i32>),
    Long(Vec<i64>),
    Real(Vec<f32>),
    Float(Vec<f64>),
    Char(Vec<u8>),
    Symbol(Vec<String>),
    Timestamp(Vec<Timestamp>),
    Month(Vec<Month>),
    Date(Vec<Date>),
    Datetime(Vec<Datetime>),
    Timespan(Vec<Timespan>),
    Minute(Vec<Minute>),
    Second(Vec<Second>),
    Time(Vec<Time>),
}

/// Any value that can be sent to or received from a kdb+ process.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Atom(Atom),
    Vector(Vector),
    /// Generic list; elements may be of any shape.
    List(Vec<Value>),
    Dictionary(Dictionary),
    Table(Table),
    /// The generic null `::`.
    Null,
    /// Lambdas, projections and operators. Carries the wire type code; the body is
    /// not interpretable as data.
    Function(i8),
}

impl Atom {
    pub fn kind(&self) -> Kind {
        match self {
            Atom::Boolean(_) => Kind::Boolean,
            Atom::Guid(_) => Kind::Guid,
            Atom::Byte(_) => Kind::Byte,
            Atom::Short(_) => Kind::Short,
            Atom::Int(_) => Kind::Int,
            Atom::Long(_) => Kind::Long,
            Atom::Real(_) => Kind::Real,
            Atom::Float(_) => Kind::Float,
            Atom::Char(_) => Kind::Char,
            Atom::Symbol(_) => Kind::Symbol,
            Atom::Timestamp(_) => Kind::Timestamp,
            Atom::Month(_) => Kind::Month,
            Atom::Date(_) => Kind::Date,
            Atom::Datetime(_) => Kind::Datetime,
            Atom::Timespan(_) => Kind::Timespan,
            Atom::Minute(_) => Kind::Minute,
            Atom::Second(_) => Kind::Second,
            Atom::Time(_) => Kind::Time,
        }
    }
}

impl Vector {
    pub fn kind(&self) -> Kind {
        match self {
            Vector::Boolean(_) => Kind::Boolean,
            Vector::Guid(_) => Kind::Guid,
            Vector::Byte(_) => Kind::Byte,
            Vector::Short(_) => Kind::Short,
            Vector::Int(_) => Kind::Int,
            Vector::Long(_) => Kind::Long,
            Vector::Real(_) => Kind::Real,
            Vector::Float(_) => Kind::Float,
            Vector::Char(_) => Kind::Char,
            Vector::Symbol(_) => Kind::Symbol,
            Vector::Timestamp(_) => Kind::Timestamp,
            Vector::Month(_) => Kind::Month,
            Vector::Date(_) => Kind::Date,
            Vector::Datetime(_) => Kind::Datetime,
            Vector::Timespan(_) => Kind::Timespan,
            Vector::Minute(_) => Kind::Minute,
            Vector::Second(_) => Kind::Second,
            Vector::Time(_) => Kind::Time,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Vector::Boolean(v) => v.len(),
            Vector::Guid(v) => v.len(),
            Vector::Byte(v) | Vector::Char(v) => v.len(),
            Vector::Short(v) => v.len(),
            Vector::Int(v) => v.len(),
            Vector::Long(v) => v.len(),
            Vector::Real(v) => v.len(),
            Vector::Float(v) => v.len(),
            Vector::Symbol(v) => v.len(),
            Vector::Timestamp(v) => v.len(),
            Vector::Month(v) => v.len(),
            Vector::Date(v) => v.len(),
            Vector::Datetime(v) => v.len(),
            Vector::Timespan(v) => v.len(),
            Vector::Minute(v) => v.len(),
            Vector::Second(v) => v.len(),
            Vector::Time(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element `index` as an atom.
    pub fn get(&self, index: usize) -> Option<Atom> {
        Some(match self {
            Vector::Boolean(v) => Atom::Boolean(*v.get(index)?),
            Vector::Guid(v) => Atom::Guid(*v.get(index)?),
            Vector::Byte(v) => Atom::Byte(*v.get(index)?),
            Vector::Short(v) => Atom::Short(*v.get(index)?),
            Vector::Int(v) => Atom::Int(*v.get(index)?),
            Vector::Long(v) => Atom::Long(*v.get(index)?),
            Vector::Real(v) => Atom::Real(*v.get(index)?),
            Vector::Float(v) => Atom::Float(*v.get(index)?),
            Vector::Char(v) => Atom::Char(*v.get(index)?),
            Vector::Symbol(v) => Atom::Symbol(v.get(index)?.clone()),
            Vector::Timestamp(v) => Atom::Timestamp(*v.get(index)?),
            Vector::Month(v) => Atom::Month(*v.get(index)?),
            Vector::Date(v) => Atom::Date(*v.get(index)?),
            Vector::Datetime(v) => Atom::Datetime(*v.get(index)?),
            Vector::Timespan(v) => Atom::Timespan(*v.get(index)?),
            Vector::Minute(v) => Atom::Minute(*v.get(index)?),
            Vector::Second(v) => Atom::Second(*v.get(index)?),
            Vector::Time(v) => Atom::Time(*v.get(index)?),
        })
    }
}

impl Value {
    /// A char vector, which is how query text travels.
    pub fn string(s: &str) -> Self {
        Value::Vector(Vector::Char(s.as_bytes().to_vec()))
    }

    pub fn symbol(s: impl Into<String>) -> Self {
        Value::Atom(Atom::Symbol(s.into()))
    }

    pub fn symbols<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Value::Vector(Vector::Symbol(items.into_iter().map(Into::into).collect()))
    }

    /// Classifies the value into its wire type code.
    pub fn type_code(&self) -> TypeCode {
        match self {
            Value::Atom(atom) => TypeCode::Atom(atom.kind()),
            Value::Vector(vector) => TypeCode::Vector(vector.kind()),
            Value::List(_) => TypeCode::List,
            Value::Dictionary(_) => TypeCode::Dictionary,
            Value::Table(_) => TypeCode::Table,
            Value::Null => TypeCode::Function(TypeCode::UNARY_PRIMITIVE),
            Value::Function(code) => TypeCode::Function(*code),
        }
    }

    /// Number of items, in the q sense: atoms count as one, a dictionary counts its
    /// keys and a table its rows.
    pub fn count(&self) -> usize {
        match self {
            Value::Vector(vector) => vector.len(),
            Value::List(items) => items.len(),
            Value::Dictionary(dict) => dict.len(),
            Value::Table(table) => table.rows(),
            Value::Atom(_) | Value::Null | Value::Function(_) => 1,
        }
    }

    /// Item `index` of a vector or list.
    pub fn item(&self, index: usize) -> Option<Value> {
        match self {
            Value::Vector(vector) => vector.get(index).map(Value::Atom),
            Value::List(items) => items.get(index).cloned(),
            _ => None,
        }
    }

    /// Joins a keyed table into a plain table; plain tables pass through.
    pub fn unkey(self) -> Result<Table, ValueError> {
        match self {
            Value::Table(table) => Ok(table),
            Value::Dictionary(dict) => Table::from_keyed(dict),
            _ => Err(ValueError::NotKeyed),
        }
    }
}

macro_rules! from_scalar {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::Atom(Atom::$variant(value))
                }
            }

            impl From<Vec<$ty>> for Value {
                fn from(values: Vec<$ty>) -> Self {
                    Value::Vector(Vector::$variant(values))
                }
            }
        )*
    };
}

from_scalar!(
    bool => Boolean,
    Uuid => Guid,
    i16 => Short,
    i32 => Int,
    i64 => Long,
    f32 => Real,
    f64 => Float,
    Timestamp => Timestamp,
    Month => Month,
    Date => Date,
    Datetime => Datetime,
    Timespan => Timespan,
    Minute => Minute,
    Second => Second,
    Time => Time,
);

impl From<Atom> for Value {
    fn from(value: Atom) -> Self {
        Value::Atom(value)
    }
}

impl From<Vector> for Value {
    fn from(value: Vector) -> Self {
        Value::Vector(value)
    }
}

impl From<Dictionary> for Value {
    fn from(value: Dictionary) -> Self {
        Value::Dictionary(value)
    }
}

impl From<Table> for Value {
    fn from(value: Table) -> Self {
        Value::Table(value)
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::Boolean(b) => write!(f, "{}b", *b as u8),
            Atom::Guid(g) => write!(f, "{g}"),
            Atom::Byte(b) => write!(f, "0x{b:02x}"),
            Atom::Short(i16::MIN) => f.write_str("0Nh"),
            Atom::Short(v) => write!(f, "{v}h"),
            Atom::Int(i32::MIN) => f.write_str("0Ni"),
            Atom::Int(v) => write!(f, "{v}i"),
            Atom::Long(i64::MIN) => f.write_str("0N"),
            Atom::Long(v) => write!(f, "{v}"),
            Atom::Real(v) if v.is_nan() => f.write_str("0Ne"),
            Atom::Real(v) => write!(f, "{v}e"),
            Atom::Float(v) if v.is_nan() => f.write_str("0n"),
            Atom::Float(v) => write!(f, "{v}f"),
            Atom::Char(c) => write!(f, "\"{}\"", *c as char),
            Atom::Symbol(s) => write!(f, "`{s}"),
            Atom::Timestamp(v) => write!(f, "{v}"),
            Atom::Month(v) => write!(f, "{v}"),
            Atom::Date(v) => write!(f, "{v}"),
            Atom::Datetime(v) => write!(f, "{v}"),
            Atom::Timespan(v) => write!(f, "{v}"),
            Atom::Minute(v) => write!(f, "{v}"),
            Atom::Second(v) => write!(f, "{v}"),
            Atom::Time(v) => write!(f, "{v}"),
        }
    }
}

impl fmt::Display for Vector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Vector::Char(chars) => write!(f, "\"{}\"", String::from_utf8_lossy(chars)),
            Vector::Symbol(syms) if !syms.is_empty() => {
                syms.iter().try_for_each(|s| write!(f, "`{s}"))
            }
            v if v.is_empty() => f.write_str("()"),
            v => {
                if v.len() == 1 {
                    f.write_str(",")?;
                }
                for i in 0..v.len() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    if let Some(atom) = v.get(i) {
                        write!(f, "{atom}")?;
                    }
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Atom(atom) => write!(f, "{atom}"),
            Value::Vector(vector) => write!(f, "{vector}"),
            Value::List(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(";")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
            Value::Dictionary(dict) => write!(f, "{dict}"),
            Value::Table(table) => write!(f, "{table}"),
            Value::Null => f.write_str("::"),
            Value::Function(code) => write!(f, "<function {code}>"),
        }
    }
}
