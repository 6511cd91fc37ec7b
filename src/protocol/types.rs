//! Wire type codes.
//!
//! Every value on the wire starts with a signed type byte. Negative codes are atoms,
//! `0` is the generic list, `1..=19` are typed vectors sharing their element layout with
//! the atom of the negated code, `98` is a table, `99` a dictionary and `100..` are
//! functions.
use super::error::MalformedCause;

/// Element kind of atoms and typed vectors. The discriminant is the vector code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i8)]
pub enum Kind {
    Boolean = 1,
    Guid = 2,
    Byte = 4,
    Short = 5,
    Int = 6,
    Long = 7,
    Real = 8,
    Float = 9,
    Char = 10,
    Symbol = 11,
    Timestamp = 12,
    Month = 13,
    Date = 14,
    Datetime = 15,
    Timespan = 16,
    Minute = 17,
    Second = 18,
    Time = 19,
}

impl Kind {
    /// Bytes per element; `0` for symbols, which are NUL-terminated.
    pub const fn width(self) -> usize {
        match self {
            Kind::Boolean | Kind::Byte | Kind::Char => 1,
            Kind::Guid => 16,
            Kind::Short => 2,
            Kind::Int | Kind::Real | Kind::Month | Kind::Date => 4,
            Kind::Minute | Kind::Second | Kind::Time => 4,
            Kind::Long | Kind::Float | Kind::Timestamp | Kind::Datetime | Kind::Timespan => 8,
            Kind::Symbol => 0,
        }
    }

    pub const fn code(self) -> i8 {
        self as i8
    }

    fn from_code(code: i8) -> Option<Self> {
        Some(match code {
            1 => Kind::Boolean,
            2 => Kind::Guid,
            4 => Kind::Byte,
            5 => Kind::Short,
            6 => Kind::Int,
            7 => Kind::Long,
            8 => Kind::Real,
            9 => Kind::Float,
            10 => Kind::Char,
            11 => Kind::Symbol,
            12 => Kind::Timestamp,
            13 => Kind::Month,
            14 => Kind::Date,
            15 => Kind::Datetime,
            16 => Kind::Timespan,
            17 => Kind::Minute,
            18 => Kind::Second,
            19 => Kind::Time,
            _ => return None,
        })
    }
}

/// Classification of a wire type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCode {
    Atom(Kind),
    List,
    Vector(Kind),
    Table,
    Dictionary,
    Function(i8),
}

impl TypeCode {
    pub const TABLE: i8 = 98;
    pub const DICTIONARY: i8 = 99;
    pub const LAMBDA: i8 = 100;
    /// Unary primitives; `::` is the unary primitive with marker `0`.
    pub const UNARY_PRIMITIVE: i8 = 101;
    /// Operators and iterators up to this code carry a single marker byte.
    pub const LAST_MARKED: i8 = 103;

    pub const fn code(self) -> i8 {
        match self {
            TypeCode::Atom(kind) => -kind.code(),
            TypeCode::List => 0,
            TypeCode::Vector(kind) => kind.code(),
            TypeCode::Table => Self::TABLE,
            TypeCode::Dictionary => Self::DICTIONARY,
            TypeCode::Function(code) => code,
        }
    }

    pub const fn width(self) -> usize {
        match self {
            TypeCode::Atom(kind) | TypeCode::Vector(kind) => kind.width(),
            _ => 0,
        }
    }
}

impl TryFrom<i8> for TypeCode {
    type Error = MalformedCause;

    fn try_from(code: i8) -> Result<Self, Self::Error> {
        let unknown = || MalformedCause::UnknownType(code);
        match code {
            0 => Ok(TypeCode::List),
            Self::TABLE => Ok(TypeCode::Table),
            Self::DICTIONARY => Ok(TypeCode::Dictionary),
            Self::LAMBDA.. => Ok(TypeCode::Function(code)),
            1.. => Kind::from_code(code).map(TypeCode::Vector).ok_or_else(unknown),
            _ => code
                .checked_neg()
                .and_then(Kind::from_code)
                .map(TypeCode::Atom)
                .ok_or_else(unknown),
        }
    }
}

/// Per-element width of a wire type code; `0` for variable-width and container codes.
pub fn width_of(code: i8) -> usize {
    TypeCode::try_from(code).map_or(0, TypeCode::width)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atom_and_vector_share_width() {
        assert_eq!(width_of(6), 4);
        assert_eq!(width_of(-6), 4);
        assert_eq!(width_of(2), 16);
        assert_eq!(width_of(12), 8);
        assert_eq!(width_of(11), 0);
        assert_eq!(width_of(0), 0);
    }

    #[test]
    fn code_classification() {
        assert_eq!(TypeCode::try_from(-7).unwrap(), TypeCode::Atom(Kind::Long));
        assert_eq!(TypeCode::try_from(14).unwrap(), TypeCode::Vector(Kind::Date));
        assert_eq!(TypeCode::try_from(0).unwrap(), TypeCode::List);
        assert_eq!(TypeCode::try_from(98).unwrap(), TypeCode::Table);
        assert_eq!(TypeCode::try_from(99).unwrap(), TypeCode::Dictionary);
        assert_eq!(TypeCode::try_from(104).unwrap(), TypeCode::Function(104));
    }

    #[test]
    fn unknown_codes_rejected() {
        for code in [3, -3, 20, 97, -20, i8::MIN] {
            assert!(TypeCode::try_from(code).is_err(), "code {code}");
        }
    }

    #[test]
    fn codes_round_trip() {
        for code in (-19..=19).chain([98, 99, 100, 127]) {
            if let Ok(t) = TypeCode::try_from(code) {
                assert_eq!(t.code(), code);
            }
        }
    }
}
