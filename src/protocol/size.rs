use crate::value::{Atom, Value, Vector};

use super::{ProtocolError, header::VECTOR_HEADER_SIZE};

/// Exact number of bytes [`Encoder`](super::Encoder) writes for `value`, including the
/// value's own type byte.
///
/// Opaque functions have no wire form and yield [`ProtocolError::UnsupportedType`].
pub fn size_of(value: &Value) -> Result<usize, ProtocolError> {
    Ok(match value {
        Value::Atom(Atom::Symbol(s)) => 2 + s.len(),
        Value::Atom(atom) => 1 + atom.kind().width(),
        Value::Vector(Vector::Symbol(syms)) => symbols_size(syms),
        Value::Vector(vector) => VECTOR_HEADER_SIZE + vector.len() * vector.kind().width(),
        Value::List(items) => list_size(items)?,
        Value::Dictionary(dict) => 1 + size_of(dict.keys())? + size_of(dict.values())?,
        // table type, attribute, dictionary type
        Value::Table(table) => 3 + symbols_size(table.names()) + list_size(table.columns())?,
        Value::Null => 2,
        Value::Function(code) => {
            return Err(ProtocolError::UnsupportedType(format!("function (type {code})")));
        }
    })
}

pub(crate) fn symbols_size(syms: &[String]) -> usize {
    VECTOR_HEADER_SIZE + syms.iter().map(|s| s.len() + 1).sum::<usize>()
}

fn list_size(items: &[Value]) -> Result<usize, ProtocolError> {
    items
        .iter()
        .try_fold(VECTOR_HEADER_SIZE, |acc, item| Ok(acc + size_of(item)?))
}

#[cfg(test)]
mod tests {
    use crate::{Dictionary, Table};

    use super::*;

    #[test]
    fn atoms() {
        assert_eq!(size_of(&Value::from(true)).unwrap(), 2);
        assert_eq!(size_of(&Value::from(1i32)).unwrap(), 5);
        assert_eq!(size_of(&Value::from(uuid::Uuid::nil())).unwrap(), 17);
        assert_eq!(size_of(&Value::symbol("abc")).unwrap(), 5);
        assert_eq!(size_of(&Value::Null).unwrap(), 2);
    }

    #[test]
    fn vectors() {
        assert_eq!(size_of(&Value::from(vec![1i32, 2, 3])).unwrap(), 18);
        assert_eq!(size_of(&Value::from(Vec::<i64>::new())).unwrap(), 6);
        assert_eq!(size_of(&Value::symbols(["ab", "c"])).unwrap(), 6 + 3 + 2);
        assert_eq!(size_of(&Value::string("abc")).unwrap(), 9);
    }

    #[test]
    fn containers() {
        let list = Value::List(vec![Value::from(1i64), Value::symbol("x")]);
        assert_eq!(size_of(&list).unwrap(), 6 + 9 + 3);

        let dict = Dictionary::new(Value::symbols(["a"]), Value::from(vec![1i64])).unwrap();
        assert_eq!(size_of(&Value::Dictionary(dict)).unwrap(), 1 + 8 + 14);

        let table = Table::new(vec!["a".into()], vec![Value::from(vec![1i32])]).unwrap();
        assert_eq!(size_of(&Value::Table(table)).unwrap(), 3 + 8 + (6 + 10));
    }

    #[test]
    fn functions_have_no_size() {
        assert!(matches!(
            size_of(&Value::Function(100)),
            Err(ProtocolError::UnsupportedType(_))
        ));
    }
}
