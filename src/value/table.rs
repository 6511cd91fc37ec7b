use std::fmt;

use super::{Value, ValueError};

/// Positionally correlated keys and values.
///
/// A keyed table is a dictionary whose keys and values are both [`Table`]s; see
/// [`Table::from_keyed`].
#[derive(Debug, Clone, PartialEq)]
pub struct Dictionary {
    keys: Box<Value>,
    values: Box<Value>,
}

impl Dictionary {
    pub fn new(keys: Value, values: Value) -> Result<Self, ValueError> {
        if keys.count() != values.count() {
            return Err(ValueError::DictionaryLength {
                keys: keys.count(),
                values: values.count(),
            });
        }
        Ok(Self {
            keys: Box::new(keys),
            values: Box::new(values),
        })
    }

    pub fn keys(&self) -> &Value {
        &self.keys
    }

    pub fn values(&self) -> &Value {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.keys.count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value stored under the first key equal to `key`.
    pub fn get(&self, key: &Value) -> Option<Value> {
        (0..self.len())
            .find(|&i| self.keys.item(i).as_ref() == Some(key))
            .and_then(|i| self.values.item(i))
    }

    pub fn into_parts(self) -> (Value, Value) {
        (*self.keys, *self.values)
    }
}

/// Column-oriented table: named, equal-length columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    names: Vec<String>,
    columns: Vec<Value>,
}

fn is_column(value: &Value) -> bool {
    matches!(value, Value::Vector(_) | Value::List(_))
}

impl Table {
    /// Builds a table, checking that every column is a vector or list and that all
    /// columns have the same number of rows.
    pub fn new(names: Vec<String>, columns: Vec<Value>) -> Result<Self, ValueError> {
        if names.len() != columns.len() {
            return Err(ValueError::ColumnCount {
                names: names.len(),
                columns: columns.len(),
            });
        }

        let mut expected = None;
        for (name, column) in names.iter().zip(&columns) {
            if !is_column(column) {
                return Err(ValueError::NotAColumn(name.clone()));
            }
            let rows = column.count();
            match expected {
                None => expected = Some(rows),
                Some(expected) if expected != rows => {
                    return Err(ValueError::ColumnLength {
                        name: name.clone(),
                        expected,
                        actual: rows,
                    });
                }
                Some(_) => {}
            }
        }

        Ok(Self { names, columns })
    }

    /// Joins a keyed table (a dictionary of a key table to a value table) into one
    /// table. Key columns come first, each side keeps its column order.
    pub fn from_keyed(dict: Dictionary) -> Result<Self, ValueError> {
        let (keys, values) = dict.into_parts();
        match (keys, values) {
            (Value::Table(keys), Value::Table(values)) => {
                let mut names = keys.names;
                names.extend(values.names);
                let mut columns = keys.columns;
                columns.extend(values.columns);
                Table::new(names, columns)
            }
            _ => Err(ValueError::NotKeyed),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn columns(&self) -> &[Value] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Value> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| &self.columns[i])
    }

    pub fn rows(&self) -> usize {
        self.columns.first().map_or(0, Value::count)
    }

    /// Values of row `index`, in column order.
    pub fn row(&self, index: usize) -> Option<Vec<Value>> {
        self.columns.iter().map(|c| c.item(index)).collect()
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<Value>) {
        (self.names, self.columns)
    }
}

impl fmt::Display for Dictionary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let (Value::Table(keys), Value::Table(values)) = (self.keys(), self.values()) {
            let mut names = keys.names.clone();
            names.extend(values.names.iter().cloned());
            let mut columns = keys.columns.clone();
            columns.extend(values.columns.iter().cloned());
            if let Ok(joined) = Table::new(names, columns) {
                return write!(f, "{joined}");
            }
        }

        for i in 0..self.len() {
            match (self.keys.item(i), self.values.item(i)) {
                (Some(k), Some(v)) => writeln!(f, "{k}| {v}")?,
                _ => return write!(f, "{}!{}", self.keys, self.values),
            }
        }
        Ok(())
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.names.join(","))?;
        for i in 0..self.rows() {
            let row = self.row(i).unwrap_or_default();
            let cells = row.iter().map(|v| v.to_string()).collect::<Vec<_>>();
            writeln!(f, "{}", cells.join(","))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trades() -> Table {
        Table::new(
            vec!["sym".into(), "price".into()],
            vec![
                Value::symbols(["a", "b"]),
                Value::from(vec![1.0f64, 2.0]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn table_rows_and_columns() {
        let t = trades();
        assert_eq!(t.rows(), 2);
        assert_eq!(t.column("price"), Some(&Value::from(vec![1.0f64, 2.0])));
        assert_eq!(
            t.row(1),
            Some(vec![Value::symbol("b"), Value::from(2.0f64)])
        );
        assert_eq!(t.row(2), None);
    }

    #[test]
    fn unequal_columns_rejected() {
        let err = Table::new(
            vec!["a".into(), "b".into()],
            vec![Value::from(vec![1i64, 2]), Value::from(vec![1i64])],
        )
        .unwrap_err();

        assert_eq!(
            err,
            ValueError::ColumnLength {
                name: "b".into(),
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn column_count_mismatch_rejected() {
        let err = Table::new(vec!["a".into()], vec![]).unwrap_err();
        assert_eq!(err, ValueError::ColumnCount { names: 1, columns: 0 });
    }

    #[test]
    fn atom_column_rejected() {
        let err = Table::new(vec!["a".into()], vec![Value::from(1i64)]).unwrap_err();
        assert_eq!(err, ValueError::NotAColumn("a".into()));
    }

    #[test]
    fn dictionary_lengths_checked() {
        let err = Dictionary::new(Value::symbols(["a", "b"]), Value::from(vec![1i64])).unwrap_err();
        assert_eq!(err, ValueError::DictionaryLength { keys: 2, values: 1 });
    }

    #[test]
    fn dictionary_lookup() {
        let dict = Dictionary::new(Value::symbols(["a", "b"]), Value::from(vec![1i64, 2])).unwrap();
        assert_eq!(dict.get(&Value::symbol("b")), Some(Value::from(2i64)));
        assert_eq!(dict.get(&Value::symbol("c")), None);
    }

    #[test]
    fn keyed_join_puts_key_columns_first() {
        let keys = Table::new(vec!["id".into()], vec![Value::from(vec![7i64, 8])]).unwrap();
        let keyed = Dictionary::new(Value::Table(keys), Value::Table(trades())).unwrap();

        let joined = Value::Dictionary(keyed).unkey().unwrap();
        assert_eq!(joined.names(), ["id", "sym", "price"]);
        assert_eq!(joined.columns()[0], Value::from(vec![7i64, 8]));
        assert_eq!(joined.columns()[2], Value::from(vec![1.0f64, 2.0]));
    }

    #[test]
    fn keyed_join_requires_tables() {
        let dict = Dictionary::new(Value::symbols(["a"]), Value::from(vec![1i64])).unwrap();
        assert_eq!(Table::from_keyed(dict), Err(ValueError::NotKeyed));
    }

    #[test]
    fn table_display() {
        assert_eq!(trades().to_string(), "sym,price\n`a,1f\n`b,2f\n");
    }
}
