use std::collections::BTreeMap;
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum Value {
    #[default]
    Undefined,
    Int(i64),
    /// Pure string. Owns its bytes; may hold embedded NULs.
    String(Vec<u8>),
    /// Binary data, same ownership rules as `String`.
    Data(Vec<u8>),
    Array(ArrayValue),
}

impl Value {
    pub fn integer(value: i64) -> Self {
        Value::Int(value)
    }

    pub fn boolean(flag: bool) -> Self {
        Value::Int(i64::from(flag))
    }

    pub fn string(bytes: impl Into<Vec<u8>>) -> Self {
        Value::String(bytes.into())
    }

    pub fn data(bytes: impl Into<Vec<u8>>) -> Self {
        Value::Data(bytes.into())
    }

    /// Byte length for string/data values, element count for arrays.
    pub fn len(&self) -> usize {
        match self {
            Value::String(bytes) | Value::Data(bytes) => bytes.len(),
            Value::Array(array) => array.len(),
            Value::Undefined | Value::Int(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::String(bytes) | Value::Data(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            Value::String(bytes) | Value::Data(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::String(bytes) | Value::Data(bytes) => std::str::from_utf8(bytes)
                .ok()
                .and_then(|text| text.trim().parse().ok()),
            Value::Undefined | Value::Array(_) => None,
        }
    }

    pub fn as_bool(&self) -> bool {
        match self {
            Value::Undefined => false,
            Value::Int(i) => *i != 0,
            Value::String(bytes) | Value::Data(bytes) => !bytes.is_empty() && bytes != b"0",
            Value::Array(array) => !array.is_empty(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undef",
            Value::Int(_) => "int",
            Value::String(_) => "string",
            Value::Data(_) => "data",
            Value::Array(_) => "array",
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<bool> for Value {
    fn from(flag: bool) -> Self {
        Value::boolean(flag)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::String(text.as_bytes().to_vec())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::String(text.into_bytes())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undef"),
            Value::Int(v) => write!(f, "{v}"),
            Value::String(bytes) | Value::Data(bytes) => {
                write!(f, "{}", String::from_utf8_lossy(bytes))
            }
            Value::Array(array) => write!(f, "{array}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ArrayKey {
    Index(usize),
    Name(String),
}

impl fmt::Display for ArrayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArrayKey::Index(i) => write!(f, "{i}"),
            ArrayKey::Name(name) => write!(f, "{name}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct ArrayValue {
    entries: BTreeMap<ArrayKey, Value>,
}

impl ArrayValue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vec(items: Vec<Value>) -> Self {
        let mut array = Self::new();
        for item in items {
            array.push(item);
        }
        array
    }

    /// Appends after the highest numeric index in use.
    pub fn push(&mut self, value: Value) {
        let next = self
            .entries
            .keys()
            .filter_map(|key| match key {
                ArrayKey::Index(i) => Some(i + 1),
                ArrayKey::Name(_) => None,
            })
            .max()
            .unwrap_or(0);
        self.entries.insert(ArrayKey::Index(next), value);
    }

    pub fn insert(&mut self, key: ArrayKey, value: Value) -> Option<Value> {
        self.entries.insert(key, value)
    }

    pub fn get(&self, key: &ArrayKey) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.entries.get(&ArrayKey::Index(index))
    }

    pub fn get_name(&self, name: &str) -> Option<&Value> {
        self.entries.get(&ArrayKey::Name(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ArrayKey, &Value)> {
        self.entries.iter()
    }
}

impl fmt::Display for ArrayValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        let mut first = true;
        for (key, value) in &self.entries {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            write!(f, "{key}: {value}")?;
        }
        write!(f, "]")
    }
}

/// Outcome of a built-in call. `Declined` means "no value" and is not an error;
/// the interpreter treats it as a no-op.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    Value(Value),
    Declined,
}

impl Reply {
    pub fn none() -> Self {
        Reply::Declined
    }

    pub fn is_declined(&self) -> bool {
        matches!(self, Reply::Declined)
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Reply::Value(value) => Some(value),
            Reply::Declined => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Reply::Value(value) => Some(value),
            Reply::Declined => None,
        }
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Reply::Value(value)
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Value(value) => write!(f, "{value}"),
            Reply::Declined => write!(f, "<no value>"),
        }
    }
}
