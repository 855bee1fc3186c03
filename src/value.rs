use std::fmt;
use std::rc::Rc;

/// The payload produced by a successful parse.
///
/// Values are dynamically shaped: primitives produce strings, repetition and
/// sequencing produce lists, and user transforms may produce anything in
/// between. [`Value::Null`] is the "dropped" marker; sequencing combinators
/// elide it from their output lists.
///
/// Cloning is cheap for strings (shared buffer) and proportional to length
/// for lists.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// The marker for a discarded value.
    Null,
    /// A boolean.
    Bool(bool),
    /// A string, usually the matched slice of input.
    Str(Rc<str>),
    /// An ordered list of values.
    List(Vec<Value>),
}

impl Value {
    /// Creates a string value.
    #[inline]
    pub fn str(s: &str) -> Value {
        Value::Str(Rc::from(s))
    }

    /// Creates an empty-string value.
    #[inline]
    pub fn empty_str() -> Value {
        Value::Str(Rc::from(""))
    }

    /// `true` if this is the dropped-value marker.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the string contents, or `None` for non-string values.
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the list elements, or `None` for non-list values.
    #[inline]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    #[inline]
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<String> for Value {
    #[inline]
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s.as_str()))
    }
}

impl From<bool> for Value {
    #[inline]
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    #[inline]
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}
