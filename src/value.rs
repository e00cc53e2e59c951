//! Renderable key/value trees for ambient diagnostic data.
//!
//! Session contents, query parameters, form fields and server variables have
//! no fixed shape. They are carried as a [`Value`] tree, and anything that can
//! be displayed in a diagnostic dump implements [`Render`] to convert itself
//! into one.
//!
//! [`Value::pretty`] produces the indented `Array ( [key] => value )` layout
//! operators expect from diagnostic pages, and [`escape_html`] makes the
//! result safe to embed inside markup.
//!
//! # Examples
//!
//! ```rust
//! use faultline::value::{Render, Value};
//! use indexmap::IndexMap;
//!
//! let mut query = IndexMap::new();
//! query.insert("page".to_string(), 3);
//!
//! let value = query.to_value();
//! assert_eq!(value.pretty(), "Array\n(\n    [page] => 3\n)\n");
//! ```

use std::{
    borrow::Cow,
    collections::BTreeMap,
    fmt::{self, Write},
};

use indexmap::IndexMap;
use serde::Serialize;

/// A dynamically shaped diagnostic value.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// The absence of a value.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A floating point number.
    Float(f64),
    /// Text.
    Text(String),
    /// An ordered list; rendered with positional keys.
    List(Vec<Value>),
    /// An ordered map.
    Map(IndexMap<String, Value>),
}

impl Value {
    /// Returns the integer if this is an [`Int`](Value::Int), or text that
    /// parses as one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Returns the text if this is a [`Text`](Value::Text).
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Renders the value as an indented, human-readable tree.
    ///
    /// Scalars render as their plain text (`true` as `1`, `false` and null as
    /// nothing). Lists and maps render as `Array` blocks with one
    /// `[key] => value` line per entry.
    pub fn pretty(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_pretty(&mut out, 0);
        out
    }

    fn write_pretty(&self, out: &mut String, indent: usize) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(true) => out.write_str("1"),
            Value::Bool(false) => Ok(()),
            Value::Int(i) => write!(out, "{i}"),
            Value::Float(x) => write!(out, "{x}"),
            Value::Text(s) => out.write_str(s),
            Value::List(items) => {
                let entries = items
                    .iter()
                    .enumerate()
                    .map(|(i, v)| (Cow::Owned(i.to_string()), v));
                write_block(out, indent, entries)
            }
            Value::Map(map) => {
                let entries = map.iter().map(|(k, v)| (Cow::Borrowed(k.as_str()), v));
                write_block(out, indent, entries)
            }
        }
    }
}

fn write_block<'a>(
    out: &mut String,
    indent: usize,
    entries: impl Iterator<Item = (Cow<'a, str>, &'a Value)>,
) -> fmt::Result {
    writeln!(out, "Array")?;
    writeln!(out, "{:indent$}(", "")?;
    for (key, value) in entries {
        write!(out, "{:width$}[{key}] => ", "", width = indent + 4)?;
        value.write_pretty(out, indent + 8)?;
        writeln!(out)?;
    }
    writeln!(out, "{:indent$})", "")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pretty())
    }
}

/// Conversion into a [`Value`] tree for display in diagnostic output.
pub trait Render {
    /// Converts `self` into a [`Value`].
    fn to_value(&self) -> Value;
}

impl Render for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl Render for str {
    fn to_value(&self) -> Value {
        Value::Text(self.to_string())
    }
}

impl Render for String {
    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }
}

impl Render for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
}

impl Render for f64 {
    fn to_value(&self) -> Value {
        Value::Float(*self)
    }
}

macro_rules! render_int {
    ($($t:ty),*) => {
        $(
            impl Render for $t {
                fn to_value(&self) -> Value {
                    Value::Int(i64::from(*self))
                }
            }
        )*
    };
}

render_int!(i8, i16, i32, i64, u8, u16, u32);

impl<T: Render + ?Sized> Render for &T {
    fn to_value(&self) -> Value {
        (**self).to_value()
    }
}

impl<T: Render> Render for Option<T> {
    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, Render::to_value)
    }
}

impl<T: Render> Render for [T] {
    fn to_value(&self) -> Value {
        Value::List(self.iter().map(Render::to_value).collect())
    }
}

impl<T: Render> Render for Vec<T> {
    fn to_value(&self) -> Value {
        self.as_slice().to_value()
    }
}

impl<T: Render> Render for IndexMap<String, T> {
    fn to_value(&self) -> Value {
        Value::Map(
            self.iter()
                .map(|(k, v)| (k.clone(), v.to_value()))
                .collect(),
        )
    }
}

impl<T: Render> Render for BTreeMap<String, T> {
    fn to_value(&self) -> Value {
        Value::Map(
            self.iter()
                .map(|(k, v)| (k.clone(), v.to_value()))
                .collect(),
        )
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

macro_rules! value_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(i: $t) -> Self {
                    Value::Int(i64::from(i))
                }
            }
        )*
    };
}

value_from_int!(i32, i64, u32);

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Value::Map(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Escapes `&`, `<`, `>`, `"` and `'` for embedding in HTML.
///
/// Borrows the input when nothing needs escaping.
pub fn escape_html(s: &str) -> Cow<'_, str> {
    if !s.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len() + 16);
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Inserts `<br />` before every line break, keeping the break itself.
pub fn nl2br(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' if chars.peek() == Some(&'\n') => {
                chars.next();
                out.push_str("<br />\r\n");
            }
            '\r' | '\n' => {
                out.push_str("<br />");
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}
