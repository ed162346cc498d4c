/*!
 * Attribute Tree
 * Nested string/number/map payloads addressed by dotted paths
 */

use crate::core::errors::PathError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A single attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Num(f64),
    Str(String),
    Map(Attributes),
}

/// Ordered attribute map
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<String, AttributeValue>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_str(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.0.insert(key.into(), AttributeValue::Str(value.into()));
        self
    }

    pub fn set_num(&mut self, key: impl Into<String>, value: f64) -> &mut Self {
        self.0.insert(key.into(), AttributeValue::Num(value));
        self
    }

    /// Edit the nested map under `key`, created when missing (replaces a leaf value)
    pub fn with_map(&mut self, key: impl Into<String>, edit: impl FnOnce(&mut Attributes)) -> &mut Self {
        let key = key.into();
        let mut nested = match self.0.remove(&key) {
            Some(AttributeValue::Map(map)) => map,
            Some(AttributeValue::Num(_) | AttributeValue::Str(_)) | None => Attributes::new(),
        };
        edit(&mut nested);
        self.0.insert(key, AttributeValue::Map(nested));
        self
    }

    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Walk `keys` from this map
    pub fn resolve(&self, keys: &[String]) -> Result<Value<'_>, PathError> {
        let (first, rest) = keys.split_first().ok_or(PathError::Empty)?;
        let mut current = self
            .0
            .get(first)
            .ok_or_else(|| PathError::NotFound(first.clone()))?;

        for key in rest {
            current = match current {
                AttributeValue::Map(map) => map
                    .0
                    .get(key)
                    .ok_or_else(|| PathError::NotFound(key.clone()))?,
                _ => return Err(PathError::NotAMap(key.clone())),
            };
        }

        Ok(Value::from(current))
    }
}

/// Borrowed view of a resolved value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    Str(&'a str),
    Num(f64),
    Map(&'a Attributes),
}

impl<'a> From<&'a AttributeValue> for Value<'a> {
    fn from(value: &'a AttributeValue) -> Self {
        match value {
            AttributeValue::Str(s) => Value::Str(s),
            AttributeValue::Num(n) => Value::Num(*n),
            AttributeValue::Map(m) => Value::Map(m),
        }
    }
}

impl Value<'_> {
    /// Numeric view; strings holding a number parse
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Num(n) => Some(*n),
            Value::Str(s) => s.trim().parse().ok(),
            Value::Map(_) => None,
        }
    }
}

impl fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            Value::Num(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Value::Num(n) => write!(f, "{}", n),
            Value::Map(m) => match serde_json::to_string(m) {
                Ok(json) => f.write_str(&json),
                Err(_) => f.write_str("{}"),
            },
        }
    }
}

/// Which sub-tree of an event a path starts from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathRoot {
    Application,
    Library(String),
}

/// What a path designates inside its sub-tree
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathTarget {
    Message,
    Attribute(Vec<String>),
}

/// Parsed dotted path
///
/// ```text
/// app.message
/// app.attrs.key2.key21
/// lib.rest.message
/// lib.rest.attrs.key1.key11
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Path {
    root: PathRoot,
    target: PathTarget,
}

impl Path {
    pub fn app_message() -> Self {
        Self {
            root: PathRoot::Application,
            target: PathTarget::Message,
        }
    }

    pub fn app_attr<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            root: PathRoot::Application,
            target: PathTarget::Attribute(keys.into_iter().map(Into::into).collect()),
        }
    }

    pub fn lib_attr<I, S>(library: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            root: PathRoot::Library(library.into()),
            target: PathTarget::Attribute(keys.into_iter().map(Into::into).collect()),
        }
    }

    pub fn root(&self) -> &PathRoot {
        &self.root
    }

    pub fn target(&self) -> &PathTarget {
        &self.target
    }
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PathError::Empty);
        }

        let invalid = || PathError::Invalid(s.to_string());
        let mut parts = s.split('.');

        let root = match parts.next() {
            Some("app") | Some("application") => PathRoot::Application,
            Some("lib") | Some("library") => match parts.next() {
                Some(name) if !name.is_empty() => PathRoot::Library(name.to_string()),
                _ => return Err(invalid()),
            },
            _ => return Err(invalid()),
        };

        let target = match parts.next() {
            Some("message") => PathTarget::Message,
            Some("attrs") => {
                let keys: Vec<String> = parts.by_ref().map(str::to_string).collect();
                if keys.is_empty() || keys.iter().any(String::is_empty) {
                    return Err(invalid());
                }
                PathTarget::Attribute(keys)
            }
            _ => return Err(invalid()),
        };

        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Self { root, target })
    }
}

impl TryFrom<String> for Path {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Path> for String {
    fn from(path: Path) -> Self {
        path.to_string()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.root {
            PathRoot::Application => f.write_str("app")?,
            PathRoot::Library(name) => write!(f, "lib.{}", name)?,
        }
        match &self.target {
            PathTarget::Message => f.write_str(".message"),
            PathTarget::Attribute(keys) => write!(f, ".attrs.{}", keys.join(".")),
        }
    }
}
