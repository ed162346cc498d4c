/*!
 * Event Representation
 * Who did what, where and when
 */

use super::attributes::{Attributes, Path, PathRoot, PathTarget, Value};
use crate::core::errors::PathError;
use crate::core::types::Nanos;
use serde::{Deserialize, Serialize};

/// Call site identity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventWhere {
    pub file: String,
    pub line: u32,
    pub function: String,
    /// Library or component the call site belongs to
    pub library: String,
}

impl EventWhere {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
            ..Default::default()
        }
    }

    pub fn with_function(mut self, function: impl Into<String>) -> Self {
        self.function = function.into();
        self
    }

    pub fn with_library(mut self, library: impl Into<String>) -> Self {
        self.library = library.into();
        self
    }

    /// `file:line`, or None for an anonymous call site
    pub fn caller(&self) -> Option<String> {
        if self.file.is_empty() {
            None
        } else {
            Some(format!("{}:{}", self.file, self.line))
        }
    }
}

/// Stable event name, the key of every configuration lookup
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventRecorder {
    pub name: String,
}

impl EventRecorder {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Message text, the paths filling its `{}` placeholders, and attributes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventMessage {
    pub message: String,
    #[serde(default)]
    pub paths: Vec<Path>,
    #[serde(default)]
    pub attributes: Attributes,
}

impl EventMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_paths(mut self, paths: Vec<Path>) -> Self {
        self.paths = paths;
        self
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }
}

/// Message attached by a network library (rest, rpc, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryMessage {
    pub name: String,
    pub message: EventMessage,
}

/// The "what" of an event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventWhat {
    pub application: EventMessage,
    #[serde(default)]
    pub library: Option<LibraryMessage>,
}

impl EventWhat {
    pub fn new(application: EventMessage) -> Self {
        Self {
            application,
            library: None,
        }
    }

    pub fn with_library(mut self, name: impl Into<String>, message: EventMessage) -> Self {
        self.library = Some(LibraryMessage {
            name: name.into(),
            message,
        });
        self
    }

    /// Resolve a dotted path against this payload
    pub fn get_value(&self, path: &Path) -> Result<Value<'_>, PathError> {
        let message = match path.root() {
            PathRoot::Application => &self.application,
            PathRoot::Library(name) => match &self.library {
                Some(lib) if &lib.name == name => &lib.message,
                _ => return Err(PathError::UnknownLibrary(name.clone())),
            },
        };

        match path.target() {
            PathTarget::Message => Ok(Value::Str(&message.message)),
            PathTarget::Attribute(keys) => message.attributes.resolve(keys),
        }
    }
}

/// Immutable record of one occurrence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRepresentation {
    pub when: Nanos,
    #[serde(rename = "where")]
    pub where_: EventWhere,
    pub who: EventRecorder,
    pub what: EventWhat,
}

impl EventRepresentation {
    #[inline]
    pub fn name(&self) -> &str {
        &self.who.name
    }
}
