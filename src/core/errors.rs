/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Attribute path errors (parsing and resolution)
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum PathError {
    #[error("Empty attribute path")]
    #[diagnostic(
        code(path::empty),
        help("Paths look like `app.message` or `lib.<name>.attrs.<key>`.")
    )]
    Empty,

    #[error("Invalid attribute path `{0}`")]
    #[diagnostic(
        code(path::invalid),
        help("Roots are `app`/`application` and `lib`/`library`, followed by `message` or `attrs.<key>...`.")
    )]
    Invalid(String),

    #[error("Library `{0}` not present on event")]
    #[diagnostic(code(path::unknown_library))]
    UnknownLibrary(String),

    #[error("Attribute `{0}` not found")]
    #[diagnostic(code(path::not_found))]
    NotFound(String),

    #[error("Attribute `{0}` is a leaf value and has no children")]
    #[diagnostic(code(path::not_a_map))]
    NotAMap(String),
}

/// Event chain integrity errors
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum ChainError {
    #[error("No previous event recorded for `{0}`")]
    #[diagnostic(
        code(chain::missing_previous),
        help("An End/Inter observation was submitted without a preceding Start/Inter in this request.")
    )]
    MissingPrevious(String),

    #[error("Link from slot {slot} points forward to {prev}")]
    #[diagnostic(code(chain::forward_link))]
    ForwardLink { slot: usize, prev: usize },
}

/// Prerequisite evaluation errors
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum ReactionError {
    #[error("Snapshot holds {actual} slots, tree has {expected} nodes")]
    #[diagnostic(
        code(reaction::snapshot_mismatch),
        help("The snapshot was initialized against a different configuration.")
    )]
    SnapshotMismatch { expected: usize, actual: usize },
}

/// Configuration compilation errors
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum ConfigureError {
    #[error("Reaction `{0}` has an empty prerequisite tree")]
    #[diagnostic(code(configure::empty_tree))]
    EmptyTree(String),

    #[error("Reaction `{reaction}`: node id {id} is duplicated or out of range")]
    #[diagnostic(
        code(configure::bad_node_id),
        help("Node ids must be dense: 0..n, each used once.")
    )]
    BadNodeId { reaction: String, id: usize },

    #[error("Reaction `{reaction}`: node {node} references missing node {missing}")]
    #[diagnostic(code(configure::missing_node))]
    MissingNode {
        reaction: String,
        node: usize,
        missing: usize,
    },

    #[error("Reaction `{reaction}` must have exactly one root, found {found}")]
    #[diagnostic(code(configure::root_count))]
    RootCount { reaction: String, found: usize },

    #[error("Reaction `{reaction}`: node {node} declares parent {declared:?} but is listed under {actual:?}")]
    #[diagnostic(
        code(configure::parent_mismatch),
        help("Every non-root node needs exactly one parent, matching its parent's child list.")
    )]
    ParentMismatch {
        reaction: String,
        node: usize,
        declared: Option<usize>,
        actual: Option<usize>,
    },

    #[error("Reaction `{reaction}`: logic node {node} has no children")]
    #[diagnostic(code(configure::empty_logic))]
    EmptyLogic { reaction: String, node: usize },

    #[error("Reaction `{reaction}`: node {node} is unreachable from the root")]
    #[diagnostic(code(configure::unreachable))]
    Unreachable { reaction: String, node: usize },

    #[error("Invalid path in configuration: {0}")]
    #[diagnostic(code(configure::path))]
    Path(#[from] PathError),

    #[error("Invalid timestamp format `{0}`")]
    #[diagnostic(code(configure::timestamp_format))]
    TimestampFormat(String),

    #[error("Malformed configuration document: {0}")]
    #[diagnostic(code(configure::decode))]
    Decode(String),
}

/// Unified bus error type with miette diagnostics
#[derive(Error, Debug, Diagnostic)]
pub enum BusError {
    #[error("Configure error: {0}")]
    #[diagnostic(transparent)]
    Configure(#[from] ConfigureError),

    #[error("Chain error: {0}")]
    #[diagnostic(transparent)]
    Chain(#[from] ChainError),

    #[error("Reaction error: {0}")]
    #[diagnostic(transparent)]
    Reaction(#[from] ReactionError),

    #[error("Tracer initialization failed: {0}")]
    #[diagnostic(
        code(bus::tracer_init),
        help("The bus does not run without a tracer. Check the tracer backend.")
    )]
    TracerInit(String),

    #[error("Observation bus loop is already running")]
    #[diagnostic(code(bus::already_running))]
    AlreadyRunning,

    #[error("Payload codec error: {0}")]
    #[diagnostic(code(bus::codec))]
    Codec(String),
}

impl From<bincode::Error> for BusError {
    fn from(err: bincode::Error) -> Self {
        BusError::Codec(err.to_string())
    }
}

impl From<serde_json::Error> for ConfigureError {
    fn from(err: serde_json::Error) -> Self {
        ConfigureError::Decode(err.to_string())
    }
}

/// Result type for bus operations
pub type Result<T> = std::result::Result<T, BusError>;
