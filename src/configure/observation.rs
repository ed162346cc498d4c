/*!
 * Observation Rules
 * Per event name: chain position and what to log, trace and measure
 */

use crate::core::errors::ConfigureError;
use crate::core::types::Nanos;
use crate::event::Path;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::format_description::{self, OwnedFormatItem};
use time::OffsetDateTime;

/// Position of an event in its causal chain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationType {
    /// Stands alone; no link created or consumed
    #[default]
    Single,
    /// Opens a chain link
    Start,
    /// Opens a new link and closes the previous one
    Inter,
    /// Closes the active link
    End,
}

impl ObservationType {
    /// Allocates a new event context
    #[inline]
    pub fn opens(self) -> bool {
        matches!(self, ObservationType::Start | ObservationType::Inter)
    }

    /// Attaches the previous chain event
    #[inline]
    pub fn closes(self) -> bool {
        matches!(self, ObservationType::Inter | ObservationType::End)
    }
}

/// Timestamp rendering of log lines
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampFormat {
    #[default]
    Rfc3339,
    UnixNanos,
    /// `time` format description, e.g. `[hour]:[minute]:[second]`
    Custom(CustomTimestamp),
}

impl TimestampFormat {
    pub fn custom(format: impl Into<String>) -> Result<Self, ConfigureError> {
        CustomTimestamp::try_from(format.into()).map(TimestampFormat::Custom)
    }

    /// Render `when`; falls back to raw nanos when the instant is out of range
    pub fn format(&self, when: Nanos) -> String {
        let Ok(instant) = OffsetDateTime::from_unix_timestamp_nanos(i128::from(when)) else {
            return when.to_string();
        };

        let rendered = match self {
            TimestampFormat::UnixNanos => return when.to_string(),
            TimestampFormat::Rfc3339 => instant.format(&Rfc3339).ok(),
            TimestampFormat::Custom(custom) => instant.format(&custom.items).ok(),
        };
        rendered.unwrap_or_else(|| when.to_string())
    }
}

/// Format description compiled once, when the rule is decoded
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CustomTimestamp {
    source: String,
    items: OwnedFormatItem,
}

impl CustomTimestamp {
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl TryFrom<String> for CustomTimestamp {
    type Error = ConfigureError;

    fn try_from(source: String) -> Result<Self, Self::Error> {
        let parsed = format_description::parse(&source).map(OwnedFormatItem::from);
        match parsed {
            Ok(items) => Ok(Self { source, items }),
            Err(_) => Err(ConfigureError::TimestampFormat(source)),
        }
    }
}

impl From<CustomTimestamp> for String {
    fn from(custom: CustomTimestamp) -> Self {
        custom.source
    }
}

impl PartialEq for CustomTimestamp {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for CustomTimestamp {}

/// Named attribute selected by path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeRule {
    pub name: String,
    pub path: Path,
}

impl AttributeRule {
    pub fn new(name: impl Into<String>, path: Path) -> Self {
        Self {
            name: name.into(),
            path,
        }
    }
}

/// Log line destination
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogOut {
    /// Render and count, print nothing
    Omit,
    #[default]
    Stdout,
    Stderr,
    /// Hand the line to the `tracing` subscriber
    Tracing,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingRule {
    #[serde(default)]
    pub timestamp: TimestampFormat,
    #[serde(default)]
    pub attrs: Vec<AttributeRule>,
    #[serde(default)]
    pub out: LogOut,
    #[serde(default)]
    pub stacktrace: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TracingRule {
    /// Operation name of the finished span
    pub name: String,
    /// Earlier event that opened the span; empty rules only pre-allocate
    #[serde(default)]
    pub prev_name: Option<String>,
    #[serde(default)]
    pub attrs: Vec<AttributeRule>,
    #[serde(default)]
    pub stacktrace: bool,
}

impl TracingRule {
    /// Closes a span opened by an earlier event
    #[inline]
    pub fn closes_span(&self) -> bool {
        self.prev_name.as_deref().is_some_and(|name| !name.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
    Summary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsRule {
    #[serde(rename = "type")]
    pub kind: MetricKind,
    pub name: String,
    #[serde(default)]
    pub attrs: Vec<AttributeRule>,
    /// Reference event for histogram / summary latencies
    #[serde(default)]
    pub prev_name: Option<String>,
    /// Numeric attribute sampled by gauges
    #[serde(default)]
    pub value: Option<Path>,
}

/// Everything done with one event name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationConfigure {
    #[serde(rename = "type", default)]
    pub kind: ObservationType,
    #[serde(default)]
    pub logging: Option<LoggingRule>,
    #[serde(default)]
    pub tracing: Option<TracingRule>,
    #[serde(default)]
    pub metrics: Vec<MetricsRule>,
}

impl ObservationConfigure {
    /// Single log line to stdout, used when a tenant declares no rules at all
    pub fn default_rule() -> Self {
        Self {
            kind: ObservationType::Single,
            logging: Some(LoggingRule::default()),
            tracing: None,
            metrics: Vec::new(),
        }
    }

    /// Any renderer asks for a stacktrace
    pub fn wants_stacktrace(&self) -> bool {
        self.logging.as_ref().is_some_and(|l| l.stacktrace)
            || self.tracing.as_ref().is_some_and(|t| t.stacktrace)
    }

    /// Whether submission should pre-allocate a span id for this event
    pub fn opens_span(&self) -> bool {
        self.tracing.as_ref().is_some_and(|t| !t.closes_span())
    }
}
