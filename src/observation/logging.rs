/*!
 * Log Renderer
 * One JSON line per event
 */

use super::{render_value, EventView, Renderer};
use crate::configure::{LogOut, LoggingRule};
use crate::core::limits::UNKNOWN_CALLER;
use crate::event::EventMessage;
use serde_json::{Map, Value as Json};
use std::io::Write;
use tracing::info;

pub struct LogRenderer<'r> {
    rule: &'r LoggingRule,
}

impl<'r> LogRenderer<'r> {
    pub fn new(rule: &'r LoggingRule) -> Self {
        Self { rule }
    }

    /// Build the log line without writing it
    pub fn line(&self, view: &EventView<'_>) -> String {
        let data = view.data;
        let mut line = Map::new();

        line.insert(
            "caller".into(),
            Json::String(
                data.event
                    .where_
                    .caller()
                    .unwrap_or_else(|| UNKNOWN_CALLER.to_string()),
            ),
        );
        line.insert("level".into(), Json::String("info".into()));
        line.insert("time".into(), Json::String(self.rule.timestamp.format(data.when())));
        line.insert("event".into(), Json::String(data.name().to_string()));
        line.insert("event_id".into(), Json::from(data.metadata.event_id));
        line.insert("request_id".into(), Json::from(data.metadata.request_id));
        line.insert(
            "message".into(),
            Json::String(format_message(&data.event.what.application, view)),
        );

        if !self.rule.attrs.is_empty() {
            let tags: Map<String, Json> = self
                .rule
                .attrs
                .iter()
                .map(|attr| (attr.name.clone(), Json::String(view.value_or_marker(&attr.path))))
                .collect();
            line.insert("tags".into(), Json::Object(tags));
        }

        if self.rule.stacktrace {
            if let Some(trace) = &data.stacktrace {
                line.insert("stacktrace".into(), Json::String(trace.clone()));
            }
        }

        Json::Object(line).to_string()
    }
}

impl Renderer for LogRenderer<'_> {
    fn render(&self, view: &EventView<'_>) -> usize {
        let line = self.line(view);

        match self.rule.out {
            LogOut::Omit => {}
            LogOut::Stdout => {
                let _ = writeln!(std::io::stdout().lock(), "{line}");
            }
            LogOut::Stderr => {
                let _ = writeln!(std::io::stderr().lock(), "{line}");
            }
            LogOut::Tracing => {
                info!(target: "context_bus::observation", event = view.data.name(), "{line}");
            }
        }
        1
    }
}

/// Fill each `{}` of the message with the next path value
fn format_message(message: &EventMessage, view: &EventView<'_>) -> String {
    let mut values = message
        .paths
        .iter()
        .map(|path| render_value(view.what().get_value(path).map(|v| v.to_string())));

    let mut out = String::with_capacity(message.message.len());
    let mut rest = message.message.as_str();
    while let Some(at) = rest.find("{}") {
        out.push_str(&rest[..at]);
        match values.next() {
            Some(value) => out.push_str(&value),
            None => out.push_str("{}"),
        }
        rest = &rest[at + 2..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configure::{AttributeRule, TimestampFormat};
    use crate::event::{EventChain, EventWhat, Path};
    use crate::observation::testing;

    fn what() -> EventWhat {
        let mut app = EventMessage::new("order {} for {} ({})")
            .with_paths(vec![
                Path::app_attr(["order"]),
                Path::lib_attr("rest", ["user"]),
                Path::app_attr(["missing"]),
            ]);
        app.attributes_mut().set_num("order", 17.0);
        let mut lib = EventMessage::new("POST /orders");
        lib.attributes_mut().set_str("user", "ada");
        EventWhat::new(app).with_library("rest", lib)
    }

    fn parse(line: &str) -> Json {
        serde_json::from_str(line).unwrap()
    }

    #[test]
    fn test_line_fields() {
        let rule = LoggingRule {
            timestamp: TimestampFormat::UnixNanos,
            out: LogOut::Omit,
            ..Default::default()
        };
        let chain = EventChain::new();
        let data = testing::event("OrderPlaced", 1_000, what(), None);
        let line = parse(&LogRenderer::new(&rule).line(&EventView::new(&data, &chain)));

        assert_eq!(line["caller"], "src/handler.rs:7");
        assert_eq!(line["level"], "info");
        assert_eq!(line["time"], "1000");
        assert_eq!(line["event"], "OrderPlaced");
        assert_eq!(
            line["message"],
            "order 17 for ada (!error(Attribute `missing` not found))"
        );
        assert!(line.get("tags").is_none());
    }

    #[test]
    fn test_tags_with_error_marker() {
        let rule = LoggingRule {
            attrs: vec![
                AttributeRule::new("user", Path::lib_attr("rest", ["user"])),
                AttributeRule::new("route", Path::lib_attr("grpc", ["route"])),
                AttributeRule::new("msg", "lib.rest.message".parse().unwrap()),
            ],
            out: LogOut::Omit,
            ..Default::default()
        };
        let chain = EventChain::new();
        let data = testing::event("OrderPlaced", 1_000, what(), None);
        let line = parse(&LogRenderer::new(&rule).line(&EventView::new(&data, &chain)));

        assert_eq!(line["tags"]["user"], "ada");
        assert_eq!(line["tags"]["msg"], "POST /orders");
        assert!(line["tags"]["route"].as_str().unwrap().starts_with("!error("));
    }

    #[test]
    fn test_placeholders_without_paths() {
        let chain = EventChain::new();
        let data = testing::event("X", 0, testing::plain("a {} b"), None);
        let view = EventView::new(&data, &chain);
        assert_eq!(format_message(&data.event.what.application, &view), "a {} b");
    }

    #[test]
    fn test_render_counts_one() {
        let rule = LoggingRule {
            out: LogOut::Omit,
            ..Default::default()
        };
        let chain = EventChain::new();
        let data = testing::event("X", 0, testing::plain(""), None);
        assert_eq!(LogRenderer::new(&rule).render(&EventView::new(&data, &chain)), 1);
    }
}
