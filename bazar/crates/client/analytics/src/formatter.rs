use std::fmt;
use std::time::Duration;
use tracing::field::Visit;
use tracing::{Level, Subscriber};
use tracing_core::Field;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::{FormatTime, SystemTime};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

/// Target of the per-request events emitted by the HTTP client.
pub const HTTP_CALLS_TARGET: &str = "http_calls";

struct HttpCallEvent<'a> {
    method: &'a str,
    status: i64,
    res_len: u64,
    response_time: u128,
}

#[derive(Default)]
struct HttpCallEventVisitor {
    method: String,
    status: Option<i64>,
    res_len: Option<u64>,
    response_time: Option<u128>,
}

impl Visit for HttpCallEventVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "method" {
            self.method.clear();
            self.method.push_str(value);
        }
    }
    fn record_i64(&mut self, field: &Field, value: i64) {
        if field.name() == "status" {
            self.status = Some(value)
        }
    }
    fn record_u64(&mut self, field: &Field, value: u64) {
        match field.name() {
            "res_len" => self.res_len = Some(value),
            "response_time" => self.response_time = Some(value.into()),
            _ => {}
        }
    }
    fn record_u128(&mut self, field: &Field, value: u128) {
        if field.name() == "response_time" {
            self.response_time = Some(value)
        }
    }
    fn record_debug(&mut self, _field: &Field, _value: &dyn fmt::Debug) {}
}

impl HttpCallEventVisitor {
    fn get(&self) -> Option<HttpCallEvent<'_>> {
        if self.method.is_empty() {
            return None;
        }
        Some(HttpCallEvent {
            method: &self.method,
            status: self.status?,
            res_len: self.res_len?,
            response_time: self.response_time?,
        })
    }
}

/// Message first, then the remaining fields as `name=value`.
#[derive(Default)]
struct FieldsVisitor {
    message: String,
    fields: String,
}

impl Visit for FieldsVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            self.push(field, &value);
        }
    }
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.push(field, value);
        }
    }
}

impl FieldsVisitor {
    fn push(&mut self, field: &Field, value: &dyn fmt::Debug) {
        use fmt::Write as _;
        let _ = write!(self.fields, " {}={:?}", field.name(), value);
    }
}

/// Compact single line events: `timestamp LEVEL [target] message fields`.
///
/// INFO lines leave out the target. HTTP call events get their own layout with the status and
/// the response time.
#[derive(Debug, Default)]
pub struct CustomFormatter {
    timer: SystemTime,
}

impl CustomFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    fn format_http_call(&self, writer: &mut Writer<'_>, event: &tracing::Event<'_>, target: &str) -> fmt::Result {
        let mut visitor = HttpCallEventVisitor::default();
        event.record(&mut visitor);
        let Some(call) = visitor.get() else {
            return self.format_event_line(writer, event, &Level::DEBUG, Some(target));
        };

        self.timer.format_time(writer)?;
        let flag = if (400..=600).contains(&call.status) || call.status < 100 { "!" } else { "" };
        writeln!(
            writer,
            " HTTP {} {}{} {} bytes - {:.3?}",
            call.method,
            call.status,
            flag,
            call.res_len,
            Duration::from_micros(u64::try_from(call.response_time).unwrap_or(u64::MAX)),
        )
    }

    fn format_event_line(
        &self,
        writer: &mut Writer<'_>,
        event: &tracing::Event<'_>,
        level: &Level,
        target: Option<&str>,
    ) -> fmt::Result {
        let mut visitor = FieldsVisitor::default();
        event.record(&mut visitor);

        self.timer.format_time(writer)?;
        write!(writer, " {level:>5}")?;
        if let Some(target) = target {
            write!(writer, " {target}")?;
        }
        writeln!(writer, " {}{}", visitor.message, visitor.fields)
    }
}

impl<S, N> FormatEvent<S, N> for CustomFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(&self, _ctx: &FmtContext<'_, S, N>, mut writer: Writer<'_>, event: &tracing::Event<'_>) -> fmt::Result {
        let metadata = event.metadata();
        let level = metadata.level();
        let target = metadata.target();

        match (level, target) {
            (_, HTTP_CALLS_TARGET) => self.format_http_call(&mut writer, event, target),
            (&Level::INFO, _) => self.format_event_line(&mut writer, event, level, None),
            _ => self.format_event_line(&mut writer, event, level, Some(target)),
        }
    }
}
