//! # Logging
//!
//! `tracing` setup for the player core.
//!
//! Every event goes to stderr through a `tracing-subscriber` fmt layer and,
//! when the host supplies a [`LoggerSink`], is mirrored to it as a
//! [`LogEntry`]. Mirrored entries carry the id of the player they concern:
//! either a `player_id` field on the event itself or the nearest enclosing
//! span that recorded one (the backends open such a span around create and
//! dispose).
//!
//! ```ignore
//! use bridge_traits::log::{LogLevel, StderrLogger};
//! use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
//!
//! init_logging(
//!     LoggingConfig::default()
//!         .with_format(LogFormat::Compact)
//!         .with_level(LogLevel::Debug)
//!         .with_logger_sink(Arc::new(StderrLogger::default())),
//! )?;
//! ```
//!
//! License-server URLs may carry credentials; pass them through
//! [`redact_url`] before logging.

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::sync::Arc;

use bridge_traits::log::{LogEntry, LogLevel, LoggerSink, DEFAULT_LOG_TAG};
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing::{Event, Subscriber};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::{LookupSpan, Registry};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use crate::error::{Error, Result};

/// Field name that attributes a record to a player.
pub const PLAYER_ID_FIELD: &str = "player_id";

const WORKSPACE_TARGETS: &[&str] = &[
    "core_runtime",
    "core_native",
    "core_bridge",
    "core_drm",
    "core_playback",
    "core_service",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, for a developer terminal
    Pretty,
    /// One JSON object per line
    Json,
    /// One short line per event, the on-device default
    Compact,
}

impl Default for LogFormat {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Compact
        }
    }
}

#[derive(Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Level applied to the workspace crates by the default filter
    pub level: LogLevel,
    /// Full `EnvFilter` directive string replacing the default filter
    pub filter: Option<String>,
    pub logger_sink: Option<Arc<dyn LoggerSink>>,
    /// dlog tag stamped on mirrored entries
    pub tag: String,
    /// Log span open and close on stderr
    pub span_events: bool,
    /// Show thread ids and names; callbacks arrive on native threads
    pub thread_info: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::Info,
            filter: None,
            logger_sink: None,
            tag: DEFAULT_LOG_TAG.to_string(),
            span_events: false,
            thread_info: true,
        }
    }
}

impl fmt::Debug for LoggingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingConfig")
            .field("format", &self.format)
            .field("level", &self.level)
            .field("filter", &self.filter)
            .field("logger_sink", &self.logger_sink.as_ref().map(|_| "LoggerSink { ... }"))
            .field("tag", &self.tag)
            .field("span_events", &self.span_events)
            .field("thread_info", &self.thread_info)
            .finish()
    }
}

impl LoggingConfig {
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn with_span_events(mut self, enable: bool) -> Self {
        self.span_events = enable;
        self
    }

    pub fn with_thread_info(mut self, enable: bool) -> Self {
        self.thread_info = enable;
        self
    }
}

/// Install the global subscriber.
///
/// Call once per process. A second call, or any other subscriber already
/// installed, yields `Error::Config`.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = build_filter(&config)?;
    let sink_layer = config
        .logger_sink
        .clone()
        .map(|sink| LoggerSinkLayer::new(sink, config.tag.clone()));

    tracing_subscriber::registry()
        .with(stderr_layer(&config))
        .with(sink_layer)
        .with(filter)
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize logging: {e}")))
}

fn level_directive(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Trace => "trace",
        LogLevel::Debug => "debug",
        LogLevel::Info => "info",
        LogLevel::Warn => "warn",
        LogLevel::Error => "error",
    }
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let directives = match &config.filter {
        Some(custom) => custom.clone(),
        None => {
            let level = level_directive(config.level);
            std::iter::once("warn".to_string())
                .chain(WORKSPACE_TARGETS.iter().map(|target| format!("{target}={level}")))
                .collect::<Vec<_>>()
                .join(",")
        }
    };
    EnvFilter::try_new(&directives).map_err(|e| Error::Config(format!("Invalid log filter {directives:?}: {e}")))
}

fn stderr_layer(config: &LoggingConfig) -> Box<dyn Layer<Registry> + Send + Sync> {
    let span_events = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_thread_ids(config.thread_info)
        .with_thread_names(config.thread_info)
        .with_span_events(span_events);

    match config.format {
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Json => layer.json().flatten_event(true).with_current_span(true).boxed(),
        LogFormat::Compact => layer.compact().boxed(),
    }
}

/// Player id remembered on a span.
struct PlayerTag(i64);

/// Mirrors events into the host [`LoggerSink`].
struct LoggerSinkLayer {
    sink: Arc<dyn LoggerSink>,
    tag: String,
}

impl LoggerSinkLayer {
    fn new(sink: Arc<dyn LoggerSink>, tag: String) -> Self {
        Self { sink, tag }
    }

    fn remember_player<S>(span: Option<tracing_subscriber::registry::SpanRef<'_, S>>, player_id: Option<i64>)
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        if let (Some(span), Some(player_id)) = (span, player_id) {
            span.extensions_mut().replace(PlayerTag(player_id));
        }
    }
}

impl<S> Layer<S> for LoggerSinkLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut fields = FieldCollector::default();
        attrs.record(&mut fields);
        Self::remember_player(ctx.span(id), fields.player_id);
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let mut fields = FieldCollector::default();
        values.record(&mut fields);
        Self::remember_player(ctx.span(id), fields.player_id);
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let level = log_level(*metadata.level());
        if level < self.sink.min_level() {
            return;
        }

        let mut fields = FieldCollector::default();
        event.record(&mut fields);
        let player_id = fields.player_id.or_else(|| {
            ctx.event_scope(event)?
                .find_map(|span| span.extensions().get::<PlayerTag>().map(|tag| tag.0))
        });

        let mut entry = LogEntry::new(
            level,
            metadata.target(),
            fields.message.unwrap_or_else(|| metadata.name().to_string()),
        )
        .with_tag(self.tag.as_str());
        entry.player_id = player_id;
        entry.fields = fields.fields;

        if let Err(err) = self.sink.log(entry) {
            eprintln!("host logger rejected entry: {err}");
        }
    }
}

#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    player_id: Option<i64>,
    fields: BTreeMap<String, String>,
}

impl FieldCollector {
    fn store(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = Some(value),
            name => {
                self.fields.insert(name.to_string(), value);
            }
        }
    }
}

impl Visit for FieldCollector {
    fn record_i64(&mut self, field: &Field, value: i64) {
        if field.name() == PLAYER_ID_FIELD {
            self.player_id = Some(value);
        } else {
            self.store(field, value.to_string());
        }
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        match i64::try_from(value) {
            Ok(value) if field.name() == PLAYER_ID_FIELD => self.player_id = Some(value),
            _ => self.store(field, value.to_string()),
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.store(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.store(field, value.to_string());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.store(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.store(field, format!("{value:?}"));
    }
}

fn log_level(level: tracing::Level) -> LogLevel {
    match level {
        tracing::Level::TRACE => LogLevel::Trace,
        tracing::Level::DEBUG => LogLevel::Debug,
        tracing::Level::INFO => LogLevel::Info,
        tracing::Level::WARN => LogLevel::Warn,
        tracing::Level::ERROR => LogLevel::Error,
    }
}

/// Drop credentials and everything after `?` or `#` from a URL.
///
/// `https://user:pw@lic.example.com/wv?token=abc` becomes
/// `https://lic.example.com/wv?[REDACTED]`.
pub fn redact_url(url: &str) -> String {
    let (base, had_query) = match url.find(['?', '#']) {
        Some(pos) => (&url[..pos], true),
        None => (url, false),
    };

    let base = match base.find("://") {
        Some(scheme_end) => {
            let authority_start = scheme_end + 3;
            let rest = &base[authority_start..];
            let authority_end = rest.find('/').unwrap_or(rest.len());
            match rest[..authority_end].rfind('@') {
                Some(at) => format!("{}{}", &base[..authority_start], &rest[at + 1..]),
                None => base.to_string(),
            }
        }
        None => base.to_string(),
    };

    if had_query {
        format!("{base}?[REDACTED]")
    } else {
        base
    }
}

/// Basename of a library path, for shorter log lines.
pub fn strip_path(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
