//! Logging setup for hosts embedding the matlink crates.
//!
//! The libraries log through the `log` facade. [`init_logging`] bridges those
//! records into a `tracing` subscriber, filters them, and hands each one to
//! the hook installed with [`set_log_hook`] and optionally to stderr.

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::subscriber::DefaultGuard;
use tracing::Subscriber;
use tracing_log::LogTracer;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

/// Environment variable consulted when `RUST_LOG` is unset.
pub const LOG_ENV: &str = "MATLINK_LOG";

#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub ts: String,
    pub level: String,
    pub target: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<JsonValue>,
}

type LogHook = Arc<dyn Fn(&LogRecord) + Send + Sync>;

static LOG_HOOK: RwLock<Option<LogHook>> = RwLock::new(None);

pub struct LoggingGuard {
    _guard: Option<DefaultGuard>,
}

#[derive(Clone, Debug, Default)]
pub struct LoggingOptions {
    /// Also write formatted records to stderr.
    pub stderr: bool,
    /// Filter directives used instead of the environment.
    pub filter: Option<String>,
}

/// Install the hook that receives every record passing the filter.
/// Replaces any previous hook.
pub fn set_log_hook<F>(hook: F)
where
    F: Fn(&LogRecord) + Send + Sync + 'static,
{
    *LOG_HOOK.write() = Some(Arc::new(hook));
}

pub fn clear_log_hook() {
    *LOG_HOOK.write() = None;
}

/// Install the subscriber.
///
/// The first call sets the global default. Later calls install a
/// thread-scoped default that lasts as long as the returned guard.
pub fn init_logging(opts: LoggingOptions) -> LoggingGuard {
    let _ = LogTracer::init();

    let env_filter = build_filter(opts.filter.as_deref());

    let build_subscriber = || {
        let stderr_layer = opts.stderr.then(|| {
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
        });
        tracing_subscriber::registry()
            .with(env_filter.clone())
            .with(HookLayer)
            .with(stderr_layer)
    };

    let guard = match tracing::subscriber::set_global_default(build_subscriber()) {
        Ok(()) => None,
        Err(_) => Some(tracing::subscriber::set_default(build_subscriber())),
    };

    LoggingGuard { _guard: guard }
}

fn build_filter(explicit: Option<&str>) -> EnvFilter {
    let parsed = match explicit {
        Some(directives) => EnvFilter::try_new(directives).ok(),
        None => EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_from_env(LOG_ENV))
            .ok(),
    };
    parsed.unwrap_or_else(|| EnvFilter::new("info"))
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

struct HookLayer;

impl<S> Layer<S> for HookLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &tracing::Event<'_>, ctx: tracing_subscriber::layer::Context<'_, S>) {
        let Some(hook) = LOG_HOOK.read().clone() else {
            return;
        };

        let mut visitor = JsonVisitor::default();
        event.record(&mut visitor);

        // records bridged from `log` carry their origin in `log.*` fields
        let meta = event.metadata();
        let target = visitor
            .log_target
            .take()
            .unwrap_or_else(|| meta.target().to_string());

        let record = LogRecord {
            ts: now_rfc3339(),
            level: meta.level().to_string(),
            target,
            message: visitor.message.unwrap_or_else(|| meta.name().to_string()),
            span: ctx.lookup_current().map(|span| span.name().to_string()),
            fields: visitor.fields.filter(|map| {
                map.as_object().map(|m| !m.is_empty()).unwrap_or(false)
            }),
        };

        hook(&record);
    }
}

#[derive(Default)]
struct JsonVisitor {
    message: Option<String>,
    log_target: Option<String>,
    fields: Option<JsonValue>,
}

impl JsonVisitor {
    fn insert(&mut self, name: &str, entry: JsonValue) {
        match name {
            "message" => self.message = entry.as_str().map(str::to_string),
            "log.target" => self.log_target = entry.as_str().map(str::to_string),
            name if name.starts_with("log.") => {}
            name => {
                let obj = self
                    .fields
                    .get_or_insert_with(|| JsonValue::Object(Default::default()));
                if let JsonValue::Object(map) = obj {
                    map.insert(name.to_string(), entry);
                }
            }
        }
    }
}

impl tracing::field::Visit for JsonVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.insert(field.name(), JsonValue::String(format!("{value:?}")));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.insert(field.name(), JsonValue::String(value.to_string()));
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.insert(field.name(), JsonValue::from(value));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.insert(field.name(), JsonValue::from(value));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.insert(field.name(), JsonValue::Bool(value));
    }
}
