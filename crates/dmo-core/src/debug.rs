use core::fmt;
use std::fs::OpenOptions;
use std::sync::Once;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::fmt::format::{self, FormatEvent, FormatFields};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, fmt as tracingfmt};

/// if `cond` is false, logs a warning with your message.
#[macro_export]
macro_rules! assert_warn {
    ($cond:expr, $($arg:tt)+) => {{
        if !$cond {
            tracing::warn!(
                target: module_path!(),
                "assertion warning: `{}` failed: {} at {}:{}",
                stringify!($cond),
                format_args!($($arg)+),
                file!(),
                line!(),
            );
        }
    }};
}

/// Formats "LEVEL slot [crate/module] file:line: message", with the message column aligned.
/// The slot is taken from an optional `ts` field on the event.
struct AlignedFormatter;

struct TsVisitor {
    ts: Option<String>,
}

impl tracing::field::Visit for TsVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        if field.name() == "ts" {
            self.ts = Some(format!("{:?}", value));
        }
    }
}

fn short_location(file_path: &str, ts_str: &str) -> String {
    let Some(src_idx) = file_path.find("/src/") else {
        return file_path.to_string();
    };
    let before_src = &file_path[..src_idx];
    let after_src = &file_path[src_idx + 5..];
    let crate_name = match before_src.rfind("dmo-") {
        Some(idx) => &before_src[idx + 4..],
        None => before_src.rsplit('/').next().unwrap_or("unknown"),
    };
    match after_src.rfind('/') {
        Some(last_slash) => {
            let first_module = after_src[..last_slash].split('/').next().unwrap_or("");
            format!("{} [{}/{}] {}", ts_str, crate_name, first_module, &after_src[last_slash + 1..])
        }
        None => format!("{} [{}] {}", ts_str, crate_name, after_src),
    }
}

impl<S, N> FormatEvent<S, N> for AlignedFormatter
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(&self, ctx: &FmtContext<'_, S, N>, mut writer: format::Writer<'_>, event: &tracing::Event<'_>) -> fmt::Result {
        let metadata = event.metadata();

        let mut visitor = TsVisitor { ts: None };
        event.record(&mut visitor);
        let has_ts = visitor.ts.is_some();
        let ts_str = visitor.ts.unwrap_or_else(|| "         ".to_string());

        let color = match *metadata.level() {
            tracing::Level::ERROR => "\x1b[31m",
            tracing::Level::WARN => "\x1b[33m",
            tracing::Level::INFO => "\x1b[32m",
            tracing::Level::DEBUG => "\x1b[34m",
            tracing::Level::TRACE => "\x1b[35m",
        };
        let location = format!(
            "{}{:<5}\x1b[0m {}:{}:",
            color,
            metadata.level(),
            short_location(metadata.file().unwrap_or("unknown"), &ts_str),
            metadata.line().unwrap_or(0)
        );

        let mut message_buf = String::new();
        ctx.field_format().format_fields(format::Writer::new(&mut message_buf), event)?;

        if has_ts {
            if let Some(ts_idx) = message_buf.find("ts=") {
                match message_buf[ts_idx..].find(' ') {
                    Some(space_idx) => message_buf.replace_range(ts_idx..ts_idx + space_idx + 1, ""),
                    None => message_buf.truncate(ts_idx),
                }
            }
        }

        // "->" and "<-" mark relayed traffic; pull them left so the payload lines up
        let mut padding = 66;
        if message_buf.starts_with("->") || message_buf.starts_with("<-") {
            padding -= 3;
        }

        write!(writer, "{:<width$} {}", location, message_buf, width = padding)?;
        writeln!(writer)
    }
}

static INIT_LOG: Once = Once::new();

fn build_filter(base: &str, directives: &[&str]) -> EnvFilter {
    let mut filter = EnvFilter::new(base);
    for d in directives {
        if let Ok(directive) = d.parse() {
            filter = filter.add_directive(directive);
        }
    }
    filter
}

/// Sets up logging with maximum verbosity (trace level)
/// Mainly for unit tests
pub fn setup_logging_verbose() {
    let _ = setup_logging(EnvFilter::new("trace"), None);
}

/// Sets up default logging to stdout and optionally, a verbose log file
/// Returns a guard, that needs to be kept alive for logging to file to work
pub fn setup_logging_default(verbose_logfile: Option<String>) -> std::io::Result<Option<WorkerGuard>> {
    let logfile_and_filter = verbose_logfile.map(|file| (file, get_default_logfile_filter()));
    setup_logging(get_default_stdout_filter(), logfile_and_filter)
}

pub fn get_default_stdout_filter() -> EnvFilter {
    build_filter(
        "info",
        &[
            // Per-slot chatter
            "dmo_core::bitbuffer=warn",
            "dmo_entities::codec=warn",
            "dmo_entities::phy=info",
            "dmo_entities::timing=info",
            "dmo_entities::sched=info",
            "dmo_entities::transport=info",
            // Protocol handling
            "dmo_entities::defrag=debug",
            "dmo_entities::callctl=debug",
            "dmo_entities::repeater=debug",
        ],
    )
}

fn get_default_logfile_filter() -> EnvFilter {
    EnvFilter::new("debug")
}

/// Sets up logging to stdout and optionally, a verbose log file.
/// If an output file is requested, returns Some(WorkerGuard). Keep this value alive
/// or logging to file may cease working.
fn setup_logging(stdout_filter: EnvFilter, outfile: Option<(String, EnvFilter)>) -> std::io::Result<Option<WorkerGuard>> {
    if let Some((outfile, outfile_filter)) = outfile {
        let file = OpenOptions::new().create(true).append(true).open(outfile)?;
        let (file_writer, guard) = tracing_appender::non_blocking(file);

        INIT_LOG.call_once(|| {
            let file_layer = tracingfmt::layer()
                .event_format(AlignedFormatter)
                .with_writer(file_writer)
                .with_ansi(false);
            let stdout_layer = tracingfmt::layer().event_format(AlignedFormatter);

            // try_init: a test binary may already have a global subscriber
            let _ = tracing_subscriber::registry()
                .with(file_layer.with_filter(outfile_filter))
                .with(stdout_layer.with_filter(stdout_filter))
                .try_init();
        });
        Ok(Some(guard))
    } else {
        INIT_LOG.call_once(|| {
            let stdout_layer = tracingfmt::layer().event_format(AlignedFormatter).with_test_writer();
            let _ = tracing_subscriber::registry().with(stdout_layer.with_filter(stdout_filter)).try_init();
        });
        Ok(None)
    }
}
