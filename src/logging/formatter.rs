use std::fmt;
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::{format::Writer, FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

/// Bracketed event format used by both the log file and stdout.
///
/// Format: `[TIMESTAMP] [LEVEL] [SPAN_PATH] [TARGET: FILE:LINE]: MESSAGE`
///
/// The span path joins every entered span from the root, so a message logged
/// while filtering a breed reads `[filter>bucket]`. Location is only
/// written when `with_location` is set; the stdout layer leaves it off.
pub struct BracketedFormatter {
    pub with_location: bool,
}

impl BracketedFormatter {
    pub fn file() -> Self {
        Self { with_location: true }
    }

    pub fn stdout() -> Self {
        Self {
            with_location: false,
        }
    }
}

impl<S, N> FormatEvent<S, N> for BracketedFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();

        let now = chrono::Local::now();
        write!(writer, "[{}] ", now.format("%Y-%m-%dT%H:%M:%S%.3f%:z"))?;
        write!(writer, "[{:5}] ", metadata.level())?;

        let span_path = ctx
            .event_scope()
            .map(|scope| {
                scope
                    .from_root()
                    .map(|span| span.name())
                    .collect::<Vec<_>>()
                    .join(">")
            })
            .filter(|path| !path.is_empty())
            .unwrap_or_else(|| {
                metadata
                    .target()
                    .rsplit("::")
                    .next()
                    .unwrap_or("main")
                    .to_string()
            });
        write!(writer, "[{}] ", span_path)?;

        match (self.with_location, metadata.file(), metadata.line()) {
            (true, Some(file), Some(line)) => {
                write!(writer, "[{}: {}:{}]: ", metadata.target(), file, line)?
            }
            _ => write!(writer, "[{}]: ", metadata.target())?,
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}
