use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use tracing_subscriber::fmt::MakeWriter;

/// Tees every formatted log line to stdout and to the broadcast channel
/// behind `/api/logs`.
#[derive(Clone)]
pub(crate) struct SseMakeWriter {
    pub sender: tokio::sync::broadcast::Sender<String>,
    pub suppress_stdout: bool,
}

impl<'a> MakeWriter<'a> for SseMakeWriter {
    type Writer = SseWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SseWriter {
            sender: self.sender.clone(),
            suppress_stdout: self.suppress_stdout,
        }
    }
}

pub(crate) struct SseWriter {
    sender: tokio::sync::broadcast::Sender<String>,
    suppress_stdout: bool,
}

impl std::io::Write for SseWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let msg = String::from_utf8_lossy(buf).to_string();
        let _ = self.sender.send(msg); // no receivers is fine
        if !self.suppress_stdout {
            std::io::stdout().write_all(buf)?;
        }
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        if !self.suppress_stdout {
            std::io::stdout().flush()?;
        }
        Ok(())
    }
}

/// Level from `QAFLOW_LOG`, defaulting to info.
pub(crate) fn level_from_env(value: Option<&str>) -> Level {
    match value.map(str::trim) {
        Some(v) if v.eq_ignore_ascii_case("warning") => Level::WARN,
        Some(v) => v.parse::<Level>().unwrap_or(Level::INFO),
        None => Level::INFO,
    }
}

/// Install the global subscriber. Returns the sender feeding the log stream.
pub(crate) fn init(suppress_stdout: bool) -> tokio::sync::broadcast::Sender<String> {
    let (log_tx, _) = tokio::sync::broadcast::channel::<String>(100);
    let level = level_from_env(std::env::var("QAFLOW_LOG").ok().as_deref());
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(SseMakeWriter {
            sender: log_tx.clone(),
            suppress_stdout,
        })
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
    log_tx
}
