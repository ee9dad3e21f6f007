use std::io::Write;
use tokio::sync::broadcast;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use tracing_subscriber::fmt::MakeWriter;

/// Where formatted log lines go besides the broadcast channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Console {
    Stdout,
    /// Keeps stdout free for command output.
    Stderr,
    Off,
}

/// Tees every formatted log line to the console and to a broadcast channel
/// that the `/api/logs` endpoint streams from.
#[derive(Clone)]
pub struct BroadcastMakeWriter {
    pub sender: broadcast::Sender<String>,
    pub console: Console,
}

impl<'a> MakeWriter<'a> for BroadcastMakeWriter {
    type Writer = BroadcastWriter;

    fn make_writer(&'a self) -> Self::Writer {
        BroadcastWriter {
            sender: self.sender.clone(),
            console: self.console,
        }
    }
}

pub struct BroadcastWriter {
    sender: broadcast::Sender<String>,
    console: Console,
}

impl std::io::Write for BroadcastWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let msg = String::from_utf8_lossy(buf).to_string();
        let _ = self.sender.send(msg); // Ignored if no receivers
        match self.console {
            Console::Stdout => std::io::stdout().write_all(buf)?,
            Console::Stderr => std::io::stderr().write_all(buf)?,
            Console::Off => {}
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self.console {
            Console::Stdout => std::io::stdout().flush(),
            Console::Stderr => std::io::stderr().flush(),
            Console::Off => Ok(()),
        }
    }
}

/// Install the global subscriber. Returns the sender log lines are published
/// on. A second call keeps the first subscriber.
pub fn init(max_level: Level, console: Console) -> broadcast::Sender<String> {
    let (log_tx, _) = broadcast::channel::<String>(500);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(max_level)
        .with_writer(BroadcastMakeWriter {
            sender: log_tx.clone(),
            console,
        })
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
    log_tx
}
