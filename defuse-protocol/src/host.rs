//! Host-side plumbing shared by the binaries: logging and the byte intake thread.

use crate::framer::{Intake, LineFramer};
use crate::line::LINE_TERMINATOR;
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

/// Verbosity level for debug output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    /// Warnings and errors only
    #[default]
    Quiet = 0,
    /// Connection events, negotiation
    Verbose = 1,
    /// Every line in and out
    Trace = 2,
    /// Individual serial bytes
    TraceUart = 3,
}

impl Verbosity {
    pub fn level_filter(self) -> log::LevelFilter {
        match self {
            Verbosity::Quiet => log::LevelFilter::Warn,
            Verbosity::Verbose => log::LevelFilter::Info,
            Verbosity::Trace => log::LevelFilter::Debug,
            Verbosity::TraceUart => log::LevelFilter::Trace,
        }
    }
}

/// Output destination for logger
enum Output {
    Stderr,
    File(BufWriter<File>),
}

/// Thread-safe logger behind the `log` facade
pub struct Logger {
    output: Arc<Mutex<Output>>,
    verbosity: Verbosity,
}

impl Logger {
    /// Create a new logger writing to stderr
    pub fn stderr(verbosity: Verbosity) -> Self {
        Logger {
            output: Arc::new(Mutex::new(Output::Stderr)),
            verbosity,
        }
    }

    /// Create a new logger writing to a file
    pub fn file(path: &str, verbosity: Verbosity) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Logger {
            output: Arc::new(Mutex::new(Output::File(BufWriter::new(file)))),
            verbosity,
        })
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    /// Make this the global logger
    pub fn install(self) -> Result<(), log::SetLoggerError> {
        let filter = self.verbosity.level_filter();
        log::set_boxed_logger(Box::new(self))?;
        log::set_max_level(filter);
        Ok(())
    }

    fn write_line(&self, msg: &str) {
        if let Ok(mut output) = self.output.lock() {
            match &mut *output {
                Output::Stderr => {
                    eprintln!("{}", msg);
                }
                Output::File(f) => {
                    let _ = writeln!(f, "{}", msg);
                    let _ = f.flush();
                }
            }
        }
    }
}

impl Clone for Logger {
    fn clone(&self) -> Self {
        Logger {
            output: self.output.clone(),
            verbosity: self.verbosity,
        }
    }
}

impl log::Log for Logger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= self.verbosity.level_filter()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        self.write_line(&format!("[{}] {}", record.level(), record.args()));
    }

    fn flush(&self) {
        if let Ok(mut output) = self.output.lock() {
            if let Output::File(f) = &mut *output {
                let _ = f.flush();
            }
        }
    }
}

/// Format bytes as hex string for debug output
pub fn fmt_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Feed everything `reader` produces into `framer` from a background thread.
///
/// The thread plays the byte-arrival role of a UART interrupt. It holds back a
/// terminator while the previous line is still waiting, so a slow main loop
/// stalls the stream instead of losing lines. Ends on EOF, on a read error or
/// once `shutdown` is set; EOF and errors also set `shutdown`.
pub fn spawn_intake<R>(
    mut reader: R,
    framer: Arc<LineFramer>,
    shutdown: Arc<AtomicBool>,
) -> io::Result<JoinHandle<()>>
where
    R: Read + Send + 'static,
{
    std::thread::Builder::new()
        .name("intake".into())
        .spawn(move || {
            let mut buf = [0u8; 256];
            'read: while !shutdown.load(Ordering::Relaxed) {
                let n = match reader.read(&mut buf) {
                    Ok(0) => {
                        log::info!("Link closed");
                        break;
                    }
                    Ok(n) => n,
                    Err(e)
                        if matches!(
                            e.kind(),
                            io::ErrorKind::WouldBlock
                                | io::ErrorKind::TimedOut
                                | io::ErrorKind::Interrupted
                        ) =>
                    {
                        continue;
                    }
                    Err(e) => {
                        log::warn!("Link read error: {}", e);
                        break;
                    }
                };
                log::trace!("<< {}", fmt_hex(&buf[..n]));

                for &byte in &buf[..n] {
                    if byte == LINE_TERMINATOR {
                        while framer.line_waiting() {
                            if shutdown.load(Ordering::Relaxed) {
                                break 'read;
                            }
                            std::thread::sleep(Duration::from_millis(1));
                        }
                    }
                    if framer.feed_byte(byte) == Intake::Overflow {
                        log::trace!("Line overflow, byte {:02X} dropped", byte);
                    }
                }
            }
            shutdown.store(true, Ordering::Relaxed);
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(Verbosity::default(), Verbosity::Quiet);
        assert_eq!(Verbosity::Quiet.level_filter(), log::LevelFilter::Warn);
        assert_eq!(Verbosity::TraceUart.level_filter(), log::LevelFilter::Trace);
        assert!(Verbosity::Trace > Verbosity::Verbose);
    }

    #[test]
    fn test_fmt_hex() {
        assert_eq!(fmt_hex(&[0x80, 0x0A, 0xFF]), "80 0A FF");
        assert_eq!(fmt_hex(&[]), "");
    }

    #[test]
    fn test_intake_does_not_drop_lines() {
        let framer = Arc::new(LineFramer::new());
        let shutdown = Arc::new(AtomicBool::new(false));
        let input = b"a:1\nb:2\nc:3\n".to_vec();
        let handle = spawn_intake(
            io::Cursor::new(input),
            framer.clone(),
            shutdown.clone(),
        )
        .unwrap();

        let mut lines = Vec::new();
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while lines.len() < 3 && std::time::Instant::now() < deadline {
            match framer.take_line() {
                Some(line) => lines.push(line.as_bytes().to_vec()),
                None => std::thread::sleep(Duration::from_millis(1)),
            }
        }
        handle.join().unwrap();

        assert_eq!(lines, vec![b"a:1".to_vec(), b"b:2".to_vec(), b"c:3".to_vec()]);
        assert_eq!(framer.dropped_lines(), 0);
        // EOF ends the intake
        assert!(shutdown.load(Ordering::Relaxed));
    }
}
