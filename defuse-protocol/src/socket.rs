//! Raw byte streams over Unix sockets and TCP, standing in for the serial
//! line when modules and controller run on a host.

use std::io::{BufWriter, Read, Write};
use std::net::{TcpListener, TcpStream};
#[cfg(unix)]
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;
use std::time::Duration;

/// Default socket path for Unix sockets
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/defuse-me.sock";

/// Socket address type - either Unix socket path or TCP address
#[derive(Debug, Clone)]
pub enum SocketAddr {
    #[cfg(unix)]
    Unix(String),
    Tcp(String),
}

impl SocketAddr {
    /// Create a Unix socket address
    #[cfg(unix)]
    pub fn unix<P: AsRef<Path>>(path: P) -> Self {
        SocketAddr::Unix(path.as_ref().to_string_lossy().to_string())
    }

    /// Create a TCP socket address
    pub fn tcp<S: Into<String>>(addr: S) -> Self {
        SocketAddr::Tcp(addr.into())
    }
}

impl std::fmt::Display for SocketAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(unix)]
            SocketAddr::Unix(path) => write!(f, "{}", path),
            SocketAddr::Tcp(addr) => write!(f, "{}", addr),
        }
    }
}

enum ListenerInner {
    #[cfg(unix)]
    Unix(UnixListener),
    Tcp(TcpListener),
}

/// A socket listener that accepts connections
pub struct SocketListener {
    inner: ListenerInner,
    addr: SocketAddr,
}

impl SocketListener {
    /// Bind to a socket address and start listening
    pub fn bind(addr: &SocketAddr) -> Result<Self, std::io::Error> {
        let inner = match addr {
            #[cfg(unix)]
            SocketAddr::Unix(path) => {
                // Remove a stale socket file left by a previous run
                let _ = std::fs::remove_file(path);
                ListenerInner::Unix(UnixListener::bind(path)?)
            }
            SocketAddr::Tcp(addr_str) => ListenerInner::Tcp(TcpListener::bind(addr_str)?),
        };
        Ok(SocketListener {
            inner,
            addr: addr.clone(),
        })
    }

    /// Accept a new connection (blocking)
    pub fn accept(&self) -> Result<SocketConnection, std::io::Error> {
        match &self.inner {
            #[cfg(unix)]
            ListenerInner::Unix(listener) => {
                let (stream, _) = listener.accept()?;
                SocketConnection::new(StreamInner::Unix(stream))
            }
            ListenerInner::Tcp(listener) => {
                let (stream, _) = listener.accept()?;
                let _ = stream.set_nodelay(true);
                SocketConnection::new(StreamInner::Tcp(stream))
            }
        }
    }

    /// Get the address this listener is bound to
    pub fn addr(&self) -> &SocketAddr {
        &self.addr
    }
}

#[cfg(unix)]
impl Drop for SocketListener {
    fn drop(&mut self) {
        // Clean up Unix socket file on drop
        if let SocketAddr::Unix(path) = &self.addr {
            let _ = std::fs::remove_file(path);
        }
    }
}

enum StreamInner {
    #[cfg(unix)]
    Unix(UnixStream),
    Tcp(TcpStream),
}

impl StreamInner {
    fn try_clone(&self) -> Result<Self, std::io::Error> {
        match self {
            #[cfg(unix)]
            StreamInner::Unix(s) => Ok(StreamInner::Unix(s.try_clone()?)),
            StreamInner::Tcp(s) => Ok(StreamInner::Tcp(s.try_clone()?)),
        }
    }

    fn set_read_timeout(&self, dur: Option<Duration>) -> Result<(), std::io::Error> {
        match self {
            #[cfg(unix)]
            StreamInner::Unix(s) => s.set_read_timeout(dur),
            StreamInner::Tcp(s) => s.set_read_timeout(dur),
        }
    }

    fn shutdown(&self, how: std::net::Shutdown) -> Result<(), std::io::Error> {
        match self {
            #[cfg(unix)]
            StreamInner::Unix(s) => s.shutdown(how),
            StreamInner::Tcp(s) => s.shutdown(how),
        }
    }
}

impl Read for StreamInner {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            #[cfg(unix)]
            StreamInner::Unix(s) => s.read(buf),
            StreamInner::Tcp(s) => s.read(buf),
        }
    }
}

impl Write for StreamInner {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            #[cfg(unix)]
            StreamInner::Unix(s) => s.write(buf),
            StreamInner::Tcp(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            #[cfg(unix)]
            StreamInner::Unix(s) => s.flush(),
            StreamInner::Tcp(s) => s.flush(),
        }
    }
}

/// A connected byte stream
pub struct SocketConnection {
    reader: StreamInner,
    writer: BufWriter<StreamInner>,
}

impl SocketConnection {
    fn new(stream: StreamInner) -> Result<Self, std::io::Error> {
        let reader = stream.try_clone()?;
        Ok(SocketConnection {
            reader,
            writer: BufWriter::new(stream),
        })
    }

    /// Connect to a socket address
    pub fn connect(addr: &SocketAddr) -> Result<Self, std::io::Error> {
        match addr {
            #[cfg(unix)]
            SocketAddr::Unix(path) => Self::new(StreamInner::Unix(UnixStream::connect(path)?)),
            SocketAddr::Tcp(addr_str) => {
                let stream = TcpStream::connect(addr_str)?;
                // Lines are short; send them as soon as they are flushed
                let _ = stream.set_nodelay(true);
                Self::new(StreamInner::Tcp(stream))
            }
        }
    }

    /// Set read timeout
    pub fn set_read_timeout(&self, dur: Option<Duration>) -> Result<(), std::io::Error> {
        self.reader.set_read_timeout(dur)
    }

    /// Split into separate reader and writer halves
    pub fn split(self) -> (SocketReader, SocketWriter) {
        (
            SocketReader {
                reader: self.reader,
            },
            SocketWriter {
                writer: self.writer,
            },
        )
    }
}

/// Reader half of a split connection
pub struct SocketReader {
    reader: StreamInner,
}

impl Read for SocketReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reader.read(buf)
    }
}

/// Writer half of a split connection; buffered until flushed
pub struct SocketWriter {
    writer: BufWriter<StreamInner>,
}

impl SocketWriter {
    /// Shutdown both directions of the underlying socket
    pub fn shutdown(&self) -> Result<(), std::io::Error> {
        self.writer.get_ref().shutdown(std::net::Shutdown::Both)
    }
}

impl Write for SocketWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}
