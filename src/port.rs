//! Opening the byte stream a module runs on.

use crate::parse_args::AppArgs;
use defuse_protocol::{SocketAddr, SocketConnection};
use std::io::{Read, Write};
use std::time::Duration;

/// Read timeout on both link kinds, so the intake thread can notice shutdown
const READ_TIMEOUT: Duration = Duration::from_millis(100);

pub type Reader = Box<dyn Read + Send>;
pub type Writer = Box<dyn Write + Send>;

/// Where the module's bytes come from and go to
pub enum LinkTarget {
    Serial { port: String, baud: u32 },
    Socket(SocketAddr),
}

impl std::fmt::Display for LinkTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkTarget::Serial { port, baud } => write!(f, "{} @ {} baud", port, baud),
            LinkTarget::Socket(addr) => write!(f, "{}", addr),
        }
    }
}

impl LinkTarget {
    /// Serial port if one was given, else the socket the controller listens on
    pub fn from_args(args: &AppArgs) -> Result<Self, String> {
        if let Some(port) = &args.port {
            return Ok(LinkTarget::Serial {
                port: port.clone(),
                baud: args.baud,
            });
        }
        if let Some(tcp) = &args.tcp_addr {
            return Ok(LinkTarget::Socket(SocketAddr::tcp(tcp.clone())));
        }
        let path = args
            .socket_path
            .clone()
            .unwrap_or_else(|| defuse_protocol::socket::DEFAULT_SOCKET_PATH.to_string());
        #[cfg(unix)]
        {
            Ok(LinkTarget::Socket(SocketAddr::unix(&path)))
        }
        #[cfg(not(unix))]
        {
            Err(format!(
                "Unix sockets not supported on this platform ({}), use --tcp or --port",
                path
            ))
        }
    }

    /// Open the link and split it into independent halves
    pub fn open(&self) -> Result<(Reader, Writer), Box<dyn std::error::Error>> {
        match self {
            LinkTarget::Serial { port, baud } => {
                let writer = serialport::new(port, *baud)
                    .timeout(READ_TIMEOUT)
                    .open()
                    .map_err(|e| format!("Failed to open serial port {}: {}", port, e))?;
                let reader = writer.try_clone()?;
                Ok((Box::new(reader), Box::new(writer)))
            }
            LinkTarget::Socket(addr) => {
                let conn = SocketConnection::connect(addr)?;
                conn.set_read_timeout(Some(READ_TIMEOUT))?;
                let (reader, writer) = conn.split();
                Ok((Box::new(reader), Box::new(writer)))
            }
        }
    }
}
