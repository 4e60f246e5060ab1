//! Byte stream plumbing. Establishing connections is the caller's business;
//! the codecs only need a reader, a writer and a way to shut both down.

use std::io::{self, ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream};
#[cfg(unix)]
use std::os::unix::net::UnixStream;

/// Shuts a connection down in both directions, unblocking any reader or
/// writer parked on it.
pub trait Close: Send + Sync {
    fn close(&self) -> io::Result<()>;
}

fn ignore_not_connected(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(err) if err.kind() == ErrorKind::NotConnected => Ok(()),
        other => other,
    }
}

impl Close for TcpStream {
    fn close(&self) -> io::Result<()> {
        ignore_not_connected(self.shutdown(Shutdown::Both))
    }
}

#[cfg(unix)]
impl Close for UnixStream {
    fn close(&self) -> io::Result<()> {
        ignore_not_connected(self.shutdown(Shutdown::Both))
    }
}

impl<F> Close for F
where
    F: Fn() -> io::Result<()> + Send + Sync,
{
    fn close(&self) -> io::Result<()> {
        self()
    }
}

/// A bidirectional stream split into independently owned halves.
pub struct Conn {
    pub(crate) reader: Box<dyn Read + Send>,
    pub(crate) writer: Box<dyn Write + Send>,
    pub(crate) closer: Box<dyn Close>,
    label: String,
}

impl Conn {
    pub fn from_parts<R, W, C>(reader: R, writer: W, closer: C, label: impl Into<String>) -> Self
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
        C: Close + 'static,
    {
        Self {
            reader: Box::new(reader),
            writer: Box::new(writer),
            closer: Box::new(closer),
            label: label.into(),
        }
    }

    pub fn tcp(stream: TcpStream) -> io::Result<Self> {
        stream.set_nodelay(true)?;
        let label = match stream.peer_addr() {
            Ok(addr) => format!("tcp:{addr}"),
            Err(_) => "tcp".to_string(),
        };
        let reader = stream.try_clone()?;
        let closer = stream.try_clone()?;
        Ok(Self::from_parts(reader, stream, closer, label))
    }

    #[cfg(unix)]
    pub fn unix(stream: UnixStream) -> io::Result<Self> {
        let path = stream
            .peer_addr()
            .ok()
            .and_then(|addr| addr.as_pathname().map(|path| path.display().to_string()));
        let label = match path {
            Some(path) => format!("unix:{path}"),
            None => "unix".to_string(),
        };
        let reader = stream.try_clone()?;
        let closer = stream.try_clone()?;
        Ok(Self::from_parts(reader, stream, closer, label))
    }

    /// Human readable peer description used in log lines.
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl std::fmt::Debug for Conn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conn").field("label", &self.label).finish_non_exhaustive()
    }
}

/// Connects to `address` over `network`, which is `"tcp"` or `"unix"`.
pub fn dial(network: &str, address: &str) -> io::Result<Conn> {
    match network {
        "tcp" | "tcp4" | "tcp6" => Conn::tcp(TcpStream::connect(address)?),
        #[cfg(unix)]
        "unix" => Conn::unix(UnixStream::connect(address)?),
        other => Err(io::Error::new(
            ErrorKind::InvalidInput,
            format!("unsupported network '{other}'"),
        )),
    }
}

/// A connected pair of in-process connections.
#[cfg(unix)]
pub fn pipe() -> io::Result<(Conn, Conn)> {
    let (left, right) = UnixStream::pair()?;
    Ok((Conn::unix(left)?, Conn::unix(right)?))
}
