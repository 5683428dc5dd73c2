//! The duplex byte stream abstraction connections are built on (spec §4.6).

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::os::unix::net::UnixStream;
use std::time::Duration;

use crate::address::Address;
use crate::{Error, Result};

/// A connected, cloneable duplex byte stream. Cloning yields an independent handle to the same
/// underlying socket, which is how the connection gives the reader thread and the writer side
/// their own handles without sharing a lock across reads and writes.
pub trait Socket: Read + Write + Send {
    fn try_clone_boxed(&self) -> io::Result<Box<dyn Socket>>;
}

impl Socket for UnixStream {
    fn try_clone_boxed(&self) -> io::Result<Box<dyn Socket>> {
        Ok(Box::new(self.try_clone()?))
    }
}

impl Socket for TcpStream {
    fn try_clone_boxed(&self) -> io::Result<Box<dyn Socket>> {
        Ok(Box::new(self.try_clone()?))
    }
}

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

/// Connect to the first address in `addresses` that succeeds, logging and skipping over
/// non-final failures (spec §4.6).
pub fn connect(addresses: &[Address]) -> Result<Box<dyn Socket>> {
    let mut last_err = None;
    for (idx, addr) in addresses.iter().enumerate() {
        match connect_one(addr) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                if idx + 1 < addresses.len() {
                    tracing::warn!(?addr, error = %e, "transport attempt failed, trying next address");
                } else {
                    tracing::warn!(?addr, error = %e, "transport attempt failed, no more addresses");
                }
                last_err = Some(e);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| Error::CreateStreamFailed("no addresses given".into())))
}

fn connect_one(addr: &Address) -> Result<Box<dyn Socket>> {
    match addr {
        Address::Unix { path } => {
            let stream = UnixStream::connect(path)
                .map_err(|e| Error::CreateStreamFailed(e.to_string()))?;
            Ok(Box::new(stream))
        }
        Address::UnixAbstract { name } => {
            #[cfg(target_os = "linux")]
            {
                use std::os::linux::net::SocketAddrExt;
                use std::os::unix::net::SocketAddr;
                let sockaddr = SocketAddr::from_abstract_name(name.as_bytes())
                    .map_err(|e| Error::CreateStreamFailed(e.to_string()))?;
                let stream = UnixStream::connect_addr(&sockaddr)
                    .map_err(|e| Error::CreateStreamFailed(e.to_string()))?;
                Ok(Box::new(stream))
            }
            #[cfg(not(target_os = "linux"))]
            {
                Err(Error::CreateStreamFailed(
                    "abstract unix sockets are Linux-only".into(),
                ))
            }
        }
        Address::Tcp { host, port } => {
            let stream =
                TcpStream::connect((host.as_str(), *port)).map_err(|e| {
                    Error::CreateStreamFailed(e.to_string())
                })?;
            stream
                .set_nodelay(true)
                .map_err(|e| Error::CreateStreamFailed(e.to_string()))?;
            stream
                .set_read_timeout(Some(DEFAULT_CONNECT_TIMEOUT))
                .ok();
            Ok(Box::new(stream))
        }
    }
}
