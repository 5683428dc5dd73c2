//! SASL authentication handshake (spec §4.7).

use std::io::{Read, Write};

use rand::RngCore;
use sha1::{Digest, Sha1};

use crate::{Error, Result};

/// Authentication mechanisms, tried in this order by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mechanism {
    External,
    CookieSha1,
    Anonymous,
}

pub const DEFAULT_MECHANISMS: &[Mechanism] =
    &[Mechanism::External, Mechanism::CookieSha1, Mechanism::Anonymous];

fn current_uid() -> u32 {
    #[cfg(unix)]
    {
        nix::unistd::Uid::current().as_raw()
    }
    #[cfg(not(unix))]
    {
        0
    }
}

/// Read a single line terminated by `\n`, one byte at a time so no bytes belonging to a later
/// message are buffered away from the stream.
fn read_line<S: Read>(stream: &mut S) -> Result<String> {
    let mut line = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        let n = stream
            .read(&mut byte)
            .map_err(|e| Error::AuthFailed(e.to_string()))?;
        if n == 0 {
            return Err(Error::AuthFailed("unexpected EOF during handshake".into()));
        }
        if byte[0] == b'\n' {
            break;
        }
        line.push(byte[0]);
    }
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    String::from_utf8(line).map_err(|e| Error::AuthFailed(e.to_string()))
}

fn write_line<W: Write>(w: &mut W, line: &str) -> Result<()> {
    w.write_all(line.as_bytes())
        .and_then(|_| w.write_all(b"\r\n"))
        .map_err(|e| Error::AuthFailed(e.to_string()))
}

fn keyring_dir() -> Result<std::path::PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| Error::NoCookie("HOME not set".into()))?;
    Ok(std::path::PathBuf::from(home).join(".dbus-keyrings"))
}

#[cfg(unix)]
fn check_keyring_permissions(dir: &std::path::Path) -> Result<()> {
    use std::os::unix::fs::MetadataExt;
    let meta = std::fs::metadata(dir).map_err(|e| Error::NoCookie(e.to_string()))?;
    if meta.uid() != nix::unistd::Uid::current().as_raw() {
        return Err(Error::KeyringPermission);
    }
    if meta.mode() & 0o077 != 0 {
        return Err(Error::KeyringPermission);
    }
    Ok(())
}

#[cfg(not(unix))]
fn check_keyring_permissions(_dir: &std::path::Path) -> Result<()> {
    Ok(())
}

fn find_cookie(context: &str, id: &str) -> Result<String> {
    let dir = keyring_dir()?;
    check_keyring_permissions(&dir)?;
    let path = dir.join(context);
    let contents = std::fs::read_to_string(&path)
        .map_err(|e| Error::NoCookie(format!("{}: {e}", path.display())))?;
    for line in contents.lines() {
        let mut parts = line.split_whitespace();
        if let (Some(line_id), Some(_time), Some(cookie)) =
            (parts.next(), parts.next(), parts.next())
        {
            if line_id == id {
                return Ok(cookie.to_owned());
            }
        }
    }
    Err(Error::NoCookie(format!("no cookie with id {id} in {context}")))
}

fn try_external<S: Read + Write>(stream: &mut S) -> Result<String> {
    let uid = current_uid();
    write_line(stream, &format!("AUTH EXTERNAL {}", hex::encode(uid.to_string())))?;
    let reply = read_line(stream)?;
    if let Some(guid) = reply.strip_prefix("OK ") {
        Ok(guid.to_owned())
    } else {
        Err(Error::AuthFailed(format!("EXTERNAL rejected: {reply}")))
    }
}

fn try_anonymous<S: Read + Write>(stream: &mut S) -> Result<String> {
    write_line(stream, "AUTH ANONYMOUS ")?;
    let reply = read_line(stream)?;
    if let Some(guid) = reply.strip_prefix("OK ") {
        Ok(guid.to_owned())
    } else {
        Err(Error::AuthFailed(format!("ANONYMOUS rejected: {reply}")))
    }
}

fn try_cookie_sha1<S: Read + Write>(stream: &mut S) -> Result<String> {
    let uid = current_uid();
    write_line(
        stream,
        &format!("AUTH DBUS_COOKIE_SHA1 {}", hex::encode(uid.to_string())),
    )?;
    let reply = read_line(stream)?;
    let data = reply
        .strip_prefix("DATA ")
        .ok_or_else(|| Error::AuthFailed(format!("unexpected reply: {reply}")))?;
    let decoded = hex::decode(data).map_err(|e| Error::AuthFailed(e.to_string()))?;
    let decoded = String::from_utf8(decoded).map_err(|e| Error::AuthFailed(e.to_string()))?;
    let mut parts = decoded.splitn(3, ' ');
    let context = parts
        .next()
        .ok_or_else(|| Error::AuthFailed("malformed cookie challenge".into()))?;
    let id = parts
        .next()
        .ok_or_else(|| Error::AuthFailed("malformed cookie challenge".into()))?;
    let server_challenge = parts
        .next()
        .ok_or_else(|| Error::AuthFailed("malformed cookie challenge".into()))?;

    let cookie = find_cookie(context, id)?;

    let mut client_challenge = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut client_challenge);
    let client_challenge_hex = hex::encode(client_challenge);

    let mut hasher = Sha1::new();
    hasher.update(format!("{server_challenge}:{client_challenge_hex}:{cookie}"));
    let digest = hex::encode(hasher.finalize());

    let response = format!("{client_challenge_hex} {digest}");
    write_line(stream, &format!("DATA {}", hex::encode(response)))?;
    let reply = read_line(stream)?;
    if let Some(guid) = reply.strip_prefix("OK ") {
        Ok(guid.to_owned())
    } else {
        Err(Error::AuthFailed(format!(
            "DBUS_COOKIE_SHA1 rejected: {reply}"
        )))
    }
}

/// Run the client side of the handshake over an already-connected stream, returning the
/// server-assigned GUID on success.
pub fn client_handshake<S: Read + Write>(stream: &mut S, mechanisms: &[Mechanism]) -> Result<String> {
    stream
        .write_all(&[0u8])
        .map_err(|e| Error::AuthFailed(e.to_string()))?;

    let mut last_err = Error::AuthFailed("no mechanisms configured".into());
    for mechanism in mechanisms {
        let attempt = match mechanism {
            Mechanism::External => try_external(stream),
            Mechanism::CookieSha1 => try_cookie_sha1(stream),
            Mechanism::Anonymous => try_anonymous(stream),
        };
        match attempt {
            Ok(guid) => {
                write_line(stream, "BEGIN")?;
                return Ok(guid);
            }
            Err(e) => {
                tracing::debug!(?mechanism, error = %e, "auth mechanism failed");
                last_err = e;
            }
        }
    }
    Err(last_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[derive(Default)]
    struct Loopback {
        to_server: Cursor<Vec<u8>>,
        from_server: Vec<u8>,
    }

    impl Read for Loopback {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.to_server.read(buf)
        }
    }
    impl Write for Loopback {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.from_server.extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn external_writes_hex_uid_auth_line() {
        let uid = current_uid();
        let server_script = "OK 0123456789abcdef0123456789abcdef\r\n".to_owned();
        let mut io = Loopback {
            to_server: Cursor::new(server_script.into_bytes()),
            from_server: Vec::new(),
        };
        let guid = client_handshake(&mut io, &[Mechanism::External]).unwrap();
        assert_eq!(guid, "0123456789abcdef0123456789abcdef");
        let sent = String::from_utf8(io.from_server).unwrap();
        assert!(sent.starts_with('\0'));
        assert!(sent.contains(&format!("AUTH EXTERNAL {}", hex::encode(uid.to_string()))));
        assert!(sent.contains("BEGIN"));
    }

    #[test]
    fn anonymous_used_as_fallback() {
        let server_script = "REJECTED EXTERNAL\r\nOK deadbeef\r\n";
        let mut io = Loopback {
            to_server: Cursor::new(server_script.as_bytes().to_vec()),
            from_server: Vec::new(),
        };
        let guid = client_handshake(&mut io, &[Mechanism::External, Mechanism::Anonymous]).unwrap();
        assert_eq!(guid, "deadbeef");
    }
}
