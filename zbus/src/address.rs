//! Bus address parsing (spec §4.6, §6).

use std::collections::HashMap;

use crate::{Error, Result};

/// One transport alternative out of a `;`-separated address list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    Unix { path: String },
    UnixAbstract { name: String },
    Tcp { host: String, port: u16 },
}

impl Address {
    /// Parse a single `family:k=v,k=v` entry.
    fn parse_one(entry: &str) -> Result<Self> {
        let (family, params) = entry
            .split_once(':')
            .ok_or_else(|| Error::UnknownAddress(entry.to_owned()))?;
        let kv = parse_params(params);

        match family {
            "unix" => {
                if let Some(path) = kv.get("path") {
                    Ok(Address::Unix { path: path.clone() })
                } else if let Some(name) = kv.get("abstract") {
                    Ok(Address::UnixAbstract { name: name.clone() })
                } else if let Some(socket) = kv.get("socket") {
                    Ok(Address::Unix {
                        path: socket.clone(),
                    })
                } else {
                    Err(Error::MissingParams(entry.to_owned()))
                }
            }
            "tcp" => {
                let host = kv
                    .get("host")
                    .ok_or_else(|| Error::MissingParams(entry.to_owned()))?
                    .clone();
                let port = kv
                    .get("port")
                    .ok_or_else(|| Error::MissingParams(entry.to_owned()))?
                    .parse::<u16>()
                    .map_err(|_| Error::MissingParams(entry.to_owned()))?;
                Ok(Address::Tcp { host, port })
            }
            other => Err(Error::UnknownFamily(other.to_owned())),
        }
    }
}

fn parse_params(params: &str) -> HashMap<String, String> {
    params
        .split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect()
}

/// Parse a `;`-separated bus address string into its ordered alternatives.
pub fn parse(addresses: &str) -> Result<Vec<Address>> {
    addresses
        .split(';')
        .filter(|s| !s.is_empty())
        .map(Address::parse_one)
        .collect()
}

/// Resolve the bus address to use when none was given explicitly: `DBUS_SESSION_BUS_ADDRESS`.
pub fn session_address_from_env() -> Result<String> {
    std::env::var("DBUS_SESSION_BUS_ADDRESS")
        .map_err(|_| Error::UnknownAddress("DBUS_SESSION_BUS_ADDRESS not set".to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_unix_path() {
        let addrs = parse("unix:path=/run/dbus/system_bus_socket").unwrap();
        assert_eq!(
            addrs,
            vec![Address::Unix {
                path: "/run/dbus/system_bus_socket".to_owned()
            }]
        );
    }

    #[test]
    fn parses_tcp_host_port() {
        let addrs = parse("tcp:host=127.0.0.1,port=44444").unwrap();
        assert_eq!(
            addrs,
            vec![Address::Tcp {
                host: "127.0.0.1".to_owned(),
                port: 44444
            }]
        );
    }

    #[test]
    fn parses_multiple_alternatives_in_order() {
        let addrs = parse("unix:path=/a;tcp:host=h,port=1").unwrap();
        assert_eq!(addrs.len(), 2);
        assert!(matches!(addrs[0], Address::Unix { .. }));
        assert!(matches!(addrs[1], Address::Tcp { .. }));
    }

    #[test]
    fn rejects_unknown_family() {
        assert!(matches!(
            parse("carrier-pigeon:path=/a"),
            Err(Error::UnknownFamily(_))
        ));
    }

    #[test]
    fn rejects_missing_params() {
        assert!(matches!(parse("tcp:host=h"), Err(Error::MissingParams(_))));
    }
}
