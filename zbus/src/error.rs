//! The top-level error taxonomy (spec §7). Each kind is its own variant with a stable symbol;
//! callers match on the variant rather than parsing a message string.

use std::io;

use static_assertions::assert_impl_all;

/// A D-Bus error name together with the human-readable message from the first body argument of
/// an `ERROR` reply (spec §4.9 "Reply handling").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    pub name: String,
    pub message: String,
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    // -- Transport (§4.6) --
    #[error("connect timed out")]
    Timeout,
    #[error("unknown bus address: {0}")]
    UnknownAddress(String),
    #[error("unknown transport family: {0}")]
    UnknownFamily(String),
    #[error("missing transport parameters: {0}")]
    MissingParams(String),
    #[error("failed to create stream: {0}")]
    CreateStreamFailed(String),

    // -- Authentication (§4.7) --
    #[error("cookie keyring has unsafe permissions")]
    KeyringPermission,
    #[error("no usable cookie found: {0}")]
    NoCookie(String),
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    // -- Protocol (§4.9, §4.11) --
    #[error("message is missing a required serial")]
    MissingSerial,
    #[error("unknown object: {0}")]
    UnknownObject(String),
    #[error("unknown interface: {0}")]
    UnknownInterface(String),
    #[error("unknown method: {0}")]
    UnknownMethod(String),
    #[error("unknown property: {0}")]
    UnknownProperty(String),
    #[error("invalid arguments")]
    InvalidArgs,
    #[error("property is read-only: {0}")]
    PropertyReadOnly(String),
    #[error("property is write-only: {0}")]
    PropertyWriteOnly(String),
    #[error("access forbidden: {0}")]
    AccessForbidden(String),

    // -- Discovery / registration (§4.11) --
    #[error("service not found: {0}")]
    ServiceNotFound(String),
    #[error("object not found: {0}")]
    ObjectNotFound(String),
    #[error("interface not found: {0}")]
    InterfaceNotFound(String),
    #[error("object already exists: {0}")]
    LocalObjectExists(String),
    #[error("interface already attached to this object: {0}")]
    LocalInterfaceExists(String),
    #[error("method already defined: {0}")]
    MethodDefined(String),
    #[error("property already defined: {0}")]
    PropertyDefined(String),
    #[error("signal already defined: {0}")]
    SignalDefined(String),
    #[error("invalid name: {0}")]
    InvalidName(String),

    // -- Connection lifecycle --
    #[error("connection closed")]
    ConnectionClosed,

    // -- A method call came back as an `ERROR` reply. --
    #[error("{0}")]
    MethodError(RemoteError),

    // -- Wrapped lower layers --
    #[error(transparent)]
    Variant(#[from] zvariant::Error),
    #[error(transparent)]
    Names(#[from] zbus_names::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("XML error: {0}")]
    Xml(String),
}

assert_impl_all!(Error: Send, Sync);

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// The dotted D-Bus error name this error should be reported as when it crosses the wire in
    /// an `ERROR` reply (spec §4.11 "Method-call routing").
    pub fn dbus_name(&self, service_name: &str) -> String {
        match self {
            Error::MethodError(e) => e.name.clone(),
            Error::UnknownObject(_) => "org.freedesktop.DBus.Error.UnknownObject".to_owned(),
            Error::UnknownInterface(_) => "org.freedesktop.DBus.Error.UnknownInterface".to_owned(),
            Error::UnknownMethod(_) => "org.freedesktop.DBus.Error.UnknownMethod".to_owned(),
            Error::UnknownProperty(_) => "org.freedesktop.DBus.Error.UnknownProperty".to_owned(),
            Error::InvalidArgs => "org.freedesktop.DBus.Error.InvalidArgs".to_owned(),
            Error::PropertyReadOnly(_) => {
                "org.freedesktop.DBus.Error.PropertyReadOnly".to_owned()
            }
            Error::PropertyWriteOnly(_) => {
                "org.freedesktop.DBus.Error.PropertyWriteOnly".to_owned()
            }
            Error::AccessForbidden(_) => "org.freedesktop.DBus.Error.AccessDenied".to_owned(),
            other => {
                let name = format!("{other}");
                if zbus_names::ErrorName::is_dotted(&name) {
                    name
                } else if service_name.is_empty() {
                    "org.freedesktop.DBus.Error.Failed".to_owned()
                } else {
                    format!("{service_name}.Error")
                }
            }
        }
    }
}
