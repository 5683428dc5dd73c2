//! A client and server library for D-Bus.
//!
//! The message codec ([`zvariant`]) and validated name types ([`zbus_names`]) live in their own
//! crates; this crate wires them into a blocking connection with a dedicated reader thread
//! (spec §5), SASL authentication (spec §4.7), a local [`object_server::ObjectServer`] for
//! hosting interfaces, and [`proxy`] types for calling into remote ones.
//!
//! The standard bus-side interfaces (`Peer`, `Introspectable`, `Properties`, `ObjectManager`)
//! are handled inline by [`object_server::ObjectServer::route`] rather than split into a
//! separate `fdo` module: unlike a user's own interfaces, they need registry-wide access (every
//! object's interface map, for `Introspect` and `GetManagedObjects`) that a bolted-on module
//! would just have to borrow back from the server anyway.

pub mod address;
pub mod connection;
mod error;
mod handshake;
pub mod introspect;
pub mod match_rule;
pub mod message;
pub mod object_server;
pub mod proxy;

pub use address::Address;
pub use connection::{Connection, ConnectionBuilder, SubscriptionHandle};
pub use handshake::Mechanism;
pub use error::{Error, RemoteError, Result};
pub use match_rule::{MatchRule, MatchRuleBuilder};
pub use message::Message;
pub use object_server::{Interface, ObjectServer, PropertyChanges};
pub use proxy::{InterfaceProxy, ObjectProxy, ServiceHandle};

pub use zbus_names as names;
pub use zvariant;
