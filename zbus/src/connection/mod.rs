//! The blocking connection: framing state machine, serial allocation, in-flight reply table,
//! and signal fan-out (spec §4.8, §4.9).

pub mod socket;

use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;

use zbus_names::{BusName, InterfaceName, MemberName, UniqueName};
use zvariant::{Endian, ObjectPath, Value};

use crate::match_rule::MatchRule;
use crate::message::{Message, MessageBuilder, PrimaryHeader, Type, PRIMARY_HEADER_SIZE};
use crate::{address, handshake, Error, Result};

type MethodHandler = dyn Fn(&Message) -> Option<Message> + Send + Sync;
type SignalListener = dyn Fn(&Message) + Send + Sync;

struct SignalSubscription {
    id: u64,
    rule: MatchRule,
    member: Option<MemberName<'static>>,
    listener: Arc<SignalListener>,
}

struct Shared {
    writer: Mutex<Box<dyn socket::Socket>>,
    serial: AtomicU32,
    in_flight: Mutex<HashMap<u32, mpsc::Sender<Message>>>,
    subscriptions: Mutex<Vec<SignalSubscription>>,
    match_refcounts: Mutex<HashMap<String, u32>>,
    next_subscription_id: AtomicU32,
    unique_name: RwLock<Option<UniqueName<'static>>>,
    method_handler: RwLock<Option<Arc<MethodHandler>>>,
    endian: Endian,
}

/// A live, authenticated D-Bus connection with a dedicated reader thread (spec §5: "a dedicated
/// task per connection with message-passing channels").
pub struct Connection {
    shared: Arc<Shared>,
    reader_thread: Option<JoinHandle<()>>,
}

impl Connection {
    /// Connect, perform the SASL handshake, issue `Hello`, and spawn the reader thread.
    pub fn open(bus_address: &str) -> Result<Self> {
        Self::open_with(bus_address, handshake::DEFAULT_MECHANISMS)
    }

    fn open_with(bus_address: &str, mechanisms: &[handshake::Mechanism]) -> Result<Self> {
        let addresses = address::parse(bus_address)?;
        let mut stream = socket::connect(&addresses)?;
        let guid = handshake::client_handshake(&mut stream, mechanisms)?;
        tracing::debug!(%guid, "handshake complete");

        let reader_stream = stream
            .try_clone_boxed()
            .map_err(|e| Error::CreateStreamFailed(e.to_string()))?;

        let shared = Arc::new(Shared {
            writer: Mutex::new(stream),
            serial: AtomicU32::new(1),
            in_flight: Mutex::new(HashMap::new()),
            subscriptions: Mutex::new(Vec::new()),
            match_refcounts: Mutex::new(HashMap::new()),
            next_subscription_id: AtomicU32::new(1),
            unique_name: RwLock::new(None),
            method_handler: RwLock::new(None),
            endian: Endian::native(),
        });

        let reader_shared = Arc::clone(&shared);
        let reader_thread = std::thread::Builder::new()
            .name("zbus-reader".into())
            .spawn(move || reader_loop(reader_shared, reader_stream))
            .map_err(|e| Error::CreateStreamFailed(e.to_string()))?;

        let conn = Self {
            shared,
            reader_thread: Some(reader_thread),
        };

        let reply = conn.call_method_inner(
            None,
            ObjectPath::new("/org/freedesktop/DBus".to_owned())?,
            InterfaceName::new("org.freedesktop.DBus".to_owned())?,
            MemberName::new("Hello".to_owned())?,
            Vec::new(),
            true,
        )?;
        if let Some(Value::Str(name)) = reply.into_iter().next() {
            let unique = UniqueName::new(name)?;
            *conn.shared.unique_name.write().unwrap() = Some(unique);
        }

        Ok(conn)
    }

    pub fn unique_name(&self) -> Option<UniqueName<'static>> {
        self.shared.unique_name.read().unwrap().clone()
    }

    /// Install the local-service dispatcher invoked for inbound `METHOD_CALL` messages.
    pub fn set_method_handler<F>(&self, handler: F)
    where
        F: Fn(&Message) -> Option<Message> + Send + Sync + 'static,
    {
        *self.shared.method_handler.write().unwrap() = Some(Arc::new(handler));
    }

    fn next_serial(&self) -> u32 {
        self.shared.serial.fetch_add(1, Ordering::SeqCst)
    }

    /// Allocate the next outbound serial. Exposed for [`crate::object_server::ObjectServer`],
    /// which writes its own `METHOD_RETURN`/`ERROR` replies directly.
    pub fn next_outbound_serial(&self) -> u32 {
        self.next_serial()
    }

    /// Write an already-built message to the wire directly, bypassing the reply-tracking table.
    /// Useful for callers that build their own `METHOD_RETURN`/`ERROR`/`SIGNAL` messages.
    pub fn send_message(&self, msg: &Message) -> Result<()> {
        self.write_message(msg)
    }

    fn write_message(&self, msg: &Message) -> Result<()> {
        let bytes = msg.to_bytes(self.shared.endian)?;
        let mut w = self.shared.writer.lock().unwrap();
        w.write_all(&bytes).map_err(Error::Io)
    }

    /// Invoke a method and block for its reply (spec §4.9 "Method call").
    pub fn call_method(
        &self,
        destination: BusName<'static>,
        path: ObjectPath<'static>,
        interface: InterfaceName<'static>,
        member: MemberName<'static>,
        body: Vec<Value<'static>>,
    ) -> Result<Vec<Value<'static>>> {
        self.call_method_inner(Some(destination), path, interface, member, body, true)
    }

    /// Send a method call without waiting for (or requesting) a reply.
    pub fn call_method_no_reply(
        &self,
        destination: BusName<'static>,
        path: ObjectPath<'static>,
        interface: InterfaceName<'static>,
        member: MemberName<'static>,
        body: Vec<Value<'static>>,
    ) -> Result<()> {
        self.call_method_inner(Some(destination), path, interface, member, body, false)
            .map(|_| ())
    }

    fn call_method_inner(
        &self,
        destination: Option<BusName<'static>>,
        path: ObjectPath<'static>,
        interface: InterfaceName<'static>,
        member: MemberName<'static>,
        body: Vec<Value<'static>>,
        reply_expected: bool,
    ) -> Result<Vec<Value<'static>>> {
        let serial = self.next_serial();
        let mut builder = MessageBuilder::method_call(path, member)
            .interface(interface)
            .body(body)
            .no_reply_expected(!reply_expected);
        if let Some(dest) = destination {
            builder = builder.destination(dest);
        }
        let msg = builder.build(serial)?;

        if !reply_expected {
            self.write_message(&msg)?;
            return Ok(Vec::new());
        }

        let (tx, rx) = mpsc::channel();
        self.shared.in_flight.lock().unwrap().insert(serial, tx);
        if let Err(e) = self.write_message(&msg) {
            self.shared.in_flight.lock().unwrap().remove(&serial);
            return Err(e);
        }

        let reply = rx
            .recv()
            .map_err(|_| Error::ConnectionClosed)?;
        match reply.message_type() {
            Type::MethodReturn => Ok(reply.into_body()),
            Type::Error => {
                let name = reply
                    .error_name()
                    .map(|n| n.as_str().to_owned())
                    .unwrap_or_default();
                let message = match reply.body().first() {
                    Some(Value::Str(s)) => s.clone(),
                    _ => String::new(),
                };
                Err(Error::MethodError(crate::error::RemoteError { name, message }))
            }
            _ => Err(Error::ConnectionClosed),
        }
    }

    /// Emit a signal (spec §4.9, §4.11).
    pub fn emit_signal(
        &self,
        path: ObjectPath<'static>,
        interface: InterfaceName<'static>,
        member: MemberName<'static>,
        body: Vec<Value<'static>>,
    ) -> Result<()> {
        let serial = self.next_serial();
        let msg = MessageBuilder::signal(path, interface, member)
            .body(body)
            .build(serial)?;
        self.write_message(&msg)
    }

    /// Subscribe to signals matching `rule`, optionally restricted to a single member name.
    /// Installs (or reuses) the corresponding `AddMatch` rule on the daemon. Dropping the
    /// returned handle issues `RemoveMatch` once no other subscriber needs the same rule.
    pub fn subscribe_signal<F>(
        &self,
        rule: MatchRule,
        member: Option<MemberName<'static>>,
        listener: F,
    ) -> Result<SubscriptionHandle>
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        let match_string = rule.to_match_string();
        {
            let mut refcounts = self.shared.match_refcounts.lock().unwrap();
            let count = refcounts.entry(match_string.clone()).or_insert(0);
            if *count == 0 {
                self.add_match(&match_string)?;
            }
            *count += 1;
        }

        let id = self.shared.next_subscription_id.fetch_add(1, Ordering::SeqCst) as u64;
        self.shared.subscriptions.lock().unwrap().push(SignalSubscription {
            id,
            rule,
            member,
            listener: Arc::new(listener),
        });

        Ok(SubscriptionHandle {
            shared: Arc::clone(&self.shared),
            id,
            match_string,
        })
    }

    fn add_match(&self, match_string: &str) -> Result<()> {
        self.call_method_inner(
            Some(BusName::new("org.freedesktop.DBus".to_owned())?),
            ObjectPath::new("/org/freedesktop/DBus".to_owned())?,
            InterfaceName::new("org.freedesktop.DBus".to_owned())?,
            MemberName::new("AddMatch".to_owned())?,
            vec![Value::Str(match_string.to_owned())],
            true,
        )?;
        Ok(())
    }

    fn remove_match(shared: &Arc<Shared>, match_string: &str) {
        let conn = Connection {
            shared: Arc::clone(shared),
            reader_thread: None,
        };
        if let Err(e) = conn.call_method_inner(
            Some(BusName::new("org.freedesktop.DBus".to_owned()).unwrap()),
            ObjectPath::new("/org/freedesktop/DBus".to_owned()).unwrap(),
            InterfaceName::new("org.freedesktop.DBus".to_owned()).unwrap(),
            MemberName::new("RemoveMatch".to_owned()).unwrap(),
            vec![Value::Str(match_string.to_owned())],
            true,
        ) {
            tracing::warn!(error = %e, %match_string, "failed to remove stale match rule");
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(handle) = self.reader_thread.take() {
            let _ = handle.join();
        }
    }
}

/// Fluent alternative to [`Connection::open`] for callers that need to override the bus address
/// or the SASL mechanism order (spec §4.6, §4.7 configuration points).
pub struct ConnectionBuilder {
    address: Option<String>,
    mechanisms: Vec<handshake::Mechanism>,
}

impl ConnectionBuilder {
    pub fn new() -> Self {
        Self {
            address: None,
            mechanisms: handshake::DEFAULT_MECHANISMS.to_vec(),
        }
    }

    /// Use an explicit bus address instead of `DBUS_SESSION_BUS_ADDRESS`.
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Override the default EXTERNAL, DBUS_COOKIE_SHA1, ANONYMOUS mechanism order.
    pub fn mechanisms(mut self, mechanisms: Vec<handshake::Mechanism>) -> Self {
        self.mechanisms = mechanisms;
        self
    }

    pub fn build(self) -> Result<Connection> {
        let address = match self.address {
            Some(a) => a,
            None => address::session_address_from_env()?,
        };
        Connection::open_with(&address, &self.mechanisms)
    }
}

impl Default for ConnectionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps a signal subscription alive; dropping it unsubscribes (spec §9 weak-reference note,
/// implemented here as an explicit `Drop` contract rather than opportunistic weak-ref pruning).
pub struct SubscriptionHandle {
    shared: Arc<Shared>,
    id: u64,
    match_string: String,
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.shared
            .subscriptions
            .lock()
            .unwrap()
            .retain(|s| s.id != self.id);

        let mut refcounts = self.shared.match_refcounts.lock().unwrap();
        if let Some(count) = refcounts.get_mut(&self.match_string) {
            *count -= 1;
            if *count == 0 {
                refcounts.remove(&self.match_string);
                drop(refcounts);
                Connection::remove_match(&self.shared, &self.match_string);
            }
        }
    }
}

fn reader_loop(shared: Arc<Shared>, mut stream: Box<dyn socket::Socket>) {
    loop {
        let mut prefix = [0u8; PRIMARY_HEADER_SIZE + 4];
        if let Err(e) = stream.read_exact(&mut prefix) {
            tracing::debug!(error = %e, "connection read loop ending");
            break;
        }
        let (primary, fields_len) = match PrimaryHeader::read(&prefix) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "malformed primary header, closing connection");
                break;
            }
        };
        let fields_len_padded = ((fields_len as usize) + 7) / 8 * 8;
        let to_read = fields_len_padded + primary.body_len() as usize;
        let mut rest = vec![0u8; to_read];
        if let Err(e) = stream.read_exact(&mut rest) {
            tracing::debug!(error = %e, "connection read loop ending mid-message");
            break;
        }

        let msg = match Message::from_parts(primary, fields_len, &rest) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(error = %e, "failed to decode message");
                continue;
            }
        };

        dispatch(&shared, msg);
    }

    // Connection closed: reject every pending call.
    let pending: Vec<_> = shared.in_flight.lock().unwrap().drain().collect();
    for (_, tx) in pending {
        drop(tx);
    }
}

fn dispatch(shared: &Arc<Shared>, msg: Message) {
    match msg.message_type() {
        Type::MethodReturn | Type::Error => {
            if let Some(serial) = msg.reply_serial() {
                if let Some(tx) = shared.in_flight.lock().unwrap().remove(&serial) {
                    let _ = tx.send(msg);
                }
            }
        }
        Type::Signal => {
            let sender = msg.sender().map(|s| s.as_str());
            let path = msg.path().map(|p| p.as_str());
            let interface = msg.interface().map(|i| i.as_str());
            let member = msg.member().cloned();

            let subs = shared.subscriptions.lock().unwrap();
            for sub in subs.iter() {
                if !sub.rule.matches_subject(sender, path, interface) {
                    continue;
                }
                let member_matches = match &sub.member {
                    None => true,
                    Some(m) => Some(m) == member.as_ref(),
                };
                if member_matches {
                    (sub.listener)(&msg);
                }
            }
        }
        Type::MethodCall => {
            let handler = shared.method_handler.read().unwrap().clone();
            if let Some(handler) = handler {
                if let Some(reply) = handler(&msg) {
                    if let Ok(bytes) = reply.to_bytes(shared.endian) {
                        let _ = shared.writer.lock().unwrap().write_all(&bytes);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::net::UnixStream;
    use std::sync::atomic::AtomicUsize;

    fn read_message(stream: &mut UnixStream) -> Message {
        let mut prefix = [0u8; PRIMARY_HEADER_SIZE + 4];
        stream.read_exact(&mut prefix).unwrap();
        let (primary, fields_len) = PrimaryHeader::read(&prefix).unwrap();
        let fields_len_padded = ((fields_len as usize) + 7) / 8 * 8;
        let mut rest = vec![0u8; fields_len_padded + primary.body_len() as usize];
        stream.read_exact(&mut rest).unwrap();
        Message::from_parts(primary, fields_len, &rest).unwrap()
    }

    fn write_empty_reply(stream: &mut UnixStream, reply_serial: u32) {
        let msg = MessageBuilder::method_return(reply_serial).build(reply_serial + 1000).unwrap();
        stream.write_all(&msg.to_bytes(Endian::native()).unwrap()).unwrap();
    }

    /// Two subscribers sharing one `MatchRule` must install `AddMatch` once between them and
    /// issue `RemoveMatch` only once the last subscriber drops, not once per handle.
    #[test]
    fn match_refcount_add_remove_is_balanced() {
        let (local, mut remote) = UnixStream::pair().unwrap();
        let reader_stream: Box<dyn socket::Socket> = Box::new(local.try_clone().unwrap());
        let shared = Arc::new(Shared {
            writer: Mutex::new(Box::new(local) as Box<dyn socket::Socket>),
            serial: AtomicU32::new(1),
            in_flight: Mutex::new(HashMap::new()),
            subscriptions: Mutex::new(Vec::new()),
            match_refcounts: Mutex::new(HashMap::new()),
            next_subscription_id: AtomicU32::new(1),
            unique_name: RwLock::new(None),
            method_handler: RwLock::new(None),
            endian: Endian::native(),
        });

        let reader_thread = std::thread::spawn({
            let shared = Arc::clone(&shared);
            move || reader_loop(shared, reader_stream)
        });

        let add_calls = Arc::new(AtomicUsize::new(0));
        let remove_calls = Arc::new(AtomicUsize::new(0));
        let bus_thread = std::thread::spawn({
            let add_calls = Arc::clone(&add_calls);
            let remove_calls = Arc::clone(&remove_calls);
            move || {
                for _ in 0..2 {
                    let msg = read_message(&mut remote);
                    match msg.member().map(MemberName::as_str) {
                        Some("AddMatch") => add_calls.fetch_add(1, Ordering::SeqCst),
                        Some("RemoveMatch") => remove_calls.fetch_add(1, Ordering::SeqCst),
                        other => panic!("unexpected call: {other:?}"),
                    };
                    write_empty_reply(&mut remote, msg.serial());
                }
            }
        });

        let connection = Connection {
            shared: Arc::clone(&shared),
            reader_thread: None,
        };

        let rule = MatchRule::builder().build();
        let handle_a = connection.subscribe_signal(rule.clone(), None, |_| {}).unwrap();
        let handle_b = connection.subscribe_signal(rule, None, |_| {}).unwrap();
        drop(handle_a);
        drop(handle_b);

        bus_thread.join().unwrap();
        assert_eq!(add_calls.load(Ordering::SeqCst), 1);
        assert_eq!(remove_calls.load(Ordering::SeqCst), 1);

        drop(connection);
        reader_thread.join().unwrap();
    }
}
