//! End-to-end coverage over a real Unix socket: handshake, `Hello`/`RequestName`, and an
//! object-server-hosted `Peer.Ping` call relayed back by a minimal stand-in bus (spec §4.7,
//! §4.9, §4.11).

use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::sync::Arc;

use zbus::connection::Connection;
use zbus::message::{Message, MessageBuilder, PrimaryHeader, PRIMARY_HEADER_SIZE};
use zbus::names::{BusName, InterfaceName, MemberName, UniqueName, WellKnownName};
use zbus::object_server::ObjectServer;
use zvariant::{Endian, Value};

fn read_line(stream: &mut UnixStream) -> String {
    let mut line = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        let n = stream.read(&mut byte).unwrap();
        assert_ne!(n, 0, "unexpected EOF");
        if byte[0] == b'\n' {
            break;
        }
        line.push(byte[0]);
    }
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    String::from_utf8(line).unwrap()
}

fn write_line(stream: &mut UnixStream, line: &str) {
    stream.write_all(line.as_bytes()).unwrap();
    stream.write_all(b"\r\n").unwrap();
}

fn read_message(stream: &mut UnixStream) -> Message {
    let mut prefix = [0u8; PRIMARY_HEADER_SIZE + 4];
    stream.read_exact(&mut prefix).unwrap();
    let (primary, fields_len) = PrimaryHeader::read(&prefix).unwrap();
    let fields_len_padded = ((fields_len as usize) + 7) / 8 * 8;
    let mut rest = vec![0u8; fields_len_padded + primary.body_len() as usize];
    stream.read_exact(&mut rest).unwrap();
    Message::from_parts(primary, fields_len, &rest).unwrap()
}

fn write_message(stream: &mut UnixStream, msg: &Message) {
    stream.write_all(&msg.to_bytes(Endian::native()).unwrap()).unwrap();
}

/// Plays the server side of the handshake, then `Hello`/`RequestName`, then relays one
/// externally-addressed `Peer.Ping` call to the client and reads back its reply.
fn run_stub_bus(listener: UnixListener) {
    let (mut stream, _) = listener.accept().unwrap();

    let mut nul = [0u8; 1];
    stream.read_exact(&mut nul).unwrap();
    assert_eq!(nul[0], 0);

    let auth_line = read_line(&mut stream);
    assert!(auth_line.starts_with("AUTH EXTERNAL "));
    write_line(&mut stream, "OK 0123456789abcdef0123456789abcdef");
    let begin = read_line(&mut stream);
    assert_eq!(begin, "BEGIN");

    // Hello
    let hello = read_message(&mut stream);
    assert_eq!(hello.member().unwrap(), &MemberName::new("Hello".to_owned()).unwrap());
    let reply = MessageBuilder::method_return(hello.serial())
        .body(vec![Value::Str(":1.1".to_owned())])
        .build(100)
        .unwrap();
    write_message(&mut stream, &reply);

    // RequestName
    let request_name = read_message(&mut stream);
    assert_eq!(
        request_name.member().unwrap(),
        &MemberName::new("RequestName".to_owned()).unwrap()
    );
    let reply = MessageBuilder::method_return(request_name.serial())
        .body(vec![Value::U32(1)])
        .build(101)
        .unwrap();
    write_message(&mut stream, &reply);

    // A throwaway round trip the test makes right after installing its method handler. Waiting
    // for this request closes the race between the reader thread looping back to read the next
    // message and the main thread finishing `ObjectServer::run`'s handler installation: by the
    // time this request even reaches us, the handler is already in place.
    let sync_call = read_message(&mut stream);
    assert_eq!(sync_call.member().unwrap(), &MemberName::new("GetId".to_owned()).unwrap());
    let reply = MessageBuilder::method_return(sync_call.serial())
        .body(vec![Value::Str("sync".to_owned())])
        .build(102)
        .unwrap();
    write_message(&mut stream, &reply);

    // Simulate another peer on the bus calling our Peer.Ping.
    let ping = MessageBuilder::method_call(
        zvariant::ObjectPath::new("/".to_owned()).unwrap(),
        MemberName::new("Ping".to_owned()).unwrap(),
    )
    .interface(InterfaceName::new("org.freedesktop.DBus.Peer".to_owned()).unwrap())
    .destination(BusName::new(":1.1".to_owned()).unwrap())
    .sender(UniqueName::new(":1.9".to_owned()).unwrap())
    .build(55)
    .unwrap();
    write_message(&mut stream, &ping);

    let reply = read_message(&mut stream);
    assert_eq!(reply.message_type(), zbus::message::Type::MethodReturn);
    assert_eq!(reply.reply_serial(), Some(55));
    assert!(reply.body().is_empty());
}

#[test]
fn object_server_answers_peer_ping_relayed_by_the_bus() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("stub-bus.sock");
    let listener = UnixListener::bind(&socket_path).unwrap();

    let bus_thread = std::thread::spawn(move || run_stub_bus(listener));

    let address = format!("unix:path={}", socket_path.display());
    let connection = Arc::new(Connection::open(&address).unwrap());
    assert_eq!(connection.unique_name().unwrap().as_str(), ":1.1");

    let server = ObjectServer::new(WellKnownName::new("com.example.Test".to_owned()).unwrap());
    server.run(Arc::clone(&connection)).unwrap();

    let sync_reply = connection
        .call_method(
            BusName::new("org.freedesktop.DBus".to_owned()).unwrap(),
            zvariant::ObjectPath::new("/org/freedesktop/DBus".to_owned()).unwrap(),
            InterfaceName::new("org.freedesktop.DBus".to_owned()).unwrap(),
            MemberName::new("GetId".to_owned()).unwrap(),
            Vec::new(),
        )
        .unwrap();
    assert_eq!(sync_reply, vec![Value::Str("sync".to_owned())]);

    bus_thread.join().unwrap();
}
