//! Local service hosting: object registry, method-call routing, and the standard interfaces
//! layered on top of it (spec §4.11, §4.12).

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};

use zbus_names::{BusName, ErrorName, InterfaceName, MemberName, WellKnownName};
use zvariant::{Array, Type as VType, Value};

use crate::connection::Connection;
use crate::introspect::{self, Access, Arg, Direction, InterfaceDesc, MethodDesc, NodeDesc, PropertyDesc, SignalDesc};
use crate::message::Message;
use crate::{Error, Result};

const PEER_INTERFACE: &str = "org.freedesktop.DBus.Peer";
const INTROSPECTABLE_INTERFACE: &str = "org.freedesktop.DBus.Introspectable";
const PROPERTIES_INTERFACE: &str = "org.freedesktop.DBus.Properties";
const OBJECT_MANAGER_INTERFACE: &str = "org.freedesktop.DBus.ObjectManager";

/// Accumulates property changes between deferred `PropertiesChanged` emissions (spec §4.12,
/// §9 "deferred-emit coalescing"). The insertion order of the *first* change to each property
/// is preserved; later changes to an already-pending property update its value in place.
#[derive(Default)]
pub struct PropertyChanges {
    changed: Mutex<Vec<(String, Value<'static>)>>,
    invalidated: Mutex<Vec<String>>,
}

impl PropertyChanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_changed(&self, name: &str, value: Value<'static>) {
        let mut changed = self.changed.lock().unwrap();
        if let Some(entry) = changed.iter_mut().find(|(n, _)| n == name) {
            entry.1 = value;
        } else {
            changed.push((name.to_owned(), value));
        }
    }

    pub fn mark_invalidated(&self, name: &str) {
        let mut invalidated = self.invalidated.lock().unwrap();
        if !invalidated.iter().any(|n| n == name) {
            invalidated.push(name.to_owned());
        }
    }

    fn drain(&self) -> Option<(Vec<(String, Value<'static>)>, Vec<String>)> {
        let mut changed = self.changed.lock().unwrap();
        let mut invalidated = self.invalidated.lock().unwrap();
        if changed.is_empty() && invalidated.is_empty() {
            return None;
        }
        Some((std::mem::take(&mut *changed), std::mem::take(&mut *invalidated)))
    }
}

/// A user-implemented D-Bus interface (spec §9: "composition with a shared trait", not
/// subclassing). The four standard interfaces other than Peer are special-cased by
/// [`ObjectServer`] directly, since they need registry-wide state Peer doesn't.
pub trait Interface: Send + Sync {
    fn describe(&self) -> InterfaceDesc;

    fn call_method(&self, member: &str, args: &[Value<'static>]) -> Result<Vec<Value<'static>>>;

    fn get_property(&self, _name: &str) -> Result<Value<'static>> {
        Err(Error::UnknownProperty(_name.to_owned()))
    }

    fn set_property(&self, name: &str, _value: Value<'static>) -> Result<()> {
        Err(Error::UnknownProperty(name.to_owned()))
    }

    /// Pending batched property changes, if this interface supports change notification.
    fn property_changes(&self) -> Option<&PropertyChanges> {
        None
    }
}

struct ObjectNode {
    interfaces: BTreeMap<String, Arc<dyn Interface>>,
    is_root: bool,
}

impl ObjectNode {
    fn new(is_root: bool) -> Self {
        Self {
            interfaces: BTreeMap::new(),
            is_root,
        }
    }
}

/// Hosts a well-known service's objects and routes incoming method calls to them.
pub struct ObjectServer {
    service_name: WellKnownName<'static>,
    objects: RwLock<BTreeMap<String, ObjectNode>>,
    connection: RwLock<Option<Arc<Connection>>>,
}

impl ObjectServer {
    pub fn new(service_name: WellKnownName<'static>) -> Arc<Self> {
        let mut objects = BTreeMap::new();
        objects.insert("/".to_owned(), ObjectNode::new(true));
        Arc::new(Self {
            service_name,
            objects: RwLock::new(objects),
            connection: RwLock::new(None),
        })
    }

    pub fn add_object(&self, path: &str) -> Result<()> {
        zvariant::ObjectPath::new(path.to_owned())?;
        let mut objects = self.objects.write().unwrap();
        objects
            .entry(path.to_owned())
            .or_insert_with(|| ObjectNode::new(path == "/"));
        Ok(())
    }

    pub fn remove_object(&self, path: &str) {
        let interfaces: Vec<String>;
        {
            let mut objects = self.objects.write().unwrap();
            interfaces = objects
                .remove(path)
                .map(|n| n.interfaces.into_keys().collect())
                .unwrap_or_default();
        }
        if !interfaces.is_empty() {
            self.notify_interfaces_removed(path, interfaces);
        }
    }

    pub fn add_interface(&self, path: &str, interface: Arc<dyn Interface>) -> Result<()> {
        let desc = interface.describe();
        {
            let mut objects = self.objects.write().unwrap();
            let node = objects
                .entry(path.to_owned())
                .or_insert_with(|| ObjectNode::new(path == "/"));
            if node.interfaces.contains_key(&desc.name) {
                return Err(Error::LocalInterfaceExists(desc.name));
            }
            node.interfaces.insert(desc.name.clone(), interface.clone());
        }
        self.notify_interfaces_added(path, &[interface]);
        Ok(())
    }

    pub fn remove_interface(&self, path: &str, interface_name: &str) {
        let removed = {
            let mut objects = self.objects.write().unwrap();
            objects
                .get_mut(path)
                .map(|n| n.interfaces.remove(interface_name).is_some())
                .unwrap_or(false)
        };
        if removed {
            self.notify_interfaces_removed(path, vec![interface_name.to_owned()]);
        }
    }

    /// Connect the server to a live connection, install the method-call handler, and claim the
    /// service name (spec §4.11 "Running").
    pub fn run(self: &Arc<Self>, connection: Arc<Connection>) -> Result<()> {
        connection.call_method(
            BusName::new("org.freedesktop.DBus".to_owned())?,
            zvariant::ObjectPath::new("/org/freedesktop/DBus".to_owned())?,
            InterfaceName::new("org.freedesktop.DBus".to_owned())?,
            MemberName::new("RequestName".to_owned())?,
            vec![
                Value::Str(self.service_name.as_str().to_owned()),
                Value::U32(0),
            ],
        )?;

        let server = Arc::clone(self);
        connection.set_method_handler(move |msg| server.handle_method_call(msg));
        *self.connection.write().unwrap() = Some(connection);
        Ok(())
    }

    pub fn stop(&self) -> Result<()> {
        if let Some(connection) = self.connection.write().unwrap().take() {
            connection.call_method_no_reply(
                BusName::new("org.freedesktop.DBus".to_owned())?,
                zvariant::ObjectPath::new("/org/freedesktop/DBus".to_owned())?,
                InterfaceName::new("org.freedesktop.DBus".to_owned())?,
                MemberName::new("ReleaseName".to_owned())?,
                vec![Value::Str(self.service_name.as_str().to_owned())],
            )?;
        }
        Ok(())
    }

    /// Drain every registered interface's pending property changes and emit one
    /// `PropertiesChanged` per interface that had any (spec §4.12, §9).
    pub fn flush_property_changes(&self) {
        let connection = match self.connection.read().unwrap().clone() {
            Some(c) => c,
            None => return,
        };
        let objects = self.objects.read().unwrap();
        for (path, node) in objects.iter() {
            for (iface_name, interface) in node.interfaces.iter() {
                let Some(tracker) = interface.property_changes() else {
                    continue;
                };
                let Some((changed, invalidated)) = tracker.drain() else {
                    continue;
                };
                let changed_value = Value::Array(Array::from_values(
                    VType::DictEntry(Box::new(VType::Str), Box::new(VType::Variant)),
                    changed
                        .into_iter()
                        .map(|(k, v)| Value::DictEntry(Box::new(Value::Str(k)), Box::new(Value::Variant(Box::new(v)))))
                        .collect(),
                ));
                let invalidated_value = Value::Array(Array::from_values(
                    VType::Str,
                    invalidated.into_iter().map(Value::Str).collect(),
                ));
                let body = vec![Value::Str(iface_name.clone()), changed_value, invalidated_value];
                if let (Ok(path), Ok(interface_name), Ok(member)) = (
                    zvariant::ObjectPath::new(path.clone()),
                    InterfaceName::new(PROPERTIES_INTERFACE.to_owned()),
                    MemberName::new("PropertiesChanged".to_owned()),
                ) {
                    let _ = connection.emit_signal(path, interface_name, member, body);
                }
            }
        }
    }

    fn notify_interfaces_added(&self, path: &str, interfaces: &[Arc<dyn Interface>]) {
        let connection = match self.connection.read().unwrap().clone() {
            Some(c) => c,
            None => return,
        };
        let entries: Vec<Value<'static>> = interfaces
            .iter()
            .map(|iface| {
                let props = self.read_projected_properties(iface.as_ref());
                Value::DictEntry(
                    Box::new(Value::Str(iface.describe().name)),
                    Box::new(props),
                )
            })
            .collect();
        let body = vec![
            Value::ObjectPath(zvariant::ObjectPath::new(path.to_owned()).unwrap()),
            Value::Array(Array::from_values(
                VType::DictEntry(
                    Box::new(VType::Str),
                    Box::new(VType::Array(Box::new(VType::DictEntry(
                        Box::new(VType::Str),
                        Box::new(VType::Variant),
                    )))),
                ),
                entries,
            )),
        ];
        let _ = connection.emit_signal(
            zvariant::ObjectPath::new("/".to_owned()).unwrap(),
            InterfaceName::new(OBJECT_MANAGER_INTERFACE.to_owned()).unwrap(),
            MemberName::new("InterfacesAdded".to_owned()).unwrap(),
            body,
        );
    }

    fn notify_interfaces_removed(&self, path: &str, interface_names: Vec<String>) {
        let connection = match self.connection.read().unwrap().clone() {
            Some(c) => c,
            None => return,
        };
        let body = vec![
            Value::ObjectPath(zvariant::ObjectPath::new(path.to_owned()).unwrap()),
            Value::Array(Array::from_values(
                VType::Str,
                interface_names.into_iter().map(Value::Str).collect(),
            )),
        ];
        let _ = connection.emit_signal(
            zvariant::ObjectPath::new("/".to_owned()).unwrap(),
            InterfaceName::new(OBJECT_MANAGER_INTERFACE.to_owned()).unwrap(),
            MemberName::new("InterfacesRemoved".to_owned()).unwrap(),
            body,
        );
    }

    fn read_projected_properties(&self, interface: &dyn Interface) -> Value<'static> {
        let entries = interface
            .describe()
            .properties
            .into_iter()
            .filter(|p| p.access.readable())
            .filter_map(|p| {
                let value = interface.get_property(&p.name).ok()?;
                Some(Value::DictEntry(
                    Box::new(Value::Str(p.name)),
                    Box::new(Value::Variant(Box::new(value))),
                ))
            })
            .collect();
        Value::Array(Array::from_values(
            VType::DictEntry(Box::new(VType::Str), Box::new(VType::Variant)),
            entries,
        ))
    }

    fn node_desc(&self, node: &ObjectNode, path: &str, all_paths: &[String]) -> NodeDesc {
        let mut interfaces: Vec<InterfaceDesc> = node.interfaces.values().map(|i| i.describe()).collect();
        interfaces.push(peer_interface_desc());
        interfaces.push(introspectable_interface_desc());
        interfaces.push(properties_interface_desc());
        if node.is_root {
            interfaces.push(object_manager_interface_desc());
        }

        let prefix = if path == "/" {
            "/".to_owned()
        } else {
            format!("{path}/")
        };
        let mut children: Vec<String> = all_paths
            .iter()
            .filter(|p| p.as_str() != path && p.starts_with(&prefix))
            .filter_map(|p| {
                let rest = &p[prefix.len()..];
                rest.split('/').next().map(str::to_owned)
            })
            .collect();
        children.sort();
        children.dedup();

        NodeDesc { interfaces, children }
    }

    fn handle_method_call(&self, msg: &Message) -> Option<Message> {
        let reply_expected = !msg
            .header()
            .primary()
            .flags()
            .contains(crate::message::Flags::NO_REPLY_EXPECTED);
        let reply_serial = msg.serial();

        let result = self.route(msg);
        self.flush_property_changes();
        if !reply_expected {
            return None;
        }
        let outbound_serial = self.connection.read().unwrap().as_ref()?.next_outbound_serial();
        match result {
            Ok(body) => crate::message::MessageBuilder::method_return(reply_serial)
                .body(body)
                .build(outbound_serial)
                .ok(),
            Err(e) => {
                let name = e.dbus_name(self.service_name.as_str());
                let error_name = ErrorName::new(name).ok()?;
                crate::message::MessageBuilder::error(reply_serial, error_name)
                    .body(vec![Value::Str(e.to_string())])
                    .build(outbound_serial)
                    .ok()
            }
        }
    }

    fn route(&self, msg: &Message) -> Result<Vec<Value<'static>>> {
        let path = msg
            .path()
            .ok_or_else(|| Error::InvalidArgs)?
            .as_str()
            .to_owned();
        let interface_name = msg.interface().map(|i| i.as_str().to_owned());
        let member = msg
            .member()
            .ok_or_else(|| Error::InvalidArgs)?
            .as_str()
            .to_owned();

        let objects = self.objects.read().unwrap();
        let node = objects
            .get(&path)
            .ok_or_else(|| Error::UnknownObject(path.clone()))?;

        match interface_name.as_deref() {
            Some(PEER_INTERFACE) => self.handle_peer(&member),
            Some(INTROSPECTABLE_INTERFACE) if member == "Introspect" => {
                let all_paths: Vec<String> = objects.keys().cloned().collect();
                let xml = introspect::to_xml(&self.node_desc(node, &path, &all_paths))?;
                Ok(vec![Value::Str(xml)])
            }
            Some(PROPERTIES_INTERFACE) => self.handle_properties(node, &member, msg.body()),
            Some(OBJECT_MANAGER_INTERFACE) if node.is_root && member == "GetManagedObjects" => {
                Ok(vec![self.managed_objects(&objects)])
            }
            Some(iface_name) => {
                let interface = node
                    .interfaces
                    .get(iface_name)
                    .ok_or_else(|| Error::UnknownInterface(iface_name.to_owned()))?;
                self.invoke(interface.as_ref(), &member, msg)
            }
            None => Err(Error::UnknownInterface(String::new())),
        }
    }

    fn invoke(&self, interface: &dyn Interface, member: &str, msg: &Message) -> Result<Vec<Value<'static>>> {
        let desc = interface.describe();
        let method = desc
            .methods
            .iter()
            .find(|m| m.name == member)
            .ok_or_else(|| Error::UnknownMethod(member.to_owned()))?;

        let declared_in: Vec<&str> = method
            .args
            .iter()
            .filter(|a| a.direction == Some(Direction::In))
            .map(|a| a.ty.as_str())
            .collect();
        if !signature_compatible(&declared_in.join(""), msg.body())? {
            return Err(Error::InvalidArgs);
        }

        interface.call_method(member, msg.body())
    }

    fn handle_peer(&self, member: &str) -> Result<Vec<Value<'static>>> {
        match member {
            "Ping" => Ok(Vec::new()),
            "GetMachineId" => Ok(vec![Value::Str(machine_id())]),
            other => Err(Error::UnknownMethod(other.to_owned())),
        }
    }

    fn handle_properties(
        &self,
        node: &ObjectNode,
        member: &str,
        body: &[Value<'static>],
    ) -> Result<Vec<Value<'static>>> {
        match member {
            "Get" => {
                let (iface, prop) = two_strings(body)?;
                let interface = node
                    .interfaces
                    .get(&iface)
                    .ok_or_else(|| Error::UnknownInterface(iface.clone()))?;
                let desc = property_desc(interface.as_ref(), &prop)?;
                if !desc.access.readable() {
                    return Err(Error::PropertyWriteOnly(prop));
                }
                Ok(vec![Value::Variant(Box::new(interface.get_property(&prop)?))])
            }
            "Set" => {
                let iface = first_string(body)?;
                let prop = match body.get(1) {
                    Some(Value::Str(s)) => s.clone(),
                    _ => return Err(Error::InvalidArgs),
                };
                let value = match body.get(2) {
                    Some(Value::Variant(v)) => v.as_ref().clone(),
                    _ => return Err(Error::InvalidArgs),
                };
                let interface = node
                    .interfaces
                    .get(&iface)
                    .ok_or_else(|| Error::UnknownInterface(iface.clone()))?;
                let desc = property_desc(interface.as_ref(), &prop)?;
                if !desc.access.writable() {
                    return Err(Error::PropertyReadOnly(prop));
                }
                interface.set_property(&prop, value)?;
                Ok(Vec::new())
            }
            "GetAll" => {
                let iface = first_string(body)?;
                let interface = node
                    .interfaces
                    .get(&iface)
                    .ok_or_else(|| Error::UnknownInterface(iface.clone()))?;
                Ok(vec![self.read_projected_properties(interface.as_ref())])
            }
            other => Err(Error::UnknownMethod(other.to_owned())),
        }
    }

    fn managed_objects(&self, objects: &BTreeMap<String, ObjectNode>) -> Value<'static> {
        let entries = objects
            .iter()
            .map(|(path, node)| {
                let ifaces: Vec<Value<'static>> = node
                    .interfaces
                    .values()
                    .map(|iface| {
                        Value::DictEntry(
                            Box::new(Value::Str(iface.describe().name)),
                            Box::new(self.read_projected_properties(iface.as_ref())),
                        )
                    })
                    .collect();
                Value::DictEntry(
                    Box::new(Value::ObjectPath(zvariant::ObjectPath::new(path.clone()).unwrap())),
                    Box::new(Value::Array(Array::from_values(
                        VType::DictEntry(
                            Box::new(VType::Str),
                            Box::new(VType::Array(Box::new(VType::DictEntry(
                                Box::new(VType::Str),
                                Box::new(VType::Variant),
                            )))),
                        ),
                        ifaces,
                    ))),
                )
            })
            .collect();
        Value::Array(Array::from_values(
            VType::DictEntry(
                Box::new(VType::ObjectPath),
                Box::new(VType::Array(Box::new(VType::DictEntry(
                    Box::new(VType::Str),
                    Box::new(VType::Array(Box::new(VType::DictEntry(
                        Box::new(VType::Str),
                        Box::new(VType::Variant),
                    )))),
                )))),
            ),
            entries,
        ))
    }
}

fn property_desc(interface: &dyn Interface, name: &str) -> Result<PropertyDesc> {
    interface
        .describe()
        .properties
        .into_iter()
        .find(|p| p.name == name)
        .ok_or_else(|| Error::UnknownProperty(name.to_owned()))
}

fn first_string(body: &[Value<'static>]) -> Result<String> {
    match body.first() {
        Some(Value::Str(s)) => Ok(s.clone()),
        _ => Err(Error::InvalidArgs),
    }
}

fn two_strings(body: &[Value<'static>]) -> Result<(String, String)> {
    let a = first_string(body)?;
    let b = match body.get(1) {
        Some(Value::Str(s)) => s.clone(),
        _ => return Err(Error::InvalidArgs),
    };
    Ok((a, b))
}

fn machine_id() -> String {
    std::fs::read_to_string("/etc/machine-id")
        .or_else(|_| std::fs::read_to_string("/var/lib/dbus/machine-id"))
        .or_else(|_| std::fs::read_to_string("/proc/sys/kernel/random/boot_id"))
        .map(|s| s.trim().to_owned())
        .unwrap_or_else(|_| uuid::Uuid::new_v4().simple().to_string())
}

/// Variant-tolerant signature compatibility (spec §8): a declared `v` matches any value at that
/// position, recursively through containers.
fn signature_compatible(declared_sig: &str, actual: &[Value<'static>]) -> Result<bool> {
    let declared_types = zvariant::parse_signature(declared_sig)?;
    if declared_types.len() != actual.len() {
        return Ok(false);
    }
    Ok(declared_types
        .iter()
        .zip(actual.iter())
        .all(|(declared, value)| type_compatible(declared, &value.value_type())))
}

fn type_compatible(declared: &zvariant::Type, actual: &zvariant::Type) -> bool {
    use zvariant::Type as T;
    if matches!(declared, T::Variant) {
        return true;
    }
    match (declared, actual) {
        (T::Array(d), T::Array(a)) => type_compatible(d, a),
        (T::Struct(ds), T::Struct(as_)) => {
            ds.len() == as_.len() && ds.iter().zip(as_.iter()).all(|(d, a)| type_compatible(d, a))
        }
        (T::DictEntry(dk, dv), T::DictEntry(ak, av)) => {
            type_compatible(dk, ak) && type_compatible(dv, av)
        }
        _ => declared == actual,
    }
}

fn peer_interface_desc() -> InterfaceDesc {
    InterfaceDesc {
        name: PEER_INTERFACE.to_owned(),
        methods: vec![
            MethodDesc {
                name: "Ping".to_owned(),
                args: vec![],
            },
            MethodDesc {
                name: "GetMachineId".to_owned(),
                args: vec![Arg {
                    name: Some("machine_uuid".to_owned()),
                    ty: "s".to_owned(),
                    direction: Some(Direction::Out),
                }],
            },
        ],
        properties: vec![],
        signals: vec![],
    }
}

fn introspectable_interface_desc() -> InterfaceDesc {
    InterfaceDesc {
        name: INTROSPECTABLE_INTERFACE.to_owned(),
        methods: vec![MethodDesc {
            name: "Introspect".to_owned(),
            args: vec![Arg {
                name: Some("xml_data".to_owned()),
                ty: "s".to_owned(),
                direction: Some(Direction::Out),
            }],
        }],
        properties: vec![],
        signals: vec![],
    }
}

fn properties_interface_desc() -> InterfaceDesc {
    InterfaceDesc {
        name: PROPERTIES_INTERFACE.to_owned(),
        methods: vec![
            MethodDesc {
                name: "Get".to_owned(),
                args: vec![
                    Arg { name: Some("interface_name".to_owned()), ty: "s".to_owned(), direction: Some(Direction::In) },
                    Arg { name: Some("property_name".to_owned()), ty: "s".to_owned(), direction: Some(Direction::In) },
                    Arg { name: Some("value".to_owned()), ty: "v".to_owned(), direction: Some(Direction::Out) },
                ],
            },
            MethodDesc {
                name: "Set".to_owned(),
                args: vec![
                    Arg { name: Some("interface_name".to_owned()), ty: "s".to_owned(), direction: Some(Direction::In) },
                    Arg { name: Some("property_name".to_owned()), ty: "s".to_owned(), direction: Some(Direction::In) },
                    Arg { name: Some("value".to_owned()), ty: "v".to_owned(), direction: Some(Direction::In) },
                ],
            },
            MethodDesc {
                name: "GetAll".to_owned(),
                args: vec![
                    Arg { name: Some("interface_name".to_owned()), ty: "s".to_owned(), direction: Some(Direction::In) },
                    Arg { name: Some("properties".to_owned()), ty: "a{sv}".to_owned(), direction: Some(Direction::Out) },
                ],
            },
        ],
        properties: vec![],
        signals: vec![SignalDesc {
            name: "PropertiesChanged".to_owned(),
            args: vec![
                Arg { name: Some("interface_name".to_owned()), ty: "s".to_owned(), direction: None },
                Arg { name: Some("changed_properties".to_owned()), ty: "a{sv}".to_owned(), direction: None },
                Arg { name: Some("invalidated_properties".to_owned()), ty: "as".to_owned(), direction: None },
            ],
        }],
    }
}

fn object_manager_interface_desc() -> InterfaceDesc {
    InterfaceDesc {
        name: OBJECT_MANAGER_INTERFACE.to_owned(),
        methods: vec![MethodDesc {
            name: "GetManagedObjects".to_owned(),
            args: vec![Arg {
                name: Some("objects".to_owned()),
                ty: "a{oa{sa{sv}}}".to_owned(),
                direction: Some(Direction::Out),
            }],
        }],
        properties: vec![],
        signals: vec![
            SignalDesc {
                name: "InterfacesAdded".to_owned(),
                args: vec![
                    Arg { name: Some("object_path".to_owned()), ty: "o".to_owned(), direction: None },
                    Arg { name: Some("interfaces_and_properties".to_owned()), ty: "a{sa{sv}}".to_owned(), direction: None },
                ],
            },
            SignalDesc {
                name: "InterfacesRemoved".to_owned(),
                args: vec![
                    Arg { name: Some("object_path".to_owned()), ty: "o".to_owned(), direction: None },
                    Arg { name: Some("interfaces".to_owned()), ty: "as".to_owned(), direction: None },
                ],
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_tolerant_matching_accepts_and_rejects() {
        assert!(type_compatible(&zvariant::Type::Variant, &zvariant::Type::I32));
        assert!(!type_compatible(&zvariant::Type::I32, &zvariant::Type::U32));
        let declared = zvariant::Type::Struct(vec![zvariant::Type::Variant, zvariant::Type::Str]);
        let actual = zvariant::Type::Struct(vec![zvariant::Type::I32, zvariant::Type::Str]);
        assert!(type_compatible(&declared, &actual));
    }

    #[test]
    fn property_changes_preserve_first_insertion_order() {
        let tracker = PropertyChanges::new();
        tracker.mark_changed("b", Value::I32(1));
        tracker.mark_changed("a", Value::I32(2));
        tracker.mark_changed("b", Value::I32(3));
        let (changed, _) = tracker.drain().unwrap();
        assert_eq!(changed[0].0, "b");
        assert_eq!(changed[0].1, Value::I32(3));
        assert_eq!(changed[1].0, "a");
    }
}
