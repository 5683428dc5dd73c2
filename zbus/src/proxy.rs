//! Remote object proxies built on introspection (spec §4.10).

use std::sync::{Arc, Mutex};

use zbus_names::{BusName, InterfaceName, MemberName, UniqueName};
use zvariant::{ObjectPath, Value};

use crate::connection::{Connection, SubscriptionHandle};
use crate::introspect::{self, Access, Direction, InterfaceDesc, NodeDesc};
use crate::match_rule::MatchRule;
use crate::message::Message;
use crate::{Error, Result};

/// A handle to a remote service, identified by its well-known (or unique) name.
pub struct ServiceHandle {
    connection: Arc<Connection>,
    name: BusName<'static>,
    owner: Mutex<Option<UniqueName<'static>>>,
}

impl ServiceHandle {
    pub fn new(connection: Arc<Connection>, name: BusName<'static>) -> Self {
        Self {
            connection,
            name,
            owner: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &BusName<'static> {
        &self.name
    }

    /// Resolve (and cache) the service's current unique-name owner via `GetNameOwner`.
    pub fn owner(&self) -> Result<UniqueName<'static>> {
        if let Some(owner) = self.owner.lock().unwrap().clone() {
            return Ok(owner);
        }
        let reply = self.connection.call_method(
            BusName::new("org.freedesktop.DBus".to_owned())?,
            ObjectPath::new("/org/freedesktop/DBus".to_owned())?,
            InterfaceName::new("org.freedesktop.DBus".to_owned())?,
            MemberName::new("GetNameOwner".to_owned())?,
            vec![Value::Str(self.name.as_str().to_owned())],
        )?;
        let owner = match reply.into_iter().next() {
            Some(Value::Str(s)) => UniqueName::new(s)?,
            _ => return Err(Error::ServiceNotFound(self.name.as_str().to_owned())),
        };
        *self.owner.lock().unwrap() = Some(owner.clone());
        Ok(owner)
    }

    /// Subscribe to `NameOwnerChanged` for this service's name and keep the cached owner in
    /// sync with it (spec §4.9: "repair service-handle owner fields" on ownership changes).
    pub fn watch_owner(self: &Arc<Self>) -> Result<SubscriptionHandle> {
        let rule = MatchRule::builder()
            .path(ObjectPath::new("/org/freedesktop/DBus".to_owned())?)
            .interface(InterfaceName::new("org.freedesktop.DBus".to_owned())?)
            .build();
        let handle = Arc::clone(self);
        self.connection.subscribe_signal(
            rule,
            Some(MemberName::new("NameOwnerChanged".to_owned())?),
            move |msg| {
                let body = msg.body();
                let (Some(Value::Str(name)), Some(Value::Str(new_owner))) =
                    (body.first(), body.get(2))
                else {
                    return;
                };
                if name.as_str() != handle.name.as_str() {
                    return;
                }
                *handle.owner.lock().unwrap() = if new_owner.is_empty() {
                    None
                } else {
                    UniqueName::new(new_owner.clone()).ok()
                };
            },
        )
    }

    pub fn object(self: &Arc<Self>, path: ObjectPath<'static>) -> ObjectProxy {
        ObjectProxy {
            service: Arc::clone(self),
            path,
        }
    }

    /// Recursively list every object path the service exposes, starting from `/`, by walking
    /// `Introspect`'s child-node listings.
    pub fn list_objects(self: &Arc<Self>) -> Result<Vec<ObjectPath<'static>>> {
        let mut found = Vec::new();
        self.walk(ObjectPath::new("/".to_owned())?, &mut found)?;
        Ok(found)
    }

    fn walk(self: &Arc<Self>, path: ObjectPath<'static>, found: &mut Vec<ObjectPath<'static>>) -> Result<()> {
        let proxy = self.object(path.clone());
        let node = proxy.introspect()?;
        found.push(path.clone());
        for child in node.children {
            let child_path = if path.as_str() == "/" {
                format!("/{child}")
            } else {
                format!("{}/{child}", path.as_str())
            };
            self.walk(ObjectPath::new(child_path)?, found)?;
        }
        Ok(())
    }
}

/// A handle to one object path on a remote service.
pub struct ObjectProxy {
    service: Arc<ServiceHandle>,
    path: ObjectPath<'static>,
}

impl ObjectProxy {
    pub fn path(&self) -> &ObjectPath<'static> {
        &self.path
    }

    pub fn introspect(&self) -> Result<NodeDesc> {
        let reply = self.service.connection.call_method(
            self.service.name.clone(),
            self.path.clone(),
            InterfaceName::new("org.freedesktop.DBus.Introspectable".to_owned())?,
            MemberName::new("Introspect".to_owned())?,
            Vec::new(),
        )?;
        match reply.into_iter().next() {
            Some(Value::Str(xml)) => introspect::from_xml(&xml),
            _ => Err(Error::Xml("Introspect did not return a string".into())),
        }
    }

    pub fn interface(&self, name: &str) -> Result<InterfaceProxy> {
        let node = self.introspect()?;
        let desc = node
            .interfaces
            .into_iter()
            .find(|i| i.name == name)
            .ok_or_else(|| Error::InterfaceNotFound(name.to_owned()))?;
        Ok(InterfaceProxy {
            service: Arc::clone(&self.service),
            path: self.path.clone(),
            desc,
        })
    }
}

/// A handle to one interface on a remote object, built from its introspected description.
pub struct InterfaceProxy {
    service: Arc<ServiceHandle>,
    path: ObjectPath<'static>,
    desc: InterfaceDesc,
}

impl InterfaceProxy {
    pub fn name(&self) -> &str {
        &self.desc.name
    }

    fn interface_name(&self) -> Result<InterfaceName<'static>> {
        Ok(InterfaceName::new(self.desc.name.clone())?)
    }

    /// Call a method, blocking for the reply. Returns a single value when the method has one
    /// `out` argument, or the full sequence otherwise (spec §4.10).
    pub fn call(&self, method: &str, args: Vec<Value<'static>>) -> Result<Vec<Value<'static>>> {
        let desc = self
            .desc
            .methods
            .iter()
            .find(|m| m.name == method)
            .ok_or_else(|| Error::UnknownMethod(method.to_owned()))?;
        let out_count = desc
            .args
            .iter()
            .filter(|a| a.direction == Some(Direction::Out))
            .count();

        let reply = self.service.connection.call_method(
            self.service.name.clone(),
            self.path.clone(),
            self.interface_name()?,
            MemberName::new(method.to_owned())?,
            args,
        )?;
        debug_assert!(out_count == reply.len() || out_count == 0);
        Ok(reply)
    }

    /// Call a method without waiting for a reply (`NO_REPLY_EXPECTED`).
    pub fn call_no_reply(&self, method: &str, args: Vec<Value<'static>>) -> Result<()> {
        self.service.connection.call_method_no_reply(
            self.service.name.clone(),
            self.path.clone(),
            self.interface_name()?,
            MemberName::new(method.to_owned())?,
            args,
        )
    }

    fn property_access(&self, name: &str) -> Result<Access> {
        self.desc
            .properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.access)
            .ok_or_else(|| Error::UnknownProperty(name.to_owned()))
    }

    pub fn get_property(&self, name: &str) -> Result<Value<'static>> {
        if !self.property_access(name)?.readable() {
            return Err(Error::AccessForbidden(name.to_owned()));
        }
        let reply = self.service.connection.call_method(
            self.service.name.clone(),
            self.path.clone(),
            InterfaceName::new("org.freedesktop.DBus.Properties".to_owned())?,
            MemberName::new("Get".to_owned())?,
            vec![
                Value::Str(self.desc.name.clone()),
                Value::Str(name.to_owned()),
            ],
        )?;
        match reply.into_iter().next() {
            Some(Value::Variant(v)) => Ok(*v),
            Some(other) => Ok(other),
            None => Err(Error::InvalidArgs),
        }
    }

    pub fn set_property(&self, name: &str, value: Value<'static>) -> Result<()> {
        if !self.property_access(name)?.writable() {
            return Err(Error::AccessForbidden(name.to_owned()));
        }
        self.service.connection.call_method(
            self.service.name.clone(),
            self.path.clone(),
            InterfaceName::new("org.freedesktop.DBus.Properties".to_owned())?,
            MemberName::new("Set".to_owned())?,
            vec![
                Value::Str(self.desc.name.clone()),
                Value::Str(name.to_owned()),
                Value::Variant(Box::new(value)),
            ],
        )?;
        Ok(())
    }

    /// Subscribe to a signal declared on this interface (spec §4.10 "lazily exposed through a
    /// shared-state subscribe-emitter tied to the bus client's subscription logic").
    pub fn subscribe_signal<F>(&self, member: &str, listener: F) -> Result<SubscriptionHandle>
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        if !self.desc.signals.iter().any(|s| s.name == member) {
            return Err(Error::UnknownMethod(member.to_owned()));
        }
        let rule = MatchRule::builder()
            .path(self.path.clone())
            .interface(self.interface_name()?)
            .build();
        self.service
            .connection
            .subscribe_signal(rule, Some(MemberName::new(member.to_owned())?), listener)
    }
}
