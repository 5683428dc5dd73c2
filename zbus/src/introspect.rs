//! Introspection XML generation and parsing (spec §4.12, §6).

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;
use std::io::Cursor;

use crate::{Error, Result};

const DOCTYPE: &str = "<!DOCTYPE node PUBLIC \"-//freedesktop//DTD D-BUS Object Introspection 1.0//EN\"\n\"http://www.freedesktop.org/standards/dbus/1.0/introspect.dtd\">";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arg {
    pub name: Option<String>,
    pub ty: String,
    pub direction: Option<Direction>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDesc {
    pub name: String,
    pub args: Vec<Arg>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalDesc {
    pub name: String,
    pub args: Vec<Arg>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    ReadWrite,
}

impl Access {
    fn as_str(self) -> &'static str {
        match self {
            Access::Read => "read",
            Access::Write => "write",
            Access::ReadWrite => "readwrite",
        }
    }

    fn parse(s: &str) -> Result<Self> {
        match s {
            "read" => Ok(Access::Read),
            "write" => Ok(Access::Write),
            "readwrite" => Ok(Access::ReadWrite),
            other => Err(Error::Xml(format!("invalid property access {other}"))),
        }
    }

    pub fn readable(self) -> bool {
        matches!(self, Access::Read | Access::ReadWrite)
    }

    pub fn writable(self) -> bool {
        matches!(self, Access::Write | Access::ReadWrite)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDesc {
    pub name: String,
    pub ty: String,
    pub access: Access,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InterfaceDesc {
    pub name: String,
    pub methods: Vec<MethodDesc>,
    pub properties: Vec<PropertyDesc>,
    pub signals: Vec<SignalDesc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NodeDesc {
    pub interfaces: Vec<InterfaceDesc>,
    pub children: Vec<String>,
}

fn attr(tag: &BytesStart, name: &str) -> Result<String> {
    for a in tag.attributes().flatten() {
        if a.key.as_ref() == name.as_bytes() {
            return Ok(a
                .unescape_value()
                .map_err(|e| Error::Xml(e.to_string()))?
                .into_owned());
        }
    }
    Err(Error::Xml(format!("missing attribute {name}")))
}

fn attr_opt(tag: &BytesStart, name: &str) -> Option<String> {
    tag.attributes().flatten().find_map(|a| {
        if a.key.as_ref() == name.as_bytes() {
            a.unescape_value().ok().map(|v| v.into_owned())
        } else {
            None
        }
    })
}

pub fn to_xml(node: &NodeDesc) -> Result<String> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    writer
        .write_event(Event::Start(BytesStart::new("node")))
        .map_err(|e| Error::Xml(e.to_string()))?;

    for iface in &node.interfaces {
        let mut iface_tag = BytesStart::new("interface");
        iface_tag.push_attribute(("name", iface.name.as_str()));
        writer
            .write_event(Event::Start(iface_tag))
            .map_err(|e| Error::Xml(e.to_string()))?;

        for method in &iface.methods {
            write_method_like(&mut writer, "method", &method.name, &method.args)?;
        }
        for signal in &iface.signals {
            write_method_like(&mut writer, "signal", &signal.name, &signal.args)?;
        }
        for prop in &iface.properties {
            let mut tag = BytesStart::new("property");
            tag.push_attribute(("name", prop.name.as_str()));
            tag.push_attribute(("type", prop.ty.as_str()));
            tag.push_attribute(("access", prop.access.as_str()));
            writer
                .write_event(Event::Empty(tag))
                .map_err(|e| Error::Xml(e.to_string()))?;
        }

        writer
            .write_event(Event::End(BytesEnd::new("interface")))
            .map_err(|e| Error::Xml(e.to_string()))?;
    }

    for child in &node.children {
        let mut tag = BytesStart::new("node");
        tag.push_attribute(("name", child.as_str()));
        writer
            .write_event(Event::Empty(tag))
            .map_err(|e| Error::Xml(e.to_string()))?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("node")))
        .map_err(|e| Error::Xml(e.to_string()))?;

    let body = String::from_utf8(writer.into_inner().into_inner())
        .map_err(|e| Error::Xml(e.to_string()))?;
    Ok(format!("{DOCTYPE}\n{body}\n"))
}

fn write_method_like(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    tag_name: &str,
    name: &str,
    args: &[Arg],
) -> Result<()> {
    let mut tag = BytesStart::new(tag_name);
    tag.push_attribute(("name", name));
    writer
        .write_event(Event::Start(tag))
        .map_err(|e| Error::Xml(e.to_string()))?;
    for arg in args {
        let mut arg_tag = BytesStart::new("arg");
        if let Some(n) = &arg.name {
            arg_tag.push_attribute(("name", n.as_str()));
        }
        arg_tag.push_attribute(("type", arg.ty.as_str()));
        if let Some(dir) = &arg.direction {
            arg_tag.push_attribute((
                "direction",
                match dir {
                    Direction::In => "in",
                    Direction::Out => "out",
                },
            ));
        }
        writer
            .write_event(Event::Empty(arg_tag))
            .map_err(|e| Error::Xml(e.to_string()))?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(tag_name)))
        .map_err(|e| Error::Xml(e.to_string()))?;
    Ok(())
}

pub fn from_xml(xml: &str) -> Result<NodeDesc> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut node = NodeDesc::default();
    let mut current_iface: Option<InterfaceDesc> = None;
    let mut current_method: Option<(String, Vec<Arg>)> = None;
    let mut current_signal: Option<(String, Vec<Arg>)> = None;

    loop {
        match reader.read_event().map_err(|e| Error::Xml(e.to_string()))? {
            Event::Eof => break,
            Event::Start(tag) | Event::Empty(tag) => {
                match tag.name().as_ref() {
                    b"node" => {
                        if let Some(name) = attr_opt(&tag, "name") {
                            node.children.push(name);
                        }
                    }
                    b"interface" => {
                        current_iface = Some(InterfaceDesc {
                            name: attr(&tag, "name")?,
                            ..Default::default()
                        });
                    }
                    b"method" => {
                        current_method = Some((attr(&tag, "name")?, Vec::new()));
                    }
                    b"signal" => {
                        current_signal = Some((attr(&tag, "name")?, Vec::new()));
                    }
                    b"arg" => {
                        let a = Arg {
                            name: attr_opt(&tag, "name"),
                            ty: attr(&tag, "type")?,
                            direction: attr_opt(&tag, "direction").map(|d| {
                                if d == "out" {
                                    Direction::Out
                                } else {
                                    Direction::In
                                }
                            }),
                        };
                        if let Some((_, args)) = current_method.as_mut() {
                            args.push(a);
                        } else if let Some((_, args)) = current_signal.as_mut() {
                            args.push(a);
                        }
                    }
                    b"property" => {
                        let p = PropertyDesc {
                            name: attr(&tag, "name")?,
                            ty: attr(&tag, "type")?,
                            access: Access::parse(&attr(&tag, "access")?)?,
                        };
                        if let Some(iface) = current_iface.as_mut() {
                            iface.properties.push(p);
                        }
                    }
                    _ => {}
                }
            }
            Event::End(tag) => match tag.name().as_ref() {
                b"method" => {
                    if let (Some((name, args)), Some(iface)) =
                        (current_method.take(), current_iface.as_mut())
                    {
                        iface.methods.push(MethodDesc { name, args });
                    }
                }
                b"signal" => {
                    if let (Some((name, args)), Some(iface)) =
                        (current_signal.take(), current_iface.as_mut())
                    {
                        iface.signals.push(SignalDesc { name, args });
                    }
                }
                b"interface" => {
                    if let Some(iface) = current_iface.take() {
                        node.interfaces.push(iface);
                    }
                }
                _ => {}
            },
            _ => {}
        }
    }

    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NodeDesc {
        NodeDesc {
            interfaces: vec![InterfaceDesc {
                name: "com.example.Foo".to_owned(),
                methods: vec![MethodDesc {
                    name: "DoThing".to_owned(),
                    args: vec![
                        Arg {
                            name: Some("input".to_owned()),
                            ty: "s".to_owned(),
                            direction: Some(Direction::In),
                        },
                        Arg {
                            name: Some("output".to_owned()),
                            ty: "i".to_owned(),
                            direction: Some(Direction::Out),
                        },
                    ],
                }],
                properties: vec![PropertyDesc {
                    name: "Timestamp".to_owned(),
                    ty: "x".to_owned(),
                    access: Access::Read,
                }],
                signals: vec![SignalDesc {
                    name: "Changed".to_owned(),
                    args: vec![Arg {
                        name: None,
                        ty: "s".to_owned(),
                        direction: None,
                    }],
                }],
            }],
            children: vec!["b".to_owned()],
        }
    }

    #[test]
    fn has_doctype_header() {
        let xml = to_xml(&sample()).unwrap();
        assert!(xml.starts_with("<!DOCTYPE node"));
    }

    #[test]
    fn round_trips_interfaces_methods_properties_signals() {
        let node = sample();
        let xml = to_xml(&node).unwrap();
        let parsed = from_xml(&xml).unwrap();
        assert_eq!(parsed, node);
    }

    #[test]
    fn includes_child_node_entries() {
        let xml = to_xml(&sample()).unwrap();
        assert!(xml.contains("<node name=\"b\"/>"));
    }
}
