//! D-Bus variant and signature encoding & decoding.
//!
//! This crate implements the recursive D-Bus type system (§3/§4 of the wire-format
//! specification this workspace follows): a [`signature`] parser that turns a signature string
//! into a tree of [`signature::Type`] nodes, a tagged [`value::Value`] tree ("signed value") that
//! normalizes caller data into that shape, and an [`ser::Encoder`]/[`de::Decoder`] pair that walk
//! the tree to produce and consume alignment-correct bytes.
//!
//! It deliberately does not use `serde`: the signed-value tree is a sum type the encoder and
//! decoder pattern-match on directly, rather than a generic data model driven by derive macros.

mod endian;
mod error;
mod object_path;
mod signature;

pub mod de;
pub mod ser;
pub mod value;

pub use de::{decode, DecodeOptions, Decoder};
pub use endian::Endian;
pub use error::{Error, Result};
pub use object_path::ObjectPath;
pub use ser::{encode, Encoder};
pub use signature::{parse_signature, signature_string_for, Signature, Type};
pub use value::{Array, Structure, Value};
