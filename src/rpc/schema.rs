//! Runtime message schemas and schema-checked dynamic messages.
//!
//! A [`MessageSchema`] is the runtime type handle a method descriptor exposes
//! for its input and output. A [`Codec`](super::Codec) decodes bytes into a
//! [`DynamicMessage`] of a given schema without any compile-time knowledge of
//! the concrete message type.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::CodecError;

/// The scalar type of a message field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    String,
    Int,
    Float,
    Bool,
}

impl FieldKind {
    /// Returns `true` if `value` is a valid representation of this kind.
    ///
    /// `Float` fields accept any JSON number; `Int` fields only integral ones.
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Int => value.is_i64() || value.is_u64(),
            Self::Float => value.is_number(),
            Self::Bool => value.is_boolean(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Short name of a JSON value's shape, used in schema mismatch errors.
pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A named message type with an ordered set of typed fields.
///
/// # Examples
///
/// ```
/// use readthrough::rpc::{FieldKind, MessageSchema};
///
/// let schema = MessageSchema::new("svc.HelloReply").field("msg", FieldKind::String);
/// assert_eq!(schema.name(), "svc.HelloReply");
/// assert_eq!(schema.field_kind("msg"), Some(FieldKind::String));
/// assert_eq!(schema.field_kind("missing"), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSchema {
    name: String,
    fields: Vec<(String, FieldKind)>,
}

impl MessageSchema {
    /// Creates a schema with no fields.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Declares a field. A later declaration with the same name replaces the earlier one.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        let name = name.into();
        self.fields.retain(|(existing, _)| existing != &name);
        self.fields.push((name, kind));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared kind of `field`, or `None` if the schema has no such field.
    pub fn field_kind(&self, field: &str) -> Option<FieldKind> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, kind)| *kind)
    }

    /// Returns an iterator over `(name, kind)` pairs in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, FieldKind)> {
        self.fields.iter().map(|(name, kind)| (name.as_str(), *kind))
    }

    /// Checks that `value` may be stored in `field`.
    ///
    /// # Errors
    ///
    /// [`CodecError::UnknownField`] if the field is not declared, or
    /// [`CodecError::FieldType`] if the value has the wrong kind.
    pub fn check(&self, field: &str, value: &Value) -> Result<(), CodecError> {
        let Some(kind) = self.field_kind(field) else {
            return Err(CodecError::UnknownField {
                message: self.name.clone(),
                field: field.to_owned(),
            });
        };
        if kind.accepts(value) {
            Ok(())
        } else {
            Err(CodecError::FieldType {
                message: self.name.clone(),
                field: field.to_owned(),
                expected: kind,
                found: value_kind(value),
            })
        }
    }
}

/// A message instance whose fields are checked against its [`MessageSchema`].
///
/// Unset fields are simply absent. Two messages are equal when they share a
/// schema and hold the same field values.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use readthrough::rpc::{DynamicMessage, FieldKind, MessageSchema};
///
/// let schema = Arc::new(MessageSchema::new("svc.HelloReply").field("msg", FieldKind::String));
/// let reply = DynamicMessage::new(schema).with("msg", "hi").unwrap();
/// assert_eq!(reply.get("msg").and_then(|v| v.as_str()), Some("hi"));
/// assert!(reply.clone().with("msg", 7).is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicMessage {
    schema: Arc<MessageSchema>,
    fields: BTreeMap<String, Value>,
}

impl DynamicMessage {
    /// Creates an empty message of the given schema.
    pub fn new(schema: Arc<MessageSchema>) -> Self {
        Self {
            schema,
            fields: BTreeMap::new(),
        }
    }

    pub fn schema(&self) -> &Arc<MessageSchema> {
        &self.schema
    }

    /// Sets a field after checking it against the schema.
    ///
    /// # Errors
    ///
    /// Propagates the error from [`MessageSchema::check`]; the message is left unchanged.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> Result<(), CodecError> {
        let value = value.into();
        self.schema.check(field, &value)?;
        self.fields.insert(field.to_owned(), value);
        Ok(())
    }

    /// Builder form of [`set`](Self::set).
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Result<Self, CodecError> {
        self.set(field, value)?;
        Ok(self)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Returns all set fields, ordered by name.
    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }
}
