//! Batch markers that travel through the flow alongside the records.
//!
//! A [`FlowBatch::File`] marker announces that the following records may
//! have a different schema. A [`FlowBatch::Facet`] marker opens a new facet
//! window; it implicitly closes the previous one. All records of a facet
//! must be propagated within a single window.

use crate::datum::Value;
use std::fmt;

/// One hashable component of a facet identifier.
///
/// Numbers are compared by their bit pattern so that identifiers can be
/// used as map keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyPart {
    Null,
    Bool(bool),
    Number(u64),
    String(String),
}

impl KeyPart {
    pub fn to_value(&self) -> Value {
        match self {
            KeyPart::Null => Value::Null,
            KeyPart::Bool(b) => Value::Bool(*b),
            KeyPart::Number(bits) => Value::Number(f64::from_bits(*bits)),
            KeyPart::String(s) => Value::String(s.clone()),
        }
    }
}

impl From<&Value> for KeyPart {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => KeyPart::Null,
            Value::Bool(b) => KeyPart::Bool(*b),
            // Normalize -0.0 so that it matches 0.0
            Value::Number(n) if *n == 0.0 => KeyPart::Number(0f64.to_bits()),
            Value::Number(n) => KeyPart::Number(n.to_bits()),
            Value::String(s) => KeyPart::String(s.clone()),
            other => KeyPart::String(other.to_string()),
        }
    }
}

impl From<&str> for KeyPart {
    fn from(s: &str) -> Self {
        KeyPart::String(s.to_string())
    }
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

/// Composite facet identifier: a scalar or a tuple of scalars.
///
/// Equality and hashing are structural, so tuple identifiers work as map
/// keys without any string serialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FacetId(pub Vec<KeyPart>);

impl FacetId {
    pub fn new(parts: Vec<KeyPart>) -> Self {
        FacetId(parts)
    }

    /// A single-component identifier.
    pub fn scalar(value: &Value) -> Self {
        FacetId(vec![KeyPart::from(value)])
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }

    pub fn to_values(&self) -> Vec<Value> {
        self.0.iter().map(KeyPart::to_value).collect()
    }
}

impl From<&str> for FacetId {
    fn from(s: &str) -> Self {
        FacetId(vec![KeyPart::from(s)])
    }
}

impl fmt::Display for FacetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", part)?;
        }
        Ok(())
    }
}

/// A batch boundary marker.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowBatch {
    /// Subsequent records may have a structurally different schema.
    File { url: Option<String> },
    /// Subsequent records belong to the given facet.
    Facet {
        facet_id: FacetId,
        fields: Option<Vec<String>>,
    },
}

impl FlowBatch {
    pub fn file(url: Option<String>) -> Self {
        FlowBatch::File { url }
    }

    pub fn facet(facet_id: FacetId) -> Self {
        FlowBatch::Facet {
            facet_id,
            fields: None,
        }
    }

    /// A facet boundary that records the fields the facet was derived from.
    pub fn facet_with_fields(facet_id: FacetId, fields: Vec<String>) -> Self {
        FlowBatch::Facet {
            facet_id,
            fields: Some(fields),
        }
    }

    #[inline]
    pub fn is_file(&self) -> bool {
        matches!(self, FlowBatch::File { .. })
    }

    #[inline]
    pub fn is_facet(&self) -> bool {
        matches!(self, FlowBatch::Facet { .. })
    }

    pub fn facet_id(&self) -> Option<&FacetId> {
        match self {
            FlowBatch::Facet { facet_id, .. } => Some(facet_id),
            FlowBatch::File { .. } => None,
        }
    }
}

impl fmt::Display for FlowBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowBatch::File { url: Some(url) } => write!(f, "file({})", url),
            FlowBatch::File { url: None } => write!(f, "file"),
            FlowBatch::Facet { facet_id, .. } => write!(f, "facet({})", facet_id),
        }
    }
}
