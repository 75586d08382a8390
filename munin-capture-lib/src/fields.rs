//! The narrow slice of the field-schema registry the capture core needs.
//!
//! Fields are defined once at pipeline init and referenced by id; sessions
//! accumulate typed values in a per-session bag with set semantics
//! (duplicates are ignored).

use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldId(usize);

#[derive(Debug, Default)]
pub struct FieldRegistry {
    expressions: Vec<String>,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a field expression and return its id. Defining the same
    /// expression twice returns the existing id.
    pub fn define(&mut self, expression: &str) -> FieldId {
        if let Some(idx) = self.expressions.iter().position(|e| e == expression) {
            return FieldId(idx);
        }
        self.expressions.push(expression.to_string());
        FieldId(self.expressions.len() - 1)
    }

    pub fn expression(&self, id: FieldId) -> Option<&str> {
        self.expressions.get(id.0).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.expressions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expressions.is_empty()
    }
}

/// Field ids the core itself attaches to sessions.
#[derive(Debug, Clone, Copy)]
pub struct CoreFields {
    pub mac_src: FieldId,
    pub mac_dst: FieldId,
    pub vlan: FieldId,
    pub gre_ip: FieldId,
}

impl CoreFields {
    pub fn register(registry: &mut FieldRegistry) -> Self {
        CoreFields {
            mac_src: registry.define("mac.src"),
            mac_dst: registry.define("mac.dst"),
            vlan: registry.define("vlan"),
            gre_ip: registry.define("gre.ip"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum FieldValue {
    Str(String),
    Int(u32),
}

/// Per-session field values.
#[derive(Debug, Default)]
pub struct FieldBag {
    values: BTreeMap<FieldId, BTreeSet<FieldValue>>,
}

impl FieldBag {
    pub fn add_string(&mut self, id: FieldId, value: impl Into<String>) {
        self.values.entry(id).or_default().insert(FieldValue::Str(value.into()));
    }

    pub fn add_int(&mut self, id: FieldId, value: u32) {
        self.values.entry(id).or_default().insert(FieldValue::Int(value));
    }

    pub fn count(&self, id: FieldId) -> usize {
        self.values.get(&id).map_or(0, BTreeSet::len)
    }

    pub fn strings(&self, id: FieldId) -> impl Iterator<Item = &str> {
        self.values.get(&id).into_iter().flatten().filter_map(|v| match v {
            FieldValue::Str(s) => Some(s.as_str()),
            FieldValue::Int(_) => None,
        })
    }

    pub fn ints(&self, id: FieldId) -> impl Iterator<Item = u32> + '_ {
        self.values.get(&id).into_iter().flatten().filter_map(|v| match v {
            FieldValue::Int(i) => Some(*i),
            FieldValue::Str(_) => None,
        })
    }
}
