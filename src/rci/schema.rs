//! Configuration schema: the immutable tree of groups, lists and elements
//! the engine walks.
//!
//! ```text
//! RciDescriptor
//! ├── device            vendor id, firmware target 0 version
//! ├── global_errors     user globals, ids after the protocol errors
//! └── schema
//!     ├── setting[]     GroupDef ── collection, errors[]
//!     │                   └── elements[] ── ElementDef
//!     │                                       └── list? ── ListDef
//!     │                                                      └── elements[] ...
//!     └── state[]
//! ```
//!
//! Group and element ids are their positions in declaration order. The
//! descriptor is validated once at facility init and never mutated.

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::config::DeviceDescriptor;
use crate::error::SchemaError;

use super::RCI_LIST_MAX_DEPTH;
use super::value::ValueLimit;

// ── Enumerations ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupType {
    Setting,
    State,
}

/// How many instances a group or list has and how they are addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Collection {
    /// Exactly `n` instances addressed by index 1..=n.
    FixedArray(u32),
    /// Index-addressed; the count is negotiated with the application.
    VariableArray { dont_shrink: bool },
    /// Key-addressed; the key list comes from the application.
    VariableDictionary { dont_shrink: bool },
}

impl Collection {
    pub fn is_dynamic(self) -> bool {
        !matches!(self, Self::FixedArray(_))
    }

    pub fn is_dictionary(self) -> bool {
        matches!(self, Self::VariableDictionary { .. })
    }

    pub fn dont_shrink(self) -> bool {
        match self {
            Self::FixedArray(_) => true,
            Self::VariableArray { dont_shrink } | Self::VariableDictionary { dont_shrink } => dont_shrink,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Access {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl Access {
    pub fn readable(self) -> bool {
        self != Self::WriteOnly
    }

    pub fn writable(self) -> bool {
        self != Self::ReadOnly
    }
}

/// Element value types, numbered as on the wire descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ValueType {
    String = 1,
    MultilineString = 2,
    Password = 3,
    Int32 = 4,
    Uint32 = 5,
    Hex32 = 6,
    ZeroXHex32 = 7,
    Float = 8,
    Enum = 9,
    OnOff = 11,
    Boolean = 12,
    Ipv4 = 13,
    FqdnV4 = 14,
    FqdnV6 = 15,
    List = 17,
    MacAddr = 21,
    Datetime = 22,
}

impl ValueType {
    /// Carried on the wire as a length-prefixed string.
    pub fn is_text(self) -> bool {
        matches!(
            self,
            Self::String
                | Self::MultilineString
                | Self::Password
                | Self::FqdnV4
                | Self::FqdnV6
                | Self::MacAddr
                | Self::Datetime
        )
    }
}

// ── Definitions ───────────────────────────────────────────────

/// Entry of a global or group error table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDef {
    pub name: String,
    pub description: String,
}

impl ErrorDef {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementDef {
    pub name: String,
    pub access: Access,
    pub value_type: ValueType,
    #[serde(default)]
    pub limit: Option<ValueLimit>,
    /// Nested collection, present iff `value_type` is [`ValueType::List`].
    #[serde(default)]
    pub list: Option<ListDef>,
}

impl ElementDef {
    pub fn new(name: &str, value_type: ValueType, access: Access) -> Self {
        Self {
            name: name.into(),
            access,
            value_type,
            limit: None,
            list: None,
        }
    }

    pub fn with_limit(mut self, limit: ValueLimit) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn list(name: &str, list: ListDef) -> Self {
        Self {
            name: name.into(),
            access: Access::ReadWrite,
            value_type: ValueType::List,
            limit: None,
            list: Some(list),
        }
    }

    pub fn is_list(&self) -> bool {
        self.value_type == ValueType::List
    }

    /// The nested collection of a list element.
    pub fn as_collection(&self) -> Option<CollectionDef<'_>> {
        self.list.as_ref().map(|list| CollectionDef {
            name: &self.name,
            collection: list.collection,
            elements: &list.elements,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListDef {
    pub collection: Collection,
    pub elements: Vec<ElementDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupDef {
    pub name: String,
    pub collection: Collection,
    pub elements: Vec<ElementDef>,
    /// Group-local error table, ids start at the group error base.
    #[serde(default)]
    pub errors: Vec<ErrorDef>,
}

impl GroupDef {
    pub fn new(name: &str, collection: Collection, elements: Vec<ElementDef>) -> Self {
        Self {
            name: name.into(),
            collection,
            elements,
            errors: Vec::new(),
        }
    }

    pub fn with_errors(mut self, errors: Vec<ErrorDef>) -> Self {
        self.errors = errors;
        self
    }

    pub fn as_collection(&self) -> CollectionDef<'_> {
        CollectionDef {
            name: &self.name,
            collection: self.collection,
            elements: &self.elements,
        }
    }
}

/// Borrowed view shared by groups and lists, so the traversal handles both
/// the same way.
#[derive(Debug, Clone, Copy)]
pub struct CollectionDef<'a> {
    pub name: &'a str,
    pub collection: Collection,
    pub elements: &'a [ElementDef],
}

// ── Schema ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub setting: Vec<GroupDef>,
    #[serde(default)]
    pub state: Vec<GroupDef>,
}

impl Schema {
    pub fn groups(&self, group_type: GroupType) -> &[GroupDef] {
        match group_type {
            GroupType::Setting => &self.setting,
            GroupType::State => &self.state,
        }
    }

    pub fn group(&self, group_type: GroupType, id: u32) -> Option<&GroupDef> {
        self.groups(group_type).get(id as usize)
    }

    /// Resolve a collection from a group id followed by list element ids.
    pub fn collection(&self, group_type: GroupType, path: &[u32]) -> Option<CollectionDef<'_>> {
        let (&group_id, lists) = path.split_first()?;
        let mut def = self.group(group_type, group_id)?.as_collection();
        for &list_id in lists {
            def = def.elements.get(list_id as usize)?.as_collection()?;
        }
        Some(def)
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        for group in self.setting.iter().chain(&self.state) {
            if group.name.is_empty() {
                return Err(SchemaError::EmptyName);
            }
            validate_collection(group.collection, &group.elements, 0)?;
        }
        Ok(())
    }
}

fn validate_collection(collection: Collection, elements: &[ElementDef], depth: usize) -> Result<(), SchemaError> {
    if depth > RCI_LIST_MAX_DEPTH {
        return Err(SchemaError::ListTooDeep {
            depth,
            max: RCI_LIST_MAX_DEPTH,
        });
    }
    if collection == Collection::FixedArray(0) {
        return Err(SchemaError::EmptyFixedArray);
    }
    if elements.is_empty() {
        return Err(SchemaError::NoElements);
    }
    for element in elements {
        if element.name.is_empty() {
            return Err(SchemaError::EmptyName);
        }
        if let Some(limit) = &element.limit {
            if !limit.fits(element.value_type) {
                return Err(SchemaError::LimitMismatch);
            }
        }
        match (&element.list, element.is_list()) {
            (Some(list), true) => validate_collection(list.collection, &list.elements, depth + 1)?,
            (None, true) => return Err(SchemaError::MissingList),
            (Some(_), false) => return Err(SchemaError::UnexpectedList),
            (None, false) => {}
        }
    }
    Ok(())
}

// ── Descriptor ────────────────────────────────────────────────

/// Everything a deployment supplies to the engine at facility init.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RciDescriptor {
    #[serde(default)]
    pub device: DeviceDescriptor,
    /// User global errors, numbered after the protocol-defined ones.
    #[serde(default)]
    pub global_errors: Vec<ErrorDef>,
    pub schema: Schema,
}

impl RciDescriptor {
    /// Validate and wrap a schema.
    pub fn new(device: DeviceDescriptor, global_errors: Vec<ErrorDef>, schema: Schema) -> Result<Self, SchemaError> {
        schema.validate()?;
        Ok(Self {
            device,
            global_errors,
            schema,
        })
    }

    /// Load a descriptor produced by host tooling.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let desc: Self = serde_json::from_str(json)
            .map_err(anyhow::Error::msg)
            .context("parsing RCI descriptor JSON")?;
        desc.schema
            .validate()
            .map_err(anyhow::Error::msg)
            .context("validating RCI descriptor")?;
        Ok(desc)
    }

    /// Load a descriptor stored in flash.
    pub fn from_postcard(bytes: &[u8]) -> anyhow::Result<Self> {
        let desc: Self = postcard::from_bytes(bytes)
            .map_err(anyhow::Error::msg)
            .context("decoding RCI descriptor blob")?;
        desc.schema
            .validate()
            .map_err(anyhow::Error::msg)
            .context("validating RCI descriptor")?;
        Ok(desc)
    }

    pub fn to_postcard(&self) -> anyhow::Result<Vec<u8>> {
        postcard::to_allocvec(self)
            .map_err(anyhow::Error::msg)
            .context("encoding RCI descriptor blob")
    }
}
