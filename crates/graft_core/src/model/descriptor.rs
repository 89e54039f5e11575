//! Symbol descriptors and the kind mappings used by rewritten call sites.
//!
//! # Responsibility
//! - Define the `{kind, name, signature}` triple keying required/resolved
//!   symbols.
//! - Map field-access operations and linked-handle tags onto symbol kinds.
//!
//! # Invariants
//! - Descriptor equality is structural over all three fields.
//! - Every recognized opcode/tag maps to exactly one kind; an unrecognized
//!   tag is a configuration error, never skipped.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Kind of symbol a descriptor refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Constructor,
    VirtualMethod,
    StaticMethod,
    VirtualGetter,
    StaticGetter,
    VirtualSetter,
    StaticSetter,
}

impl SymbolKind {
    /// Maps a field-access operation to its accessor kind.
    pub fn from_field_op(op: FieldAccessOp) -> Self {
        match op {
            FieldAccessOp::GetInstance => Self::VirtualGetter,
            FieldAccessOp::GetStatic => Self::StaticGetter,
            FieldAccessOp::PutInstance => Self::VirtualSetter,
            FieldAccessOp::PutStatic => Self::StaticSetter,
        }
    }

    /// Maps a linked-method handle tag to a kind.
    ///
    /// The tag values are fixed wire constants produced during analysis.
    /// An unknown tag means the analysis output and this runtime are out of
    /// sync, which is fatal.
    pub fn from_handle_tag(tag: u8) -> Result<Self, DescriptorError> {
        match tag {
            HandleTag::GET_FIELD => Ok(Self::VirtualGetter),
            HandleTag::GET_STATIC => Ok(Self::StaticGetter),
            HandleTag::PUT_FIELD => Ok(Self::VirtualSetter),
            HandleTag::PUT_STATIC => Ok(Self::StaticSetter),
            HandleTag::INVOKE_VIRTUAL | HandleTag::INVOKE_INTERFACE => Ok(Self::VirtualMethod),
            HandleTag::INVOKE_STATIC => Ok(Self::StaticMethod),
            HandleTag::NEW_INVOKE_SPECIAL => Ok(Self::Constructor),
            other => Err(DescriptorError::UnknownHandleTag(other)),
        }
    }

    /// Whether the kind dispatches on an instance receiver.
    pub fn is_instance(self) -> bool {
        matches!(
            self,
            Self::VirtualMethod | Self::VirtualGetter | Self::VirtualSetter
        )
    }
}

impl Display for SymbolKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Constructor => "constructor",
            Self::VirtualMethod => "virtual method",
            Self::StaticMethod => "static method",
            Self::VirtualGetter => "virtual getter",
            Self::StaticGetter => "static getter",
            Self::VirtualSetter => "virtual setter",
            Self::StaticSetter => "static setter",
        };
        f.write_str(s)
    }
}

/// Field access operation shapes recognized by the analysis output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldAccessOp {
    GetInstance,
    GetStatic,
    PutInstance,
    PutStatic,
}

/// Fixed wire values for linked-method handle tags.
pub struct HandleTag;

impl HandleTag {
    pub const GET_FIELD: u8 = 1;
    pub const GET_STATIC: u8 = 2;
    pub const PUT_FIELD: u8 = 3;
    pub const PUT_STATIC: u8 = 4;
    pub const INVOKE_VIRTUAL: u8 = 5;
    pub const INVOKE_STATIC: u8 = 6;
    pub const NEW_INVOKE_SPECIAL: u8 = 8;
    pub const INVOKE_INTERFACE: u8 = 9;
}

/// Identity of one member symbol within an owning unit.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SymbolDescriptor {
    pub kind: SymbolKind,
    pub name: String,
    pub signature: String,
}

impl SymbolDescriptor {
    pub fn new(kind: SymbolKind, name: impl Into<String>, signature: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            signature: signature.into(),
        }
    }

    /// Descriptor synthesized from a field-access operation.
    pub fn from_field_op(
        op: FieldAccessOp,
        name: impl Into<String>,
        signature: impl Into<String>,
    ) -> Self {
        Self::new(SymbolKind::from_field_op(op), name, signature)
    }

    /// Descriptor synthesized from a linked-method handle tag.
    pub fn from_handle_tag(
        tag: u8,
        name: impl Into<String>,
        signature: impl Into<String>,
    ) -> Result<Self, DescriptorError> {
        Ok(Self::new(SymbolKind::from_handle_tag(tag)?, name, signature))
    }
}

impl Display for SymbolDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}{}", self.kind, self.name, self.signature)
    }
}

/// Descriptor synthesis errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    UnknownHandleTag(u8),
}

impl Display for DescriptorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownHandleTag(tag) => write!(f, "unknown linked-handle tag: {tag}"),
        }
    }
}

impl Error for DescriptorError {}

#[cfg(test)]
mod tests {
    use super::{DescriptorError, FieldAccessOp, HandleTag, SymbolDescriptor, SymbolKind};

    #[test]
    fn maps_field_ops_to_accessor_kinds() {
        assert_eq!(
            SymbolKind::from_field_op(FieldAccessOp::GetInstance),
            SymbolKind::VirtualGetter
        );
        assert_eq!(
            SymbolKind::from_field_op(FieldAccessOp::GetStatic),
            SymbolKind::StaticGetter
        );
        assert_eq!(
            SymbolKind::from_field_op(FieldAccessOp::PutInstance),
            SymbolKind::VirtualSetter
        );
        assert_eq!(
            SymbolKind::from_field_op(FieldAccessOp::PutStatic),
            SymbolKind::StaticSetter
        );
    }

    #[test]
    fn maps_handle_tags_to_kinds() {
        let cases = [
            (HandleTag::GET_FIELD, SymbolKind::VirtualGetter),
            (HandleTag::GET_STATIC, SymbolKind::StaticGetter),
            (HandleTag::PUT_FIELD, SymbolKind::VirtualSetter),
            (HandleTag::PUT_STATIC, SymbolKind::StaticSetter),
            (HandleTag::INVOKE_VIRTUAL, SymbolKind::VirtualMethod),
            (HandleTag::INVOKE_INTERFACE, SymbolKind::VirtualMethod),
            (HandleTag::INVOKE_STATIC, SymbolKind::StaticMethod),
            (HandleTag::NEW_INVOKE_SPECIAL, SymbolKind::Constructor),
        ];
        for (tag, kind) in cases {
            assert_eq!(SymbolKind::from_handle_tag(tag).expect("known tag"), kind);
        }
    }

    #[test]
    fn rejects_unknown_handle_tag() {
        let err = SymbolKind::from_handle_tag(7).expect_err("tag 7 is unassigned");
        assert_eq!(err, DescriptorError::UnknownHandleTag(7));
    }

    #[test]
    fn only_virtual_kinds_dispatch_on_a_receiver() {
        let instance = [
            SymbolKind::VirtualMethod,
            SymbolKind::VirtualGetter,
            SymbolKind::VirtualSetter,
        ];
        let receiverless = [
            SymbolKind::Constructor,
            SymbolKind::StaticMethod,
            SymbolKind::StaticGetter,
            SymbolKind::StaticSetter,
        ];
        for kind in instance {
            assert!(kind.is_instance(), "{kind} takes a receiver");
        }
        for kind in receiverless {
            assert!(!kind.is_instance(), "{kind} takes no receiver");
        }
    }

    #[test]
    fn descriptor_equality_is_structural() {
        let a = SymbolDescriptor::new(SymbolKind::VirtualMethod, "foo", "()V");
        let b = SymbolDescriptor::new(SymbolKind::VirtualMethod, "foo", "()V");
        let c = SymbolDescriptor::new(SymbolKind::StaticMethod, "foo", "()V");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn descriptor_display_names_member() {
        let d = SymbolDescriptor::new(SymbolKind::VirtualMethod, "foo", "()V");
        assert_eq!(d.to_string(), "virtual method foo()V");
    }

    #[test]
    fn descriptor_serializes_with_snake_case_kind() {
        let d = SymbolDescriptor::new(SymbolKind::StaticGetter, "limit", "I");
        let json = serde_json::to_string(&d).expect("descriptor serialization");
        assert!(json.contains("\"static_getter\""));
        assert!(json.contains("\"limit\""));
    }
}
