use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A structured component value attached to an item variant.
///
/// `Tag` is deliberately restricted to totally ordered value kinds so that
/// variants can be compared, hashed, and canonically encoded. Compounds are
/// `BTreeMap`s, so their encoding does not depend on insertion order.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tag {
    Bool(bool),
    Int(i64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<Tag>),
    Compound(BTreeMap<String, Tag>),
}

impl From<bool> for Tag {
    fn from(v: bool) -> Self {
        Tag::Bool(v)
    }
}

impl From<i64> for Tag {
    fn from(v: i64) -> Self {
        Tag::Int(v)
    }
}

impl From<&str> for Tag {
    fn from(v: &str) -> Self {
        Tag::Str(v.to_string())
    }
}

impl From<String> for Tag {
    fn from(v: String) -> Self {
        Tag::Str(v)
    }
}

/// An immutable description of "what kind of item, with which extra data".
///
/// The variant carries the item kind (e.g. `"minecraft:diamond_sword"`) and
/// every non-quantity attribute: enchantments, custom names, binding tags.
/// Two variants are equal iff kind and all components compare equal. The
/// unit count is never part of a variant.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemVariant {
    /// Registry name of the item kind. Empty for the empty variant.
    pub kind: String,
    /// Extra data, keyed by component name.
    pub components: BTreeMap<String, Tag>,
}

impl ItemVariant {
    /// A variant of the given kind with no extra data.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            components: BTreeMap::new(),
        }
    }

    /// The empty variant ("air").
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builder-style component attachment.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Tag>) -> Self {
        self.components.insert(name.into(), value.into());
        self
    }

    /// Returns `true` for the empty variant.
    pub fn is_empty(&self) -> bool {
        self.kind.is_empty()
    }

    /// A stack of `count` units of this variant.
    pub fn stack(&self, count: u64) -> ItemStack {
        ItemStack::new(self.clone(), count)
    }
}

impl fmt::Display for ItemVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}[{} components]", self.kind, self.components.len())
        }
    }
}

/// A variant together with a unit count.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub variant: ItemVariant,
    pub count: u64,
}

impl ItemStack {
    pub fn new(variant: ItemVariant, count: u64) -> Self {
        Self { variant, count }
    }

    /// The empty stack.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A stack is empty if it has no units or no item kind.
    pub fn is_empty(&self) -> bool {
        self.count == 0 || self.variant.is_empty()
    }
}

impl fmt::Display for ItemStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} x{}", self.variant, self.count)
    }
}

/// Game-data context under which a variant's components are interpreted.
///
/// Component data can depend on the registries loaded by the game; the
/// `registry` fingerprint names that set and is folded into the template
/// hash, so the same bytes under a different registry set produce a
/// different template.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HashContext {
    pub registry: String,
}

impl HashContext {
    pub fn new(registry: impl Into<String>) -> Self {
        Self {
            registry: registry.into(),
        }
    }
}

impl Default for HashContext {
    fn default() -> Self {
        Self::new("default")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sword() -> ItemVariant {
        ItemVariant::new("minecraft:diamond_sword")
            .with("enchantments", Tag::Compound(BTreeMap::from([
                ("sharpness".to_string(), Tag::Int(5)),
            ])))
            .with("custom_name", "Excalibur")
    }

    #[test]
    fn equality_covers_components() {
        assert_eq!(sword(), sword());
        assert_ne!(sword(), ItemVariant::new("minecraft:diamond_sword"));
        assert_ne!(sword(), sword().with("custom_name", "Other"));
    }

    #[test]
    fn component_order_does_not_matter() {
        let a = ItemVariant::new("minecraft:stick").with("a", 1i64).with("b", 2i64);
        let b = ItemVariant::new("minecraft:stick").with("b", 2i64).with("a", 1i64);
        assert_eq!(a, b);
    }

    #[test]
    fn empty_variant_and_stack() {
        assert!(ItemVariant::empty().is_empty());
        assert!(ItemStack::empty().is_empty());
        assert!(sword().stack(0).is_empty());
        assert!(!sword().stack(1).is_empty());
    }

    #[test]
    fn display_formats() {
        assert_eq!(ItemVariant::new("minecraft:dirt").to_string(), "minecraft:dirt");
        assert_eq!(
            sword().stack(2).to_string(),
            "minecraft:diamond_sword[2 components] x2"
        );
    }

    #[test]
    fn bincode_roundtrip() {
        let bytes = bincode::serialize(&sword()).unwrap();
        let decoded: ItemVariant = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, sword());
    }

    #[test]
    fn json_roundtrip() {
        let stack = sword().stack(3);
        let json = serde_json::to_string(&stack).unwrap();
        let decoded: ItemStack = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, stack);
    }
}
