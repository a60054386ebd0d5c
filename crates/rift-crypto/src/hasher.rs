use rift_types::{HashContext, ItemVariant, TemplateHash};

/// Domain tag prepended to every template digest, so template hashes
/// never collide with other BLAKE3 digests over the same bytes.
const TEMPLATE_DOMAIN: &str = "rift-template-v1";

/// Hash several byte strings as one domain-separated message. Each part is
/// length-prefixed so that part boundaries are unambiguous.
fn hash_parts(parts: &[&[u8]]) -> TemplateHash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(TEMPLATE_DOMAIN.as_bytes());
    hasher.update(b":");
    for part in parts {
        hasher.update(&(part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    TemplateHash::from_hash(*hasher.finalize().as_bytes())
}

/// Computes the [`TemplateHash`] of item variants under a fixed context.
///
/// The digest covers the variant's kind, every component, and the context's
/// registry fingerprint. Quantity is not an input, so every stack of the same
/// variant maps to the same template.
#[derive(Clone, Debug, Default)]
pub struct VariantHasher {
    context: HashContext,
}

impl VariantHasher {
    pub fn new(context: HashContext) -> Self {
        Self { context }
    }

    /// The context this hasher folds into every digest.
    pub fn context(&self) -> &HashContext {
        &self.context
    }

    /// Hash a variant. Fails only if the variant cannot be encoded.
    pub fn hash(&self, variant: &ItemVariant) -> Result<TemplateHash, HasherError> {
        if variant.is_empty() {
            return Err(HasherError::EmptyVariant);
        }
        let encoded = bincode::serialize(&(&variant.kind, &variant.components))
            .map_err(|e| HasherError::Serialization(e.to_string()))?;
        Ok(hash_parts(&[&encoded, self.context.registry.as_bytes()]))
    }

    /// Verify that a variant produces the expected hash.
    pub fn verify(&self, variant: &ItemVariant, expected: &TemplateHash) -> bool {
        self.hash(variant).map(|h| h == *expected).unwrap_or(false)
    }
}

/// Errors from hashing operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HasherError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("the empty variant has no template")]
    EmptyVariant,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rift_types::Tag;

    fn pick() -> ItemVariant {
        ItemVariant::new("minecraft:diamond_pickaxe").with("efficiency", 5i64)
    }

    #[test]
    fn hash_is_deterministic() {
        let hasher = VariantHasher::default();
        assert_eq!(hasher.hash(&pick()).unwrap(), hasher.hash(&pick()).unwrap());
    }

    #[test]
    fn components_change_the_hash() {
        let hasher = VariantHasher::default();
        let plain = ItemVariant::new("minecraft:diamond_pickaxe");
        assert_ne!(hasher.hash(&plain).unwrap(), hasher.hash(&pick()).unwrap());
        let renamed = pick().with("custom_name", Tag::Str("Digger".into()));
        assert_ne!(hasher.hash(&renamed).unwrap(), hasher.hash(&pick()).unwrap());
    }

    #[test]
    fn stack_count_is_not_an_input() {
        let hasher = VariantHasher::default();
        let one = pick().stack(1);
        let many = pick().stack(64);
        assert_eq!(
            hasher.hash(&one.variant).unwrap(),
            hasher.hash(&many.variant).unwrap()
        );
    }

    #[test]
    fn context_changes_the_hash() {
        let a = VariantHasher::new(HashContext::new("vanilla"));
        let b = VariantHasher::new(HashContext::new("modded"));
        assert_ne!(a.hash(&pick()).unwrap(), b.hash(&pick()).unwrap());
    }

    #[test]
    fn empty_variant_is_rejected() {
        let hasher = VariantHasher::default();
        assert_eq!(
            hasher.hash(&ItemVariant::empty()).unwrap_err(),
            HasherError::EmptyVariant
        );
    }

    #[test]
    fn verify_matches_hash() {
        let hasher = VariantHasher::default();
        let hash = hasher.hash(&pick()).unwrap();
        assert!(hasher.verify(&pick(), &hash));
        assert!(!hasher.verify(&ItemVariant::new("minecraft:stick"), &hash));
    }

    #[test]
    fn part_boundaries_are_unambiguous() {
        assert_ne!(hash_parts(&[b"ab", b"c"]), hash_parts(&[b"a", b"bc"]));
    }

    #[test]
    fn domain_separates_from_plain_blake3() {
        let plain = TemplateHash::from_hash(*blake3::hash(b"data").as_bytes());
        assert_ne!(hash_parts(&[b"data"]), plain);
    }
}
