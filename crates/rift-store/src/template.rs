use serde::{Deserialize, Serialize};

use rift_types::{HashContext, ItemVariant, TemplateHash, Timestamp};

use crate::error::{StoreError, StoreResult};

/// Canonical record for one distinct item variant.
///
/// A template is created the first time any owner stores a previously
/// unseen variant and is shared by every owner holding that variant.
/// `ref_count` is the number of units, across all owners, that reference
/// it. Templates are only removed by an explicit rebuild with cleanup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    /// Content hash of `sample` under `context`.
    pub hash: TemplateHash,
    /// A representative variant, used for display and for re-materializing
    /// stacks on take.
    pub sample: ItemVariant,
    /// Total units referencing this template across all owners.
    pub ref_count: u64,
    /// When the template was first created.
    pub created_at: Timestamp,
    /// Game-data context the sample was hashed under.
    pub context: HashContext,
}

impl Template {
    /// A fresh, unreferenced template.
    pub fn new(
        hash: TemplateHash,
        sample: ItemVariant,
        context: HashContext,
        created_at: Timestamp,
    ) -> Self {
        Self {
            hash,
            sample,
            ref_count: 0,
            created_at,
            context,
        }
    }

    /// Returns `true` if no units reference this template.
    pub fn is_unreferenced(&self) -> bool {
        self.ref_count == 0
    }
}

/// The persisted form of the whole template directory.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateDirectory {
    pub format: u32,
    pub templates: Vec<Template>,
}

impl TemplateDirectory {
    /// Current on-disk format version.
    pub const FORMAT: u32 = 1;

    pub fn new(templates: Vec<Template>) -> Self {
        Self {
            format: Self::FORMAT,
            templates,
        }
    }

    /// Reject directories written by an unknown format.
    pub fn check_format(&self) -> StoreResult<()> {
        if self.format != Self::FORMAT {
            return Err(StoreError::UnsupportedFormat {
                expected: Self::FORMAT,
                found: self.format,
            });
        }
        Ok(())
    }
}
