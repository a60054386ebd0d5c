use crate::error::StoreResult;
use crate::template::Template;

/// Durable storage for the template directory.
///
/// All implementations must satisfy these invariants:
/// - `load_all` returns exactly the templates last passed to `save_all`,
///   or an empty list if nothing was ever saved.
/// - `save_all` replaces the whole directory; it is all-or-nothing.
/// - The store never interprets template contents or reference counts.
/// - All I/O errors are propagated, never silently ignored.
pub trait TemplateStore: Send + Sync {
    /// Load every persisted template.
    fn load_all(&self) -> StoreResult<Vec<Template>>;

    /// Replace the persisted directory with `templates`.
    fn save_all(&self, templates: &[Template]) -> StoreResult<()>;
}
