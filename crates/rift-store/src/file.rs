use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::codec::{decode_framed, encode_framed, write_atomic, RecordMagic};
use crate::error::StoreResult;
use crate::template::{Template, TemplateDirectory};
use crate::traits::TemplateStore;

/// File name of the template directory inside a data directory.
pub const TEMPLATES_FILE: &str = "templates.db";

/// Template store backed by a single framed record file.
///
/// The whole directory is rewritten on every save through an atomic
/// replace. A missing file loads as an empty directory.
#[derive(Debug)]
pub struct FileTemplateStore {
    path: PathBuf,
}

impl FileTemplateStore {
    /// Store the directory at `<data_dir>/templates.db`.
    pub fn open(data_dir: &Path) -> Self {
        Self::at_path(data_dir.join(TEMPLATES_FILE))
    }

    /// Store the directory at an explicit file path.
    pub fn at_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TemplateStore for FileTemplateStore {
    fn load_all(&self) -> StoreResult<Vec<Template>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no template directory yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let directory: TemplateDirectory = decode_framed(RecordMagic::TEMPLATES, &bytes)?;
        directory.check_format()?;
        info!(
            path = %self.path.display(),
            templates = directory.templates.len(),
            "template directory loaded"
        );
        Ok(directory.templates)
    }

    fn save_all(&self, templates: &[Template]) -> StoreResult<()> {
        let directory = TemplateDirectory::new(templates.to_vec());
        let bytes = encode_framed(RecordMagic::TEMPLATES, &directory)?;
        write_atomic(&self.path, &bytes)
    }
}
