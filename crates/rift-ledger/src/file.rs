use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use rift_store::{decode_framed, encode_framed, write_atomic, RecordMagic, StoreError};
use rift_types::OwnerId;

use crate::entry::{LedgerEntry, PlayerLedger};
use crate::error::{LedgerError, LedgerResult};
use crate::traits::LedgerBackend;

/// Directory (under the data directory) holding one record per owner.
pub const LEDGERS_DIR: &str = "ledgers";

const LEDGER_EXT: &str = "ledger";
const CORRUPT_EXT: &str = "ledger.corrupt";

/// The persisted form of one owner's ledger.
#[derive(Debug, Serialize, Deserialize)]
struct LedgerRecord {
    format: u32,
    owner: OwnerId,
    entries: Vec<LedgerEntry>,
}

impl LedgerRecord {
    const FORMAT: u32 = 1;
}

/// Ledger backend storing `ledgers/<owner-uuid>.ledger` files.
///
/// Each save atomically replaces the owner's record. A record that fails to
/// decode is renamed to `<owner-uuid>.ledger.corrupt` before the error is
/// returned, so a later save cannot silently overwrite it.
#[derive(Debug)]
pub struct FileLedgerBackend {
    dir: PathBuf,
}

impl FileLedgerBackend {
    /// Store ledgers under `<data_dir>/ledgers`.
    pub fn open(data_dir: &Path) -> Self {
        Self {
            dir: data_dir.join(LEDGERS_DIR),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the record for `owner`.
    pub fn record_path(&self, owner: &OwnerId) -> PathBuf {
        self.dir.join(format!("{owner}.{LEDGER_EXT}"))
    }

    fn quarantine(&self, owner: &OwnerId, path: &Path) {
        let aside = self.dir.join(format!("{owner}.{CORRUPT_EXT}"));
        match fs::rename(path, &aside) {
            Ok(()) => warn!(owner = %owner, path = %aside.display(), "ledger record moved aside"),
            Err(e) => warn!(owner = %owner, error = %e, "failed to move damaged ledger aside"),
        }
    }
}

impl LedgerBackend for FileLedgerBackend {
    fn load(&self, owner: &OwnerId) -> LedgerResult<Option<PlayerLedger>> {
        let path = self.record_path(owner);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let record: LedgerRecord = match decode_framed(RecordMagic::LEDGER, &bytes) {
            Ok(record) => record,
            Err(e) => {
                self.quarantine(owner, &path);
                return Err(e.into());
            }
        };
        if record.format != LedgerRecord::FORMAT {
            self.quarantine(owner, &path);
            return Err(StoreError::UnsupportedFormat {
                expected: LedgerRecord::FORMAT,
                found: record.format,
            }
            .into());
        }
        if record.owner != *owner {
            self.quarantine(owner, &path);
            return Err(LedgerError::OwnerMismatch {
                expected: *owner,
                found: record.owner,
            });
        }

        debug!(owner = %owner, entries = record.entries.len(), "ledger loaded");
        Ok(Some(PlayerLedger::from_entries(record.owner, record.entries)))
    }

    fn save(&self, ledger: &PlayerLedger) -> LedgerResult<()> {
        let record = LedgerRecord {
            format: LedgerRecord::FORMAT,
            owner: ledger.owner(),
            entries: ledger.entries().values().cloned().collect(),
        };
        let bytes = encode_framed(RecordMagic::LEDGER, &record)?;
        write_atomic(&self.record_path(&ledger.owner()), &bytes)?;
        Ok(())
    }

    fn owners(&self) -> LedgerResult<BTreeSet<OwnerId>> {
        let read = match fs::read_dir(&self.dir) {
            Ok(read) => read,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
            Err(e) => return Err(e.into()),
        };

        let mut owners = BTreeSet::new();
        for dirent in read {
            let path = dirent?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(LEDGER_EXT) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match stem.parse::<OwnerId>() {
                Ok(owner) => {
                    owners.insert(owner);
                }
                Err(_) => debug!(path = %path.display(), "skipping stray ledger file"),
            }
        }
        Ok(owners)
    }
}
