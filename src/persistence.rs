//! Save and load the hasher blob to/from disk.
//!
//! Only the hasher's planes are persisted; vectors and buckets live in the
//! store, which owns its own durability.

use std::path::Path;

use crate::error::Result;
use crate::index::LshIndex;

impl LshIndex {
    /// Write the hasher blob produced by [`LshIndex::dump_hasher`] to a file.
    pub fn save_hasher(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.dump_hasher())?;
        Ok(())
    }

    /// Load hasher planes from a file written by [`LshIndex::save_hasher`].
    pub fn load_hasher_file(&self, path: &Path) -> Result<()> {
        let bytes = std::fs::read(path)?;
        self.load_hasher(&bytes)
    }
}
