// files.rs: Save slot files on disk
//
// A slot is a set of files in the save directory: one global file
// `hex<slot>.hxs` plus one file per visited map, `hex<slot><map>.hxs`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;

use crate::qcommon::{DEFAULT_SAVEPATH, MAX_MAPS};

/// Environment variable overriding the save directory.
pub const SAVEPATH_ENV: &str = "HEXSAVE_PATH";

/// Directory holding every save slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveDir {
    root: PathBuf,
}

impl Default for SaveDir {
    fn default() -> Self {
        Self::new(DEFAULT_SAVEPATH)
    }
}

impl SaveDir {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// Use `$HEXSAVE_PATH` when set, the default directory otherwise.
    pub fn from_env() -> Self {
        match std::env::var_os(SAVEPATH_ENV) {
            Some(path) if !path.is_empty() => Self::new(path),
            _ => Self::default(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Make sure the save directory exists.
    pub fn create_path(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root)
    }

    /// `hex<slot>.hxs`
    pub fn global_file(&self, slot: i32) -> PathBuf {
        self.root.join(format!("hex{}.hxs", slot))
    }

    /// `hex<slot><map:02>.hxs`
    pub fn map_file(&self, slot: i32, map: i32) -> PathBuf {
        self.root.join(format!("hex{}{:02}.hxs", slot, map))
    }

    pub fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    /// Delete every file belonging to `slot`. Missing files are fine.
    pub fn clear_slot(&self, slot: i32) -> io::Result<()> {
        debug!("clearing save slot {}", slot);
        for map in 0..MAX_MAPS {
            remove_if_present(&self.map_file(slot, map))?;
        }
        remove_if_present(&self.global_file(slot))
    }

    /// Copy every existing file of `source` over to `dest`.
    pub fn copy_slot(&self, source: i32, dest: i32) -> io::Result<()> {
        debug!("copying save slot {} -> {}", source, dest);
        for map in 0..MAX_MAPS {
            let src = self.map_file(source, map);
            if self.exists(&src) {
                fs::copy(&src, self.map_file(dest, map))?;
            }
        }
        let src = self.global_file(source);
        if self.exists(&src) {
            fs::copy(&src, self.global_file(dest))?;
        }
        Ok(())
    }
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
