// errors.rs: Archive error type shared by the codec and the game archiver

use std::io;

use thiserror::Error;

/// Result alias used throughout the save/load code.
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Everything that can go wrong while writing or reading a save archive.
///
/// Only [`ArchiveError::VersionMismatch`] is recoverable: it is raised before
/// any live state has been touched. Every other variant raised during a load
/// leaves the level partially rebuilt.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("savegame version mismatch: found {0:?}")]
    VersionMismatch(String),

    #[error("corrupt save game: segment [{expected}] failed alignment check (found {found})")]
    BadSegment { expected: i32, found: i32 },

    #[error("corrupt save game: read of {wanted} bytes at offset {offset} runs past end of image")]
    Truncated { offset: usize, wanted: usize },

    #[error("unknown thinker class {0} in savegame")]
    UnknownThinkerClass(u8),

    #[error("bad mobj count: numbered {expected}, wrote {written}")]
    MobjCountMismatch { expected: usize, written: usize },

    #[error("exceeded {0} player-targeting references")]
    TooManyTargetPlayers(usize),

    #[error("bad mobj reference {value} ({count} mobjs in archive)")]
    BadMobjRef { value: i32, count: usize },

    #[error("bad polyobj count: archive has {found}, level has {expected}")]
    BadPolyobjCount { expected: usize, found: i32 },

    #[error("polyobj index {index} out of range ({count} polyobjs)")]
    BadPolyobjIndex { index: i32, count: usize },

    #[error("invalid polyobj tag at {index}: archive has {found}, level has {expected}")]
    BadPolyobjTag { index: usize, expected: i32, found: i32 },

    #[error("sector index {index} out of range ({count} sectors)")]
    BadSectorIndex { index: i32, count: usize },

    #[error("line index {index} out of range ({count} lines)")]
    BadLineIndex { index: i32, count: usize },

    #[error("side index {index} out of range ({count} sides)")]
    BadSideIndex { index: i32, count: usize },

    #[error("player index {0} out of range")]
    BadPlayerIndex(i32),

    #[error("script instruction pointer {ip} lies outside action code starting at {base}")]
    BadScriptIp { ip: i64, base: usize },

    #[error("thinker payload for class {class} is {actual} bytes, registry expects {expected}")]
    BadThinkerSize { class: u8, expected: usize, actual: usize },
}

impl ArchiveError {
    /// True when the error was detected before any state was mutated.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ArchiveError::VersionMismatch(_))
    }
}
