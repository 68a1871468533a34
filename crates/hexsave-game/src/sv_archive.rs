// sv_archive.rs: Segment markers framing the archive files
//
// Each section of a file is preceded by a 32-bit marker. There are no
// length fields; a marker that is not where the reader expects it means
// the file is corrupt or was written by a different layout.

use std::io::Write;

use log::trace;

use hexsave_common::stream::{SaveBuffer, StreamOut};
use hexsave_common::{ArchiveError, ArchiveResult};

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveSegment {
    GameHeader = 101,
    MapHeader = 102,
    World = 103,
    Polyobjs = 104,
    Mobjs = 105,
    Thinkers = 106,
    Scripts = 107,
    Players = 108,
    Sounds = 109,
    Misc = 110,
    End = 111,
}

impl ArchiveSegment {
    pub fn marker(self) -> i32 {
        self as i32
    }
}

pub fn write_segment<W: Write>(out: &mut StreamOut<W>, seg: ArchiveSegment) -> ArchiveResult<()> {
    out.write_long(seg.marker())?;
    Ok(())
}

/// Consume the next marker, failing unless it is `seg`.
pub fn assert_segment(buf: &mut SaveBuffer, seg: ArchiveSegment) -> ArchiveResult<()> {
    let found = buf.get_long()?;
    if found != seg.marker() {
        return Err(ArchiveError::BadSegment { expected: seg.marker(), found });
    }
    trace!("segment {:?} at offset {}", seg, buf.position() - 4);
    Ok(())
}
