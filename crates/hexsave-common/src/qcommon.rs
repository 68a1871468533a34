// qcommon.rs: Definitions shared by every part of the save system

/// 16.16 fixed point value.
pub type Fixed = i32;
/// Binary angle, full turn = 2^32.
pub type Angle = u32;

pub const FRACBITS: i32 = 16;
pub const FRACUNIT: Fixed = 1 << FRACBITS;

pub const MAXPLAYERS: usize = 8;

// Archive text fields
pub const HXS_VERSION_TEXT: &str = "HXS Ver 2.37";
pub const HXS_VERSION_TEXT_LENGTH: usize = 16;
pub const HXS_DESCRIPTION_LENGTH: usize = 24;

// Save slots
pub const MAX_MAPS: i32 = 99;
pub const BASE_SLOT: i32 = 6;
pub const REBORN_SLOT: i32 = 7;
pub const REBORN_DESCRIPTION: &str = "TEMP GAME";

pub const DEFAULT_SAVEPATH: &str = "hexndata/";

/// Copy `s` into a fixed-size, NUL-padded text field. Longer input is cut.
pub fn fixed_text<const N: usize>(s: &str) -> [u8; N] {
    let mut buf = [0u8; N];
    let bytes = s.as_bytes();
    let len = bytes.len().min(N);
    buf[..len].copy_from_slice(&bytes[..len]);
    buf
}

/// Read a NUL-terminated string back out of a fixed-size text field.
pub fn text_from_fixed(buf: &[u8]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}
