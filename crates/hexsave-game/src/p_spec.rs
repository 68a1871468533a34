// p_spec.rs: Per-tick behaviors (thinkers) that live outside mobjs
//
// Sector and polyobject movers are fixed-size images of 32-bit words so
// they archive as Pod. Script instances hold live links and archive
// through `AcsImage`.

use bytemuck::{Pod, Zeroable};

use crate::p_local::{Fixed, MobjId};

pub const ACS_STACK_DEPTH: usize = 32;
pub const MAX_ACS_SCRIPT_VARS: usize = 10;

/// Behavior kind. The discriminant is the archive tag byte.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThinkClass {
    Null = 0,
    MoveCeiling = 1,
    VerticalDoor = 2,
    MoveFloor = 3,
    PlatRaise = 4,
    InterpretAcs = 5,
    FloorWaggle = 6,
    Light = 7,
    Phase = 8,
    BuildPillar = 9,
    RotatePoly = 10,
    MovePoly = 11,
    PolyDoor = 12,
}

impl ThinkClass {
    pub fn from_u8(tag: u8) -> Option<ThinkClass> {
        Some(match tag {
            0 => ThinkClass::Null,
            1 => ThinkClass::MoveCeiling,
            2 => ThinkClass::VerticalDoor,
            3 => ThinkClass::MoveFloor,
            4 => ThinkClass::PlatRaise,
            5 => ThinkClass::InterpretAcs,
            6 => ThinkClass::FloorWaggle,
            7 => ThinkClass::Light,
            8 => ThinkClass::Phase,
            9 => ThinkClass::BuildPillar,
            10 => ThinkClass::RotatePoly,
            11 => ThinkClass::MovePoly,
            12 => ThinkClass::PolyDoor,
            _ => return None,
        })
    }
}

// ============================================================
// Sector movers
// ============================================================

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct FloorMove {
    pub sector: i32,
    pub kind: i32,
    pub crush: i32,
    pub direction: i32,
    pub new_special: i32,
    pub texture: i32,
    pub floor_dest_height: Fixed,
    pub speed: Fixed,
    pub delay_count: i32,
    pub delay_total: i32,
    pub stairs_delay_height: Fixed,
    pub stairs_delay_height_delta: Fixed,
    pub reset_height: Fixed,
    pub reset_delay: i32,
    pub reset_delay_count: i32,
    pub texture_change: i32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct Plat {
    pub sector: i32,
    pub speed: Fixed,
    pub low: Fixed,
    pub high: Fixed,
    pub wait: i32,
    pub count: i32,
    pub status: i32,
    pub old_status: i32,
    pub crush: i32,
    pub tag: i32,
    pub kind: i32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct Ceiling {
    pub sector: i32,
    pub kind: i32,
    pub bottom_height: Fixed,
    pub top_height: Fixed,
    pub speed: Fixed,
    pub crush: i32,
    pub direction: i32,
    pub tag: i32,
    pub old_direction: i32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct Light {
    pub sector: i32,
    pub kind: i32,
    pub value1: i32,
    pub value2: i32,
    pub tics1: i32,
    pub tics2: i32,
    pub count: i32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct VlDoor {
    pub sector: i32,
    pub kind: i32,
    pub top_height: Fixed,
    pub speed: Fixed,
    pub direction: i32,
    pub top_wait: i32,
    pub top_countdown: i32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct Phase {
    pub sector: i32,
    pub index: i32,
    pub base: i32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct Pillar {
    pub sector: i32,
    pub ceiling_speed: Fixed,
    pub floor_speed: Fixed,
    pub floor_dest: Fixed,
    pub ceiling_dest: Fixed,
    pub direction: i32,
    pub crush: i32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct FloorWaggle {
    pub sector: i32,
    pub original_height: Fixed,
    pub accumulator: Fixed,
    pub acc_delta: Fixed,
    pub target_scale: Fixed,
    pub scale: Fixed,
    pub scale_delta: Fixed,
    pub ticker: i32,
    pub state: i32,
}

// ============================================================
// Polyobject movers
// ============================================================

/// Rotation or translation of a polyobject.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct PolyEvent {
    pub polyobj: i32,
    pub speed: i32,
    pub dist: u32,
    pub angle: u32,
    pub x_speed: Fixed,
    pub y_speed: Fixed,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct PolyDoor {
    pub polyobj: i32,
    pub speed: i32,
    pub dist: i32,
    pub total_dist: i32,
    pub direction: i32,
    pub x_speed: Fixed,
    pub y_speed: Fixed,
    pub tics: i32,
    pub wait_tics: i32,
    pub kind: i32,
    pub close: i32,
}

// ============================================================
// Scripts
// ============================================================

/// A running script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acs {
    pub activator: Option<MobjId>,
    pub line: Option<usize>,
    pub side: i32,
    pub number: i32,
    pub info_index: i32,
    pub delay_count: i32,
    pub stack: [i32; ACS_STACK_DEPTH],
    pub stack_ptr: i32,
    pub vars: [i32; MAX_ACS_SCRIPT_VARS],
    /// Absolute position in script memory.
    pub ip: usize,
}

impl Default for Acs {
    fn default() -> Self {
        Self {
            activator: None,
            line: None,
            side: 0,
            number: 0,
            info_index: 0,
            delay_count: 0,
            stack: [0; ACS_STACK_DEPTH],
            stack_ptr: 0,
            vars: [0; MAX_ACS_SCRIPT_VARS],
            ip: 0,
        }
    }
}

/// Archive image of [`Acs`]: links replaced by indices, `ip` relative to
/// the start of the map's action code.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct AcsImage {
    pub activator: i32,
    pub line: i32,
    pub side: i32,
    pub number: i32,
    pub info_index: i32,
    pub delay_count: i32,
    pub stack: [i32; ACS_STACK_DEPTH],
    pub stack_ptr: i32,
    pub vars: [i32; MAX_ACS_SCRIPT_VARS],
    pub ip: i32,
}

// ============================================================
// Thinker
// ============================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Thinker {
    MoveCeiling(Ceiling),
    VerticalDoor(VlDoor),
    MoveFloor(FloorMove),
    PlatRaise(Plat),
    InterpretAcs(Acs),
    FloorWaggle(FloorWaggle),
    Light(Light),
    Phase(Phase),
    BuildPillar(Pillar),
    RotatePoly(PolyEvent),
    MovePoly(PolyEvent),
    PolyDoor(PolyDoor),
}

impl Thinker {
    pub fn class(&self) -> ThinkClass {
        match self {
            Thinker::MoveCeiling(_) => ThinkClass::MoveCeiling,
            Thinker::VerticalDoor(_) => ThinkClass::VerticalDoor,
            Thinker::MoveFloor(_) => ThinkClass::MoveFloor,
            Thinker::PlatRaise(_) => ThinkClass::PlatRaise,
            Thinker::InterpretAcs(_) => ThinkClass::InterpretAcs,
            Thinker::FloorWaggle(_) => ThinkClass::FloorWaggle,
            Thinker::Light(_) => ThinkClass::Light,
            Thinker::Phase(_) => ThinkClass::Phase,
            Thinker::BuildPillar(_) => ThinkClass::BuildPillar,
            Thinker::RotatePoly(_) => ThinkClass::RotatePoly,
            Thinker::MovePoly(_) => ThinkClass::MovePoly,
            Thinker::PolyDoor(_) => ThinkClass::PolyDoor,
        }
    }

    /// Sector this behavior drives, if any.
    pub fn sector(&self) -> Option<i32> {
        match self {
            Thinker::MoveCeiling(t) => Some(t.sector),
            Thinker::VerticalDoor(t) => Some(t.sector),
            Thinker::MoveFloor(t) => Some(t.sector),
            Thinker::PlatRaise(t) => Some(t.sector),
            Thinker::FloorWaggle(t) => Some(t.sector),
            Thinker::Light(t) => Some(t.sector),
            Thinker::Phase(t) => Some(t.sector),
            Thinker::BuildPillar(t) => Some(t.sector),
            Thinker::InterpretAcs(_)
            | Thinker::RotatePoly(_)
            | Thinker::MovePoly(_)
            | Thinker::PolyDoor(_) => None,
        }
    }

    /// Payload bytes for variants whose live form is their archive image.
    pub fn raw_bytes(&self) -> Option<&[u8]> {
        Some(match self {
            Thinker::MoveCeiling(t) => bytemuck::bytes_of(t),
            Thinker::VerticalDoor(t) => bytemuck::bytes_of(t),
            Thinker::MoveFloor(t) => bytemuck::bytes_of(t),
            Thinker::PlatRaise(t) => bytemuck::bytes_of(t),
            Thinker::FloorWaggle(t) => bytemuck::bytes_of(t),
            Thinker::Light(t) => bytemuck::bytes_of(t),
            Thinker::Phase(t) => bytemuck::bytes_of(t),
            Thinker::BuildPillar(t) => bytemuck::bytes_of(t),
            Thinker::RotatePoly(t) => bytemuck::bytes_of(t),
            Thinker::MovePoly(t) => bytemuck::bytes_of(t),
            Thinker::PolyDoor(t) => bytemuck::bytes_of(t),
            Thinker::InterpretAcs(_) => return None,
        })
    }

    /// Inverse of [`Thinker::raw_bytes`]. `bytes` must be exactly the
    /// payload size of `class`.
    pub fn from_raw(class: ThinkClass, bytes: &[u8]) -> Option<Thinker> {
        use bytemuck::pod_read_unaligned as rd;
        Some(match class {
            ThinkClass::MoveCeiling => Thinker::MoveCeiling(rd(bytes)),
            ThinkClass::VerticalDoor => Thinker::VerticalDoor(rd(bytes)),
            ThinkClass::MoveFloor => Thinker::MoveFloor(rd(bytes)),
            ThinkClass::PlatRaise => Thinker::PlatRaise(rd(bytes)),
            ThinkClass::FloorWaggle => Thinker::FloorWaggle(rd(bytes)),
            ThinkClass::Light => Thinker::Light(rd(bytes)),
            ThinkClass::Phase => Thinker::Phase(rd(bytes)),
            ThinkClass::BuildPillar => Thinker::BuildPillar(rd(bytes)),
            ThinkClass::RotatePoly => Thinker::RotatePoly(rd(bytes)),
            ThinkClass::MovePoly => Thinker::MovePoly(rd(bytes)),
            ThinkClass::PolyDoor => Thinker::PolyDoor(rd(bytes)),
            ThinkClass::InterpretAcs | ThinkClass::Null => return None,
        })
    }
}
