// sv_thinkers.rs: Archiving of non-mobj thinkers
//
// Each thinker is written as its class tag byte followed by a fixed-size
// payload. The registry below gives the payload size of every class and
// the optional hooks that turn live links into archive values (mangle)
// and back (restore). The segment ends with a `ThinkClass::Null` byte.

use std::borrow::Cow;
use std::io::Write;
use std::mem::size_of;

use log::debug;

use hexsave_common::stream::{SaveBuffer, StreamOut};
use hexsave_common::{ArchiveError, ArchiveResult};

use crate::p_local::Level;
use crate::p_spec::*;
use crate::sv_archive::{assert_segment, write_segment, ArchiveSegment};
use crate::sv_refs::{ArchiveNums, MobjList, PatchSlot, TargetPlayerList};

/// State available to mangle hooks while saving.
pub struct MangleCtx<'a> {
    pub level: &'a Level,
    pub nums: &'a ArchiveNums,
}

/// State available to restore hooks while loading. The thinker being
/// restored will be added at index `level.thinkers.len()`.
pub struct RestoreCtx<'a> {
    pub level: &'a mut Level,
    pub mobjs: &'a MobjList,
    pub pending: &'a mut TargetPlayerList,
}

impl RestoreCtx<'_> {
    fn next_index(&self) -> usize {
        self.level.thinkers.len()
    }
}

pub type MangleFn = fn(&Thinker, &MangleCtx<'_>) -> ArchiveResult<Vec<u8>>;
pub type RestoreFn = fn(ThinkClass, &[u8], &mut RestoreCtx<'_>) -> ArchiveResult<Thinker>;

pub struct ThinkInfo {
    pub class: ThinkClass,
    pub size: usize,
    pub mangle: Option<MangleFn>,
    pub restore: Option<RestoreFn>,
}

/// Registry, most common classes first.
pub static THINKER_INFO: [ThinkInfo; 12] = [
    ThinkInfo {
        class: ThinkClass::MoveFloor,
        size: size_of::<FloorMove>(),
        mangle: None,
        restore: Some(restore_ss_thinker),
    },
    ThinkInfo {
        class: ThinkClass::PlatRaise,
        size: size_of::<Plat>(),
        mangle: None,
        restore: Some(restore_plat_raise),
    },
    ThinkInfo {
        class: ThinkClass::MoveCeiling,
        size: size_of::<Ceiling>(),
        mangle: None,
        restore: Some(restore_move_ceiling),
    },
    ThinkInfo {
        class: ThinkClass::Light,
        size: size_of::<Light>(),
        mangle: None,
        restore: Some(restore_ss_thinker_no_sd),
    },
    ThinkInfo {
        class: ThinkClass::VerticalDoor,
        size: size_of::<VlDoor>(),
        mangle: None,
        restore: Some(restore_ss_thinker),
    },
    ThinkInfo {
        class: ThinkClass::Phase,
        size: size_of::<Phase>(),
        mangle: None,
        restore: Some(restore_ss_thinker_no_sd),
    },
    ThinkInfo {
        class: ThinkClass::InterpretAcs,
        size: size_of::<AcsImage>(),
        mangle: Some(mangle_script),
        restore: Some(restore_script),
    },
    ThinkInfo {
        class: ThinkClass::RotatePoly,
        size: size_of::<PolyEvent>(),
        mangle: None,
        restore: None,
    },
    ThinkInfo {
        class: ThinkClass::BuildPillar,
        size: size_of::<Pillar>(),
        mangle: None,
        restore: Some(restore_ss_thinker),
    },
    ThinkInfo {
        class: ThinkClass::MovePoly,
        size: size_of::<PolyEvent>(),
        mangle: None,
        restore: None,
    },
    ThinkInfo {
        class: ThinkClass::PolyDoor,
        size: size_of::<PolyDoor>(),
        mangle: None,
        restore: None,
    },
    ThinkInfo {
        class: ThinkClass::FloorWaggle,
        size: size_of::<FloorWaggle>(),
        mangle: None,
        restore: Some(restore_ss_thinker),
    },
];

pub fn think_info(class: ThinkClass) -> Option<&'static ThinkInfo> {
    THINKER_INFO.iter().find(|info| info.class == class)
}

// ============================================================
// Hooks
// ============================================================

fn raw_thinker(class: ThinkClass, bytes: &[u8]) -> ArchiveResult<Thinker> {
    Thinker::from_raw(class, bytes).ok_or(ArchiveError::UnknownThinkerClass(class as u8))
}

fn sector_index(level: &Level, sector: i32) -> ArchiveResult<usize> {
    usize::try_from(sector)
        .ok()
        .filter(|&i| i < level.sectors.len())
        .ok_or(ArchiveError::BadSectorIndex { index: sector, count: level.sectors.len() })
}

/// Validate the sector link and reclaim the sector's special data slot.
fn restore_ss_thinker(class: ThinkClass, bytes: &[u8], ctx: &mut RestoreCtx<'_>) -> ArchiveResult<Thinker> {
    let th = raw_thinker(class, bytes)?;
    let sec = sector_index(ctx.level, th.sector().unwrap_or(-1))?;
    ctx.level.sectors[sec].special_data = Some(class);
    Ok(th)
}

fn restore_ss_thinker_no_sd(class: ThinkClass, bytes: &[u8], ctx: &mut RestoreCtx<'_>) -> ArchiveResult<Thinker> {
    let th = raw_thinker(class, bytes)?;
    sector_index(ctx.level, th.sector().unwrap_or(-1))?;
    Ok(th)
}

fn restore_plat_raise(class: ThinkClass, bytes: &[u8], ctx: &mut RestoreCtx<'_>) -> ArchiveResult<Thinker> {
    let th = restore_ss_thinker(class, bytes, ctx)?;
    let index = ctx.next_index();
    ctx.level.active_plats.push(index);
    Ok(th)
}

fn restore_move_ceiling(class: ThinkClass, bytes: &[u8], ctx: &mut RestoreCtx<'_>) -> ArchiveResult<Thinker> {
    let th = restore_ss_thinker(class, bytes, ctx)?;
    let index = ctx.next_index();
    ctx.level.active_ceilings.push(index);
    Ok(th)
}

fn mangle_script(th: &Thinker, ctx: &MangleCtx<'_>) -> ArchiveResult<Vec<u8>> {
    let Thinker::InterpretAcs(acs) = th else {
        return Err(ArchiveError::UnknownThinkerClass(th.class() as u8));
    };
    let base = ctx.level.acs.code_base;
    let ip = acs
        .ip
        .checked_sub(base)
        .and_then(|off| i32::try_from(off).ok())
        .ok_or(ArchiveError::BadScriptIp { ip: acs.ip as i64, base })?;
    let image = AcsImage {
        activator: ctx.nums.encode(ctx.level, acs.activator).to_wire(),
        line: acs.line.map_or(-1, |l| l as i32),
        side: acs.side,
        number: acs.number,
        info_index: acs.info_index,
        delay_count: acs.delay_count,
        stack: acs.stack,
        stack_ptr: acs.stack_ptr,
        vars: acs.vars,
        ip,
    };
    Ok(bytemuck::bytes_of(&image).to_vec())
}

fn restore_script(_class: ThinkClass, bytes: &[u8], ctx: &mut RestoreCtx<'_>) -> ArchiveResult<Thinker> {
    let image: AcsImage = bytemuck::pod_read_unaligned(bytes);
    let base = ctx.level.acs.code_base;
    let offset = usize::try_from(image.ip).map_err(|_| ArchiveError::BadScriptIp { ip: image.ip as i64, base })?;
    let line = match image.line {
        -1 => None,
        l => Some(
            usize::try_from(l)
                .ok()
                .filter(|&i| i < ctx.level.lines.len())
                .ok_or(ArchiveError::BadLineIndex { index: l, count: ctx.level.lines.len() })?,
        ),
    };
    let slot = PatchSlot::Activator(ctx.next_index());
    let activator = ctx.mobjs.resolve(image.activator, slot, ctx.pending)?;
    Ok(Thinker::InterpretAcs(Acs {
        activator,
        line,
        side: image.side,
        number: image.number,
        info_index: image.info_index,
        delay_count: image.delay_count,
        stack: image.stack,
        stack_ptr: image.stack_ptr,
        vars: image.vars,
        ip: base + offset,
    }))
}

// ============================================================
// Segment
// ============================================================

pub fn archive_thinkers<W: Write>(out: &mut StreamOut<W>, level: &Level, nums: &ArchiveNums) -> ArchiveResult<()> {
    write_segment(out, ArchiveSegment::Thinkers)?;
    let ctx = MangleCtx { level, nums };
    for th in &level.thinkers {
        let class = th.class();
        let info = think_info(class).ok_or(ArchiveError::UnknownThinkerClass(class as u8))?;
        let bytes: Cow<[u8]> = match info.mangle {
            Some(mangle) => Cow::Owned(mangle(th, &ctx)?),
            None => Cow::Borrowed(th.raw_bytes().ok_or(ArchiveError::UnknownThinkerClass(class as u8))?),
        };
        if bytes.len() != info.size {
            return Err(ArchiveError::BadThinkerSize { class: class as u8, expected: info.size, actual: bytes.len() });
        }
        out.write_byte(class as u8)?;
        out.write_words(&bytes)?;
    }
    out.write_byte(ThinkClass::Null as u8)?;
    debug!("archived {} thinkers", level.thinkers.len());
    Ok(())
}

/// Read thinkers until the null tag, appending them to the level.
/// Returns how many were restored.
pub fn unarchive_thinkers(buf: &mut SaveBuffer, ctx: &mut RestoreCtx<'_>) -> ArchiveResult<usize> {
    assert_segment(buf, ArchiveSegment::Thinkers)?;
    let mut count = 0;
    loop {
        let tag = buf.get_byte()?;
        if tag == ThinkClass::Null as u8 {
            break;
        }
        let info = ThinkClass::from_u8(tag)
            .and_then(think_info)
            .ok_or(ArchiveError::UnknownThinkerClass(tag))?;
        let bytes = buf.get_words(info.size)?;
        let th = match info.restore {
            Some(restore) => restore(info.class, &bytes, ctx)?,
            None => raw_thinker(info.class, &bytes)?,
        };
        ctx.level.add_thinker(th);
        count += 1;
    }
    debug!("restored {} thinkers", count);
    Ok(count)
}
