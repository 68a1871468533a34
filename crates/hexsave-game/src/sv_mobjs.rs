// sv_mobjs.rs: Mobj records
//
// Every archived mobj is written as one fixed-layout record. Links that
// are rebuilt on load (thinker, sector and blockmap chains, info pointer)
// keep a placeholder word so the record layout does not depend on them.

use std::io::{self, Write};

use log::debug;
use rayon::prelude::*;

use hexsave_common::stream::{SaveBuffer, StreamOut};
use hexsave_common::{ArchiveError, ArchiveResult};

use crate::p_local::*;
use crate::sim_import::SimImport;
use crate::sv_archive::{assert_segment, write_segment, ArchiveSegment};
use crate::sv_refs::{ArchiveNums, MobjList, MobjRef, PatchSlot, TargetPlayerList};

/// Below this many records, encoding on the pool costs more than it saves.
const PARALLEL_SAVE_THRESHOLD: usize = 32;

/// Which special slots of a mobj type hold mobj references.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialRefs {
    Neither,
    First,
    Second,
    Both,
}

pub fn special_refs(kind: MobjType) -> SpecialRefs {
    match kind {
        MobjType::BISH_FX
        | MobjType::HOLY_FX
        | MobjType::DRAGON
        | MobjType::THRUSTFLOOR_UP
        | MobjType::THRUSTFLOOR_DOWN
        | MobjType::MINOTAUR
        | MobjType::SORCFX1
        | MobjType::MSTAFF_FX2 => SpecialRefs::First,
        MobjType::LIGHTNING_FLOOR | MobjType::LIGHTNING_ZAP => SpecialRefs::Second,
        MobjType::HOLY_TAIL | MobjType::LIGHTNING_CEILING => SpecialRefs::Both,
        _ => SpecialRefs::Neither,
    }
}

// ============================================================
// Save
// ============================================================

fn encode_ref(mobj: &Mobj, level: &Level, nums: &ArchiveNums, link: Option<MobjId>) -> i32 {
    if mobj.is_corpse() {
        MobjRef::Null.to_wire()
    } else {
        nums.encode(level, link).to_wire()
    }
}

fn stream_out_mobj_specials<W: Write>(
    out: &mut StreamOut<W>,
    mobj: &Mobj,
    level: &Level,
    nums: &ArchiveNums,
) -> io::Result<()> {
    let mut special1 = mobj.special1.as_int();
    let mut special2 = mobj.special2.as_int();

    match special_refs(mobj.kind) {
        SpecialRefs::First => special1 = encode_ref(mobj, level, nums, mobj.special1.as_mobj()),
        SpecialRefs::Second => special2 = encode_ref(mobj, level, nums, mobj.special2.as_mobj()),
        SpecialRefs::Both => {
            special1 = encode_ref(mobj, level, nums, mobj.special1.as_mobj());
            special2 = encode_ref(mobj, level, nums, mobj.special2.as_mobj());
        }
        SpecialRefs::Neither => {
            // Search index, rebuilt when Korax next thinks.
            if mobj.kind == MobjType::KORAX {
                special1 = 0;
            }
        }
    }

    out.write_long(special1)?;
    out.write_long(special2)
}

fn stream_out_mobj<W: Write>(out: &mut StreamOut<W>, mobj: &Mobj, level: &Level, nums: &ArchiveNums) -> io::Result<()> {
    // thinker links and function
    out.write_ptr(None)?;
    out.write_ptr(None)?;
    out.write_ptr(None)?;

    out.write_long(mobj.x)?;
    out.write_long(mobj.y)?;
    out.write_long(mobj.z)?;

    // sector chain
    out.write_ptr(None)?;
    out.write_ptr(None)?;

    out.write_long(mobj.angle as i32)?;
    out.write_long(mobj.sprite)?;
    out.write_long(mobj.frame)?;

    // blockmap chain, subsector
    out.write_ptr(None)?;
    out.write_ptr(None)?;
    out.write_ptr(mobj.sector)?;

    out.write_long(mobj.floorz)?;
    out.write_long(mobj.ceilingz)?;
    out.write_long(mobj.floorpic)?;
    out.write_long(mobj.radius)?;
    out.write_long(mobj.height)?;
    out.write_long(mobj.momx)?;
    out.write_long(mobj.momy)?;
    out.write_long(mobj.momz)?;
    out.write_long(mobj.validcount)?;
    out.write_long(mobj.kind.0)?;

    // info
    out.write_ptr(Some(mobj.kind.0 as usize))?;

    out.write_long(mobj.tics)?;
    out.write_long(mobj.state)?;
    out.write_long(mobj.damage)?;
    out.write_long(mobj.flags.bits())?;
    out.write_long(mobj.flags2)?;

    stream_out_mobj_specials(out, mobj, level, nums)?;

    out.write_long(mobj.health)?;
    out.write_long(mobj.movedir)?;
    out.write_long(mobj.movecount)?;
    out.write_long(encode_ref(mobj, level, nums, mobj.target))?;
    out.write_long(mobj.reactiontime)?;
    out.write_long(mobj.threshold)?;
    out.write_long(mobj.player.map_or(0, |p| p as i32 + 1))?;
    out.write_long(mobj.lastlook)?;
    out.write_long(mobj.floorclip)?;
    out.write_long(mobj.archive_num)?;
    out.write_word(mobj.tid)?;
    out.write_byte(mobj.special)?;
    out.write_buffer(&mobj.args)
}

fn serialize_mobj_to_buffer(mobj: &Mobj, level: &Level, nums: &ArchiveNums) -> io::Result<Vec<u8>> {
    let mut buf = StreamOut::memory();
    stream_out_mobj(&mut buf, mobj, level, nums)?;
    Ok(buf.into_bytes())
}

/// Write the mobjs segment: the record count, then one record per numbered
/// mobj in live-list order.
pub fn archive_mobjs<W: Write>(out: &mut StreamOut<W>, level: &Level, nums: &ArchiveNums) -> ArchiveResult<()> {
    write_segment(out, ArchiveSegment::Mobjs)?;
    out.write_long(nums.count() as i32)?;

    let archived: Vec<&Mobj> = level.mobjs().map(|(_, m)| m).filter(|m| nums.includes(m)).collect();
    if archived.len() != nums.count() {
        return Err(ArchiveError::MobjCountMismatch { expected: nums.count(), written: archived.len() });
    }

    if archived.len() > PARALLEL_SAVE_THRESHOLD {
        let buffers: Vec<Vec<u8>> = archived
            .par_iter()
            .map(|m| serialize_mobj_to_buffer(m, level, nums))
            .collect::<io::Result<_>>()?;
        for buffer in &buffers {
            out.write_buffer(buffer)?;
        }
    } else {
        for m in &archived {
            stream_out_mobj(out, m, level, nums)?;
        }
    }

    debug!("archived {} mobjs", archived.len());
    Ok(())
}

// ============================================================
// Load
// ============================================================

fn stream_in_mobj_specials(
    buf: &mut SaveBuffer,
    mobj: &mut Mobj,
    id: MobjId,
    mobjs: &MobjList,
    pending: &mut TargetPlayerList,
) -> ArchiveResult<()> {
    let special1 = buf.get_long()?;
    let special2 = buf.get_long()?;

    mobj.special1 = SpecialVal::Int(special1);
    mobj.special2 = SpecialVal::Int(special2);

    let refs = special_refs(mobj.kind);
    if matches!(refs, SpecialRefs::First | SpecialRefs::Both) {
        mobj.special1 = SpecialVal::Mobj(mobjs.resolve(special1, PatchSlot::Special1(id), pending)?);
    }
    if matches!(refs, SpecialRefs::Second | SpecialRefs::Both) {
        mobj.special2 = SpecialVal::Mobj(mobjs.resolve(special2, PatchSlot::Special2(id), pending)?);
    }
    Ok(())
}

fn stream_in_mobj(
    buf: &mut SaveBuffer,
    id: MobjId,
    mobjs: &MobjList,
    pending: &mut TargetPlayerList,
) -> ArchiveResult<Mobj> {
    let mut mobj = Mobj::default();

    buf.skip_ptr()?;
    buf.skip_ptr()?;
    buf.skip_ptr()?;

    mobj.x = buf.get_long()?;
    mobj.y = buf.get_long()?;
    mobj.z = buf.get_long()?;

    buf.skip_ptr()?;
    buf.skip_ptr()?;

    mobj.angle = buf.get_long()? as Angle;
    mobj.sprite = buf.get_long()?;
    mobj.frame = buf.get_long()?;

    // Relinked once the position is set.
    buf.skip_ptr()?;
    buf.skip_ptr()?;
    buf.skip_ptr()?;

    mobj.floorz = buf.get_long()?;
    mobj.ceilingz = buf.get_long()?;
    mobj.floorpic = buf.get_long()?;
    mobj.radius = buf.get_long()?;
    mobj.height = buf.get_long()?;
    mobj.momx = buf.get_long()?;
    mobj.momy = buf.get_long()?;
    mobj.momz = buf.get_long()?;
    mobj.validcount = buf.get_long()?;
    mobj.kind = MobjType(buf.get_long()?);

    buf.skip_ptr()?;

    mobj.tics = buf.get_long()?;
    mobj.state = buf.get_long()?;
    mobj.damage = buf.get_long()?;
    mobj.flags = MobjFlags::from_bits_retain(buf.get_long()?);
    mobj.flags2 = buf.get_long()?;

    stream_in_mobj_specials(buf, &mut mobj, id, mobjs, pending)?;

    mobj.health = buf.get_long()?;
    mobj.movedir = buf.get_long()?;
    mobj.movecount = buf.get_long()?;
    let target = buf.get_long()?;
    mobj.target = mobjs.resolve(target, PatchSlot::Target(id), pending)?;
    mobj.reactiontime = buf.get_long()?;
    mobj.threshold = buf.get_long()?;

    let player = buf.get_long()?;
    mobj.player = match player {
        0 => None,
        n if n > 0 && (n as usize) <= MAXPLAYERS => Some(n as usize - 1),
        n => return Err(ArchiveError::BadPlayerIndex(n)),
    };

    mobj.lastlook = buf.get_long()?;
    mobj.floorclip = buf.get_long()?;
    mobj.archive_num = buf.get_long()?;
    mobj.tid = buf.get_word()?;
    mobj.special = buf.get_byte()?;
    mobj.args.copy_from_slice(buf.get_buffer(5)?);

    Ok(mobj)
}

/// Read the mobjs segment into freshly allocated shells. Player mobjs are
/// linked back into `game.players`; references to player mobjs that were
/// not archived are parked on `pending`.
pub fn unarchive_mobjs(
    buf: &mut SaveBuffer,
    game: &mut Game,
    level: &mut Level,
    sim: &mut dyn SimImport,
    pending: &mut TargetPlayerList,
) -> ArchiveResult<MobjList> {
    assert_segment(buf, ArchiveSegment::Mobjs)?;
    let count = buf.get_long()?;
    let count = usize::try_from(count).map_err(|_| ArchiveError::BadMobjRef { value: count, count: 0 })?;
    if count > buf.remaining() {
        return Err(ArchiveError::Truncated { offset: buf.position(), wanted: count });
    }
    let mobjs = MobjList::allocate(level, count);

    for &id in mobjs.ids() {
        let mut mobj = stream_in_mobj(buf, id, &mobjs, pending)?;

        let sector = sim.point_in_sector(level, mobj.x, mobj.y);
        let sec = level
            .sectors
            .get(sector)
            .ok_or(ArchiveError::BadSectorIndex { index: sector as i32, count: level.sectors.len() })?;
        mobj.sector = Some(sector);
        mobj.floorz = sec.floorheight;
        mobj.ceilingz = sec.ceilingheight;

        if let Some(p) = mobj.player {
            game.players[p].mo = Some(id);
        }
        if let Some(slot) = level.mobj_mut(id) {
            *slot = mobj;
        }
    }

    sim.create_tid_list(level);
    sim.init_corpse_queue(level);
    debug!("restored {} mobjs", count);
    Ok(mobjs)
}
