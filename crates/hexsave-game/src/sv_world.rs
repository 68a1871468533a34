// sv_world.rs: Map geometry, polyobjects, scripts, sound sequences
//
// Geometry changes are written over the freshly loaded base level, so only
// the mutable fields go out and the level's own tables give the counts.

use std::io::Write;

use log::{debug, warn};

use hexsave_common::stream::{SaveBuffer, StreamOut};
use hexsave_common::{ArchiveError, ArchiveResult};

use crate::p_local::*;
use crate::sim_import::SimImport;
use crate::sv_archive::{assert_segment, write_segment, ArchiveSegment};

// ============================================================
// World
// ============================================================

pub fn archive_world<W: Write>(out: &mut StreamOut<W>, level: &Level) -> ArchiveResult<()> {
    write_segment(out, ArchiveSegment::World)?;
    for sec in &level.sectors {
        out.write_word((sec.floorheight >> FRACBITS) as i16)?;
        out.write_word((sec.ceilingheight >> FRACBITS) as i16)?;
        out.write_word(sec.floorpic)?;
        out.write_word(sec.ceilingpic)?;
        out.write_word(sec.lightlevel)?;
        out.write_word(sec.special)?;
        out.write_word(sec.tag)?;
        out.write_word(sec.seq_type)?;
    }
    for li in &level.lines {
        out.write_word(li.flags)?;
        out.write_byte(li.special)?;
        out.write_buffer(&li.args)?;
        for &sidenum in &li.sidenum {
            if sidenum == -1 {
                continue;
            }
            let si = usize::try_from(sidenum)
                .ok()
                .and_then(|i| level.sides.get(i))
                .ok_or(ArchiveError::BadSideIndex { index: sidenum, count: level.sides.len() })?;
            out.write_word((si.textureoffset >> FRACBITS) as i16)?;
            out.write_word((si.rowoffset >> FRACBITS) as i16)?;
            out.write_word(si.toptexture)?;
            out.write_word(si.bottomtexture)?;
            out.write_word(si.midtexture)?;
        }
    }
    Ok(())
}

pub fn unarchive_world(buf: &mut SaveBuffer, level: &mut Level) -> ArchiveResult<()> {
    assert_segment(buf, ArchiveSegment::World)?;
    for sec in level.sectors.iter_mut() {
        sec.floorheight = (buf.get_word()? as Fixed) << FRACBITS;
        sec.ceilingheight = (buf.get_word()? as Fixed) << FRACBITS;
        sec.floorpic = buf.get_word()?;
        sec.ceilingpic = buf.get_word()?;
        sec.lightlevel = buf.get_word()?;
        sec.special = buf.get_word()?;
        sec.tag = buf.get_word()?;
        sec.seq_type = buf.get_word()?;
        sec.special_data = None;
        sec.sound_target = None;
    }
    let Level { lines, sides, .. } = level;
    for li in lines.iter_mut() {
        li.flags = buf.get_word()?;
        li.special = buf.get_byte()?;
        li.args.copy_from_slice(buf.get_buffer(5)?);
        for &sidenum in &li.sidenum {
            if sidenum == -1 {
                continue;
            }
            let count = sides.len();
            let si = usize::try_from(sidenum)
                .ok()
                .and_then(|i| sides.get_mut(i))
                .ok_or(ArchiveError::BadSideIndex { index: sidenum, count })?;
            si.textureoffset = (buf.get_word()? as Fixed) << FRACBITS;
            si.rowoffset = (buf.get_word()? as Fixed) << FRACBITS;
            si.toptexture = buf.get_word()?;
            si.bottomtexture = buf.get_word()?;
            si.midtexture = buf.get_word()?;
        }
    }
    Ok(())
}

// ============================================================
// Polyobjects
// ============================================================

pub fn archive_polyobjs<W: Write>(out: &mut StreamOut<W>, level: &Level) -> ArchiveResult<()> {
    write_segment(out, ArchiveSegment::Polyobjs)?;
    out.write_long(level.polyobjs.len() as i32)?;
    for po in &level.polyobjs {
        out.write_long(po.tag)?;
        out.write_long(po.angle as i32)?;
        out.write_long(po.start_spot.0)?;
        out.write_long(po.start_spot.1)?;
    }
    Ok(())
}

/// Check the archived polyobjects against the base level and drive each
/// one back to its saved angle and position.
pub fn unarchive_polyobjs(buf: &mut SaveBuffer, level: &mut Level, sim: &mut dyn SimImport) -> ArchiveResult<()> {
    assert_segment(buf, ArchiveSegment::Polyobjs)?;
    let count = buf.get_long()?;
    if count != level.polyobjs.len() as i32 {
        return Err(ArchiveError::BadPolyobjCount { expected: level.polyobjs.len(), found: count });
    }
    for i in 0..level.polyobjs.len() {
        let tag = level.polyobjs[i].tag;
        let found = buf.get_long()?;
        if found != tag {
            return Err(ArchiveError::BadPolyobjTag { index: i, expected: tag, found });
        }
        let angle = buf.get_long()? as Angle;
        if !sim.rotate_polyobj(level, tag, angle) {
            warn!("polyobj {} failed to rotate", tag);
        }
        let (x, y) = level.polyobjs[i].start_spot;
        let dx = buf.get_long()?.wrapping_sub(x);
        let dy = buf.get_long()?.wrapping_sub(y);
        if !sim.move_polyobj(level, tag, dx, dy) {
            warn!("polyobj {} failed to move", tag);
        }
    }
    Ok(())
}

// ============================================================
// Scripts
// ============================================================

pub fn archive_scripts<W: Write>(out: &mut StreamOut<W>, level: &Level) -> ArchiveResult<()> {
    write_segment(out, ArchiveSegment::Scripts)?;
    for info in &level.acs.scripts {
        out.write_word(info.state)?;
        out.write_word(info.wait_value)?;
    }
    for &var in &level.acs.map_vars {
        out.write_long(var)?;
    }
    Ok(())
}

pub fn unarchive_scripts(buf: &mut SaveBuffer, level: &mut Level) -> ArchiveResult<()> {
    assert_segment(buf, ArchiveSegment::Scripts)?;
    for info in level.acs.scripts.iter_mut() {
        info.state = buf.get_word()?;
        info.wait_value = buf.get_word()?;
    }
    for var in level.acs.map_vars.iter_mut() {
        *var = buf.get_long()?;
    }
    Ok(())
}

/// World variables and the cross-map script store, global file only.
pub fn archive_global_scripts<W: Write>(out: &mut StreamOut<W>, game: &Game) -> ArchiveResult<()> {
    for &var in &game.world_vars {
        out.write_long(var)?;
    }
    for store in &game.acs_store {
        out.write_long(store.map)?;
        out.write_long(store.script)?;
        out.write_buffer(&store.args)?;
    }
    Ok(())
}

pub fn unarchive_global_scripts(buf: &mut SaveBuffer, game: &mut Game) -> ArchiveResult<()> {
    for var in game.world_vars.iter_mut() {
        *var = buf.get_long()?;
    }
    for store in game.acs_store.iter_mut() {
        store.map = buf.get_long()?;
        store.script = buf.get_long()?;
        store.args.copy_from_slice(buf.get_buffer(ACS_STORE_ARGS)?);
    }
    Ok(())
}

// ============================================================
// Sound sequences
// ============================================================

const SOUND_ORIGIN_SECTOR: i32 = 0;
const SOUND_ORIGIN_POLYOBJ: i32 = 1;

/// Archive form of a sequence origin: (kind, sector or polyobject index).
fn encode_origin(level: &Level, sim: &dyn SimImport, origin: SoundOrigin) -> Option<(i32, i32)> {
    let (x, y) = match origin {
        SoundOrigin::Polyobj(tag) => {
            let index = level.polyobjs.iter().position(|po| po.tag == tag)?;
            return Some((SOUND_ORIGIN_POLYOBJ, index as i32));
        }
        SoundOrigin::Sector(n) => level.sectors.get(n)?.sound_org,
        SoundOrigin::Point { x, y } => (x, y),
    };
    Some((SOUND_ORIGIN_SECTOR, sim.point_in_sector(level, x, y) as i32))
}

pub fn archive_sounds<W: Write>(out: &mut StreamOut<W>, level: &Level, sim: &dyn SimImport) -> ArchiveResult<()> {
    write_segment(out, ArchiveSegment::Sounds)?;

    let mut nodes = Vec::new();
    for node in sim.active_sequences() {
        match encode_origin(level, sim, node.origin) {
            Some(origin) => nodes.push((node, origin)),
            None => warn!("sound sequence {} has no origin in this level, not saved", node.sequence),
        }
    }

    out.write_long(nodes.len() as i32)?;
    for (node, (kind, index)) in &nodes {
        out.write_long(node.sequence)?;
        out.write_long(node.delay_tics)?;
        out.write_long(node.volume)?;
        out.write_long(node.offset)?;
        out.write_long(node.current_sound_id)?;
        out.write_long(*kind)?;
        out.write_long(*index)?;
    }
    debug!("archived {} sound sequences", nodes.len());
    Ok(())
}

/// Restart every archived sequence from its sector or polyobject.
pub fn unarchive_sounds(buf: &mut SaveBuffer, level: &Level, sim: &mut dyn SimImport) -> ArchiveResult<()> {
    assert_segment(buf, ArchiveSegment::Sounds)?;
    let count = buf.get_long()?.max(0) as usize;
    for i in 0..count {
        let sequence = buf.get_long()?;
        let delay_tics = buf.get_long()?;
        let volume = buf.get_long()?;
        let offset = buf.get_long()?;
        let sound_id = buf.get_long()?;
        let kind = buf.get_long()?;
        let index = buf.get_long()?;

        let origin = if kind == SOUND_ORIGIN_SECTOR {
            usize::try_from(index)
                .ok()
                .filter(|&n| n < level.sectors.len())
                .map(SoundOrigin::Sector)
                .ok_or(ArchiveError::BadSectorIndex { index, count: level.sectors.len() })?
        } else {
            usize::try_from(index)
                .ok()
                .and_then(|n| level.polyobjs.get(n))
                .map(|po| SoundOrigin::Polyobj(po.tag))
                .ok_or(ArchiveError::BadPolyobjIndex { index, count: level.polyobjs.len() })?
        };
        sim.start_sequence(level, origin, sequence);
        sim.change_node_data(i, offset, delay_tics, volume, sound_id);
    }
    Ok(())
}

// ============================================================
// Misc
// ============================================================

pub fn archive_misc<W: Write>(out: &mut StreamOut<W>, level: &Level) -> ArchiveResult<()> {
    write_segment(out, ArchiveSegment::Misc)?;
    for &quake in &level.local_quake_happening {
        out.write_long(quake)?;
    }
    Ok(())
}

pub fn unarchive_misc(buf: &mut SaveBuffer, level: &mut Level) -> ArchiveResult<()> {
    assert_segment(buf, ArchiveSegment::Misc)?;
    for quake in level.local_quake_happening.iter_mut() {
        *quake = buf.get_long()?;
    }
    Ok(())
}
