// sv_save.rs: Save and load sessions
//
// A save slot is a global file (game header, script store, players) plus
// one file per visited map. All work happens in the base slot; saving to
// or loading from another slot copies the whole slot over.

use std::io::Write;

use log::{info, warn};

use hexsave_common::files::SaveDir;
use hexsave_common::stream::{SaveBuffer, StreamOut};
use hexsave_common::{ArchiveError, ArchiveResult};

use crate::p_local::*;
use crate::sim_import::SimImport;
use crate::sv_archive::{assert_segment, write_segment, ArchiveSegment};
use crate::sv_mobjs::{archive_mobjs, unarchive_mobjs};
use crate::sv_players::{archive_players, unarchive_players};
use crate::sv_refs::{ArchiveNums, TargetPlayerList};
use crate::sv_thinkers::{archive_thinkers, unarchive_thinkers, RestoreCtx};
use crate::sv_world::*;

/// Everything a save or load session reads and rebuilds.
pub struct SaveContext<'a> {
    pub game: &'a mut Game,
    pub level: &'a mut Level,
    pub sim: &'a mut dyn SimImport,
    pub dir: &'a SaveDir,
}

// ============================================================
// File images
// ============================================================

/// Write the global file image.
pub fn encode_game<W: Write>(out: &mut StreamOut<W>, game: &Game, description: &str) -> ArchiveResult<()> {
    out.write_buffer(&fixed_text::<HXS_DESCRIPTION_LENGTH>(description))?;
    out.write_buffer(&fixed_text::<HXS_VERSION_TEXT_LENGTH>(HXS_VERSION_TEXT))?;
    write_segment(out, ArchiveSegment::GameHeader)?;
    out.write_byte(game.gamemap as u8)?;
    out.write_byte(game.gameskill as u8)?;
    archive_global_scripts(out, game)?;
    archive_players(out, game)?;
    write_segment(out, ArchiveSegment::End)
}

/// Read a global file image. A version mismatch is reported before
/// anything in `game` changes.
pub fn decode_game(buf: &mut SaveBuffer, game: &mut Game) -> ArchiveResult<()> {
    buf.skip(HXS_DESCRIPTION_LENGTH)?;
    let version = text_from_fixed(buf.get_buffer(HXS_VERSION_TEXT_LENGTH)?);
    if version != HXS_VERSION_TEXT {
        warn!("savegame version {:?} does not match {:?}", version, HXS_VERSION_TEXT);
        return Err(ArchiveError::VersionMismatch(version));
    }

    assert_segment(buf, ArchiveSegment::GameHeader)?;
    game.gameepisode = 1;
    game.gamemap = buf.get_byte()? as i32;
    game.gameskill = buf.get_byte()? as i32;
    unarchive_global_scripts(buf, game)?;
    unarchive_players(buf, game)?;
    assert_segment(buf, ArchiveSegment::End)
}

/// Description stored at the head of a global file.
pub fn read_description(buf: &SaveBuffer) -> ArchiveResult<String> {
    Ok(text_from_fixed(buf.peek_buffer(HXS_DESCRIPTION_LENGTH)?))
}

/// Write the per-map file image. Player mobjs are left out unless
/// `save_players`; references to them are archived as pending.
pub fn encode_map<W: Write>(
    out: &mut StreamOut<W>,
    level: &mut Level,
    sim: &dyn SimImport,
    save_players: bool,
) -> ArchiveResult<()> {
    write_segment(out, ArchiveSegment::MapHeader)?;
    out.write_long(level.leveltime)?;

    let nums = ArchiveNums::assign(level, save_players);

    archive_world(out, level)?;
    archive_polyobjs(out, level)?;
    archive_mobjs(out, level, &nums)?;
    archive_thinkers(out, level, &nums)?;
    archive_scripts(out, level)?;
    archive_sounds(out, level, sim)?;
    archive_misc(out, level)?;

    write_segment(out, ArchiveSegment::End)
}

/// Read a per-map file image over a base level with no mobjs or thinkers.
/// References to player mobjs that were not archived come back unresolved.
pub fn decode_map(
    buf: &mut SaveBuffer,
    game: &mut Game,
    level: &mut Level,
    sim: &mut dyn SimImport,
) -> ArchiveResult<TargetPlayerList> {
    assert_segment(buf, ArchiveSegment::MapHeader)?;
    level.leveltime = buf.get_long()?;

    unarchive_world(buf, level)?;
    unarchive_polyobjs(buf, level, sim)?;

    let mut pending = TargetPlayerList::new();
    let mobjs = unarchive_mobjs(buf, game, level, sim, &mut pending)?;
    let mut ctx = RestoreCtx { level: &mut *level, mobjs: &mobjs, pending: &mut pending };
    unarchive_thinkers(buf, &mut ctx)?;

    unarchive_scripts(buf, level)?;
    unarchive_sounds(buf, level, sim)?;
    unarchive_misc(buf, level)?;

    assert_segment(buf, ArchiveSegment::End)?;
    Ok(pending)
}

// ============================================================
// Sessions
// ============================================================

pub fn save_game(ctx: &mut SaveContext<'_>, slot: i32, description: &str) -> ArchiveResult<()> {
    info!("saving game to slot {} ({:?})", slot, description);
    ctx.dir.create_path()?;

    let mut out = StreamOut::create(ctx.dir.global_file(BASE_SLOT))?;
    encode_game(&mut out, ctx.game, description)?;
    out.finish()?;

    save_map(ctx, true)?;

    if slot != BASE_SLOT {
        ctx.dir.clear_slot(slot)?;
        ctx.dir.copy_slot(BASE_SLOT, slot)?;
    }
    Ok(())
}

/// Write the current map into the base slot.
pub fn save_map(ctx: &mut SaveContext<'_>, save_players: bool) -> ArchiveResult<()> {
    ctx.dir.create_path()?;
    let mut out = StreamOut::create(ctx.dir.map_file(BASE_SLOT, ctx.game.gamemap))?;
    encode_map(&mut out, ctx.level, &*ctx.sim, save_players)?;
    out.finish()?;
    info!("saved map {} (players {})", ctx.game.gamemap, if save_players { "included" } else { "skipped" });
    Ok(())
}

pub fn load_game(ctx: &mut SaveContext<'_>, slot: i32) -> ArchiveResult<()> {
    info!("loading game from slot {}", slot);
    if slot != BASE_SLOT {
        ctx.dir.clear_slot(BASE_SLOT)?;
        ctx.dir.copy_slot(slot, BASE_SLOT)?;
    }

    let mut buf = SaveBuffer::load(ctx.dir.global_file(BASE_SLOT))?;
    decode_game(&mut buf, ctx.game)?;

    let backup = ctx.game.players.clone();

    // Player mobjs are in the file, so nothing is left pending.
    load_map(ctx)?.discard();

    ctx.game.inv_ptr = 0;
    ctx.game.curpos = 0;
    let console = ctx.game.consoleplayer;
    for (i, saved) in backup.into_iter().enumerate() {
        let player = &mut ctx.game.players[i];
        let mo = player.mo;
        *player = saved;
        player.mo = mo;
        if i == console {
            player.ready_artifact = player.inventory[0].kind;
        }
    }
    Ok(())
}

/// Rebuild `game.gamemap` from its base slot file. The returned list holds
/// references to player mobjs that must be resolved once players spawn.
pub fn load_map(ctx: &mut SaveContext<'_>) -> ArchiveResult<TargetPlayerList> {
    ctx.sim.init_new(ctx.game, ctx.level);
    ctx.level.remove_all_thinkers();

    let mut buf = SaveBuffer::load(ctx.dir.map_file(BASE_SLOT, ctx.game.gamemap))?;
    let pending = decode_map(&mut buf, ctx.game, ctx.level, ctx.sim)?;
    info!("loaded map {} ({} player references pending)", ctx.game.gamemap, pending.len());
    Ok(pending)
}

/// Move every player to `map`, entering at start spot `position`.
pub fn map_teleport(ctx: &mut SaveContext<'_>, map: i32, position: i32) -> ArchiveResult<()> {
    info!("teleporting from map {} to map {} (position {})", ctx.game.gamemap, map, position);
    let deathmatch = ctx.game.deathmatch;
    let netgame = ctx.game.netgame;

    if !deathmatch {
        if ctx.sim.map_cluster(ctx.game.gamemap) == ctx.sim.map_cluster(map) {
            save_map(ctx, false)?;
        } else {
            ctx.dir.clear_slot(BASE_SLOT)?;
        }
    }

    let random_class = ctx.game.randomclass;
    ctx.game.randomclass = false;
    let backup = ctx.game.players.clone();
    let inventory_ptr = ctx.game.inv_ptr;
    let current_inv_pos = ctx.game.curpos;

    ctx.game.gamemap = map;
    let pending = if !deathmatch && ctx.dir.exists(&ctx.dir.map_file(BASE_SLOT, map)) {
        Some(load_map(ctx)?)
    } else {
        ctx.sim.init_new(ctx.game, ctx.level);
        for i in 0..MAXPLAYERS {
            if !ctx.game.playeringame[i] {
                continue;
            }
            if let Some(mo) = ctx.game.players[i].mo {
                ctx.sim.remove_mobj(ctx.level, mo);
            }
        }
        None
    };

    let mut target_player_mobj = None;
    let mut old_keys = 0;
    let mut old_pieces = 0;
    let mut old_weaponowned = [false; NUMWEAPONS];
    for (i, saved) in backup.into_iter().enumerate() {
        if !ctx.game.playeringame[i] {
            continue;
        }
        let player = &mut ctx.game.players[i];
        *player = saved;
        player.clear_message();
        player.attacker = None;
        player.poisoner = None;

        if netgame {
            if player.playerstate == PST_DEAD {
                player.playerstate = PST_REBORN;
            }
            if !deathmatch {
                old_keys = player.keys;
                old_pieces = player.pieces;
                old_weaponowned = player.weaponowned;
            }
        }
        let was_reborn = player.playerstate == PST_REBORN;

        if deathmatch {
            player.frags = [0; MAXPLAYERS];
            ctx.sim.deathmatch_spawn_player(ctx.game, ctx.level, i);
        } else {
            ctx.sim.spawn_player(ctx.game, ctx.level, i, position);
        }

        let player = &mut ctx.game.players[i];
        if was_reborn && netgame && !deathmatch {
            player.keys = old_keys;
            player.pieces = old_pieces;
            let mut best_weapon = 0;
            for (j, &owned) in old_weaponowned.iter().enumerate() {
                if owned {
                    best_weapon = j;
                    player.weaponowned[j] = true;
                }
            }
            player.mana[MANA_1] = 25;
            player.mana[MANA_2] = 25;
            if best_weapon != 0 {
                player.pendingweapon = best_weapon as i32;
            }
        }

        if target_player_mobj.is_none() {
            target_player_mobj = player.mo;
        }
    }
    ctx.game.randomclass = random_class;

    if let Some(pending) = pending {
        pending.resolve(ctx.level, target_player_mobj);
    }

    for i in 0..MAXPLAYERS {
        if !ctx.game.playeringame[i] {
            continue;
        }
        let Some(mo) = ctx.game.players[i].mo else {
            continue;
        };
        if let Some((x, y)) = ctx.level.mobj(mo).map(|m| (m.x, m.y)) {
            ctx.sim.teleport_move(ctx.level, mo, x, y);
        }
    }

    ctx.game.inv_ptr = inventory_ptr;
    ctx.game.curpos = current_inv_pos;

    if !deathmatch {
        ctx.sim.check_acs_store(ctx.game, ctx.level);
    }

    if !netgame {
        save_game(ctx, REBORN_SLOT, REBORN_DESCRIPTION)?;
    }
    Ok(())
}

// ============================================================
// Slots
// ============================================================

pub fn reborn_slot() -> i32 {
    REBORN_SLOT
}

pub fn reborn_slot_available(dir: &SaveDir) -> bool {
    dir.exists(&dir.global_file(REBORN_SLOT))
}

/// Copy the base slot into the reborn slot.
pub fn update_reborn_slot(dir: &SaveDir) -> ArchiveResult<()> {
    dir.clear_slot(REBORN_SLOT)?;
    dir.copy_slot(BASE_SLOT, REBORN_SLOT)?;
    Ok(())
}

pub fn clear_reborn_slot(dir: &SaveDir) -> ArchiveResult<()> {
    dir.clear_slot(REBORN_SLOT)?;
    Ok(())
}

pub fn init_base_slot(dir: &SaveDir) -> ArchiveResult<()> {
    dir.clear_slot(BASE_SLOT)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::p_spec::{Acs, FloorMove, Light, Thinker, ThinkClass};
    use crate::sim_import::testing::{TestSim, SECTOR_WIDTH};
    use crate::sv_mobjs::{special_refs, SpecialRefs};

    fn base_level() -> Level {
        let mut level = Level::default();
        level.sectors = (0..4)
            .map(|i| Sector {
                floorheight: 0,
                ceilingheight: 128 * FRACUNIT,
                sound_org: ((i * SECTOR_WIDTH + 8) << FRACBITS, 0),
                ..Default::default()
            })
            .collect();
        level.sides = vec![Side::default(); 2];
        level.lines = vec![Line { sidenum: [0, 1], ..Default::default() }, Line { sidenum: [-1, -1], ..Default::default() }];
        level.polyobjs = vec![Polyobj { tag: 1, angle: 0, start_spot: (0, 0) }];
        level.acs.code_base = 100;
        level.acs.scripts = vec![AcsInfo::default(); 2];
        level
    }

    fn x_in(sector: i32) -> Fixed {
        (sector * SECTOR_WIDTH + 16) << FRACBITS
    }

    /// Encode `level`, then decode it over a fresh base level the way
    /// `load_map` does.
    fn round_trip(level: &mut Level, save_players: bool) -> (Game, Level, TargetPlayerList) {
        let sim = TestSim::new(base_level());
        let mut out = StreamOut::memory();
        encode_map(&mut out, level, &sim, save_players).unwrap();

        let mut game = Game::default();
        let mut restored = Level::default();
        let mut sim = TestSim::new(base_level());
        sim.init_new(&mut game, &mut restored);
        restored.remove_all_thinkers();
        let mut buf = SaveBuffer::new(out.into_bytes());
        let pending = decode_map(&mut buf, &mut game, &mut restored, &mut sim).unwrap();
        assert_eq!(buf.remaining(), 0);
        (game, restored, pending)
    }

    fn live_ids(level: &Level) -> Vec<MobjId> {
        level.mobjs().map(|(id, _)| id).collect()
    }

    #[test]
    fn test_scenario_round_trip() {
        let mut level = base_level();
        let a = level.add_mobj(Mobj { x: x_in(0), ..Default::default() });
        let b = level.add_mobj(Mobj { x: x_in(1), ..Default::default() });
        let c = level.add_mobj(Mobj {
            x: x_in(2),
            kind: MobjType::DRAGON,
            flags: MobjFlags::CORPSE,
            special1: SpecialVal::Mobj(Some(a)),
            ..Default::default()
        });
        level.mobj_mut(a).unwrap().target = Some(b);
        level.leveltime = 3500;
        assert!(level.mobj(c).is_some());

        let (_, restored, pending) = round_trip(&mut level, true);
        let ids = live_ids(&restored);
        assert_eq!(ids.len(), 3);
        assert_eq!(restored.mobj(ids[0]).unwrap().target, Some(ids[1]));
        assert_eq!(restored.mobj(ids[1]).unwrap().target, None);
        assert_eq!(restored.mobj(ids[2]).unwrap().special1, SpecialVal::Mobj(None));
        assert_eq!(restored.leveltime, 3500);
        assert!(pending.is_empty());
    }

    #[test]
    fn test_thinkers_and_sectors_survive_map_round_trip() {
        let mut level = base_level();
        level.add_thinker(Thinker::MoveFloor(FloorMove { sector: 2, speed: FRACUNIT, ..Default::default() }));
        level.add_thinker(Thinker::Light(Light { sector: 3, ..Default::default() }));
        level.add_thinker(Thinker::InterpretAcs(Acs { ip: 140, line: Some(0), ..Default::default() }));
        level.sectors[2].special_data = Some(ThinkClass::MoveFloor);
        level.sectors[1].floorheight = 16 * FRACUNIT;

        let (_, restored, _) = round_trip(&mut level, true);
        assert_eq!(restored.thinkers, level.thinkers);
        assert_eq!(restored.sectors[2].special_data, Some(ThinkClass::MoveFloor));
        assert_eq!(restored.sectors[3].special_data, None);
        assert_eq!(restored.sectors[1].floorheight, 16 * FRACUNIT);
    }

    #[test]
    fn test_empty_map_segments() {
        let mut level = Level::default();
        let sim = TestSim::default();
        let mut out = StreamOut::memory();
        encode_map(&mut out, &mut level, &sim, true).unwrap();
        let bytes = out.into_bytes();

        let long = |off: usize| i32::from_le_bytes([bytes[off], bytes[off + 1], bytes[off + 2], bytes[off + 3]]);
        assert_eq!(long(0), 102);
        assert_eq!(long(8), 103);
        assert_eq!(long(12), 104);
        assert_eq!(long(20), 105);
        assert_eq!(long(28), 106);
        assert_eq!(bytes[32], 0);
        assert_eq!(long(33), 107);
        assert_eq!(long(bytes.len() - 4), 111);
    }

    #[test]
    fn test_swapped_segment_markers_are_fatal() {
        let mut level = Level::default();
        let sim = TestSim::default();
        let mut out = StreamOut::memory();
        encode_map(&mut out, &mut level, &sim, true).unwrap();
        let bytes = out.into_bytes();

        let decode = |bytes: Vec<u8>| {
            let mut game = Game::default();
            let mut restored = Level::default();
            let mut sim = TestSim::default();
            decode_map(&mut SaveBuffer::new(bytes), &mut game, &mut restored, &mut sim).map(|p| p.discard())
        };
        decode(bytes.clone()).unwrap();

        // World and Polyobjs markers sit back to back.
        let mut swapped = bytes.clone();
        swapped[8] = 104;
        swapped[12] = 103;
        assert!(matches!(decode(swapped), Err(ArchiveError::BadSegment { expected: 103, found: 104 })));

        let mut swapped = bytes;
        swapped[20] = 106;
        swapped[28] = 105;
        assert!(matches!(decode(swapped), Err(ArchiveError::BadSegment { expected: 105, found: 106 })));
    }

    #[test]
    fn test_random_reference_graph_round_trip() {
        const KINDS: [MobjType; 6] = [
            MobjType(500),
            MobjType::BISH_FX,
            MobjType::LIGHTNING_ZAP,
            MobjType::HOLY_TAIL,
            MobjType::MSTAFF_FX2,
            MobjType::LIGHTNING_CEILING,
        ];
        let mut rng = StdRng::seed_from_u64(0x4845_5853);
        let count = 80;

        let mut level = base_level();
        let ids: Vec<MobjId> = (0..count)
            .map(|_| {
                level.add_mobj(Mobj {
                    x: x_in(rng.gen_range(0..4)),
                    kind: KINDS[rng.gen_range(0..KINDS.len())],
                    ..Default::default()
                })
            })
            .collect();
        let pick = |rng: &mut StdRng| if rng.gen_bool(0.2) { None } else { Some(rng.gen_range(0..count)) };
        let mut links = Vec::new();
        for &id in &ids {
            let target = pick(&mut rng);
            let s1 = pick(&mut rng);
            let s2 = pick(&mut rng);
            let corpse = rng.gen_bool(0.1);
            let mobj = level.mobj_mut(id).unwrap();
            mobj.target = target.map(|j| ids[j]);
            if corpse {
                mobj.flags |= MobjFlags::CORPSE;
            }
            match special_refs(mobj.kind) {
                SpecialRefs::First => mobj.special1 = SpecialVal::Mobj(s1.map(|j| ids[j])),
                SpecialRefs::Second => mobj.special2 = SpecialVal::Mobj(s2.map(|j| ids[j])),
                SpecialRefs::Both => {
                    mobj.special1 = SpecialVal::Mobj(s1.map(|j| ids[j]));
                    mobj.special2 = SpecialVal::Mobj(s2.map(|j| ids[j]));
                }
                SpecialRefs::Neither => {}
            }
            links.push((target, s1, s2, corpse, mobj.kind));
        }

        let (_, restored, pending) = round_trip(&mut level, true);
        assert!(pending.is_empty());
        let new_ids = live_ids(&restored);
        assert_eq!(new_ids.len(), count);
        let map = |j: Option<usize>, corpse: bool| if corpse { None } else { j.map(|j| new_ids[j]) };

        for (i, &(target, s1, s2, corpse, kind)) in links.iter().enumerate() {
            let m = restored.mobj(new_ids[i]).unwrap();
            assert_eq!(m.kind, kind);
            assert_eq!(m.target, map(target, corpse), "target of mobj {}", i);
            match special_refs(kind) {
                SpecialRefs::First => assert_eq!(m.special1, SpecialVal::Mobj(map(s1, corpse))),
                SpecialRefs::Second => assert_eq!(m.special2, SpecialVal::Mobj(map(s2, corpse))),
                SpecialRefs::Both => {
                    assert_eq!(m.special1, SpecialVal::Mobj(map(s1, corpse)));
                    assert_eq!(m.special2, SpecialVal::Mobj(map(s2, corpse)));
                }
                SpecialRefs::Neither => assert_eq!((m.special1, m.special2), (SpecialVal::Int(0), SpecialVal::Int(0))),
            }
        }
    }

    #[test]
    fn test_version_mismatch_leaves_game_untouched() {
        let mut game = Game::default();
        game.gamemap = 12;
        let mut out = StreamOut::memory();
        encode_game(&mut out, &game, "old save").unwrap();
        let mut bytes = out.into_bytes();
        bytes[HXS_DESCRIPTION_LENGTH + 11] = b'6';

        let mut target = Game::default();
        target.gamemap = 3;
        target.world_vars[0] = 77;
        let before = target.clone();
        let err = decode_game(&mut SaveBuffer::new(bytes), &mut target).unwrap_err();
        assert!(matches!(err, ArchiveError::VersionMismatch(ref v) if v == "HXS Ver 2.36"));
        assert!(err.is_recoverable());
        assert_eq!(target, before);
    }

    #[test]
    fn test_game_file_header() {
        let mut game = Game::default();
        game.gamemap = 7;
        game.gameskill = 3;
        game.gameepisode = 4;
        game.playeringame[1] = true;
        game.player_class[1] = 2;
        game.players[1].health = 64;
        let mut out = StreamOut::memory();
        encode_game(&mut out, &game, "Seven Portals").unwrap();
        let bytes = out.into_bytes();
        assert_eq!(&bytes[..13], b"Seven Portals");
        assert_eq!(&bytes[24..36], HXS_VERSION_TEXT.as_bytes());
        assert_eq!(&bytes[40..46], &[101, 0, 0, 0, 7, 3]);

        let buf = SaveBuffer::new(bytes.clone());
        assert_eq!(read_description(&buf).unwrap(), "Seven Portals");

        let mut loaded = Game::default();
        decode_game(&mut SaveBuffer::new(bytes), &mut loaded).unwrap();
        assert_eq!((loaded.gamemap, loaded.gameskill, loaded.gameepisode), (7, 3, 1));
        assert_eq!(loaded.player_class[1], 2);
        assert_eq!(loaded.players[1].health, 64);
    }

    // ============================================================
    // Slot sessions
    // ============================================================

    struct Fixture {
        _tmp: tempfile::TempDir,
        dir: SaveDir,
        game: Game,
        level: Level,
        sim: TestSim,
    }

    impl Fixture {
        fn new() -> Self {
            let tmp = tempfile::tempdir().unwrap();
            let dir = SaveDir::new(tmp.path());
            let mut game = Game::default();
            game.playeringame[0] = true;
            let mut level = Level::default();
            let mut sim = TestSim::new(base_level());
            sim.init_new(&mut game, &mut level);
            Self { _tmp: tmp, dir, game, level, sim }
        }

        fn ctx(&mut self) -> SaveContext<'_> {
            SaveContext { game: &mut self.game, level: &mut self.level, sim: &mut self.sim, dir: &self.dir }
        }

        fn hero(&self) -> MobjId {
            self.game.players[0].mo.unwrap()
        }
    }

    #[test]
    fn test_save_and_load_game() {
        let mut fx = Fixture::new();
        let hero = fx.hero();
        let imp = fx.level.add_mobj(Mobj { x: x_in(3), target: Some(hero), health: 60, ..Default::default() });
        fx.level.mobj_mut(hero).unwrap().x = x_in(1);
        fx.game.players[0].health = 73;
        fx.game.players[0].inventory[0] = Inventory { kind: 11, count: 1 };
        fx.game.world_vars[5] = 9;
        assert!(fx.level.mobj(imp).is_some());

        save_game(&mut fx.ctx(), 2, "imp hunt").unwrap();
        assert!(fx.dir.exists(&fx.dir.global_file(2)));
        assert!(fx.dir.exists(&fx.dir.map_file(2, 1)));

        fx.game.players[0].health = 1;
        fx.game.world_vars[5] = 0;
        fx.game.inv_ptr = 4;
        init_base_slot(&fx.dir).unwrap();

        load_game(&mut fx.ctx(), 2).unwrap();
        assert_eq!(fx.game.players[0].health, 73);
        assert_eq!(fx.game.world_vars[5], 9);
        assert_eq!(fx.game.inv_ptr, 0);
        assert_eq!(fx.game.players[0].ready_artifact, 11);

        let hero = fx.hero();
        let restored_hero = fx.level.mobj(hero).unwrap();
        assert_eq!(restored_hero.player, Some(0));
        assert_eq!(restored_hero.x, x_in(1));
        let imp = fx.level.mobjs().find(|(_, m)| m.health == 60).map(|(id, _)| id).unwrap();
        assert_eq!(fx.level.mobj(imp).unwrap().target, Some(hero));
        assert_eq!(fx.level.mobj_count(), 2);
    }

    #[test]
    fn test_load_game_rejects_other_versions() {
        let mut fx = Fixture::new();
        save_game(&mut fx.ctx(), 3, "doomed").unwrap();
        let path = fx.dir.global_file(3);
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[HXS_DESCRIPTION_LENGTH..HXS_DESCRIPTION_LENGTH + 16].copy_from_slice(&[0; 16]);
        std::fs::write(&path, bytes).unwrap();

        let before = fx.game.clone();
        let err = load_game(&mut fx.ctx(), 3).unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(fx.game, before);
    }

    #[test]
    fn test_teleport_round_trip_redirects_player_references() {
        let mut fx = Fixture::new();
        let hero = fx.hero();
        for _ in 0..3 {
            fx.level.add_mobj(Mobj { x: x_in(2), target: Some(hero), health: 30, ..Default::default() });
        }
        fx.level.add_thinker(Thinker::InterpretAcs(Acs { activator: Some(hero), ip: 100, ..Default::default() }));

        map_teleport(&mut fx.ctx(), 2, 1).unwrap();
        assert_eq!(fx.game.gamemap, 2);
        assert!(fx.dir.exists(&fx.dir.map_file(BASE_SLOT, 1)));
        assert!(reborn_slot_available(&fx.dir));
        assert_eq!(fx.sim.init_new_calls.last(), Some(&2));
        // Only the freshly spawned player is left.
        assert_eq!(fx.level.mobj_count(), 1);

        map_teleport(&mut fx.ctx(), 1, 0).unwrap();
        let hero = fx.hero();
        let monsters: Vec<&Mobj> = fx.level.mobjs().map(|(_, m)| m).filter(|m| m.health == 30).collect();
        assert_eq!(monsters.len(), 3);
        for m in monsters {
            assert_eq!(m.target, Some(hero));
        }
        match &fx.level.thinkers[0] {
            Thinker::InterpretAcs(acs) => assert_eq!(acs.activator, Some(hero)),
            other => panic!("unexpected thinker {:?}", other),
        }
        assert_eq!(fx.sim.spawned.last(), Some(&(0, 0)));
        assert!(fx.sim.teleported.contains(&hero));
        assert_eq!(fx.sim.acs_store_checks, 2);
    }

    #[test]
    fn test_coop_teleport_redirects_to_first_player() {
        let mut fx = Fixture::new();
        fx.game.netgame = true;
        fx.game.playeringame[1] = true;
        let first = fx.hero();
        let second = fx.level.add_mobj(Mobj {
            kind: MobjType::PLAYER_CLERIC,
            player: Some(1),
            health: 100,
            ..Default::default()
        });
        fx.game.players[1].mo = Some(second);
        fx.level.add_mobj(Mobj { x: x_in(2), target: Some(second), health: 30, ..Default::default() });
        fx.level.add_mobj(Mobj { x: x_in(3), target: Some(first), health: 30, ..Default::default() });

        map_teleport(&mut fx.ctx(), 2, 0).unwrap();
        map_teleport(&mut fx.ctx(), 1, 0).unwrap();

        let first = fx.game.players[0].mo.unwrap();
        let second = fx.game.players[1].mo.unwrap();
        assert_ne!(first, second);
        let targets: Vec<Option<MobjId>> =
            fx.level.mobjs().map(|(_, m)| m).filter(|m| m.health == 30).map(|m| m.target).collect();
        assert_eq!(targets, vec![Some(first), Some(first)]);
    }

    #[test]
    fn test_teleport_to_new_cluster_clears_base_slot() {
        let mut fx = Fixture::new();
        fx.sim.clusters.insert(1, 1);
        fx.sim.clusters.insert(5, 2);
        fx.dir.create_path().unwrap();
        std::fs::write(fx.dir.map_file(BASE_SLOT, 5), b"stale").unwrap();

        map_teleport(&mut fx.ctx(), 5, 0).unwrap();
        assert!(!fx.dir.exists(&fx.dir.map_file(BASE_SLOT, 1)));
        assert_eq!(fx.sim.init_new_calls.last(), Some(&5));
        assert_eq!(fx.game.gamemap, 5);
    }

    #[test]
    fn test_coop_teleport_reborn_keeps_keys_and_weapons() {
        let mut fx = Fixture::new();
        fx.game.netgame = true;
        fx.game.playeringame[1] = true;
        fx.game.inv_ptr = 3;
        {
            let p = &mut fx.game.players[1];
            p.playerstate = PST_DEAD;
            p.keys = 5;
            p.pieces = 2;
            p.weaponowned = [true, false, true, false];
            p.message_tics = 20;
            p.attacker = Some(MobjId(1));
        }

        map_teleport(&mut fx.ctx(), 2, 0).unwrap();
        let p = &fx.game.players[1];
        assert_eq!(p.keys, 5);
        assert_eq!(p.pieces, 2);
        assert_eq!(p.mana, [25, 25]);
        assert_eq!(p.pendingweapon, 2);
        assert_eq!(p.message_tics, 0);
        assert_eq!(p.attacker, None);
        assert_eq!(fx.game.inv_ptr, 3);
        // Net games never write the reborn slot.
        assert!(!reborn_slot_available(&fx.dir));
    }

    #[test]
    fn test_deathmatch_teleport() {
        let mut fx = Fixture::new();
        fx.game.netgame = true;
        fx.game.deathmatch = true;
        fx.game.randomclass = true;
        fx.game.players[0].frags = [3; MAXPLAYERS];

        map_teleport(&mut fx.ctx(), 4, 0).unwrap();
        assert_eq!(fx.game.players[0].frags, [0; MAXPLAYERS]);
        assert_eq!(fx.sim.dm_spawned, vec![0]);
        assert!(fx.game.randomclass);
        assert_eq!(fx.sim.acs_store_checks, 0);
        assert!(!fx.dir.exists(&fx.dir.map_file(BASE_SLOT, 1)));
    }

    #[test]
    fn test_reborn_slot_helpers() {
        let mut fx = Fixture::new();
        assert_eq!(reborn_slot(), 7);
        assert!(!reborn_slot_available(&fx.dir));

        save_game(&mut fx.ctx(), BASE_SLOT, "base").unwrap();
        assert!(fx.dir.exists(&fx.dir.global_file(BASE_SLOT)));
        update_reborn_slot(&fx.dir).unwrap();
        assert!(reborn_slot_available(&fx.dir));
        assert!(fx.dir.exists(&fx.dir.map_file(REBORN_SLOT, 1)));

        clear_reborn_slot(&fx.dir).unwrap();
        assert!(!reborn_slot_available(&fx.dir));
        init_base_slot(&fx.dir).unwrap();
        assert!(!fx.dir.exists(&fx.dir.global_file(BASE_SLOT)));
    }
}
