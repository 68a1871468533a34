//! Simulation import interface: services the archiver needs from the engine.
//!
//! Spawning, physics, polyobject movement and sound sequence playback all
//! belong to the simulation. The archiver only calls them through this
//! trait, handed in explicitly with the state it acts on.

use crate::p_local::{Angle, Fixed, Game, Level, MobjId, SeqNode, SoundOrigin};

pub trait SimImport {
    /// Load the base level for `game.gamemap` into `level`, spawning its
    /// things and the in-game players.
    fn init_new(&mut self, game: &mut Game, level: &mut Level);

    /// Index of the sector containing the point.
    fn point_in_sector(&self, level: &Level, x: Fixed, y: Fixed) -> usize;

    /// Rebuild the thing ID lookup after mobjs were restored.
    fn create_tid_list(&mut self, _level: &Level) {}

    /// Rebuild the corpse queue by scanning restored mobjs.
    fn init_corpse_queue(&mut self, _level: &Level) {}

    /// Rotate polyobject `tag` by `angle`. False if no such polyobject.
    fn rotate_polyobj(&mut self, level: &mut Level, tag: i32, angle: Angle) -> bool;

    /// Move polyobject `tag` by the given delta. False if it is blocked or
    /// does not exist.
    fn move_polyobj(&mut self, level: &mut Level, tag: i32, dx: Fixed, dy: Fixed) -> bool;

    /// Every playing sound sequence, in play list order.
    fn active_sequences(&self) -> Vec<SeqNode>;

    fn start_sequence(&mut self, level: &Level, origin: SoundOrigin, sequence: i32);

    /// Restore the playback state of the `node`th started sequence.
    fn change_node_data(&mut self, node: usize, offset: i32, delay_tics: i32, volume: i32, sound_id: i32);

    /// Spawn player `playernum` at map start spot `position`, linking
    /// `game.players[playernum].mo`.
    fn spawn_player(&mut self, game: &mut Game, level: &mut Level, playernum: usize, position: i32);

    /// Spawn player `playernum` at a deathmatch start, linking its mobj.
    fn deathmatch_spawn_player(&mut self, game: &mut Game, level: &mut Level, playernum: usize);

    fn remove_mobj(&mut self, level: &mut Level, mobj: MobjId) {
        level.remove_mobj(mobj);
    }

    /// Move `mobj` to (x, y), telefragging whatever it lands on.
    fn teleport_move(&mut self, level: &mut Level, mobj: MobjId, x: Fixed, y: Fixed) -> bool;

    fn map_cluster(&self, map: i32) -> i32;

    /// Start scripts waiting in the store for the current map.
    fn check_acs_store(&mut self, game: &mut Game, level: &mut Level);
}

#[cfg(test)]
pub mod testing {
    //! Recording simulation used by the archiver tests.

    use std::collections::HashMap;

    use super::*;
    use crate::p_local::{Mobj, MobjType, FRACBITS, PST_LIVE};

    /// Width of a test sector in map units. Sector `n` spans
    /// x in `[n * SECTOR_WIDTH, (n + 1) * SECTOR_WIDTH)`.
    pub const SECTOR_WIDTH: i32 = 128;

    #[derive(Debug, Default)]
    pub struct TestSim {
        /// Level handed out by `init_new`.
        pub base_level: Level,
        /// Sequences reported as playing.
        pub sequences: Vec<SeqNode>,
        pub started: Vec<(SoundOrigin, i32)>,
        pub node_data: Vec<(usize, i32, i32, i32, i32)>,
        pub spawned: Vec<(usize, i32)>,
        pub dm_spawned: Vec<usize>,
        pub teleported: Vec<MobjId>,
        pub clusters: HashMap<i32, i32>,
        pub init_new_calls: Vec<i32>,
        pub tid_list_calls: usize,
        pub corpse_queue_calls: usize,
        pub acs_store_checks: usize,
        pub blocked_polyobjs: Vec<i32>,
    }

    impl TestSim {
        pub fn new(base_level: Level) -> Self {
            Self { base_level, ..Default::default() }
        }

        fn spawn_at(game: &mut Game, level: &mut Level, playernum: usize, x: Fixed) -> MobjId {
            let mo = level.add_mobj(Mobj {
                x,
                kind: MobjType::PLAYER_FIGHTER,
                player: Some(playernum),
                health: 100,
                ..Default::default()
            });
            let player = &mut game.players[playernum];
            player.mo = Some(mo);
            player.playerstate = PST_LIVE;
            mo
        }
    }

    impl SimImport for TestSim {
        fn init_new(&mut self, game: &mut Game, level: &mut Level) {
            self.init_new_calls.push(game.gamemap);
            *level = self.base_level.clone();
            for i in 0..game.playeringame.len() {
                if game.playeringame[i] {
                    Self::spawn_at(game, level, i, 0);
                }
            }
        }

        fn point_in_sector(&self, level: &Level, x: Fixed, _y: Fixed) -> usize {
            let n = (x >> FRACBITS).max(0) / SECTOR_WIDTH;
            (n as usize).min(level.sectors.len().saturating_sub(1))
        }

        fn create_tid_list(&mut self, _level: &Level) {
            self.tid_list_calls += 1;
        }

        fn init_corpse_queue(&mut self, _level: &Level) {
            self.corpse_queue_calls += 1;
        }

        fn rotate_polyobj(&mut self, level: &mut Level, tag: i32, angle: Angle) -> bool {
            match level.polyobjs.iter_mut().find(|po| po.tag == tag) {
                Some(po) => {
                    po.angle = po.angle.wrapping_add(angle);
                    true
                }
                None => false,
            }
        }

        fn move_polyobj(&mut self, level: &mut Level, tag: i32, dx: Fixed, dy: Fixed) -> bool {
            if self.blocked_polyobjs.contains(&tag) {
                return false;
            }
            match level.polyobjs.iter_mut().find(|po| po.tag == tag) {
                Some(po) => {
                    po.start_spot.0 += dx;
                    po.start_spot.1 += dy;
                    true
                }
                None => false,
            }
        }

        fn active_sequences(&self) -> Vec<SeqNode> {
            self.sequences.clone()
        }

        fn start_sequence(&mut self, _level: &Level, origin: SoundOrigin, sequence: i32) {
            self.started.push((origin, sequence));
        }

        fn change_node_data(&mut self, node: usize, offset: i32, delay_tics: i32, volume: i32, sound_id: i32) {
            self.node_data.push((node, offset, delay_tics, volume, sound_id));
        }

        fn spawn_player(&mut self, game: &mut Game, level: &mut Level, playernum: usize, position: i32) {
            self.spawned.push((playernum, position));
            let x = (position * SECTOR_WIDTH) << FRACBITS;
            Self::spawn_at(game, level, playernum, x);
        }

        fn deathmatch_spawn_player(&mut self, game: &mut Game, level: &mut Level, playernum: usize) {
            self.dm_spawned.push(playernum);
            Self::spawn_at(game, level, playernum, 0);
        }

        fn teleport_move(&mut self, level: &mut Level, mobj: MobjId, x: Fixed, y: Fixed) -> bool {
            self.teleported.push(mobj);
            match level.mobj_mut(mobj) {
                Some(mo) => {
                    mo.x = x;
                    mo.y = y;
                    true
                }
                None => false,
            }
        }

        fn map_cluster(&self, map: i32) -> i32 {
            self.clusters.get(&map).copied().unwrap_or(1)
        }

        fn check_acs_store(&mut self, _game: &mut Game, _level: &mut Level) {
            self.acs_store_checks += 1;
        }
    }
}
