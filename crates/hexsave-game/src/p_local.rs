// p_local.rs: Live game and level state seen by the archiver
//
// `Game` is the state that survives map changes (global file), `Level` the
// state of the current map (per-map file). Both are plain handles owned by
// the caller; nothing here is process-global.

pub use hexsave_common::qcommon::*;

use crate::p_spec::Thinker;

// ============================================================
// Limits
// ============================================================

pub const NUMARMOR: usize = 4;
pub const NUMINVENTORYSLOTS: usize = 33;
pub const NUMPOWERS: usize = 9;
pub const NUMWEAPONS: usize = 4;
pub const NUMMANA: usize = 2;
pub const NUMPSPRITES: usize = 2;
pub const MESSAGE_LENGTH: usize = 80;

pub const MANA_1: usize = 0;
pub const MANA_2: usize = 1;

pub const MAX_ACS_WORLD_VARS: usize = 64;
pub const MAX_ACS_MAP_VARS: usize = 32;
pub const MAX_ACS_STORE: usize = 20;
pub const ACS_STORE_ARGS: usize = 4;

// player->playerstate
pub const PST_LIVE: i32 = 0;
pub const PST_DEAD: i32 = 1;
pub const PST_REBORN: i32 = 2;

// ============================================================
// Mobjs
// ============================================================

/// Handle to a mobj in the level's entity store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MobjId(pub u32);

// mobj->flags
bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct MobjFlags: i32 {
        const SPECIAL      = 0x00000001;
        const SOLID        = 0x00000002;
        const SHOOTABLE    = 0x00000004;
        const NOSECTOR     = 0x00000008;
        const NOBLOCKMAP   = 0x00000010;
        const AMBUSH       = 0x00000020;
        const JUSTHIT      = 0x00000040;
        const JUSTATTACKED = 0x00000080;
        const SPAWNCEILING = 0x00000100;
        const NOGRAVITY    = 0x00000200;
        const DROPOFF      = 0x00000400;
        const PICKUP       = 0x00000800;
        const NOCLIP       = 0x00001000;
        const SLIDE        = 0x00002000;
        const FLOAT        = 0x00004000;
        const TELEPORT     = 0x00008000;
        const MISSILE      = 0x00010000;
        const ALTSHADOW    = 0x00020000;
        const SHADOW       = 0x00040000;
        const NOBLOOD      = 0x00080000;
        const CORPSE       = 0x00100000;
        const INFLOAT      = 0x00200000;
        const COUNTKILL    = 0x00400000;
        const ICECORPSE    = 0x00800000;
        const SKULLFLY     = 0x01000000;
        const NOTDMATCH    = 0x02000000;
    }
}

/// Index into the thing info table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MobjType(pub i32);

impl MobjType {
    pub const MAPSPOT: MobjType = MobjType(0);
    pub const PLAYER_FIGHTER: MobjType = MobjType(1);
    pub const PLAYER_CLERIC: MobjType = MobjType(2);
    pub const PLAYER_MAGE: MobjType = MobjType(3);
    pub const MINOTAUR: MobjType = MobjType(64);
    pub const DRAGON: MobjType = MobjType(72);
    pub const KORAX: MobjType = MobjType(80);
    pub const SORCFX1: MobjType = MobjType(96);
    pub const THRUSTFLOOR_UP: MobjType = MobjType(110);
    pub const THRUSTFLOOR_DOWN: MobjType = MobjType(111);
    pub const MSTAFF_FX2: MobjType = MobjType(130);
    pub const BISH_FX: MobjType = MobjType(140);
    pub const HOLY_FX: MobjType = MobjType(150);
    pub const HOLY_TAIL: MobjType = MobjType(151);
    pub const LIGHTNING_CEILING: MobjType = MobjType(160);
    pub const LIGHTNING_FLOOR: MobjType = MobjType(161);
    pub const LIGHTNING_ZAP: MobjType = MobjType(162);
}

/// A `special1`/`special2` slot. What it holds depends on the mobj type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialVal {
    Int(i32),
    Mobj(Option<MobjId>),
}

impl Default for SpecialVal {
    fn default() -> Self {
        SpecialVal::Int(0)
    }
}

impl SpecialVal {
    pub fn as_int(&self) -> i32 {
        match *self {
            SpecialVal::Int(v) => v,
            SpecialVal::Mobj(_) => 0,
        }
    }

    pub fn as_mobj(&self) -> Option<MobjId> {
        match *self {
            SpecialVal::Int(_) => None,
            SpecialVal::Mobj(m) => m,
        }
    }
}

/// A map object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mobj {
    pub x: Fixed,
    pub y: Fixed,
    pub z: Fixed,
    pub angle: Angle,
    pub sprite: i32,
    pub frame: i32,
    /// Sector the mobj is linked into. Recomputed on load.
    pub sector: Option<usize>,
    pub floorz: Fixed,
    pub ceilingz: Fixed,
    pub floorpic: i32,
    pub radius: Fixed,
    pub height: Fixed,
    pub momx: Fixed,
    pub momy: Fixed,
    pub momz: Fixed,
    pub validcount: i32,
    pub kind: MobjType,
    pub tics: i32,
    /// Index into the state table.
    pub state: i32,
    pub damage: i32,
    pub flags: MobjFlags,
    pub flags2: i32,
    pub special1: SpecialVal,
    pub special2: SpecialVal,
    pub health: i32,
    pub movedir: i32,
    pub movecount: i32,
    pub target: Option<MobjId>,
    pub reactiontime: i32,
    pub threshold: i32,
    /// Owning player number.
    pub player: Option<usize>,
    pub lastlook: i32,
    pub floorclip: Fixed,
    pub archive_num: i32,
    pub tid: i16,
    pub special: u8,
    pub args: [u8; 5],
}

impl Mobj {
    pub fn is_corpse(&self) -> bool {
        self.flags.contains(MobjFlags::CORPSE)
    }
}

// ============================================================
// Players
// ============================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TicCmd {
    pub forwardmove: i8,
    pub sidemove: i8,
    pub angleturn: i16,
    pub consistancy: i16,
    pub chatchar: u8,
    pub buttons: u8,
    pub lookfly: u8,
    pub arti: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Inventory {
    pub kind: i32,
    pub count: i32,
}

/// Weapon sprite. `state` is a state table index, 0 for none.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PspDef {
    pub state: i32,
    pub tics: i32,
    pub sx: Fixed,
    pub sy: Fixed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub mo: Option<MobjId>,
    pub playerstate: i32,
    pub cmd: TicCmd,
    pub class: i32,
    pub viewz: Fixed,
    pub viewheight: Fixed,
    pub deltaviewheight: Fixed,
    pub bob: Fixed,
    pub flyheight: i32,
    pub lookdir: i32,
    pub centering: bool,
    pub health: i32,
    pub armorpoints: [i32; NUMARMOR],
    pub inventory: [Inventory; NUMINVENTORYSLOTS],
    pub ready_artifact: i32,
    pub artifact_count: i32,
    pub inventory_slot_num: i32,
    pub powers: [i32; NUMPOWERS],
    pub keys: i32,
    pub pieces: i32,
    pub frags: [i32; MAXPLAYERS],
    pub readyweapon: i32,
    pub pendingweapon: i32,
    pub weaponowned: [bool; NUMWEAPONS],
    pub mana: [i32; NUMMANA],
    pub attackdown: i32,
    pub usedown: i32,
    pub cheats: i32,
    pub refire: i32,
    pub killcount: i32,
    pub itemcount: i32,
    pub secretcount: i32,
    pub message: [u8; MESSAGE_LENGTH],
    pub message_tics: i32,
    pub ultimate_message: i16,
    pub yellow_message: i16,
    pub damagecount: i32,
    pub bonuscount: i32,
    pub poisoncount: i32,
    pub poisoner: Option<MobjId>,
    pub attacker: Option<MobjId>,
    pub extralight: i32,
    pub fixedcolormap: i32,
    pub colormap: i32,
    pub psprites: [PspDef; NUMPSPRITES],
    pub morph_tics: i32,
    pub jump_tics: u32,
    pub world_timer: u32,
}

impl Default for Player {
    fn default() -> Self {
        Self {
            mo: None,
            playerstate: PST_LIVE,
            cmd: TicCmd::default(),
            class: 0,
            viewz: 0,
            viewheight: 0,
            deltaviewheight: 0,
            bob: 0,
            flyheight: 0,
            lookdir: 0,
            centering: false,
            health: 0,
            armorpoints: [0; NUMARMOR],
            inventory: [Inventory::default(); NUMINVENTORYSLOTS],
            ready_artifact: 0,
            artifact_count: 0,
            inventory_slot_num: 0,
            powers: [0; NUMPOWERS],
            keys: 0,
            pieces: 0,
            frags: [0; MAXPLAYERS],
            readyweapon: 0,
            pendingweapon: 0,
            weaponowned: [false; NUMWEAPONS],
            mana: [0; NUMMANA],
            attackdown: 0,
            usedown: 0,
            cheats: 0,
            refire: 0,
            killcount: 0,
            itemcount: 0,
            secretcount: 0,
            message: [0; MESSAGE_LENGTH],
            message_tics: 0,
            ultimate_message: 0,
            yellow_message: 0,
            damagecount: 0,
            bonuscount: 0,
            poisoncount: 0,
            poisoner: None,
            attacker: None,
            extralight: 0,
            fixedcolormap: 0,
            colormap: 0,
            psprites: [PspDef::default(); NUMPSPRITES],
            morph_tics: 0,
            jump_tics: 0,
            world_timer: 0,
        }
    }
}

impl Player {
    pub fn clear_message(&mut self) {
        self.message = [0; MESSAGE_LENGTH];
        self.message_tics = 0;
    }
}

// ============================================================
// Global (cross-map) state
// ============================================================

/// A script queued to run when its map is next entered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcsStore {
    pub map: i32,
    pub script: i32,
    pub args: [u8; ACS_STORE_ARGS],
}

#[derive(Debug, Clone, PartialEq)]
pub struct Game {
    pub gamemap: i32,
    pub gameskill: i32,
    pub gameepisode: i32,
    pub world_vars: [i32; MAX_ACS_WORLD_VARS],
    pub acs_store: [AcsStore; MAX_ACS_STORE + 1],
    pub players: [Player; MAXPLAYERS],
    pub playeringame: [bool; MAXPLAYERS],
    pub player_class: [u8; MAXPLAYERS],
    pub consoleplayer: usize,
    pub netgame: bool,
    pub deathmatch: bool,
    pub randomclass: bool,
    /// Inventory bar cursor and its screen position.
    pub inv_ptr: i32,
    pub curpos: i32,
}

impl Default for Game {
    fn default() -> Self {
        Self {
            gamemap: 1,
            gameskill: 2,
            gameepisode: 1,
            world_vars: [0; MAX_ACS_WORLD_VARS],
            acs_store: [AcsStore::default(); MAX_ACS_STORE + 1],
            players: Default::default(),
            playeringame: [false; MAXPLAYERS],
            player_class: [0; MAXPLAYERS],
            consoleplayer: 0,
            netgame: false,
            deathmatch: false,
            randomclass: false,
            inv_ptr: 0,
            curpos: 0,
        }
    }
}

// ============================================================
// Map geometry
// ============================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sector {
    pub floorheight: Fixed,
    pub ceilingheight: Fixed,
    pub floorpic: i16,
    pub ceilingpic: i16,
    pub lightlevel: i16,
    pub special: i16,
    pub tag: i16,
    pub seq_type: i16,
    /// Kind of the thinker currently driving this sector's surfaces.
    pub special_data: Option<crate::p_spec::ThinkClass>,
    pub sound_target: Option<MobjId>,
    /// Point sector sound sequences play from.
    pub sound_org: (Fixed, Fixed),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Line {
    pub flags: i16,
    pub special: u8,
    pub args: [u8; 5],
    /// Side indices, -1 for none.
    pub sidenum: [i32; 2],
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Side {
    pub textureoffset: Fixed,
    pub rowoffset: Fixed,
    pub toptexture: i16,
    pub bottomtexture: i16,
    pub midtexture: i16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Polyobj {
    pub tag: i32,
    pub angle: Angle,
    pub start_spot: (Fixed, Fixed),
}

// ============================================================
// Scripts
// ============================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcsInfo {
    pub state: i16,
    pub wait_value: i16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AcsState {
    /// Position of the map's action code in script memory.
    pub code_base: usize,
    pub scripts: Vec<AcsInfo>,
    pub map_vars: [i32; MAX_ACS_MAP_VARS],
}

impl Default for AcsState {
    fn default() -> Self {
        Self { code_base: 0, scripts: Vec::new(), map_vars: [0; MAX_ACS_MAP_VARS] }
    }
}

// ============================================================
// Sound sequences
// ============================================================

/// Where a sound sequence plays from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundOrigin {
    /// A sector's sound origin point.
    Sector(usize),
    /// A polyobject's start spot, identified by polyobject tag.
    Polyobj(i32),
    /// A free point, such as a sounding mobj.
    Point { x: Fixed, y: Fixed },
}

/// Snapshot of one playing sound sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeqNode {
    pub sequence: i32,
    pub delay_tics: i32,
    pub volume: i32,
    /// Position in the sequence script.
    pub offset: i32,
    pub current_sound_id: i32,
    pub origin: SoundOrigin,
}

// ============================================================
// Level
// ============================================================

/// Mutable state of the current map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Level {
    pub leveltime: i32,
    pub sectors: Vec<Sector>,
    pub lines: Vec<Line>,
    pub sides: Vec<Side>,
    pub polyobjs: Vec<Polyobj>,
    /// Entity store. Slot `i` holds `MobjId(id_base + i)`. Slots are
    /// append-only so ids ascend in live-list order and are never reused;
    /// holes left by `remove_mobj` stay until `remove_all_thinkers`.
    mobjs: Vec<Option<Mobj>>,
    id_base: u32,
    live: usize,
    /// Non-mobj thinkers, in run order.
    pub thinkers: Vec<Thinker>,
    /// Thinker indices of moving plats and ceilings.
    pub active_plats: Vec<usize>,
    pub active_ceilings: Vec<usize>,
    pub acs: AcsState,
    pub local_quake_happening: [i32; MAXPLAYERS],
}

impl Level {
    fn slot(&self, id: MobjId) -> Option<usize> {
        id.0.checked_sub(self.id_base).map(|i| i as usize)
    }

    /// Add a mobj to the end of the live list.
    pub fn add_mobj(&mut self, mobj: Mobj) -> MobjId {
        let id = MobjId(self.id_base + self.mobjs.len() as u32);
        self.mobjs.push(Some(mobj));
        self.live += 1;
        id
    }

    pub fn mobj(&self, id: MobjId) -> Option<&Mobj> {
        self.slot(id).and_then(|i| self.mobjs.get(i)).and_then(Option::as_ref)
    }

    pub fn mobj_mut(&mut self, id: MobjId) -> Option<&mut Mobj> {
        let i = self.slot(id)?;
        self.mobjs.get_mut(i).and_then(Option::as_mut)
    }

    pub fn remove_mobj(&mut self, id: MobjId) -> Option<Mobj> {
        let i = self.slot(id)?;
        let removed = self.mobjs.get_mut(i).and_then(Option::take);
        if removed.is_some() {
            self.live -= 1;
        }
        removed
    }

    /// Live mobjs in live-list order.
    pub fn mobjs(&self) -> impl Iterator<Item = (MobjId, &Mobj)> + '_ {
        let base = self.id_base;
        self.mobjs
            .iter()
            .enumerate()
            .filter_map(move |(i, m)| m.as_ref().map(|m| (MobjId(base + i as u32), m)))
    }

    pub fn mobjs_mut(&mut self) -> impl Iterator<Item = (MobjId, &mut Mobj)> + '_ {
        let base = self.id_base;
        self.mobjs
            .iter_mut()
            .enumerate()
            .filter_map(move |(i, m)| m.as_mut().map(|m| (MobjId(base + i as u32), m)))
    }

    pub fn mobj_count(&self) -> usize {
        self.live
    }

    pub fn add_thinker(&mut self, thinker: Thinker) -> usize {
        self.thinkers.push(thinker);
        self.thinkers.len() - 1
    }

    /// Drop every mobj and thinker. Handles issued before the wipe no
    /// longer resolve.
    pub fn remove_all_thinkers(&mut self) {
        self.id_base += self.mobjs.len() as u32;
        self.mobjs.clear();
        self.live = 0;
        self.thinkers.clear();
        self.active_plats.clear();
        self.active_ceilings.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_remove_mobj() {
        let mut level = Level::default();
        let a = level.add_mobj(Mobj { health: 10, ..Default::default() });
        let b = level.add_mobj(Mobj { health: 20, ..Default::default() });
        assert_eq!(level.mobj(a).unwrap().health, 10);
        assert_eq!(level.remove_mobj(a).unwrap().health, 10);
        assert!(level.mobj(a).is_none());
        assert_eq!(level.mobjs().map(|(id, _)| id).collect::<Vec<_>>(), vec![b]);
        assert_eq!(level.mobj_count(), 1);
    }

    #[test]
    fn test_stale_handles_after_wipe() {
        let mut level = Level::default();
        let old = level.add_mobj(Mobj::default());
        level.remove_all_thinkers();
        let new = level.add_mobj(Mobj::default());
        assert_ne!(old, new);
        assert!(level.mobj(old).is_none());
        assert!(level.mobj(new).is_some());
    }

    #[test]
    fn test_special_val_views() {
        assert_eq!(SpecialVal::Int(5).as_int(), 5);
        assert_eq!(SpecialVal::Int(5).as_mobj(), None);
        assert_eq!(SpecialVal::Mobj(Some(MobjId(3))).as_mobj(), Some(MobjId(3)));
        assert_eq!(SpecialVal::Mobj(Some(MobjId(3))).as_int(), 0);
    }

    #[test]
    fn test_clear_message() {
        let mut p = Player::default();
        p.message[..5].copy_from_slice(b"hello");
        p.message_tics = 35;
        p.clear_message();
        assert_eq!(p.message, [0; MESSAGE_LENGTH]);
        assert_eq!(p.message_tics, 0);
    }

    #[test]
    fn test_count_ignores_holes_and_double_removal() {
        let mut level = Level::default();
        let a = level.add_mobj(Mobj::default());
        let b = level.add_mobj(Mobj::default());
        level.remove_mobj(a);
        assert!(level.remove_mobj(a).is_none());
        assert_eq!(level.mobj_count(), 1);
        // Freed slots are not handed out again.
        let c = level.add_mobj(Mobj::default());
        assert!(c > b);
        assert_eq!(level.mobj_count(), 2);
        level.remove_all_thinkers();
        assert_eq!(level.mobj_count(), 0);
    }
}
