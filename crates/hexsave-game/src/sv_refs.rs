// sv_refs.rs: Mobj references across a save/load
//
// Saving numbers every archived mobj densely in live-list order and writes
// references as those numbers. Loading allocates every mobj shell up front
// so a reference can be resolved the moment it is read, even to a mobj
// whose record comes later. References to player mobjs that were left out
// of the file are parked in a `TargetPlayerList` until the players exist.

use std::collections::HashMap;

use log::{debug, warn};

use hexsave_common::{ArchiveError, ArchiveResult};

use crate::p_local::{Level, Mobj, MobjId, SpecialVal};
use crate::p_spec::Thinker;

/// Wire value of a reference to nothing.
pub const MOBJ_NULL: i32 = -1;
/// Wire value of a reference to a player mobj that was not archived.
pub const MOBJ_XX_PLAYER: i32 = -2;

pub const MAX_TARGET_PLAYERS: usize = 512;

/// Archived form of a mobj reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MobjRef {
    Null,
    PendingPlayer,
    Index(u32),
}

impl MobjRef {
    pub fn to_wire(self) -> i32 {
        match self {
            MobjRef::Null => MOBJ_NULL,
            MobjRef::PendingPlayer => MOBJ_XX_PLAYER,
            MobjRef::Index(n) => n as i32,
        }
    }

    pub fn from_wire(val: i32) -> Option<MobjRef> {
        match val {
            MOBJ_NULL => Some(MobjRef::Null),
            MOBJ_XX_PLAYER => Some(MobjRef::PendingPlayer),
            n if n >= 0 => Some(MobjRef::Index(n as u32)),
            _ => None,
        }
    }
}

// ============================================================
// Save side
// ============================================================

/// Archive numbers of one save pass.
#[derive(Debug, Clone)]
pub struct ArchiveNums {
    nums: HashMap<MobjId, u32>,
    save_players: bool,
}

impl ArchiveNums {
    /// Number every mobj that will be archived and stamp the number into
    /// its `archive_num`. Player mobjs are skipped unless `save_players`.
    pub fn assign(level: &mut Level, save_players: bool) -> Self {
        let mut nums = HashMap::new();
        for (id, mobj) in level.mobjs_mut() {
            if mobj.player.is_some() && !save_players {
                continue;
            }
            let n = nums.len() as u32;
            mobj.archive_num = n as i32;
            nums.insert(id, n);
        }
        debug!("numbered {} mobjs (players {})", nums.len(), if save_players { "included" } else { "skipped" });
        Self { nums, save_players }
    }

    pub fn count(&self) -> usize {
        self.nums.len()
    }

    /// Whether `mobj` gets a record of its own in this pass.
    pub fn includes(&self, mobj: &Mobj) -> bool {
        self.save_players || mobj.player.is_none()
    }

    pub fn encode(&self, level: &Level, mobj: Option<MobjId>) -> MobjRef {
        let Some(id) = mobj else {
            return MobjRef::Null;
        };
        match level.mobj(id) {
            None => {
                warn!("reference to removed mobj {:?} archived as null", id);
                MobjRef::Null
            }
            Some(m) if !self.includes(m) => MobjRef::PendingPlayer,
            Some(_) => self.nums.get(&id).map_or(MobjRef::Null, |&n| MobjRef::Index(n)),
        }
    }
}

// ============================================================
// Load side
// ============================================================

/// A reference slot waiting for a player mobj.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchSlot {
    Target(MobjId),
    Special1(MobjId),
    Special2(MobjId),
    /// Activator of the script at this thinker index.
    Activator(usize),
}

/// Slots referring to a player mobj that does not exist yet.
#[derive(Debug, Default)]
#[must_use = "pending player references are lost unless resolved"]
pub struct TargetPlayerList {
    slots: Vec<PatchSlot>,
}

impl TargetPlayerList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, slot: PatchSlot) -> ArchiveResult<()> {
        if self.slots.len() == MAX_TARGET_PLAYERS {
            return Err(ArchiveError::TooManyTargetPlayers(MAX_TARGET_PLAYERS));
        }
        self.slots.push(slot);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[PatchSlot] {
        &self.slots
    }

    /// Point every parked slot at `target`.
    pub fn resolve(self, level: &mut Level, target: Option<MobjId>) {
        debug!("redirecting {} player references to {:?}", self.slots.len(), target);
        for slot in self.slots {
            match slot {
                PatchSlot::Target(id) => {
                    if let Some(mo) = level.mobj_mut(id) {
                        mo.target = target;
                    }
                }
                PatchSlot::Special1(id) => {
                    if let Some(mo) = level.mobj_mut(id) {
                        mo.special1 = SpecialVal::Mobj(target);
                    }
                }
                PatchSlot::Special2(id) => {
                    if let Some(mo) = level.mobj_mut(id) {
                        mo.special2 = SpecialVal::Mobj(target);
                    }
                }
                PatchSlot::Activator(index) => {
                    if let Some(Thinker::InterpretAcs(acs)) = level.thinkers.get_mut(index) {
                        acs.activator = target;
                    }
                }
            }
        }
    }

    /// Drop the parked slots without touching them.
    pub fn discard(self) {
        if !self.slots.is_empty() {
            debug!("discarding {} player references", self.slots.len());
        }
    }
}

/// The mobj shells of one load, indexed by archive number.
#[derive(Debug, Clone)]
pub struct MobjList {
    ids: Vec<MobjId>,
}

impl MobjList {
    /// Add `count` blank mobjs to the level, numbered 0..count.
    pub fn allocate(level: &mut Level, count: usize) -> Self {
        let ids = (0..count)
            .map(|i| level.add_mobj(Mobj { archive_num: i as i32, ..Default::default() }))
            .collect();
        Self { ids }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn get(&self, archive_num: u32) -> Option<MobjId> {
        self.ids.get(archive_num as usize).copied()
    }

    pub fn ids(&self) -> &[MobjId] {
        &self.ids
    }

    /// Turn a wire reference back into a handle. A pending player reference
    /// resolves to `None` and parks `slot` on `pending`.
    pub fn resolve(&self, wire: i32, slot: PatchSlot, pending: &mut TargetPlayerList) -> ArchiveResult<Option<MobjId>> {
        let bad = || ArchiveError::BadMobjRef { value: wire, count: self.ids.len() };
        match MobjRef::from_wire(wire).ok_or_else(bad)? {
            MobjRef::Null => Ok(None),
            MobjRef::PendingPlayer => {
                pending.push(slot)?;
                Ok(None)
            }
            MobjRef::Index(n) => self.get(n).map(Some).ok_or_else(bad),
        }
    }
}
