#![allow(clippy::needless_return, clippy::too_many_arguments, clippy::field_reassign_with_default,
         clippy::needless_range_loop, clippy::new_without_default)]
// Save archive for the Hexen-style world model: segmented global and
// per-map files, mobj reference numbering, and hub travel.

pub mod p_local;
pub mod p_spec;
pub mod sim_import;
pub mod sv_archive;
pub mod sv_refs;
pub mod sv_thinkers;
pub mod sv_mobjs;
pub mod sv_players;
pub mod sv_world;
pub mod sv_save;

pub use sim_import::SimImport;
pub use sv_save::{
    clear_reborn_slot, init_base_slot, load_game, load_map, map_teleport, reborn_slot, reborn_slot_available,
    save_game, save_map, update_reborn_slot, SaveContext,
};
