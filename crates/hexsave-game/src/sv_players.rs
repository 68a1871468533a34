// sv_players.rs: Player records in the global file

use std::io::{self, Write};

use log::debug;

use hexsave_common::stream::{SaveBuffer, StreamOut};
use hexsave_common::ArchiveResult;

use crate::p_local::*;
use crate::sv_archive::{assert_segment, write_segment, ArchiveSegment};

fn stream_out_ticcmd<W: Write>(out: &mut StreamOut<W>, cmd: &TicCmd) -> io::Result<()> {
    out.write_byte(cmd.forwardmove as u8)?;
    out.write_byte(cmd.sidemove as u8)?;
    out.write_word(cmd.angleturn)?;
    out.write_word(cmd.consistancy)?;
    out.write_byte(cmd.chatchar)?;
    out.write_byte(cmd.buttons)?;
    out.write_byte(cmd.lookfly)?;
    out.write_byte(cmd.arti)
}

fn stream_in_ticcmd(buf: &mut SaveBuffer) -> ArchiveResult<TicCmd> {
    Ok(TicCmd {
        forwardmove: buf.get_byte()? as i8,
        sidemove: buf.get_byte()? as i8,
        angleturn: buf.get_word()?,
        consistancy: buf.get_word()?,
        chatchar: buf.get_byte()?,
        buttons: buf.get_byte()?,
        lookfly: buf.get_byte()?,
        arti: buf.get_byte()?,
    })
}

fn stream_out_pspdef<W: Write>(out: &mut StreamOut<W>, psp: &PspDef) -> io::Result<()> {
    out.write_long(psp.state)?;
    out.write_long(psp.tics)?;
    out.write_long(psp.sx)?;
    out.write_long(psp.sy)
}

fn stream_in_pspdef(buf: &mut SaveBuffer) -> ArchiveResult<PspDef> {
    Ok(PspDef { state: buf.get_long()?, tics: buf.get_long()?, sx: buf.get_long()?, sy: buf.get_long()? })
}

pub fn stream_out_player<W: Write>(out: &mut StreamOut<W>, p: &Player) -> io::Result<()> {
    out.write_ptr(p.mo.map(|m| m.0 as usize))?;
    out.write_long(p.playerstate)?;
    stream_out_ticcmd(out, &p.cmd)?;
    out.write_long(p.class)?;
    out.write_long(p.viewz)?;
    out.write_long(p.viewheight)?;
    out.write_long(p.deltaviewheight)?;
    out.write_long(p.bob)?;
    out.write_long(p.flyheight)?;
    out.write_long(p.lookdir)?;
    out.write_long(p.centering as i32)?;
    out.write_long(p.health)?;
    for &armor in &p.armorpoints {
        out.write_long(armor)?;
    }
    for inv in &p.inventory {
        out.write_long(inv.kind)?;
        out.write_long(inv.count)?;
    }
    out.write_long(p.ready_artifact)?;
    out.write_long(p.artifact_count)?;
    out.write_long(p.inventory_slot_num)?;
    for &power in &p.powers {
        out.write_long(power)?;
    }
    out.write_long(p.keys)?;
    out.write_long(p.pieces)?;
    for &frags in &p.frags {
        out.write_long(frags)?;
    }
    out.write_long(p.readyweapon)?;
    out.write_long(p.pendingweapon)?;
    for &owned in &p.weaponowned {
        out.write_long(owned as i32)?;
    }
    for &mana in &p.mana {
        out.write_long(mana)?;
    }
    out.write_long(p.attackdown)?;
    out.write_long(p.usedown)?;
    out.write_long(p.cheats)?;
    out.write_long(p.refire)?;
    out.write_long(p.killcount)?;
    out.write_long(p.itemcount)?;
    out.write_long(p.secretcount)?;
    out.write_buffer(&p.message)?;
    out.write_long(p.message_tics)?;
    out.write_word(p.ultimate_message)?;
    out.write_word(p.yellow_message)?;
    out.write_long(p.damagecount)?;
    out.write_long(p.bonuscount)?;
    out.write_long(p.poisoncount)?;
    out.write_ptr(p.poisoner.map(|m| m.0 as usize))?;
    out.write_ptr(p.attacker.map(|m| m.0 as usize))?;
    out.write_long(p.extralight)?;
    out.write_long(p.fixedcolormap)?;
    out.write_long(p.colormap)?;
    for psp in &p.psprites {
        stream_out_pspdef(out, psp)?;
    }
    out.write_long(p.morph_tics)?;
    out.write_long(p.jump_tics as i32)?;
    out.write_long(p.world_timer as i32)
}

/// Read a player record. Mobj links come back unset; the map load
/// re-establishes `mo`.
pub fn stream_in_player(buf: &mut SaveBuffer) -> ArchiveResult<Player> {
    let mut p = Player::default();
    buf.skip_ptr()?;
    p.mo = None;
    p.playerstate = buf.get_long()?;
    p.cmd = stream_in_ticcmd(buf)?;
    p.class = buf.get_long()?;
    p.viewz = buf.get_long()?;
    p.viewheight = buf.get_long()?;
    p.deltaviewheight = buf.get_long()?;
    p.bob = buf.get_long()?;
    p.flyheight = buf.get_long()?;
    p.lookdir = buf.get_long()?;
    p.centering = buf.get_long()? != 0;
    p.health = buf.get_long()?;
    for armor in p.armorpoints.iter_mut() {
        *armor = buf.get_long()?;
    }
    for inv in p.inventory.iter_mut() {
        inv.kind = buf.get_long()?;
        inv.count = buf.get_long()?;
    }
    p.ready_artifact = buf.get_long()?;
    p.artifact_count = buf.get_long()?;
    p.inventory_slot_num = buf.get_long()?;
    for power in p.powers.iter_mut() {
        *power = buf.get_long()?;
    }
    p.keys = buf.get_long()?;
    p.pieces = buf.get_long()?;
    for frags in p.frags.iter_mut() {
        *frags = buf.get_long()?;
    }
    p.readyweapon = buf.get_long()?;
    p.pendingweapon = buf.get_long()?;
    for owned in p.weaponowned.iter_mut() {
        *owned = buf.get_long()? != 0;
    }
    for mana in p.mana.iter_mut() {
        *mana = buf.get_long()?;
    }
    p.attackdown = buf.get_long()?;
    p.usedown = buf.get_long()?;
    p.cheats = buf.get_long()?;
    p.refire = buf.get_long()?;
    p.killcount = buf.get_long()?;
    p.itemcount = buf.get_long()?;
    p.secretcount = buf.get_long()?;
    p.message.copy_from_slice(buf.get_buffer(MESSAGE_LENGTH)?);
    p.message_tics = buf.get_long()?;
    p.ultimate_message = buf.get_word()?;
    p.yellow_message = buf.get_word()?;
    p.damagecount = buf.get_long()?;
    p.bonuscount = buf.get_long()?;
    p.poisoncount = buf.get_long()?;
    buf.skip_ptr()?;
    p.poisoner = None;
    buf.skip_ptr()?;
    p.attacker = None;
    p.extralight = buf.get_long()?;
    p.fixedcolormap = buf.get_long()?;
    p.colormap = buf.get_long()?;
    for psp in p.psprites.iter_mut() {
        *psp = stream_in_pspdef(buf)?;
    }
    p.morph_tics = buf.get_long()?;
    p.jump_tics = buf.get_long()? as u32;
    p.world_timer = buf.get_long()? as u32;
    Ok(p)
}

/// Write the players segment: in-game flags, then class and record of
/// every in-game player.
pub fn archive_players<W: Write>(out: &mut StreamOut<W>, game: &Game) -> ArchiveResult<()> {
    write_segment(out, ArchiveSegment::Players)?;
    for &ingame in &game.playeringame {
        out.write_byte(ingame as u8)?;
    }
    for i in 0..MAXPLAYERS {
        if !game.playeringame[i] {
            continue;
        }
        out.write_byte(game.player_class[i])?;
        stream_out_player(out, &game.players[i])?;
    }
    Ok(())
}

pub fn unarchive_players(buf: &mut SaveBuffer, game: &mut Game) -> ArchiveResult<()> {
    assert_segment(buf, ArchiveSegment::Players)?;
    for ingame in game.playeringame.iter_mut() {
        *ingame = buf.get_byte()? != 0;
    }
    for i in 0..MAXPLAYERS {
        if !game.playeringame[i] {
            continue;
        }
        game.player_class[i] = buf.get_byte()?;
        game.players[i] = stream_in_player(buf)?;
        game.players[i].clear_message();
        debug!("restored player {} (class {})", i, game.player_class[i]);
    }
    Ok(())
}
