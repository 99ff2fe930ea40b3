//! Authoritative host session.
//!
//! The host owns the only world whose damage resolution counts. It accepts
//! data channels, seats joining players, applies forwarded input to the turn
//! holder, steps the simulation on the fixed tick and broadcasts every
//! host-resolved event to all connected peers.

use anyhow::Result;
use manastorm_collision::{CollisionMask, PhysicsBody};
use manastorm_core::{EntityId, InputState, StateVec};
use manastorm_net::{
    ChannelEvent, CharacterSnapshot, DataChannel, Message, PeerConnection, PlayerSnapshot,
    MAX_PLAYERS,
};
use manastorm_sim::entity::{random_item, Character, Entity};
use manastorm_sim::player::Player;
use manastorm_sim::{Manager, TurnConfig, TurnEvent, TurnState, World, WorldEvent};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

/// Characters each player fields.
pub const CHARACTERS_PER_PLAYER: usize = 2;

/// Sim frames between `ActiveUpdate` corrections of the turn holder.
const ACTIVE_UPDATE_INTERVAL: u64 = 3;

/// Sim frames between bulk `EntityUpdate` corrections.
const BULK_UPDATE_INTERVAL: u64 = 30;

/// Chance (out of this many turns) that a turn change drops an item.
const ITEM_DROP_ODDS: u32 = 3;

/// Mana pool ceiling.
const MAX_MANA: f64 = 100.0;

struct Peer {
    connection: PeerConnection,
    /// Roster index once the peer's `Join` was accepted.
    player: Option<usize>,
    lost: bool,
}

/// The authoritative session.
pub struct HostSession {
    manager: Manager,
    world: World,
    peers: Vec<Peer>,
    rng: StdRng,
    frame: u64,
    /// Latest controller state of the turn holder.
    turn_input: InputState,
}

impl HostSession {
    /// Create a host around a loaded terrain mask.
    pub fn new(terrain: CollisionMask, config: TurnConfig, seed: u64) -> Self {
        Self {
            manager: Manager::new(config),
            world: World::new(terrain),
            peers: Vec::new(),
            rng: StdRng::seed_from_u64(seed),
            frame: 0,
            turn_input: InputState::default(),
        }
    }

    /// The turn machine.
    pub fn manager(&self) -> &Manager {
        &self.manager
    }

    /// The authoritative world.
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Connected peers.
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Accept an inbound data channel; the seat is assigned on `Join`.
    pub fn accept(&mut self, channel: Box<dyn DataChannel>) {
        debug!("channel accepted, awaiting join");
        self.peers.push(Peer {
            connection: PeerConnection::new(channel),
            player: None,
            lost: false,
        });
    }

    /// Seat the host's own player, with no channel behind it.
    pub fn add_local_player(
        &mut self,
        name: impl Into<String>,
        team: impl Into<String>,
        color: u32,
    ) -> usize {
        let index = self.seat_player(name.into(), team.into(), color);
        self.broadcast_roster();
        index
    }

    /// Select (or clear) a spell for a locally seated player.
    pub fn select_spell(&mut self, player: usize, spell: Option<usize>) -> Result<()> {
        self.manager.select_spell(player, spell)?;
        self.broadcast(&Message::SelectSpell {
            spell: spell.map(|s| s as u32),
            player: player as u32,
        });
        Ok(())
    }

    /// Feed the host's own controller state.
    pub fn set_local_input(&mut self, input: InputState) {
        // Only the turn holder's owner steers; locally that means the host
        // player must hold the turn.
        if self
            .peers
            .iter()
            .all(|peer| peer.player != Some(self.manager.active_player()))
        {
            self.turn_input = input.sanitized();
        }
    }

    /// Advance the session by one render frame's worth of wall-clock time.
    pub fn frame(&mut self, elapsed_ms: u64) -> Result<()> {
        let steps = self.manager.accumulate(elapsed_ms);
        for _ in 0..steps {
            self.fixed_tick()?;
        }
        Ok(())
    }

    /// One fixed simulation step.
    pub fn fixed_tick(&mut self) -> Result<()> {
        self.manager.begin_tick();

        self.poll_channels();
        self.drain_messages()?;

        // Damage resolves before physics moves anything this tick.
        let struck = self.world.apply_queued_damage();
        self.manager.note_struck(&struck);
        self.correct_struck(&struck);

        self.control_turn_holder()?;

        let died = self.world.tick(1.0);
        for id in died {
            self.manager.note_death(id);
        }

        self.manager.advance_turn(&self.world);

        self.relay_world_events();
        self.relay_turn_events();
        self.periodic_updates();

        self.peers.retain(|peer| !peer.lost);
        self.frame += 1;
        Ok(())
    }

    fn poll_channels(&mut self) {
        for peer in &mut self.peers {
            while let Some(event) = peer.connection.poll_event() {
                match event {
                    ChannelEvent::Open => {}
                    ChannelEvent::Closed => {
                        info!(player = ?peer.player, "peer channel closed");
                        peer.lost = true;
                    }
                    ChannelEvent::Error(reason) => {
                        warn!(player = ?peer.player, %reason, "peer channel failed");
                        peer.lost = true;
                    }
                }
            }
        }
    }

    fn drain_messages(&mut self) -> Result<()> {
        let mut inbound = Vec::new();
        for (index, peer) in self.peers.iter_mut().enumerate() {
            if peer.lost {
                continue;
            }
            loop {
                match peer.connection.try_recv() {
                    Ok(Some(msg)) => inbound.push((index, msg)),
                    Ok(None) => break,
                    Err(err) => {
                        warn!(player = ?peer.player, %err, "dropping misbehaving peer");
                        peer.connection.close();
                        peer.lost = true;
                        break;
                    }
                }
            }
        }
        for (peer_index, msg) in inbound {
            self.dispatch(peer_index, msg)?;
        }
        Ok(())
    }

    fn dispatch(&mut self, peer_index: usize, msg: Message) -> Result<()> {
        match msg {
            Message::Join {
                version,
                schema_hash,
                name,
                team,
            } => {
                if let Err(err) = self.peers[peer_index]
                    .connection
                    .check_schema(version, schema_hash)
                {
                    warn!(%err, "rejecting incompatible peer");
                    self.peers[peer_index].connection.close();
                    self.peers[peer_index].lost = true;
                    return Ok(());
                }
                if self.manager.players().len() >= MAX_PLAYERS {
                    warn!("roster full, refusing join");
                    self.peers[peer_index].connection.close();
                    self.peers[peer_index].lost = true;
                    return Ok(());
                }
                // Anything still pending from this tick is relayed before
                // seating mutates the world and its event queue.
                self.relay_world_events();
                let color = self.rng.gen::<u32>() & 0x00ff_ffff;
                let player = self.seat_player(name, team, color);
                self.peers[peer_index].player = Some(player);
                self.broadcast_roster();

                // Characters travel in the roster snapshot; everything else
                // alive right now must be replayed or the joiner's bulk
                // updates will never align.
                let spawns: Vec<Message> = self
                    .world
                    .entities()
                    .filter(|(_, entity)| !matches!(entity, Entity::Character(_)))
                    .map(|(id, entity)| Message::Spawn {
                        kind: entity.kind(),
                        id,
                        data: entity.serialize(),
                    })
                    .collect();
                let peer = &mut self.peers[peer_index];
                for spawn in &spawns {
                    if peer.connection.send(spawn).is_err() {
                        peer.lost = true;
                        break;
                    }
                }
            }
            Message::ClientReady => {
                let snapshot = self.turn_snapshot();
                let peer = &mut self.peers[peer_index];
                info!(player = ?peer.player, "peer ready");
                if peer.connection.send(&snapshot).is_err() {
                    peer.lost = true;
                }
            }
            Message::InputState { input } => {
                // Only the turn holder's owner steers.
                if self.peers[peer_index].player == Some(self.manager.active_player()) {
                    self.turn_input = input.sanitized();
                    self.broadcast_except(peer_index, &Message::InputState { input });
                }
            }
            Message::SelectSpell { spell, player } => {
                // A peer can only select for its own seat.
                if self.peers[peer_index].player != Some(player as usize) {
                    return Ok(());
                }
                if let Err(err) = self
                    .manager
                    .select_spell(player as usize, spell.map(|s| s as usize))
                {
                    warn!(%err, "bad spell selection, dropping peer");
                    self.peers[peer_index].connection.close();
                    self.peers[peer_index].lost = true;
                    return Ok(());
                }
                self.broadcast_except(peer_index, &Message::SelectSpell { spell, player });
            }
            // Every other tag is host-authored; a client sending one has
            // diverged from the protocol.
            other => {
                warn!(tag = ?other, "host-authored tag from client, dropping peer");
                self.peers[peer_index].connection.close();
                self.peers[peer_index].lost = true;
            }
        }
        Ok(())
    }

    fn control_turn_holder(&mut self) -> Result<()> {
        let Some(active) = self.manager.active_character() else {
            return Ok(());
        };
        let input = self.turn_input;
        if let Entity::Character(character) = self.world.entity_mut(active)? {
            character.control(&input);
        }
        if input.fire && self.manager.turn_state() == TurnState::Ongoing {
            self.manager.cast_spell(&mut self.world, &input)?;
            self.turn_input.fire = false;
        }
        Ok(())
    }

    /// Targeted corrections for entities damage just changed, so followers
    /// converge on the authoritative hp without waiting for the next bulk
    /// update.
    fn correct_struck(&mut self, struck: &[EntityId]) {
        for &id in struck {
            if let Ok(entity) = self.world.entity(id) {
                let data = entity.serialize();
                self.broadcast(&Message::DynamicUpdate { id, data });
            }
        }
    }

    fn relay_world_events(&mut self) {
        for event in self.world.drain_events() {
            match event {
                WorldEvent::Spawned { id, kind, data } => {
                    self.broadcast(&Message::Spawn { kind, id, data });
                }
                WorldEvent::Died { id } => {
                    self.manager.note_death(id);
                    self.broadcast(&Message::Die { id });
                }
                WorldEvent::Damage { source } => {
                    self.broadcast(&Message::SyncDamage {
                        kind: source.kind(),
                        data: source.serialize(),
                    });
                }
                WorldEvent::Focus { id } => {
                    self.broadcast(&Message::Focus { id });
                }
                WorldEvent::Popup { title, body } => {
                    self.broadcast(&Message::Popup { title, body });
                }
                WorldEvent::EndTurn => {
                    self.manager.set_turn_state(TurnState::Ending);
                }
                WorldEvent::ManaPickup { character, amount } => {
                    self.grant_mana(character, amount);
                }
                WorldEvent::ElementPickup { element, amount } => {
                    self.manager.raise_element(element, amount);
                }
            }
        }
    }

    fn relay_turn_events(&mut self) {
        for event in self.manager.drain_events() {
            match event {
                TurnEvent::TurnStarted {
                    player,
                    character,
                    elements,
                    turn_start,
                } => {
                    self.broadcast(&Message::ActiveCharacter {
                        player: player as u32,
                        character: character as u32,
                        elements,
                        turn_start: turn_start.0,
                    });
                    self.maybe_drop_item();
                }
                TurnEvent::StateChanged(_) => {}
            }
        }
    }

    fn periodic_updates(&mut self) {
        if self.frame % ACTIVE_UPDATE_INTERVAL == 0 {
            if let Some(active) = self.manager.active_character() {
                if let Ok(entity) = self.world.entity(active) {
                    let state = entity.serialize();
                    self.broadcast(&Message::ActiveUpdate { state });
                }
            }
        }
        if self.frame % BULK_UPDATE_INTERVAL == 0 {
            let states: Vec<StateVec> = self.world.syncable_states();
            self.broadcast(&Message::EntityUpdate { states });
        }
    }

    fn seat_player(&mut self, name: String, team: String, color: u32) -> usize {
        let mut player = Player::new(name.clone(), team, color);
        let seat = self.manager.players().len();
        for slot in 0..CHARACTERS_PER_PLAYER {
            let x = 20.0 + 60.0 * seat as f64 + 15.0 * slot as f64;
            let x = x % f64::from(self.world.terrain().width().saturating_sub(20).max(1));
            let y = surface_y(self.world.terrain(), x as u32) - 12.0;
            let id = self.world.spawn(Entity::Character(Character::new(
                seat,
                format!("{name} {}", slot + 1),
                x,
                y,
            )));
            player.characters.push(id);
        }
        info!(seat, name = %name, "player seated");
        // Seating spawns travel in the roster snapshot; unrelated pending
        // events stay queued for the next relay.
        for event in self.world.drain_events() {
            match event {
                WorldEvent::Spawned { id, .. } if player.characters.contains(&id) => {}
                other => self.world.push_event(other),
            }
        }
        let index = self.manager.add_player(player);
        debug_assert_eq!(index, seat);
        index
    }

    fn grant_mana(&mut self, character: EntityId, amount: f64) {
        let Ok(Entity::Character(collector)) = self.world.entity(character) else {
            return;
        };
        let owner = collector.player;
        if let Some(player) = self.manager.players_mut().get_mut(owner) {
            player.mana = (player.mana + amount).min(MAX_MANA);
        }
    }

    fn maybe_drop_item(&mut self) {
        if self.rng.gen_range(0..ITEM_DROP_ODDS) != 0 {
            return;
        }
        let width = self.world.terrain().width();
        let x = self.rng.gen_range(10..width.saturating_sub(10).max(11));
        let y = surface_y(self.world.terrain(), x) - 4.0;
        let item = random_item(&mut self.rng, f64::from(x), y);
        info!(x, kind = ?item.kind(), "item dropped");
        self.world.spawn(item);
    }

    /// Host tick and turn info for a peer that just finished loading.
    fn turn_snapshot(&self) -> Message {
        Message::ActiveCharacter {
            player: self.manager.active_player() as u32,
            character: self
                .manager
                .players()
                .get(self.manager.active_player())
                .map(|p| p.active as u32)
                .unwrap_or(0),
            elements: self.manager.elements().to_vec(),
            turn_start: self.manager.turn_start().0,
        }
    }

    fn broadcast(&mut self, msg: &Message) {
        for peer in &mut self.peers {
            if peer.lost || peer.player.is_none() {
                continue;
            }
            if peer.connection.send(msg).is_err() {
                peer.lost = true;
            }
        }
    }

    fn broadcast_except(&mut self, skip: usize, msg: &Message) {
        for (index, peer) in self.peers.iter_mut().enumerate() {
            if index == skip || peer.lost || peer.player.is_none() {
                continue;
            }
            if peer.connection.send(msg).is_err() {
                peer.lost = true;
            }
        }
    }

    /// Send every seated peer a fresh roster snapshot with its you-flag set.
    fn broadcast_roster(&mut self) {
        let players: Vec<(usize, PlayerSnapshot)> = self
            .manager
            .players()
            .iter()
            .enumerate()
            .map(|(index, player)| {
                let characters = player
                    .characters
                    .iter()
                    .filter_map(|id| {
                        let entity = self.world.entity(*id).ok()?;
                        let Entity::Character(character) = entity else {
                            return None;
                        };
                        let (x, y) = character.body().precise_position();
                        Some(CharacterSnapshot {
                            id: *id,
                            name: character.name.clone(),
                            hp: character.hp,
                            x,
                            y,
                        })
                    })
                    .collect();
                (
                    index,
                    PlayerSnapshot {
                        name: player.name.clone(),
                        team: player.team.clone(),
                        color: player.color,
                        you: false,
                        selected_spell: player.selected_spell.map(|s| s as u32),
                        characters,
                    },
                )
            })
            .collect();

        let time = self.manager.now().0;
        for peer in &mut self.peers {
            let Some(seat) = peer.player else { continue };
            if peer.lost {
                continue;
            }
            let snapshot = Message::SyncPlayers {
                players: players
                    .iter()
                    .map(|(index, snapshot)| PlayerSnapshot {
                        you: *index == seat,
                        ..snapshot.clone()
                    })
                    .collect(),
                time,
            };
            if peer.connection.send(&snapshot).is_err() {
                peer.lost = true;
            }
        }
    }
}

/// First terrain cell from the top at column `x`.
fn surface_y(terrain: &CollisionMask, x: u32) -> f64 {
    let x = x.min(terrain.width().saturating_sub(1));
    for y in 0..terrain.height() {
        if terrain.get(x, y) {
            return f64::from(y);
        }
    }
    f64::from(terrain.height())
}
