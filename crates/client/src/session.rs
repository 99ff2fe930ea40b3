//! Follower session.
//!
//! A client simulates the same deterministic world locally and treats the
//! host as the source of truth: forwarded input and periodic corrections
//! keep it aligned, and every host-resolved event arrives as a message.
//! Anything the client cannot apply (unknown id, unreconstructible payload,
//! misaligned bulk update) is a desynchronization and fails the session
//! rather than being skipped.

use anyhow::{Context, Result};
use manastorm_collision::CollisionMask;
use manastorm_core::{EntityId, InputState, SimTick};
use manastorm_net::{
    ChannelEvent, DataChannel, JoinHandshake, JoinProgress, Message, PeerConnection,
    PlayerSnapshot,
};
use manastorm_sim::damage::DamageSource;
use manastorm_sim::entity::{Character, Entity};
use manastorm_sim::player::Player;
use manastorm_sim::{Manager, TurnConfig, TurnState, World};
use tracing::{debug, info, trace};

/// Local frames between forwarded `InputState` messages.
const INPUT_FORWARD_INTERVAL: u64 = 3;

/// A follower session bound to one host connection.
pub struct ClientSession {
    manager: Manager,
    world: World,
    connection: PeerConnection,
    handshake: Option<JoinHandshake>,
    /// Our roster seat, learned from the you-flag in `SyncPlayers`.
    self_seat: Option<usize>,
    /// Latest local controller state, forwarded on a cadence.
    local_input: InputState,
    /// Latest holder controller state, replicated by the host.
    holder_input: InputState,
    frame: u64,
    ready_sent: bool,
    focus: Option<EntityId>,
    notices: Vec<(String, String)>,
}

impl ClientSession {
    /// Start a session: the join handshake begins immediately against the
    /// supplied clock reading.
    pub fn new(
        channel: Box<dyn DataChannel>,
        terrain: CollisionMask,
        config: TurnConfig,
        name: impl Into<String>,
        team: impl Into<String>,
        now_ms: u64,
    ) -> Self {
        Self {
            manager: Manager::new(config),
            world: World::new_follower(terrain),
            connection: PeerConnection::new(channel),
            handshake: Some(JoinHandshake::new(now_ms, name, team)),
            self_seat: None,
            local_input: InputState::default(),
            holder_input: InputState::default(),
            frame: 0,
            ready_sent: false,
            focus: None,
            notices: Vec::new(),
        }
    }

    /// The turn machine mirror.
    pub fn manager(&self) -> &Manager {
        &self.manager
    }

    /// The locally simulated world.
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Whether the join handshake has completed.
    pub fn is_joined(&self) -> bool {
        self.handshake.is_none()
    }

    /// Our roster seat, once a snapshot carried the you-flag.
    pub fn self_seat(&self) -> Option<usize> {
        self.self_seat
    }

    /// Entity the rendering collaborator should follow.
    pub fn focus(&self) -> Option<EntityId> {
        self.focus
    }

    /// Take pending popup notices.
    pub fn take_notices(&mut self) -> Vec<(String, String)> {
        std::mem::take(&mut self.notices)
    }

    /// Feed the local controller state; forwarded on the next cadence frame.
    pub fn set_input(&mut self, input: InputState) {
        self.local_input = input.sanitized();
    }

    /// Select (or clear) a spell for our seat, informing the host.
    pub fn select_spell(&mut self, spell: Option<usize>) -> Result<()> {
        let Some(seat) = self.self_seat else {
            return Ok(());
        };
        self.manager.select_spell(seat, spell)?;
        self.connection.send(&Message::SelectSpell {
            spell: spell.map(|s| s as u32),
            player: seat as u32,
        })?;
        Ok(())
    }

    /// Advance the session by one render frame's worth of wall-clock time.
    pub fn frame(&mut self, elapsed_ms: u64, now_ms: u64) -> Result<()> {
        if let Some(handshake) = &mut self.handshake {
            match handshake.poll(&mut self.connection, now_ms)? {
                JoinProgress::Waiting => return Ok(()),
                JoinProgress::Joined => {
                    info!("joined host");
                    self.handshake = None;
                }
            }
        }

        while let Some(event) = self.connection.poll_event() {
            match event {
                ChannelEvent::Open => {}
                ChannelEvent::Closed => {
                    return Err(anyhow::anyhow!("host closed the channel"));
                }
                ChannelEvent::Error(reason) => {
                    return Err(anyhow::anyhow!("channel failed: {reason}"));
                }
            }
        }

        let steps = self.manager.accumulate(elapsed_ms);
        for _ in 0..steps {
            self.fixed_tick()?;
        }
        Ok(())
    }

    fn fixed_tick(&mut self) -> Result<()> {
        self.manager.begin_tick();

        // Inbound bytes queued by the channel apply at the start of the
        // tick, in the order the host produced them.
        while let Some(msg) = self.connection.try_recv()? {
            self.dispatch(msg)?;
        }

        let struck = self.world.apply_queued_damage();
        self.manager.note_struck(&struck);

        self.world.tick(1.0);

        // Locally produced events carry no authority on a follower.
        self.world.drain_events();
        self.manager.drain_events();

        if self.frame % INPUT_FORWARD_INTERVAL == 0 && self.ready_sent {
            self.connection.send(&Message::InputState {
                input: self.local_input,
            })?;
        }
        self.frame += 1;
        Ok(())
    }

    fn dispatch(&mut self, msg: Message) -> Result<()> {
        match msg {
            Message::SyncPlayers { players, time } => {
                self.install_roster(players)?;
                self.manager.sync_clock(SimTick(time));
                if !self.ready_sent {
                    self.connection.send(&Message::ClientReady)?;
                    self.ready_sent = true;
                }
            }
            Message::ActiveCharacter {
                player,
                character,
                elements,
                turn_start,
            } => {
                self.manager.install_turn(
                    player as usize,
                    character as usize,
                    &elements,
                    SimTick(turn_start),
                )?;
                self.holder_input = InputState::default();
            }
            Message::InputState { input } => {
                self.holder_input = input.sanitized();
                if let Some(active) = self.manager.active_character() {
                    if let Entity::Character(holder) = self.world.entity_mut(active)? {
                        holder.control(&self.holder_input);
                    }
                }
            }
            Message::ActiveUpdate { state } => {
                if let Some(active) = self.manager.active_character() {
                    self.world
                        .entity_mut(active)?
                        .deserialize(&state)
                        .context("active update payload")?;
                }
            }
            Message::EntityUpdate { states } => {
                self.world
                    .apply_entity_update(&states)
                    .context("bulk entity update")?;
            }
            Message::SyncDamage { kind, data } => {
                let source =
                    DamageSource::deserialize(kind, &data).context("damage payload")?;
                let active = self.manager.active_character();
                if let Some(active) = active {
                    if source.targets(&self.world).contains(&active) {
                        self.manager.set_turn_state(TurnState::Ending);
                    }
                }
                self.world.queue_replicated_damage(source);
            }
            Message::Spawn { kind, id, data } => {
                debug!(id, ?kind, "replicated spawn");
                self.world
                    .spawn_replicated(id, kind, &data)
                    .context("spawn payload")?;
            }
            Message::DynamicUpdate { id, data } => {
                self.world
                    .entity_mut(id)?
                    .deserialize(&data)
                    .context("dynamic update payload")?;
            }
            Message::Die { id } => {
                trace!(id, "replicated death");
                if self.manager.active_character() == Some(id) {
                    self.manager.set_turn_state(TurnState::Ending);
                }
                self.manager.note_death(id);
                self.world.kill(id)?;
            }
            Message::Focus { id } => {
                self.focus = Some(id);
            }
            Message::Popup { title, body } => {
                self.notices.push((title, body));
            }
            Message::SelectSpell { spell, player } => {
                self.manager
                    .select_spell(player as usize, spell.map(|s| s as usize))?;
            }
            // The host never authors these.
            Message::Join { .. } | Message::ClientReady => {
                return Err(anyhow::anyhow!("client-authored tag from host"));
            }
        }
        Ok(())
    }

    /// Apply a roster snapshot, installing players and characters we have
    /// not seen yet. Existing entries are matched by name, as the host only
    /// ever appends seats.
    fn install_roster(&mut self, players: Vec<PlayerSnapshot>) -> Result<()> {
        for (index, snapshot) in players.iter().enumerate() {
            if self
                .manager
                .players()
                .get(index)
                .is_some_and(|existing| existing.name == snapshot.name)
            {
                continue;
            }

            let mut player = Player::new(
                snapshot.name.clone(),
                snapshot.team.clone(),
                snapshot.color,
            );
            player.selected_spell = snapshot.selected_spell.map(|s| s as usize);
            if snapshot.you {
                self.self_seat = Some(index);
            }
            for character in &snapshot.characters {
                let mut wizard =
                    Character::new(index, character.name.clone(), character.x, character.y);
                wizard.hp = character.hp;
                self.world.install(character.id, Entity::Character(wizard));
                player.characters.push(character.id);
            }
            info!(seat = index, name = %snapshot.name, "roster entry installed");
            self.manager.players_mut().insert(index, player);
        }
        self.manager.players_mut().truncate(players.len());
        Ok(())
    }
}
