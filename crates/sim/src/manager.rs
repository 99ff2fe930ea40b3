//! Turn and element state machine.
//!
//! One `Manager` instance is owned by its session and passed explicitly to
//! whatever needs turn state. Exactly one character across all players holds
//! the turn at any moment; casting, damage to the turn holder and the turn
//! timer drive the `Ongoing -> Attacked -> Ending -> next turn` cycle.

use crate::entity::{Entity, Fireball, Sword};
use crate::error::SimError;
use crate::player::Player;
use crate::spell::{SpellEffect, SPELLS};
use crate::world::{World, WorldEvent};
use manastorm_collision::PhysicsBody;
use manastorm_core::{Element, EntityId, InputState, SimTick, TICK_MS};
use tracing::{debug, info};

/// Phase of the current turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    /// The turn holder may act.
    Ongoing,
    /// An attack is resolving; waiting for projectiles to settle.
    Attacked,
    /// The turn is concluding; the next holder is elected shortly.
    Ending,
}

/// Tunable turn-machine parameters, loaded from session config.
#[derive(Debug, Clone, Copy)]
pub struct TurnConfig {
    /// Ticks a holder may act before the turn is forced to end.
    pub turn_length: u64,
    /// Ticks spent in `Ending` before the next holder is elected.
    pub settle_delay: u64,
    /// Element level regenerated at each turn change.
    pub element_regen: f64,
    /// Upper clamp for every element level.
    pub max_element: f64,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            turn_length: 45_000 / TICK_MS,
            settle_delay: 1_500 / TICK_MS,
            element_regen: 0.3,
            max_element: 2.0,
        }
    }
}

/// Turn-machine outputs the owning session replicates or displays.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    /// A new holder took the turn. The host replicates this as
    /// `ActiveCharacter`.
    TurnStarted {
        /// Roster index of the holding player.
        player: usize,
        /// Index into that player's character list.
        character: usize,
        /// Element levels after regeneration, wire order.
        elements: Vec<f64>,
        /// Tick the turn began on.
        turn_start: SimTick,
    },
    /// The phase changed without a holder change.
    StateChanged(TurnState),
}

/// The shared turn and element state machine.
#[derive(Debug)]
pub struct Manager {
    config: TurnConfig,
    players: Vec<Player>,
    active_player: usize,
    turn_state: TurnState,
    turn_start: SimTick,
    settle_left: u64,
    /// Shared element pool, one level per `Element`, wire order.
    elements: [f64; Element::COUNT],
    now: SimTick,
    accumulator_ms: u64,
    events: Vec<TurnEvent>,
}

impl Manager {
    /// Create a machine with no players yet.
    pub fn new(config: TurnConfig) -> Self {
        Self {
            config,
            players: Vec::new(),
            active_player: 0,
            turn_state: TurnState::Ongoing,
            turn_start: SimTick::ZERO,
            settle_left: 0,
            elements: [1.0; Element::COUNT],
            now: SimTick::ZERO,
            accumulator_ms: 0,
            events: Vec::new(),
        }
    }

    /// The machine's configuration.
    pub fn config(&self) -> &TurnConfig {
        &self.config
    }

    /// Current fixed tick.
    pub fn now(&self) -> SimTick {
        self.now
    }

    /// Feed elapsed wall-clock time; returns how many fixed steps to run.
    ///
    /// Render frames arrive at a variable rate. Simulation only advances in
    /// whole `TICK_MS` steps, so leftovers carry to the next frame.
    pub fn accumulate(&mut self, elapsed_ms: u64) -> u64 {
        self.accumulator_ms += elapsed_ms;
        let steps = self.accumulator_ms / TICK_MS;
        self.accumulator_ms %= TICK_MS;
        steps
    }

    /// Begin one fixed step, advancing the tick counter.
    pub fn begin_tick(&mut self) -> SimTick {
        self.now = self.now.advance(1);
        self.now
    }

    /// Align the local tick counter with the host's.
    pub fn sync_clock(&mut self, tick: SimTick) {
        self.now = tick;
    }

    /// Add a player to the roster, returning its index.
    pub fn add_player(&mut self, player: Player) -> usize {
        self.players.push(player);
        self.players.len() - 1
    }

    /// The roster in join order.
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    /// Mutable roster access.
    pub fn players_mut(&mut self) -> &mut Vec<Player> {
        &mut self.players
    }

    /// A player by roster index.
    pub fn player(&self, index: usize) -> Result<&Player, SimError> {
        self.players.get(index).ok_or(SimError::UnknownPlayer(index))
    }

    /// Roster index of the player currently holding the turn.
    pub fn active_player(&self) -> usize {
        self.active_player
    }

    /// The character currently holding the turn, if any.
    pub fn active_character(&self) -> Option<EntityId> {
        self.players
            .get(self.active_player)
            .and_then(Player::active_character)
    }

    /// Current turn phase.
    pub fn turn_state(&self) -> TurnState {
        self.turn_state
    }

    /// Tick the current turn began on.
    pub fn turn_start(&self) -> SimTick {
        self.turn_start
    }

    /// Force a phase. Entering `Ending` arms the settle countdown.
    pub fn set_turn_state(&mut self, state: TurnState) {
        if self.turn_state == state {
            return;
        }
        debug!(?state, "turn state");
        if state == TurnState::Ending {
            self.settle_left = self.config.settle_delay;
        }
        self.turn_state = state;
        self.events.push(TurnEvent::StateChanged(state));
    }

    /// Current level of one element.
    pub fn element_value(&self, element: Element) -> f64 {
        self.elements[element as usize]
    }

    /// All element levels in wire order.
    pub fn elements(&self) -> &[f64; Element::COUNT] {
        &self.elements
    }

    /// Raise one element's level, clamped to the configured maximum.
    pub fn raise_element(&mut self, element: Element, amount: f64) {
        let level = &mut self.elements[element as usize];
        *level = (*level + amount).min(self.config.max_element);
    }

    /// Overwrite the element pool from a replicated `ActiveCharacter`.
    pub fn install_elements(&mut self, levels: &[f64]) -> Result<(), SimError> {
        if levels.len() != Element::COUNT {
            return Err(SimError::UpdateMisaligned {
                expected: Element::COUNT,
                got: levels.len(),
            });
        }
        self.elements.copy_from_slice(levels);
        Ok(())
    }

    /// Install a replicated holder change: new holder, new element levels,
    /// phase back to `Ongoing`.
    pub fn install_turn(
        &mut self,
        player: usize,
        character: usize,
        elements: &[f64],
        turn_start: SimTick,
    ) -> Result<(), SimError> {
        if player >= self.players.len() {
            return Err(SimError::UnknownPlayer(player));
        }
        self.install_elements(elements)?;
        self.active_player = player;
        self.players[player].active = character;
        self.turn_state = TurnState::Ongoing;
        self.turn_start = turn_start;
        Ok(())
    }

    /// Select (or clear) a spell for one player.
    pub fn select_spell(
        &mut self,
        player: usize,
        spell: Option<usize>,
    ) -> Result<(), SimError> {
        if let Some(index) = spell {
            if index >= SPELLS.len() {
                return Err(SimError::BadTag {
                    what: "spell index",
                    value: index as f64,
                });
            }
        }
        self.players
            .get_mut(player)
            .ok_or(SimError::UnknownPlayer(player))?
            .selected_spell = spell;
        Ok(())
    }

    /// Cast the turn holder's selected spell.
    ///
    /// Checks phase and element cost, deducts the cost, spawns the spell's
    /// effect through the world and applies the spell's turn transition.
    /// Returns false when nothing was cast (wrong phase, no selection, or
    /// the pool cannot cover the cost).
    pub fn cast_spell(&mut self, world: &mut World, input: &InputState) -> Result<bool, SimError> {
        if self.turn_state != TurnState::Ongoing {
            return Ok(false);
        }
        let player = self
            .players
            .get(self.active_player)
            .ok_or(SimError::UnknownPlayer(self.active_player))?;
        let Some(spell_index) = player.selected_spell else {
            return Ok(false);
        };
        let spell = &SPELLS[spell_index];
        if self.element_value(spell.element) < spell.cost {
            return Ok(false);
        }
        let Some(caster) = player.active_character() else {
            return Ok(false);
        };

        let (cx, cy) = {
            let body = world
                .entity(caster)?
                .body()
                .ok_or(SimError::UnknownEntity(caster))?;
            body.precise_position()
        };
        let input = input.sanitized();
        info!(spell = spell.name, caster, "cast");

        match spell.effect {
            SpellEffect::Fireball {
                x_offset,
                y_offset,
                speed,
            } => {
                let launch = speed * input.aim_power.max(0.2);
                let mut fireball = Fireball::new(
                    cx + x_offset * input.aim_direction.cos().signum(),
                    cy + y_offset,
                );
                fireball.body_mut().add_velocity(
                    input.aim_direction.cos() * launch,
                    input.aim_direction.sin() * launch,
                );
                let id = world.spawn(Entity::Fireball(fireball));
                world.push_event(WorldEvent::Focus { id });
            }
            SpellEffect::Skyfall { reach } => {
                let drop_x = cx + input.aim_direction.cos() * reach * input.aim_power;
                let sword = Sword::new(
                    drop_x,
                    0.0,
                    self.element_value(Element::Physical),
                    self.element_value(Element::Arcane),
                );
                let id = world.spawn(Entity::Sword(sword));
                world.push_event(WorldEvent::Focus { id });
            }
            SpellEffect::Melee { radius, damage } => {
                world.queue_damage(crate::damage::DamageSource::Explosion {
                    x: cx,
                    y: cy,
                    radius,
                    damage: damage * self.element_value(Element::Physical),
                });
            }
            SpellEffect::Gust { power } => {
                if let Some(body) = world.entity_mut(caster)?.body_mut() {
                    body.add_velocity(
                        input.aim_direction.cos() * power,
                        input.aim_direction.sin() * power,
                    );
                }
            }
        }

        self.elements[spell.element as usize] -= spell.cost;
        self.set_turn_state(spell.turn_state);
        Ok(true)
    }

    /// React to the struck-entity list from damage resolution: damage that
    /// reaches the turn holder ends the turn.
    pub fn note_struck(&mut self, struck: &[EntityId]) {
        if let Some(active) = self.active_character() {
            if struck.contains(&active) {
                self.set_turn_state(TurnState::Ending);
            }
        }
    }

    /// React to an entity's death: drop it from rosters, and end the turn
    /// if it held it.
    pub fn note_death(&mut self, id: EntityId) {
        let held_turn = self.active_character() == Some(id);
        for player in &mut self.players {
            player.remove_character(id);
        }
        if held_turn {
            self.set_turn_state(TurnState::Ending);
        }
    }

    /// Advance the turn machine one fixed step. Runs after the world tick.
    pub fn advance_turn(&mut self, world: &World) {
        match self.turn_state {
            TurnState::Ongoing => {
                let deadline = self.turn_start.advance(self.config.turn_length);
                if self.now >= deadline {
                    self.set_turn_state(TurnState::Ending);
                }
            }
            TurnState::Attacked => {
                if !world.has_live_projectiles() {
                    self.set_turn_state(TurnState::Ending);
                }
            }
            TurnState::Ending => {
                if self.settle_left > 0 {
                    self.settle_left -= 1;
                } else {
                    self.next_turn();
                }
            }
        }
    }

    /// Elect the next holder: fixed round-robin across players, then across
    /// each player's characters, regenerating elements.
    pub fn next_turn(&mut self) {
        if self.players.iter().all(|player| player.characters.is_empty()) {
            return;
        }
        // The next player with anyone left to field.
        loop {
            self.active_player = (self.active_player + 1) % self.players.len();
            if !self.players[self.active_player].characters.is_empty() {
                break;
            }
        }
        let player = &mut self.players[self.active_player];
        player.active = (player.active + 1) % player.characters.len();
        let character = player.active;

        for element in Element::ALL {
            self.raise_element(element, self.config.element_regen);
        }
        self.turn_state = TurnState::Ongoing;
        self.turn_start = self.now;
        info!(player = self.active_player, character, "next turn");
        self.events.push(TurnEvent::TurnStarted {
            player: self.active_player,
            character,
            elements: self.elements.to_vec(),
            turn_start: self.turn_start,
        });
    }

    /// Take all pending turn events, oldest first.
    pub fn drain_events(&mut self) -> Vec<TurnEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Character;
    use manastorm_collision::CollisionMask;

    fn two_player_match() -> (Manager, World) {
        let terrain = CollisionMask::from_fn(128, 128, |_, y| y >= 96);
        let mut world = World::new(terrain);
        let mut manager = Manager::new(TurnConfig::default());

        for (index, name) in ["merlin", "morgana"].iter().enumerate() {
            let id = world.spawn(Entity::Character(Character::new(
                index,
                *name,
                20.0 + 60.0 * index as f64,
                90.0,
            )));
            let mut player = Player::new(*name, "solo", 0xffffff);
            player.characters.push(id);
            manager.add_player(player);
        }
        world.drain_events();
        (manager, world)
    }

    #[test]
    fn accumulator_yields_whole_steps_and_keeps_the_remainder() {
        let mut manager = Manager::new(TurnConfig::default());
        assert_eq!(manager.accumulate(30), 0);
        assert_eq!(manager.accumulate(30), 1);
        assert_eq!(manager.accumulate(140), 3);
    }

    #[test]
    fn casting_deducts_cost_and_transitions() {
        let (mut manager, mut world) = two_player_match();
        manager.select_spell(0, Some(1)).unwrap();

        let before = manager.element_value(Element::Elemental);
        let cast = manager.cast_spell(&mut world, &InputState::default()).unwrap();

        assert!(cast);
        assert_eq!(manager.element_value(Element::Elemental), before - 0.3);
        assert_eq!(manager.turn_state(), TurnState::Attacked);
        assert!(world.has_live_projectiles());
    }

    #[test]
    fn depleted_element_pool_refuses_the_cast() {
        let (mut manager, mut world) = two_player_match();
        manager.select_spell(0, Some(1)).unwrap();
        manager.elements[Element::Elemental as usize] = 0.1;

        let cast = manager.cast_spell(&mut world, &InputState::default()).unwrap();
        assert!(!cast);
        assert_eq!(manager.turn_state(), TurnState::Ongoing);
    }

    #[test]
    fn turn_cycle_reaches_a_new_holder() {
        let (mut manager, mut world) = two_player_match();
        manager.select_spell(0, Some(0)).unwrap();
        let first_holder = manager.active_character().unwrap();

        // Melee ends the turn directly.
        manager.cast_spell(&mut world, &InputState::default()).unwrap();
        assert_eq!(manager.turn_state(), TurnState::Ending);

        let mut guard = 0;
        while manager.turn_state() != TurnState::Ongoing || manager.active_character() == Some(first_holder) {
            manager.begin_tick();
            manager.advance_turn(&world);
            guard += 1;
            assert!(guard < 1_000, "turn cycle must close");
        }
        assert_ne!(manager.active_character(), Some(first_holder));
        assert!(manager
            .drain_events()
            .iter()
            .any(|event| matches!(event, TurnEvent::TurnStarted { player: 1, .. })));
    }

    #[test]
    fn attacked_holds_until_projectiles_settle() {
        let (mut manager, mut world) = two_player_match();
        manager.select_spell(0, Some(1)).unwrap();
        manager.cast_spell(&mut world, &InputState::default()).unwrap();

        manager.begin_tick();
        manager.advance_turn(&world);
        assert_eq!(manager.turn_state(), TurnState::Attacked);

        // Let the fireball resolve; its final contact ends the flight.
        let mut guard = 0;
        while world.has_live_projectiles() {
            world.tick(1.0);
            guard += 1;
            assert!(guard < 2_000, "fireball must settle");
        }
        manager.advance_turn(&world);
        assert_eq!(manager.turn_state(), TurnState::Ending);
    }

    #[test]
    fn damage_to_the_holder_ends_the_turn() {
        let (mut manager, _world) = two_player_match();
        let holder = manager.active_character().unwrap();
        manager.note_struck(&[holder]);
        assert_eq!(manager.turn_state(), TurnState::Ending);
    }

    #[test]
    fn death_of_the_holder_clears_the_slot() {
        let (mut manager, _world) = two_player_match();
        let holder = manager.active_character().unwrap();
        manager.note_death(holder);
        assert_eq!(manager.turn_state(), TurnState::Ending);
        assert!(manager.players()[0].characters.is_empty());
    }

    #[test]
    fn element_regen_is_clamped() {
        let (mut manager, _world) = two_player_match();
        for _ in 0..20 {
            manager.next_turn();
        }
        for element in Element::ALL {
            assert!(manager.element_value(element) <= manager.config().max_element);
        }
    }

    #[test]
    fn replicated_turn_install_rejects_bad_rosters() {
        let (mut manager, _world) = two_player_match();
        let err = manager.install_turn(9, 0, &[1.0; 4], SimTick::ZERO).unwrap_err();
        assert!(matches!(err, SimError::UnknownPlayer(9)));
        assert!(manager.install_elements(&[1.0; 3]).is_err());
    }
}
