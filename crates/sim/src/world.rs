//! The live world: destructible terrain plus the entity registry.

use crate::damage::DamageSource;
use crate::entity::{Entity, Fate};
use crate::error::SimError;
use manastorm_collision::{CollisionMask, PhysicsBody};
use manastorm_core::{Element, EntityId, EntityKind, IdAllocator, StateVec};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::{debug, trace};

/// How far below the terrain an entity may fall before it is culled.
const KILL_PLANE_MARGIN: i32 = 40;

/// Something that happened in the world that collaborators or the
/// replication layer need to hear about. Drained once per fixed tick.
#[derive(Debug, Clone)]
pub enum WorldEvent {
    /// An entity was created locally and must be replicated.
    Spawned {
        /// Agreed id.
        id: EntityId,
        /// Wire tag.
        kind: EntityKind,
        /// Construction payload.
        data: StateVec,
    },
    /// An entity was removed.
    Died {
        /// The removed entity.
        id: EntityId,
    },
    /// A locally-resolved damage source must be replicated.
    Damage {
        /// The source to replay on followers.
        source: DamageSource,
    },
    /// Camera-follow hint for the rendering collaborator.
    Focus {
        /// Entity to follow.
        id: EntityId,
    },
    /// UI notification hint for the rendering collaborator.
    Popup {
        /// Headline.
        title: String,
        /// Detail line, possibly empty.
        body: String,
    },
    /// An entity concluded the acting player's turn (projectile resolved).
    EndTurn,
    /// A character collected a mana potion; the owning player's pool grows.
    ManaPickup {
        /// The collecting character.
        character: EntityId,
        /// Mana restored.
        amount: f64,
    },
    /// A character collected a scroll; the shared element pool grows.
    ElementPickup {
        /// Element the scroll empowers.
        element: Element,
        /// Level gained.
        amount: f64,
    },
}

/// Terrain and the id-addressed entity map.
///
/// Entity iteration always runs in id order (`BTreeMap`), which both peers
/// share, so bulk `EntityUpdate` messages can be index-aligned without
/// carrying ids.
#[derive(Debug)]
pub struct World {
    terrain: CollisionMask,
    entities: BTreeMap<EntityId, Entity>,
    /// Follower-side entities that died locally but whose removal has not
    /// been confirmed by a `Die` message. Kept in the map so bulk updates
    /// stay index-aligned with the host, but no longer ticked.
    inert: BTreeSet<EntityId>,
    allocator: IdAllocator,
    pending_damage: VecDeque<DamageSource>,
    events: Vec<WorldEvent>,
    /// Only the authoritative peer resolves damage; followers replay the
    /// host's `SyncDamage` messages instead of their own collisions.
    authoritative: bool,
}

impl World {
    /// Create the authoritative (host) world around a terrain mask.
    pub fn new(terrain: CollisionMask) -> Self {
        Self {
            terrain,
            entities: BTreeMap::new(),
            inert: BTreeSet::new(),
            allocator: IdAllocator::new(),
            pending_damage: VecDeque::new(),
            events: Vec::new(),
            authoritative: true,
        }
    }

    /// Create a follower world: locally simulated, but damage is only ever
    /// replayed from the host.
    pub fn new_follower(terrain: CollisionMask) -> Self {
        Self {
            authoritative: false,
            ..Self::new(terrain)
        }
    }

    /// The terrain mask.
    pub fn terrain(&self) -> &CollisionMask {
        &self.terrain
    }

    /// Mutable terrain access for crater carving.
    pub fn terrain_mut(&mut self) -> &mut CollisionMask {
        &mut self.terrain
    }

    /// Whether a y coordinate is beyond the kill plane.
    pub fn below_kill_plane(&self, y: i32) -> bool {
        y > self.terrain.height() as i32 + KILL_PLANE_MARGIN
    }

    /// The id allocator, exposed for id-agreement bookkeeping.
    pub fn allocator_mut(&mut self) -> &mut IdAllocator {
        &mut self.allocator
    }

    /// Spawn a locally-constructed entity, allocating its id and queueing
    /// the replication event.
    pub fn spawn(&mut self, entity: Entity) -> EntityId {
        let id = self.allocator.allocate();
        self.events.push(WorldEvent::Spawned {
            id,
            kind: entity.kind(),
            data: entity.serialize(),
        });
        debug!(id, kind = ?entity.kind(), "spawn");
        self.entities.insert(id, entity);
        id
    }

    /// Install an entity under a remotely-chosen id, advancing the local
    /// allocator past it so later local allocations cannot collide.
    pub fn install(&mut self, id: EntityId, entity: Entity) {
        self.allocator.set(id);
        let allocated = self.allocator.allocate();
        debug_assert_eq!(allocated, id);
        debug!(id, kind = ?entity.kind(), "install replicated entity");
        self.entities.insert(id, entity);
    }

    /// Reconstruct and install an entity from a `Spawn` message.
    pub fn spawn_replicated(
        &mut self,
        id: EntityId,
        kind: EntityKind,
        data: &[f64],
    ) -> Result<EntityId, SimError> {
        let entity = Entity::from_spawn(kind, data)?;
        self.install(id, entity);
        Ok(id)
    }

    /// Remove an entity outright (replicated `Die`, or host-side cleanup).
    pub fn kill(&mut self, id: EntityId) -> Result<(), SimError> {
        self.inert.remove(&id);
        self.entities
            .remove(&id)
            .map(|_| self.events.push(WorldEvent::Died { id }))
            .ok_or(SimError::UnknownEntity(id))
    }

    /// Look up an entity by id; absence is a desync.
    pub fn entity(&self, id: EntityId) -> Result<&Entity, SimError> {
        self.entities.get(&id).ok_or(SimError::UnknownEntity(id))
    }

    /// Mutable entity lookup; absence is a desync.
    pub fn entity_mut(&mut self, id: EntityId) -> Result<&mut Entity, SimError> {
        self.entities
            .get_mut(&id)
            .ok_or(SimError::UnknownEntity(id))
    }

    /// All live entities in id order.
    pub fn entities(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.entities.iter().map(|(id, entity)| (*id, entity))
    }

    /// Number of live entities.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Whether any spell projectile is still in flight.
    pub fn has_live_projectiles(&self) -> bool {
        self.entities.values().any(Entity::is_projectile)
    }

    /// The first character whose body overlaps `mask` placed at `(x, y)`.
    pub fn character_overlapping(
        &self,
        mask: &CollisionMask,
        x: i32,
        y: i32,
    ) -> Option<EntityId> {
        self.entities.iter().find_map(|(id, entity)| match entity {
            Entity::Character(character) => {
                let (cx, cy) = character.body().position();
                mask.collides_with(character.body().mask(), cx - x, cy - y)
                    .then_some(*id)
            }
            _ => None,
        })
    }

    /// Center x of an anchored (static-bodied) entity covered by `source`,
    /// if any.
    pub fn static_target_center(&self, source: &DamageSource) -> Option<f64> {
        self.entities.values().find_map(|entity| {
            if !entity.is_anchored() {
                return None;
            }
            let body = entity.body()?;
            source.covers(body).then(|| {
                let (x, _) = body.precise_position();
                x + f64::from(body.mask().width()) / 2.0
            })
        })
    }

    /// Restore hit points, capped at the base maximum.
    pub fn heal(&mut self, id: EntityId, amount: f64) {
        if let Some(Entity::Character(character)) = self.entities.get_mut(&id) {
            character.hp = (character.hp + amount).min(crate::entity::character::BASE_HP);
        }
    }

    /// Queue a damage source for the next resolution pass.
    ///
    /// On follower worlds this is a no-op: their local collisions carve
    /// terrain but damage only arrives through the host's `SyncDamage`.
    pub fn queue_damage(&mut self, source: DamageSource) {
        if !self.authoritative {
            return;
        }
        self.events.push(WorldEvent::Damage {
            source: source.clone(),
        });
        self.pending_damage.push_back(source);
    }

    /// Queue a damage source replayed from the host.
    pub fn queue_replicated_damage(&mut self, source: DamageSource) {
        self.pending_damage.push_back(source);
    }

    /// Number of damage sources awaiting resolution.
    pub fn queued_damage_len(&self) -> usize {
        self.pending_damage.len()
    }

    /// Resolve all queued damage. Runs at the start of the fixed tick,
    /// before physics integration. Returns every struck entity id.
    pub fn apply_queued_damage(&mut self) -> Vec<EntityId> {
        let mut struck = Vec::new();
        while let Some(source) = self.pending_damage.pop_front() {
            for id in source.targets(self) {
                if let Some(entity) = self.entities.get_mut(&id) {
                    if entity.apply_damage(source.damage()) {
                        trace!(id, damage = source.damage(), "entity struck");
                        struck.push(id);
                    }
                }
            }
        }
        struck
    }

    /// Advance every entity one fixed step, culling the dead. Returns the
    /// ids that died this tick.
    pub fn tick(&mut self, dt: f64) -> Vec<EntityId> {
        let ids: Vec<EntityId> = self.entities.keys().copied().collect();
        let mut died = Vec::new();

        for id in ids {
            if self.inert.contains(&id) {
                continue;
            }
            // The entity leaves the map while it runs so it can mutate the
            // world (terrain, damage queue, events) without aliasing.
            let Some(mut entity) = self.entities.remove(&id) else {
                continue;
            };
            match entity.tick(self, dt) {
                Fate::Alive => {
                    self.entities.insert(id, entity);
                }
                Fate::Dead if self.authoritative => {
                    debug!(id, kind = ?entity.kind(), "entity died");
                    self.events.push(WorldEvent::Died { id });
                    died.push(id);
                }
                Fate::Dead => {
                    // Removal is the host's call; hold the entity inert so
                    // bulk updates stay aligned until `Die` confirms it.
                    self.inert.insert(id);
                    self.entities.insert(id, entity);
                }
            }
        }
        died
    }

    /// Push a collaborator/replication event.
    pub fn push_event(&mut self, event: WorldEvent) {
        self.events.push(event);
    }

    /// Take all pending events, oldest first.
    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.events)
    }

    /// Serialized state of every entity, id order, for bulk `EntityUpdate`.
    pub fn syncable_states(&self) -> Vec<StateVec> {
        self.entities.values().map(Entity::serialize).collect()
    }

    /// Apply a bulk update, index-aligned to this peer's id-ordered entity
    /// list. A length mismatch is a desync.
    pub fn apply_entity_update(&mut self, states: &[StateVec]) -> Result<(), SimError> {
        if states.len() != self.entities.len() {
            return Err(SimError::UpdateMisaligned {
                expected: self.entities.len(),
                got: states.len(),
            });
        }
        for (entity, state) in self.entities.values_mut().zip(states) {
            entity.deserialize(state)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Character, Fireball, Potion, PotionKind};

    fn flat_terrain() -> CollisionMask {
        CollisionMask::from_fn(128, 128, |_, y| y >= 96)
    }

    #[test]
    fn spawn_assigns_sequential_ids_and_events() {
        let mut world = World::new(flat_terrain());
        let a = world.spawn(Entity::Character(Character::new(0, "a", 10.0, 80.0)));
        let b = world.spawn(Entity::Fireball(Fireball::new(20.0, 10.0)));
        assert_eq!((a, b), (0, 1));

        let events = world.drain_events();
        assert!(matches!(
            events[0],
            WorldEvent::Spawned {
                id: 0,
                kind: EntityKind::Character,
                ..
            }
        ));
        assert!(matches!(events[1], WorldEvent::Spawned { id: 1, .. }));
    }

    #[test]
    fn install_keeps_later_allocations_clear_of_remote_ids() {
        let mut world = World::new_follower(flat_terrain());
        world.install(5, Entity::Fireball(Fireball::new(0.0, 0.0)));
        let next = world.spawn(Entity::Fireball(Fireball::new(0.0, 0.0)));
        assert_eq!(next, 6);
    }

    #[test]
    fn unknown_entity_lookup_is_a_desync() {
        let world = World::new(flat_terrain());
        assert!(matches!(
            world.entity(99),
            Err(SimError::UnknownEntity(99))
        ));
    }

    #[test]
    fn queued_damage_strikes_characters_in_range() {
        let mut world = World::new(flat_terrain());
        let near = world.spawn(Entity::Character(Character::new(0, "near", 50.0, 90.0)));
        let far = world.spawn(Entity::Character(Character::new(1, "far", 120.0, 90.0)));

        world.queue_damage(DamageSource::Explosion {
            x: 52.0,
            y: 92.0,
            radius: 16.0,
            damage: 30.0,
        });
        let struck = world.apply_queued_damage();

        assert_eq!(struck, vec![near]);
        let hp = world.entity(near).unwrap().hp().unwrap();
        assert!(hp < 100.0);
        assert_eq!(world.entity(far).unwrap().hp(), Some(100.0));
    }

    #[test]
    fn follower_worlds_do_not_self_resolve_damage() {
        let mut world = World::new_follower(flat_terrain());
        world.queue_damage(DamageSource::Explosion {
            x: 0.0,
            y: 0.0,
            radius: 16.0,
            damage: 30.0,
        });
        assert_eq!(world.queued_damage_len(), 0);

        world.queue_replicated_damage(DamageSource::Explosion {
            x: 0.0,
            y: 0.0,
            radius: 16.0,
            damage: 30.0,
        });
        assert_eq!(world.queued_damage_len(), 1);
    }

    #[test]
    fn dead_entities_are_culled_with_events() {
        let mut world = World::new(flat_terrain());
        let id = world.spawn(Entity::Character(Character::new(0, "doomed", 50.0, 90.0)));
        world.drain_events();

        world.entity_mut(id).unwrap().apply_damage(1_000.0);
        let died = world.tick(1.0);

        assert_eq!(died, vec![id]);
        assert_eq!(world.entity_count(), 0);
        assert!(world
            .drain_events()
            .iter()
            .any(|event| matches!(event, WorldEvent::Died { id: died_id } if *died_id == id)));
    }

    #[test]
    fn follower_holds_local_deaths_until_confirmed() {
        let mut world = World::new_follower(flat_terrain());
        world.install(3, Entity::Character(Character::new(0, "doomed", 50.0, 90.0)));
        world.entity_mut(3).unwrap().apply_damage(1_000.0);

        let died = world.tick(1.0);
        assert!(died.is_empty());
        assert_eq!(world.entity_count(), 1, "stays aligned until Die arrives");

        world.kill(3).unwrap();
        assert_eq!(world.entity_count(), 0);
    }

    #[test]
    fn bulk_update_must_align() {
        let mut world = World::new(flat_terrain());
        world.spawn(Entity::Potion(Potion::new(30.0, 90.0, PotionKind::Mana)));
        let err = world.apply_entity_update(&[]).unwrap_err();
        assert!(matches!(
            err,
            SimError::UpdateMisaligned {
                expected: 1,
                got: 0
            }
        ));
    }

    #[test]
    fn item_pickup_routes_effects_through_events() {
        let mut world = World::new(flat_terrain());
        let character = world.spawn(Entity::Character(Character::new(0, "thirsty", 50.0, 91.0)));
        world.spawn(Entity::Potion(Potion::new(51.0, 92.0, PotionKind::Mana)));
        world.drain_events();

        world.tick(1.0);
        let events = world.drain_events();
        assert!(events.iter().any(|event| matches!(
            event,
            WorldEvent::ManaPickup { character: c, amount } if *c == character && *amount == 50.0
        )));
    }
}
