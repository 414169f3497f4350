//! Deterministic in-process world
//!
//! Implements `WorldLink` over a small voxel map with simple kinematics:
//! latched controls integrate at a fixed step, digs finish on a timer, items
//! drop and get picked up by proximity. Physics advance lazily whenever the
//! world is queried, using the tokio clock so paused-time tests drive it.
//!
//! Used by the demo binary and the integration suites; it is not a game.

use ahash::{AHashMap, AHashSet};
use glam::{IVec3, Vec3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::Mutex;
use tokio::sync::broadcast;
use tokio::time::{Duration, Instant};

use crate::core::error::{AgentError, Result};
use crate::core::types::{Entity, EntityId, EntityKind};
use crate::world::block;
use crate::world::block::Tool;
use crate::world::events::{event_bus, WorldEvent};
use crate::world::link::{AgentState, ControlState, WorldLink};

/// Fixed integration step
const STEP: Duration = Duration::from_millis(50);
/// Walking speed, blocks/second
const WALK_SPEED: f32 = 4.0;
/// Swim ascent speed, blocks/second
const SWIM_SPEED: f32 = 2.0;
/// How long a jump holds the agent up
const JUMP_AIR_TIME: Duration = Duration::from_millis(250);
/// Items within this radius are collected
const PICKUP_RADIUS: f32 = 1.2;
/// Minimum interval between environmental damage ticks
const ENV_DAMAGE_INTERVAL: Duration = Duration::from_millis(500);
/// Submersion grace period before drowning damage
const DROWN_GRACE: Duration = Duration::from_secs(3);

struct ActiveDig {
    position: IVec3,
    finish: Instant,
}

struct SimEntity {
    entity: Entity,
    health: f32,
}

struct SimInner {
    blocks: AHashMap<IVec3, String>,
    unloaded: AHashSet<IVec3>,
    entities: Vec<SimEntity>,
    agent: AgentState,
    control: ControlState,
    inventory: AHashMap<String, u32>,
    held: Option<Tool>,
    digs: Vec<ActiveDig>,
    jump_until: Option<Instant>,
    submerged_since: Option<Instant>,
    last_env_damage: Instant,
    last_step: Instant,
    connected: bool,
    hostiles_attack: bool,
    rng: ChaCha8Rng,
}

/// Deterministic simulated world session
pub struct SimWorld {
    inner: Mutex<SimInner>,
    events: broadcast::Sender<WorldEvent>,
}

impl SimWorld {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            inner: Mutex::new(SimInner {
                blocks: AHashMap::new(),
                unloaded: AHashSet::new(),
                entities: Vec::new(),
                agent: AgentState {
                    position: Vec3::new(0.5, 65.0, 0.5),
                    yaw: 0.0,
                    pitch: 0.0,
                    health: 20.0,
                    on_ground: true,
                    on_fire: false,
                },
                control: ControlState::default(),
                inventory: AHashMap::new(),
                held: None,
                digs: Vec::new(),
                jump_until: None,
                submerged_since: None,
                last_env_damage: now,
                last_step: now,
                connected: true,
                hostiles_attack: false,
                rng: ChaCha8Rng::seed_from_u64(7),
            }),
            events: event_bus(),
        }
    }

    /// Flat stone slab at `ground_y` covering a square of `half_extent`,
    /// agent standing on top at the origin
    pub fn flat(ground_y: i32, half_extent: i32) -> Self {
        let world = Self::new();
        {
            let mut inner = world.inner.lock().unwrap();
            for x in -half_extent..=half_extent {
                for z in -half_extent..=half_extent {
                    inner
                        .blocks
                        .insert(IVec3::new(x, ground_y, z), "stone".to_string());
                }
            }
            inner.agent.position = Vec3::new(0.5, (ground_y + 1) as f32, 0.5);
        }
        world
    }

    // === scenario builders ===

    pub fn set_block(&self, position: IVec3, name: &str) {
        self.inner
            .lock()
            .unwrap()
            .blocks
            .insert(position, name.to_string());
    }

    pub fn clear_block(&self, position: IVec3) {
        self.inner.lock().unwrap().blocks.remove(&position);
    }

    pub fn mark_unloaded(&self, position: IVec3) {
        self.inner.lock().unwrap().unloaded.insert(position);
    }

    pub fn set_agent_position(&self, position: Vec3) {
        self.inner.lock().unwrap().agent.position = position;
    }

    pub fn set_agent_look(&self, yaw: f32, pitch: f32) {
        let mut inner = self.inner.lock().unwrap();
        inner.agent.yaw = yaw;
        inner.agent.pitch = pitch;
    }

    pub fn give(&self, item: &str, count: u32) {
        *self
            .inner
            .lock()
            .unwrap()
            .inventory
            .entry(item.to_string())
            .or_insert(0) += count;
    }

    pub fn equip(&self, tool: Option<Tool>) {
        self.inner.lock().unwrap().held = tool;
    }

    pub fn set_health(&self, health: f32) {
        self.inner.lock().unwrap().agent.health = health;
    }

    pub fn set_on_fire(&self, on_fire: bool) {
        self.inner.lock().unwrap().agent.on_fire = on_fire;
    }

    pub fn set_hostiles_attack(&self, enabled: bool) {
        self.inner.lock().unwrap().hostiles_attack = enabled;
    }

    pub fn disconnect(&self) {
        self.inner.lock().unwrap().connected = false;
        let _ = self.events.send(WorldEvent::Disconnected);
    }

    pub fn spawn_entity(&self, name: &str, kind: EntityKind, position: Vec3) -> EntityId {
        let id = EntityId::new();
        let entity = Entity {
            id,
            kind,
            name: name.to_string(),
            position,
        };
        self.inner.lock().unwrap().entities.push(SimEntity {
            entity,
            health: 10.0,
        });
        let _ = self.events.send(WorldEvent::EntitySpawned {
            id,
            name: name.to_string(),
        });
        id
    }

    /// Inject external damage, as if struck by something the sim does not
    /// model itself
    pub fn damage_agent(&self, amount: f32) {
        let mut inner = self.inner.lock().unwrap();
        let previous = inner.agent.health;
        inner.agent.health -= amount;
        let current = inner.agent.health;
        drop(inner);
        let _ = self.events.send(WorldEvent::HealthChanged { previous, current });
        if current <= 0.0 {
            let _ = self.events.send(WorldEvent::Death);
        }
    }

    // === physics ===

    fn advance(&self) {
        let mut inner = self.inner.lock().unwrap();
        let now = Instant::now();
        let mut steps = 0;
        while now.duration_since(inner.last_step) >= STEP && steps < 20_000 {
            let at = inner.last_step + STEP;
            self.step(&mut inner, at);
            inner.last_step = at;
            steps += 1;
        }
    }

    fn step(&self, inner: &mut SimInner, now: Instant) {
        if !inner.connected {
            return;
        }
        let dt = STEP.as_secs_f32();

        self.finish_digs(inner, now);

        let feet = block_name(inner, feet_block(inner));
        let in_liquid = block::is_liquid(&feet);

        // Horizontal movement
        if inner.control.forward {
            let yaw = inner.agent.yaw;
            let dir = Vec3::new(-yaw.sin(), 0.0, yaw.cos());
            let candidate = inner.agent.position + dir * WALK_SPEED * dt;
            if self.passable(inner, candidate) {
                inner.agent.position = candidate;
            }
        }

        // Jumping and swimming
        if inner.control.jump {
            if in_liquid {
                let head = candidate_head(inner.agent.position);
                if !block::is_solid(&block_name(inner, head)) {
                    inner.agent.position.y += SWIM_SPEED * dt;
                }
            } else if inner.agent.on_ground {
                let above_head = feet_block(inner) + IVec3::new(0, 2, 0);
                if !block::is_solid(&block_name(inner, above_head)) {
                    inner.agent.position.y += 1.0;
                    inner.jump_until = Some(now + JUMP_AIR_TIME);
                    inner.agent.on_ground = false;
                }
            }
        }

        // Gravity: outside a jump window and out of liquid, snap to the
        // highest support below
        let airborne = inner.jump_until.map(|t| now < t).unwrap_or(false);
        if !airborne {
            inner.jump_until = None;
            let feet_now = block_name(inner, feet_block(inner));
            if !block::is_liquid(&feet_now) {
                if let Some(ground) = self.ground_below(inner) {
                    inner.agent.position.y = (ground + 1) as f32;
                    inner.agent.on_ground = true;
                }
            } else {
                inner.agent.on_ground = false;
            }
        }

        self.collect_items(inner);
        self.environmental_damage(inner, now);
        self.hostile_attacks(inner, now);
    }

    fn finish_digs(&self, inner: &mut SimInner, now: Instant) {
        let mut finished = Vec::new();
        inner.digs.retain(|dig| {
            if now >= dig.finish {
                finished.push(dig.position);
                false
            } else {
                true
            }
        });
        for position in finished {
            let Some(name) = inner.blocks.remove(&position) else {
                continue;
            };
            let _ = self.events.send(WorldEvent::BlockChanged {
                position,
                name: "air".to_string(),
            });
            // Drop the item with a little scatter
            let jitter = Vec3::new(
                inner.rng.gen_range(-0.3..0.3),
                0.0,
                inner.rng.gen_range(-0.3..0.3),
            );
            let drop_at = Vec3::new(
                position.x as f32 + 0.5,
                position.y as f32,
                position.z as f32 + 0.5,
            ) + jitter;
            let id = EntityId::new();
            inner.entities.push(SimEntity {
                entity: Entity {
                    id,
                    kind: EntityKind::Item,
                    name,
                    position: drop_at,
                },
                health: 1.0,
            });
        }
    }

    fn passable(&self, inner: &SimInner, position: Vec3) -> bool {
        let feet = IVec3::new(
            position.x.floor() as i32,
            position.y.floor() as i32,
            position.z.floor() as i32,
        );
        let head = feet + IVec3::new(0, 1, 0);
        !block::is_solid(&block_name(inner, feet)) && !block::is_solid(&block_name(inner, head))
    }

    fn ground_below(&self, inner: &SimInner) -> Option<i32> {
        let feet = feet_block(inner);
        for y in (feet.y - 64..=feet.y - 1).rev() {
            let name = block_name(inner, IVec3::new(feet.x, y, feet.z));
            if block::is_solid(&name) {
                return Some(y);
            }
        }
        None
    }

    fn collect_items(&self, inner: &mut SimInner) {
        let agent_pos = inner.agent.position;
        let mut collected = Vec::new();
        inner.entities.retain(|e| {
            if e.entity.kind == EntityKind::Item
                && e.entity.position.distance(agent_pos) <= PICKUP_RADIUS
            {
                collected.push(e.entity.name.clone());
                false
            } else {
                true
            }
        });
        for item in collected {
            *inner.inventory.entry(item.clone()).or_insert(0) += 1;
            let _ = self.events.send(WorldEvent::ItemPickup { item, count: 1 });
        }
    }

    fn environmental_damage(&self, inner: &mut SimInner, now: Instant) {
        let feet = block_name(inner, feet_block(inner));
        let head = block_name(inner, feet_block(inner) + IVec3::new(0, 1, 0));

        if head == "water" {
            if inner.submerged_since.is_none() {
                inner.submerged_since = Some(now);
            }
        } else {
            inner.submerged_since = None;
        }

        if now.duration_since(inner.last_env_damage) < ENV_DAMAGE_INTERVAL {
            return;
        }

        let drowning = inner
            .submerged_since
            .map(|t| now.duration_since(t) >= DROWN_GRACE)
            .unwrap_or(false);

        let damage = if feet == "lava" {
            Some(2.0)
        } else if inner.agent.on_fire {
            Some(1.0)
        } else if drowning {
            Some(1.0)
        } else if block::is_solid(&head) {
            Some(1.0) // suffocating in a wall
        } else {
            None
        };

        if let Some(amount) = damage {
            inner.last_env_damage = now;
            let previous = inner.agent.health;
            inner.agent.health -= amount;
            let current = inner.agent.health;
            let _ = self.events.send(WorldEvent::HealthChanged { previous, current });
            if current <= 0.0 {
                let _ = self.events.send(WorldEvent::Death);
            }
        }
    }

    fn hostile_attacks(&self, inner: &mut SimInner, now: Instant) {
        if !inner.hostiles_attack {
            return;
        }
        if now.duration_since(inner.last_env_damage) < ENV_DAMAGE_INTERVAL {
            return;
        }
        let agent_pos = inner.agent.position;
        let in_range = inner
            .entities
            .iter()
            .any(|e| e.entity.kind == EntityKind::Hostile && e.entity.position.distance(agent_pos) <= 3.0);
        if in_range {
            inner.last_env_damage = now;
            let previous = inner.agent.health;
            inner.agent.health -= 3.0;
            let current = inner.agent.health;
            let _ = self.events.send(WorldEvent::HealthChanged { previous, current });
        }
    }

    fn dig_duration(&self, name: &str) -> Option<Duration> {
        if name == "bedrock" {
            return None;
        }
        if block::is_instant_break(name) {
            Some(Duration::from_millis(50))
        } else if block::is_stone_family(name) || name.ends_with("_ore") {
            Some(Duration::from_millis(1_200))
        } else {
            Some(Duration::from_millis(400))
        }
    }
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}

fn feet_block(inner: &SimInner) -> IVec3 {
    let p = inner.agent.position;
    IVec3::new(p.x.floor() as i32, p.y.floor() as i32, p.z.floor() as i32)
}

fn candidate_head(position: Vec3) -> IVec3 {
    IVec3::new(
        position.x.floor() as i32,
        position.y.floor() as i32 + 1,
        position.z.floor() as i32,
    )
}

fn block_name(inner: &SimInner, position: IVec3) -> String {
    inner
        .blocks
        .get(&position)
        .cloned()
        .unwrap_or_else(|| "air".to_string())
}

impl WorldLink for SimWorld {
    fn connected(&self) -> bool {
        self.advance();
        self.inner.lock().unwrap().connected
    }

    fn agent(&self) -> AgentState {
        self.advance();
        self.inner.lock().unwrap().agent
    }

    fn block_at(&self, position: IVec3) -> Option<String> {
        self.advance();
        let inner = self.inner.lock().unwrap();
        if inner.unloaded.contains(&position) {
            return None;
        }
        Some(block_name(&inner, position))
    }

    fn sky_light(&self, position: IVec3) -> Option<u8> {
        self.advance();
        let inner = self.inner.lock().unwrap();
        if inner.unloaded.contains(&position) {
            return None;
        }
        let shaded = inner.blocks.iter().any(|(p, name)| {
            p.x == position.x && p.z == position.z && p.y > position.y && block::is_solid(name)
        });
        Some(if shaded { 0 } else { 15 })
    }

    fn entities(&self) -> Vec<Entity> {
        self.advance();
        self.inner
            .lock()
            .unwrap()
            .entities
            .iter()
            .map(|e| e.entity.clone())
            .collect()
    }

    fn inventory_count(&self, item: &str) -> u32 {
        self.advance();
        *self.inner.lock().unwrap().inventory.get(item).unwrap_or(&0)
    }

    fn placeable_count(&self) -> u32 {
        self.advance();
        self.inner
            .lock()
            .unwrap()
            .inventory
            .iter()
            .filter(|(name, _)| block::is_placeable(name))
            .map(|(_, count)| *count)
            .sum()
    }

    fn held_tool(&self) -> Option<Tool> {
        self.inner.lock().unwrap().held.clone()
    }

    fn set_look(&self, yaw: f32, pitch: f32) {
        self.advance();
        let mut inner = self.inner.lock().unwrap();
        inner.agent.yaw = yaw;
        inner.agent.pitch = pitch;
    }

    fn set_control(&self, control: ControlState) {
        self.advance();
        self.inner.lock().unwrap().control = control;
    }

    fn start_dig(&self, position: IVec3) -> Result<()> {
        self.advance();
        let mut inner = self.inner.lock().unwrap();
        if !inner.connected {
            return Err(AgentError::Disconnected);
        }
        let name = block_name(&inner, position);
        if block::is_air(&name) || block::is_liquid(&name) {
            return Err(AgentError::InvalidRequest(format!(
                "nothing to dig at {position}"
            )));
        }
        let Some(duration) = self.dig_duration(&name) else {
            return Err(AgentError::Blocked(format!("{name} cannot be dug")));
        };
        if !inner.digs.iter().any(|d| d.position == position) {
            let finish = Instant::now() + duration;
            inner.digs.push(ActiveDig { position, finish });
        }
        Ok(())
    }

    fn place_block(&self, position: IVec3) -> Result<()> {
        self.advance();
        let mut inner = self.inner.lock().unwrap();
        if !inner.connected {
            return Err(AgentError::Disconnected);
        }
        let current = block_name(&inner, position);
        if block::is_solid(&current) {
            return Err(AgentError::Blocked(format!("{position} is occupied")));
        }
        let mut names: Vec<String> = inner
            .inventory
            .iter()
            .filter(|(name, count)| block::is_placeable(name) && **count > 0)
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        let Some(item) = names.into_iter().next() else {
            return Err(AgentError::CapabilityMissing(
                "no placeable blocks in inventory".to_string(),
            ));
        };
        *inner.inventory.get_mut(&item).unwrap() -= 1;
        inner.blocks.insert(position, item.clone());
        let _ = self.events.send(WorldEvent::BlockChanged {
            position,
            name: item,
        });
        Ok(())
    }

    fn attack(&self, target: EntityId) -> Result<()> {
        self.advance();
        let mut inner = self.inner.lock().unwrap();
        if !inner.connected {
            return Err(AgentError::Disconnected);
        }
        let agent_pos = inner.agent.position;
        let Some(index) = inner.entities.iter().position(|e| e.entity.id == target) else {
            return Err(AgentError::Unreachable("entity is gone".to_string()));
        };
        if inner.entities[index].entity.position.distance(agent_pos) > 3.5 {
            return Err(AgentError::Unreachable("entity out of reach".to_string()));
        }
        inner.entities[index].health -= 4.0;
        if inner.entities[index].health <= 0.0 {
            inner.entities.remove(index);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<WorldEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{advance, Duration};

    #[tokio::test(start_paused = true)]
    async fn test_walk_forward_moves_agent() {
        let world = SimWorld::flat(63, 16);
        world.set_control(ControlState {
            forward: true,
            ..Default::default()
        });
        advance(Duration::from_secs(1)).await;
        let agent = world.agent();
        // Yaw 0 faces +Z
        assert!(agent.position.z > 2.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wall_blocks_walk() {
        let world = SimWorld::flat(63, 16);
        for y in 64..=66 {
            world.set_block(IVec3::new(0, y, 2), "stone");
            world.set_block(IVec3::new(-1, y, 2), "stone");
            world.set_block(IVec3::new(1, y, 2), "stone");
        }
        world.set_control(ControlState {
            forward: true,
            ..Default::default()
        });
        advance(Duration::from_secs(2)).await;
        assert!(world.agent().position.z < 2.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dig_removes_block_and_drops_item() {
        let world = SimWorld::flat(63, 16);
        let target = IVec3::new(2, 64, 0);
        world.set_block(target, "dirt");
        world.start_dig(target).unwrap();
        advance(Duration::from_secs(1)).await;
        assert_eq!(world.block_at(target).unwrap(), "air");
        assert!(world
            .entities()
            .iter()
            .any(|e| e.kind == EntityKind::Item && e.name == "dirt"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bedrock_cannot_be_dug() {
        let world = SimWorld::flat(63, 16);
        let target = IVec3::new(2, 64, 0);
        world.set_block(target, "bedrock");
        assert!(matches!(
            world.start_dig(target),
            Err(AgentError::Blocked(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sky_light_shaded_by_roof() {
        let world = SimWorld::flat(63, 16);
        world.set_block(IVec3::new(0, 70, 0), "stone");
        assert_eq!(world.sky_light(IVec3::new(0, 65, 0)), Some(0));
        assert_eq!(world.sky_light(IVec3::new(5, 65, 5)), Some(15));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unloaded_cell_reports_none() {
        let world = SimWorld::flat(63, 16);
        let cell = IVec3::new(3, 64, 3);
        world.mark_unloaded(cell);
        assert_eq!(world.block_at(cell), None);
        assert_eq!(world.sky_light(cell), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_jump_and_place_raises_ground() {
        let world = SimWorld::flat(63, 16);
        world.give("dirt", 5);
        let base = IVec3::new(0, 64, 0);
        world.set_control(ControlState {
            jump: true,
            ..Default::default()
        });
        advance(Duration::from_millis(100)).await;
        world.place_block(base).unwrap();
        world.set_control(ControlState::default());
        advance(Duration::from_millis(500)).await;
        assert!(world.agent().position.y >= 65.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lava_damages_agent() {
        let world = SimWorld::flat(63, 16);
        world.set_block(IVec3::new(0, 64, 0), "lava");
        let before = world.agent().health;
        advance(Duration::from_secs(3)).await;
        assert!(world.agent().health < before);
    }
}
