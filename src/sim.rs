//! Entity simulation: player kinematics, enemy patrols, fireballs.
//!
//! Everything is integrated with the frame's delta time, and the fire
//! cooldown runs on the simulation clock rather than wall-clock time.

use crate::camera::Camera;
use crate::config::{CombatConfig, EngineConfig, MovementConfig, PatrolConfig};
use crate::error::{Error, Result};
use crate::input::{Key, KeysHeld};
use crate::physics::{Circle, Vec2};
use crate::textures::SpriteSkin;
use crate::world::GridMap;

/// Things that happened during a tick that other subsystems react to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimEvent {
    Shot,
    EnemyHit { enemy: usize },
}

/// Cyclic list of points an enemy walks between.
#[derive(Clone, Debug, PartialEq)]
pub struct PatrolRoute {
    pub waypoints: Vec<Vec2>,
}

impl PatrolRoute {
    pub fn new(waypoints: Vec<Vec2>) -> Self {
        Self { waypoints }
    }

    /// Loop around the arena, clear of the central block.
    pub fn perimeter() -> Self {
        Self::new(vec![
            Vec2::new(6.5, 3.5),
            Vec2::new(12.5, 3.5),
            Vec2::new(12.5, 6.5),
            Vec2::new(12.5, 8.5),
            Vec2::new(12.5, 12.5),
            Vec2::new(3.5, 12.5),
            Vec2::new(3.5, 8.5),
            Vec2::new(3.5, 6.5),
            Vec2::new(3.5, 3.5),
        ])
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Enemy {
    pub pos: Vec2,
    /// Index into the simulation's routes.
    pub route: usize,
    /// Index of the waypoint currently walked toward.
    pub waypoint: usize,
    /// Seconds left showing the damage tint.
    pub hit_timer: f64,
    pub skin: Option<SpriteSkin>,
}

impl Enemy {
    pub fn new(pos: Vec2, route: usize) -> Self {
        Self {
            pos,
            route,
            waypoint: 0,
            hit_timer: 0.0,
            skin: None,
        }
    }

    pub fn is_flashing(&self) -> bool {
        self.hit_timer > 0.0
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Projectile {
    pub origin: Vec2,
    pub pos: Vec2,
    pub vel: Vec2,
    pub age: f64,
    pub max_age: f64,
    pub alive: bool,
}

impl Projectile {
    pub fn distance_travelled(&self) -> f64 {
        self.pos.distance_to(&self.origin)
    }
}

pub struct Simulation {
    map: GridMap,
    pub camera: Camera,
    pub enemies: Vec<Enemy>,
    pub projectiles: Vec<Projectile>,
    routes: Vec<PatrolRoute>,
    clock: f64,
    last_shot: Option<f64>,
    movement: MovementConfig,
    combat: CombatConfig,
    patrol: PatrolConfig,
}

impl Simulation {
    /// The shipped scene: arena map, player at (3.5, 3.5) facing east, one
    /// enemy on the perimeter route.
    pub fn new(config: &EngineConfig) -> Self {
        let mut sim = Self::with_map(
            GridMap::arena(),
            Camera::new(Vec2::new(3.5, 3.5), Vec2::new(1.0, 0.0)),
            config,
        );
        let route = sim.add_route(PatrolRoute::perimeter());
        // (6.5, 3.5) is open floor in the arena
        sim.enemies.push(Enemy::new(Vec2::new(6.5, 3.5), route));
        sim
    }

    /// Empty scene on `map`, no routes or enemies.
    pub fn with_map(map: GridMap, camera: Camera, config: &EngineConfig) -> Self {
        Self {
            map,
            camera,
            enemies: Vec::new(),
            projectiles: Vec::with_capacity(16),
            routes: Vec::new(),
            clock: 0.0,
            last_shot: None,
            movement: config.movement.clone(),
            combat: config.combat.clone(),
            patrol: config.patrol.clone(),
        }
    }

    pub fn add_route(&mut self, route: PatrolRoute) -> usize {
        self.routes.push(route);
        self.routes.len() - 1
    }

    pub fn spawn_enemy(&mut self, pos: Vec2, route: usize) -> Result<usize> {
        if !self.map.is_walkable(pos.x, pos.y) {
            return Err(Error::Map(format!("enemy spawn {:?} is inside a wall", pos)));
        }
        if route >= self.routes.len() {
            return Err(Error::Map(format!("unknown patrol route {}", route)));
        }
        self.enemies.push(Enemy::new(pos, route));
        Ok(self.enemies.len() - 1)
    }

    pub fn set_enemy_skin(&mut self, skin: SpriteSkin) {
        for enemy in &mut self.enemies {
            enemy.skin = Some(skin);
        }
    }

    pub fn map(&self) -> &GridMap {
        &self.map
    }

    /// Seconds of simulated time since the session started.
    pub fn clock(&self) -> f64 {
        self.clock
    }

    /// Advances everything by `dt` seconds using the keys held right now.
    pub fn step(&mut self, dt: f64, keys: &KeysHeld) -> Vec<SimEvent> {
        let mut events = Vec::new();
        let dt = dt.max(0.0);
        self.clock += dt;
        for enemy in &mut self.enemies {
            enemy.hit_timer = (enemy.hit_timer - dt).max(0.0);
        }
        self.move_player(dt, keys);
        self.update_enemies(dt);
        self.update_projectiles(dt, &mut events);
        events
    }

    /// Spawns a fireball unless the cooldown is still running.
    pub fn try_fire(&mut self) -> Option<SimEvent> {
        if let Some(last) = self.last_shot {
            if self.clock - last < self.combat.fire_cooldown {
                return None;
            }
        }
        self.last_shot = Some(self.clock);

        let cam = &self.camera;
        // spawn a little ahead so the shot does not start inside the player
        let origin = cam.pos.add(&cam.dir.scale(self.combat.spawn_offset));
        self.projectiles.push(Projectile {
            origin,
            pos: origin,
            vel: cam.dir.scale(self.combat.fire_speed),
            age: 0.0,
            max_age: self.combat.projectile_ttl,
            alive: true,
        });
        Some(SimEvent::Shot)
    }

    fn move_player(&mut self, dt: f64, keys: &KeysHeld) {
        let running = keys.is_down(Key::Run);
        let m = &self.movement;
        let speed = if running { m.run_speed } else { m.walk_speed } * dt;
        let turn = if running { m.run_turn_speed } else { m.turn_speed } * dt;

        let forward = self.camera.dir;
        let left = self.camera.left();
        let moves = [
            (Key::Forward, forward),
            (Key::Back, forward.scale(-1.0)),
            (Key::StrafeLeft, left),
            (Key::StrafeRight, left.scale(-1.0)),
        ];
        for (key, dir) in moves {
            if keys.is_down(key) {
                self.camera.pos = slide(&self.map, self.camera.pos, dir.scale(speed));
            }
        }

        if keys.is_down(Key::TurnLeft) {
            self.camera.rotate(-turn);
        }
        if keys.is_down(Key::TurnRight) {
            self.camera.rotate(turn);
        }
    }

    fn update_enemies(&mut self, dt: f64) {
        let speed = self.patrol.speed * dt;
        let epsilon = self.patrol.arrive_epsilon;
        for enemy in &mut self.enemies {
            if let Some(route) = self.routes.get(enemy.route) {
                patrol(&self.map, enemy, route, speed, epsilon);
            }
        }
    }

    fn update_projectiles(&mut self, dt: f64, events: &mut Vec<SimEvent>) {
        let reach = self.combat.enemy_radius;
        let radius = self.combat.projectile_radius;
        let hit_flash = self.combat.hit_flash;

        for proj in &mut self.projectiles {
            if !proj.alive {
                continue;
            }
            proj.age += dt;
            if proj.age > proj.max_age {
                proj.alive = false;
                continue;
            }
            let next = proj.pos.add(&proj.vel.scale(dt));
            if !self.map.is_walkable(next.x, next.y) {
                proj.alive = false;
                continue;
            }
            proj.pos = next;

            let shot = Circle::new(proj.pos, radius);
            for (i, enemy) in self.enemies.iter_mut().enumerate() {
                if Circle::new(enemy.pos, reach).intersects_circle(&shot) {
                    proj.alive = false;
                    enemy.hit_timer = hit_flash;
                    events.push(SimEvent::EnemyHit { enemy: i });
                    break;
                }
            }
        }
        self.projectiles.retain(|p| p.alive);
    }
}

/// Applies `delta` one axis at a time so a blocked axis doesn't cancel the
/// other (wall sliding).
fn slide(map: &GridMap, pos: Vec2, delta: Vec2) -> Vec2 {
    let mut out = pos;
    if map.is_walkable(pos.x + delta.x, out.y) {
        out.x += delta.x;
    }
    if map.is_walkable(out.x, pos.y + delta.y) {
        out.y += delta.y;
    }
    out
}

/// One patrol tick. Arrival advances the cyclic waypoint index and ends the
/// tick. When the straight move is blocked, tries each axis alone; when
/// neither axis makes progress, gives up on the waypoint. That last step is
/// a heuristic: it avoids a permanent stall but does not guarantee the
/// enemy ever reaches a badly placed waypoint.
fn patrol(map: &GridMap, enemy: &mut Enemy, route: &PatrolRoute, step: f64, epsilon: f64) {
    let count = route.waypoints.len();
    if count == 0 {
        return;
    }
    let target = route.waypoints[enemy.waypoint % count];
    let to_target = target.sub(&enemy.pos);
    let dist = to_target.length();
    if dist < epsilon {
        enemy.waypoint = (enemy.waypoint + 1) % count;
        return;
    }

    let next = enemy.pos.add(&to_target.scale(step.min(dist) / dist));
    let pos = enemy.pos;
    if map.is_walkable(next.x, next.y) {
        enemy.pos = next;
    } else if next.x != pos.x && map.is_walkable(next.x, pos.y) {
        enemy.pos.x = next.x;
    } else if next.y != pos.y && map.is_walkable(pos.x, next.y) {
        enemy.pos.y = next.y;
    } else {
        enemy.waypoint = (enemy.waypoint + 1) % count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_sim() -> Simulation {
        Simulation::with_map(
            GridMap::bordered(16, 16),
            Camera::new(Vec2::new(3.5, 3.5), Vec2::new(1.0, 0.0)),
            &EngineConfig::default(),
        )
    }

    fn idle() -> KeysHeld {
        KeysHeld::new()
    }

    #[test]
    fn test_fire_spawns_one_projectile_east() {
        let mut sim = open_sim();
        assert_eq!(sim.try_fire(), Some(SimEvent::Shot));
        assert_eq!(sim.projectiles.len(), 1);
        let p = &sim.projectiles[0];
        assert!(p.vel.approx_eq(&Vec2::new(6.0, 0.0), 1e-12));
        assert!(p.pos.approx_eq(&Vec2::new(3.9, 3.5), 1e-12));

        for _ in 0..10 {
            sim.step(0.1, &idle());
        }
        assert_eq!(sim.projectiles.len(), 1);
        let p = &sim.projectiles[0];
        assert!((p.distance_travelled() - 6.0).abs() < 1e-9);
        assert!((p.pos.x - 9.9).abs() < 1e-9);
        assert!((p.pos.y - 3.5).abs() < 1e-12);
    }

    #[test]
    fn test_fire_in_arena_hits_patrolling_enemy() {
        let mut sim = Simulation::new(&EngineConfig::default());
        sim.try_fire();
        let mut hits = Vec::new();
        for _ in 0..10 {
            hits.extend(sim.step(0.1, &idle()));
        }
        assert_eq!(hits, vec![SimEvent::EnemyHit { enemy: 0 }]);
        assert!(sim.projectiles.is_empty());

        // stationary target right in front of the muzzle
        let mut sim = Simulation::new(&EngineConfig::default());
        sim.enemies[0].pos = Vec2::new(5.0, 3.5);
        sim.routes[0] = PatrolRoute::new(vec![Vec2::new(5.0, 3.5)]);
        sim.try_fire();
        let events = sim.step(0.1, &idle());
        assert_eq!(events, vec![SimEvent::EnemyHit { enemy: 0 }]);
        assert!((sim.enemies[0].hit_timer - 0.15).abs() < 1e-12);
        assert!(sim.enemies[0].is_flashing());
        sim.step(0.1, &idle());
        sim.step(0.1, &idle());
        assert!(!sim.enemies[0].is_flashing());
    }

    #[test]
    fn test_cooldown_limits_rate() {
        let mut sim = open_sim();
        assert!(sim.try_fire().is_some());
        sim.step(0.1, &idle());
        assert!(sim.try_fire().is_none());
        assert_eq!(sim.projectiles.len(), 1);
        sim.step(0.2, &idle());
        assert!(sim.try_fire().is_some());
        assert_eq!(sim.projectiles.len(), 2);
    }

    #[test]
    fn test_projectile_dies_on_wall() {
        let mut sim = open_sim();
        sim.try_fire();
        // wall at x = 15 is 11.1 units away; TTL would allow 12
        let mut steps = 0;
        while !sim.projectiles.is_empty() {
            sim.step(0.1, &idle());
            steps += 1;
            assert!(steps < 100);
        }
        assert_eq!(steps, 19);
    }

    #[test]
    fn test_projectile_travel_bounded_by_ttl() {
        let config = EngineConfig::default();
        let bound = config.combat.fire_speed * config.combat.projectile_ttl;
        let dts = [0.016, 0.05, 0.033, 0.1, 0.007];
        for k in 0..16 {
            let angle = k as f64 * std::f64::consts::TAU / 16.0;
            let mut sim = Simulation::with_map(
                GridMap::bordered(64, 64),
                Camera::new(Vec2::new(32.0, 32.0), Vec2::new(angle.cos(), angle.sin())),
                &config,
            );
            sim.try_fire();
            let mut last_travel = 0.0;
            let mut i = 0;
            while let Some(p) = sim.projectiles.first() {
                last_travel = p.distance_travelled();
                assert!(last_travel <= bound + 1e-9);
                sim.step(dts[i % dts.len()], &idle());
                i += 1;
            }
            assert!(last_travel > bound * 0.9);
        }
    }

    #[test]
    fn test_patrol_wraps_to_first_waypoint() {
        let mut sim = open_sim();
        let route = sim.add_route(PatrolRoute::new(vec![
            Vec2::new(6.5, 3.5),
            Vec2::new(12.5, 3.5),
        ]));
        sim.spawn_enemy(Vec2::new(6.5, 3.5), route).unwrap();

        // on the first waypoint already: the first tick targets the second
        sim.step(0.05, &idle());
        assert_eq!(sim.enemies[0].waypoint, 1);

        let second = Vec2::new(12.5, 3.5);
        let mut ticks = 0;
        while sim.enemies[0].pos.distance_to(&second) >= 0.05 {
            sim.step(0.05, &idle());
            assert_eq!(sim.enemies[0].waypoint, 1);
            ticks += 1;
            assert!(ticks < 1000);
        }
        sim.step(0.05, &idle());
        assert_eq!(sim.enemies[0].waypoint, 0);

        let x_before = sim.enemies[0].pos.x;
        sim.step(0.05, &idle());
        assert!(sim.enemies[0].pos.x < x_before);
    }

    #[test]
    fn test_enemy_never_enters_walls() {
        let mut sim = Simulation::new(&EngineConfig::default());
        let dts = [0.016, 0.05, 0.033, 0.021];
        for i in 0..5000 {
            sim.step(dts[i % dts.len()], &idle());
            let p = sim.enemies[0].pos;
            assert!(sim.map().is_walkable(p.x, p.y), "tick {} at {:?}", i, p);
        }
    }

    #[test]
    fn test_blocked_enemy_skips_waypoint() {
        let mut sim = Simulation::with_map(
            GridMap::arena(),
            Camera::new(Vec2::new(3.5, 3.5), Vec2::new(1.0, 0.0)),
            &EngineConfig::default(),
        );
        // second waypoint sits inside the walled block
        let route = sim.add_route(PatrolRoute::new(vec![
            Vec2::new(3.5, 7.5),
            Vec2::new(7.5, 7.5),
        ]));
        sim.spawn_enemy(Vec2::new(3.5, 7.5), route).unwrap();
        sim.step(0.05, &idle());
        assert_eq!(sim.enemies[0].waypoint, 1);
        let mut ticks = 0;
        while sim.enemies[0].waypoint == 1 {
            sim.step(0.05, &idle());
            assert!(sim.enemies[0].pos.x < 5.0);
            ticks += 1;
            assert!(ticks < 1000, "enemy stalled against the wall");
        }
        assert_eq!(sim.enemies[0].waypoint, 0);
    }

    #[test]
    fn test_spawn_rejects_walls_and_unknown_routes() {
        let mut sim = open_sim();
        let route = sim.add_route(PatrolRoute::new(vec![]));
        assert!(sim.spawn_enemy(Vec2::new(0.5, 0.5), route).is_err());
        assert!(sim.spawn_enemy(Vec2::new(2.5, 2.5), route + 1).is_err());
        assert!(sim.spawn_enemy(Vec2::new(2.5, 2.5), route).is_ok());
        // empty route: stays put
        sim.step(0.05, &idle());
        assert_eq!(sim.enemies[0].pos, Vec2::new(2.5, 2.5));
    }

    #[test]
    fn test_player_moves_and_slides() {
        let mut sim = open_sim();
        let mut keys = KeysHeld::new();
        keys.press(Key::Forward);
        sim.step(0.1, &keys);
        assert!((sim.camera.pos.x - 3.75).abs() < 1e-12);

        keys.press(Key::Run);
        sim.step(0.1, &keys);
        assert!((sim.camera.pos.x - 4.15).abs() < 1e-12);

        // strafe left moves toward -y when facing east
        let mut keys = KeysHeld::new();
        keys.press(Key::StrafeLeft);
        sim.step(0.1, &keys);
        assert!((sim.camera.pos.y - 3.25).abs() < 1e-12);

        // push diagonally into the north wall: y blocked, x keeps going
        sim.camera = Camera::new(Vec2::new(5.0, 1.1), Vec2::new(1.0, -1.0).scale(1.0 / 2f64.sqrt()));
        let mut keys = KeysHeld::new();
        keys.press(Key::Forward);
        for _ in 0..10 {
            sim.step(0.05, &keys);
        }
        assert!(sim.camera.pos.x > 5.5);
        assert!(sim.map().is_walkable(sim.camera.pos.x, sim.camera.pos.y));
    }

    #[test]
    fn test_player_turns_faster_when_running() {
        let mut sim = open_sim();
        let mut keys = KeysHeld::new();
        keys.press(Key::TurnRight);
        sim.step(0.5, &keys);
        assert!((sim.camera.dir.y - 1f64.sin()).abs() < 1e-12);

        let mut sim = open_sim();
        let mut left = KeysHeld::new();
        left.press(Key::TurnLeft);
        left.press(Key::Run);
        sim.step(0.5, &left);
        assert!((sim.camera.dir.y + 1.5f64.sin()).abs() < 1e-12);
    }
}
