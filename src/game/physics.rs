//! Bird physics and world bounds

use super::actor::Actor;
use super::mode::World;

/// Which world edge the actor was clamped against this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundsContact {
    None,
    Ceiling,
    Floor,
}

/// Physics system for the vertical flight model
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Apply one tick of gravity and move the actor
    pub fn integrate(actor: &mut Actor, gravity: f32) {
        actor.velocity += gravity;
        actor.y += actor.velocity;
    }

    /// Flap: overwrite the vertical velocity with the flap velocity
    pub fn impulse(actor: &mut Actor, flap_velocity: f32) {
        actor.velocity = flap_velocity;
    }

    /// Keep the actor between the ceiling and the ground.
    /// Both clamps zero the velocity; the floor wins if the world is too
    /// short to hold the actor.
    pub fn enforce_bounds(actor: &mut Actor, world: &World) -> BoundsContact {
        let ground_y = world.ground_y();
        let mut contact = BoundsContact::None;

        if actor.y - actor.half_height <= 0.0 {
            actor.y = actor.half_height;
            actor.velocity = 0.0;
            contact = BoundsContact::Ceiling;
        }

        if actor.y + actor.half_height >= ground_y {
            actor.y = ground_y - actor.half_height;
            actor.velocity = 0.0;
            contact = BoundsContact::Floor;
        }

        contact
    }

    /// Final clamp after collision push-out, on both axes
    pub fn clamp_to_world(actor: &mut Actor, world: &World) {
        let max_x = (world.width - actor.half_width).max(actor.half_width);
        let max_y = (world.ground_y() - actor.half_height).max(actor.half_height);
        actor.x = actor.x.clamp(actor.half_width, max_x);
        actor.y = actor.y.clamp(actor.half_height, max_y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor_at(y: f32, velocity: f32) -> Actor {
        Actor {
            x: 150.0,
            y,
            velocity,
            half_width: 20.0,
            half_height: 15.0,
            score: 0,
        }
    }

    #[test]
    fn test_fall_is_monotonic_until_floor() {
        let world = World::new(1280.0, 800.0);
        let mut actor = actor_at(100.0, -8.0);
        let mut last_velocity = actor.velocity;
        let mut last_y = f32::MIN;
        let mut hit_floor = false;

        for _ in 0..400 {
            PhysicsSystem::integrate(&mut actor, 0.5);
            assert!(actor.velocity >= last_velocity);
            last_velocity = actor.velocity;

            if PhysicsSystem::enforce_bounds(&mut actor, &world) == BoundsContact::Floor {
                hit_floor = true;
                break;
            }
            // Climb phase is over once velocity turns positive
            if actor.velocity > 0.0 {
                assert!(actor.y >= last_y);
            }
            last_y = actor.y;
        }

        assert!(hit_floor);
        assert_eq!(actor.y, 640.0 - 15.0);
        assert_eq!(actor.velocity, 0.0);
    }

    #[test]
    fn test_impulse_overwrites_velocity() {
        let mut falling = actor_at(300.0, 12.0);
        let mut rising = actor_at(300.0, -20.0);
        PhysicsSystem::impulse(&mut falling, -8.0);
        PhysicsSystem::impulse(&mut rising, -8.0);
        assert_eq!(falling.velocity, -8.0);
        assert_eq!(rising.velocity, -8.0);

        PhysicsSystem::impulse(&mut falling, -8.0);
        assert_eq!(falling.velocity, -8.0);
    }

    #[test]
    fn test_floor_threshold() {
        let world = World::new(1280.0, 800.0);

        let mut above = actor_at(624.0, 0.0);
        assert_eq!(PhysicsSystem::enforce_bounds(&mut above, &world), BoundsContact::None);

        let mut touching = actor_at(625.0, 3.0);
        assert_eq!(
            PhysicsSystem::enforce_bounds(&mut touching, &world),
            BoundsContact::Floor
        );
        assert_eq!(touching.velocity, 0.0);
    }

    #[test]
    fn test_ceiling_clamp() {
        let world = World::new(1280.0, 800.0);
        let mut actor = actor_at(5.0, -8.0);
        assert_eq!(
            PhysicsSystem::enforce_bounds(&mut actor, &world),
            BoundsContact::Ceiling
        );
        assert_eq!(actor.y, 15.0);
        assert_eq!(actor.velocity, 0.0);
    }

    #[test]
    fn test_clamp_to_world_keeps_actor_on_screen() {
        let world = World::new(1280.0, 800.0);
        let mut actor = actor_at(700.0, 0.0);
        actor.x = -30.0;
        PhysicsSystem::clamp_to_world(&mut actor, &world);
        assert_eq!(actor.x, 20.0);
        assert_eq!(actor.y, 625.0);
    }
}
