// Physics Engine - Planar N-Body Kernel
// Implements pairwise gravity, polar velocity composition, and the fixed-step integrator

use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_2;

// =============================================================================
// PHYSICAL CONSTANTS (AU / kg / day)
// =============================================================================

/// Gravitational constant pre-converted to AU³/(kg·day²)
pub const G_AU: f64 = 1.4881851702345193e-34;

/// Distance substituted for coincident bodies so attraction stays finite (AU)
pub const MIN_DISTANCE: f64 = 1e-12;

/// Sun mass (kg)
pub const MASS_SUN: f64 = 1.9884e30;

/// Mercury mass (kg)
pub const MASS_MERCURY: f64 = 3.285e23;

/// Venus mass (kg)
pub const MASS_VENUS: f64 = 4.867e24;

/// Earth mass (kg)
pub const MASS_EARTH: f64 = 5.972e24;

/// Moon mass (kg), folded into Earth for the baseline roster
pub const MASS_MOON: f64 = 7.342e22;

// =============================================================================
// 2D VECTOR MATHEMATICS
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct Vector2 {
    pub x: f64,
    pub y: f64,
}

impl Vector2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn zero() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    pub fn distance(&self, other: &Vector2) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// L1 distance, the per-body term of the stability divergence
    pub fn manhattan(&self, other: &Vector2) -> f64 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    /// Direction of the position as seen from the origin (radians, standard atan2)
    pub fn bearing(&self) -> f64 {
        self.y.atan2(self.x)
    }
}

impl From<(f64, f64)> for Vector2 {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

// =============================================================================
// VECTOR PHYSICS KERNEL
// =============================================================================
//
// Angle convention: 0 rad points "up" and angles grow clockwise, a leftover of
// screen coordinates with an inverted y axis. Every trajectory in this crate
// depends on these exact formulas; do not rewrite them in terms of atan2(x, y)
// or a different sign convention.

/// Add two polar velocity vectors and return the sum in polar form.
///
/// A zero first vector contributes nothing: the second is returned untouched.
pub fn compose_velocity(speed1: f64, angle1: f64, speed2: f64, angle2: f64) -> (f64, f64) {
    if speed1 == 0.0 {
        return (speed2, angle2);
    }

    let x = speed1 * angle1.sin() + speed2 * angle2.sin();
    let y = speed1 * angle1.cos() + speed2 * angle2.cos();

    let speed = x.hypot(y);
    let angle = FRAC_PI_2 - y.atan2(x);

    (speed, angle)
}

/// Newtonian attraction between two point masses.
///
/// Returns the force magnitude and the angle of the vector pointing from
/// `pos2` to `pos1`. Coincident bodies are separated by [`MIN_DISTANCE`].
pub fn attract(pos1: Vector2, pos2: Vector2, mass1: f64, mass2: f64) -> (f64, f64) {
    let dx = pos1.x - pos2.x;
    let dy = pos1.y - pos2.y;
    let theta = dy.atan2(dx);

    let mut distance = dx.hypot(dy);
    if distance == 0.0 {
        distance = MIN_DISTANCE;
    }

    let force = G_AU * mass1 * mass2 / (distance * distance);
    (force, theta)
}

/// One explicit Euler step (Δt = 1 day) along a polar velocity
pub fn move_position(position: Vector2, angle: f64, speed: f64) -> Vector2 {
    Vector2 {
        x: position.x + angle.sin() * speed,
        y: position.y - angle.cos() * speed,
    }
}

// =============================================================================
// BODY
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Body {
    #[serde(default)]
    pub name: String,
    pub position: Vector2, // AU
    pub mass: f64,         // kg
    pub speed: f64,        // AU/day
    pub angle: f64,        // radians, clockwise from "up"; never normalized
}

impl Body {
    pub fn new(name: &str, position: Vector2, mass: f64, speed: f64, angle: f64) -> Self {
        Self {
            name: name.to_string(),
            position,
            mass,
            speed,
            angle,
        }
    }

    /// Apply an acceleration vector (magnitude, angle) to this body's velocity
    pub fn accelerate(&mut self, magnitude: f64, angle: f64) {
        let (speed, angle) = compose_velocity(self.speed, self.angle, magnitude, angle);
        self.speed = speed;
        self.angle = angle;
    }
}

// =============================================================================
// ORBITAL SYSTEM
// =============================================================================

/// An ordered roster of bodies advanced together one day at a time.
///
/// Ordering contract (the trajectories are bit-reproducible only under it):
/// for each body `i` in roster order, `i` first moves using the velocity it
/// carried into this step, then every later body `j > i` is attracted to it
/// once, updating both velocities. Bodies `j > i` are therefore attracted at
/// their *pre-move* positions while `i` is already moved.
#[derive(Debug, Clone, Default)]
pub struct OrbitalSystem {
    bodies: Vec<Body>,
}

impl OrbitalSystem {
    pub fn new(bodies: Vec<Body>) -> Self {
        Self { bodies }
    }

    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    pub fn add_body(&mut self, body: Body) {
        self.bodies.push(body);
    }

    /// Advance every body by one step
    pub fn advance(&mut self) {
        let n = self.bodies.len();

        for i in 0..n {
            let body = &mut self.bodies[i];
            body.position = move_position(body.position, body.angle, body.speed);

            for j in (i + 1)..n {
                let (head, tail) = self.bodies.split_at_mut(j);
                let first = &mut head[i];
                let second = &mut tail[0];

                let (force, theta) =
                    attract(first.position, second.position, first.mass, second.mass);

                first.accelerate(force / first.mass, theta - FRAC_PI_2);
                second.accelerate(force / second.mass, theta + FRAC_PI_2);
            }
        }
    }

    /// Positions of the first `count` bodies in roster order
    pub fn positions(&self, count: usize) -> Vec<Vector2> {
        self.bodies.iter().take(count).map(|b| b.position).collect()
    }

    /// True if any pair of bodies is at or within `threshold` of each other
    pub fn has_close_pair(&self, threshold: f64) -> bool {
        let n = self.bodies.len();
        for i in 0..n {
            for j in (i + 1)..n {
                if self.bodies[i].position.distance(&self.bodies[j].position) <= threshold {
                    return true;
                }
            }
        }
        false
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::f64::consts::{PI, TAU};

    fn angle_delta(a: f64, b: f64) -> f64 {
        let d = (a - b).rem_euclid(TAU);
        d.min(TAU - d)
    }

    #[test]
    fn test_attract_is_antisymmetric() {
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..200 {
            let p1 = Vector2::new(rng.gen_range(-2.0..2.0), rng.gen_range(-2.0..2.0));
            let p2 = Vector2::new(rng.gen_range(-2.0..2.0), rng.gen_range(-2.0..2.0));
            let m1 = rng.gen_range(1e22..1e30);
            let m2 = rng.gen_range(1e22..1e30);

            let (f12, a12) = attract(p1, p2, m1, m2);
            let (f21, a21) = attract(p2, p1, m2, m1);

            assert_relative_eq!(f12, f21, max_relative = 1e-14);
            assert!((angle_delta(a12, a21) - PI).abs() < 1e-12);
        }
    }

    #[test]
    fn test_attract_angle_points_from_second_to_first() {
        let (_, theta) = attract(Vector2::new(1.0, 0.0), Vector2::zero(), 1.0, 1.0);
        assert_eq!(theta, 0.0);

        let (_, theta) = attract(Vector2::new(0.0, 1.0), Vector2::zero(), 1.0, 1.0);
        assert!((theta - FRAC_PI_2).abs() < 1e-15);
    }

    #[test]
    fn test_attract_inverse_square() {
        let (near, _) = attract(Vector2::new(1.0, 0.0), Vector2::zero(), MASS_SUN, MASS_EARTH);
        let (far, _) = attract(Vector2::new(2.0, 0.0), Vector2::zero(), MASS_SUN, MASS_EARTH);
        assert_relative_eq!(near / far, 4.0, max_relative = 1e-12);
        assert_relative_eq!(near, G_AU * MASS_SUN * MASS_EARTH, max_relative = 1e-15);
    }

    #[test]
    fn test_attract_zero_distance_uses_floor() {
        let p = Vector2::new(0.5, -0.5);
        let (force, theta) = attract(p, p, 2.0, 3.0);

        assert!(force.is_finite());
        assert_eq!(force, G_AU * 2.0 * 3.0 / (MIN_DISTANCE * MIN_DISTANCE));
        assert_eq!(theta, 0.0);
    }

    #[test]
    fn test_compose_zero_vector_contributes_nothing() {
        let (speed, angle) = compose_velocity(0.0, 1.234, 0.017, -2.93);
        assert_eq!(speed, 0.017);
        assert_eq!(angle, -2.93);
    }

    #[test]
    fn test_compose_velocity_adds_components() {
        // "up" plus "right" in the clockwise convention is up-right at 45 degrees
        let (speed, angle) = compose_velocity(1.0, 0.0, 1.0, FRAC_PI_2);
        assert_relative_eq!(speed, 2.0_f64.sqrt(), max_relative = 1e-15);
        assert!(angle_delta(angle, PI / 4.0) < 1e-12);

        // opposite vectors cancel
        let (speed, _) = compose_velocity(0.5, 0.3, 0.5, 0.3 + PI);
        assert!(speed < 1e-15);
    }

    #[test]
    fn test_compose_with_zero_second_vector_keeps_direction() {
        let (speed, angle) = compose_velocity(0.02, -3.2570492550785675, 0.0, 0.0);
        assert_relative_eq!(speed, 0.02, max_relative = 1e-15);
        assert!(angle_delta(angle, -3.2570492550785675) < 1e-12);
    }

    #[test]
    fn test_move_position_angle_convention() {
        let up = move_position(Vector2::zero(), 0.0, 1.0);
        assert_eq!(up.x, 0.0);
        assert_eq!(up.y, -1.0);

        let right = move_position(Vector2::zero(), FRAC_PI_2, 2.0);
        assert!((right.x - 2.0).abs() < 1e-15);
        assert!(right.y.abs() < 1e-15);
    }

    #[test]
    fn test_advance_moves_before_interacting() {
        // the first body moves before it is attracted, the second after
        let mut system = OrbitalSystem::new(vec![
            Body::new("a", Vector2::new(-1.0, 0.0), 1e28, 0.0, 0.0),
            Body::new("b", Vector2::new(1.0, 0.0), 1e28, 0.0, 0.0),
        ]);

        system.advance();
        let a = &system.bodies()[0];
        let b = &system.bodies()[1];
        assert_eq!(a.position, Vector2::new(-1.0, 0.0));
        assert!(b.position.x < 1.0);
        assert!(a.speed > 0.0);
        assert_eq!(a.speed, b.speed);

        system.advance();
        assert!(system.bodies()[0].position.x > -1.0);
    }

    #[test]
    fn test_advance_is_deterministic() {
        let bodies = vec![
            Body::new("star", Vector2::zero(), MASS_SUN, 0.0, 0.0),
            Body::new("p1", Vector2::new(1.0, 0.0), MASS_EARTH, 0.0172, PI),
            Body::new("p2", Vector2::new(0.0, 0.7), MASS_VENUS, 0.02, -FRAC_PI_2),
        ];

        let mut a = OrbitalSystem::new(bodies.clone());
        let mut b = OrbitalSystem::new(bodies);
        for _ in 0..500 {
            a.advance();
            b.advance();
        }

        assert_eq!(a.bodies(), b.bodies());
    }

    #[test]
    fn test_has_close_pair() {
        let mut system = OrbitalSystem::new(vec![
            Body::new("a", Vector2::zero(), 1.0, 0.0, 0.0),
            Body::new("b", Vector2::new(1.0, 0.0), 1.0, 0.0, 0.0),
        ]);
        assert!(!system.has_close_pair(0.5));
        assert!(system.has_close_pair(1.0));

        system.add_body(Body::new("c", Vector2::new(1.0, 0.0005), 1.0, 0.0, 0.0));
        assert!(system.has_close_pair(0.001));
    }

    #[test]
    fn test_vector2_operations() {
        let a = Vector2::new(1.0, 2.0);
        let b = Vector2::new(4.0, -2.0);

        assert!((a.distance(&b) - 5.0).abs() < 1e-12);
        assert!((a.manhattan(&b) - 7.0).abs() < 1e-12);
        assert_eq!(Vector2::from((1.0, 2.0)), a);
    }
}
