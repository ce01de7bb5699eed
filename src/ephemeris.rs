// Ephemeris Seeding - Builds roster bodies from heliocentric state vectors
// The fetch from an ephemeris service happens elsewhere; this module only
// converts and persists the seed values.

use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, TAU};
use std::fs;
use std::path::Path;

use crate::error::{Result, SweepError};
use crate::physics_engine::{Body, Vector2};

/// Heliocentric ecliptic state: position (AU) and velocity (AU/day)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateVectorSeed {
    #[serde(default)]
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub mass: f64,
}

/// A roster file entry, either already in polar form or as a raw state vector
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RosterEntry {
    Polar(Body),
    StateVector(StateVectorSeed),
}

impl RosterEntry {
    pub fn into_body(self) -> Body {
        match self {
            RosterEntry::Polar(body) => body,
            RosterEntry::StateVector(seed) => body_from_state_vector(&seed),
        }
    }
}

/// Convert a state vector to a polar-velocity body.
///
/// The heading is the orbit tangent derived from the position, mirrored for
/// the clockwise, y-down angle convention; only the velocity magnitude is
/// taken from (vx, vy).
pub fn body_from_state_vector(seed: &StateVectorSeed) -> Body {
    let speed = seed.vx.hypot(seed.vy);
    let angle = PI - (TAU - seed.y.atan2(seed.x));

    Body::new(&seed.name, Vector2::new(seed.x, seed.y), seed.mass, speed, angle)
}

pub fn roster_from_json(json: &str) -> Result<Vec<Body>> {
    let entries: Vec<RosterEntry> = serde_json::from_str(json)?;
    if entries.is_empty() {
        return Err(SweepError::invalid("roster file lists no bodies"));
    }
    Ok(entries.into_iter().map(RosterEntry::into_body).collect())
}

pub fn load_roster(path: &Path) -> Result<Vec<Body>> {
    let json = fs::read_to_string(path)?;
    roster_from_json(&json)
}

pub fn save_roster(path: &Path, bodies: &[Body]) -> Result<()> {
    let json = serde_json::to_string_pretty(bodies)?;
    fs::write(path, json)?;
    Ok(())
}
