//! Read-only collaborators a KPI queries during `step`: actors, map and
//! inter-module messages.
//!
//! The simulation core populates these once per tick before any KPI runs.
//! Every accessor may return "missing", which a KPI treats as a skip-tick.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Message topic carrying the parking planner's final pose report.
pub const TOPIC_PARKING_RESULT: &str = "PARKING_RESULT";

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }
}

/// Planar footprint of an actor: centre, heading (rad) and size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Footprint {
    pub center: Position,
    pub heading: f64,
    pub length: f64,
    pub width: f64,
}

impl Footprint {
    fn corners(&self) -> [(f64, f64); 4] {
        let (s, c) = self.heading.sin_cos();
        let (hl, hw) = (self.length / 2.0, self.width / 2.0);
        [(hl, hw), (hl, -hw), (-hl, -hw), (-hl, hw)].map(|(dx, dy)| {
            (self.center.x + dx * c - dy * s, self.center.y + dx * s + dy * c)
        })
    }

    /// Separating-axis test between two oriented rectangles. Touching counts as overlap.
    pub fn overlaps(&self, other: &Footprint) -> bool {
        let a = self.corners();
        let b = other.corners();
        let axes = [self.heading, self.heading + std::f64::consts::FRAC_PI_2, other.heading, other.heading + std::f64::consts::FRAC_PI_2];
        axes.iter().all(|angle| {
            let (s, c) = angle.sin_cos();
            let project = |pts: &[(f64, f64); 4]| {
                pts.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (x, y)| {
                    let p = x * c + y * s;
                    (lo.min(p), hi.max(p))
                })
            };
            let (a_lo, a_hi) = project(&a);
            let (b_lo, b_hi) = project(&b);
            a_lo <= b_hi && b_lo <= a_hi
        })
    }
}

/// Kinematic state of the ego vehicle for the current tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EgoState {
    pub footprint: Footprint,
    /// m/s
    pub speed: f64,
    /// Longitudinal acceleration, m/s^2, negative when braking.
    pub acc_lon: f64,
    /// Lateral acceleration, m/s^2.
    pub acc_lat: f64,
    #[serde(default)]
    pub turn_lamp_on: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    Vehicle,
    Pedestrian,
    Static,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FellowActor {
    pub id: i64,
    pub kind: ActorKind,
    pub footprint: Footprint,
}

/// Map attributes of the lane under a position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LaneInfo {
    /// m/s, `None` when the map carries no limit for this lane.
    pub speed_limit: Option<f64>,
    /// 1/m, signed.
    pub curvature: f64,
}

/// Latest payload on a message topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub timestamp_ms: f64,
    pub payload: serde_json::Value,
}

pub trait ActorSource: Send + Sync {
    fn ego(&self) -> Option<EgoState>;
    fn fellows(&self) -> Vec<FellowActor>;
}

pub trait MapSource: Send + Sync {
    fn lane_info(&self, position: &Position) -> Option<LaneInfo>;
}

pub trait MessageSource: Send + Sync {
    fn latest(&self, topic: &str) -> Option<Message>;
}

/// The collaborator handles injected into every KPI at `init`.
///
/// A KPI whose modules are invalid returns `false` from every `step`,
/// independently of its `enabled` flag.
#[derive(Clone, Default)]
pub struct SimulationModules {
    pub actors: Option<Arc<dyn ActorSource>>,
    pub map: Option<Arc<dyn MapSource>>,
    pub messages: Option<Arc<dyn MessageSource>>,
}

impl SimulationModules {
    pub fn new(actors: Arc<dyn ActorSource>, map: Arc<dyn MapSource>, messages: Arc<dyn MessageSource>) -> Self {
        Self { actors: Some(actors), map: Some(map), messages: Some(messages) }
    }

    /// One value serving all three roles, e.g. a recorded trace.
    pub fn from_source<S>(source: Arc<S>) -> Self
    where
        S: ActorSource + MapSource + MessageSource + 'static,
    {
        Self {
            actors: Some(source.clone()),
            map: Some(source.clone()),
            messages: Some(source),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.actors.is_some() && self.map.is_some() && self.messages.is_some()
    }
}

impl std::fmt::Debug for SimulationModules {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationModules")
            .field("actors", &self.actors.is_some())
            .field("map", &self.map.is_some())
            .field("messages", &self.messages.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x: f64, y: f64, heading: f64) -> Footprint {
        Footprint { center: Position::new(x, y), heading, length: 4.0, width: 2.0 }
    }

    #[test]
    fn test_overlap_same_place() {
        assert!(rect(0.0, 0.0, 0.0).overlaps(&rect(0.0, 0.0, 1.0)));
    }

    #[test]
    fn test_no_overlap_far_apart() {
        assert!(!rect(0.0, 0.0, 0.0).overlaps(&rect(10.0, 0.0, 0.0)));
    }

    #[test]
    fn test_overlap_bumper_to_bumper() {
        assert!(rect(0.0, 0.0, 0.0).overlaps(&rect(3.9, 0.0, 0.0)));
        assert!(!rect(0.0, 0.0, 0.0).overlaps(&rect(4.1, 0.0, 0.0)));
    }

    #[test]
    fn test_rotated_gap_detected() {
        // Diagonal neighbour: axis-aligned boxes would overlap, rotated ones do not.
        let a = rect(0.0, 0.0, std::f64::consts::FRAC_PI_4);
        let b = rect(2.6, -2.6, std::f64::consts::FRAC_PI_4);
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn test_default_modules_invalid() {
        assert!(!SimulationModules::default().is_valid());
    }
}
