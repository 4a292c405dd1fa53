//! Per-tick grading telemetry shared by all KPIs of a scenario.
//!
//! The driver clears it at the start of each tick; KPIs write live detector
//! state into it from `set_grading_msg`. It is not part of the final report.

use serde::{Deserialize, Serialize};

use crate::detector::EdgeDetector;
use crate::env::{ActorKind, Position};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedEvent {
    pub kpi_id: String,
    pub count: u32,
    pub triggered: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollisionRecord {
    pub fellow_id: i64,
    pub kind: ActorKind,
    pub location: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccelerationSample {
    pub value: f64,
    pub threshold: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GradingMsg {
    pub cur_t_s: f64,
    pub dt_s: f64,
    /// Raised when any detector is in its triggered state this tick.
    pub has_event: bool,
    pub detected_events: Vec<DetectedEvent>,
    pub collisions: Vec<CollisionRecord>,
    pub acceleration: Option<AccelerationSample>,
}

impl GradingMsg {
    /// Reset per-tick content and stamp the new time.
    pub fn begin_tick(&mut self, cur_t_s: f64) {
        let dt_s = cur_t_s - self.cur_t_s;
        *self = GradingMsg { cur_t_s, dt_s, ..GradingMsg::default() };
    }

    pub fn set_detected_event<T: PartialOrd + Copy>(&mut self, kpi_id: &str, detector: &EdgeDetector<T>) {
        let triggered = detector.latest_state();
        self.has_event |= triggered;
        self.detected_events.push(DetectedEvent {
            kpi_id: kpi_id.to_string(),
            count: detector.count(),
            triggered,
        });
    }

    pub fn event(&self, kpi_id: &str) -> Option<&DetectedEvent> {
        self.detected_events.iter().find(|e| e.kpi_id == kpi_id)
    }
}
