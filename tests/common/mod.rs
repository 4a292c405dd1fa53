//! Shared fixtures: a mutable in-memory world standing in for the simulation core.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use kpi_grading::env::{
    ActorKind, ActorSource, EgoState, FellowActor, Footprint, LaneInfo, MapSource, Message, MessageSource, Position,
    SimulationModules,
};
use kpi_grading::grading_config::{EvalKpi, KpiGroup};
use kpi_grading::grading_msg::GradingMsg;
use kpi_grading::kpi::{InitContext, Kpi, StepContext, Steppable};
use kpi_grading::settings::GradingSettings;

#[derive(Debug, Default)]
pub struct WorldState {
    pub ego: Option<EgoState>,
    pub fellows: Vec<FellowActor>,
    pub lane: Option<LaneInfo>,
    pub messages: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Default)]
pub struct FakeWorld {
    pub state: Mutex<WorldState>,
}

impl FakeWorld {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut WorldState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn set_ego(&self, ego: EgoState) {
        self.with(|s| s.ego = Some(ego));
    }

    pub fn clear_ego(&self) {
        self.with(|s| s.ego = None);
    }
}

impl ActorSource for FakeWorld {
    fn ego(&self) -> Option<EgoState> {
        self.state.lock().unwrap().ego.clone()
    }

    fn fellows(&self) -> Vec<FellowActor> {
        self.state.lock().unwrap().fellows.clone()
    }
}

impl MapSource for FakeWorld {
    fn lane_info(&self, _position: &Position) -> Option<LaneInfo> {
        self.state.lock().unwrap().lane
    }
}

impl MessageSource for FakeWorld {
    fn latest(&self, topic: &str) -> Option<Message> {
        let s = self.state.lock().unwrap();
        s.messages.get(topic).map(|p| Message { timestamp_ms: 0.0, payload: p.clone() })
    }
}

pub fn modules(world: &Arc<FakeWorld>) -> SimulationModules {
    SimulationModules::from_source(world.clone())
}

pub fn car_at(x: f64, y: f64) -> Footprint {
    Footprint { center: Position::new(x, y), heading: 0.0, length: 4.0, width: 2.0 }
}

pub fn ego_at(x: f64) -> EgoState {
    EgoState { footprint: car_at(x, 0.0), ..EgoState::default() }
}

pub fn vehicle(id: i64, x: f64) -> FellowActor {
    FellowActor { id, kind: ActorKind::Vehicle, footprint: car_at(x, 0.0) }
}

/// Run `init` on `kpi` against `configs` with default settings.
pub fn init(kpi: &mut dyn Kpi, configs: Vec<EvalKpi>, modules: SimulationModules) {
    let group = KpiGroup::new(configs);
    let settings = GradingSettings::default();
    let ctx = InitContext { config: &group, settings: &settings, modules };
    assert!(kpi.init(&ctx));
}

/// One tick; returns what `step` returned.
pub fn step(kpi: &mut dyn Kpi, t: f64) -> bool {
    let mut msg = GradingMsg::default();
    msg.begin_tick(t);
    let mut ctx = StepContext { sim_time_s: t, grading: &mut msg };
    kpi.step(&mut ctx)
}
