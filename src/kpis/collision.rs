//! `Collision`: counts contacts between the ego footprint and any fellow actor.
//!
//! A second plot series records ticks where the ego collided without
//! responding, i.e. without braking harder than 1 m/s^2 or, for collisions
//! with vehicles and static objects, without a turn lamp on.

use tracing::{debug, info};

use crate::detector::EdgeDetector;
use crate::env::{ActorKind, EgoState, FellowActor};
use crate::grading_msg::{CollisionRecord, GradingMsg};
use crate::impl_core_reportable;
use crate::kpi::{InitContext, KpiCore, Reportable, ScenarioGate, StepContext, Steppable, StopContext};
use crate::report::{EvalResult, ThresholdBand, XyPlot, UNSET};

pub const KPI_ID: &str = "Collision";

/// Longitudinal acceleration at or below which the ego counts as braking.
const BRAKE_RESPONSE_ACC: f64 = -1.0;

#[derive(Debug)]
pub struct Collision {
    core: KpiCore,
    detector: EdgeDetector<bool>,
    plot: XyPlot,
    /// The fellow hit on the latest tick, if any.
    hit: Option<FellowActor>,
}

impl Default for Collision {
    fn default() -> Self {
        Self::new()
    }
}

impl Collision {
    pub fn new() -> Self {
        Self {
            core: KpiCore::new(KPI_ID),
            detector: EdgeDetector::rising_flag(),
            plot: XyPlot::default(),
            hit: None,
        }
    }

    pub fn count(&self) -> u32 {
        self.detector.count()
    }

    fn responded(ego: &EgoState, fellow: &FellowActor) -> bool {
        let braked = ego.acc_lon <= BRAKE_RESPONSE_ACC;
        let steered = match fellow.kind {
            ActorKind::Pedestrian => true,
            ActorKind::Vehicle | ActorKind::Static => ego.turn_lamp_on,
        };
        braked && steered
    }
}

impl Steppable for Collision {
    fn init(&mut self, ctx: &InitContext<'_>) -> bool {
        self.core.configure(ctx);
        if self.core.report_enabled() {
            let mut plot = XyPlot::new("collision", "", "t", "s", &[("collision", "N/A"), ("no response", "N/A")]);
            plot.set_threshold(0, ThresholdBand::new("thresh upper", 0, 1, 1.0), ThresholdBand::none());
            plot.set_threshold(1, ThresholdBand::new("", 0, 1, 1.0), ThresholdBand::new("", 1, 0, UNSET));
            self.plot = plot;
        }
        true
    }

    fn step(&mut self, ctx: &mut StepContext<'_>) -> bool {
        self.hit = None;
        if !self.core.begin_step() {
            return false;
        }
        let Some(actors) = self.core.actors() else {
            return false;
        };
        let Some(ego) = actors.ego() else {
            debug!(kpi = KPI_ID, t = ctx.sim_time_s, "no ego this tick");
            return false;
        };

        self.hit = actors.fellows().into_iter().find(|f| ego.footprint.overlaps(&f.footprint));
        let collided = self.hit.is_some();
        let no_response = self.hit.as_ref().is_some_and(|f| !Self::responded(&ego, f));

        if self.detector.detect(collided, true) {
            if let Some(f) = &self.hit {
                info!(kpi = KPI_ID, t = ctx.sim_time_s, fellow = f.id, kind = ?f.kind, "ego collision");
            }
        }

        if self.core.report_enabled() {
            self.plot.push_sample(ctx.sim_time_s, &[f64::from(u8::from(collided)), f64::from(u8::from(no_response))]);
        }
        true
    }

    fn stop(&mut self, ctx: &mut StopContext) -> bool {
        if !self.core.finalize() {
            return true;
        }
        ctx.set_feedback(KPI_ID, self.detector.count().to_string());
        if self.core.report_enabled() {
            self.core.case.add_xy_plot(std::mem::take(&mut self.plot));
        }
        true
    }
}

impl ScenarioGate for Collision {
    fn is_eval_pass(&mut self) -> EvalResult {
        self.core.eval_count(self.detector.count(), "collision")
    }

    fn should_stop_scenario(&mut self) -> Option<String> {
        self.core.stop_on_count(self.detector.count(), "collision")
    }
}

impl Reportable for Collision {
    impl_core_reportable!();

    fn set_grading_msg(&self, msg: &mut GradingMsg) {
        if let Some(f) = &self.hit {
            msg.collisions.push(CollisionRecord {
                fellow_id: f.id,
                kind: f.kind,
                location: f.footprint.center,
            });
        }
        msg.set_detected_event(KPI_ID, &self.detector);
    }
}
