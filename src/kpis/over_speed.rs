//! `OverSpeed`: ego speed rising above the lane's speed limit plus a
//! percentage tolerance (`Speed_Tolerance`).
//!
//! Ticks where the map has no lane or no limit under the ego are skipped.

use tracing::debug;

use crate::detector::EdgeDetector;
use crate::grading_msg::GradingMsg;
use crate::impl_core_reportable;
use crate::kpi::{InitContext, KpiCore, Reportable, ScenarioGate, StepContext, Steppable, StopContext};
use crate::report::{EvalResult, ThresholdBand, XyPlot};

pub const KPI_ID: &str = "OverSpeed";
pub const SPEED_TOLERANCE: &str = "Speed_Tolerance";

#[derive(Debug)]
pub struct OverSpeed {
    core: KpiCore,
    tolerance_pct: f64,
    detector: EdgeDetector<f64>,
    plot: XyPlot,
}

impl Default for OverSpeed {
    fn default() -> Self {
        Self::new()
    }
}

impl OverSpeed {
    pub fn new() -> Self {
        Self {
            core: KpiCore::new(KPI_ID),
            tolerance_pct: 0.0,
            detector: EdgeDetector::rising_f64(),
            plot: XyPlot::default(),
        }
    }

    pub fn count(&self) -> u32 {
        self.detector.count()
    }

    /// Highest speed allowed under `limit`, m/s.
    pub fn allowed_speed(&self, limit: f64) -> f64 {
        limit * (1.0 + self.tolerance_pct / 100.0)
    }
}

impl Steppable for OverSpeed {
    fn init(&mut self, ctx: &InitContext<'_>) -> bool {
        self.core.configure(ctx);
        self.tolerance_pct = self.core.resolve_double(SPEED_TOLERANCE);
        if self.core.report_enabled() {
            let mut plot = XyPlot::new("speed", "", "t", "s", &[("speed", "m/s")]);
            plot.set_threshold(0, ThresholdBand::new("speed limit", 0, 1, 0.0), ThresholdBand::none());
            plot.clear_threshold_values(&[0], true, false);
            self.plot = plot;
        }
        true
    }

    fn step(&mut self, ctx: &mut StepContext<'_>) -> bool {
        if !self.core.begin_step() {
            return false;
        }
        let Some(ego) = self.core.actors().and_then(|a| a.ego()) else {
            debug!(kpi = KPI_ID, t = ctx.sim_time_s, "no ego this tick");
            return false;
        };
        let Some(limit) = self.core.map().and_then(|m| m.lane_info(&ego.footprint.center)).and_then(|l| l.speed_limit) else {
            debug!(kpi = KPI_ID, t = ctx.sim_time_s, "no speed limit under ego");
            return false;
        };

        let allowed = self.allowed_speed(limit);
        self.detector.detect(ego.speed, allowed);

        if self.core.report_enabled() {
            self.plot.push_sample(ctx.sim_time_s, &[ego.speed]);
            self.plot.push_upper_threshold(0, allowed);
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

impl ScenarioGate for OverSpeed {
    fn is_eval_pass(&mut self) -> EvalResult {
        self.core.eval_count(self.detector.count(), "over speed")
    }

    fn should_stop_scenario(&mut self) -> Option<String> {
        self.core.stop_on_count(self.detector.count(), "over speed")
    }
}

impl Reportable for OverSpeed {
    impl_core_reportable!();

    fn set_grading_msg(&self, msg: &mut GradingMsg) {
        msg.set_detected_event(KPI_ID, &self.detector);
    }
}
