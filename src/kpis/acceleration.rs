//! Acceleration limits on the ego vehicle.
//!
//! - `MaxAcceleration_V`: longitudinal acceleration rising above the primary threshold
//! - `MaxDeceleration_V`: longitudinal acceleration falling below the negated primary threshold
//! - `MaxLateralAcceleration`: |lateral acceleration| rising above a threshold
//!   picked per tick from the lane curvature
//!
//! The lateral limit changes tick to tick, so its plot carries one upper
//! threshold value per sample instead of a static band.

use tracing::debug;

use crate::detector::EdgeDetector;
use crate::grading_msg::{AccelerationSample, GradingMsg};
use crate::impl_core_reportable;
use crate::kpi::{InitContext, KpiCore, Reportable, ScenarioGate, StepContext, Steppable, StopContext};
use crate::report::{EvalResult, ThresholdBand, XyPlot};

pub const MAX_ACCELERATION_ID: &str = "MaxAcceleration_V";
pub const MAX_DECELERATION_ID: &str = "MaxDeceleration_V";
pub const MAX_LATERAL_ACCELERATION_ID: &str = "MaxLateralAcceleration";

pub const THRESH_STRAIGHT: &str = "Thresh_Straight";
pub const THRESH_CURVE: &str = "Thresh_Curve";
pub const CURVATURE_BOUNDARY: &str = "Curvature_Boundary";

#[derive(Debug, Clone, Copy, PartialEq)]
enum Limit {
    Longitudinal { max: f64 },
    Braking { max: f64 },
    Lateral { straight: f64, curve: f64, boundary: f64 },
}

impl Limit {
    /// Sampled value and the threshold it is compared against this tick.
    fn sample(&self, acc_lon: f64, acc_lat: f64, curvature: Option<f64>) -> (f64, f64) {
        match *self {
            Limit::Longitudinal { max } => (acc_lon, max),
            Limit::Braking { max } => (acc_lon, -max),
            Limit::Lateral { straight, curve, boundary } => {
                let thresh = match curvature {
                    Some(k) if k.abs() >= boundary => curve,
                    _ => straight,
                };
                (acc_lat.abs(), thresh)
            }
        }
    }
}

/// Shared implementation of the three acceleration KPIs.
#[derive(Debug)]
pub struct AccelerationLimit {
    core: KpiCore,
    label: &'static str,
    limit: Limit,
    detector: EdgeDetector<f64>,
    plot: XyPlot,
    latest: Option<AccelerationSample>,
}

impl AccelerationLimit {
    fn build(kpi_id: &str, label: &'static str, limit: Limit, detector: EdgeDetector<f64>) -> Self {
        Self {
            core: KpiCore::new(kpi_id),
            label,
            limit,
            detector,
            plot: XyPlot::default(),
            latest: None,
        }
    }

    pub fn max_acceleration() -> Self {
        Self::build(MAX_ACCELERATION_ID, "max acceleration", Limit::Longitudinal { max: 0.0 }, EdgeDetector::rising_f64())
    }

    pub fn max_deceleration() -> Self {
        Self::build(MAX_DECELERATION_ID, "max deceleration", Limit::Braking { max: 0.0 }, EdgeDetector::falling_f64())
    }

    pub fn max_lateral() -> Self {
        Self::build(
            MAX_LATERAL_ACCELERATION_ID,
            "max lateral acceleration",
            Limit::Lateral { straight: 0.0, curve: 0.0, boundary: 0.0 },
            EdgeDetector::rising_f64(),
        )
    }

    pub fn count(&self) -> u32 {
        self.detector.count()
    }

    fn resolve_limit(&mut self) {
        self.limit = match self.limit {
            Limit::Longitudinal { .. } => Limit::Longitudinal { max: self.core.resolve_primary_double() },
            Limit::Braking { .. } => Limit::Braking { max: self.core.resolve_primary_double() },
            Limit::Lateral { .. } => Limit::Lateral {
                straight: self.core.resolve_double(THRESH_STRAIGHT),
                curve: self.core.resolve_double(THRESH_CURVE),
                boundary: self.core.resolve_double(CURVATURE_BOUNDARY),
            },
        };
    }

    fn configure_plot(&mut self) {
        let (name, series) = match self.limit {
            Limit::Lateral { .. } => ("lateral acceleration", "acc_lat"),
            _ => ("longitudinal acceleration", "acc_lon"),
        };
        let mut plot = XyPlot::new(name, self.label, "t", "s", &[(series, "m/s2")]);
        match self.limit {
            Limit::Longitudinal { max } => {
                plot.set_threshold(0, ThresholdBand::new("thresh upper", 0, 1, max), ThresholdBand::none());
            }
            Limit::Braking { max } => {
                plot.set_threshold(0, ThresholdBand::none(), ThresholdBand::new("thresh lower", 1, 0, -max));
            }
            Limit::Lateral { .. } => {
                plot.set_threshold(0, ThresholdBand::new("thresh upper", 0, 1, 0.0), ThresholdBand::none());
                plot.clear_threshold_values(&[0], true, false);
            }
        }
        self.plot = plot;
    }
}

impl Steppable for AccelerationLimit {
    fn init(&mut self, ctx: &InitContext<'_>) -> bool {
        self.core.configure(ctx);
        self.resolve_limit();
        if self.core.report_enabled() {
            self.configure_plot();
        }
        true
    }

    fn step(&mut self, ctx: &mut StepContext<'_>) -> bool {
        self.latest = None;
        if !self.core.begin_step() {
            return false;
        }
        let Some(ego) = self.core.actors().and_then(|a| a.ego()) else {
            debug!(kpi = %self.core.kpi_id(), t = ctx.sim_time_s, "no ego this tick");
            return false;
        };
        let curvature = match self.limit {
            Limit::Lateral { .. } => self
                .core
                .map()
                .and_then(|m| m.lane_info(&ego.footprint.center))
                .map(|lane| lane.curvature),
            _ => None,
        };

        let (value, threshold) = self.limit.sample(ego.acc_lon, ego.acc_lat, curvature);
        self.detector.detect(value, threshold);
        self.latest = Some(AccelerationSample { value, threshold });

        if self.core.report_enabled() {
            self.plot.push_sample(ctx.sim_time_s, &[value]);
            if matches!(self.limit, Limit::Lateral { .. }) {
                self.plot.push_upper_threshold(0, threshold);
            }
        }
        true
    }

    fn stop(&mut self, ctx: &mut StopContext) -> bool {
        if !self.core.finalize() {
            return true;
        }
        ctx.set_feedback(self.core.kpi_id(), self.detector.count().to_string());
        if self.core.report_enabled() {
            self.core.case.add_xy_plot(std::mem::take(&mut self.plot));
        }
        true
    }
}

impl ScenarioGate for AccelerationLimit {
    fn is_eval_pass(&mut self) -> EvalResult {
        self.core.eval_count(self.detector.count(), self.label)
    }

    fn should_stop_scenario(&mut self) -> Option<String> {
        self.core.stop_on_count(self.detector.count(), self.label)
    }
}

impl Reportable for AccelerationLimit {
    impl_core_reportable!();

    fn set_grading_msg(&self, msg: &mut GradingMsg) {
        // the two longitudinal KPIs share the message slot by sign of the sample
        if let Some(sample) = self.latest {
            let owns_slot = match self.limit {
                Limit::Longitudinal { .. } => sample.value >= 0.0,
                Limit::Braking { .. } => sample.value < 0.0,
                Limit::Lateral { .. } => false,
            };
            if owns_slot {
                msg.acceleration = Some(sample);
            }
        }
        msg.set_detected_event(self.core.kpi_id(), &self.detector);
    }
}
