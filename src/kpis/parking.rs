//! `ParkingPrecision`: final-pose accuracy of an automated parking manoeuvre.
//!
//! Fed from the [`TOPIC_PARKING_RESULT`] message once the planner reports the
//! manoeuvre complete. Seven detectors cover the four wheel-to-line lateral
//! distances, the two front/rear vertical distances and the body angle. Each
//! group is reported as its own accompany case; the parent counts every
//! sub-detector trigger.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::accompany::AccompanyCaseRegistry;
use crate::detector::EdgeDetector;
use crate::env::TOPIC_PARKING_RESULT;
use crate::grading_config::EvalKpi;
use crate::grading_msg::{DetectedEvent, GradingMsg};
use crate::impl_core_reportable;
use crate::kpi::{InitContext, KpiCore, Reportable, ScenarioGate, StepContext, Steppable, StopContext, ENFORCE_MIN};
use crate::report::{set_case_info, EvalResult, PairData, TestState, UNSET};

pub const KPI_ID: &str = "ParkingPrecision";
pub const LATERAL_CASE_ID: &str = "ParkingPrecision_Lateral";
pub const VERTICAL_CASE_ID: &str = "ParkingPrecision_Vertical";
pub const ANGLE_CASE_ID: &str = "ParkingPrecision_Angle";

pub const PARKING_SPACE_ID: &str = "ParkingSpaceId";
pub const LATERAL_THRESHOLD: &str = "LateralThreshold";
pub const VERTICAL_THRESHOLD: &str = "VerticalThreshold";
pub const BODY_ANGLE_THRESHOLD: &str = "BodyAngleThreshold";

/// Payload of a [`TOPIC_PARKING_RESULT`] message. Distances in m, angle in rad.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ParkingResult {
    pub space_id: i64,
    pub completed: bool,
    pub lateral_fl: f64,
    pub lateral_fr: f64,
    pub lateral_rl: f64,
    pub lateral_rr: f64,
    pub vertical_front: f64,
    pub vertical_rear: f64,
    pub body_angle: f64,
}

impl ParkingResult {
    fn lateral(&self) -> [f64; 4] {
        [self.lateral_fl, self.lateral_fr, self.lateral_rl, self.lateral_rr]
    }

    fn vertical(&self) -> [f64; 2] {
        [self.vertical_front, self.vertical_rear]
    }
}

/// Detectors and worst values of one accompany case.
#[derive(Debug, Clone)]
struct Group<const N: usize> {
    labels: [&'static str; N],
    unit: &'static str,
    detectors: [EdgeDetector<f64>; N],
    worst: [f64; N],
}

impl<const N: usize> Group<N> {
    fn new(labels: [&'static str; N], unit: &'static str) -> Self {
        Self {
            labels,
            unit,
            detectors: std::array::from_fn(|_| EdgeDetector::rising_f64()),
            worst: [0.0; N],
        }
    }

    fn detect(&mut self, values: [f64; N], threshold: f64) {
        for ((d, w), v) in self.detectors.iter_mut().zip(self.worst.iter_mut()).zip(values) {
            d.detect(v, threshold);
            *w = w.max(v);
        }
    }

    fn count(&self) -> u32 {
        self.detectors.iter().map(EdgeDetector::count).sum()
    }

    fn triggered(&self) -> bool {
        self.detectors.iter().any(EdgeDetector::latest_state)
    }

    fn pairs(&self) -> impl Iterator<Item = PairData> + '_ {
        self.labels
            .iter()
            .zip(self.worst)
            .map(move |(label, w)| PairData::new(label, format!("{w:.6}{}", self.unit)))
    }
}

#[derive(Debug)]
pub struct ParkingPrecision {
    core: KpiCore,
    space_id: i64,
    lateral_thresh: f64,
    vertical_thresh: f64,
    angle_thresh: f64,
    lateral: Group<4>,
    vertical: Group<2>,
    angle: Group<1>,
    accompany: AccompanyCaseRegistry,
}

impl Default for ParkingPrecision {
    fn default() -> Self {
        Self::new()
    }
}

impl ParkingPrecision {
    pub fn new() -> Self {
        Self {
            core: KpiCore::new(KPI_ID),
            space_id: 0,
            lateral_thresh: 0.0,
            vertical_thresh: 0.0,
            angle_thresh: 0.0,
            lateral: Group::new(
                ["front left lateral distance", "front right lateral distance", "rear left lateral distance", "rear right lateral distance"],
                "m",
            ),
            vertical: Group::new(["front vertical distance", "rear vertical distance"], "m"),
            angle: Group::new(["body angle"], "rad"),
            accompany: AccompanyCaseRegistry::new(),
        }
    }

    /// Sum of all sub-detector counts.
    pub fn count(&self) -> u32 {
        self.lateral.count() + self.vertical.count() + self.angle.count()
    }

    fn sub_config(&self, case_id: &str) -> EvalKpi {
        let mut cfg = self.core.config.clone();
        cfg.name = case_id.to_string();
        cfg.parameters.indicator_name.clear();
        cfg
    }

    fn register_accompany_cases(&mut self) {
        let enabled = self.core.enabled;
        let report = self.core.report_enabled();
        for id in [LATERAL_CASE_ID, VERTICAL_CASE_ID, ANGLE_CASE_ID] {
            let cfg = self.sub_config(id);
            let case = self.accompany.add(id, cfg, enabled);
            if report {
                set_case_info(&mut case.report_case, &case.config);
            }
        }
    }

    fn latest_result(&self) -> Option<ParkingResult> {
        let msg = self.core.messages()?.latest(TOPIC_PARKING_RESULT)?;
        match serde_json::from_value::<ParkingResult>(msg.payload) {
            Ok(result) => Some(result),
            Err(e) => {
                warn!(kpi = KPI_ID, error = %e, "malformed parking result payload");
                None
            }
        }
    }

    fn finish_accompany_case(&mut self, case_id: &str, count: u32, pairs: Vec<PairData>) {
        let limit = self.core.config.pass_condition.value;
        let report = self.core.report_enabled();
        let Some(case) = self.accompany.find_case_by_id_mut(case_id) else {
            return;
        };
        let info = &mut case.report_case.info;
        info.detected_count = count;
        let (state, reason) = if !case.enabled {
            (TestState::Skipped, format!("{case_id} check skipped"))
        } else if f64::from(count) >= limit && limit >= ENFORCE_MIN {
            (TestState::Fail, format!("{case_id} out of tolerance {count} times"))
        } else {
            (TestState::Pass, format!("{case_id} check pass"))
        };
        case.report_case.set_test_result(state, &reason, UNSET, UNSET);
        if report {
            for pair in pairs {
                case.report_case.add_pair(pair);
            }
        }
    }
}

impl Steppable for ParkingPrecision {
    fn init(&mut self, ctx: &InitContext<'_>) -> bool {
        self.core.configure(ctx);
        self.space_id = self.core.resolve_double(PARKING_SPACE_ID) as i64;
        self.lateral_thresh = self.core.resolve_double(LATERAL_THRESHOLD);
        self.vertical_thresh = self.core.resolve_double(VERTICAL_THRESHOLD);
        self.angle_thresh = self.core.resolve_double(BODY_ANGLE_THRESHOLD);
        self.register_accompany_cases();
        true
    }

    fn step(&mut self, ctx: &mut StepContext<'_>) -> bool {
        if !self.core.begin_step() {
            return false;
        }
        let Some(result) = self.latest_result() else {
            debug!(kpi = KPI_ID, t = ctx.sim_time_s, "no parking result this tick");
            return false;
        };
        if result.space_id != self.space_id {
            debug!(kpi = KPI_ID, got = result.space_id, want = self.space_id, "parking result for another space");
            return false;
        }
        if !result.completed {
            return true;
        }

        self.lateral.detect(result.lateral(), self.lateral_thresh);
        self.vertical.detect(result.vertical(), self.vertical_thresh);
        self.angle.detect([result.body_angle.abs()], self.angle_thresh);
        true
    }

    fn stop(&mut self, ctx: &mut StopContext) -> bool {
        if !self.core.finalize() {
            return true;
        }
        ctx.set_feedback(KPI_ID, self.count().to_string());

        let lateral: Vec<_> = self.lateral.pairs().collect();
        let vertical: Vec<_> = self.vertical.pairs().collect();
        let angle: Vec<_> = self.angle.pairs().collect();
        if self.core.report_enabled() {
            for pair in lateral.iter().chain(&vertical).chain(&angle) {
                self.core.case.add_pair(pair.clone());
            }
        }
        let counts = (self.lateral.count(), self.vertical.count(), self.angle.count());
        self.finish_accompany_case(LATERAL_CASE_ID, counts.0, lateral);
        self.finish_accompany_case(VERTICAL_CASE_ID, counts.1, vertical);
        self.finish_accompany_case(ANGLE_CASE_ID, counts.2, angle);
        true
    }
}

impl ScenarioGate for ParkingPrecision {
    fn is_eval_pass(&mut self) -> EvalResult {
        self.core.eval_count(self.count(), "parking precision")
    }

    fn should_stop_scenario(&mut self) -> Option<String> {
        self.core.stop_on_count(self.count(), "imprecise parking")
    }
}

impl Reportable for ParkingPrecision {
    impl_core_reportable!();

    fn accompany_cases(&self) -> Option<&AccompanyCaseRegistry> {
        Some(&self.accompany)
    }

    fn set_grading_msg(&self, msg: &mut GradingMsg) {
        let groups = [
            (LATERAL_CASE_ID, self.lateral.count(), self.lateral.triggered()),
            (VERTICAL_CASE_ID, self.vertical.count(), self.vertical.triggered()),
            (ANGLE_CASE_ID, self.angle.count(), self.angle.triggered()),
        ];
        for (id, count, triggered) in groups {
            msg.has_event |= triggered;
            msg.detected_events.push(DetectedEvent { kpi_id: id.to_string(), count, triggered });
        }
    }
}
