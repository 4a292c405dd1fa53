//! # Stage: KPI Lifecycle
//!
//! ## Responsibility
//! The contract every KPI implements, split by capability:
//!
//! - [`Steppable`]: `init` once, `step` once per tick, `stop` once
//! - [`ScenarioGate`]: pass/fail verdict and early-stop request from detector counts
//! - [`Reportable`]: identity, report case, accompany cases, live telemetry
//!
//! [`Kpi`] is the union the factory hands out. [`KpiCore`] carries the state
//! every KPI shares and implements the count-vs-condition comparison once.
//!
//! ## Guarantees
//! - `init` always returns `true`; a missing configuration or threshold is
//!   reported only through the `enabled` flag
//! - `step` returns `false` without touching detectors when modules are
//!   invalid or the KPI is disabled, and `false` for a skip-tick when a
//!   collaborator has no data this tick
//! - `stop` flushes plots once; later calls change nothing
//!
//! ## NOT Responsible For
//! - The KPI-specific rule evaluated in `step`
//! - Ordering KPIs within a tick (see [`crate::manager`])

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::accompany::AccompanyCaseRegistry;
use crate::env::{ActorSource, MapSource, MessageSource, SimulationModules};
use crate::grading_config::{ConfigProvider, EvalKpi};
use crate::grading_msg::GradingMsg;
use crate::report::{set_case_info, EvalResult, ReportCase};
use crate::settings::GradingSettings;
use crate::threshold;

/// Conditions configured below this value are not enforced.
pub const ENFORCE_MIN: f64 = 0.5;

// ---------------------------------------------------------------------------
// Contexts
// ---------------------------------------------------------------------------

pub struct InitContext<'a> {
    pub config: &'a dyn ConfigProvider,
    pub settings: &'a GradingSettings,
    pub modules: SimulationModules,
}

pub struct StepContext<'a> {
    pub sim_time_s: f64,
    pub grading: &'a mut GradingMsg,
}

#[derive(Debug, Default)]
pub struct StopContext {
    pub feedback: BTreeMap<String, String>,
}

impl StopContext {
    pub fn set_feedback(&mut self, key: &str, value: impl Into<String>) {
        self.feedback.insert(key.to_string(), value.into());
    }
}

// ---------------------------------------------------------------------------
// Capability traits
// ---------------------------------------------------------------------------

pub trait Steppable {
    fn init(&mut self, ctx: &InitContext<'_>) -> bool;
    fn step(&mut self, ctx: &mut StepContext<'_>) -> bool;
    fn stop(&mut self, ctx: &mut StopContext) -> bool;
}

pub trait ScenarioGate {
    fn is_eval_pass(&mut self) -> EvalResult;
    /// `Some(reason)` when this KPI asks the driver to end the scenario.
    fn should_stop_scenario(&mut self) -> Option<String>;
}

pub trait Reportable {
    fn kpi_id(&self) -> &str;
    fn is_enabled(&self) -> bool;
    fn report_case(&self) -> &ReportCase;
    fn report_case_mut(&mut self) -> &mut ReportCase;

    fn accompany_cases(&self) -> Option<&AccompanyCaseRegistry> {
        None
    }

    fn set_grading_msg(&self, _msg: &mut GradingMsg) {}
}

pub trait Kpi: Steppable + ScenarioGate + Reportable {}

impl<T: Steppable + ScenarioGate + Reportable> Kpi for T {}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unconfigured,
    Initialized,
    Stepping,
    Finalized,
}

/// State shared by every KPI implementation.
#[derive(Debug)]
pub struct KpiCore {
    kpi_id: String,
    pub enabled: bool,
    pub config: EvalKpi,
    pub case: ReportCase,
    modules: SimulationModules,
    report_enabled: bool,
    step_time_s: f64,
    phase: Phase,
}

impl KpiCore {
    pub fn new(kpi_id: &str) -> Self {
        debug!(kpi = kpi_id, "kpi constructed");
        Self {
            kpi_id: kpi_id.to_string(),
            enabled: false,
            config: EvalKpi::new(kpi_id),
            case: ReportCase::default(),
            modules: SimulationModules::default(),
            report_enabled: false,
            step_time_s: 0.0,
            phase: Phase::Unconfigured,
        }
    }

    /// Bind modules, look up this KPI's configuration and echo it into the case.
    ///
    /// Returns whether the configuration was found; callers resolve their
    /// thresholds afterwards, which may still clear `enabled`.
    pub fn configure(&mut self, ctx: &InitContext<'_>) -> bool {
        self.modules = ctx.modules.clone();
        self.report_enabled = ctx.settings.report_enabled;
        self.step_time_s = ctx.settings.module_step_time_s;
        self.phase = Phase::Initialized;

        if self.modules.is_valid() {
            match ctx.config.kpi_config_by_name(&self.kpi_id) {
                Some(cfg) => {
                    self.config = cfg;
                    self.enabled = true;
                }
                None => {
                    info!(kpi = %self.kpi_id, "kpi not configured for this scenario");
                    self.enabled = false;
                }
            }
        }
        if self.report_enabled {
            set_case_info(&mut self.case, &self.config);
        }
        self.enabled
    }

    pub fn kpi_id(&self) -> &str {
        &self.kpi_id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn modules_valid(&self) -> bool {
        self.modules.is_valid()
    }

    /// Gate for `step`: modules wired and KPI enabled. Marks the core as stepping.
    pub fn begin_step(&mut self) -> bool {
        if !(self.modules_valid() && self.enabled) {
            debug!(kpi = %self.kpi_id, "kpi not active this tick");
            return false;
        }
        if self.phase == Phase::Initialized {
            self.phase = Phase::Stepping;
        }
        self.phase == Phase::Stepping
    }

    /// Move to `Finalized`. Returns `false` if already finalized.
    pub fn finalize(&mut self) -> bool {
        if self.phase == Phase::Finalized {
            return false;
        }
        self.phase = Phase::Finalized;
        true
    }

    pub fn report_enabled(&self) -> bool {
        self.report_enabled
    }

    pub fn step_time_s(&self) -> f64 {
        self.step_time_s
    }

    pub fn actors(&self) -> Option<&dyn ActorSource> {
        self.modules.actors.as_deref()
    }

    pub fn map(&self) -> Option<&dyn MapSource> {
        self.modules.map.as_deref()
    }

    pub fn messages(&self) -> Option<&dyn MessageSource> {
        self.modules.messages.as_deref()
    }

    pub fn resolve_bool(&mut self, id: &str) -> bool {
        threshold::resolve_bool(&self.config, &mut self.enabled, id)
    }

    pub fn resolve_double(&mut self, id: &str) -> f64 {
        threshold::resolve_double(&self.config, &mut self.enabled, id)
    }

    pub fn resolve_string(&mut self, id: &str) -> String {
        threshold::resolve_string(&self.config, &mut self.enabled, id)
    }

    pub fn resolve_primary_double(&mut self) -> f64 {
        threshold::resolve_primary_double(&self.config, &mut self.enabled)
    }

    /// Verdict from a detected count against the pass condition.
    pub fn eval_count(&mut self, count: u32, label: &str) -> EvalResult {
        if !self.enabled {
            return EvalResult::pass(format!("{label} check skipped"));
        }
        self.case.info.detected_count = count;
        let limit = self.config.pass_condition.value;
        if f64::from(count) >= limit && limit >= ENFORCE_MIN {
            EvalResult::fail(format!("{label} detected {count} times, limit {limit}"))
        } else {
            EvalResult::pass(format!("{label} check pass"))
        }
    }

    /// Early-stop request from a detected count against the finish condition.
    pub fn stop_on_count(&mut self, count: u32, label: &str) -> Option<String> {
        let limit = self.config.finish_condition.value;
        let stop = f64::from(count) >= limit && limit >= ENFORCE_MIN;
        self.case.info.request_stop = stop;
        stop.then(|| label.to_string())
    }
}

/// Implements [`Reportable`]'s identity and case accessors for a struct with a `core: KpiCore` field.
#[macro_export]
macro_rules! impl_core_reportable {
    () => {
        fn kpi_id(&self) -> &str {
            self.core.kpi_id()
        }

        fn is_enabled(&self) -> bool {
            self.core.enabled
        }

        fn report_case(&self) -> &$crate::report::ReportCase {
            &self.core.case
        }

        fn report_case_mut(&mut self) -> &mut $crate::report::ReportCase {
            &mut self.core.case
        }
    };
}
