//! # Stage: Scenario Driver
//!
//! ## Responsibility
//! Own the KPI instances of one scenario run and drive them through
//! create → init → step* → stop, then assemble the [`TestReport`].
//!
//! ## Guarantees
//! - KPIs run in configuration order, sequentially, on the caller's thread
//! - Every KPI is asked `should_stop_scenario` every tick, so each case's
//!   `request_stop` reflects the latest tick; all stop reasons are joined with `;`
//! - An unknown configured KPI name is logged and skipped, never fatal
//! - Invalid simulation modules fail the report with an eval-fault reason
//!
//! ## NOT Responsible For
//! - Producing simulation state (see [`crate::env`] and [`crate::trace`])
//! - Writing the report anywhere

use tracing::{debug, error, info, warn};

use crate::env::SimulationModules;
use crate::error::GradingError;
use crate::factory::{build_global, KpiFactory};
use crate::grading_config::KpiGroup;
use crate::grading_msg::GradingMsg;
use crate::kpi::{InitContext, Kpi, Reportable, ScenarioGate, StepContext, Steppable, StopContext};
use crate::report::{score_case_by_pass_condition, TestReport, TestState, UNSET};
use crate::settings::GradingSettings;

/// Result of one driver tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepOutcome {
    pub should_stop: bool,
    /// `;`-joined reasons of every KPI requesting a stop this tick.
    pub reason: String,
}

fn join_reason(acc: &mut String, reason: &str) {
    if !acc.is_empty() {
        acc.push(';');
    }
    acc.push_str(reason);
}

pub struct EvalManager {
    factory: KpiFactory,
    settings: GradingSettings,
    config: KpiGroup,
    kpis: Vec<Box<dyn Kpi>>,
    modules: SimulationModules,
    grading: GradingMsg,
    scene_name: String,
    start_t_s: Option<f64>,
    cur_t_s: f64,
}

impl EvalManager {
    pub fn new(factory: KpiFactory, settings: GradingSettings) -> Self {
        Self {
            factory,
            settings,
            config: KpiGroup::default(),
            kpis: Vec::new(),
            modules: SimulationModules::default(),
            grading: GradingMsg::default(),
            scene_name: String::new(),
            start_t_s: None,
            cur_t_s: 0.0,
        }
    }

    pub fn with_scene_name(mut self, scene_name: &str) -> Self {
        self.scene_name = scene_name.to_string();
        self
    }

    /// Build one KPI per configured name, from this manager's factory first and
    /// the process-wide one second. Returns how many were built.
    pub fn create(&mut self, config: &KpiGroup) -> usize {
        self.config = config.clone();
        self.kpis.clear();
        for name in config.names() {
            match self.factory.build(name).or_else(|| build_global(name)) {
                Some(kpi) => self.kpis.push(kpi),
                None => warn!(error = %GradingError::UnknownKpi(name.to_string()), "kpi skipped"),
            }
        }
        info!(configured = config.kpis.len(), built = self.kpis.len(), "kpis created");
        self.kpis.len()
    }

    pub fn init(&mut self, modules: SimulationModules) {
        if !modules.is_valid() {
            error!(?modules, "simulation modules incomplete, every kpi will skip");
        }
        self.modules = modules;
        let ctx = InitContext {
            config: &self.config,
            settings: &self.settings,
            modules: self.modules.clone(),
        };
        for kpi in self.kpis.iter_mut() {
            kpi.init(&ctx);
            debug!(kpi = kpi.kpi_id(), enabled = kpi.is_enabled(), "kpi initialised");
        }
    }

    pub fn step(&mut self, sim_time_s: f64) -> StepOutcome {
        let mut outcome = StepOutcome::default();
        if !self.modules.is_valid() {
            return outcome;
        }
        self.start_t_s.get_or_insert(sim_time_s);
        self.cur_t_s = sim_time_s;
        self.grading.begin_tick(sim_time_s);

        for kpi in self.kpis.iter_mut() {
            let mut ctx = StepContext { sim_time_s, grading: &mut self.grading };
            kpi.step(&mut ctx);
            kpi.set_grading_msg(&mut self.grading);
            if let Some(reason) = kpi.should_stop_scenario() {
                outcome.should_stop = true;
                join_reason(&mut outcome.reason, &reason);
            }
        }
        if outcome.should_stop {
            info!(t = sim_time_s, reason = %outcome.reason, "scenario stop requested");
        }
        outcome
    }

    /// Stop every KPI, collect verdicts and build the report.
    pub fn stop(&mut self) -> TestReport {
        let mut report = TestReport::new(&self.scene_name, self.start_t_s.unwrap_or(0.0));
        report.set_end_second(self.cur_t_s);

        if !self.modules.is_valid() {
            report.is_pass = false;
            report.reason = "eval fault, simulation modules incomplete".to_string();
            return report;
        }

        let mut stop_ctx = StopContext::default();
        for kpi in self.kpis.iter_mut() {
            kpi.stop(&mut stop_ctx);

            let verdict = kpi.is_eval_pass();
            if !verdict.is_pass() {
                report.is_pass = false;
                join_reason(&mut report.reason, &verdict.reason);
            }

            let case = kpi.report_case_mut();
            case.set_test_result(verdict.state, &verdict.reason, UNSET, UNSET);
            if let Some(cfg) = case.info.grading_kpi.clone() {
                score_case_by_pass_condition(&cfg, case);
            }
            report.cases.push(case.clone());

            if let Some(accompany) = kpi.accompany_cases() {
                for sub in accompany.iter() {
                    let mut case = sub.report_case.clone();
                    if case.info.result.is_none() {
                        case.set_test_result(TestState::Undefined, "", UNSET, UNSET);
                    }
                    report.cases.push(case);
                }
            }
        }

        stop_ctx.set_feedback("Time", format!("{}", self.cur_t_s));
        stop_ctx.set_feedback("is_pass", report.is_pass.to_string());
        stop_ctx.set_feedback("reason", report.reason.clone());
        stop_ctx.set_feedback("SceneName", self.scene_name.clone());
        report.feedback = stop_ctx.feedback;

        info!(pass = report.is_pass, cases = report.cases.len(), reason = %report.reason, "grading finished");
        report
    }

    pub fn kpis(&self) -> &[Box<dyn Kpi>] {
        &self.kpis
    }

    /// Telemetry written during the latest tick.
    pub fn grading_msg(&self) -> &GradingMsg {
        &self.grading
    }

    pub fn settings(&self) -> &GradingSettings {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_reason() {
        let mut s = String::new();
        join_reason(&mut s, "collision");
        join_reason(&mut s, "over speed");
        assert_eq!(s, "collision;over speed");
    }

    #[test]
    fn test_unknown_kpi_skipped() {
        let mut m = EvalManager::new(KpiFactory::with_builtins(), GradingSettings::default());
        let group = KpiGroup::new(vec![
            crate::grading_config::EvalKpi::new("Collision"),
            crate::grading_config::EvalKpi::new("NoSuchKpi"),
        ]);
        assert_eq!(m.create(&group), 1);
    }

    #[test]
    fn test_invalid_modules_fail_report() {
        let mut m = EvalManager::new(KpiFactory::with_builtins(), GradingSettings::default()).with_scene_name("s");
        m.create(&KpiGroup::new(vec![crate::grading_config::EvalKpi::new("Collision")]));
        m.init(SimulationModules::default());
        assert!(!m.step(0.1).should_stop);
        let report = m.stop();
        assert!(!report.is_pass);
        assert!(report.reason.contains("eval fault"));
    }
}
