//! Per-tick KPI grading for autonomous-driving simulation.
//!
//! A scenario's grading configuration names a set of KPIs. Each KPI is built
//! by the [`factory`], configured once from its [`grading_config::EvalKpi`]
//! record, stepped once per simulation tick against read-only [`env`]
//! collaborators, and finally turned into a pass/fail [`report::ReportCase`].
//! The [`manager`] drives that lifecycle for every KPI of a scenario.

pub mod accompany;
pub mod cli;
pub mod detector;
pub mod env;
pub mod error;
pub mod factory;
pub mod grading_config;
pub mod grading_msg;
pub mod kpi;
pub mod kpis;
pub mod manager;
pub mod report;
pub mod settings;
pub mod threshold;
pub mod trace;

pub use detector::{EdgeDetector, Polarity};
pub use error::{GradingError, GradingResult};
pub use factory::KpiFactory;
pub use grading_config::{EvalKpi, KpiGroup, ThresholdKind, ThresholdSpec};
pub use kpi::{Kpi, KpiCore, ScenarioGate, Reportable, Steppable};
pub use manager::{EvalManager, StepOutcome};
pub use report::{EvalResult, ReportCase, TestReport, TestState};
pub use settings::GradingSettings;
