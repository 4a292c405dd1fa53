use std::process::ExitCode;

use clap::Parser;
use colored::*;
use tracing_subscriber::EnvFilter;

use kpi_grading::cli::Args;
use kpi_grading::error::{GradingError, GradingResult};
use kpi_grading::factory::{global_ids, KpiFactory};
use kpi_grading::grading_config::KpiGroup;
use kpi_grading::manager::EvalManager;
use kpi_grading::report::{TestReport, TestState};
use kpi_grading::settings::GradingSettings;
use kpi_grading::trace::{replay, Trace};

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn paint(state: Option<TestState>) -> ColoredString {
    match state {
        Some(TestState::Pass)      => "PASS".green().bold(),
        Some(TestState::Fail)      => "FAIL".red().bold(),
        Some(TestState::Skipped)   => "SKIP".yellow(),
        Some(TestState::Undefined) | None => "----".dimmed(),
    }
}

fn print_report(report: &TestReport) {
    println!("{} {}", "scene".bold(), report.scene_name);
    for case in &report.cases {
        let result = case.info.result.as_ref();
        println!(
            "  {} {:<32} count={:<3} {}",
            paint(result.map(|r| r.state)),
            case.info.name,
            case.info.detected_count,
            result.map(|r| r.reason.as_str()).unwrap_or("").dimmed()
        );
    }
    if report.is_pass {
        println!("{}", "scenario passed".green().bold());
    } else {
        println!("{} {}", "scenario failed:".red().bold(), report.reason);
    }
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

fn run(args: &Args, settings: &GradingSettings) -> GradingResult<bool> {
    let (Some(grading), Some(trace)) = (&args.grading, &args.trace) else {
        return Err(GradingError::InvalidConfig("--grading and --trace are required".to_string()));
    };
    let config = KpiGroup::load(grading)?;
    let trace = Trace::load(trace)?;
    let scene_name = trace.scene_name.clone();

    let mut manager = EvalManager::new(KpiFactory::with_builtins(), settings.clone()).with_scene_name(&scene_name);
    manager.create(&config);
    let report = replay(&mut manager, trace);
    print_report(&report);

    if let Some(path) = args.report_path(settings.report_dir.as_ref(), &scene_name) {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(&path, report.to_json_pretty()?)?;
        tracing::info!(path = %path.display(), "report written");
    }
    Ok(report.is_pass)
}

fn main() -> ExitCode {
    let args = Args::parse();

    let settings = match GradingSettings::load(args.settings.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{} {e}", "error:".red().bold());
            return ExitCode::from(2);
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    if args.list_kpis {
        for id in global_ids() {
            println!("{id}");
        }
        return ExitCode::SUCCESS;
    }

    match run(&args, &settings) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("{} {e}", "error:".red().bold());
            ExitCode::from(2)
        }
    }
}
