use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "kpi-grading")]
#[command(version)]
#[command(about = "Grade a recorded driving scenario against its KPI configuration")]
pub struct Args {
    /// Grading configuration (grading.json)
    #[arg(long, short = 'g', required_unless_present = "list_kpis")]
    pub grading: Option<PathBuf>,

    /// Recorded scenario trace (JSON list of ticks)
    #[arg(long, short = 't', required_unless_present = "list_kpis")]
    pub trace: Option<PathBuf>,

    /// Runtime settings (TOML); KPI_GRADING_* env vars override it
    #[arg(long, short = 's')]
    pub settings: Option<PathBuf>,

    /// Write the JSON report here instead of the settings' report_dir
    #[arg(long, short = 'r')]
    pub report: Option<PathBuf>,

    /// Print registered KPI ids and exit
    #[arg(long)]
    pub list_kpis: bool,
}

impl Args {
    /// Where the report goes: `--report`, else `<report_dir>/<scene>_report.json`, else nowhere.
    pub fn report_path(&self, report_dir: Option<&PathBuf>, scene_name: &str) -> Option<PathBuf> {
        if let Some(path) = &self.report {
            return Some(path.clone());
        }
        let scene = if scene_name.is_empty() { "scenario" } else { scene_name };
        report_dir.map(|dir| dir.join(format!("{scene}_report.json")))
    }
}
