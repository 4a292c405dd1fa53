//! Secondary report cases owned by a composite KPI.
//!
//! A composite KPI reports several sub-detectors as if they were independent
//! KPIs without registering each one with the factory. Lookups are a linear
//! scan returning the first match; ids are not required to be unique.

use crate::grading_config::EvalKpi;
use crate::report::ReportCase;

#[derive(Debug, Clone)]
pub struct AccompanyCase {
    pub kpi_id: String,
    pub config: EvalKpi,
    pub enabled: bool,
    pub report_case: ReportCase,
}

#[derive(Debug, Clone, Default)]
pub struct AccompanyCaseRegistry {
    cases: Vec<AccompanyCase>,
}

impl AccompanyCaseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sub-case and return it for further setup.
    pub fn add(&mut self, kpi_id: &str, config: EvalKpi, enabled: bool) -> &mut AccompanyCase {
        self.cases.push(AccompanyCase {
            kpi_id: kpi_id.to_string(),
            config,
            enabled,
            report_case: ReportCase::default(),
        });
        let last = self.cases.len() - 1;
        &mut self.cases[last]
    }

    pub fn find_case_by_id(&self, kpi_id: &str) -> Option<&AccompanyCase> {
        self.cases.iter().find(|c| c.kpi_id == kpi_id)
    }

    pub fn find_case_by_id_mut(&mut self, kpi_id: &str) -> Option<&mut AccompanyCase> {
        self.cases.iter_mut().find(|c| c.kpi_id == kpi_id)
    }

    pub fn find_report_by_id(&self, kpi_id: &str) -> Option<&ReportCase> {
        self.find_case_by_id(kpi_id).map(|c| &c.report_case)
    }

    pub fn find_report_by_id_mut(&mut self, kpi_id: &str) -> Option<&mut ReportCase> {
        self.find_case_by_id_mut(kpi_id).map(|c| &mut c.report_case)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AccompanyCase> {
        self.cases.iter()
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_find() {
        let mut reg = AccompanyCaseRegistry::new();
        reg.add("A", EvalKpi::new("A"), true).report_case.info.name = "first".into();
        reg.add("B", EvalKpi::new("B"), false);
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.find_report_by_id("A").unwrap().info.name, "first");
        assert!(!reg.find_case_by_id("B").unwrap().enabled);
    }

    #[test]
    fn test_missing_id_is_none() {
        let reg = AccompanyCaseRegistry::new();
        assert!(reg.is_empty());
        assert!(reg.find_case_by_id("X").is_none());
        assert!(reg.find_report_by_id("X").is_none());
    }

    #[test]
    fn test_duplicate_ids_return_first() {
        let mut reg = AccompanyCaseRegistry::new();
        reg.add("Dup", EvalKpi::new("one"), true);
        reg.add("Dup", EvalKpi::new("two"), true);
        assert_eq!(reg.find_case_by_id("Dup").unwrap().config.name, "one");
        reg.find_report_by_id_mut("Dup").unwrap().info.detected_count = 4;
        assert_eq!(reg.iter().next().unwrap().report_case.info.detected_count, 4);
    }
}
