//! # Stage: Threshold Resolver
//!
//! ## Responsibility
//! Resolve a named threshold from an [`EvalKpi`] into a typed value.
//!
//! Every `resolve_*` function takes the owning KPI's `enabled` flag by
//! `&mut bool`. A missing, mistyped or unparsable threshold clears the flag,
//! which disables the whole KPI, and the function returns the zero value of
//! its type. A flag that is already `false` short-circuits without scanning.
//!
//! ## Guarantees
//! - Fail-closed: a failed lookup always leaves `*enabled == false`
//! - Contained: [`GradingError`] never escapes a `resolve_*` call; it is logged
//!
//! ## NOT Responsible For
//! - Locating the KPI configuration itself (see [`crate::grading_config::ConfigProvider`])

use tracing::warn;

use crate::error::{GradingError, GradingResult};
use crate::grading_config::{EvalKpi, ThresholdKind};

/// Id used when a KPI asks for its single primary threshold.
pub const DEFAULT_THRESH_ID: &str = "Default_Thresh_ID";

fn parse_bool(raw: &str) -> Option<bool> {
    raw.trim().parse::<i64>().ok().map(|v| v != 0)
}

fn parse_double(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok()
}

/// Typed lookup of threshold `id`. `DEFAULT_THRESH_ID` falls back to the first
/// threshold in the list when no entry carries that literal id.
pub fn lookup<T>(
    config: &EvalKpi,
    id: &str,
    kind: ThresholdKind,
    parse: impl Fn(&str) -> Option<T>,
) -> GradingResult<T> {
    let thresholds = &config.parameters.thresholds;
    let entry = thresholds
        .iter()
        .find(|t| t.threshold_id == id && t.kind == kind)
        .or_else(|| {
            if id == DEFAULT_THRESH_ID {
                thresholds.first().filter(|t| t.kind == kind)
            } else {
                None
            }
        });

    let Some(entry) = entry else {
        if let Some(other) = thresholds.iter().find(|t| t.threshold_id == id) {
            return Err(GradingError::ThresholdKindMismatch {
                kpi: config.name.clone(),
                id: id.to_string(),
                expected: kind,
                found: other.kind,
            });
        }
        return Err(GradingError::ThresholdNotFound {
            kpi: config.name.clone(),
            id: id.to_string(),
        });
    };

    parse(&entry.raw_value).ok_or_else(|| GradingError::MalformedThreshold {
        id: entry.threshold_id.clone(),
        kind,
        raw: entry.raw_value.clone(),
    })
}

fn resolve<T: Default>(
    config: &EvalKpi,
    enabled: &mut bool,
    id: &str,
    kind: ThresholdKind,
    parse: impl Fn(&str) -> Option<T>,
) -> T {
    if !*enabled {
        return T::default();
    }
    match lookup(config, id, kind, parse) {
        Ok(v) => v,
        Err(e) => {
            warn!(kpi = %config.name, error = %e, "threshold resolution failed, kpi disabled");
            *enabled = false;
            T::default()
        }
    }
}

pub fn resolve_bool(config: &EvalKpi, enabled: &mut bool, id: &str) -> bool {
    resolve(config, enabled, id, ThresholdKind::Bool, parse_bool)
}

pub fn resolve_double(config: &EvalKpi, enabled: &mut bool, id: &str) -> f64 {
    resolve(config, enabled, id, ThresholdKind::Double, parse_double)
}

pub fn resolve_string(config: &EvalKpi, enabled: &mut bool, id: &str) -> String {
    resolve(config, enabled, id, ThresholdKind::String, |raw| Some(raw.to_string()))
}

/// The KPI's primary double threshold, i.e. `resolve_double` with [`DEFAULT_THRESH_ID`].
pub fn resolve_primary_double(config: &EvalKpi, enabled: &mut bool) -> f64 {
    resolve_double(config, enabled, DEFAULT_THRESH_ID)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading_config::ThresholdSpec;

    fn kpi() -> EvalKpi {
        EvalKpi::new("Test")
            .with_threshold(ThresholdSpec::new("Limit", ThresholdKind::Double, " 2.5 "))
            .with_threshold(ThresholdSpec::new("Flag", ThresholdKind::Bool, "1"))
            .with_threshold(ThresholdSpec::new("Off", ThresholdKind::Bool, "0"))
            .with_threshold(ThresholdSpec::new("Mode", ThresholdKind::String, "strict"))
            .with_threshold(ThresholdSpec::new("Broken", ThresholdKind::Double, "fast"))
    }

    #[test]
    fn test_resolve_each_kind() {
        let cfg = kpi();
        let mut enabled = true;
        assert_eq!(resolve_double(&cfg, &mut enabled, "Limit"), 2.5);
        assert!(resolve_bool(&cfg, &mut enabled, "Flag"));
        assert!(!resolve_bool(&cfg, &mut enabled, "Off"));
        assert_eq!(resolve_string(&cfg, &mut enabled, "Mode"), "strict");
        assert!(enabled);
    }

    #[test]
    fn test_missing_bool_disables() {
        let cfg = EvalKpi::new("Empty");
        let mut enabled = true;
        assert!(!resolve_bool(&cfg, &mut enabled, "X"));
        assert!(!enabled);
    }

    #[test]
    fn test_missing_double_disables_and_short_circuits() {
        let cfg = kpi();
        let mut enabled = true;
        assert_eq!(resolve_double(&cfg, &mut enabled, "Nope"), 0.0);
        assert!(!enabled);
        // Now disabled: even a valid id yields the zero value.
        assert_eq!(resolve_double(&cfg, &mut enabled, "Limit"), 0.0);
        assert!(!enabled);
    }

    #[test]
    fn test_wrong_kind_disables() {
        let cfg = kpi();
        let mut enabled = true;
        assert_eq!(resolve_double(&cfg, &mut enabled, "Flag"), 0.0);
        assert!(!enabled);
        let err = lookup(&cfg, "Flag", ThresholdKind::Double, parse_double).unwrap_err();
        assert!(matches!(err, GradingError::ThresholdKindMismatch { .. }));
    }

    #[test]
    fn test_malformed_value_disables() {
        let cfg = kpi();
        let mut enabled = true;
        assert_eq!(resolve_double(&cfg, &mut enabled, "Broken"), 0.0);
        assert!(!enabled);
    }

    #[test]
    fn test_malformed_bool_disables() {
        let cfg = EvalKpi::new("B").with_threshold(ThresholdSpec::new("F", ThresholdKind::Bool, "yes"));
        let mut enabled = true;
        assert!(!resolve_bool(&cfg, &mut enabled, "F"));
        assert!(!enabled);
    }

    #[test]
    fn test_primary_falls_back_to_first_threshold() {
        let cfg = kpi();
        let mut enabled = true;
        assert_eq!(resolve_primary_double(&cfg, &mut enabled), 2.5);
        assert!(enabled);
    }

    #[test]
    fn test_primary_prefers_literal_default_id() {
        let cfg = kpi().with_threshold(ThresholdSpec::new(DEFAULT_THRESH_ID, ThresholdKind::Double, "9"));
        let mut enabled = true;
        assert_eq!(resolve_primary_double(&cfg, &mut enabled), 9.0);
    }

    #[test]
    fn test_primary_on_empty_config_disables() {
        let cfg = EvalKpi::new("Empty");
        let mut enabled = true;
        assert_eq!(resolve_primary_double(&cfg, &mut enabled), 0.0);
        assert!(!enabled);
    }
}
