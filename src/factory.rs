//! KPI factory: maps a KPI id to a constructor.
//!
//! A [`KpiFactory`] value is what the scenario driver uses. The process-wide
//! instance behind [`register_global`] / [`build_global`] lets a KPI defined
//! outside this crate self-register before any scenario is created. It is
//! seeded with the built-in KPIs on first use.
//!
//! Registering an id twice replaces the earlier constructor.

use std::collections::BTreeMap;
use std::sync::Mutex;

use once_cell::sync::Lazy;
use tracing::{debug, warn};

use crate::kpi::Kpi;
use crate::kpis::register_builtin_kpis;

pub type KpiCtor = Box<dyn Fn() -> Box<dyn Kpi> + Send + Sync>;

#[derive(Default)]
pub struct KpiFactory {
    ctors: BTreeMap<String, KpiCtor>,
}

impl KpiFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// A factory pre-populated with every built-in KPI.
    pub fn with_builtins() -> Self {
        let mut factory = Self::new();
        register_builtin_kpis(&mut factory);
        factory
    }

    pub fn register<F>(&mut self, kpi_id: &str, ctor: F)
    where
        F: Fn() -> Box<dyn Kpi> + Send + Sync + 'static,
    {
        if self.ctors.insert(kpi_id.to_string(), Box::new(ctor)).is_some() {
            warn!(kpi = kpi_id, "kpi constructor replaced");
        } else {
            debug!(kpi = kpi_id, "kpi constructor registered");
        }
    }

    /// A fresh instance for `kpi_id`, or `None` if nothing is registered under it.
    pub fn build(&self, kpi_id: &str) -> Option<Box<dyn Kpi>> {
        self.ctors.get(kpi_id).map(|ctor| ctor())
    }

    pub fn contains(&self, kpi_id: &str) -> bool {
        self.ctors.contains_key(kpi_id)
    }

    /// Registered ids in sorted order.
    pub fn ids(&self) -> Vec<String> {
        self.ctors.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.ctors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ctors.is_empty()
    }
}

impl std::fmt::Debug for KpiFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KpiFactory").field("ids", &self.ids()).finish()
    }
}

static GLOBAL: Lazy<Mutex<KpiFactory>> = Lazy::new(|| Mutex::new(KpiFactory::with_builtins()));

/// Register `ctor` with the process-wide factory.
pub fn register_global<F>(kpi_id: &str, ctor: F)
where
    F: Fn() -> Box<dyn Kpi> + Send + Sync + 'static,
{
    GLOBAL.lock().unwrap_or_else(|e| e.into_inner()).register(kpi_id, ctor);
}

/// Build `kpi_id` from the process-wide factory.
pub fn build_global(kpi_id: &str) -> Option<Box<dyn Kpi>> {
    GLOBAL.lock().unwrap_or_else(|e| e.into_inner()).build(kpi_id)
}

pub fn global_ids() -> Vec<String> {
    GLOBAL.lock().unwrap_or_else(|e| e.into_inner()).ids()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kpi::Reportable;
    use crate::kpis::collision::Collision;

    #[test]
    fn test_builtins_registered() {
        let f = KpiFactory::with_builtins();
        for id in ["Collision", "MaxAcceleration_V", "MaxDeceleration_V", "MaxLateralAcceleration", "OverSpeed", "ParkingPrecision"] {
            assert!(f.contains(id), "{id} missing");
        }
    }

    #[test]
    fn test_unknown_id_is_none() {
        assert!(KpiFactory::new().build("Nope").is_none());
    }

    #[test]
    fn test_each_build_is_fresh() {
        let f = KpiFactory::with_builtins();
        let a = f.build("Collision").unwrap();
        let b = f.build("Collision").unwrap();
        assert_eq!(a.kpi_id(), b.kpi_id());
        assert!(!std::ptr::eq(a.report_case(), b.report_case()));
    }

    #[test]
    fn test_last_registration_wins() {
        let mut f = KpiFactory::new();
        f.register("Alias", || Box::new(Collision::new()));
        f.register("Alias", || Box::new(crate::kpis::over_speed::OverSpeed::new()));
        assert_eq!(f.len(), 1);
        assert_eq!(f.build("Alias").unwrap().kpi_id(), "OverSpeed");
    }
}
