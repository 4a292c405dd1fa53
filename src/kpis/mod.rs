//! Built-in KPIs.
//!
//! Each KPI owns its detectors and report plots; plots are flushed into the
//! KPI's report case once, at `stop`.

pub mod acceleration;
pub mod collision;
pub mod over_speed;
pub mod parking;

use crate::factory::KpiFactory;

pub use acceleration::AccelerationLimit;
pub use collision::Collision;
pub use over_speed::OverSpeed;
pub use parking::ParkingPrecision;

/// Register every built-in KPI under its configuration id.
pub fn register_builtin_kpis(factory: &mut KpiFactory) {
    factory.register(collision::KPI_ID, || Box::new(Collision::new()));
    factory.register(acceleration::MAX_ACCELERATION_ID, || Box::new(AccelerationLimit::max_acceleration()));
    factory.register(acceleration::MAX_DECELERATION_ID, || Box::new(AccelerationLimit::max_deceleration()));
    factory.register(acceleration::MAX_LATERAL_ACCELERATION_ID, || Box::new(AccelerationLimit::max_lateral()));
    factory.register(over_speed::KPI_ID, || Box::new(OverSpeed::new()));
    factory.register(parking::KPI_ID, || Box::new(ParkingPrecision::new()));
}
