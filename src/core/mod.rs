pub mod demand;
pub mod equipment;
pub mod solar_yield;
pub mod units;
