pub mod relay_hopper;

pub use relay_hopper::RelayHopper;
