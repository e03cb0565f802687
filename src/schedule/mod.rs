//! Local-time scheduling for proxy use

mod gate;

pub use gate::TimeWindowGate;
