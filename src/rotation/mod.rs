//! Proxy rotation
//!
//! The rotor is the single owner of the rotation cursor.

mod round_robin;

pub use round_robin::ProxyRotor;
