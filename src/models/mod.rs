pub mod proxy;
pub mod settings;

pub use proxy::*;
pub use settings::*;
