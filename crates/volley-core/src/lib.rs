pub mod caller;
pub mod config;
pub mod dispatch;
pub mod gate;
pub mod stats;

pub use caller::*;
pub use config::*;
pub use dispatch::*;
pub use gate::*;
pub use stats::*;
