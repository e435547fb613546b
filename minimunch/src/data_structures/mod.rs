pub mod constants;
mod record;

pub use constants::*;
pub use record::*;
