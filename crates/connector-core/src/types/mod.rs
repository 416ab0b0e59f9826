mod identity;
mod mode;
mod subject;

pub use identity::*;
pub use mode::*;
pub use subject::*;
