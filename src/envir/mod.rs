mod bindings;
mod resolver;
mod tier;
mod version;

pub use bindings::{Environment, PathBindings};
pub use resolver::Resolver;
pub use tier::{Layout, Tier};
