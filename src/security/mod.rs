pub mod path_guard;
pub mod sql_safety;

pub use path_guard::*;
pub use sql_safety::*;
