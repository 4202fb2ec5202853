#[macro_use]
pub mod enums;
pub mod decision;
pub mod evidence;
pub mod extraction;
pub mod note;
pub mod volume;

pub use decision::*;
pub use enums::*;
pub use evidence::*;
pub use extraction::*;
pub use note::*;
pub use volume::*;
