pub mod clinical;
pub mod diagnosis;
pub mod enums;
pub mod evidence;
pub mod feedback;

pub use clinical::*;
pub use diagnosis::*;
pub use enums::*;
pub use evidence::*;
pub use feedback::*;
