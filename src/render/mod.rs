pub mod source;
pub mod step;
pub mod surface;
