pub mod arguments;

pub use arguments::{build_launch_arguments, doorstop_target_assembly};
