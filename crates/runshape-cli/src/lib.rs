//! Runshape CLI - command line front end for the route generator.
//!
//! Binaries:
//! - runshape: generate, bounds, suggest and shapes subcommands, JSON output

pub mod input;
pub mod output;

pub use input::{load_points_file, parse_points, ShapeSource};
pub use output::{error_json, print_json};
