//! Helpers shared by the fetch layer and the command line.
//!
//! - **Locations**: turning user input into something fetchable
//! - **Text**: width-aware truncation and safe terminal output

mod location;
mod text;

pub use location::{normalize_location, parse_location, Location, LocationError};
pub use text::{render_description, strip_control_chars, truncate_to_width};
