mod line_search;

pub use line_search::{DERIVATIVE_TOLERANCE, line_search};
