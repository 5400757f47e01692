//! Mathematical structs and functions.
//!
//! Coordinates follow the renderer's screen convention: the x axis points right
//! and the y axis points down, so a positive angle turns clockwise on screen.

use cgmath::{Point2, Vector2};
pub use util::*;

mod util;

/// A 2D point
pub type Point2d = Point2<f64>;

/// A 2D vector
pub type Vector2d = Vector2<f64>;
