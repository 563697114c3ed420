//! Terminal UI module using ratatui.
//!
//! - `render`: layout chrome (title bar, content area, status bar)
//! - `pages`: routed page content
//! - `input`: keyboard event handling
//! - `styles`: colors and text styling

pub mod input;
pub mod pages;
pub mod render;
pub mod styles;
