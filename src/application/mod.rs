//! Application services: the render endpoint core, the preview controller and
//! the collaborators they depend on.

pub mod controller;
pub mod editors;
pub mod error;
pub mod preview;
pub mod render;
pub mod tokens;
