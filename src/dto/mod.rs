//! Request and response bodies of the HTTP surface.

pub mod health;
pub mod roster;
pub mod sse;
pub mod validation;
