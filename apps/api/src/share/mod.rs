//! Public share links for CVs (premium feature).

pub mod handlers;
