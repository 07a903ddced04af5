//! CV document CRUD, scoped to the authenticated owner.

pub mod handlers;
