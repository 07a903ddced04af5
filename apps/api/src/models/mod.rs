pub mod cv;
pub mod payment;
pub mod session;
pub mod share;
pub mod user;
