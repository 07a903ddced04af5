// Accounts and sessions: password login, OAuth exchange, cookie sessions.

pub mod extractors;
pub mod handlers;
pub mod oauth;
pub mod session;
