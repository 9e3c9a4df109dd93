pub mod admin;
pub mod advise;
pub mod auth;
pub mod meta;
pub mod search;
