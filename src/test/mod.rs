pub mod utils;

mod auth;
mod push;
