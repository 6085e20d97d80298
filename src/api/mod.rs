//! REST API for the board.
//!
//! The caller is identified by the `x-user-id` header; authentication itself
//! happens upstream.

mod board;
mod rules;
mod server;
mod tasks;

pub use server::{AppState, CurrentUser, ServerHandle, USER_HEADER, build_router, start_server};
