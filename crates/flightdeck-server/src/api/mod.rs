// ABOUTME: API module containing the HTTP handler functions for the flightdeck JSON API.
// ABOUTME: Chat turns and session clearing live in `chat`; tool listing in `tools`.

pub mod chat;
pub mod tools;
