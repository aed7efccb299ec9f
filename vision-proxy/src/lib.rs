//! vision-proxy: forwards a prompt and optional image to a multimodal
//! chat-completion API, keeping the API key on the server.

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
