mod config;
mod engine;
mod session;
