pub mod config;
pub mod endpoint;
pub mod engine;
pub mod identity;
pub mod publish;
pub mod resolve;
pub mod server;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Identity(#[from] identity::IdentityError),

    #[error(transparent)]
    Publish(#[from] publish::PublishError),

    #[error(transparent)]
    Server(#[from] server::ServerError),

    #[error(transparent)]
    Engine(#[from] engine::EngineError),

    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Resolve(#[from] resolve::ResolveError),
}
