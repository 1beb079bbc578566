use thiserror::Error;

#[derive(Error, Debug)]
pub enum VigilError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Event loop error: {0}")]
    EventLoop(String),
}
