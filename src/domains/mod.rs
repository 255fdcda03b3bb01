pub mod cmd;
pub mod export;
