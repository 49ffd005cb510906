pub mod config;
pub mod duplicate;
pub mod expire;
pub mod get;
pub mod inspect;
pub mod publish;
pub mod put;
