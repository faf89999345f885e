pub mod channels;
pub mod config;
pub mod core;
pub mod datatypes;
pub mod health;
pub mod nodes;
pub mod pipeline;
pub mod protocol;
pub mod sink;
pub mod utils;
