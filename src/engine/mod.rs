pub mod client;
pub mod resource;
