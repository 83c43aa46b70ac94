pub mod events;
pub mod ideas;
pub mod store;
