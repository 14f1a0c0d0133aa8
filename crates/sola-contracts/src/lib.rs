pub mod categories;
pub mod events;
pub mod models;
pub mod pins;
