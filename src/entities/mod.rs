pub mod entity;
pub mod kinds;
