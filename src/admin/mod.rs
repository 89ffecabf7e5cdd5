pub mod commands;
pub mod roles;
