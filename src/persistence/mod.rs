pub mod accounts;
pub mod autosave;
pub mod store;
