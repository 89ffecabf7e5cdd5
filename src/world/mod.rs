pub mod area;
pub mod map;
pub mod maps;
pub mod party;
pub mod region;
pub mod rng;
pub mod snapshot;
pub mod state;
pub mod time;
pub mod timers;
