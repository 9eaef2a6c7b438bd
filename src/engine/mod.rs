pub mod ai;
pub mod attack;
pub mod command;
pub mod config;
pub mod economy;
pub mod faction;
pub mod game;
pub mod phase;
pub mod server;
pub mod world;
pub mod zombie;
