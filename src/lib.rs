pub mod assets;
pub mod audio;
pub mod camera;
pub mod config;
pub mod driver;
pub mod error;
pub mod graphics;
pub mod input;
pub mod logging;
pub mod physics;
pub mod raycast;
pub mod render;
pub mod sequencer;
pub mod session;
pub mod sim;
pub mod sprites;
pub mod textures;
pub mod world;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use session::DoomMini;
pub use sim::Simulation;
