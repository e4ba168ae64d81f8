// Adapters layer: concrete bindings of the domain ports to the outside world.

pub mod library;
pub mod process;

pub use library::UnavailableLibrary;
pub use process::{TokioProcessLauncher, TokioSumoProcess};
