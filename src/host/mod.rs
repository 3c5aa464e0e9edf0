//! Pieces of a host: hat edge detection plus console stand-ins for the
//! collaborators a real runtime would provide (speech engines, the model
//! selection dialog, typed input).

pub mod console;
pub mod edge;
pub mod input;
pub mod selector;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use console::{ConsoleRecognizer, ConsoleSynthesizer, CONSOLE_VOICES};
pub use edge::{hat_key, EdgeDetector};
pub use input::{parse_command, spawn_stdin_reader, HostCommand, USAGE};
pub use selector::{parse_choice, ConsoleSelector};
