//! playerbridge
//!
//! Exposes an external hardware-accelerated player engine to a host UI
//! framework. The engine does all media work; this crate translates in both
//! directions:
//! - [`view::PlayerView`] turns declarative property writes into engine calls
//!   and engine callbacks into named host events
//! - [`wrapper::PlayerWrapper`] is an imperative facade with a four-method
//!   delegate
//!
//! Engine callbacks cross from engine threads to the owning thread through
//! [`dispatch::CallbackQueue`]; hosts drain it by calling `pump()` from their
//! run loop.

pub mod dispatch;
pub mod engine;
pub mod utils;
pub mod view;
pub mod wrapper;

pub use engine::{EngineFactory, LoadState, PlayerEngine, ResizeMode};
pub use utils::{BridgeError, Config, ErrorKind, Result};
pub use view::{EventKind, PlayerView, VideoEvent};
pub use wrapper::{PlayerDelegate, PlayerWrapper, WrapperState};
