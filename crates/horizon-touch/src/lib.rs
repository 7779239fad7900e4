//! Horizon Touch - multi-touch input and gesture recognition.
//!
//! Pointers come from [`InputSource`]s: [`TuioInput`] decodes TUIO 1.1 and
//! 2.0 traffic from a tracker, [`MouseInput`] wraps the host's mouse or pen.
//! A [`TouchManager`] polls the sources once per frame, publishes the pointer
//! changes as batched signals, and drives [`Gesture`]s such as
//! [`TapGesture`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use horizon_touch::prelude::*;
//! use horizon_touch_core::{IoRuntime, IoRuntimeConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = TouchConfig::load("touch.toml")?;
//!     let runtime = IoRuntime::new(IoRuntimeConfig::default())?;
//!
//!     let mut touch = TouchManager::from_config(&config, Arc::new(MonotonicClock::new()))?;
//!     touch.add_input(Arc::new(TuioInput::with_runtime(
//!         config.tuio.clone(),
//!         runtime.handle().clone(),
//!     )?));
//!     let target = Arc::new(RectTarget(Rect::new(0.0, 0.0, 400.0, 300.0)));
//!     let tap = touch.add_gesture(TapGesture::from_config(target, &config.tap));
//!     touch.enable(Size::new(1920.0, 1080.0));
//!
//!     loop {
//!         touch.update();
//!         if touch.gesture::<TapGesture>(tap).map(|g| g.state()) == Some(GestureState::Recognized) {
//!             println!("tap");
//!         }
//!     }
//! }
//! ```

mod config;
mod error;
pub mod gesture;
pub mod input;
mod manager;
mod pointer;
mod pool;
pub mod prelude;
mod tokens;
pub mod tuio;

pub use config::{ConnectionType, TapConfig, TouchConfig, TuioConfig, TuioVersion};
pub use error::{Result, TouchError};
pub use gesture::{
    FrameContext, Gesture, GestureCore, GestureId, GestureManager, GestureState,
    GestureStateChange, HitResult, HitTarget, RectTarget, TapGesture,
};
pub use input::{
    CoordinatesRemapper, IdentityRemapper, InputSource, InputSourceId, MouseInput, PointerEvent,
    TuioInput,
};
pub use manager::{DEFAULT_DOTS_PER_CENTIMETER, FrameBatch, TouchManager};
pub use pointer::{ObjectData, Pointer, PointerButtons, PointerFlags, PointerId, PointerType};
pub use pool::{ObjectPool, PoolStats};
pub use tokens::{Token, TokenTracker};
