//! Logs the pointers, tokens and taps arriving from a TUIO tracker.
//!
//! Run with: cargo run -p horizon-touch --example tuio_monitor [config.toml]
//!
//! Without a config file the monitor listens for TUIO 1.1 over UDP on
//! port 3333. Set `RUST_LOG=horizon_touch=debug` for protocol details.

use std::sync::Arc;
use std::time::Duration;

use horizon_touch::prelude::*;
use horizon_touch_core::{IoRuntime, IoRuntimeConfig};
use tracing_subscriber::EnvFilter;

const SCREEN: Size = Size::new(1920.0, 1080.0);
const FRAME: Duration = Duration::from_millis(16);

fn log_pointers(label: &'static str, pointers: &[Pointer]) {
    for pointer in pointers {
        tracing::info!(
            id = %pointer.id(),
            kind = ?pointer.pointer_type(),
            x = pointer.position().x,
            y = pointer.position().y,
            "{label}"
        );
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => TouchConfig::load(path)?,
        None => TouchConfig::default(),
    };
    tracing::info!(
        version = %config.tuio.version,
        address = %config.tuio.ip_address,
        port = config.tuio.effective_port(),
        "starting TUIO monitor"
    );

    let runtime = IoRuntime::new(IoRuntimeConfig::default())?;
    let mut touch = TouchManager::from_config(&config, Arc::new(MonotonicClock::new()))?;
    touch.add_input(Arc::new(TuioInput::with_runtime(
        config.tuio.clone(),
        runtime.handle().clone(),
    )?));

    touch
        .pointers_added()
        .connect(|pointers| log_pointers("added", pointers));
    touch
        .pointers_pressed()
        .connect(|pointers| log_pointers("pressed", pointers));
    touch
        .pointers_released()
        .connect(|pointers| log_pointers("released", pointers));
    touch
        .pointers_removed()
        .connect(|pointers| log_pointers("removed", pointers));
    touch
        .pointers_cancelled()
        .connect(|pointers| log_pointers("cancelled", pointers));

    let tokens = TokenTracker::attach(&touch);
    tokens.token_added().connect(|token| {
        tracing::info!(object_id = token.object_id, angle = token.angle, "token placed");
    });
    tokens.token_removed().connect(|token| {
        tracing::info!(object_id = token.object_id, "token lifted");
    });

    let target = Arc::new(RectTarget(Rect::new(0.0, 0.0, SCREEN.width, SCREEN.height)));
    let tap = TapGesture::from_config(target, &config.tap);
    tap.tapped().connect(|at| {
        tracing::info!(x = at.x, y = at.y, "tap");
    });
    touch.add_gesture(tap);

    touch.enable(SCREEN);
    loop {
        touch.update();
        std::thread::sleep(FRAME);
    }
}
