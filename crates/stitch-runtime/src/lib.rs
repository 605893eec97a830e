//! Synchronization engine for the stitch Discord/GitHub mirror bridge.

mod bridge_runtime;

pub use bridge_runtime::{
    build_webhook_router, run_webhook_server, BridgeRuntime, BridgeRuntimeConfig,
};
