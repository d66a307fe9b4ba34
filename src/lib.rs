//! `log-workbench-core`: the large-file access core of a browser-resident
//! log analysis workbench. A byte-offset line index built by a single
//! streaming scan, a paging layer that serves arbitrary line windows
//! without holding a whole file in memory, a small-file persisted store and
//! large-file index-only backend behind one provider contract, a filter
//! compiler, a pinned-line set, and the pure virtualization math a
//! measured-height viewport renders against. The `wasm` module is the thin
//! `#[wasm_bindgen]` shell a browser host binds to; everything else is
//! plain, host-agnostic Rust exercised directly by this crate's native
//! tests.

pub mod classify;
pub mod config;
pub mod error;
pub mod filter;
pub mod index;
pub mod line;
pub mod pinned;
pub mod provider;
pub mod session;
pub mod store;
pub mod viewport;

#[cfg(target_arch = "wasm32")]
mod wasm;

/// One-time `tracing` subscriber install for native tests, so a failing
/// `#[test]` can be re-run with `RUST_LOG=debug` to see the
/// suspension-point spans the core emits (chunk reads, store transactions,
/// provider calls). WASM builds forward panics to the console instead
/// (`console_error_panic_hook`, wired in `wasm::main`); there is no
/// equivalent subscriber install there since `tracing`'s default output
/// goes nowhere in a browser without a dedicated layer this crate's scope
/// doesn't need.
#[cfg(all(test, not(target_arch = "wasm32")))]
pub(crate) fn init_test_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().with_env_filter("debug").try_init();
    });
}
