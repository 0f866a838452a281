//! Generates host-language bindings for `kickpass-core`.
//!
//! ```sh
//! cargo run -p uniffi-bindgen -- generate --library target/release/libkickpass_core.so \
//!     --language python --out-dir bindings/python
//! ```

fn main() {
    uniffi::uniffi_bindgen_main();
}
