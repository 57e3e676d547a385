//! Generates `snippets.h` from the `extern "C"` surface into `OUT_DIR`.
//!
//! Set `SNIPPETS_HEADER_DIR` to also copy the header somewhere the host
//! project can include it from.

use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=src/lib.rs");
    println!("cargo:rerun-if-changed=src/types.rs");
    println!("cargo:rerun-if-env-changed=SNIPPETS_HEADER_DIR");

    let (Ok(crate_dir), Ok(out_dir)) = (env::var("CARGO_MANIFEST_DIR"), env::var("OUT_DIR")) else {
        println!("cargo:warning=header generation skipped: cargo build environment not set");
        return;
    };

    let config = cbindgen::Config {
        language: cbindgen::Language::C,
        include_guard: Some("SNIPPETS_H".to_string()),
        cpp_compat: true,
        ..Default::default()
    };

    let bindings = match cbindgen::Builder::new()
        .with_crate(&crate_dir)
        .with_config(config)
        .generate()
    {
        Ok(bindings) => bindings,
        Err(err) => {
            println!("cargo:warning=header generation skipped: {err}");
            return;
        }
    };

    let header = PathBuf::from(out_dir).join("snippets.h");
    bindings.write_to_file(&header);

    if let Ok(dir) = env::var("SNIPPETS_HEADER_DIR") {
        let dir = PathBuf::from(dir);
        if let Err(err) = fs::create_dir_all(&dir) {
            println!("cargo:warning=cannot create {}: {err}; header left in OUT_DIR", dir.display());
            return;
        }
        if let Err(err) = fs::copy(&header, dir.join("snippets.h")) {
            println!("cargo:warning=cannot copy header to {}: {err}", dir.display());
        }
    }
}
