// Build script for compiling the MVT protobuf schema

use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=proto/vector_tile.proto");
    println!("cargo:rerun-if-changed=proto/vector_tile.pb.rs");
    match prost_build::compile_protos(&["proto/vector_tile.proto"], &["proto/"]) {
        Ok(()) => Ok(()),
        // `protoc` is not available; use the vendored pre-generated code.
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let out = PathBuf::from(std::env::var("OUT_DIR")?).join("vector_tile.rs");
            std::fs::copy("proto/vector_tile.pb.rs", out)?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
