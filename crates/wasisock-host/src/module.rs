//! WebAssembly module compilation.
//!
//! [`CompiledModule`] wraps a Wasmtime [`Module`] with a content hash for
//! logging. Guests are core modules targeting `wasi_snapshot_preview1`.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::Path;
use std::time::Instant;

use tracing::{info, instrument};
use wasmtime::{Engine, Module};

use wasisock_common::RuntimeError;

const WASM_MAGIC: &[u8] = b"\0asm";

/// A compiled core WebAssembly module.
///
/// Cheap to clone and safe to share across threads.
#[derive(Clone)]
pub struct CompiledModule {
    module: Module,
    content_hash: String,
    compiled_at: Instant,
}

impl CompiledModule {
    /// Compile a module from WebAssembly bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid module.
    #[instrument(skip(engine, bytes), fields(bytes_len = bytes.len()))]
    pub fn from_bytes(engine: &Engine, bytes: &[u8]) -> Result<Self, RuntimeError> {
        Self::validate_wasm_header(bytes)?;

        let module = Module::new(engine, bytes).map_err(|e| {
            RuntimeError::compilation_failed(format!("Core module compilation failed: {e}"))
        })?;

        Ok(Self::finish(module, bytes, "Core module compiled"))
    }

    /// Compile a module from WAT (WebAssembly Text Format).
    #[instrument(skip(engine, wat))]
    pub fn from_wat(engine: &Engine, wat: &str) -> Result<Self, RuntimeError> {
        let module = Module::new(engine, wat).map_err(|e| {
            RuntimeError::compilation_failed(format!("WAT compilation failed: {e}"))
        })?;

        Ok(Self::finish(module, wat.as_bytes(), "WAT module compiled"))
    }

    /// Compile a `.wasm` or `.wat` file, chosen by content.
    #[instrument(skip(engine, path), fields(path = %path.as_ref().display()))]
    pub fn from_file(engine: &Engine, path: impl AsRef<Path>) -> Result<Self, RuntimeError> {
        let bytes = std::fs::read(path.as_ref())?;

        if bytes.starts_with(WASM_MAGIC) {
            return Self::from_bytes(engine, &bytes);
        }

        let text = std::str::from_utf8(&bytes).map_err(|_| {
            RuntimeError::compilation_failed(format!(
                "{} is neither a Wasm binary nor UTF-8 WAT",
                path.as_ref().display()
            ))
        })?;
        Self::from_wat(engine, text)
    }

    fn finish(module: Module, source: &[u8], message: &'static str) -> Self {
        let content_hash = compute_hash(source);

        info!(
            content_hash = %content_hash,
            imports = module.imports().len(),
            "{message}"
        );

        Self {
            module,
            content_hash,
            compiled_at: Instant::now(),
        }
    }

    /// The compiled Wasmtime module.
    pub fn module(&self) -> &Module {
        &self.module
    }

    /// Get the content hash of the original source.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// Get when this module was compiled.
    pub fn compiled_at(&self) -> Instant {
        self.compiled_at
    }

    /// Returns `true` if the module imports any of the socket functions.
    pub fn uses_sockets(&self) -> bool {
        self.module
            .imports()
            .any(|import| import.module() == "wasi_snapshot_preview1" && import.name().starts_with("sock_"))
    }

    fn validate_wasm_header(bytes: &[u8]) -> Result<(), RuntimeError> {
        if bytes.len() < 8 {
            return Err(RuntimeError::compilation_failed(
                "Invalid Wasm: file too small",
            ));
        }

        if !bytes.starts_with(WASM_MAGIC) {
            return Err(RuntimeError::compilation_failed(
                "Invalid Wasm: bad magic number",
            ));
        }

        Ok(())
    }
}

impl std::fmt::Debug for CompiledModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledModule")
            .field("content_hash", &self.content_hash)
            .finish_non_exhaustive()
    }
}

/// Compute a hash of the given bytes.
fn compute_hash(bytes: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WasmEngine;
    use wasisock_common::EngineConfig;

    // empty module
    const MINIMAL_WASM: &[u8] = &[
        0x00, 0x61, 0x73, 0x6d, // magic: \0asm
        0x01, 0x00, 0x00, 0x00, // version: 1
    ];

    fn engine() -> WasmEngine {
        WasmEngine::new(&EngineConfig::default()).unwrap()
    }

    #[test]
    fn test_validate_wasm_header() {
        assert!(CompiledModule::validate_wasm_header(MINIMAL_WASM).is_ok());
        assert!(CompiledModule::validate_wasm_header(&[0x00, 0x61]).is_err());
        assert!(CompiledModule::validate_wasm_header(&[0, 0, 0, 0, 1, 0, 0, 0]).is_err());
    }

    #[test]
    fn test_compute_hash() {
        assert_eq!(compute_hash(b"hello"), compute_hash(b"hello"));
        assert_ne!(compute_hash(b"hello"), compute_hash(b"world"));
        assert_eq!(compute_hash(b"hello").len(), 16);
    }

    #[test]
    fn test_module_compilation() {
        let module = CompiledModule::from_bytes(engine().inner(), MINIMAL_WASM).unwrap();
        assert!(!module.content_hash().is_empty());
        assert!(!module.uses_sockets());
    }

    #[test]
    fn test_uses_sockets() {
        let wat = r#"
            (module
                (import "wasi_snapshot_preview1" "sock_close" (func (param i32) (result i32)))
            )
        "#;
        let module = CompiledModule::from_wat(engine().inner(), wat).unwrap();
        assert!(module.uses_sockets());
    }

    #[test]
    fn test_invalid_wat() {
        let err = CompiledModule::from_wat(engine().inner(), "(module (func").unwrap_err();
        assert!(matches!(err, RuntimeError::CompilationFailed { .. }));
    }

    #[test]
    fn test_from_file_missing() {
        let err = CompiledModule::from_file(engine().inner(), "/nonexistent/guest.wasm").unwrap_err();
        assert!(matches!(err, RuntimeError::Io(_)));
    }
}
