//! WebAssembly instance lifecycle management.
//!
//! [`InstanceRunner`] handles one guest execution end to end:
//!
//! 1. Instantiate the module against a linker carrying WASI and the socket imports
//! 2. Execute the entry point
//! 3. Translate traps, `proc_exit`, and fuel exhaustion
//! 4. Record fuel and duration in the store's metrics

use std::time::Instant;

use tracing::{debug, error, info, instrument, warn};
use wasmtime::{Engine, Linker, Store, Trap};
use wasmtime_wasi::I32Exit;

use crate::store::{GuestContext, calculate_fuel_consumed, get_remaining_fuel};
use crate::{CompiledModule, WasmEngine, linker};
use wasisock_common::RuntimeError;

/// Result of executing a WebAssembly module.
#[derive(Debug)]
pub enum ExecutionResult {
    /// The entry point returned normally.
    Success,

    /// The guest called `proc_exit`.
    Exited {
        /// Exit status passed by the guest.
        code: i32,
    },

    /// Execution completed with a trap (runtime error).
    Trap {
        /// Description of the trap.
        message: String,
        /// Trap code if available.
        code: Option<String>,
    },
}

impl ExecutionResult {
    /// Returns `true` if the entry point returned or the guest exited with 0.
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionResult::Success | ExecutionResult::Exited { code: 0 })
    }

    /// Returns `true` if execution trapped.
    pub fn is_trap(&self) -> bool {
        matches!(self, ExecutionResult::Trap { .. })
    }

    /// Process exit status equivalent of this result.
    pub fn exit_code(&self) -> i32 {
        match self {
            ExecutionResult::Success => 0,
            ExecutionResult::Exited { code } => *code,
            ExecutionResult::Trap { .. } => 1,
        }
    }
}

/// Instance lifecycle manager.
///
/// The linker is built once; each execution uses its own [`Store`] for
/// isolation, so a runner can be shared across threads.
pub struct InstanceRunner {
    engine: Engine,
    linker: Linker<GuestContext>,
}

impl InstanceRunner {
    /// Create a runner whose linker carries WASI preview1 and the socket
    /// imports.
    ///
    /// # Errors
    ///
    /// Returns an error if the imports cannot be registered.
    pub fn new(engine: &WasmEngine) -> Result<Self, RuntimeError> {
        let mut linker = Linker::new(engine.inner());
        linker::register_all(&mut linker)?;

        Ok(Self {
            engine: engine.inner().clone(),
            linker,
        })
    }

    /// Get a mutable reference to the linker, to register extra imports.
    pub fn linker_mut(&mut self) -> &mut Linker<GuestContext> {
        &mut self.linker
    }

    /// Execute `entry_point` of `module`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Instantiation fails (for example, an unsatisfied import)
    /// - The entry point is not exported as `() -> ()`
    /// - Fuel is exhausted
    #[instrument(skip(self, module, store), fields(entry_point = %entry_point, execution_id = %store.data().execution_id))]
    pub fn execute(
        &self,
        module: &CompiledModule,
        store: &mut Store<GuestContext>,
        entry_point: &str,
    ) -> Result<ExecutionResult, RuntimeError> {
        let start = Instant::now();
        let initial_fuel = get_remaining_fuel(store).unwrap_or(0);

        debug!("Instantiating module");

        let instance = self
            .linker
            .instantiate(&mut *store, module.module())
            .map_err(|e| RuntimeError::compilation_failed(format!("Instantiation failed: {e}")))?;

        let func = instance
            .get_typed_func::<(), ()>(&mut *store, entry_point)
            .map_err(|_| RuntimeError::entry_point_not_found(entry_point))?;

        debug!("Executing entry point");

        let result = func.call(&mut *store, ());

        let fuel_consumed = calculate_fuel_consumed(initial_fuel, store);
        store.data_mut().metrics.fuel_consumed = fuel_consumed;
        store.data_mut().finalize_metrics();

        let duration = start.elapsed();
        let metrics = &store.data().metrics;

        match result {
            Ok(()) => {
                info!(
                    duration_ms = duration.as_millis(),
                    fuel_consumed,
                    sockets_opened = metrics.sockets_opened,
                    bytes_sent = metrics.bytes_sent,
                    bytes_received = metrics.bytes_received,
                    "Execution completed successfully"
                );
                Ok(ExecutionResult::Success)
            }
            Err(err) => {
                if let Some(exit) = err.downcast_ref::<I32Exit>() {
                    info!(
                        duration_ms = duration.as_millis(),
                        code = exit.0,
                        sockets_opened = metrics.sockets_opened,
                        "Guest exited"
                    );
                    return Ok(ExecutionResult::Exited { code: exit.0 });
                }

                if is_out_of_fuel(&err) {
                    warn!(
                        duration_ms = duration.as_millis(),
                        fuel_consumed,
                        "Execution terminated: fuel exhausted"
                    );
                    return Err(RuntimeError::FuelExhausted);
                }

                let (message, code) = extract_trap_info(&err);
                error!(
                    duration_ms = duration.as_millis(),
                    fuel_consumed,
                    trap_message = %message,
                    "Execution trapped"
                );

                Ok(ExecutionResult::Trap { message, code })
            }
        }
    }

    /// Get the engine reference.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }
}

/// Extract human-readable trap information.
fn extract_trap_info(error: &wasmtime::Error) -> (String, Option<String>) {
    let message = format!("{error:#}");
    let code = error.downcast_ref::<Trap>().map(|trap| format!("{trap:?}"));
    (message, code)
}

/// Check if an error is due to fuel exhaustion.
fn is_out_of_fuel(error: &wasmtime::Error) -> bool {
    error
        .downcast_ref::<Trap>()
        .is_some_and(|trap| *trap == Trap::OutOfFuel)
}

impl std::fmt::Debug for InstanceRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceRunner").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_result_success() {
        let result = ExecutionResult::Success;
        assert!(result.is_success());
        assert!(!result.is_trap());
        assert_eq!(result.exit_code(), 0);
    }

    #[test]
    fn test_execution_result_exited() {
        assert!(ExecutionResult::Exited { code: 0 }.is_success());

        let result = ExecutionResult::Exited { code: 3 };
        assert!(!result.is_success());
        assert_eq!(result.exit_code(), 3);
    }

    #[test]
    fn test_execution_result_trap() {
        let result = ExecutionResult::Trap {
            message: "unreachable".into(),
            code: Some("UnreachableCodeReached".into()),
        };
        assert!(!result.is_success());
        assert!(result.is_trap());
        assert_eq!(result.exit_code(), 1);
    }
}
