//! Hotmoka execution core.
//!
//! This crate turns [TransactionRequest](hotmoka_types::TransactionRequest)s
//! into [TransactionResponse](hotmoka_types::TransactionResponse)s: it checks
//! requests against the committed state, meters their gas, runs the code they
//! target through a [CodeResolver] and extracts the updates they produce.
//!
//! The primary entrypoint is [`Engine`].
//!
//! ## Determinism requirements
//! - Do not use wall-clock time inside execution; the block time comes from [Store::now].
//! - Do not use randomness.
//! - Avoid iteration order of hash-based collections influencing outputs: updates
//!   are collected in ordered sets and heap objects in arenas.
//!
//! ## Minimal execution pipeline (example)
//! ```rust,ignore
//! use hotmoka_execution::{mocks::MockToolchain, Engine, EngineConfig, Memory};
//!
//! let mut store = Memory::default();
//! let toolchain = MockToolchain::new([]);
//! let engine = Engine::new(&store, &toolchain, EngineConfig::with_chain_id("test"));
//! let response = engine.execute(&request)?;
//! store.commit(request, response);
//! ```

pub mod config;
pub mod context;
mod deserializer;
pub mod engine;
pub mod error;
pub mod gas;
pub mod loader;
pub mod resolver;
mod serializer;
pub mod store;
mod updates;

#[cfg(any(test, feature = "mocks"))]
pub mod mocks;

pub use config::EngineConfig;
pub use context::{ExecutionContext, ObjectId, Value};
pub use engine::Engine;
pub use error::{CodeError, Fault, OutOfGas, Rejection, Thrown};
pub use gas::{GasMeter, SubBudget};
pub use loader::{ClassLoader, Jar, Obligation, Toolchain, VerificationError, VerifiedJar};
pub use resolver::{Callable, CodeResolver};
#[cfg(any(test, feature = "mocks"))]
pub use store::Memory;
pub use store::{ClassTag, Store};
