pub mod abi;
pub mod error;
pub mod types;

pub use abi::{Abi, AbiInfo, CallStyle};
pub use error::{FaultKind, StubError};
pub use types::{ContextPtr, StubPtr, TargetPtr, MAX_PUBLIC_ARITY};
