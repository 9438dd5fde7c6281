//! Raw ABI surface consumed by `gdbind-core`.
//!
//! Nothing in this crate owns memory or enforces invariants. It only names
//! the pointer kinds, function signatures and tag values of the native
//! interface so the layers above can agree with the engine bit for bit.

mod interface;
mod pointers;
mod variant_type;

pub use interface::{GetProcAddressFn, InterfaceTable, MissingProc};
pub use pointers::*;
pub use variant_type::{VariantType, variant_size};
