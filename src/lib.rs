pub mod codec;
pub mod core;
pub mod features;
pub mod filtering;
pub mod session;
pub mod surface;
pub mod trading;

// --- Primary core exports ---
pub use core::types;
pub use core::types::*;
pub use core::AppState;

// --- Frequently used handles ---
pub use filtering::FilterEngine;
pub use session::{LoginDriver, LoginState, SessionHandle, SessionProfile};
pub use trading::{PriceTable, PriceTableError};
