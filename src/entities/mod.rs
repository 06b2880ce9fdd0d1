//! Record declaration helpers

pub mod macros;
