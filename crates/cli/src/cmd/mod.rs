//! Command implementations

pub mod install;
pub mod list;
pub mod reset;
pub mod status;
pub mod upgrade;
