//! rctl: command line front end for submitting work to a receptor node and
//! managing its units.

pub use cmd::{Cli, Command};

pub mod cmd;
