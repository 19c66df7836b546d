//! Log channels of the server process.

pub mod logging;
