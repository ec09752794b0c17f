// Library exports for testing
// The binary (main.rs) imports these as well

pub mod bootstrap;
pub mod dispatcher;
pub mod error;
pub mod logger;
pub mod presenter;

#[cfg(test)]
mod tests;
