pub mod base;
pub mod client;
pub mod configs;
pub mod stream;

#[cfg(test)]
pub mod mock;
