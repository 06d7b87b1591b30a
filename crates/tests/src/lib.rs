//! Integration tests spanning the trieq crates
//!
//! Everything lives behind `cfg(test)`; the library itself is empty.

#[cfg(test)]
mod concurrency;
#[cfg(test)]
mod eq_integration;
#[cfg(test)]
mod renderer;
