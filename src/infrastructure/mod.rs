//! Concrete adapters behind the domain ports: a mock exchange adapter and
//! the SQLite-backed repository implementations.

pub mod mock_exchange;
pub mod persistence;
