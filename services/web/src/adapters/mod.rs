pub mod backend;
pub mod geocode;
pub mod session_store;

pub use backend::BackendClient;
pub use geocode::{NominatimGeocoder, ZippopotamGeocoder};
pub use session_store::{FileSessionStore, MemorySessionStore};
