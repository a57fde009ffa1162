// Listing, filtering and moving remote files
pub mod download;
pub mod filter;
pub mod host;
pub mod listing;
pub mod progress;

pub use download::{fetch_entry, FetchOutcome};
pub use host::{run_host, HostReport};
pub use listing::RemoteEntry;
