//! Platform adapters

mod bluesky;
mod devto;
mod stub;
mod x;
mod youtube;

pub use bluesky::BlueskyAdapter;
pub use devto::DevToAdapter;
pub use stub::{StubAdapter, stub_item};
pub use x::XAdapter;
pub use youtube::YouTubeAdapter;

/// Default API base URLs
pub mod defaults {
    pub use super::bluesky::DEFAULT_BASE_URL as BLUESKY_BASE_URL;
    pub use super::devto::DEFAULT_BASE_URL as DEVTO_BASE_URL;
    pub use super::x::DEFAULT_BASE_URL as X_BASE_URL;
    pub use super::youtube::DEFAULT_BASE_URL as YOUTUBE_BASE_URL;
}
