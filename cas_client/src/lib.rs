pub mod download;
mod error;
pub mod http_client;
mod interface;
pub mod output_provider;
pub mod remote_client;
pub mod token_provider;

use tracing::Level;

pub use crate::download::FileDownloader;
pub use crate::error::CasClientError;
pub use crate::http_client::{HttpClientPool, build_http_client};
pub use crate::interface::{Client, FetchedXorb};
pub use crate::output_provider::{FileProvider, OutputSink};
pub use crate::remote_client::RemoteClient;
pub use crate::token_provider::{ConnectionInfo, TokenProvider, shared_token_provider};

#[cfg(not(feature = "elevated_information_level"))]
pub const INFORMATION_LOG_LEVEL: Level = Level::DEBUG;

#[cfg(feature = "elevated_information_level")]
pub const INFORMATION_LOG_LEVEL: Level = Level::INFO;
