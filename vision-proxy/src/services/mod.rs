pub mod metrics;
pub mod providers;
pub mod proxy;
pub mod upload;

pub use proxy::{ProxyError, ProxyRequest, ProxyService};
pub use upload::TempUpload;
