//! # Configuration
//!
//! - `tool`: process-level settings from environment variables
//! - `clouds`: OpenStack cloud profiles from `clouds.yaml`

pub mod clouds;
pub mod tool;

pub use clouds::{load_cloud, load_cloud_from, AuthConfig, AuthType, CloudConfig};
pub use tool::ToolConfig;
