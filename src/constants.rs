//! # Constants
//!
//! Shared constants used throughout the tool.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Cloud profile used when `--cloud` is not given
pub const DEFAULT_CLOUD: &str = "openstack";

/// Default timeout for a single Keystone or Barbican HTTP request (seconds)
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Default number of secrets requested per Barbican list page
pub const DEFAULT_LIST_PAGE_SIZE: u32 = 100;

/// Barbican caps `limit` on list calls at this value
pub const MAX_LIST_PAGE_SIZE: u32 = 100;

/// Service type of the key-manager in the Keystone catalog
pub const KEY_MANAGER_SERVICE_TYPE: &str = "key-manager";

/// Catalog interface used when the cloud profile does not name one
pub const DEFAULT_ENDPOINT_INTERFACE: &str = "public";

/// Block cipher mode recorded on created secrets
pub const DEFAULT_SECRET_MODE: &str = "cbc";

/// Content type for payloads that are valid UTF-8
pub const CONTENT_TYPE_TEXT: &str = "text/plain";

/// Content type for any other payload
pub const CONTENT_TYPE_BINARY: &str = "application/octet-stream";

/// Transfer encoding Barbican requires for binary payloads
pub const CONTENT_ENCODING_BASE64: &str = "base64";

/// Header carrying the Keystone token on every request
pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// Header Keystone returns the issued token in
pub const SUBJECT_TOKEN_HEADER: &str = "X-Subject-Token";
