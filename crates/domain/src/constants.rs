/// Name used for log files and the health endpoint.
pub const SERVICE_NAME: &str = "pixhost";

/// Header carrying the shared API key.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Query parameter accepted as an alternative to [`API_KEY_HEADER`].
pub const API_KEY_QUERY: &str = "api_key";

/// Path prefix under which stored images are served.
pub const IMAGE_ROUTE: &str = "/image";

/// Path prefix under which snapshots are downloaded.
pub const BACKUP_ROUTE: &str = "/backup";

pub const MIB: u64 = 1024 * 1024;
