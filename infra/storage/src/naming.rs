//! Collision-resistant storage file names.

use chrono::Utc;
use uuid::Uuid;

/// Timestamp layout; sorts lexicographically in chronological order.
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Lower-cased extension of the last path component of `name`, if any.
///
/// Both `/` and `\` are treated as separators so a client-side path such as
/// `C:\photos\cat.PNG` yields `png`. Extensions containing anything other than
/// ASCII alphanumerics are treated as absent.
#[must_use]
pub fn extension_of(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let (_, ext) = base.rsplit_once('.')?;
    if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Generates `<YYYYmmdd_HHMMSS>_<uuid-v4>.<ext>` for `original_name`.
///
/// The UUID carries 122 random bits, so names are unique without consulting
/// the tree, even across concurrent uploads. When `original_name` has no
/// extension the dot is omitted.
#[must_use]
pub fn generate(original_name: &str) -> String {
    let timestamp = Utc::now().format(TIMESTAMP_FORMAT);
    let token = Uuid::new_v4();

    match extension_of(original_name) {
        Some(ext) => format!("{timestamp}_{token}.{ext}"),
        None => format!("{timestamp}_{token}"),
    }
}
