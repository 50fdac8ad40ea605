//! Well-known property keys.

/// Name of the default database resource.
pub const JDBC_RESOURCE: &str = "efw.jdbc.resource";

/// Connection locator of a batch-mode resource.
pub const JDBC_RESOURCE_URL: &str = "efw.jdbc.resource.url";

/// User name of a batch-mode resource.
pub const JDBC_RESOURCE_USERNAME: &str = "efw.jdbc.resource.username";

/// Password of a batch-mode resource.
pub const JDBC_RESOURCE_PASSWORD: &str = "efw.jdbc.resource.password";

/// Resource name used when `efw.jdbc.resource` is not configured.
pub const DEFAULT_JDBC_RESOURCE: &str = "jdbc/efw";

/// Key of the `index`-th member of an indexed key family.
///
/// Index 0 is the bare key, later members carry a `.n` suffix:
/// `base`, `base.1`, `base.2`, ...
pub fn indexed(base: &str, index: usize) -> String {
    if index == 0 {
        base.to_string()
    } else {
        format!("{base}.{index}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indexed_keys() {
        assert_eq!(indexed(JDBC_RESOURCE, 0), "efw.jdbc.resource");
        assert_eq!(indexed(JDBC_RESOURCE, 1), "efw.jdbc.resource.1");
        assert_eq!(indexed(JDBC_RESOURCE_URL, 12), "efw.jdbc.resource.url.12");
    }
}
