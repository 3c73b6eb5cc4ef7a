//! Configuration for merge and patch.

use shelfsync_model::SUPPORTED_VERSIONS;

fn default_versions() -> Vec<String> {
    SUPPORTED_VERSIONS.iter().map(|v| v.to_string()).collect()
}

/// Configuration for bulk merges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOptions {
    /// Document versions the merge rules apply to.
    pub supported_versions: Vec<String>,
}

impl MergeOptions {
    /// Creates options accepting the default versions.
    pub fn new() -> Self {
        Self {
            supported_versions: default_versions(),
        }
    }

    /// Sets the accepted versions.
    pub fn with_supported_versions<I, S>(mut self, versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported_versions = versions.into_iter().map(Into::into).collect();
        self
    }

    /// Returns true if `version` is accepted.
    pub fn accepts(&self, version: &str) -> bool {
        self.supported_versions.iter().any(|v| v == version)
    }
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for incremental patches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchOptions {
    /// Document versions the patch rules apply to.
    pub supported_versions: Vec<String>,
    /// Drop orphaned children after the batch.
    pub prune_orphans: bool,
}

impl PatchOptions {
    /// Creates options accepting the default versions.
    pub fn new() -> Self {
        Self {
            supported_versions: default_versions(),
            prune_orphans: true,
        }
    }

    /// Sets the accepted versions.
    pub fn with_supported_versions<I, S>(mut self, versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported_versions = versions.into_iter().map(Into::into).collect();
        self
    }

    /// Enables or disables the final orphan pass.
    pub fn with_prune_orphans(mut self, prune: bool) -> Self {
        self.prune_orphans = prune;
        self
    }

    /// Returns true if `version` is accepted.
    pub fn accepts(&self, version: &str) -> bool {
        self.supported_versions.iter().any(|v| v == version)
    }
}

impl Default for PatchOptions {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_accept_known_versions() {
        let merge = MergeOptions::default();
        assert!(merge.accepts("1"));
        assert!(merge.accepts("2"));
        assert!(!merge.accepts("3"));

        let patch = PatchOptions::default();
        assert!(patch.accepts("2"));
        assert!(patch.prune_orphans);
    }

    #[test]
    fn builders() {
        let merge = MergeOptions::new().with_supported_versions(["2"]);
        assert!(!merge.accepts("1"));

        let patch = PatchOptions::new()
            .with_supported_versions(vec!["1".to_string()])
            .with_prune_orphans(false);
        assert!(patch.accepts("1"));
        assert!(!patch.accepts("2"));
        assert!(!patch.prune_orphans);
    }
}
