//! Cluster type detection from `buildInfo`

use bson::{Bson, Document};
use std::fmt;

/// Kind of deployment behind a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClusterType {
    /// Atlas Data Federation, which serves `$sql` natively
    AtlasDataFederation,
    /// MongoDB Enterprise server
    Enterprise,
    /// MongoDB Community server
    Community,
    /// The reply did not identify a server
    Unknown,
}

impl ClusterType {
    /// Classify a `buildInfo` reply
    ///
    /// A `dataLake` section means ADF. Otherwise an `enterprise` entry in
    /// `modules` means Enterprise, and any reply carrying a `version` is
    /// Community.
    pub fn from_build_info(reply: &Document) -> Self {
        if reply.contains_key("dataLake") {
            return ClusterType::AtlasDataFederation;
        }

        let enterprise = reply
            .get_array("modules")
            .map(|modules| {
                modules
                    .iter()
                    .any(|m| matches!(m, Bson::String(name) if name == "enterprise"))
            })
            .unwrap_or(false);

        if enterprise {
            ClusterType::Enterprise
        } else if reply.contains_key("version") {
            ClusterType::Community
        } else {
            ClusterType::Unknown
        }
    }

    /// Whether SQL queries can be run against this cluster
    pub fn supports_sql(&self) -> bool {
        matches!(
            self,
            ClusterType::AtlasDataFederation | ClusterType::Enterprise
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClusterType::AtlasDataFederation => "Atlas Data Federation",
            ClusterType::Enterprise => "Enterprise",
            ClusterType::Community => "Community",
            ClusterType::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ClusterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
