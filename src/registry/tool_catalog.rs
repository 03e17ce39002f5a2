//! # Tool Catalog
//!
//! Read-only lookup classifying each tool by the input it consumes, keyed by
//! `(scan_type, tool_name)`. The dispatcher uses it to partition a scan
//! type's enabled tools before invoking the handler; `vuln_scan` relies on it
//! to run endpoint-list tools separately from site-list tools.

use crate::constants::ScanType;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Shape of the input a tool reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolInputType {
    /// The scan target itself (domain, IP or CIDR)
    Target,
    Subdomains,
    Sites,
    Endpoints,
    /// Not listed in the catalog
    Unclassified,
}

/// Tool classification lookup
pub trait ToolCatalog: Send + Sync {
    fn input_type(&self, scan_type: ScanType, tool: &str) -> Option<ToolInputType>;

    /// Partition tool names by input type; unknown tools land in `Unclassified`
    fn partition<'a, I>(&self, scan_type: ScanType, tools: I) -> BTreeMap<ToolInputType, Vec<String>>
    where
        I: IntoIterator<Item = &'a str>,
        Self: Sized,
    {
        partition_tools(self, scan_type, tools)
    }
}

/// Object-safe form of [`ToolCatalog::partition`]
pub fn partition_tools<'a, C, I>(
    catalog: &C,
    scan_type: ScanType,
    tools: I,
) -> BTreeMap<ToolInputType, Vec<String>>
where
    C: ToolCatalog + ?Sized,
    I: IntoIterator<Item = &'a str>,
{
    let mut groups: BTreeMap<ToolInputType, Vec<String>> = BTreeMap::new();
    for tool in tools {
        let input_type = catalog
            .input_type(scan_type, tool)
            .unwrap_or(ToolInputType::Unclassified);
        groups.entry(input_type).or_default().push(tool.to_string());
    }
    groups
}

/// In-memory catalog built once at process start
#[derive(Debug, Clone, Default)]
pub struct StaticToolCatalog {
    entries: HashMap<(ScanType, String), ToolInputType>,
}

impl StaticToolCatalog {
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (ScanType, S, ToolInputType)>,
        S: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(scan_type, tool, input)| ((scan_type, tool.into()), input))
                .collect(),
        }
    }

    /// Classification of the tools shipped with the default engine templates
    pub fn builtin() -> Self {
        use ScanType::*;
        use ToolInputType::*;

        Self::from_entries([
            (SubdomainDiscovery, "subfinder", Target),
            (SubdomainDiscovery, "amass_passive", Target),
            (SubdomainDiscovery, "assetfinder", Target),
            (SubdomainDiscovery, "sublist3r", Target),
            (SubdomainDiscovery, "oneforall", Target),
            (PortScan, "naabu_active", Subdomains),
            (PortScan, "naabu_passive", Subdomains),
            (SiteScan, "httpx", Subdomains),
            (FingerprintDetect, "xingfinger", Sites),
            (DirectoryScan, "ffuf", Sites),
            (DirectoryScan, "dirsearch", Sites),
            (UrlFetch, "waymore", Target),
            (UrlFetch, "katana", Sites),
            (UrlFetch, "uro", Endpoints),
            (UrlFetch, "httpx", Endpoints),
            (VulnScan, "dalfox_xss", Endpoints),
            (VulnScan, "nuclei", Endpoints),
            (VulnScan, "nuclei_sites", Sites),
            (VulnScan, "afrog", Sites),
        ])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ToolCatalog for StaticToolCatalog {
    fn input_type(&self, scan_type: ScanType, tool: &str) -> Option<ToolInputType> {
        self.entries.get(&(scan_type, tool.to_string())).copied()
    }
}
