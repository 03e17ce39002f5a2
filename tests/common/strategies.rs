//! Proptest strategies for scan engine configurations.

use proptest::prelude::*;
use scanner_core::{ScanType, ToolGrouping};

/// One scan type section: its tools as `(name, enabled)` pairs
#[derive(Debug, Clone)]
pub struct EngineSection {
    pub scan_type: ScanType,
    pub tools: Vec<(String, bool)>,
    /// Put the tools under the grouping the scan type does not read
    pub wrong_grouping: bool,
}

impl EngineSection {
    pub fn has_enabled_tool(&self) -> bool {
        !self.wrong_grouping && self.tools.iter().any(|(_, enabled)| *enabled)
    }

    fn grouping_key(&self) -> &'static str {
        let grouping = self.scan_type.tool_grouping();
        if !self.wrong_grouping {
            return grouping.key();
        }
        match grouping {
            ToolGrouping::PassiveTools => ToolGrouping::Tools.key(),
            ToolGrouping::Tools => ToolGrouping::PassiveTools.key(),
        }
    }

    fn render(&self, out: &mut String) {
        out.push_str(&format!("{}:\n  {}:\n", self.scan_type, self.grouping_key()));
        for (tool, enabled) in &self.tools {
            out.push_str(&format!("    {tool}:\n      enabled: {enabled}\n"));
        }
    }
}

/// Render sections as engine YAML in the given order
pub fn render_engine(sections: &[EngineSection]) -> String {
    let mut out = String::new();
    for section in sections {
        section.render(&mut out);
    }
    out
}

pub fn tool_name_strategy() -> impl Strategy<Value = String> {
    "tool_[a-z0-9_]{1,12}"
}

fn tools_strategy() -> impl Strategy<Value = Vec<(String, bool)>> {
    prop::collection::btree_map(tool_name_strategy(), any::<bool>(), 1..4)
        .prop_map(|tools| tools.into_iter().collect())
}

/// Sections for a random subset of scan types, each type at most once
pub fn sections_strategy(allow_wrong_grouping: bool) -> impl Strategy<Value = Vec<EngineSection>> {
    let wrong = if allow_wrong_grouping {
        prop::bool::weighted(0.2).boxed()
    } else {
        Just(false).boxed()
    };

    prop::sample::subsequence(ScanType::ALL.to_vec(), 1..=ScanType::ALL.len())
        .prop_flat_map(move |scan_types| {
            let sections: Vec<_> = scan_types
                .into_iter()
                .map(|scan_type| {
                    (tools_strategy(), wrong.clone()).prop_map(move |(tools, wrong_grouping)| {
                        EngineSection {
                            scan_type,
                            tools,
                            wrong_grouping,
                        }
                    })
                })
                .collect();
            sections
        })
        .prop_shuffle()
}
