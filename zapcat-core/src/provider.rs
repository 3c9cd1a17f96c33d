//! Provider-name replacement rules.
//!
//! Broadcasters ship inconsistent provider strings; the provider map rewrites
//! them to canonical display names. Rules are ordered and the first match
//! wins.

use std::path::Path;

use log::{debug, info, warn};

use crate::error::CatalogError;
use crate::tree::Document;
use crate::types::{FreqId, OriginalNetworkId, TransportStreamId};

/// One rewrite rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRule {
    pub transport_stream_id: TransportStreamId,
    pub original_network_id: OriginalNetworkId,
    /// Carrier frequency the rule was written for. Advisory only; the match
    /// key is (tsid, onid).
    pub frequency: FreqId,
    /// Provider name as broadcast.
    pub name: String,
    /// Canonical replacement.
    pub new_name: String,
}

/// Ordered list of provider rewrite rules.
#[derive(Debug, Default)]
pub struct ProviderMap {
    rules: Vec<ProviderRule>,
}

impl ProviderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load rules from the provider-map document.
    ///
    /// A missing or unparseable file leaves the map empty and returns false;
    /// the resolver then behaves as a no-op.
    pub fn load(&mut self, path: &Path) -> bool {
        self.rules.clear();
        let doc = match Document::load(path) {
            Ok(doc) => doc,
            Err(CatalogError::FileNotFound(_)) => {
                debug!("no provider map at {}", path.display());
                return false;
            }
            Err(e) => {
                warn!("provider map {} unusable: {}", path.display(), e);
                return false;
            }
        };

        for node in doc.root().children_named("TS") {
            let (Some(tsid), Some(onid)) = (node.attr_u16_hex("id"), node.attr_u16_hex("on"))
            else {
                warn!("provider rule without transport/network id skipped");
                continue;
            };
            let (Some(name), Some(new_name)) = (node.attr("name"), node.attr("newname")) else {
                warn!("provider rule for {:04x}:{:04x} without names skipped", tsid, onid);
                continue;
            };
            self.rules.push(ProviderRule {
                transport_stream_id: tsid,
                original_network_id: onid,
                frequency: node.attr_u32("frq").unwrap_or(0),
                name: name.to_string(),
                new_name: new_name.to_string(),
            });
        }

        info!("loaded {} provider replacement rules", self.rules.len());
        !self.rules.is_empty()
    }

    /// Rewrite `name` through the first rule whose (tsid, onid) matches.
    /// Returns false and leaves `name` untouched when no rule applies.
    pub fn replace(
        &self,
        name: &mut String,
        tsid: TransportStreamId,
        onid: OriginalNetworkId,
    ) -> bool {
        for rule in &self.rules {
            if rule.transport_stream_id == tsid && rule.original_network_id == onid {
                *name = rule.new_name.clone();
                return true;
            }
        }
        false
    }

    pub fn rules(&self) -> &[ProviderRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(tsid: u16, onid: u16, new_name: &str) -> ProviderRule {
        ProviderRule {
            transport_stream_id: tsid,
            original_network_id: onid,
            frequency: 0,
            name: String::new(),
            new_name: new_name.to_string(),
        }
    }

    #[test]
    fn test_replace_first_match_wins() {
        let map = ProviderMap {
            rules: vec![rule(0x44, 1, "First"), rule(0x44, 1, "Second")],
        };
        let mut name = "raw".to_string();
        assert!(map.replace(&mut name, 0x44, 1));
        assert_eq!(name, "First");
    }

    #[test]
    fn test_replace_no_match_leaves_name() {
        let map = ProviderMap {
            rules: vec![rule(0x44, 1, "First")],
        };
        let mut name = "raw".to_string();
        assert!(!map.replace(&mut name, 0x45, 1));
        assert_eq!(name, "raw");
    }

    #[test]
    fn test_load_missing_file_is_non_fatal() {
        let mut map = ProviderMap::new();
        assert!(!map.load(Path::new("/nonexistent/providermap.xml")));
        assert!(map.is_empty());
    }

    #[test]
    fn test_rules_from_document() {
        let doc = Document::parse(
            r#"<provider_map>
                 <TS id="0044" on="0001" frq="12480" name="BetaDigital" newname="Premiere"/>
                 <TS id="0001" on="0085" name="ARD" newname="Das Erste"/>
                 <TS id="9999"/>
               </provider_map>"#,
        )
        .unwrap();

        let mut map = ProviderMap::new();
        for node in doc.root().children_named("TS") {
            if let (Some(tsid), Some(onid), Some(name), Some(newname)) = (
                node.attr_u16_hex("id"),
                node.attr_u16_hex("on"),
                node.attr("name"),
                node.attr("newname"),
            ) {
                map.rules.push(ProviderRule {
                    transport_stream_id: tsid,
                    original_network_id: onid,
                    frequency: node.attr_u32("frq").unwrap_or(0),
                    name: name.to_string(),
                    new_name: newname.to_string(),
                });
            }
        }

        assert_eq!(map.rules().len(), 2);
        let mut name = "BetaDigital".to_string();
        assert!(map.replace(&mut name, 0x44, 1));
        assert_eq!(name, "Premiere");
    }
}
