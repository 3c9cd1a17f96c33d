//! Scan importer: populates the transponder index and the current channel
//! slice from a scan document.
//!
//! One pass per scan source. The document is consumed through the parse
//! tree in [`crate::tree`]; a malformed top-level document aborts the whole
//! import, while malformed individual nodes are skipped and counted. State
//! already imported when a node is skipped is retained; callers that want a
//! clean slate discard it with
//! [`remove_current_channels`](ServiceCatalog::remove_current_channels).

use std::path::Path;

use log::{debug, info, warn};

use crate::catalog::ServiceCatalog;
use crate::channel::{service_type, Channel};
use crate::error::{CatalogError, Result};
use crate::transponder::{Transponder, TuneParams};
use crate::tree::{Document, Node};
use crate::types::{
    pack_transponder_id, OriginalNetworkId, SatellitePosition, TransponderId, TransportStreamId,
};

/// Counters of one import pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Satellite (or cable network) nodes processed.
    pub satellites: u32,
    /// Transponder nodes processed (matched or inserted).
    pub transponders: u32,
    /// Transponders not seen before this pass.
    pub new_transponders: u32,
    /// Services inserted into the current/NVOD slices.
    pub services: u32,
    /// Malformed or duplicate nodes skipped.
    pub skipped: u32,
}

impl ServiceCatalog {
    /// Import a scan document from a file. Fails when the file is absent or
    /// not well-formed; per-node problems only bump [`ScanStats::skipped`].
    pub fn import_scan_file(&mut self, path: &Path) -> Result<ScanStats> {
        let doc = Document::load(path)?;
        let stats = self.import_scan(&doc)?;
        info!(
            "scan import from {}: {} transponders ({} new), {} services, {} skipped",
            path.display(),
            stats.transponders,
            stats.new_transponders,
            stats.services,
            stats.skipped
        );
        Ok(stats)
    }

    /// Import an already-parsed scan document: satellites → transponders →
    /// channels into the transponder index and the current/NVOD slices.
    pub fn import_scan(&mut self, doc: &Document) -> Result<ScanStats> {
        let root = doc.root();
        if root.name() != "zapit" {
            return Err(CatalogError::MalformedDocument(format!(
                "scan document root is <{}>, expected <zapit>",
                root.name()
            )));
        }

        let mut stats = ScanStats::default();
        for sat in root.children() {
            let cable = match sat.name() {
                "sat" => false,
                "cable" => true,
                other => {
                    warn!("unexpected <{}> node in scan document skipped", other);
                    stats.skipped += 1;
                    continue;
                }
            };
            let Some(position) = sat.attr_i16("position") else {
                warn!("satellite node without position skipped");
                stats.skipped += 1;
                continue;
            };
            self.init_sat_position(position, sat.attr("name"), false);
            stats.satellites += 1;
            self.parse_transponders(sat, position, cable, &mut stats);
        }
        Ok(stats)
    }

    /// Per-satellite transponder pass. A tolerance match marks the stored
    /// record `updated` and refreshes its tuning parameters; a miss inserts
    /// a new record, synthesizing transport/network ids when the source did
    /// not carry real ones.
    fn parse_transponders(
        &mut self,
        sat: &Node,
        position: SatellitePosition,
        cable: bool,
        stats: &mut ScanStats,
    ) {
        for ts in sat.children_named("TS") {
            let Some((params, polarization)) = tune_params_from(ts, cable) else {
                warn!("transponder node without frequency/symbol rate skipped");
                stats.skipped += 1;
                continue;
            };
            let real_ids = match (ts.attr_u16_hex("id"), ts.attr_u16_hex("on")) {
                (Some(tsid), Some(onid)) => Some((tsid, onid)),
                _ => None,
            };

            let tpid = self.merge_transponder(position, params, polarization, real_ids, stats);
            let (tsid, onid, _) = crate::types::unpack_transponder_id(tpid);
            self.parse_channels(ts, tsid, onid, position, stats);
        }
    }

    /// Match-or-insert one carrier description; returns the id it ended up
    /// under.
    fn merge_transponder(
        &mut self,
        position: SatellitePosition,
        params: TuneParams,
        polarization: u8,
        real_ids: Option<(TransportStreamId, OriginalNetworkId)>,
        stats: &mut ScanStats,
    ) -> TransponderId {
        let (probe_tsid, probe_onid) = real_ids.unwrap_or((0, 0));
        let probe = Transponder::new(
            pack_transponder_id(probe_tsid, probe_onid, position),
            params,
            polarization,
        );

        stats.transponders += 1;
        if let Some(existing) = self.transponders.find_matching_mut(&probe) {
            existing.updated = true;
            existing.params = params;
            debug!("transponder {:016x} re-observed", existing.id);
            return existing.id;
        }

        let (tsid, onid) = real_ids.unwrap_or_else(|| self.next_fake_ids());
        let id = pack_transponder_id(tsid, onid, position);
        self.transponders.insert(Transponder::new(id, params, polarization));
        stats.new_transponders += 1;
        id
    }

    /// Per-transponder service pass: derive the channel id, normalize the
    /// provider name, classify NVOD vs regular, insert into the current
    /// slice. Source-supplied zap-numbers go through the duplicate-aware
    /// claim path.
    fn parse_channels(
        &mut self,
        ts: &Node,
        tsid: TransportStreamId,
        onid: OriginalNetworkId,
        position: SatellitePosition,
        stats: &mut ScanStats,
    ) {
        let tpid = pack_transponder_id(tsid, onid, position);
        for s in ts.children_named("S") {
            let Some(sid) = s.attr_u16_hex("i") else {
                stats.skipped += 1;
                continue;
            };
            let Some(name) = s.attr("n") else {
                warn!("service {:04x} without a name skipped", sid);
                stats.skipped += 1;
                continue;
            };
            let stype = s.attr_u8_hex("t").unwrap_or(service_type::DIGITAL_TV);

            let mut channel = Channel::new(sid, tpid, name, stype);
            if !channel.is_tv() && !channel.is_radio() && !channel.is_nvod() {
                debug!("service {:04x} of type {:02x} not cataloged", sid, stype);
                stats.skipped += 1;
                continue;
            }

            let mut provider = s.attr("p").unwrap_or("").to_string();
            self.provider_map.replace(&mut provider, tsid, onid);
            channel.provider_name = provider;

            // NVOD subservices keep their own numbering; only regular
            // channels claim from the zap-number pools.
            if !channel.is_nvod() {
                if let Some(num) = s.attr_dec("num").and_then(|v| u16::try_from(v).ok()) {
                    let radio = channel.is_radio();
                    channel.number = Some(self.claim_parsed_number(num, radio));
                }
            }

            let inserted = if channel.is_nvod() {
                self.add_nvod_channel(channel)
            } else {
                self.add_current_channel(channel)
            };
            if inserted {
                stats.services += 1;
            } else {
                stats.skipped += 1;
            }
        }
    }

    /// Ad hoc lookup for scan data that references a carrier by tuning
    /// parameters instead of identifier: parse the node's parameters and
    /// tolerance-match them against the index.
    pub fn find_transponder(
        &self,
        node: &Node,
        position: SatellitePosition,
        cable: bool,
    ) -> Option<TransponderId> {
        let (params, polarization) = tune_params_from(node, cable)?;
        let probe = Transponder::new(
            pack_transponder_id(0, 0, position),
            params,
            polarization,
        );
        self.transponders.find_matching(&probe).map(|tp| tp.id)
    }

    /// Ingest satellite/cable tuning tables: transponder definitions without
    /// service data, written with decimal attributes. Carriers are merged
    /// under the same tolerance relation; ids are always synthesized since
    /// tuning tables carry none. Returns the number of new carriers.
    pub fn import_tuning_tables(&mut self, doc: &Document) -> Result<u32> {
        let root = doc.root();
        if root.name() != "zapit" {
            return Err(CatalogError::MalformedDocument(format!(
                "tuning-table root is <{}>, expected <zapit>",
                root.name()
            )));
        }

        let mut inserted = 0;
        for sat in root.children() {
            let cable = sat.name() == "cable";
            if !cable && sat.name() != "sat" {
                continue;
            }
            let Some(position) = sat.attr_i16("position") else {
                continue;
            };
            self.init_sat_position(position, sat.attr("name"), false);

            for node in sat.children_named("transponder") {
                let Some(frequency) = node.attr_u32("frequency") else {
                    continue;
                };
                let Some(symbol_rate) = node.attr_u32("symbol_rate") else {
                    continue;
                };
                let params = TuneParams {
                    frequency,
                    symbol_rate,
                    fec_inner: node.attr_u8("fec_inner").unwrap_or(0),
                    modulation: node.attr_u8("modulation").unwrap_or(0),
                    inversion: 0,
                };
                let polarization = node.attr_u8("polarization").unwrap_or(0);

                let probe =
                    Transponder::new(pack_transponder_id(0, 0, position), params, polarization);
                if self.transponders.find_matching(&probe).is_some() {
                    continue;
                }
                let (tsid, onid) = self.next_fake_ids();
                let id = pack_transponder_id(tsid, onid, position);
                self.transponders.insert(Transponder::new(id, params, polarization));
                inserted += 1;
            }
        }
        Ok(inserted)
    }
}

/// Tuning parameters of a `<TS>`-style node. Satellite carriers read `pol`,
/// cable ones read `mod`; `frq` and `sr` are required.
pub(crate) fn tune_params_from(node: &Node, cable: bool) -> Option<(TuneParams, u8)> {
    let frequency = node.attr_u32("frq")?;
    let symbol_rate = node.attr_u32("sr")?;
    let fec_inner = node.attr_u8("fec").unwrap_or(0);
    let inversion = node.attr_u8("inv").unwrap_or(0);
    let (polarization, modulation) = if cable {
        (0, node.attr_u8("mod").unwrap_or(0))
    } else {
        (node.attr_u8("pol").unwrap_or(0), 0)
    };
    Some((
        TuneParams {
            frequency,
            symbol_rate,
            fec_inner,
            modulation,
            inversion,
        },
        polarization,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CatalogConfig;

    const SCAN: &str = r#"<zapit>
  <sat name="Astra 19.2E" position="192">
    <TS id="044d" on="0001" frq="12551500" inv="0" sr="22000000" fec="4" pol="1">
      <S i="6dca" n="Das Erste" t="01" p="ARD"/>
      <S i="6dcb" n="Radio One" t="02"/>
      <S i="6dcc" n="Shop Loop" t="0c"/>
    </TS>
    <TS id="0451" on="0001" frq="11953500" inv="0" sr="27500000" fec="3" pol="0">
      <S i="0131" n="Premiere NVOD" t="05"/>
    </TS>
  </sat>
</zapit>"#;

    fn catalog() -> ServiceCatalog {
        ServiceCatalog::new(CatalogConfig::default())
    }

    #[test]
    fn test_import_scan() {
        let mut cat = catalog();
        let doc = Document::parse(SCAN).unwrap();
        let stats = cat.import_scan(&doc).unwrap();

        assert_eq!(stats.satellites, 1);
        assert_eq!(stats.transponders, 2);
        assert_eq!(stats.new_transponders, 2);
        assert_eq!(stats.services, 3);
        // The 0x0c type service is not cataloged.
        assert_eq!(stats.skipped, 1);

        assert_eq!(cat.transponder_count(), 2);
        assert_eq!(cat.current_channels().len(), 2);
        assert_eq!(cat.nvod_channels().len(), 1);
        assert_eq!(cat.satellite_name(192), Some("Astra 19.2E"));
    }

    #[test]
    fn test_reimport_is_idempotent_for_transponders() {
        let mut cat = catalog();
        let doc = Document::parse(SCAN).unwrap();
        cat.import_scan(&doc).unwrap();
        assert_eq!(cat.transponder_count(), 2);

        let stats = cat.import_scan(&doc).unwrap();
        assert_eq!(cat.transponder_count(), 2);
        assert_eq!(stats.new_transponders, 0);
        for tp in cat.transponders().iter() {
            assert!(tp.updated);
        }
    }

    #[test]
    fn test_drifted_frequency_merges_into_existing_carrier() {
        let mut cat = catalog();
        cat.import_scan(&Document::parse(SCAN).unwrap()).unwrap();

        // Same carrier re-observed 2 MHz off.
        let drifted = SCAN.replace("12551500", "12553500");
        cat.import_scan(&Document::parse(&drifted).unwrap()).unwrap();

        assert_eq!(cat.transponder_count(), 2);
        let subset = cat.transponders().subset(192).unwrap();
        let tp = subset
            .values()
            .find(|tp| tp.transport_stream_id == 0x044D)
            .unwrap();
        assert_eq!(tp.params.frequency, 12_553_500);
        assert!(tp.updated);
    }

    #[test]
    fn test_missing_ids_get_fake_ones() {
        let mut cat = catalog();
        let doc = Document::parse(
            r#"<zapit>
                 <sat name="X" position="130">
                   <TS frq="11000000" sr="27500000" pol="0">
                     <S i="0001" n="NoId TV" t="01"/>
                   </TS>
                 </sat>
               </zapit>"#,
        )
        .unwrap();
        let stats = cat.import_scan(&doc).unwrap();
        assert_eq!(stats.new_transponders, 1);

        let tp = cat.transponders().iter().next().unwrap();
        assert_eq!(tp.transport_stream_id, 1);
        assert_eq!(tp.original_network_id, 1);
        assert_eq!(cat.current_channels().len(), 1);
    }

    #[test]
    fn test_malformed_root_aborts() {
        let mut cat = catalog();
        let doc = Document::parse("<services/>").unwrap();
        assert!(cat.import_scan(&doc).is_err());
    }

    #[test]
    fn test_malformed_nodes_are_skipped_not_fatal() {
        let mut cat = catalog();
        let doc = Document::parse(
            r#"<zapit>
                 <sat name="NoPos">
                   <TS frq="1" sr="1"/>
                 </sat>
                 <sat name="Ok" position="192">
                   <TS frq="12551500" sr="22000000" pol="1">
                     <S n="nameless service has no id" t="01"/>
                     <S i="0002" n="Good" t="01"/>
                   </TS>
                 </sat>
               </zapit>"#,
        )
        .unwrap();
        let stats = cat.import_scan(&doc).unwrap();
        assert_eq!(stats.satellites, 1);
        assert_eq!(stats.services, 1);
        assert_eq!(stats.skipped, 2);
    }

    #[test]
    fn test_duplicate_scan_numbers_are_reassigned() {
        let mut cat = catalog();
        let doc = Document::parse(
            r#"<zapit>
                 <sat name="X" position="192">
                   <TS id="0001" on="0001" frq="12551500" sr="22000000" pol="1">
                     <S i="0001" n="A" t="01" num="1"/>
                     <S i="0002" n="B" t="01" num="1"/>
                   </TS>
                 </sat>
               </zapit>"#,
        )
        .unwrap();
        cat.import_scan(&doc).unwrap();
        assert!(cat.dup_numbers());

        let numbers: Vec<_> = cat
            .current_channels()
            .values()
            .map(|ch| ch.number.unwrap())
            .collect();
        assert_eq!(numbers, vec![1, 0]);
    }

    #[test]
    fn test_find_transponder_by_params() {
        let mut cat = catalog();
        cat.import_scan(&Document::parse(SCAN).unwrap()).unwrap();

        let doc = Document::parse(r#"<q frq="12552000" sr="22000000" pol="1"/>"#).unwrap();
        let tpid = cat.find_transponder(doc.root(), 192, false).unwrap();
        assert_eq!(tpid, pack_transponder_id(0x044D, 0x0001, 192));

        let doc = Document::parse(r#"<q frq="10000000" sr="22000000" pol="1"/>"#).unwrap();
        assert!(cat.find_transponder(doc.root(), 192, false).is_none());
    }

    #[test]
    fn test_import_tuning_tables() {
        let mut cat = catalog();
        let doc = Document::parse(
            r#"<zapit>
                 <sat name="Astra 19.2E" position="192">
                   <transponder frequency="12551500" symbol_rate="22000000" polarization="1" fec_inner="4"/>
                   <transponder frequency="11953500" symbol_rate="27500000" polarization="0" fec_inner="3"/>
                   <transponder frequency="12552000" symbol_rate="22000000" polarization="1" fec_inner="4"/>
                 </sat>
               </zapit>"#,
        )
        .unwrap();
        // The third entry is within tolerance of the first and merges away.
        assert_eq!(cat.import_tuning_tables(&doc).unwrap(), 2);
        assert_eq!(cat.transponder_count(), 2);
    }
}
