//! The service catalog: channel slices, transponder index, satellite table,
//! and zap-number pools.
//!
//! One [`ServiceCatalog`] owns every record. Channels live in exactly one of
//! three slices: *all* (the persisted master set), *current* (the most
//! recent scan pass, not yet committed), and *NVOD* (near-video-on-demand
//! subservices with separate numbering). All operations are synchronous and
//! the type has no interior locking; references handed out by lookups are
//! valid until the next mutating call, which the borrow checker enforces.

use std::collections::BTreeMap;

use log::debug;

use crate::channel::Channel;
use crate::config::CatalogConfig;
use crate::numbers::NumberPool;
use crate::provider::ProviderMap;
use crate::satellites::{position_label, SatelliteMap, SatelliteRecord};
use crate::transponder::{FrontendKind, Transponder, TransponderIndex, TransponderMap};
use crate::types::{
    channel_id48, ChannelId, OriginalNetworkId, SatellitePosition, TransponderId,
    TransportStreamId,
};

/// Channels keyed by channel id. Iteration order is ascending id, which is
/// the stable order saves and listings use.
pub type ChannelMap = BTreeMap<ChannelId, Channel>;

/// The catalog manager.
///
/// Construct one per process at the composition root and hand it to
/// collaborators by reference; there is no hidden global instance.
#[derive(Debug)]
pub struct ServiceCatalog {
    pub(crate) config: CatalogConfig,

    pub(crate) all: ChannelMap,
    pub(crate) current: ChannelMap,
    pub(crate) nvod: ChannelMap,

    pub(crate) transponders: TransponderIndex,
    pub(crate) satellites: SatelliteMap,
    pub(crate) provider_map: ProviderMap,

    pub(crate) tv_numbers: NumberPool,
    pub(crate) radio_numbers: NumberPool,

    pub(crate) services_changed: bool,
    pub(crate) have_numbers: bool,
    pub(crate) dup_numbers: bool,

    pub(crate) fake_tsid: TransportStreamId,
    pub(crate) fake_onid: OriginalNetworkId,
}

impl ServiceCatalog {
    pub fn new(config: CatalogConfig) -> Self {
        ServiceCatalog {
            config,
            all: ChannelMap::new(),
            current: ChannelMap::new(),
            nvod: ChannelMap::new(),
            transponders: TransponderIndex::new(),
            satellites: SatelliteMap::new(),
            provider_map: ProviderMap::new(),
            tv_numbers: NumberPool::new(),
            radio_numbers: NumberPool::new(),
            services_changed: false,
            have_numbers: false,
            dup_numbers: false,
            fake_tsid: 0,
            fake_onid: 0,
        }
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    pub fn frontend(&self) -> FrontendKind {
        self.config.frontend
    }

    // ---- channel insertion ------------------------------------------------

    /// Insert into the all-known set. Returns false (and drops nothing) when
    /// the channel id is already present; there is no silent overwrite.
    pub fn add_channel(&mut self, channel: Channel) -> bool {
        Self::insert_channel(&mut self.all, channel)
    }

    /// Insert into the current-scan slice.
    pub fn add_current_channel(&mut self, channel: Channel) -> bool {
        Self::insert_channel(&mut self.current, channel)
    }

    /// Insert into the NVOD slice.
    pub fn add_nvod_channel(&mut self, channel: Channel) -> bool {
        Self::insert_channel(&mut self.nvod, channel)
    }

    fn insert_channel(map: &mut ChannelMap, channel: Channel) -> bool {
        match map.entry(channel.id()) {
            std::collections::btree_map::Entry::Occupied(_) => false,
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(channel);
                true
            }
        }
    }

    // ---- channel removal --------------------------------------------------

    /// Remove one channel from the all-known set, releasing its zap-number.
    pub fn remove_channel(&mut self, channel_id: ChannelId) -> bool {
        match self.all.remove(&channel_id) {
            Some(ch) => {
                if let Some(n) = ch.number {
                    self.pool_mut(ch.is_radio()).free_number(n);
                }
                true
            }
            None => false,
        }
    }

    pub fn remove_all_channels(&mut self) {
        self.all.clear();
        self.tv_numbers.clear();
        self.radio_numbers.clear();
        self.have_numbers = false;
        self.dup_numbers = false;
    }

    /// Discard the uncommitted scan pass.
    pub fn remove_current_channels(&mut self) {
        self.current.clear();
    }

    pub fn remove_nvod_channels(&mut self) {
        self.nvod.clear();
    }

    // ---- channel lookup ---------------------------------------------------

    /// Look up a channel in the all-known set.
    pub fn find_channel(&self, channel_id: ChannelId) -> Option<&Channel> {
        self.all.get(&channel_id)
    }

    /// Like [`find_channel`](Self::find_channel), but falls back to the NVOD
    /// slice and reports which one matched (true = NVOD).
    pub fn find_channel_nvod(&self, channel_id: ChannelId) -> Option<(&Channel, bool)> {
        if let Some(ch) = self.all.get(&channel_id) {
            return Some((ch, false));
        }
        self.nvod.get(&channel_id).map(|ch| (ch, true))
    }

    /// Look up a channel in the uncommitted scan pass.
    pub fn find_current_channel(&self, channel_id: ChannelId) -> Option<&Channel> {
        self.current.get(&channel_id)
    }

    /// Look up a channel by the low 48 bits of its id, ignoring the
    /// satellite position. First match in id order.
    pub fn find_channel_48(&self, channel_id: ChannelId) -> Option<&Channel> {
        let wanted = channel_id48(channel_id);
        self.all.values().find(|ch| channel_id48(ch.id()) == wanted)
    }

    /// First channel with the given name, in id order. Names are not unique.
    pub fn find_channel_by_name(&self, name: &str) -> Option<&Channel> {
        self.all.values().find(|ch| ch.name == name)
    }

    /// Display name of a channel in the all-known set.
    pub fn service_name(&self, channel_id: ChannelId) -> Option<&str> {
        self.all.get(&channel_id).map(|ch| ch.name.as_str())
    }

    pub fn all_channels(&self) -> &ChannelMap {
        &self.all
    }

    pub fn current_channels(&self) -> &ChannelMap {
        &self.current
    }

    pub fn nvod_channels(&self) -> &ChannelMap {
        &self.nvod
    }

    // ---- filtered listings ------------------------------------------------

    /// All radio channels, ascending channel id.
    pub fn all_radio_channels(&self) -> Vec<&Channel> {
        self.all.values().filter(|ch| ch.is_radio()).collect()
    }

    /// All TV channels, ascending channel id.
    pub fn all_tv_channels(&self) -> Vec<&Channel> {
        self.all.values().filter(|ch| ch.is_tv()).collect()
    }

    /// All HD-capable channels, ascending channel id.
    pub fn all_hd_channels(&self) -> Vec<&Channel> {
        self.all.values().filter(|ch| ch.is_hd()).collect()
    }

    /// Channels of one satellite, ascending channel id.
    pub fn all_satellite_channels(&self, position: SatellitePosition) -> Vec<&Channel> {
        self.all
            .values()
            .filter(|ch| ch.position() == position)
            .collect()
    }

    /// Channels of one transponder, ascending channel id.
    pub fn all_transponder_channels(&self, transponder_id: TransponderId) -> Vec<&Channel> {
        self.channels_of_transponder(&self.all, transponder_id).collect()
    }

    /// Channels without an assigned zap-number, ascending channel id.
    pub fn all_unused_channels(&self) -> Vec<&Channel> {
        self.all.values().filter(|ch| ch.is_unused()).collect()
    }

    /// Channel ids of one transponder form a contiguous id range, so slices
    /// can be walked without a full scan.
    pub(crate) fn channels_of_transponder<'a>(
        &self,
        map: &'a ChannelMap,
        transponder_id: TransponderId,
    ) -> impl Iterator<Item = &'a Channel> {
        let lo = transponder_id << 16;
        let hi = (transponder_id << 16) | 0xFFFF;
        map.range(lo..=hi).map(|(_, ch)| ch)
    }

    // ---- zap-numbers ------------------------------------------------------

    fn pool(&self, radio: bool) -> &NumberPool {
        if radio {
            &self.radio_numbers
        } else {
            &self.tv_numbers
        }
    }

    pub(crate) fn pool_mut(&mut self, radio: bool) -> &mut NumberPool {
        if radio {
            &mut self.radio_numbers
        } else {
            &mut self.tv_numbers
        }
    }

    /// Lowest free zap-number of the given pool. Does not claim it.
    pub fn get_free_number(&self, radio: bool) -> u16 {
        self.pool(radio).get_free()
    }

    /// Highest zap-number in use, 0 when the pool is empty.
    pub fn get_max_number(&self, radio: bool) -> u16 {
        self.pool(radio).max()
    }

    /// Claim a zap-number. Claiming an already-claimed number is a no-op.
    pub fn use_number(&mut self, number: u16, radio: bool) {
        self.pool_mut(radio).use_number(number);
    }

    /// Release a zap-number. Releasing an absent number is a no-op.
    pub fn free_number(&mut self, number: u16, radio: bool) {
        self.pool_mut(radio).free_number(number);
    }

    /// Claim a number parsed from source data. A collision flags
    /// `dup_numbers` and falls back to the lowest free number instead of
    /// overwriting the earlier claim; the number actually claimed is
    /// returned.
    pub(crate) fn claim_parsed_number(&mut self, number: u16, radio: bool) -> u16 {
        self.have_numbers = true;
        let pool = self.pool_mut(radio);
        if pool.use_number(number) {
            return number;
        }
        self.dup_numbers = true;
        let pool = self.pool_mut(radio);
        let free = pool.get_free();
        pool.use_number(free);
        debug!(
            "duplicate {} number {}, reassigned {}",
            if radio { "radio" } else { "tv" },
            number,
            free
        );
        free
    }

    /// Whether the imported source data carried zap-numbers at all.
    pub fn have_numbers(&self) -> bool {
        self.have_numbers
    }

    /// Whether more than one channel claimed the same number from source
    /// data; a renumbering pass is then due.
    pub fn dup_numbers(&self) -> bool {
        self.dup_numbers
    }

    /// Assign the lowest free zap-number to every TV/radio channel that has
    /// none, TV and radio from their own pools, in channel-id order.
    /// Returns how many channels were numbered.
    pub fn assign_free_numbers(&mut self) -> usize {
        let unassigned: Vec<(ChannelId, bool)> = self
            .all
            .values()
            .filter(|ch| ch.is_unused() && (ch.is_tv() || ch.is_radio()))
            .map(|ch| (ch.id(), ch.is_radio()))
            .collect();
        let count = unassigned.len();
        for (id, radio) in unassigned {
            let pool = self.pool_mut(radio);
            let number = pool.get_free();
            pool.use_number(number);
            if let Some(ch) = self.all.get_mut(&id) {
                ch.number = Some(number);
            }
        }
        if count > 0 {
            self.services_changed = true;
        }
        count
    }

    /// Configuration-driven bulk reset used before a fresh numbering pass.
    /// Clearing bouquet membership and unassigning zap-numbers are
    /// independent toggles.
    pub fn reset_channel_numbers(&mut self, bouquets: bool, numbers: bool) {
        for ch in self.all.values_mut().chain(self.nvod.values_mut()) {
            if bouquets {
                ch.bouquet_count = 0;
            }
            if numbers {
                ch.number = None;
            }
        }
        if numbers {
            self.tv_numbers.clear();
            self.radio_numbers.clear();
            self.have_numbers = false;
            self.dup_numbers = false;
        }
    }

    // ---- satellites -------------------------------------------------------

    /// Register an orbital position. Returns true when a record was created
    /// or overwritten; an existing record is kept untouched unless `force`.
    /// Without a name, a label derived from the position is used.
    pub fn init_sat_position(
        &mut self,
        position: SatellitePosition,
        name: Option<&str>,
        force: bool,
    ) -> bool {
        let name = match name {
            Some(n) if !n.is_empty() => n.to_string(),
            _ => position_label(position),
        };
        match self.satellites.entry(position) {
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(SatelliteRecord::new(position, name));
                true
            }
            std::collections::btree_map::Entry::Occupied(mut slot) => {
                if force {
                    slot.get_mut().name = name;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Display name of a satellite position.
    pub fn satellite_name(&self, position: SatellitePosition) -> Option<&str> {
        self.satellites.get(&position).map(|s| s.name.as_str())
    }

    /// Reverse lookup: position of a named satellite.
    pub fn satellite_position(&self, name: &str) -> Option<SatellitePosition> {
        self.satellites
            .values()
            .find(|s| s.name == name)
            .map(|s| s.position)
    }

    pub fn satellites(&self) -> &SatelliteMap {
        &self.satellites
    }

    /// Record a rotor calibration value for a position.
    pub fn set_motor_position(&mut self, position: SatellitePosition, motor: i32) -> bool {
        match self.satellites.get_mut(&position) {
            Some(sat) => {
                sat.motor_position = motor;
                true
            }
            None => false,
        }
    }

    // ---- transponders -----------------------------------------------------

    /// Tolerance lookup: the stored transponder describing the same carrier
    /// as `candidate`, if any.
    pub fn get_transponder(&self, candidate: &Transponder) -> Option<&Transponder> {
        self.transponders.find_matching(candidate)
    }

    /// Mutable transponder subset of one satellite; created empty on first
    /// access.
    pub fn satellite_transponders(&mut self, position: SatellitePosition) -> &mut TransponderMap {
        self.transponders.subset_mut(position)
    }

    pub fn transponders(&self) -> &TransponderIndex {
        &self.transponders
    }

    pub fn transponder_count(&self) -> usize {
        self.transponders.len()
    }

    pub fn channel_count(&self) -> usize {
        self.all.len()
    }

    // ---- change tracking & providers --------------------------------------

    /// Flag the catalog as diverged from its persisted form; a later
    /// `save_services(_, if_changed = true)` will then actually write.
    pub fn set_services_changed(&mut self, changed: bool) {
        self.services_changed = changed;
    }

    pub fn services_changed(&self) -> bool {
        self.services_changed
    }

    /// Load the provider-name replacement rules from the configured file.
    /// Absence is non-fatal; the resolver stays a no-op then.
    pub fn load_provider_map(&mut self) -> bool {
        let path = self.config.provider_map_file.clone();
        self.provider_map.load(&path)
    }

    /// Normalize a broadcaster-supplied provider name in place. Returns
    /// whether a rule applied.
    pub fn replace_provider_name(
        &self,
        name: &mut String,
        tsid: TransportStreamId,
        onid: OriginalNetworkId,
    ) -> bool {
        self.provider_map.replace(name, tsid, onid)
    }

    // ---- scan commit ------------------------------------------------------

    /// Merge the uncommitted scan pass into the all-known set: existing
    /// channels are refreshed in place (their zap-number survives), new ones
    /// are inserted. The current slice is drained; the NVOD slice is kept.
    /// Returns the number of newly inserted channels.
    pub fn commit_current_channels(&mut self) -> usize {
        let mut inserted = 0;
        let current = std::mem::take(&mut self.current);
        for (id, ch) in current {
            match self.all.entry(id) {
                std::collections::btree_map::Entry::Occupied(mut slot) => {
                    let kept = slot.get_mut();
                    kept.name = ch.name;
                    kept.provider_name = ch.provider_name;
                    kept.service_type = ch.service_type;
                }
                std::collections::btree_map::Entry::Vacant(slot) => {
                    slot.insert(ch);
                    inserted += 1;
                }
            }
        }
        if inserted > 0 {
            self.services_changed = true;
        }
        debug!("committed scan pass: {} new channels", inserted);
        inserted
    }

    /// Next synthesized (transport, network) id pair for scan data that did
    /// not carry real ones.
    pub(crate) fn next_fake_ids(&mut self) -> (TransportStreamId, OriginalNetworkId) {
        self.fake_tsid = self.fake_tsid.wrapping_add(1);
        self.fake_onid = self.fake_onid.wrapping_add(1);
        (self.fake_tsid, self.fake_onid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::service_type;
    use crate::types::{channel_id_from, pack_transponder_id};

    fn catalog() -> ServiceCatalog {
        ServiceCatalog::new(CatalogConfig::default())
    }

    fn channel(sid: u16, pos: i16, stype: u8, name: &str) -> Channel {
        Channel::new(sid, pack_transponder_id(0x44, 1, pos), name, stype)
    }

    #[test]
    fn test_add_rejects_duplicate_id() {
        let mut cat = catalog();
        assert!(cat.add_channel(channel(1, 192, service_type::DIGITAL_TV, "one")));
        assert!(!cat.add_channel(channel(1, 192, service_type::DIGITAL_TV, "two")));
        assert_eq!(cat.find_channel_by_name("one").unwrap().service_id(), 1);
        assert!(cat.find_channel_by_name("two").is_none());
    }

    #[test]
    fn test_remove_is_isolated() {
        let mut cat = catalog();
        let a = channel(1, 192, service_type::DIGITAL_TV, "a");
        let b = channel(2, 192, service_type::DIGITAL_TV, "b");
        let (ida, idb) = (a.id(), b.id());
        cat.add_channel(a);
        cat.add_channel(b);

        assert!(cat.remove_channel(ida));
        assert!(cat.find_channel(ida).is_none());
        assert!(cat.find_channel(idb).is_some());
        assert!(!cat.remove_channel(ida));
    }

    #[test]
    fn test_remove_releases_number() {
        let mut cat = catalog();
        let mut ch = channel(1, 192, service_type::DIGITAL_TV, "a");
        let id = ch.id();
        ch.number = Some(4);
        cat.use_number(4, false);
        cat.add_channel(ch);

        cat.remove_channel(id);
        assert_eq!(cat.get_free_number(false), 0);
        cat.use_number(0, false);
        cat.use_number(1, false);
        assert_eq!(cat.get_free_number(false), 2);
    }

    #[test]
    fn test_slices_are_disjoint_collections() {
        let mut cat = catalog();
        let ch = channel(1, 192, service_type::DIGITAL_TV, "a");
        let id = ch.id();
        assert!(cat.add_current_channel(ch));
        assert!(cat.find_channel(id).is_none());
        assert!(cat.find_current_channel(id).is_some());

        cat.remove_current_channels();
        assert!(cat.find_current_channel(id).is_none());
    }

    #[test]
    fn test_find_channel_nvod_reports_slice() {
        let mut cat = catalog();
        let tv = channel(1, 192, service_type::DIGITAL_TV, "tv");
        let nv = channel(2, 192, service_type::NVOD_TIME_SHIFTED, "nv");
        let (tv_id, nv_id) = (tv.id(), nv.id());
        cat.add_channel(tv);
        cat.add_nvod_channel(nv);

        assert_eq!(cat.find_channel_nvod(tv_id).unwrap().1, false);
        assert_eq!(cat.find_channel_nvod(nv_id).unwrap().1, true);
        assert!(cat.find_channel(nv_id).is_none());
    }

    #[test]
    fn test_filtered_listings() {
        let mut cat = catalog();
        cat.add_channel(channel(1, 192, service_type::DIGITAL_TV, "tv"));
        cat.add_channel(channel(2, 192, service_type::DIGITAL_RADIO, "radio"));
        cat.add_channel(channel(3, 192, service_type::ADVANCED_HD_TV, "hd"));
        cat.add_channel(channel(4, 130, service_type::DIGITAL_TV, "other sat"));

        assert_eq!(cat.all_tv_channels().len(), 3);
        assert_eq!(cat.all_radio_channels().len(), 1);
        assert_eq!(cat.all_hd_channels().len(), 1);
        assert_eq!(cat.all_satellite_channels(192).len(), 3);
        assert_eq!(cat.all_satellite_channels(130).len(), 1);
        assert_eq!(cat.all_unused_channels().len(), 4);
        assert_eq!(
            cat.all_transponder_channels(pack_transponder_id(0x44, 1, 192)).len(),
            3
        );
    }

    #[test]
    fn test_listings_on_empty_catalog() {
        let cat = catalog();
        assert!(cat.all_tv_channels().is_empty());
        assert!(cat.all_satellite_channels(192).is_empty());
        assert!(cat.all_unused_channels().is_empty());
    }

    #[test]
    fn test_find_channel_48() {
        let mut cat = catalog();
        let ch = channel(7, 192, service_type::DIGITAL_TV, "east");
        cat.add_channel(ch);

        let west_id = channel_id_from(pack_transponder_id(0x44, 1, -192), 7);
        assert!(cat.find_channel(west_id).is_none());
        assert_eq!(cat.find_channel_48(west_id).unwrap().name, "east");
    }

    #[test]
    fn test_reset_channel_numbers_toggles() {
        let mut cat = catalog();
        let mut ch = channel(1, 192, service_type::DIGITAL_TV, "a");
        let id = ch.id();
        ch.number = Some(3);
        ch.bouquet_count = 2;
        cat.add_channel(ch);
        cat.use_number(3, false);

        cat.reset_channel_numbers(true, false);
        let ch = cat.find_channel(id).unwrap();
        assert_eq!(ch.bouquet_count, 0);
        assert_eq!(ch.number, Some(3));

        cat.reset_channel_numbers(false, true);
        let ch = cat.find_channel(id).unwrap();
        assert_eq!(ch.number, None);
        assert_eq!(cat.get_free_number(false), 0);
    }

    #[test]
    fn test_duplicate_parsed_number_defers_to_free() {
        let mut cat = catalog();
        assert_eq!(cat.claim_parsed_number(1, false), 1);
        assert_eq!(cat.claim_parsed_number(1, false), 0);
        assert!(cat.dup_numbers());
        assert_eq!(cat.claim_parsed_number(1, true), 1);
        assert_eq!(cat.get_free_number(false), 2);
    }

    #[test]
    fn test_satellite_bidirectional_lookup() {
        let mut cat = catalog();
        assert!(cat.init_sat_position(192, Some("Astra 19.2E"), false));
        assert!(!cat.init_sat_position(192, Some("renamed"), false));
        assert_eq!(cat.satellite_name(192), Some("Astra 19.2E"));
        assert_eq!(cat.satellite_position("Astra 19.2E"), Some(192));
        assert_eq!(cat.satellite_position("unknown"), None);

        assert!(cat.init_sat_position(192, Some("renamed"), true));
        assert_eq!(cat.satellite_name(192), Some("renamed"));

        assert!(cat.init_sat_position(-8, None, false));
        assert_eq!(cat.satellite_name(-8), Some("0.8W"));
    }

    #[test]
    fn test_assign_free_numbers() {
        let mut cat = catalog();
        let mut numbered = channel(1, 192, service_type::DIGITAL_TV, "numbered");
        numbered.number = Some(0);
        cat.use_number(0, false);
        cat.add_channel(numbered);
        cat.add_channel(channel(2, 192, service_type::DIGITAL_TV, "tv"));
        cat.add_channel(channel(3, 192, service_type::DIGITAL_RADIO, "radio"));
        cat.add_channel(channel(4, 192, service_type::NVOD_REFERENCE, "nvod-ish"));

        assert_eq!(cat.assign_free_numbers(), 2);
        assert_eq!(cat.find_channel_by_name("tv").unwrap().number, Some(1));
        assert_eq!(cat.find_channel_by_name("radio").unwrap().number, Some(0));
        assert!(cat.find_channel_by_name("nvod-ish").unwrap().is_unused());
        assert!(cat.services_changed());
    }

    #[test]
    fn test_commit_current_channels() {
        let mut cat = catalog();
        let mut kept = channel(1, 192, service_type::DIGITAL_TV, "old name");
        kept.number = Some(5);
        cat.add_channel(kept);

        cat.add_current_channel(channel(1, 192, service_type::DIGITAL_TV, "new name"));
        cat.add_current_channel(channel(2, 192, service_type::DIGITAL_TV, "brand new"));

        assert_eq!(cat.commit_current_channels(), 1);
        assert!(cat.current_channels().is_empty());
        assert!(cat.services_changed());

        let refreshed = cat.find_channel_by_name("new name").unwrap();
        assert_eq!(refreshed.number, Some(5));
        assert_eq!(cat.channel_count(), 2);
    }
}
