//! Transponder records and the per-satellite transponder index.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::types::{
    unpack_transponder_id, FreqId, OriginalNetworkId, SatellitePosition, TransponderId,
    TransportStreamId,
};

/// Frequency slack, in tuning units, under which two descriptions of a
/// carrier are considered the same transponder.
pub const FREQ_TOLERANCE: u32 = 3000;

/// Broadcast delivery front end the catalog is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrontendKind {
    /// Satellite delivery (QPSK); carriers are polarized.
    Satellite,
    /// Cable delivery (QAM); carriers carry a modulation instead.
    Cable,
}

impl FrontendKind {
    pub fn is_cable(self) -> bool {
        self == FrontendKind::Cable
    }
}

/// Tuning parameters of one carrier.
///
/// `modulation` is meaningful for cable carriers only and stays 0 for
/// satellite ones, where `polarization` on the [`Transponder`] applies
/// instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TuneParams {
    /// Carrier frequency in the broadcast tuning unit (kHz).
    pub frequency: FreqId,
    /// Symbol rate in symbols per second.
    pub symbol_rate: u32,
    /// Inner FEC rate code.
    pub fec_inner: u8,
    /// QAM modulation code (cable only).
    pub modulation: u8,
    /// Spectral inversion code.
    pub inversion: u8,
}

/// One broadcast carrier on a satellite or cable multiplex.
#[derive(Debug, Clone)]
pub struct Transponder {
    /// Packed identifier; the three unpacked fields below are derived from
    /// it at construction.
    pub id: TransponderId,
    pub transport_stream_id: TransportStreamId,
    pub original_network_id: OriginalNetworkId,
    pub position: SatellitePosition,
    pub params: TuneParams,
    /// Low-order bit is the polarization; higher bits are reserved.
    pub polarization: u8,
    /// Re-observed in a later scan pass. Transient, not persisted.
    pub updated: bool,
    /// Tuning or scanning this carrier failed. Transient, not persisted.
    pub failed: bool,
}

impl Transponder {
    pub fn new(id: TransponderId, params: TuneParams, polarization: u8) -> Self {
        let (transport_stream_id, original_network_id, position) = unpack_transponder_id(id);
        Transponder {
            id,
            transport_stream_id,
            original_network_id,
            position,
            params,
            polarization,
            updated: false,
            failed: false,
        }
    }

    /// Whether two descriptions denote the same physical carrier: same
    /// satellite position, same polarization parity, and frequencies within
    /// [`FREQ_TOLERANCE`] of each other.
    pub fn same_carrier(&self, other: &Transponder) -> bool {
        self.position == other.position
            && (self.polarization & 1) == (other.polarization & 1)
            && self.frequency_delta(other) <= FREQ_TOLERANCE
    }

    /// Absolute frequency distance to another carrier.
    pub fn frequency_delta(&self, other: &Transponder) -> u32 {
        self.params.frequency.abs_diff(other.params.frequency)
    }
}

/// Transponders of one satellite, keyed by identifier.
pub type TransponderMap = BTreeMap<TransponderId, Transponder>;

/// All known transponders, partitioned by satellite position.
#[derive(Debug, Default)]
pub struct TransponderIndex {
    by_position: BTreeMap<SatellitePosition, TransponderMap>,
}

impl TransponderIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transponder subset of one satellite, if any is known.
    pub fn subset(&self, position: SatellitePosition) -> Option<&TransponderMap> {
        self.by_position.get(&position)
    }

    /// Mutable transponder subset of one satellite; an empty subset is
    /// created on first access.
    pub fn subset_mut(&mut self, position: SatellitePosition) -> &mut TransponderMap {
        self.by_position.entry(position).or_default()
    }

    /// Insert a transponder under its satellite's subset, keyed by id.
    /// Returns the previous record under the same id, if any.
    pub fn insert(&mut self, tp: Transponder) -> Option<Transponder> {
        self.subset_mut(tp.position).insert(tp.id, tp)
    }

    /// Look up a transponder by exact id.
    pub fn get(&self, id: TransponderId) -> Option<&Transponder> {
        self.by_position
            .get(&crate::types::transponder_position(id))
            .and_then(|m| m.get(&id))
    }

    /// Find the stored transponder describing the same carrier as
    /// `candidate`, scanning only the candidate's satellite subset.
    ///
    /// When several stored records satisfy the tolerance relation, the one
    /// with the smallest frequency delta wins; equal deltas break toward the
    /// lower transponder id.
    pub fn find_matching(&self, candidate: &Transponder) -> Option<&Transponder> {
        let subset = self.by_position.get(&candidate.position)?;
        let mut best: Option<&Transponder> = None;
        for tp in subset.values() {
            if !tp.same_carrier(candidate) {
                continue;
            }
            match best {
                Some(b) if b.frequency_delta(candidate) <= tp.frequency_delta(candidate) => {}
                _ => best = Some(tp),
            }
        }
        best
    }

    /// Mutable variant of [`find_matching`](Self::find_matching).
    pub fn find_matching_mut(&mut self, candidate: &Transponder) -> Option<&mut Transponder> {
        let id = self.find_matching(candidate)?.id;
        self.by_position
            .get_mut(&candidate.position)
            .and_then(|m| m.get_mut(&id))
    }

    /// Satellite positions with a (possibly empty) subset, ascending.
    pub fn positions(&self) -> impl Iterator<Item = SatellitePosition> + '_ {
        self.by_position.keys().copied()
    }

    /// All transponders across all satellites.
    pub fn iter(&self) -> impl Iterator<Item = &Transponder> {
        self.by_position.values().flat_map(|m| m.values())
    }

    /// Total transponder count.
    pub fn len(&self) -> usize {
        self.by_position.values().map(|m| m.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every record.
    pub fn clear(&mut self) {
        self.by_position.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::pack_transponder_id;

    fn tp(tsid: u16, pos: i16, freq: u32, pol: u8) -> Transponder {
        let params = TuneParams {
            frequency: freq,
            symbol_rate: 22_000_000,
            fec_inner: 4,
            ..Default::default()
        };
        Transponder::new(pack_transponder_id(tsid, 1, pos), params, pol)
    }

    #[test]
    fn test_same_carrier_tolerance_boundary() {
        let a = tp(1, 192, 12_551_500, 1);
        assert!(a.same_carrier(&tp(2, 192, 12_551_500 + FREQ_TOLERANCE, 1)));
        assert!(!a.same_carrier(&tp(2, 192, 12_551_500 + FREQ_TOLERANCE + 1, 1)));
    }

    #[test]
    fn test_same_carrier_checks_position_and_polarization() {
        let a = tp(1, 192, 12_551_500, 1);
        assert!(!a.same_carrier(&tp(2, 130, 12_551_500, 1)));
        assert!(!a.same_carrier(&tp(2, 192, 12_551_500, 0)));
        // Only the low polarization bit counts.
        assert!(a.same_carrier(&tp(2, 192, 12_551_500, 3)));
    }

    #[test]
    fn test_find_matching_prefers_smallest_delta() {
        let mut index = TransponderIndex::new();
        index.insert(tp(1, 192, 12_551_500, 1));
        index.insert(tp(2, 192, 12_553_000, 1));

        let probe = tp(9, 192, 12_552_800, 1);
        let hit = index.find_matching(&probe).unwrap();
        assert_eq!(hit.transport_stream_id, 2);
    }

    #[test]
    fn test_find_matching_tie_breaks_toward_lower_id() {
        let mut index = TransponderIndex::new();
        index.insert(tp(1, 192, 12_550_000, 1));
        index.insert(tp(2, 192, 12_552_000, 1));

        // Equidistant from both stored carriers.
        let probe = tp(9, 192, 12_551_000, 1);
        let hit = index.find_matching(&probe).unwrap();
        assert_eq!(hit.transport_stream_id, 1);
    }

    #[test]
    fn test_find_matching_scans_only_the_satellite_subset() {
        let mut index = TransponderIndex::new();
        index.insert(tp(1, 130, 12_551_500, 1));

        assert!(index.find_matching(&tp(9, 192, 12_551_500, 1)).is_none());
    }

    #[test]
    fn test_subset_created_on_first_access() {
        let mut index = TransponderIndex::new();
        assert!(index.subset(192).is_none());
        index.subset_mut(192);
        assert!(index.subset(192).is_some());
        assert!(index.subset(192).unwrap().is_empty());
    }
}
