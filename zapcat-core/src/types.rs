//! Broadcast identifier types and the bit-packed transponder/channel id codec.
//!
//! A transponder id packs three disjoint fields into a `u64`:
//!
//! ```text
//! +----------+--------------------+----------------------+----------------------+
//! | reserved | satellite position | transport_stream_id  | original_network_id  |
//! |  63..48  |       47..32       |        31..16        |         15..0        |
//! +----------+--------------------+----------------------+----------------------+
//! ```
//!
//! A channel id is the transponder id shifted left by 16 bits with the
//! service id in the low word, so the satellite position ends up in the top
//! word and the low 48 bits identify the service independently of the
//! orbital slot.

/// Transport stream identifier of a multiplex.
pub type TransportStreamId = u16;
/// Original network identifier of the owning network.
pub type OriginalNetworkId = u16;
/// Service identifier within a transport stream.
pub type ServiceId = u16;
/// Orbital position in tenths of a degree, negative values west of the
/// reference meridian. Valid range is [-4095, 4095].
pub type SatellitePosition = i16;
/// Carrier frequency in the broadcast tuning unit (kHz).
pub type FreqId = u32;
/// Packed transponder identifier.
pub type TransponderId = u64;
/// Packed channel identifier (transponder id + service id).
pub type ChannelId = u64;

/// Top nibble of the position field marks a position west of the reference
/// meridian.
const POSITION_WEST_FLAG: u16 = 0xF000;
/// Magnitude bits of the position field.
const POSITION_MASK: u16 = 0x0FFF;

/// Encode a signed satellite position into its 16-bit id field.
pub fn position_to_field(position: SatellitePosition) -> u16 {
    if position < 0 {
        POSITION_WEST_FLAG | (position.unsigned_abs() & POSITION_MASK)
    } else {
        position as u16
    }
}

/// Decode a 16-bit position field back into a signed position.
///
/// A field with its top nibble set denotes a western position and decodes
/// negative in [-4095, -1]; anything else decodes unchanged in [0, 4095].
pub fn position_from_field(field: u16) -> SatellitePosition {
    if field & POSITION_WEST_FLAG != 0 {
        -((field & POSITION_MASK) as SatellitePosition)
    } else {
        (field & POSITION_MASK) as SatellitePosition
    }
}

/// Pack a transponder id from its three fields.
///
/// Bit placement is fixed; field widths are not validated, callers pass
/// in-range values.
pub fn pack_transponder_id(
    transport_stream_id: TransportStreamId,
    original_network_id: OriginalNetworkId,
    position: SatellitePosition,
) -> TransponderId {
    ((position_to_field(position) as u64) << 32)
        | ((transport_stream_id as u64) << 16)
        | original_network_id as u64
}

/// Unpack a transponder id into (transport_stream_id, original_network_id,
/// signed satellite position). Inverse of [`pack_transponder_id`] for all
/// in-range inputs.
pub fn unpack_transponder_id(
    id: TransponderId,
) -> (TransportStreamId, OriginalNetworkId, SatellitePosition) {
    (
        ((id >> 16) & 0xFFFF) as TransportStreamId,
        (id & 0xFFFF) as OriginalNetworkId,
        position_from_field(((id >> 32) & 0xFFFF) as u16),
    )
}

/// Satellite position encoded in a transponder id.
pub fn transponder_position(id: TransponderId) -> SatellitePosition {
    position_from_field(((id >> 32) & 0xFFFF) as u16)
}

/// Derive a channel id from a service id and its transponder id.
pub fn channel_id_from(transponder_id: TransponderId, service_id: ServiceId) -> ChannelId {
    (transponder_id << 16) | service_id as u64
}

/// Transponder id a channel belongs to.
pub fn channel_transponder_id(channel_id: ChannelId) -> TransponderId {
    channel_id >> 16
}

/// Service id of a channel.
pub fn channel_service_id(channel_id: ChannelId) -> ServiceId {
    (channel_id & 0xFFFF) as ServiceId
}

/// Low 48 bits of a channel id: the service identity without the satellite
/// position. Used to re-find a service when scan data and stored data
/// disagree about the orbital slot.
pub fn channel_id48(channel_id: ChannelId) -> u64 {
    channel_id & 0xFFFF_FFFF_FFFF
}

/// Satellite position encoded in a channel id.
pub fn channel_position(channel_id: ChannelId) -> SatellitePosition {
    position_from_field((channel_id >> 48) as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_unpack_round_trip() {
        for &(tsid, onid, pos) in &[
            (0x044Du16, 0x0001u16, 192i16),
            (0xFFFF, 0xFFFF, 4095),
            (0, 0, 0),
            (0x1234, 0xABCD, -300),
            (1, 2, -4095),
            (7, 9, -1),
        ] {
            let id = pack_transponder_id(tsid, onid, pos);
            assert_eq!(unpack_transponder_id(id), (tsid, onid, pos), "id {:016x}", id);
        }
    }

    #[test]
    fn test_west_positions_decode_negative() {
        let id = pack_transponder_id(1, 2, -82);
        let (_, _, pos) = unpack_transponder_id(id);
        assert_eq!(pos, -82);
        assert_eq!((id >> 32) as u16 & POSITION_WEST_FLAG, POSITION_WEST_FLAG);
    }

    #[test]
    fn test_east_positions_keep_raw_field() {
        assert_eq!(position_to_field(192), 192);
        assert_eq!(position_from_field(192), 192);
    }

    #[test]
    fn test_channel_id_fields() {
        let tpid = pack_transponder_id(0x044D, 0x0001, 192);
        let chid = channel_id_from(tpid, 0x6DCA);
        assert_eq!(channel_transponder_id(chid), tpid);
        assert_eq!(channel_service_id(chid), 0x6DCA);
        assert_eq!(channel_position(chid), 192);
    }

    #[test]
    fn test_channel_id48_ignores_position() {
        let east = channel_id_from(pack_transponder_id(0x044D, 0x0001, 192), 0x6DCA);
        let west = channel_id_from(pack_transponder_id(0x044D, 0x0001, -192), 0x6DCA);
        assert_ne!(east, west);
        assert_eq!(channel_id48(east), channel_id48(west));
    }
}
