//! Channel records of the service catalog.

use crate::types::{
    channel_id_from, channel_position, channel_service_id, channel_transponder_id, ChannelId,
    SatellitePosition, ServiceId, TransponderId,
};

/// DVB service type values, the subset the catalog classifies.
pub mod service_type {
    /// Digital television service.
    pub const DIGITAL_TV: u8 = 0x01;
    /// Digital radio sound service.
    pub const DIGITAL_RADIO: u8 = 0x02;
    /// NVOD reference service.
    pub const NVOD_REFERENCE: u8 = 0x04;
    /// NVOD time-shifted service.
    pub const NVOD_TIME_SHIFTED: u8 = 0x05;
    /// Advanced codec SD television.
    pub const ADVANCED_SD_TV: u8 = 0x16;
    /// MPEG-2 HD television.
    pub const MPEG2_HD_TV: u8 = 0x11;
    /// Advanced codec HD television.
    pub const ADVANCED_HD_TV: u8 = 0x19;
}

/// One service of the catalog.
///
/// Identity is the packed channel id; the service id, transponder id, and
/// satellite position are all recoverable from it.
#[derive(Debug, Clone)]
pub struct Channel {
    channel_id: ChannelId,
    /// Service name as broadcast (after provider-name normalization of the
    /// provider field only; the service name is kept verbatim).
    pub name: String,
    /// Broadcaster-supplied provider name, normalized through the provider
    /// map at import time.
    pub provider_name: String,
    /// Raw DVB service type byte.
    pub service_type: u8,
    /// Assigned zap-number, `None` while unused.
    pub number: Option<u16>,
    /// How many bouquets reference this channel. Maintained by the external
    /// bouquet manager; the catalog only stores and resets it.
    pub bouquet_count: u32,
}

impl Channel {
    pub fn new(
        service_id: ServiceId,
        transponder_id: TransponderId,
        name: impl Into<String>,
        service_type: u8,
    ) -> Self {
        Channel {
            channel_id: channel_id_from(transponder_id, service_id),
            name: name.into(),
            provider_name: String::new(),
            service_type,
            number: None,
            bouquet_count: 0,
        }
    }

    pub fn id(&self) -> ChannelId {
        self.channel_id
    }

    pub fn service_id(&self) -> ServiceId {
        channel_service_id(self.channel_id)
    }

    pub fn transponder_id(&self) -> TransponderId {
        channel_transponder_id(self.channel_id)
    }

    pub fn position(&self) -> SatellitePosition {
        channel_position(self.channel_id)
    }

    /// Television service of any flavor (SD, HD, advanced codecs).
    pub fn is_tv(&self) -> bool {
        matches!(
            self.service_type,
            service_type::DIGITAL_TV
                | service_type::MPEG2_HD_TV
                | service_type::ADVANCED_SD_TV
                | service_type::ADVANCED_HD_TV
        )
    }

    pub fn is_radio(&self) -> bool {
        self.service_type == service_type::DIGITAL_RADIO
    }

    pub fn is_hd(&self) -> bool {
        matches!(
            self.service_type,
            service_type::MPEG2_HD_TV | service_type::ADVANCED_HD_TV
        )
    }

    /// Near-video-on-demand reference or time-shifted subservice.
    pub fn is_nvod(&self) -> bool {
        matches!(
            self.service_type,
            service_type::NVOD_REFERENCE | service_type::NVOD_TIME_SHIFTED
        )
    }

    /// No zap-number assigned yet.
    pub fn is_unused(&self) -> bool {
        self.number.is_none()
    }
}
