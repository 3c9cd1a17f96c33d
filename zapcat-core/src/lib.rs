//! Service and transponder catalog engine for digital-broadcast receivers.
//!
//! This crate builds, persists, and queries the set of known satellites,
//! transponders, and channels (TV, radio, NVOD) discovered from broadcast
//! scan data, and assigns stable, deduplicated zap-numbers to channels.
//!
//! # Identifier layout
//!
//! ```text
//! transponder id (u64)
//! +----------+--------------------+----------------------+----------------------+
//! | reserved | satellite position | transport_stream_id  | original_network_id  |
//! |  63..48  |       47..32       |        31..16        |         15..0        |
//! +----------+--------------------+----------------------+----------------------+
//!
//! channel id = transponder id << 16 | service id
//! ```
//!
//! The position field's top nibble marks slots west of the reference
//! meridian; [`types::unpack_transponder_id`] returns those as negative
//! degrees.
//!
//! # Scan reconciliation
//!
//! Broadcast scans describe the same physical carrier with slightly
//! different frequencies from pass to pass. The importer treats two
//! descriptions as one carrier when they share a satellite position and
//! polarization parity and their frequencies differ by at most
//! [`transponder::FREQ_TOLERANCE`]; matches refresh the stored record
//! instead of inserting a duplicate, so repeated scans never grow the
//! index for an unchanged satellite.
//!
//! # Example
//!
//! ```rust
//! use zapcat_core::{CatalogConfig, Channel, ServiceCatalog};
//! use zapcat_core::channel::service_type;
//! use zapcat_core::types::pack_transponder_id;
//!
//! let mut catalog = ServiceCatalog::new(CatalogConfig::default());
//! let tpid = pack_transponder_id(0x044D, 0x0001, 192);
//!
//! let mut channel = Channel::new(0x6DCA, tpid, "Das Erste", service_type::DIGITAL_TV);
//! channel.number = Some(catalog.get_free_number(false));
//! catalog.use_number(channel.number.unwrap(), false);
//! let id = channel.id();
//!
//! assert!(catalog.add_channel(channel));
//! assert_eq!(catalog.find_channel(id).unwrap().name, "Das Erste");
//! assert_eq!(catalog.all_tv_channels().len(), 1);
//! ```

pub mod catalog;
pub mod channel;
pub mod config;
pub mod error;
pub mod numbers;
pub mod persist;
pub mod provider;
pub mod satellites;
pub mod scan;
pub mod transponder;
pub mod tree;
pub mod types;

pub use catalog::{ChannelMap, ServiceCatalog};
pub use channel::Channel;
pub use config::CatalogConfig;
pub use error::{CatalogError, Result};
pub use numbers::NumberPool;
pub use persist::copy_file;
pub use provider::{ProviderMap, ProviderRule};
pub use satellites::{position_label, SatelliteMap, SatelliteRecord};
pub use scan::ScanStats;
pub use transponder::{
    FrontendKind, Transponder, TransponderIndex, TransponderMap, TuneParams, FREQ_TOLERANCE,
};
pub use tree::{Document, Node};
pub use types::{
    ChannelId, FreqId, OriginalNetworkId, SatellitePosition, ServiceId, TransponderId,
    TransportStreamId,
};
