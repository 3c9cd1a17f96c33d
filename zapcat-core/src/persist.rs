//! Persistence layer: the services file, single-transponder update writes,
//! and the motor-position table.
//!
//! The services file is hierarchical text, one record per satellite header,
//! transponder header, and channel line, grouped satellite → transponder →
//! channel. Satellites are written in position order, transponders in id
//! order, channels in stable channel-id order. Saves go through a temporary
//! file that is renamed over the previous one, so a failed write never
//! corrupts the last good catalog. The transient `updated`/`failed` flags
//! are not persisted and come back false after a load.

use std::fs::{self, File};
use std::io::{self, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use quick_xml::escape::escape;

use crate::catalog::ServiceCatalog;
use crate::channel::{service_type, Channel};
use crate::error::{CatalogError, Result};
use crate::satellites::position_label;
use crate::scan::tune_params_from;
use crate::transponder::Transponder;
use crate::tree::Document;
use crate::types::{pack_transponder_id, ChannelId, SatellitePosition, TransponderId};

/// What a services write covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SaveMode {
    /// The committed catalog: all-known plus NVOD channels.
    Full,
    /// One transponder's channels from the uncommitted scan pass.
    CurrentOnly(TransponderId),
}

/// Copy a persisted table to another location.
pub fn copy_file(from: &Path, to: &Path) -> Result<()> {
    fs::copy(from, to)?;
    Ok(())
}

impl ServiceCatalog {
    // ---- services file ----------------------------------------------------

    /// Rehydrate the catalog from the persisted services file.
    ///
    /// With `only_current` the read is restricted to transponders the
    /// session has already scanned (tolerance-matched against the index),
    /// the fast path for incremental startup. On unreadable or malformed
    /// storage the in-memory catalog is left unchanged and an error is
    /// returned. Channel lines with problems are skipped.
    pub fn load_services(&mut self, only_current: bool) -> Result<()> {
        let path = self.config.services_file.clone();
        let doc = Document::load(&path)?;
        let root = doc.root();
        if root.name() != "zapit" {
            return Err(CatalogError::MalformedDocument(format!(
                "services root is <{}>, expected <zapit>",
                root.name()
            )));
        }

        let mut loaded = 0u32;
        for sat in root.children() {
            let cable = match sat.name() {
                "sat" => false,
                "cable" => true,
                _ => continue,
            };
            let Some(position) = sat.attr_i16("position") else {
                warn!("persisted satellite without position skipped");
                continue;
            };
            if !only_current {
                self.init_sat_position(position, sat.attr("name"), false);
                if let Some(motor) = sat.attr_dec("motor") {
                    self.set_motor_position(position, motor as i32);
                }
            }

            for ts in sat.children_named("TS") {
                let Some((params, polarization)) = tune_params_from(ts, cable) else {
                    warn!("persisted transponder without tuning parameters skipped");
                    continue;
                };
                let (Some(tsid), Some(onid)) = (ts.attr_u16_hex("id"), ts.attr_u16_hex("on"))
                else {
                    warn!("persisted transponder without ids skipped");
                    continue;
                };
                let persisted_id = pack_transponder_id(tsid, onid, position);

                let tpid = if only_current {
                    let probe = Transponder::new(persisted_id, params, polarization);
                    match self.transponders.find_matching(&probe) {
                        Some(tp) => tp.id,
                        None => continue,
                    }
                } else {
                    self.transponders
                        .subset_mut(position)
                        .entry(persisted_id)
                        .or_insert_with(|| Transponder::new(persisted_id, params, polarization));
                    persisted_id
                };

                loaded += self.load_channel_lines(ts, tpid);
            }
        }

        self.services_changed = false;
        info!("loaded {} services from {}", loaded, path.display());
        Ok(())
    }

    /// Channel lines of one persisted transponder record.
    fn load_channel_lines(&mut self, ts: &crate::tree::Node, tpid: TransponderId) -> u32 {
        let mut loaded = 0;
        for s in ts.children_named("S") {
            let (Some(sid), Some(name)) = (s.attr_u16_hex("i"), s.attr("n")) else {
                warn!("persisted channel line without id/name skipped");
                continue;
            };
            let stype = s.attr_u8_hex("t").unwrap_or(service_type::DIGITAL_TV);
            let mut channel = Channel::new(sid, tpid, name, stype);
            channel.provider_name = s.attr("p").unwrap_or("").to_string();

            if !channel.is_nvod() {
                if let Some(num) = s.attr_dec("num").and_then(|v| u16::try_from(v).ok()) {
                    let radio = channel.is_radio();
                    channel.number = Some(self.claim_parsed_number(num, radio));
                }
            }

            let inserted = if channel.is_nvod() {
                self.add_nvod_channel(channel)
            } else {
                self.add_channel(channel)
            };
            if inserted {
                loaded += 1;
            }
        }
        loaded
    }

    /// Write the committed catalog to the services file.
    ///
    /// Skipped entirely when `if_changed` is set and nothing changed since
    /// the last save. With `to_copy` the result is also duplicated to the
    /// backup location. Channels are grouped under their transponder; a
    /// channel whose transponder is unknown to the index is not written.
    pub fn save_services(&mut self, to_copy: bool, if_changed: bool) -> Result<()> {
        if if_changed && !self.services_changed {
            debug!("services unchanged, save skipped");
            return Ok(());
        }

        let path = self.config.services_file.clone();
        let written = self.write_services_file(&path, SaveMode::Full)?;
        if to_copy {
            copy_file(&path, &self.config.services_backup_file)?;
        }
        self.services_changed = false;
        info!("saved {} services to {}", written, path.display());
        Ok(())
    }

    /// Write one transponder's current-slice channels to the updates file.
    /// Returns false without writing when the scan pass holds no channels
    /// for that transponder.
    pub fn save_current_services(&mut self, tpid: TransponderId) -> Result<bool> {
        if self.channels_of_transponder(&self.current, tpid).next().is_none() {
            return Ok(false);
        }
        let path = self.config.current_services_file.clone();
        let written = self.write_services_file(&path, SaveMode::CurrentOnly(tpid))?;
        debug!("saved {} current services for {:016x}", written, tpid);
        Ok(true)
    }

    /// Fold one transponder's current-slice channels into the all-known set
    /// and rewrite the services file to match: the single-transponder
    /// re-scan path that leaves every other record as it was. Channels
    /// already known keep their zap-number. Returns false when the scan
    /// pass holds nothing for that transponder.
    pub fn copy_current_services(&mut self, tpid: TransponderId) -> Result<bool> {
        let ids: Vec<ChannelId> = self
            .channels_of_transponder(&self.current, tpid)
            .map(|ch| ch.id())
            .collect();
        if ids.is_empty() {
            return Ok(false);
        }

        for id in ids {
            let Some(ch) = self.current.remove(&id) else { continue };
            match self.all.entry(id) {
                std::collections::btree_map::Entry::Occupied(mut slot) => {
                    let kept = slot.get_mut();
                    kept.name = ch.name;
                    kept.provider_name = ch.provider_name;
                    kept.service_type = ch.service_type;
                }
                std::collections::btree_map::Entry::Vacant(slot) => {
                    slot.insert(ch);
                }
            }
        }

        let path = self.config.services_file.clone();
        self.write_services_file(&path, SaveMode::Full)?;
        self.services_changed = false;
        Ok(true)
    }

    /// Write a services document to `path` through a temporary sibling.
    fn write_services_file(&self, path: &Path, mode: SaveMode) -> Result<usize> {
        let tmp = temp_path(path);
        let written = {
            let mut w = BufWriter::new(File::create(&tmp)?);
            let written = self.write_services(&mut w, mode)?;
            w.flush()?;
            written
        };
        fs::rename(&tmp, path)?;
        Ok(written)
    }

    fn write_services<W: Write>(&self, w: &mut W, mode: SaveMode) -> io::Result<usize> {
        writeln!(w, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
        writeln!(w, "<zapit>")?;

        let cable = self.config.frontend.is_cable();
        let sat_tag = if cable { "cable" } else { "sat" };
        let mut written = 0;
        for position in self.transponders.positions().collect::<Vec<_>>() {
            let Some(subset) = self.transponders.subset(position) else {
                continue;
            };
            let mut sat_open = false;
            for tp in subset.values() {
                let channels: Vec<&Channel> = match mode {
                    SaveMode::CurrentOnly(wanted) => {
                        if tp.id != wanted {
                            continue;
                        }
                        self.channels_of_transponder(&self.current, tp.id).collect()
                    }
                    SaveMode::Full => self
                        .channels_of_transponder(&self.all, tp.id)
                        .chain(self.channels_of_transponder(&self.nvod, tp.id))
                        .collect(),
                };
                if channels.is_empty() {
                    continue;
                }
                if !sat_open {
                    self.write_sat_header(w, sat_tag, position)?;
                    sat_open = true;
                }
                write_transponder_header(w, tp, cable)?;
                for ch in channels {
                    write_channel_line(w, ch)?;
                    written += 1;
                }
                writeln!(w, "\t\t</TS>")?;
            }
            if sat_open {
                writeln!(w, "\t</{}>", sat_tag)?;
            }
        }

        writeln!(w, "</zapit>")?;
        Ok(written)
    }

    fn write_sat_header<W: Write>(
        &self,
        w: &mut W,
        tag: &str,
        position: SatellitePosition,
    ) -> io::Result<()> {
        let (name, motor) = match self.satellites.get(&position) {
            Some(sat) => (sat.name.clone(), sat.motor_position),
            None => (position_label(position), 0),
        };
        writeln!(
            w,
            "\t<{} name=\"{}\" position=\"{}\" motor=\"{}\">",
            tag,
            escape(&name),
            position,
            motor
        )
    }

    // ---- motor positions --------------------------------------------------

    /// Write the per-satellite rotor calibration table: one line per
    /// satellite, `position motor name`.
    pub fn save_motor_positions(&self) -> Result<()> {
        let path = &self.config.motor_file;
        let tmp = temp_path(path);
        {
            let mut w = BufWriter::new(File::create(&tmp)?);
            for sat in self.satellites.values() {
                writeln!(w, "{} {} {}", sat.position, sat.motor_position, sat.name)?;
            }
            w.flush()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Read the rotor calibration table back. An absent table is normal
    /// before the first save and loads nothing; unparseable lines are
    /// skipped. Returns the number of positions loaded.
    pub fn load_motor_positions(&mut self) -> Result<usize> {
        let text = match fs::read_to_string(&self.config.motor_file) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut loaded = 0;
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.splitn(3, ' ');
            let (Some(position), Some(motor)) = (fields.next(), fields.next()) else {
                continue;
            };
            let (Ok(position), Ok(motor)) = (position.parse::<i16>(), motor.parse::<i32>())
            else {
                warn!("unparseable motor line skipped: {}", line);
                continue;
            };
            let name = fields.next().unwrap_or("").trim();
            self.init_sat_position(position, (!name.is_empty()).then_some(name), false);
            self.set_motor_position(position, motor);
            loaded += 1;
        }
        Ok(loaded)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn write_transponder_header<W: Write>(w: &mut W, tp: &Transponder, cable: bool) -> io::Result<()> {
    if cable {
        writeln!(
            w,
            "\t\t<TS id=\"{:04x}\" on=\"{:04x}\" frq=\"{}\" inv=\"{}\" sr=\"{}\" fec=\"{}\" mod=\"{}\">",
            tp.transport_stream_id,
            tp.original_network_id,
            tp.params.frequency,
            tp.params.inversion,
            tp.params.symbol_rate,
            tp.params.fec_inner,
            tp.params.modulation
        )
    } else {
        writeln!(
            w,
            "\t\t<TS id=\"{:04x}\" on=\"{:04x}\" frq=\"{}\" inv=\"{}\" sr=\"{}\" fec=\"{}\" pol=\"{}\">",
            tp.transport_stream_id,
            tp.original_network_id,
            tp.params.frequency,
            tp.params.inversion,
            tp.params.symbol_rate,
            tp.params.fec_inner,
            tp.polarization
        )
    }
}

fn write_channel_line<W: Write>(w: &mut W, ch: &Channel) -> io::Result<()> {
    write!(
        w,
        "\t\t\t<S i=\"{:04x}\" n=\"{}\" t=\"{:02x}\"",
        ch.service_id(),
        escape(&ch.name),
        ch.service_type
    )?;
    if let Some(num) = ch.number {
        write!(w, " num=\"{}\"", num)?;
    }
    if !ch.provider_name.is_empty() {
        write!(w, " p=\"{}\"", escape(&ch.provider_name))?;
    }
    writeln!(w, "/>")
}
