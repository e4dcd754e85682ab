use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use tracing::{debug, warn};

/// SmartOne C soil frames are always 9 bytes long
pub const FRAME_LEN: usize = 9;
pub const SOIL_FRAME_TYPE: u8 = 0x02;
pub const CHANNEL_COUNT: usize = 6;

const HUMIDITY_INDICATOR: u8 = b'H';
const TEMPERATURE_INDICATOR: u8 = b'T';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingKind {
    Humidity,
    Temperature,
}

impl ReadingKind {
    pub fn from_indicator(indicator: u8) -> Option<Self> {
        match indicator {
            HUMIDITY_INDICATOR => Some(ReadingKind::Humidity),
            TEMPERATURE_INDICATOR => Some(ReadingKind::Temperature),
            _ => None,
        }
    }

    /// Single character discriminator as stored in `reading.reading_kind`
    pub fn as_char(&self) -> char {
        match self {
            ReadingKind::Humidity => HUMIDITY_INDICATOR as char,
            ReadingKind::Temperature => TEMPERATURE_INDICATOR as char,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerSource {
    Solar,
    Battery,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSample {
    pub timestamp: DateTime<Utc>,
    pub kind: ReadingKind,
    pub depth_cm: f64,
    pub moisture_pct: Option<f64>,
    pub temperature_c: Option<f64>,
    pub rain_cm: Option<f64>,
    pub battery_level: Option<f64>,
    pub solar_level: Option<f64>,
}

/// Calibration and classification knobs of the soil decoder.
///
/// The power classification thresholds are empirical and should be revisited
/// once calibrated field data is available.
#[derive(Debug, Clone, PartialEq)]
pub struct DecoderConfig {
    pub depths_cm: [f64; CHANNEL_COUNT],
    pub rain_cm_per_tip: f64,
    /// power levels strictly above are always solar
    pub solar_threshold: u8,
    /// power levels at or below are solar during night hours
    pub night_threshold: u8,
    pub night_start_hour: u32,
    /// inclusive, the whole hour counts as night
    pub night_end_hour: u32,
    pub timezone: Tz,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        DecoderConfig {
            depths_cm: [10.0, 20.0, 30.0, 40.0, 50.0, 60.0],
            rain_cm_per_tip: 0.25,
            solar_threshold: 8,
            night_threshold: 1,
            night_start_hour: 22,
            night_end_hour: 4,
            timezone: chrono_tz::UTC,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SoilProbeDecoder {
    config: DecoderConfig,
}

impl SoilProbeDecoder {
    pub fn new(config: DecoderConfig) -> Self {
        SoilProbeDecoder { config }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decodes a hex encoded SmartOne C frame into one sample per depth level.
    ///
    /// Never fails: frames with a wrong length, an unknown message type or an
    /// unknown type indicator yield an empty list.
    pub fn decode(&self, raw_hex: &str, received_at: DateTime<Utc>) -> Vec<DecodedSample> {
        let frame = match normalize_hex(raw_hex) {
            Some(frame) => frame,
            None => {
                debug!(payload = raw_hex, "Dropping frame with invalid hex");
                return Vec::new();
            }
        };

        if frame.len() != FRAME_LEN {
            debug!(len = frame.len(), "Dropping frame with unexpected length");
            return Vec::new();
        }
        if frame[0] != SOIL_FRAME_TYPE {
            debug!(msg_type = frame[0], "Dropping non soil frame");
            return Vec::new();
        }

        let kind = match ReadingKind::from_indicator(frame[7]) {
            Some(kind) => kind,
            None => {
                warn!(indicator = frame[7], "Unknown type indicator in soil frame");
                return Vec::new();
            }
        };

        let channels = &frame[1..1 + CHANNEL_COUNT];
        let context = frame[8];
        match kind {
            ReadingKind::Humidity => self.humidity_samples(channels, context, received_at),
            ReadingKind::Temperature => self.temperature_samples(channels, context, received_at),
        }
    }

    fn humidity_samples(
        &self,
        channels: &[u8],
        rain_tips: u8,
        received_at: DateTime<Utc>,
    ) -> Vec<DecodedSample> {
        let rain_cm = rain_tips as f64 * self.config.rain_cm_per_tip;
        channels
            .iter()
            .zip(self.config.depths_cm.iter())
            .enumerate()
            .map(|(i, (value, depth))| DecodedSample {
                timestamp: received_at,
                kind: ReadingKind::Humidity,
                depth_cm: *depth,
                moisture_pct: Some(*value as f64),
                temperature_c: None,
                // rainfall belongs to the batch, not to a depth level
                rain_cm: Some(if i == 0 { rain_cm } else { 0.0 }),
                battery_level: None,
                solar_level: None,
            })
            .collect()
    }

    fn temperature_samples(
        &self,
        channels: &[u8],
        power_level: u8,
        received_at: DateTime<Utc>,
    ) -> Vec<DecodedSample> {
        let level = Some(power_level as f64);
        let (battery_level, solar_level) = match self.classify_power(power_level, received_at) {
            PowerSource::Solar => (None, level),
            PowerSource::Battery => (level, None),
        };

        channels
            .iter()
            .zip(self.config.depths_cm.iter())
            .map(|(value, depth)| DecodedSample {
                timestamp: received_at,
                kind: ReadingKind::Temperature,
                depth_cm: *depth,
                moisture_pct: None,
                temperature_c: Some(*value as f64),
                rain_cm: None,
                battery_level,
                solar_level,
            })
            .collect()
    }

    pub fn classify_power(&self, level: u8, received_at: DateTime<Utc>) -> PowerSource {
        let hour = received_at.with_timezone(&self.config.timezone).hour();
        let is_night = hour >= self.config.night_start_hour || hour <= self.config.night_end_hour;

        if level > self.config.solar_threshold
            || (level <= self.config.night_threshold && is_night)
            || hour % 2 == 1
        {
            PowerSource::Solar
        } else {
            PowerSource::Battery
        }
    }
}

fn normalize_hex(raw_hex: &str) -> Option<Vec<u8>> {
    let cleaned: String = raw_hex.chars().filter(|c| !c.is_whitespace()).collect();
    let digits = cleaned
        .strip_prefix("0x")
        .or_else(|| cleaned.strip_prefix("0X"))
        .unwrap_or(&cleaned);
    hex::decode(digits).ok()
}
