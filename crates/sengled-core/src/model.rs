// ── Domain model ──
//
// Bulb attributes, device records, and the writable-capability table.
// Vendor values are strings on the wire (`"1"`, `"80"`, `"255:0:0"`);
// this module owns the translation in both directions.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use sengled_api::DeviceEntry;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

/// Writable bulb attributes, by their vendor names.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    Serialize,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum AttributeName {
    Switch,
    Brightness,
    ColorTemperature,
    Color,
}

// ── Color ────────────────────────────────────────────────────────────

/// An RGB triple, `r:g:b` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.r, self.g, self.b)
    }
}

impl FromStr for Rgb {
    type Err = String;

    /// Accepts the wire form `255:0:0` and tuple-ish forms like
    /// `(255, 0, 0)` or `255,0,0`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cleaned: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && !matches!(c, '(' | ')'))
            .map(|c| if c == ',' { ':' } else { c })
            .collect();
        let parts: Vec<&str> = cleaned.split(':').collect();
        let [r, g, b] = parts.as_slice() else {
            return Err(format!("expected r:g:b, got '{s}'"));
        };
        let channel = |v: &str| {
            v.parse::<u8>()
                .map_err(|_| format!("color channel '{v}' is not 0-255"))
        };
        Ok(Self::new(channel(*r)?, channel(*g)?, channel(*b)?))
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ── Attribute values ─────────────────────────────────────────────────

/// A typed attribute value to write to a bulb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    Power(bool),
    /// 0-100. Larger values are sent as 100.
    Brightness(u8),
    /// Vendor percent scale, 0 (warmest) to 100 (coolest). Larger values
    /// are sent as 100. See [`kelvin_to_percent`].
    ColorTemperature(u8),
    Color(Rgb),
}

impl Attribute {
    pub fn name(&self) -> AttributeName {
        match self {
            Self::Power(_) => AttributeName::Switch,
            Self::Brightness(_) => AttributeName::Brightness,
            Self::ColorTemperature(_) => AttributeName::ColorTemperature,
            Self::Color(_) => AttributeName::Color,
        }
    }

    /// The vendor string form of the value.
    pub fn wire_value(&self) -> String {
        match self {
            Self::Power(true) => "1".to_owned(),
            Self::Power(false) => "0".to_owned(),
            Self::Brightness(v) | Self::ColorTemperature(v) => (*v).min(100).to_string(),
            Self::Color(rgb) => rgb.to_string(),
        }
    }

    /// `(vendor name, vendor value)` as the wire layer takes it.
    pub fn to_wire(&self) -> (String, String) {
        (self.name().to_string(), self.wire_value())
    }

    /// Parse a vendor string value for `name`. `None` when the value
    /// does not fit the attribute.
    pub fn parse(name: AttributeName, value: &str) -> Option<Self> {
        let value = value.trim();
        match name {
            AttributeName::Switch => parse_flag(value).map(Self::Power),
            AttributeName::Brightness => parse_percent(value).map(Self::Brightness),
            AttributeName::ColorTemperature => parse_percent(value).map(Self::ColorTemperature),
            AttributeName::Color => value.parse().ok().map(Self::Color),
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value {
        "1" | "true" | "on" => Some(true),
        "0" | "false" | "off" => Some(false),
        _ => None,
    }
}

fn parse_percent(value: &str) -> Option<u8> {
    value.parse::<u8>().ok().filter(|v| *v <= 100)
}

/// Kelvin to the vendor's color-temperature percent:
/// `round(k / 6500 * 100)`, capped at 100.
pub fn kelvin_to_percent(kelvin: u32) -> u8 {
    let percent = (kelvin.saturating_mul(100).saturating_add(3250)) / 6500;
    u8::try_from(percent.min(100)).unwrap_or(100)
}

/// 0-255 brightness (as many home-automation stacks use) to 0-100.
pub fn brightness_from_255(value: u8) -> u8 {
    let percent = (u32::from(value) * 100 + 127) / 255;
    u8::try_from(percent).unwrap_or(100)
}

// ── Capabilities ─────────────────────────────────────────────────────

/// Writable attributes for a device kind, by `typeCode` family.
///
/// W21 bulbs are full color, W31 are tunable white, W11 are dimmable
/// white. Unknown kinds get the attributes every bulb has.
pub fn capabilities(type_code: Option<&str>) -> BTreeSet<AttributeName> {
    let family = type_code
        .map(|t| t.trim().to_ascii_uppercase())
        .unwrap_or_default();

    let base = [AttributeName::Switch, AttributeName::Brightness];
    let mut set: BTreeSet<AttributeName> = base.into_iter().collect();

    if family.starts_with("W21") {
        set.insert(AttributeName::ColorTemperature);
        set.insert(AttributeName::Color);
    } else if family.starts_with("W31") {
        set.insert(AttributeName::ColorTemperature);
    }
    set
}

// ── Device records ───────────────────────────────────────────────────

/// A WiFi bulb and its last-known state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceRecord {
    pub id: String,
    pub name: String,
    pub type_code: Option<String>,
    pub category: String,
    pub power: Option<bool>,
    pub brightness: Option<u8>,
    pub color_temperature: Option<u8>,
    pub color: Option<Rgb>,
    pub online: Option<bool>,
    /// Attributes this device accepts writes for.
    pub supported: BTreeSet<AttributeName>,
    /// Any other attribute the cloud reported, verbatim.
    pub extra: BTreeMap<String, String>,
}

impl DeviceRecord {
    /// An empty record for `id`. State fields fill in through merges.
    pub fn new(id: impl Into<String>, type_code: Option<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            supported: capabilities(type_code.as_deref()),
            id,
            type_code,
            category: sengled_api::endpoints::WIFI_CATEGORY.to_owned(),
            power: None,
            brightness: None,
            color_temperature: None,
            color: None,
            online: None,
            extra: BTreeMap::new(),
        }
    }

    /// Build a record from a device-list entry.
    ///
    /// The supported set is the capability table for the type, narrowed
    /// to the attributes the cloud reported when it reported any.
    pub fn from_entry(entry: &DeviceEntry) -> Self {
        let type_code = entry
            .type_code
            .clone()
            .or_else(|| entry.attribute("typeCode"));
        let mut record = Self::new(entry.device_uuid.clone(), type_code);
        record.category.clone_from(&entry.category);

        let reported: BTreeSet<AttributeName> = AttributeName::iter()
            .filter(|name| {
                let wire: &str = name.as_ref();
                entry.attribute_list.iter().any(|a| a.name == wire)
            })
            .collect();
        if !reported.is_empty() {
            record.supported = record
                .supported
                .intersection(&reported)
                .copied()
                .collect();
        }

        for attr in &entry.attribute_list {
            if let Some(value) = attr.text() {
                record.merge(&attr.name, &value);
            }
        }
        record
    }

    pub fn supports(&self, name: AttributeName) -> bool {
        self.supported.contains(&name)
    }

    /// Merge a single vendor attribute. Returns whether anything changed.
    ///
    /// Touches only the field `name` maps to. Values that do not parse
    /// for a known attribute are ignored.
    pub fn merge(&mut self, name: &str, value: &str) -> bool {
        fn set<T: PartialEq>(slot: &mut Option<T>, value: Option<T>) -> bool {
            match value {
                Some(v) if slot.as_ref() != Some(&v) => {
                    *slot = Some(v);
                    true
                }
                _ => false,
            }
        }

        if let Ok(known) = AttributeName::from_str(name) {
            return match Attribute::parse(known, value) {
                Some(Attribute::Power(on)) => set(&mut self.power, Some(on)),
                Some(Attribute::Brightness(v)) => set(&mut self.brightness, Some(v)),
                Some(Attribute::ColorTemperature(v)) => {
                    set(&mut self.color_temperature, Some(v))
                }
                Some(Attribute::Color(rgb)) => set(&mut self.color, Some(rgb)),
                None => false,
            };
        }

        match name {
            "name" => {
                if value.is_empty() || self.name == value {
                    false
                } else {
                    value.clone_into(&mut self.name);
                    true
                }
            }
            "online" => set(&mut self.online, parse_flag(value.trim())),
            "typeCode" => false,
            _ => {
                if self.extra.get(name).map(String::as_str) == Some(value) {
                    false
                } else {
                    self.extra.insert(name.to_owned(), value.to_owned());
                    true
                }
            }
        }
    }
}

// ── Broker updates ───────────────────────────────────────────────────

/// Which topic an update arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateKind {
    /// State push from the bulb; merged into the directory.
    Status,
    /// Acknowledgement of a command; delivered, never merged.
    Ack,
}

/// One attribute change reported by the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeUpdate {
    pub device_id: String,
    /// Vendor attribute name (`switch`, `brightness`, ...).
    pub attribute: String,
    /// Vendor string value.
    pub value: String,
    pub kind: UpdateKind,
    /// Vendor timestamp, when present.
    pub time: Option<i64>,
}

impl AttributeUpdate {
    /// Typed view of a writable attribute, if this is one.
    pub fn parsed(&self) -> Option<Attribute> {
        let name = AttributeName::from_str(&self.attribute).ok()?;
        Attribute::parse(name, &self.value)
    }
}
