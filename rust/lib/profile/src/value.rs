use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure to parse a textual value into a [`PropertyValue`] or [`Color`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseValueError {
    #[error("invalid color: {0}")]
    Color(String),

    #[error("invalid integer: {0}")]
    Int(String),

    #[error("invalid boolean: {0}")]
    Bool(String),

    #[error("unknown value kind: {0}")]
    Kind(String),
}

/// An 8-bit RGBA color.
///
/// Serialized as `#aarrggbb` so the alpha channel survives a round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0x00, 0x00, 0x00);
    pub const WHITE: Color = Color::rgb(0xff, 0xff, 0xff);
    pub const RED: Color = Color::rgb(0xff, 0x00, 0x00);
    pub const GREEN: Color = Color::rgb(0x00, 0xff, 0x00);
    pub const BLUE: Color = Color::rgb(0x00, 0x00, 0xff);
    pub const YELLOW: Color = Color::rgb(0xff, 0xff, 0x00);
    pub const GRAY: Color = Color::rgb(0xa0, 0xa0, 0xa4);
    pub const DARK_RED: Color = Color::rgb(0x80, 0x00, 0x00);
    pub const DARK_GREEN: Color = Color::rgb(0x00, 0x80, 0x00);
    pub const DARK_BLUE: Color = Color::rgb(0x00, 0x00, 0x80);
    pub const DARK_YELLOW: Color = Color::rgb(0x80, 0x80, 0x00);
    pub const DARK_GRAY: Color = Color::rgb(0x80, 0x80, 0x80);
    pub const TRANSPARENT: Color = Color::rgba(0x00, 0x00, 0x00, 0x00);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 0xff }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Look up a named color. Matching ignores case, `_` and `-`.
    pub fn named(name: &str) -> Option<Self> {
        let normalized: String = name
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        let color = match normalized.as_str() {
            "black" => Self::BLACK,
            "white" => Self::WHITE,
            "red" => Self::RED,
            "green" => Self::GREEN,
            "blue" => Self::BLUE,
            "yellow" => Self::YELLOW,
            "gray" | "grey" => Self::GRAY,
            "darkred" => Self::DARK_RED,
            "darkgreen" => Self::DARK_GREEN,
            "darkblue" => Self::DARK_BLUE,
            "darkyellow" => Self::DARK_YELLOW,
            "darkgray" | "darkgrey" => Self::DARK_GRAY,
            "transparent" => Self::TRANSPARENT,
            _ => return None,
        };
        Some(color)
    }

    pub fn is_opaque(&self) -> bool {
        self.a == 0xff
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_opaque() {
            write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.a, self.r, self.g, self.b)
        }
    }
}

impl FromStr for Color {
    type Err = ParseValueError;

    /// Accepts `#rrggbb`, `#aarrggbb` or a color name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let Some(hex) = s.strip_prefix('#') else {
            return Self::named(s).ok_or_else(|| ParseValueError::Color(s.to_string()));
        };
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ParseValueError::Color(s.to_string()));
        }
        let byte = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|_| ParseValueError::Color(s.to_string()))
        };
        match hex.len() {
            6 => Ok(Self::rgb(byte(0)?, byte(2)?, byte(4)?)),
            8 => Ok(Self::rgba(byte(2)?, byte(4)?, byte(6)?, byte(0)?)),
            _ => Err(ParseValueError::Color(s.to_string())),
        }
    }
}

impl From<Color> for String {
    fn from(c: Color) -> Self {
        format!("#{:02x}{:02x}{:02x}{:02x}", c.a, c.r, c.g, c.b)
    }
}

impl TryFrom<String> for Color {
    type Error = ParseValueError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// The primitive kinds a property can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Text,
    Int,
    Bool,
    Color,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Text => "text",
            ValueKind::Int => "int",
            ValueKind::Bool => "bool",
            ValueKind::Color => "color",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueKind {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "string" | "str" => Ok(ValueKind::Text),
            "int" | "integer" => Ok(ValueKind::Int),
            "bool" | "boolean" => Ok(ValueKind::Bool),
            "color" | "colour" => Ok(ValueKind::Color),
            other => Err(ParseValueError::Kind(other.to_string())),
        }
    }
}

/// A dynamically-typed property payload.
///
/// Encoded for storage as `{"type": "<kind>", "value": <payload>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum PropertyValue {
    Text(String),
    Int(i64),
    Bool(bool),
    Color(Color),
}

impl PropertyValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            PropertyValue::Text(_) => ValueKind::Text,
            PropertyValue::Int(_) => ValueKind::Int,
            PropertyValue::Bool(_) => ValueKind::Bool,
            PropertyValue::Color(_) => ValueKind::Color,
        }
    }

    /// Parse user input as a value of the given kind.
    pub fn parse(kind: ValueKind, input: &str) -> Result<Self, ParseValueError> {
        match kind {
            ValueKind::Text => Ok(PropertyValue::Text(input.to_string())),
            ValueKind::Int => input
                .trim()
                .parse()
                .map(PropertyValue::Int)
                .map_err(|_| ParseValueError::Int(input.to_string())),
            ValueKind::Bool => match input.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(PropertyValue::Bool(true)),
                "false" | "0" | "no" | "off" => Ok(PropertyValue::Bool(false)),
                _ => Err(ParseValueError::Bool(input.to_string())),
            },
            ValueKind::Color => input.parse().map(PropertyValue::Color),
        }
    }

    /// Serialize into the opaque payload stored by the persistence layer.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Inverse of [`PropertyValue::encode`].
    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Text(s) => f.write_str(s),
            PropertyValue::Int(i) => write!(f, "{}", i),
            PropertyValue::Bool(b) => write!(f, "{}", b),
            PropertyValue::Color(c) => write!(f, "{}", c),
        }
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::Text(s)
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::Text(s.to_string())
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        PropertyValue::Int(i)
    }
}

impl From<i32> for PropertyValue {
    fn from(i: i32) -> Self {
        PropertyValue::Int(i64::from(i))
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Bool(b)
    }
}

impl From<Color> for PropertyValue {
    fn from(c: Color) -> Self {
        PropertyValue::Color(c)
    }
}

/// A static type that a [`PropertyValue`] can be materialized into.
///
/// `from_value` is strict: it returns `None` for any other kind and never
/// coerces between kinds.
pub trait PropertyType: Clone + Sized {
    const KIND: ValueKind;

    fn into_value(self) -> PropertyValue;

    fn from_value(value: &PropertyValue) -> Option<Self>;
}

impl PropertyType for String {
    const KIND: ValueKind = ValueKind::Text;

    fn into_value(self) -> PropertyValue {
        PropertyValue::Text(self)
    }

    fn from_value(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::Text(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl PropertyType for i64 {
    const KIND: ValueKind = ValueKind::Int;

    fn into_value(self) -> PropertyValue {
        PropertyValue::Int(self)
    }

    fn from_value(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl PropertyType for bool {
    const KIND: ValueKind = ValueKind::Bool;

    fn into_value(self) -> PropertyValue {
        PropertyValue::Bool(self)
    }

    fn from_value(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl PropertyType for Color {
    const KIND: ValueKind = ValueKind::Color;

    fn into_value(self) -> PropertyValue {
        PropertyValue::Color(self)
    }

    fn from_value(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::Color(c) => Some(*c),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_parse_rgb_and_argb() {
        assert_eq!("#ff0000".parse::<Color>().unwrap(), Color::RED);
        assert_eq!("#FF808000".parse::<Color>().unwrap(), Color::DARK_YELLOW);
        assert_eq!(
            "#80102030".parse::<Color>().unwrap(),
            Color::rgba(0x10, 0x20, 0x30, 0x80)
        );
    }

    #[test]
    fn color_parse_named() {
        assert_eq!("darkBlue".parse::<Color>().unwrap(), Color::DARK_BLUE);
        assert_eq!("dark_yellow".parse::<Color>().unwrap(), Color::DARK_YELLOW);
        assert_eq!("Black".parse::<Color>().unwrap(), Color::BLACK);
    }

    #[test]
    fn color_parse_rejects_garbage() {
        assert!("#12345".parse::<Color>().is_err());
        assert!("#gg0000".parse::<Color>().is_err());
        assert!("#ééé".parse::<Color>().is_err());
        assert!("mauve-ish".parse::<Color>().is_err());
    }

    #[test]
    fn color_display() {
        assert_eq!(Color::DARK_BLUE.to_string(), "#000080");
        assert_eq!(Color::rgba(1, 2, 3, 4).to_string(), "#04010203");
    }

    #[test]
    fn encoded_payload_is_tagged() {
        let raw = PropertyValue::Color(Color::RED).encode().unwrap();
        assert_eq!(raw, r##"{"type":"color","value":"#ffff0000"}"##);

        let raw = PropertyValue::Int(10).encode().unwrap();
        assert_eq!(raw, r#"{"type":"int","value":10}"#);
    }

    #[test]
    fn decode_restores_kind() {
        let v = PropertyValue::decode(r#"{"type":"bool","value":true}"#).unwrap();
        assert_eq!(v, PropertyValue::Bool(true));

        let v = PropertyValue::decode(r##"{"type":"color","value":"#7f000080"}"##).unwrap();
        assert_eq!(v, PropertyValue::Color(Color::rgba(0, 0, 0x80, 0x7f)));
    }

    #[test]
    fn decode_rejects_untagged() {
        assert!(PropertyValue::decode("plain text").is_err());
        assert!(PropertyValue::decode(r#"{"type":"float","value":1.0}"#).is_err());
    }

    #[test]
    fn from_value_is_strict() {
        let color = PropertyValue::Color(Color::RED);
        assert_eq!(String::from_value(&color), None);
        assert_eq!(Color::from_value(&color), Some(Color::RED));

        let int = PropertyValue::Int(1);
        assert_eq!(bool::from_value(&int), None);
        assert_eq!(String::from_value(&int), None);
    }

    #[test]
    fn parse_by_kind() {
        assert_eq!(
            PropertyValue::parse(ValueKind::Int, " 42 ").unwrap(),
            PropertyValue::Int(42)
        );
        assert_eq!(
            PropertyValue::parse(ValueKind::Bool, "off").unwrap(),
            PropertyValue::Bool(false)
        );
        assert_eq!(
            PropertyValue::parse(ValueKind::Color, "red").unwrap(),
            PropertyValue::Color(Color::RED)
        );
        assert!(PropertyValue::parse(ValueKind::Int, "ten").is_err());
        assert_eq!("integer".parse::<ValueKind>().unwrap(), ValueKind::Int);
    }
}
