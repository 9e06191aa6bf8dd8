//! Axis descriptions.
//!
//! Format v0.5 describes each axis as an object tagged by `type`; its size is
//! a literal, a parameterized range, a reference to another axis, or (for
//! outputs) data dependent. Format v0.4 describes all axes of a tensor as a
//! string of axis letters such as `"bcyx"`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::fields::{AxisId, SpaceUnit, TensorId, TimeUnit};

fn default_batch_id() -> AxisId {
    AxisId::from_static("batch")
}

fn default_channel_id() -> AxisId {
    AxisId::from_static("channel")
}

fn default_index_id() -> AxisId {
    AxisId::from_static("index")
}

fn default_time_id() -> AxisId {
    AxisId::from_static("time")
}

fn default_space_id() -> AxisId {
    AxisId::from_static("x")
}

fn default_scale() -> f64 {
    1.0
}

fn default_min_size() -> u64 {
    1
}

/// `min + n * step` for any `n >= 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterizedSize {
    pub min: u64,
    pub step: u64,
}

/// The size of axis `axis_id` of tensor `tensor_id`, plus `offset`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeReference {
    pub tensor_id: TensorId,
    pub axis_id: AxisId,
    #[serde(default)]
    pub offset: i64,
}

/// Output size only known after inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataDependentSize {
    #[serde(default = "default_min_size")]
    pub min: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AxisSize {
    Fixed(u64),
    Reference(SizeReference),
    Parameterized(ParameterizedSize),
    DataDependent(DataDependentSize),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchAxis {
    #[serde(default = "default_batch_id")]
    pub id: AxisId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Either `1` or unspecified (any batch size).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelAxis {
    #[serde(default = "default_channel_id")]
    pub id: AxisId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub channel_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexAxis {
    #[serde(default = "default_index_id")]
    pub id: AxisId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub size: AxisSize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeAxis {
    #[serde(default = "default_time_id")]
    pub id: AxisId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub size: AxisSize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<TimeUnit>,
    #[serde(default = "default_scale")]
    pub scale: f64,
    /// Output axes only: border cropped from each side.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub halo: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpaceAxis {
    #[serde(default = "default_space_id")]
    pub id: AxisId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub size: AxisSize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<SpaceUnit>,
    #[serde(default = "default_scale")]
    pub scale: f64,
    /// Output axes only: border cropped from each side.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub halo: Option<u64>,
}

/// A v0.5 axis, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AxisDescr {
    Batch(BatchAxis),
    Channel(ChannelAxis),
    Index(IndexAxis),
    Time(TimeAxis),
    Space(SpaceAxis),
}

/// How an axis declares its size, as seen by size resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SizeSpec<'a> {
    /// Batch axes cannot be the target of a size reference.
    Batch,
    Fixed(u64),
    Parameterized(ParameterizedSize),
    Reference(&'a SizeReference),
    DataDependent(DataDependentSize),
}

impl AxisDescr {
    pub fn id(&self) -> &AxisId {
        match self {
            AxisDescr::Batch(axis) => &axis.id,
            AxisDescr::Channel(axis) => &axis.id,
            AxisDescr::Index(axis) => &axis.id,
            AxisDescr::Time(axis) => &axis.id,
            AxisDescr::Space(axis) => &axis.id,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            AxisDescr::Batch(_) => "batch",
            AxisDescr::Channel(_) => "channel",
            AxisDescr::Index(_) => "index",
            AxisDescr::Time(_) => "time",
            AxisDescr::Space(_) => "space",
        }
    }

    /// The raw size declaration. The channel size is the number of channel names.
    pub fn size_spec(&self) -> SizeSpec<'_> {
        let size = match self {
            AxisDescr::Batch(_) => return SizeSpec::Batch,
            AxisDescr::Channel(axis) => return SizeSpec::Fixed(axis.channel_names.len() as u64),
            AxisDescr::Index(axis) => &axis.size,
            AxisDescr::Time(axis) => &axis.size,
            AxisDescr::Space(axis) => &axis.size,
        };
        match size {
            AxisSize::Fixed(n) => SizeSpec::Fixed(*n),
            AxisSize::Parameterized(p) => SizeSpec::Parameterized(*p),
            AxisSize::Reference(r) => SizeSpec::Reference(r),
            AxisSize::DataDependent(d) => SizeSpec::DataDependent(*d),
        }
    }

    pub fn halo(&self) -> Option<u64> {
        match self {
            AxisDescr::Time(axis) => axis.halo,
            AxisDescr::Space(axis) => axis.halo,
            _ => None,
        }
    }
}

/// Errors parsing a v0.4 axes string.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LegacyAxesError {
    #[error("character cannot be a legacy axis letter: {character}")]
    Invalid { character: char },
}

/// A v0.4 axis letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisLetter {
    B,
    I,
    T,
    C,
    Z,
    Y,
    X,
}

impl AxisLetter {
    pub fn as_char(&self) -> char {
        match self {
            AxisLetter::B => 'b',
            AxisLetter::I => 'i',
            AxisLetter::T => 't',
            AxisLetter::C => 'c',
            AxisLetter::Z => 'z',
            AxisLetter::Y => 'y',
            AxisLetter::X => 'x',
        }
    }
}

impl fmt::Display for AxisLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl TryFrom<char> for AxisLetter {
    type Error = LegacyAxesError;

    fn try_from(c: char) -> Result<Self, Self::Error> {
        Ok(match c {
            'b' => Self::B,
            'i' => Self::I,
            't' => Self::T,
            'c' => Self::C,
            'z' => Self::Z,
            'y' => Self::Y,
            'x' => Self::X,
            _ => return Err(LegacyAxesError::Invalid { character: c }),
        })
    }
}

/// Ordered v0.4 axis letters, e.g. `bcyx`.
///
/// Repeated letters parse; they are reported by validation so the error
/// carries a field path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LegacyAxes(Vec<AxisLetter>);

impl LegacyAxes {
    pub fn letters(&self) -> &[AxisLetter] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, letter: AxisLetter) -> bool {
        self.0.contains(&letter)
    }

    /// Letters that appear more than once, in order of their second occurrence.
    pub fn repeated(&self) -> Vec<AxisLetter> {
        let mut seen = Vec::new();
        let mut repeated = Vec::new();
        for letter in &self.0 {
            if seen.contains(letter) {
                if !repeated.contains(letter) {
                    repeated.push(*letter);
                }
            } else {
                seen.push(*letter);
            }
        }
        repeated
    }
}

impl TryFrom<String> for LegacyAxes {
    type Error = LegacyAxesError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value
            .chars()
            .map(AxisLetter::try_from)
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

impl From<LegacyAxes> for String {
    fn from(value: LegacyAxes) -> Self {
        value.0.iter().map(AxisLetter::as_char).collect()
    }
}

impl fmt::Display for LegacyAxes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for letter in &self.0 {
            write!(f, "{letter}")?;
        }
        Ok(())
    }
}
