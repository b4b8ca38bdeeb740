//! Configuration axes and the immutable per-point run configuration.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Word length every point is swept at. Wider and narrower widths are only
/// reached through the encoding.
pub const BASE_WORD_LENGTH: u32 = 16;

macro_rules! axis_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $axis:literal {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ConfigError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let needle = s.trim();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|value| value.as_str().eq_ignore_ascii_case(needle))
                    .ok_or_else(|| ConfigError::UnknownAxisValue {
                        axis: $axis,
                        value: s.to_string(),
                        expected: $name::ALL.iter().map(|v| v.as_str()).collect::<Vec<_>>().join(", "),
                    })
            }
        }
    };
}

axis_enum! {
    /// Model family the generated predictor implements.
    Algorithm, "algorithm" {
        Bonsai => "bonsai",
        Protonn => "protonn",
        Fastgrnn => "fastgrnn",
        Rnnpool => "rnnpool",
    }
}

axis_enum! {
    /// Numeric encoding of the generated code.
    Encoding, "encoding" {
        Fixed => "fixed",
        Float => "float",
    }
}

axis_enum! {
    /// Device the generated code is built for.
    Target, "target" {
        X86 => "x86",
        Arduino => "arduino",
        M3 => "m3",
    }
}

axis_enum! {
    /// Metric the code generator maximises during exploration.
    Metric, "metric" {
        Acc => "acc",
        Disagree => "disagree",
        RedDisagree => "red_disagree",
    }
}

axis_enum! {
    /// Which split the artifact evaluates.
    DatasetType, "dataset type" {
        Training => "training",
        Testing => "testing",
    }
}

axis_enum! {
    /// Format the trained model was exported in.
    ModelSource, "model source" {
        Seedot => "seedot",
        Onnx => "onnx",
        Tf => "tf",
    }
}

impl Default for Algorithm {
    fn default() -> Self {
        Algorithm::Protonn
    }
}

impl Default for Encoding {
    fn default() -> Self {
        Encoding::Fixed
    }
}

impl Default for Target {
    fn default() -> Self {
        Target::X86
    }
}

impl Target {
    /// Embedded targets get their own dump tree instead of the scratch dir.
    pub fn is_embedded(&self) -> bool {
        matches!(self, Target::Arduino | Target::M3)
    }
}

impl Default for Metric {
    fn default() -> Self {
        Metric::Acc
    }
}

impl Default for DatasetType {
    fn default() -> Self {
        DatasetType::Testing
    }
}

impl Default for ModelSource {
    fn default() -> Self {
        ModelSource::Seedot
    }
}

impl ModelSource {
    /// Suffix appended to `train`/`test` input file stems.
    pub fn input_suffix(&self) -> &'static str {
        match self {
            ModelSource::Onnx => "_onnx",
            ModelSource::Seedot | ModelSource::Tf => "",
        }
    }
}

/// Datasets shipped with the standard benchmark suite.
pub const COMMON_DATASETS: &[&str] = &[
    "cifar-binary",
    "cr-binary",
    "cr-multiclass",
    "curet-multiclass",
    "letter-multiclass",
    "mnist-binary",
    "mnist-multiclass",
    "usps-binary",
    "usps-multiclass",
    "ward-binary",
];

/// Additional datasets used by the RNN and vision experiments.
pub const EXTRA_DATASETS: &[&str] = &[
    "cifar-multiclass",
    "dsa",
    "eye-binary",
    "farm-beats",
    "interactive-cane",
    "spectakoms",
    "usps10",
    "whale-binary",
    "HAR-2",
    "HAR-6",
    "MNIST-10",
    "Google-12",
    "Google-30",
    "Wakeword-2",
    "wider-regression",
    "wider-mbconv",
    "face-1",
    "face-2",
    "face-2-rewrite",
    "face-3",
    "face-4",
    "test",
];

pub const DEFAULT_DATASET: &str = "cifar-binary";

/// Name of a dataset directory. Unlike the other axes this is open-ended.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Dataset(String);

impl Dataset {
    /// Accept only datasets from the known suites.
    pub fn known(name: &str) -> Result<Self, ConfigError> {
        if Self::is_known(name) {
            Ok(Self(name.to_string()))
        } else {
            Err(ConfigError::UnknownDataset(name.to_string()))
        }
    }

    /// Accept any name that stays a single path component, since it ends up
    /// in dataset, model and output paths.
    pub fn custom(name: impl Into<String>) -> Result<Self, ConfigError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ConfigError::UnknownDataset(name));
        }
        if name.contains(|c: char| matches!(c, '/' | '\\' | '\0')) || name == "." || name == ".." {
            return Err(ConfigError::InvalidDatasetName(name));
        }
        Ok(Self(name))
    }

    pub fn is_known(name: &str) -> bool {
        COMMON_DATASETS
            .iter()
            .chain(EXTRA_DATASETS.iter())
            .any(|known| *known == name)
    }

    pub fn all_known() -> impl Iterator<Item = &'static str> {
        COMMON_DATASETS.iter().chain(EXTRA_DATASETS.iter()).copied()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Dataset {
    type Error = ConfigError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        Self::custom(name)
    }
}

impl From<Dataset> for String {
    fn from(dataset: Dataset) -> Self {
        dataset.0
    }
}

impl Default for Dataset {
    fn default() -> Self {
        Self(DEFAULT_DATASET.to_string())
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Dataset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dataset::known(s.trim())
    }
}

/// Bit-width tag baked into the generated code's version key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BitWidth {
    Float,
    Int8,
    Int16,
    Int32,
}

impl BitWidth {
    /// Total over every reachable `(encoding, word_length)` pair: float ignores
    /// the word length, fixed accepts 8/16/32 and rejects the rest.
    pub fn derive(encoding: Encoding, word_length: u32) -> Result<Self, ConfigError> {
        match (encoding, word_length) {
            (Encoding::Float, _) => Ok(BitWidth::Float),
            (Encoding::Fixed, 8) => Ok(BitWidth::Int8),
            (Encoding::Fixed, 16) => Ok(BitWidth::Int16),
            (Encoding::Fixed, 32) => Ok(BitWidth::Int32),
            (Encoding::Fixed, other) => Err(ConfigError::UnsupportedWordLength(other)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BitWidth::Float => "float",
            BitWidth::Int8 => "int8",
            BitWidth::Int16 => "int16",
            BitWidth::Int32 => "int32",
        }
    }
}

impl fmt::Display for BitWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One point of the sweep. Construct through [`RunConfiguration::new`] so the
/// bit width always agrees with the encoding. Serialize-only for the same
/// reason.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RunConfiguration {
    algorithm: Algorithm,
    encoding: Encoding,
    dataset: Dataset,
    target: Target,
    metric: Metric,
    bit_width: BitWidth,
}

impl RunConfiguration {
    pub fn new(
        algorithm: Algorithm,
        encoding: Encoding,
        dataset: Dataset,
        target: Target,
        metric: Metric,
        word_length: u32,
    ) -> Result<Self, ConfigError> {
        let bit_width = BitWidth::derive(encoding, word_length)?;
        Ok(Self {
            algorithm,
            encoding,
            dataset,
            target,
            metric,
            bit_width,
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn bit_width(&self) -> BitWidth {
        self.bit_width
    }

    /// Key the artifact uses to locate its model parameters and stats output.
    pub fn version(&self) -> String {
        format!("{}_{}_{}", self.algorithm, self.encoding, self.bit_width)
    }

    /// Unique, filesystem-safe name for this point.
    pub fn slug(&self) -> String {
        format!(
            "{}-{}-{}-{}-{}",
            self.algorithm, self.encoding, self.dataset, self.target, self.metric
        )
    }
}

impl fmt::Display for RunConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.algorithm, self.encoding, self.dataset, self.target
        )
    }
}
