//! Architecture configuration structures
//!
//! This module turns a declarative network description into a [`Network`].
//! Two equivalent surfaces are supported:
//!
//! - **JSON**, via [`load_architecture`]: a [`NetworkSpec`] with named fields.
//! - **Integer descriptors**, via [`NetworkSpec::from_descriptors`]: each entry
//!   is a type tag followed by its shape parameters.
//!
//! | Tag    | Entry                                                             |
//! |--------|-------------------------------------------------------------------|
//! | `101`  | `[101, inputs, outputs]` Linear                                   |
//! | `102`  | `[102, size?, drop_percent?]` Dropout (default 50 %)              |
//! | `103`  | `[103, in_ch, height, width, out_ch, half, padding?, stride?]`    |
//! | `104`  | `[104, ch, height, width, step_h, step_w, pool_h, pool_w]`        |
//! | `201`  | `[201, size?]` Sigmoid                                            |
//! | `202`  | `[202, size?]` ReLU                                               |
//! | `203`  | `[203, size?]` Softmax                                            |
//! | `1001` | `[1001, inputs, outputs]` starts a Sequential module              |
//!
//! A convolution descriptor gives the kernel by its half width, so `half = 2`
//! is a 5x5 kernel. Padding defaults to the half width, which keeps the
//! output the same size as the input, and stride defaults to 1. A maxpool
//! descriptor gives the window last and, before it, the stride counted in
//! windows: `[104, 6, 28, 28, 1, 1, 2, 2]` pools 2x2 blocks without overlap.
//! Overlapping windows are only reachable through JSON.
//!
//! Dropout and activation layers that are not first in their module take
//! their width from the preceding layer; a declared width is then ignored.
//! First in a module, they need an explicit width.
//!
//! Malformed entries are rejected with a [`ConfigError`]. Width mismatches
//! between well-formed layers are not errors: they are recorded in the built
//! network's [`crate::chain::Validity`].

use crate::error::ConfigError;
use crate::layers::dropout::DEFAULT_DROP_RATE;
use crate::layers::{
    Convolution, ConvolutionShape, Differentiable, Dropout, Layer, LayerKind, Linear, Maxpool,
    MaxpoolShape, Relu, Sigmoid, Softmax,
};
use crate::module::{Module, ModuleKind};
use crate::network::Network;
use crate::utils::SeededRng;
use serde::{Deserialize, Serialize};
use std::fs;

/// Weight-initialisation spread used when a JSON file does not give one.
pub const DEFAULT_SIGMA: f64 = 0.1;

/// Configuration for a single layer.
///
/// # Examples
///
/// ```json
/// { "layer_type": "linear", "inputs": 784, "outputs": 120 }
/// ```
///
/// ```json
/// {
///   "layer_type": "convolution",
///   "in_channels": 1, "height": 28, "width": 28,
///   "out_channels": 6, "kernel_size": 5, "stride": 1, "padding": 2
/// }
/// ```
///
/// ```json
/// { "layer_type": "relu" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "layer_type", rename_all = "snake_case")]
pub enum LayerSpec {
    Linear {
        inputs: usize,
        outputs: usize,
    },
    Dropout {
        #[serde(default)]
        size: Option<usize>,
        /// Probability of dropping a unit (default 0.5).
        #[serde(default)]
        drop_rate: Option<f64>,
    },
    Convolution {
        in_channels: usize,
        height: usize,
        width: usize,
        out_channels: usize,
        kernel_size: usize,
        #[serde(default = "default_stride")]
        stride: usize,
        #[serde(default)]
        padding: usize,
    },
    Maxpool {
        channels: usize,
        height: usize,
        width: usize,
        pool_height: usize,
        pool_width: usize,
        /// Defaults to `pool_height`.
        #[serde(default)]
        stride_height: Option<usize>,
        /// Defaults to `pool_width`.
        #[serde(default)]
        stride_width: Option<usize>,
    },
    Sigmoid {
        #[serde(default)]
        size: Option<usize>,
    },
    Relu {
        #[serde(default)]
        size: Option<usize>,
    },
    Softmax {
        #[serde(default)]
        size: Option<usize>,
    },
}

fn default_stride() -> usize {
    1
}

fn default_sigma() -> f64 {
    DEFAULT_SIGMA
}

impl LayerSpec {
    pub fn kind(&self) -> LayerKind {
        match self {
            LayerSpec::Linear { .. } => LayerKind::Linear,
            LayerSpec::Dropout { .. } => LayerKind::Dropout,
            LayerSpec::Convolution { .. } => LayerKind::Convolution,
            LayerSpec::Maxpool { .. } => LayerKind::Maxpool,
            LayerSpec::Sigmoid { .. } => LayerKind::Sigmoid,
            LayerSpec::Relu { .. } => LayerKind::Relu,
            LayerSpec::Softmax { .. } => LayerKind::Softmax,
        }
    }

    /// Parse one integer descriptor. `index` is only used in error messages.
    ///
    /// Trailing values beyond the ones a layer type understands are ignored.
    ///
    /// # Examples
    ///
    /// ```
    /// use seqnet::architecture::LayerSpec;
    ///
    /// let spec = LayerSpec::from_descriptor(0, &[101, 784, 10]).unwrap();
    /// assert_eq!(spec, LayerSpec::Linear { inputs: 784, outputs: 10 });
    ///
    /// let spec = LayerSpec::from_descriptor(1, &[102, 64, 20]).unwrap();
    /// assert_eq!(spec, LayerSpec::Dropout { size: Some(64), drop_rate: Some(0.2) });
    /// ```
    pub fn from_descriptor(index: usize, descriptor: &[usize]) -> Result<Self, ConfigError> {
        let (&tag, params) = descriptor
            .split_first()
            .ok_or(ConfigError::EmptyDescriptor { index })?;
        let kind = LayerKind::from_tag(tag).ok_or(ConfigError::UnknownTag { index, tag })?;

        let optional = |position: usize| params.get(position).copied();
        let required = |position: usize, name: &'static str| {
            optional(position).ok_or(ConfigError::MissingParameter {
                index,
                kind: kind.name(),
                name,
            })
        };

        let spec = match kind {
            LayerKind::Linear => LayerSpec::Linear {
                inputs: required(0, "inputs")?,
                outputs: required(1, "outputs")?,
            },
            LayerKind::Dropout => LayerSpec::Dropout {
                size: optional(0),
                drop_rate: optional(1).map(|percent| percent as f64 / 100.0),
            },
            LayerKind::Convolution => {
                let half = required(4, "half_width")?;
                LayerSpec::Convolution {
                    in_channels: required(0, "in_channels")?,
                    height: required(1, "height")?,
                    width: required(2, "width")?,
                    out_channels: required(3, "out_channels")?,
                    kernel_size: 2 * half + 1,
                    padding: optional(5).unwrap_or(half),
                    stride: optional(6).unwrap_or(1),
                }
            }
            LayerKind::Maxpool => {
                let step_height = required(3, "step_height")?;
                let step_width = required(4, "step_width")?;
                let pool_height = required(5, "pool_height")?;
                let pool_width = required(6, "pool_width")?;
                LayerSpec::Maxpool {
                    channels: required(0, "channels")?,
                    height: required(1, "height")?,
                    width: required(2, "width")?,
                    pool_height,
                    pool_width,
                    stride_height: Some(step_height * pool_height),
                    stride_width: Some(step_width * pool_width),
                }
            }
            LayerKind::Sigmoid => LayerSpec::Sigmoid { size: optional(0) },
            LayerKind::Relu => LayerSpec::Relu { size: optional(0) },
            LayerKind::Softmax => LayerSpec::Softmax { size: optional(0) },
        };
        Ok(spec)
    }

    /// Check the entry on its own. `first` tells whether the layer opens its
    /// module, which decides whether an implicit width is allowed.
    fn validate(&self, index: usize, first: bool) -> Result<(), ConfigError> {
        let nonzero = |value: usize, name: &'static str| {
            if value == 0 {
                Err(ConfigError::ZeroDimension { index, name })
            } else {
                Ok(())
            }
        };
        let fits = |window: usize, extent: usize, padding: usize| {
            if window > extent + 2 * padding {
                Err(ConfigError::InvalidGeometry {
                    index,
                    window,
                    extent,
                    padding,
                })
            } else {
                Ok(())
            }
        };

        match *self {
            LayerSpec::Linear { inputs, outputs } => {
                nonzero(inputs, "inputs")?;
                nonzero(outputs, "outputs")?;
            }
            LayerSpec::Dropout { size, drop_rate } => {
                if let Some(rate) = drop_rate {
                    if !(0.0..1.0).contains(&rate) {
                        return Err(ConfigError::InvalidDropRate { index, rate });
                    }
                }
                self.validate_width(index, first, size)?;
            }
            LayerSpec::Convolution {
                in_channels,
                height,
                width,
                out_channels,
                kernel_size,
                stride,
                padding,
            } => {
                nonzero(in_channels, "in_channels")?;
                nonzero(height, "height")?;
                nonzero(width, "width")?;
                nonzero(out_channels, "out_channels")?;
                nonzero(kernel_size, "kernel_size")?;
                nonzero(stride, "stride")?;
                fits(kernel_size, height, padding)?;
                fits(kernel_size, width, padding)?;
            }
            LayerSpec::Maxpool {
                channels,
                height,
                width,
                pool_height,
                pool_width,
                stride_height,
                stride_width,
            } => {
                nonzero(channels, "channels")?;
                nonzero(height, "height")?;
                nonzero(width, "width")?;
                nonzero(pool_height, "pool_height")?;
                nonzero(pool_width, "pool_width")?;
                nonzero(stride_height.unwrap_or(pool_height), "stride_height")?;
                nonzero(stride_width.unwrap_or(pool_width), "stride_width")?;
                fits(pool_height, height, 0)?;
                fits(pool_width, width, 0)?;
            }
            LayerSpec::Sigmoid { size } | LayerSpec::Relu { size } | LayerSpec::Softmax { size } => {
                self.validate_width(index, first, size)?;
            }
        }
        Ok(())
    }

    fn validate_width(
        &self,
        index: usize,
        first: bool,
        size: Option<usize>,
    ) -> Result<(), ConfigError> {
        match (first, size) {
            (true, None) => Err(ConfigError::MissingWidth {
                index,
                kind: self.kind().name(),
            }),
            (true, Some(0)) => Err(ConfigError::ZeroDimension {
                index,
                name: "size",
            }),
            _ => Ok(()),
        }
    }

    /// Build the layer. `previous` is the output width of the preceding
    /// layer in the same module, if any.
    fn build(
        &self,
        index: usize,
        previous: Option<usize>,
        sigma: f64,
        rng: &mut SeededRng,
    ) -> Result<Layer, ConfigError> {
        let layer = match *self {
            LayerSpec::Linear { inputs, outputs } => Linear::new(inputs, outputs, sigma, rng).into(),
            LayerSpec::Dropout { size, drop_rate } => {
                let size = self.resolve_width(index, size, previous)?;
                Dropout::new(size, drop_rate.unwrap_or(DEFAULT_DROP_RATE), rng.fork()).into()
            }
            LayerSpec::Convolution {
                in_channels,
                height,
                width,
                out_channels,
                kernel_size,
                stride,
                padding,
            } => {
                let shape = ConvolutionShape {
                    in_channels,
                    height,
                    width,
                    out_channels,
                    kernel_size,
                    stride,
                    padding,
                };
                Convolution::new(shape, sigma, rng).into()
            }
            LayerSpec::Maxpool {
                channels,
                height,
                width,
                pool_height,
                pool_width,
                stride_height,
                stride_width,
            } => Maxpool::new(MaxpoolShape {
                channels,
                height,
                width,
                pool_height,
                pool_width,
                stride_height: stride_height.unwrap_or(pool_height),
                stride_width: stride_width.unwrap_or(pool_width),
            })
            .into(),
            LayerSpec::Sigmoid { size } => Sigmoid::new(self.resolve_width(index, size, previous)?).into(),
            LayerSpec::Relu { size } => Relu::new(self.resolve_width(index, size, previous)?).into(),
            LayerSpec::Softmax { size } => Softmax::new(self.resolve_width(index, size, previous)?).into(),
        };
        Ok(layer)
    }

    fn resolve_width(
        &self,
        index: usize,
        declared: Option<usize>,
        previous: Option<usize>,
    ) -> Result<usize, ConfigError> {
        match (previous, declared) {
            (Some(inherited), Some(declared)) if declared != inherited => {
                log::debug!(
                    "layer {}: {} declares width {} but inherits {}; declared width ignored",
                    index,
                    self.kind().name(),
                    declared,
                    inherited
                );
                Ok(inherited)
            }
            (Some(inherited), _) => Ok(inherited),
            (None, Some(declared)) => Ok(declared),
            (None, None) => Err(ConfigError::MissingWidth {
                index,
                kind: self.kind().name(),
            }),
        }
    }
}

/// Configuration for a module: a chain of layers with declared widths.
///
/// ```json
/// {
///   "module_type": "sequential",
///   "inputs": 784,
///   "outputs": 10,
///   "layers": [
///     { "layer_type": "linear", "inputs": 784, "outputs": 10 },
///     { "layer_type": "softmax" }
///   ]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "module_type", rename_all = "snake_case")]
pub enum ModuleSpec {
    Sequential {
        inputs: usize,
        outputs: usize,
        layers: Vec<LayerSpec>,
    },
}

impl ModuleSpec {
    pub fn kind(&self) -> ModuleKind {
        match self {
            ModuleSpec::Sequential { .. } => ModuleKind::Sequential,
        }
    }

    pub fn inputs(&self) -> usize {
        match self {
            ModuleSpec::Sequential { inputs, .. } => *inputs,
        }
    }

    pub fn outputs(&self) -> usize {
        match self {
            ModuleSpec::Sequential { outputs, .. } => *outputs,
        }
    }

    pub fn layers(&self) -> &[LayerSpec] {
        match self {
            ModuleSpec::Sequential { layers, .. } => layers,
        }
    }
}

/// Complete network configuration.
///
/// # Example
///
/// ```json
/// {
///   "inputs": 2,
///   "outputs": 2,
///   "sigma": 0.1,
///   "modules": [
///     {
///       "module_type": "sequential",
///       "inputs": 2,
///       "outputs": 2,
///       "layers": [
///         { "layer_type": "linear", "inputs": 2, "outputs": 2 },
///         { "layer_type": "softmax" }
///       ]
///     }
///   ]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub inputs: usize,
    pub outputs: usize,
    /// Spread of the zero-mean normal used for initial weights.
    #[serde(default = "default_sigma")]
    pub sigma: f64,
    pub modules: Vec<ModuleSpec>,
}

impl NetworkSpec {
    /// Parse a list of integer descriptors.
    ///
    /// A list without module headers becomes a single sequential module
    /// declared with the network's own widths. Otherwise every layer must
    /// follow a `[1001, inputs, outputs]` header, which opens a new module.
    ///
    /// # Example
    ///
    /// ```
    /// use seqnet::architecture::NetworkSpec;
    ///
    /// let spec = NetworkSpec::from_descriptors(
    ///     784,
    ///     10,
    ///     0.1,
    ///     &[vec![101, 784, 64], vec![202], vec![102], vec![101, 64, 10], vec![203]],
    /// )
    /// .unwrap();
    /// assert_eq!(spec.modules.len(), 1);
    /// assert_eq!(spec.modules[0].layers().len(), 5);
    /// ```
    pub fn from_descriptors<D: AsRef<[usize]>>(
        inputs: usize,
        outputs: usize,
        sigma: f64,
        descriptors: &[D],
    ) -> Result<Self, ConfigError> {
        let header = |descriptor: &[usize]| {
            descriptor
                .first()
                .and_then(|&tag| ModuleKind::from_tag(tag))
        };

        let has_headers = descriptors.iter().any(|d| header(d.as_ref()).is_some());
        let mut modules = Vec::new();

        if !has_headers {
            let layers = descriptors
                .iter()
                .enumerate()
                .map(|(index, d)| LayerSpec::from_descriptor(index, d.as_ref()))
                .collect::<Result<Vec<_>, _>>()?;
            modules.push(ModuleSpec::Sequential {
                inputs,
                outputs,
                layers,
            });
            return Ok(Self {
                inputs,
                outputs,
                sigma,
                modules,
            });
        }

        for (index, descriptor) in descriptors.iter().enumerate() {
            let descriptor = descriptor.as_ref();
            if header(descriptor).is_some() {
                let field = |position: usize, name: &'static str| {
                    descriptor
                        .get(position)
                        .copied()
                        .ok_or(ConfigError::MissingParameter {
                            index,
                            kind: "sequential",
                            name,
                        })
                };
                modules.push(ModuleSpec::Sequential {
                    inputs: field(1, "inputs")?,
                    outputs: field(2, "outputs")?,
                    layers: Vec::new(),
                });
                continue;
            }

            let layer = LayerSpec::from_descriptor(index, descriptor)?;
            match modules.last_mut() {
                Some(ModuleSpec::Sequential { layers, .. }) => layers.push(layer),
                None => {
                    return Err(ConfigError::InvalidValue(format!(
                        "entry {}: layer descriptor before the first module header",
                        index
                    )))
                }
            }
        }

        Ok(Self {
            inputs,
            outputs,
            sigma,
            modules,
        })
    }

    /// Check every entry for malformed values.
    ///
    /// Layer indices in errors count layers across the whole network, in
    /// order.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.sigma.is_finite() && self.sigma >= 0.0) {
            return Err(ConfigError::InvalidValue(format!(
                "sigma must be non-negative and finite, got {}",
                self.sigma
            )));
        }
        if self.modules.is_empty() {
            return Err(ConfigError::EmptyChain("network"));
        }

        let mut index = 0;
        for module in &self.modules {
            if module.layers().is_empty() {
                return Err(ConfigError::EmptyChain("module"));
            }
            for (position, layer) in module.layers().iter().enumerate() {
                layer.validate(index, position == 0)?;
                index += 1;
            }
        }
        Ok(())
    }
}

/// Loads a network configuration from a JSON file.
///
/// Reads the file at `path`, deserializes it into a [`NetworkSpec`] and
/// validates every entry.
///
/// # Examples
///
/// ```no_run
/// use seqnet::architecture::load_architecture;
///
/// let spec = load_architecture("config/architectures/lenet.json").unwrap();
/// assert_eq!(spec.inputs, 784);
/// ```
pub fn load_architecture(path: &str) -> Result<NetworkSpec, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let spec: NetworkSpec = serde_json::from_str(&contents)?;
    spec.validate()?;
    Ok(spec)
}

/// Builds a network from a validated configuration.
///
/// Weights are drawn from `Normal(0, spec.sigma)` using `rng`, biases start
/// at zero, and every Dropout layer gets its own generator forked from `rng`.
///
/// The returned network may still be invalid (see [`Network::validity`]) if
/// the layers do not fit together.
///
/// # Examples
///
/// ```
/// use seqnet::architecture::{build_network, NetworkSpec};
/// use seqnet::utils::SeededRng;
///
/// let spec = NetworkSpec::from_descriptors(4, 3, 0.1, &[vec![101, 4, 3], vec![203]]).unwrap();
/// let mut rng = SeededRng::new(42);
/// let network = build_network(&spec, &mut rng).unwrap();
/// assert!(network.is_valid());
/// assert_eq!(network.parameter_count(), 15);
/// ```
pub fn build_network(spec: &NetworkSpec, rng: &mut SeededRng) -> Result<Network, ConfigError> {
    spec.validate()?;

    let mut index = 0;
    let mut modules = Vec::with_capacity(spec.modules.len());
    for module in &spec.modules {
        let mut layers = Vec::with_capacity(module.layers().len());
        let mut previous: Option<usize> = None;
        for layer_spec in module.layers() {
            let layer = layer_spec.build(index, previous, spec.sigma, rng)?;
            previous = Some(layer.output_size());
            layers.push(layer);
            index += 1;
        }
        modules.push(match module.kind() {
            ModuleKind::Sequential => Module::sequential(module.inputs(), module.outputs(), layers),
        });
    }

    Ok(Network::from_modules(spec.inputs, spec.outputs, modules))
}
