//! Register layouts and per-model defaults.
//!
//! Each layout family has a register enum whose discriminants are the control table addresses, a
//! [`Layout`] describing every register, and a [`Catalog`] of the models built on it. Catalogs are built on
//! first access and never change afterwards.
//!
//! ```
//! use dxl_bus::catalog::{pro, LayoutRegister};
//!
//! let model = pro::CATALOG.model_by_name("H54-200-S500-R").unwrap();
//! assert_eq!(model.model_number, 54_024);
//! assert_eq!(pro::Register::GoalPosition.address(), 596);
//! ```

use std::{collections::BTreeMap, f64::consts::TAU, fmt::Debug};

use dxl_wire::ProtocolVersion;

pub mod mx;
pub mod pro;

/// Whether the host may write a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    Read,
    ReadWrite,
}

/// Where a register lives on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryRegion {
    /// Persistent; usually only writable while torque is off.
    Eeprom,
    /// Volatile; reset on power cycle.
    Ram,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterField {
    /// Width in bytes.
    pub length: usize,
    pub region: MemoryRegion,
    pub access: Access,
    pub name: &'static str,
    pub description: &'static str,
}

impl RegisterField {
    const fn new(length: usize, region: MemoryRegion, access: Access, name: &'static str) -> Self {
        Self {
            length,
            region,
            access,
            name,
            description: name,
        }
    }

    pub(crate) const fn eeprom(length: usize, access: Access, name: &'static str) -> Self {
        Self::new(length, MemoryRegion::Eeprom, access, name)
    }

    pub(crate) const fn ram(length: usize, access: Access, name: &'static str) -> Self {
        Self::new(length, MemoryRegion::Ram, access, name)
    }
}

/// A register of one layout family.
pub trait LayoutRegister: Copy + Ord + Debug + Send + Sync + 'static {
    /// Register holding the model number; every model's defaults carry its own number here.
    const MODEL_NUMBER: Self;

    /// Control table address.
    fn address(self) -> u16;
}

pub type Layout<R> = BTreeMap<R, RegisterField>;

/// Layout family of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutType {
    Mx,
    Pro,
}

impl LayoutType {
    /// Protocol generation the family speaks.
    pub const fn protocol(self) -> ProtocolVersion {
        match self {
            Self::Mx => ProtocolVersion::V1,
            Self::Pro => ProtocolVersion::V2,
        }
    }
}

/// Converts between raw register values and physical units.
///
/// Positions are in radians around the center tick, speeds in radians per second.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Converters {
    /// Ticks per revolution.
    pub resolution: f64,
    /// Tick at zero radians.
    pub center_offset: i32,
    /// Revolutions per minute of one raw speed unit.
    pub rpm_per_unit: f64,
}

impl Converters {
    pub const fn new(resolution: f64, center_offset: i32, rpm_per_unit: f64) -> Self {
        Self {
            resolution,
            center_offset,
            rpm_per_unit,
        }
    }

    pub fn position_to_ticks(&self, radians: f64) -> i32 {
        (radians / TAU * self.resolution + f64::from(self.center_offset)).round() as i32
    }

    pub fn ticks_to_position(&self, ticks: i32) -> f64 {
        f64::from(ticks - self.center_offset) * TAU / self.resolution
    }

    pub fn speed_to_raw(&self, radians_per_second: f64) -> i32 {
        (radians_per_second / TAU * 60.0 / self.rpm_per_unit).round() as i32
    }

    pub fn raw_to_speed(&self, raw: i32) -> f64 {
        f64::from(raw) * self.rpm_per_unit * TAU / 60.0
    }
}

/// Everything known about one hardware model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInfo<R: LayoutRegister> {
    pub model_number: u16,
    pub layout: LayoutType,
    pub short_name: &'static str,
    pub names: Vec<&'static str>,
    pub converters: Converters,
    /// Factory value of every register in the layout; `None` where there is none (read-only state, blocks).
    pub defaults: BTreeMap<R, Option<i64>>,
}

impl<R: LayoutRegister> ModelInfo<R> {
    /// A model of the same family with the same defaults, apart from its model number.
    pub fn derive(&self, model_number: u16, short_name: &'static str, names: &[&'static str]) -> Self {
        let mut model = Self {
            model_number,
            short_name,
            names: names.to_vec(),
            ..self.clone()
        };
        model.defaults.insert(R::MODEL_NUMBER, Some(i64::from(model_number)));
        model
    }

    pub fn with_converters(mut self, converters: Converters) -> Self {
        self.converters = converters;
        self
    }

    pub fn with_defaults(mut self, overrides: &[(R, i64)]) -> Self {
        for &(register, value) in overrides {
            self.defaults.insert(register, Some(value));
        }
        self
    }

    pub fn default_value(&self, register: R) -> Option<i64> {
        self.defaults.get(&register).copied().flatten()
    }
}

/// The layout and models of one family.
#[derive(Debug)]
pub struct Catalog<R: LayoutRegister> {
    layout: Layout<R>,
    models: BTreeMap<u16, ModelInfo<R>>,
}

impl<R: LayoutRegister> Catalog<R> {
    pub(crate) fn new(layout: Layout<R>, models: impl IntoIterator<Item = ModelInfo<R>>) -> Self {
        Self {
            layout,
            models: models
                .into_iter()
                .map(|model| (model.model_number, model))
                .collect(),
        }
    }

    pub fn layout(&self) -> &Layout<R> {
        &self.layout
    }

    pub fn field(&self, register: R) -> Option<&RegisterField> {
        self.layout.get(&register)
    }

    pub fn model(&self, model_number: u16) -> Option<&ModelInfo<R>> {
        self.models.get(&model_number)
    }

    /// Finds a model by its short name or any of its aliases.
    pub fn model_by_name(&self, name: &str) -> Option<&ModelInfo<R>> {
        self.models
            .values()
            .find(|model| model.short_name == name || model.names.iter().any(|alias| *alias == name))
    }

    pub fn models(&self) -> impl Iterator<Item = &ModelInfo<R>> {
        self.models.values()
    }
}

/// Family of the model reporting `model_number`, if it is catalogued.
pub fn layout_type_of(model_number: u16) -> Option<LayoutType> {
    if pro::CATALOG.model(model_number).is_some() {
        Some(LayoutType::Pro)
    } else if mx::CATALOG.model(model_number).is_some() {
        Some(LayoutType::Mx)
    } else {
        None
    }
}
