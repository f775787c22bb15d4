//! Per-primitive attribute arrays.
//!
//! A representation produces one [`AttributeArrays`] per buffer. All channels are
//! parallel: entry `i` of every channel describes primitive `i`.

use std::fmt;
use std::sync::Arc;

use glam::Vec3;

use crate::error::{MolscopeError, Result};
use crate::picking::Picker;

/// Names a single attribute channel, used in error reports and change sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    Position,
    Position2,
    Color,
    Color2,
    Radius,
    MajorAxis,
    MinorAxis,
    Picking,
}

impl Channel {
    /// Returns the channel name as used in logs.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Channel::Position => "position",
            Channel::Position2 => "position2",
            Channel::Color => "color",
            Channel::Color2 => "color2",
            Channel::Radius => "radius",
            Channel::MajorAxis => "majorAxis",
            Channel::MinorAxis => "minorAxis",
            Channel::Picking => "picking",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which data fields a representation should (re)compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataFields {
    pub position: bool,
    pub color: bool,
    pub radius: bool,
    pub picking: bool,
}

impl DataFields {
    /// Every field.
    pub const ALL: Self = Self {
        position: true,
        color: true,
        radius: true,
        picking: true,
    };

    /// Only color.
    pub const COLOR: Self = Self {
        position: false,
        color: true,
        radius: false,
        picking: false,
    };

    /// Only position.
    pub const POSITION: Self = Self {
        position: true,
        color: false,
        radius: false,
        picking: false,
    };

    /// Only radius.
    pub const RADIUS: Self = Self {
        position: false,
        color: false,
        radius: true,
        picking: false,
    };

    /// Returns true if no field is requested.
    #[must_use]
    pub fn is_empty(self) -> bool {
        !(self.position || self.color || self.radius || self.picking)
    }

    /// Field-wise union.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self {
            position: self.position || other.position,
            color: self.color || other.color,
            radius: self.radius || other.radius,
            picking: self.picking || other.picking,
        }
    }
}

/// Parallel per-primitive arrays handed to a buffer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeArrays {
    /// Center (spheres, ellipsoids) or first endpoint (cylinders).
    pub position: Vec<Vec3>,
    /// Second endpoint (cylinders).
    pub position2: Option<Vec<Vec3>>,
    /// RGB color in [0, 1].
    pub color: Vec<Vec3>,
    /// Color of the second half (cylinders).
    pub color2: Option<Vec<Vec3>>,
    /// Radius, never negative.
    pub radius: Vec<f32>,
    /// Ellipsoid major axis (length is the half extent along it).
    pub major_axis: Option<Vec<Vec3>>,
    /// Ellipsoid minor axis.
    pub minor_axis: Option<Vec<Vec3>>,
    /// Maps primitive slots back to domain rows.
    pub picking: Option<Arc<Picker>>,
}

impl AttributeArrays {
    /// Sphere data: center, color, radius.
    #[must_use]
    pub fn spheres(position: Vec<Vec3>, color: Vec<Vec3>, radius: Vec<f32>) -> Self {
        Self {
            position,
            color,
            radius,
            ..Self::default()
        }
    }

    /// Cylinder data: two endpoints with a color each and a shared radius.
    #[must_use]
    pub fn cylinders(
        position1: Vec<Vec3>,
        position2: Vec<Vec3>,
        color: Vec<Vec3>,
        color2: Vec<Vec3>,
        radius: Vec<f32>,
    ) -> Self {
        Self {
            position: position1,
            position2: Some(position2),
            color,
            color2: Some(color2),
            radius,
            ..Self::default()
        }
    }

    /// Ellipsoid data.
    #[must_use]
    pub fn ellipsoids(
        position: Vec<Vec3>,
        color: Vec<Vec3>,
        radius: Vec<f32>,
        major_axis: Vec<Vec3>,
        minor_axis: Vec<Vec3>,
    ) -> Self {
        Self {
            position,
            color,
            radius,
            major_axis: Some(major_axis),
            minor_axis: Some(minor_axis),
            ..Self::default()
        }
    }

    /// Attaches a picker.
    #[must_use]
    pub fn with_picker(mut self, picker: Picker) -> Self {
        self.picking = Some(Arc::new(picker));
        self
    }

    /// Number of primitives.
    #[must_use]
    pub fn len(&self) -> usize {
        self.position.len()
    }

    /// Returns true if there are no primitives.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.position.is_empty()
    }

    /// Checks that every present channel has one entry per primitive.
    ///
    /// Returns the primitive count.
    pub fn validate(&self) -> Result<usize> {
        let n = self.position.len();
        check(Channel::Color, n, self.color.len())?;
        check(Channel::Radius, n, self.radius.len())?;
        check_opt(Channel::Position2, n, self.position2.as_ref().map(Vec::len))?;
        check_opt(Channel::Color2, n, self.color2.as_ref().map(Vec::len))?;
        check_opt(Channel::MajorAxis, n, self.major_axis.as_ref().map(Vec::len))?;
        check_opt(Channel::MinorAxis, n, self.minor_axis.as_ref().map(Vec::len))?;
        check_opt(
            Channel::Picking,
            n,
            self.picking.as_ref().map(|p| p.array.len()),
        )?;
        if let Some(r) = self.radius.iter().find(|r| r.is_nan() || **r < 0.0) {
            log::warn!("negative or NaN radius {r} in attribute data");
        }
        Ok(n)
    }

    /// Applies a partial update in place.
    ///
    /// Every supplied channel must match the current primitive count; on error
    /// nothing is modified. Returns the channels that were replaced.
    pub fn apply(&mut self, update: AttributeUpdate) -> Result<Vec<Channel>> {
        let n = self.len();
        update.check_against(n)?;

        let mut changed = Vec::new();
        if let Some(v) = update.position {
            self.position = v;
            changed.push(Channel::Position);
        }
        if let Some(v) = update.position2 {
            self.position2 = Some(v);
            changed.push(Channel::Position2);
        }
        if let Some(v) = update.color {
            self.color = v;
            changed.push(Channel::Color);
        }
        if let Some(v) = update.color2 {
            self.color2 = Some(v);
            changed.push(Channel::Color2);
        }
        if let Some(v) = update.radius {
            self.radius = v;
            changed.push(Channel::Radius);
        }
        if let Some(v) = update.major_axis {
            self.major_axis = Some(v);
            changed.push(Channel::MajorAxis);
        }
        if let Some(v) = update.minor_axis {
            self.minor_axis = Some(v);
            changed.push(Channel::MinorAxis);
        }
        if let Some(p) = update.picking {
            self.picking = Some(p);
            changed.push(Channel::Picking);
        }
        Ok(changed)
    }
}

/// A partial set of channels for [`AttributeArrays::apply`].
///
/// Channels left as `None` are not touched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeUpdate {
    pub position: Option<Vec<Vec3>>,
    pub position2: Option<Vec<Vec3>>,
    pub color: Option<Vec<Vec3>>,
    pub color2: Option<Vec<Vec3>>,
    pub radius: Option<Vec<f32>>,
    pub major_axis: Option<Vec<Vec3>>,
    pub minor_axis: Option<Vec<Vec3>>,
    pub picking: Option<Arc<Picker>>,
}

impl AttributeUpdate {
    /// Creates an empty update.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the position channel.
    #[must_use]
    pub fn position(mut self, v: Vec<Vec3>) -> Self {
        self.position = Some(v);
        self
    }

    /// Sets the second endpoint channel.
    #[must_use]
    pub fn position2(mut self, v: Vec<Vec3>) -> Self {
        self.position2 = Some(v);
        self
    }

    /// Sets the color channel.
    #[must_use]
    pub fn color(mut self, v: Vec<Vec3>) -> Self {
        self.color = Some(v);
        self
    }

    /// Sets the second color channel.
    #[must_use]
    pub fn color2(mut self, v: Vec<Vec3>) -> Self {
        self.color2 = Some(v);
        self
    }

    /// Sets the radius channel.
    #[must_use]
    pub fn radius(mut self, v: Vec<f32>) -> Self {
        self.radius = Some(v);
        self
    }

    /// Sets both ellipsoid axes.
    #[must_use]
    pub fn axes(mut self, major: Vec<Vec3>, minor: Vec<Vec3>) -> Self {
        self.major_axis = Some(major);
        self.minor_axis = Some(minor);
        self
    }

    /// Returns true if no channel is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.position.is_none()
            && self.position2.is_none()
            && self.color.is_none()
            && self.color2.is_none()
            && self.radius.is_none()
            && self.major_axis.is_none()
            && self.minor_axis.is_none()
            && self.picking.is_none()
    }

    /// Returns true if a channel that moves geometry is set.
    #[must_use]
    pub fn touches_geometry(&self) -> bool {
        self.position.is_some()
            || self.position2.is_some()
            || self.radius.is_some()
            || self.major_axis.is_some()
            || self.minor_axis.is_some()
    }

    fn check_against(&self, n: usize) -> Result<()> {
        check_opt(Channel::Position, n, self.position.as_ref().map(Vec::len))?;
        check_opt(Channel::Position2, n, self.position2.as_ref().map(Vec::len))?;
        check_opt(Channel::Color, n, self.color.as_ref().map(Vec::len))?;
        check_opt(Channel::Color2, n, self.color2.as_ref().map(Vec::len))?;
        check_opt(Channel::Radius, n, self.radius.as_ref().map(Vec::len))?;
        check_opt(Channel::MajorAxis, n, self.major_axis.as_ref().map(Vec::len))?;
        check_opt(Channel::MinorAxis, n, self.minor_axis.as_ref().map(Vec::len))?;
        check_opt(
            Channel::Picking,
            n,
            self.picking.as_ref().map(|p| p.array.len()),
        )
    }
}

fn check(channel: Channel, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(MolscopeError::SizeMismatch {
            channel,
            expected,
            actual,
        })
    }
}

fn check_opt(channel: Channel, expected: usize, actual: Option<usize>) -> Result<()> {
    actual.map_or(Ok(()), |actual| check(channel, expected, actual))
}
