//! Host geometry passed to tick and paint

/// Allotted geometry of the overlay widget for this tick
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Geometry {
    /// Top-left corner in absolute (desktop) space
    pub absolute_position: [f32; 2],
    /// Local size before scaling
    pub local_size: [f32; 2],
    /// Local-to-absolute scale
    pub scale: f32,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            absolute_position: [0.0, 0.0],
            local_size: [0.0, 0.0],
            scale: 1.0,
        }
    }
}

impl Geometry {
    pub fn new(absolute_position: [f32; 2], local_size: [f32; 2]) -> Self {
        Self {
            absolute_position,
            local_size,
            scale: 1.0,
        }
    }

    pub fn absolute_size(&self) -> [f32; 2] {
        [self.local_size[0] * self.scale, self.local_size[1] * self.scale]
    }

    /// Map an absolute point into this widget's local space
    pub fn absolute_to_local(&self, point: [f32; 2]) -> [f32; 2] {
        let scale = if self.scale == 0.0 { 1.0 } else { self.scale };
        [
            (point[0] - self.absolute_position[0]) / scale,
            (point[1] - self.absolute_position[1]) / scale,
        ]
    }
}

/// Absolute rectangle the host is painting into
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct PaintRect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl PaintRect {
    pub fn from_geometry(geometry: &Geometry) -> Self {
        let [w, h] = geometry.absolute_size();
        let [left, top] = geometry.absolute_position;
        Self {
            left,
            top,
            right: left + w,
            bottom: top + h,
        }
    }

    pub fn origin(&self) -> [f32; 2] {
        [self.left, self.top]
    }
}

/// Clip rectangle in host paint space
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ClipRect {
    pub min: [f32; 2],
    pub max: [f32; 2],
}

impl ClipRect {
    /// From an immediate-mode `[x1, y1, x2, y2]` rect shifted by `origin`
    pub fn from_clip(clip: [f32; 4], origin: [f32; 2]) -> Self {
        Self {
            min: [clip[0] + origin[0], clip[1] + origin[1]],
            max: [clip[2] + origin[0], clip[3] + origin[1]],
        }
    }
}
