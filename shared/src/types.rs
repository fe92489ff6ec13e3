pub type Tick = u64;

/// Which side of the single-authority model this peer is on
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PeerRole {
    Authority,
    Replica,
}

impl PeerRole {
    pub fn is_authority(self) -> bool {
        matches!(self, PeerRole::Authority)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Float3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Float3 {
    pub const ZERO: Float3 = Float3::new(0.0, 0.0, 0.0);
    pub const ONE: Float3 = Float3::new(1.0, 1.0, 1.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Rotation quaternion, stored as-is without normalization
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FloatQ {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl FloatQ {
    pub const IDENTITY: FloatQ = FloatQ::new(0.0, 0.0, 0.0, 1.0);

    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }
}

impl Default for FloatQ {
    fn default() -> Self {
        Self::IDENTITY
    }
}
