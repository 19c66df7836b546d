#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    pub x: u16,
    pub y: u16,
    pub z: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionDelta {
    pub dx: i16,
    pub dy: i16,
    pub dz: i8,
}

impl Position {
    pub const fn new(x: u16, y: u16, z: u8) -> Self {
        Self { x, y, z }
    }

    pub fn offset(self, delta: PositionDelta) -> Option<Self> {
        let x = i32::from(self.x) + i32::from(delta.dx);
        let y = i32::from(self.y) + i32::from(delta.dy);
        let z = i16::from(self.z) + i16::from(delta.dz);

        if x < 0 || y < 0 || z < 0 {
            return None;
        }

        if x > i32::from(u16::MAX) || y > i32::from(u16::MAX) || z > i16::from(u8::MAX) {
            return None;
        }

        Some(Self {
            x: x as u16,
            y: y as u16,
            z: z as u8,
        })
    }

    /// Chebyshev distance on the same floor; `None` across floors.
    pub fn distance(self, other: Position) -> Option<u16> {
        if self.z != other.z {
            return None;
        }
        let dx = self.x.abs_diff(other.x);
        let dy = self.y.abs_diff(other.y);
        Some(dx.max(dy))
    }

    /// Positions at exactly `radius` steps (Chebyshev) on the same floor,
    /// in row order. Positions falling off the coordinate space are skipped,
    /// and a radius beyond the reach of a `PositionDelta` yields nothing.
    pub fn ring(self, radius: u16) -> Vec<Position> {
        if radius == 0 {
            return vec![self];
        }
        let Ok(r) = i16::try_from(radius) else {
            return Vec::new();
        };
        let mut out = Vec::with_capacity(usize::from(radius) * 8);
        for dy in -r..=r {
            for dx in -r..=r {
                if dx.abs() != r && dy.abs() != r {
                    continue;
                }
                if let Some(pos) = self.offset(PositionDelta { dx, dy, dz: 0 }) {
                    out.push(pos);
                }
            }
        }
        out
    }
}
