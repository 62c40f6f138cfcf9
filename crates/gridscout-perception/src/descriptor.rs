//! Map descriptor strings.
//!
//! The companion app receives the discovered map as two hex strings:
//!
//! - **part 1**: `11`, one explored bit per cell, `11`.
//! - **part 2**: one obstacle bit per *explored* cell, zero-padded to whole
//!   bytes.
//!
//! Cells are visited row-major from row 0 (the south row).

use std::fmt;

use crate::grid::GridMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapDescriptor {
    pub part1: String,
    pub part2: String,
}

impl MapDescriptor {
    pub fn from_map(map: &GridMap) -> Self {
        let mut explored_bits = Vec::with_capacity(map.total_cells() + 4);
        let mut obstacle_bits = Vec::new();

        explored_bits.extend([true, true]);
        for coord in map.coords() {
            let explored = map.is_explored(coord);
            explored_bits.push(explored);
            if explored {
                obstacle_bits.push(map.is_obstacle(coord));
            }
        }
        explored_bits.extend([true, true]);

        let padding = (8 - obstacle_bits.len() % 8) % 8;
        obstacle_bits.extend(std::iter::repeat_n(false, padding));

        Self {
            part1: to_hex(&explored_bits),
            part2: to_hex(&obstacle_bits),
        }
    }
}

impl fmt::Display for MapDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.part1, self.part2)
    }
}

/// Pack bits into upper-case hex, most significant bit first.  A trailing
/// partial nibble is padded with zeros.
fn to_hex(bits: &[bool]) -> String {
    bits.chunks(4)
        .map(|nibble| {
            let value = nibble
                .iter()
                .enumerate()
                .fold(0u32, |acc, (i, &b)| acc | (u32::from(b) << (3 - i)));
            char::from_digit(value, 16)
                .unwrap_or('0')
                .to_ascii_uppercase()
        })
        .collect()
}
