//! Procedural map layouts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::schema::{ConnectionDescription, MapDescription, NodeDescription};

/// Nodes on an `x` × `y` grid, `distance` apart, each linked to its four
/// neighbours inside the grid. Travel time equals the distance travelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SquareMapGenerator {
    pub x: usize,
    pub y: usize,
    pub distance: f64,
    pub production: f64,
    pub throughput: f64,
}

impl SquareMapGenerator {
    /// Id of the node in column `i`, row `j`, written the way the game
    /// server prints its coordinate pairs: `"(i, j)"`.
    pub fn node_id(i: usize, j: usize) -> String {
        format!("({i}, {j})")
    }

    fn position(&self, i: usize, j: usize) -> (f64, f64) {
        (i as f64 * self.distance, j as f64 * self.distance)
    }

    fn neighbours(&self, i: usize, j: usize) -> impl Iterator<Item = (usize, usize)> + '_ {
        let candidates = [
            (i.checked_add(1), Some(j)),
            (Some(i), j.checked_add(1)),
            (i.checked_sub(1), Some(j)),
            (Some(i), j.checked_sub(1)),
        ];
        candidates
            .into_iter()
            .filter_map(|(a, b)| Some((a?, b?)))
            .filter(|&(a, b)| a < self.x && b < self.y)
    }

    pub fn generate(&self) -> MapDescription {
        let mut nodes = BTreeMap::new();
        for i in 0..self.x {
            for j in 0..self.y {
                let (x, y) = self.position(i, j);
                let connections = self
                    .neighbours(i, j)
                    .map(|(a, b)| {
                        let (tx, ty) = self.position(a, b);
                        let link = ConnectionDescription {
                            throughput: self.throughput,
                            travel_time: (tx - x).hypot(ty - y),
                        };
                        (Self::node_id(a, b), link)
                    })
                    .collect();
                nodes.insert(
                    Self::node_id(i, j),
                    NodeDescription {
                        x,
                        y,
                        production: self.production,
                        connections,
                    },
                );
            }
        }
        MapDescription { nodes }
    }
}
