//! Per-node unit counts drawn as a pie around the node centre.
//!
//! The server reports how many units each player holds on a node. The pie's
//! area is proportional to the total, like the production disc, and each
//! player gets a slice proportional to its share. Slices are laid out in
//! owner order starting at angle 0 and are expressed in degrees, the unit
//! drawing layers rotate shapes by.

use std::f64::consts::PI;

use crate::error::ErrorKind;
use crate::geometry::{production_radius, Vec2};
use crate::id::FlowIdentity;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UnitsError {
    #[error("unit count for '{owner}' must be non-negative and finite, got {count}")]
    InvalidCount { owner: String, count: f64 },
}

impl UnitsError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidArgument
    }
}

/// One player's slice of a node's unit pie.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitArc {
    pub owner: FlowIdentity,
    pub count: f64,
    /// Rotation of the slice's first edge, in degrees.
    pub start: f64,
    /// Angular size of the slice, in degrees.
    pub sweep: f64,
}

/// Unit pie for one node.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeUnits {
    center: Vec2,
    outer_radius: f64,
    arcs: Vec<UnitArc>,
}

impl NodeUnits {
    /// Lay out `counts` around `center`. Owners with no units get no slice;
    /// a node with no units at all has an empty pie of radius zero.
    pub fn layout<I, O>(center: Vec2, counts: I, unit_scale: f64) -> Result<Self, UnitsError>
    where
        I: IntoIterator<Item = (O, f64)>,
        O: Into<FlowIdentity>,
    {
        let mut owned = Vec::new();
        for (owner, count) in counts {
            let owner = owner.into();
            if !(count.is_finite() && count >= 0.0) {
                return Err(UnitsError::InvalidCount {
                    owner: owner.0,
                    count,
                });
            }
            if count > 0.0 {
                owned.push((owner, count));
            }
        }

        let total: f64 = owned.iter().map(|(_, c)| c).sum();
        if total == 0.0 {
            return Ok(Self {
                center,
                outer_radius: 0.0,
                arcs: Vec::new(),
            });
        }

        let mut start = 0.0;
        let arcs = owned
            .into_iter()
            .map(|(owner, count)| {
                let sweep = count / total * 360.0;
                let arc = UnitArc {
                    owner,
                    count,
                    start,
                    sweep,
                };
                start += sweep;
                arc
            })
            .collect();

        Ok(Self {
            center,
            outer_radius: production_radius(total, unit_scale),
            arcs,
        })
    }

    pub fn center(&self) -> Vec2 {
        self.center
    }

    /// Radius of the pie: its area equals the total unit count.
    pub fn outer_radius(&self) -> f64 {
        self.outer_radius
    }

    pub fn arcs(&self) -> &[UnitArc] {
        &self.arcs
    }

    pub fn total(&self) -> f64 {
        self.arcs.iter().map(|a| a.count).sum()
    }

    pub fn count(&self, owner: &str) -> f64 {
        self.arcs
            .iter()
            .find(|a| a.owner.as_str() == owner)
            .map_or(0.0, |a| a.count)
    }

    /// Area covered by the pie, `π r²`.
    pub fn area(&self) -> f64 {
        PI * self.outer_radius * self.outer_radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn slices_follow_shares_in_order() {
        let units = NodeUnits::layout(
            Vec2::new(3.0, 4.0),
            [("alice", 1.0), ("bob", 3.0)],
            1.0,
        )
        .unwrap();
        let arcs = units.arcs();
        assert_eq!(arcs.len(), 2);
        assert_eq!(arcs[0].owner.as_str(), "alice");
        assert!((arcs[0].start - 0.0).abs() < EPS);
        assert!((arcs[0].sweep - 90.0).abs() < EPS);
        assert!((arcs[1].start - 90.0).abs() < EPS);
        assert!((arcs[1].sweep - 270.0).abs() < EPS);
        assert_eq!(units.center(), Vec2::new(3.0, 4.0));
    }

    #[test]
    fn radius_makes_area_equal_total() {
        let units = NodeUnits::layout(Vec2::ZERO, [("a", 2.0), ("b", 2.0)], 1.0).unwrap();
        assert!((units.outer_radius() - (4.0 / PI).sqrt()).abs() < EPS);
        assert!((units.area() - 4.0).abs() < EPS);

        let scaled = NodeUnits::layout(Vec2::ZERO, [("a", 4.0)], 2.5).unwrap();
        assert!((scaled.outer_radius() - (4.0 / PI).sqrt() * 2.5).abs() < EPS);
        assert!((scaled.arcs()[0].sweep - 360.0).abs() < EPS);
    }

    #[test]
    fn empty_owners_are_skipped() {
        let units = NodeUnits::layout(Vec2::ZERO, [("a", 0.0), ("b", 5.0)], 1.0).unwrap();
        assert_eq!(units.arcs().len(), 1);
        assert_eq!(units.count("a"), 0.0);
        assert_eq!(units.count("b"), 5.0);

        let none = NodeUnits::layout(Vec2::ZERO, [("a", 0.0)], 1.0).unwrap();
        assert!(none.arcs().is_empty());
        assert_eq!(none.outer_radius(), 0.0);
        assert_eq!(none.total(), 0.0);
    }

    #[test]
    fn rejects_bad_counts() {
        let err = NodeUnits::layout(Vec2::ZERO, [("a", -1.0)], 1.0).unwrap_err();
        assert_eq!(
            err,
            UnitsError::InvalidCount {
                owner: "a".into(),
                count: -1.0
            }
        );
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(NodeUnits::layout(Vec2::ZERO, [("a", f64::NAN)], 1.0).is_err());
    }
}
