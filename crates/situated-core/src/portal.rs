//! Portals: bidirectional links between two places.
//!
//! A portal has one boundary region per side, centred on the side's
//! position. When an action carries a body outside its place's domain and
//! into the boundary region of a portal traversable from that side, the body
//! is transferred to the other place and re-centred on the other side's
//! position, its orientation turned by the difference of the two sides'
//! orientations.

use serde::{Deserialize, Serialize};
use situated_types::{Aabb, Dimension, PlaceId, Point, PortalId, Position};

/// Errors raised by portal queries and construction.
#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    /// Both ends name the same place.
    #[error("portal {portal} connects place {place} to itself")]
    SamePlace {
        /// The portal.
        portal: PortalId,
        /// The place named twice.
        place: PlaceId,
    },

    /// The portal has only one end.
    #[error("portal {0} is still under construction")]
    Incomplete(PortalId),

    /// A second end was attached to a complete portal.
    #[error("portal {0} already has two ends")]
    AlreadyComplete(PortalId),

    /// The place is not an end of the portal.
    #[error("place {place} is not an end of portal {portal}")]
    UnknownEndpoint {
        /// The portal.
        portal: PortalId,
        /// The place asked about.
        place: PlaceId,
    },

    /// An end lies on ground a body cannot stand on.
    #[error("end of portal {portal} in place {place} lies on non-traversable ground")]
    NonTraversableEndpoint {
        /// The portal.
        portal: PortalId,
        /// The place holding the offending end.
        place: PlaceId,
    },
}

/// One side of a portal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct PortalEnd<D: Dimension> {
    /// Place this side belongs to.
    pub place: PlaceId,
    /// Centre and facing of the boundary on this side.
    pub position: Position<D>,
    /// Whether bodies may enter the portal from this side.
    pub traversable: bool,
}

impl<D: Dimension> PortalEnd<D> {
    /// A traversable end.
    pub const fn new(place: PlaceId, position: Position<D>) -> Self {
        Self {
            place,
            position,
            traversable: true,
        }
    }

    /// The same end, closed for entry.
    #[must_use]
    pub const fn closed(mut self) -> Self {
        self.traversable = false;
        self
    }
}

/// A link between two places.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Portal<D: Dimension> {
    id: PortalId,
    half_extents: D::Coords,
    first: PortalEnd<D>,
    second: Option<PortalEnd<D>>,
}

impl<D: Dimension> Portal<D> {
    /// Start a portal from its first end. The boundary region of each side
    /// spans `half_extents` around the side's position.
    pub fn new(first: PortalEnd<D>, half_extents: D::Coords) -> Self {
        Self {
            id: PortalId::new(),
            half_extents,
            first,
            second: None,
        }
    }

    /// A complete portal between two places.
    pub fn between(
        first: PortalEnd<D>,
        second: PortalEnd<D>,
        half_extents: D::Coords,
    ) -> Result<Self, PortalError> {
        let mut portal = Self::new(first, half_extents);
        portal.complete(second)?;
        Ok(portal)
    }

    /// Attach the second end.
    pub fn complete(&mut self, second: PortalEnd<D>) -> Result<(), PortalError> {
        if self.second.is_some() {
            return Err(PortalError::AlreadyComplete(self.id));
        }
        if second.place == self.first.place {
            return Err(PortalError::SamePlace {
                portal: self.id,
                place: second.place,
            });
        }
        self.second = Some(second);
        Ok(())
    }

    /// Identifier of the portal.
    pub const fn id(&self) -> PortalId {
        self.id
    }

    /// Whether both ends are attached.
    pub const fn is_complete(&self) -> bool {
        self.second.is_some()
    }

    /// Both ends, once complete.
    pub fn ends(&self) -> Result<[&PortalEnd<D>; 2], PortalError> {
        let second = self.second.as_ref().ok_or(PortalError::Incomplete(self.id))?;
        Ok([&self.first, second])
    }

    /// The end lying in `place`.
    pub fn end(&self, place: PlaceId) -> Result<&PortalEnd<D>, PortalError> {
        if self.first.place == place {
            return Ok(&self.first);
        }
        match &self.second {
            Some(second) if second.place == place => Ok(second),
            Some(_) => Err(PortalError::UnknownEndpoint {
                portal: self.id,
                place,
            }),
            None => Err(PortalError::Incomplete(self.id)),
        }
    }

    /// The end opposite `place`.
    pub fn other_end(&self, place: PlaceId) -> Result<&PortalEnd<D>, PortalError> {
        let [first, second] = self.ends()?;
        if first.place == place {
            Ok(second)
        } else if second.place == place {
            Ok(first)
        } else {
            Err(PortalError::UnknownEndpoint {
                portal: self.id,
                place,
            })
        }
    }

    /// The place on the other side of the portal from `place`.
    pub fn other_side(&self, place: PlaceId) -> Result<PlaceId, PortalError> {
        self.other_end(place).map(|end| end.place)
    }

    /// Whether a body in `place` may enter the portal.
    pub fn is_traversable_from(&self, place: PlaceId) -> Result<bool, PortalError> {
        self.other_end(place)?;
        self.end(place).map(|end| end.traversable)
    }

    /// Boundary region on `place`'s side.
    pub fn region(&self, place: PlaceId) -> Result<Aabb<D>, PortalError> {
        self.end(place)
            .map(|end| Aabb::from_center(end.position.point, &self.half_extents))
    }

    /// What `place` needs to know to send bodies through the portal.
    pub fn link_for(&self, place: PlaceId) -> Result<PortalLink<D>, PortalError> {
        let here = self.end(place)?;
        let there = self.other_end(place)?;
        Ok(PortalLink {
            portal: self.id,
            region: Aabb::from_center(here.position.point, &self.half_extents),
            traversable: here.traversable,
            destination: there.place,
            entry: here.position,
            arrival: there.position,
        })
    }
}

/// A place's local copy of one attached portal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct PortalLink<D: Dimension> {
    /// The portal.
    pub portal: PortalId,
    /// Boundary region on this side.
    pub region: Aabb<D>,
    /// Whether bodies may enter from this side.
    pub traversable: bool,
    /// Place on the other side.
    pub destination: PlaceId,
    /// Position of this side.
    pub entry: Position<D>,
    /// Position of the other side.
    pub arrival: Position<D>,
}

impl<D: Dimension> PortalLink<D> {
    /// Whether a body reaching `point` goes through the portal.
    pub fn captures(&self, point: &Point<D>) -> bool {
        self.traversable && self.region.contains_point(point)
    }

    /// Pose of a body arriving on the other side, given the pose it tried
    /// to reach on this side.
    pub fn arrival_pose(&self, attempted: &Position<D>) -> Position<D> {
        Position::new(
            self.arrival.point,
            attempted.orientation + (self.arrival.orientation - self.entry.orientation),
        )
    }
}
