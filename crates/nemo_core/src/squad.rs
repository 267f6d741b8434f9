//! Squads: connected groups of same-team units.
//!
//! Squads are rebuilt from scratch every tick. This module holds the pure
//! pieces of that rebuild (clustering, size enforcement, classification and
//! formation geometry); [`crate::squad_manager`] wires them together and
//! carries state across ticks.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::components::{ArmyClass, Bounds, Team, UnitId};
use crate::config::{RotationSpeeds, SquadTuning};
use crate::math::Vec2;

/// Size class of a squad. Larger classes turn more slowly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum SquadClass {
    /// Fewest members.
    #[default]
    Squad,
    /// Small group.
    Troop,
    /// Medium group.
    Platoon,
    /// Large group.
    Company,
}

impl SquadClass {
    /// Bucket a classification weight.
    #[must_use]
    pub fn from_weight(weight: u32, tuning: &SquadTuning) -> Self {
        if weight >= tuning.company_min_weight {
            Self::Company
        } else if weight >= tuning.platoon_min_weight {
            Self::Platoon
        } else if weight >= tuning.troop_min_weight {
            Self::Troop
        } else {
            Self::Squad
        }
    }

    /// Fraction of the direction error closed per tick.
    #[must_use]
    pub fn rotation_speed(self, speeds: &RotationSpeeds) -> f64 {
        match self {
            Self::Squad => speeds.squad,
            Self::Troop => speeds.troop,
            Self::Platoon => speeds.platoon,
            Self::Company => speeds.company,
        }
    }
}

impl fmt::Display for SquadClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Squad => "squad",
            Self::Troop => "troop",
            Self::Platoon => "platoon",
            Self::Company => "company",
        };
        f.write_str(name)
    }
}

/// Clustering input for one live unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Member {
    /// Unit id.
    pub id: UnitId,
    /// Team.
    pub team: Team,
    /// Position.
    pub position: Vec2,
    /// Footprint size.
    pub size: f64,
    /// Classification weight.
    pub weight: u32,
    /// Per-tick speed cap.
    pub max_speed: f64,
}

/// Fingerprint of a member set: sorted ids joined with `,`.
#[must_use]
pub fn fingerprint(ids: &[UnitId]) -> String {
    let mut sorted = ids.to_vec();
    sorted.sort_unstable();
    sorted
        .iter()
        .map(UnitId::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Partition members into connected components.
///
/// Two same-team members are linked when they are at most `link_distance`
/// apart. Each component is sorted by id and the components are ordered by
/// their lowest id, so the result does not depend on input order.
#[must_use]
pub fn cluster(members: &[Member], link_distance: f64) -> Vec<Vec<Member>> {
    let link_squared = link_distance * link_distance;
    let mut visited = vec![false; members.len()];
    let mut components = Vec::new();

    for start in 0..members.len() {
        if visited[start] {
            continue;
        }
        visited[start] = true;
        let mut component = Vec::new();
        let mut queue = VecDeque::from([start]);

        while let Some(current) = queue.pop_front() {
            let here = members[current];
            component.push(here);
            for (next, other) in members.iter().enumerate() {
                if !visited[next]
                    && other.team == here.team
                    && here.position.distance_squared(other.position) <= link_squared
                {
                    visited[next] = true;
                    queue.push_back(next);
                }
            }
        }

        component.sort_by_key(|member| member.id);
        components.push(component);
    }

    components.sort_by_key(|component| component.first().map(|member| member.id));
    components
}

/// Bounding box of members, including half of each footprint.
#[must_use]
pub fn member_bounds(members: &[Member]) -> Bounds {
    Bounds::enclosing(members.iter().map(|m| (m.position, m.size)))
}

/// Split a component until every piece fits within `max_extent`.
///
/// The member farthest from the box center is evicted into its own
/// singleton until the remainder fits. Singletons are returned first, in
/// eviction order, followed by the remainder.
#[must_use]
pub fn enforce_max_extent(mut members: Vec<Member>, max_extent: f64) -> Vec<Vec<Member>> {
    let mut pieces = Vec::new();

    while members.len() > 1 {
        let bounds = member_bounds(&members);
        if !bounds.exceeds(max_extent) {
            break;
        }
        let center = bounds.center();
        let mut farthest = 0;
        let mut farthest_distance = f64::NEG_INFINITY;
        for (index, member) in members.iter().enumerate() {
            let distance = member.position.distance_squared(center);
            if distance > farthest_distance {
                farthest = index;
                farthest_distance = distance;
            }
        }
        let evicted = members.remove(farthest);
        tracing::trace!(unit = evicted.id, "Evicted from oversized squad");
        pieces.push(vec![evicted]);
    }

    pieces.push(members);
    pieces
}

/// V-formation slots around `lead_point`, facing `direction`.
///
/// `members` must be sorted by id. The first (lowest id) member leads at
/// `lead_point`; member `k` takes rank `(k + 1) / 2` on the left for odd `k`
/// and on the right for even `k`, set back along the direction and out
/// along its perpendicular by `rank * spacing`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn formation_slots(
    members: &[UnitId],
    lead_point: Vec2,
    direction: f64,
    spacing: f64,
) -> Vec<(UnitId, Vec2)> {
    let forward = Vec2::from_angle(direction);
    let left = forward.rotate(-std::f64::consts::FRAC_PI_2);

    members
        .iter()
        .enumerate()
        .map(|(k, id)| {
            if k == 0 {
                return (*id, lead_point);
            }
            let rank = ((k + 1) / 2) as f64 * spacing;
            let side = if k % 2 == 1 { 1.0 } else { -1.0 };
            (*id, lead_point - forward * rank + left * (side * rank))
        })
        .collect()
}

/// Split members into a front and a rear line.
///
/// Heavy units always go to the rear. The others are dealt out in order,
/// three to the front for every one to the rear.
#[must_use]
pub fn assign_lines(members: &[(UnitId, ArmyClass)]) -> (Vec<UnitId>, Vec<UnitId>) {
    let mut front = Vec::new();
    let mut rear: Vec<UnitId> = members
        .iter()
        .filter(|(_, class)| *class == ArmyClass::Heavy)
        .map(|(id, _)| *id)
        .collect();

    let line = members.iter().filter(|(_, class)| *class != ArmyClass::Heavy);
    for (index, (id, _)) in line.enumerate() {
        if index % 4 < 3 {
            front.push(*id);
        } else {
            rear.push(*id);
        }
    }
    (front, rear)
}

/// Two-line formation slots around `center`, facing `direction`.
///
/// The front line is centered on `center` and the rear line sits `depth`
/// behind it. Each line spreads its members evenly across `width`; a line
/// of one stands on its center.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn line_slots(
    members: &[(UnitId, ArmyClass)],
    center: Vec2,
    direction: f64,
    width: f64,
    depth: f64,
) -> Vec<(UnitId, Vec2)> {
    let forward = Vec2::from_angle(direction);
    let across = Vec2::from_angle(direction + std::f64::consts::FRAC_PI_2);
    let (front, rear) = assign_lines(members);

    let mut slots = Vec::with_capacity(members.len());
    for (row, line) in [front, rear].iter().enumerate() {
        let line_center = center - forward * (row as f64 * depth);
        let spacing = if line.len() > 1 {
            width / (line.len() - 1) as f64
        } else {
            0.0
        };
        let middle = (line.len() as f64 - 1.0) / 2.0;
        for (index, id) in line.iter().enumerate() {
            let offset = (index as f64 - middle) * spacing;
            slots.push((*id, line_center + across * offset));
        }
    }
    slots
}

/// A connected group of same-team units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Squad {
    /// Team.
    pub team: Team,
    /// Member ids, sorted.
    pub members: Vec<UnitId>,
    /// Member ids joined with `,`.
    pub fingerprint: String,
    /// Bounding box including half the unit footprint.
    pub bounds: Bounds,
    /// Mean member position.
    pub centroid: Vec2,
    /// Centroid on the previous tick.
    pub last_centroid: Option<Vec2>,
    /// Sum of member class weights.
    pub weight: u32,
    /// Size class.
    pub class: SquadClass,
    /// Slowest member speed; the formation lead point advances at this rate.
    pub step: f64,
    /// Selected in the UI.
    pub selected: bool,
    /// Group destination.
    pub destination: Option<Vec2>,
    /// Formation lead point advancing toward the destination.
    pub virtual_point: Option<Vec2>,
    /// Smoothed facing.
    pub primary_direction: f64,
    /// Smoothed flank facing.
    pub secondary_direction: f64,
    /// Nearest opposing squad in recognition range.
    pub primary_target: Option<String>,
    /// Second nearest opposing squad in recognition range.
    pub secondary_target: Option<String>,
    /// The primary target targets this squad back.
    pub head_on: bool,
    /// Squads that hold this one as their secondary target and are not
    /// this squad's primary target.
    pub defensive_contacts: Vec<String>,
}

impl Squad {
    /// Build a fresh squad from sorted members.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_members(members: &[Member], tuning: &SquadTuning) -> Self {
        let ids: Vec<UnitId> = members.iter().map(|m| m.id).collect();
        let weight = members.iter().map(|m| m.weight).sum();
        let centroid = if members.is_empty() {
            Vec2::ZERO
        } else {
            let sum = members
                .iter()
                .fold(Vec2::ZERO, |acc, member| acc + member.position);
            sum * (1.0 / members.len() as f64)
        };
        let step = members
            .iter()
            .map(|m| m.max_speed)
            .reduce(f64::min)
            .unwrap_or(0.0);

        Self {
            team: members.first().map_or(Team::Red, |m| m.team),
            fingerprint: fingerprint(&ids),
            members: ids,
            bounds: member_bounds(members),
            centroid,
            last_centroid: None,
            weight,
            class: SquadClass::from_weight(weight, tuning),
            step,
            selected: false,
            destination: None,
            virtual_point: None,
            primary_direction: 0.0,
            secondary_direction: 0.0,
            primary_target: None,
            secondary_target: None,
            head_on: false,
            defensive_contacts: Vec::new(),
        }
    }

    /// Lowest-id member.
    #[must_use]
    pub fn leader(&self) -> Option<UnitId> {
        self.members.first().copied()
    }

    /// Whether `unit` belongs to this squad.
    #[must_use]
    pub fn contains(&self, unit: UnitId) -> bool {
        self.members.binary_search(&unit).is_ok()
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Check if the squad has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Give the squad a group destination; the lead point starts at the
    /// centroid.
    pub fn set_destination(&mut self, point: Vec2) {
        self.destination = Some(point);
        self.virtual_point = Some(self.centroid);
    }

    /// Move the lead point one step toward the destination.
    ///
    /// Returns the new lead point, or `None` without a destination. The
    /// destination is cleared once the lead point reaches it.
    pub fn advance_virtual_point(&mut self) -> Option<Vec2> {
        let destination = self.destination?;
        let current = self.virtual_point.unwrap_or(self.centroid);
        let remaining = current.distance(destination);
        let next = if remaining <= self.step {
            destination
        } else {
            current + (destination - current).normalize_or_zero() * self.step
        };

        if remaining <= self.step {
            self.destination = None;
            self.virtual_point = None;
        } else {
            self.virtual_point = Some(next);
        }
        Some(next)
    }

    /// Carry cross-tick state over from the previous incarnation.
    pub fn inherit(&mut self, previous: &Self) {
        self.selected = previous.selected;
        self.destination = previous.destination;
        self.virtual_point = previous.virtual_point;
        self.primary_direction = previous.primary_direction;
        self.secondary_direction = previous.secondary_direction;
        self.last_centroid = Some(previous.centroid);
    }
}
