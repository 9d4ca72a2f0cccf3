//! Axis-aligned facings and direction sets.
//!
//! Coordinates follow the usual voxel convention: +x is East, +y is Up and
//! +z is South, so North is -z. [`Direction::ALL`] fixes the declaration
//! order that every tie-break in the resolver uses.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Axis
// ---------------------------------------------------------------------------

/// One of the three grid axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// The two directions lying on this axis, positive first.
    pub fn directions(self) -> [Direction; 2] {
        match self {
            Axis::X => [Direction::East, Direction::West],
            Axis::Y => [Direction::Up, Direction::Down],
            Axis::Z => [Direction::South, Direction::North],
        }
    }
}

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// One of the six axis-aligned facings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    East,
    South,
    West,
    Up,
    Down,
}

impl Direction {
    /// All six directions in declaration order.
    pub const ALL: [Direction; 6] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
        Direction::Up,
        Direction::Down,
    ];

    /// The four horizontal directions, clockwise from North.
    pub const HORIZONTAL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    /// Position of this direction in [`Direction::ALL`].
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Inverse of [`Direction::index`].
    pub fn from_index(index: usize) -> Option<Direction> {
        Self::ALL.get(index).copied()
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }

    /// Rotate 90 degrees clockwise around the vertical axis (seen from above).
    /// Up and Down are unchanged.
    pub fn rotate_cw(self) -> Direction {
        match self {
            Direction::North => Direction::East,
            Direction::East => Direction::South,
            Direction::South => Direction::West,
            Direction::West => Direction::North,
            vertical => vertical,
        }
    }

    /// Rotate 90 degrees counter-clockwise around the vertical axis.
    pub fn rotate_ccw(self) -> Direction {
        match self {
            Direction::North => Direction::West,
            Direction::West => Direction::South,
            Direction::South => Direction::East,
            Direction::East => Direction::North,
            vertical => vertical,
        }
    }

    pub fn axis(self) -> Axis {
        match self {
            Direction::East | Direction::West => Axis::X,
            Direction::Up | Direction::Down => Axis::Y,
            Direction::North | Direction::South => Axis::Z,
        }
    }

    pub fn is_horizontal(self) -> bool {
        self.axis() != Axis::Y
    }

    /// True when the two directions are perpendicular. Every direction has
    /// exactly four adjacent directions; a two-connector set built from
    /// adjacent directions is "bent".
    pub fn is_adjacent(self, other: Direction) -> bool {
        self.axis() != other.axis()
    }

    /// Unit grid offset `(dx, dy, dz)`.
    pub fn offset(self) -> (i32, i32, i32) {
        match self {
            Direction::North => (0, 0, -1),
            Direction::East => (1, 0, 0),
            Direction::South => (0, 0, 1),
            Direction::West => (-1, 0, 0),
            Direction::Up => (0, 1, 0),
            Direction::Down => (0, -1, 0),
        }
    }

    /// Single-letter code used in orientation codes.
    pub fn code(self) -> char {
        match self {
            Direction::North => 'n',
            Direction::East => 'e',
            Direction::South => 's',
            Direction::West => 'w',
            Direction::Up => 'u',
            Direction::Down => 'd',
        }
    }

    pub fn from_code(code: char) -> Option<Direction> {
        match code.to_ascii_lowercase() {
            'n' => Some(Direction::North),
            'e' => Some(Direction::East),
            's' => Some(Direction::South),
            'w' => Some(Direction::West),
            'u' => Some(Direction::Up),
            'd' => Some(Direction::Down),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ---------------------------------------------------------------------------
// ConnectorSet
// ---------------------------------------------------------------------------

/// A set of directions packed into six bits.
///
/// Iteration always yields directions in declaration order, and the
/// orientation code of a set is the concatenation of its direction codes in
/// that order (`{East, North}` has code `"ne"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct ConnectorSet(u8);

impl ConnectorSet {
    pub const EMPTY: ConnectorSet = ConnectorSet(0);
    pub const FULL: ConnectorSet = ConnectorSet(0b11_1111);

    pub fn from_bits(bits: u8) -> Self {
        Self(bits & Self::FULL.0)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn single(dir: Direction) -> Self {
        Self(1 << dir.index())
    }

    pub fn contains(self, dir: Direction) -> bool {
        self.0 & (1 << dir.index()) != 0
    }

    /// Insert a direction. Returns `true` if it was not already present.
    pub fn insert(&mut self, dir: Direction) -> bool {
        let had = self.contains(dir);
        self.0 |= 1 << dir.index();
        !had
    }

    /// Remove a direction. Returns `true` if it was present.
    pub fn remove(&mut self, dir: Direction) -> bool {
        let had = self.contains(dir);
        self.0 &= !(1 << dir.index());
        had
    }

    pub fn with(mut self, dir: Direction) -> Self {
        self.insert(dir);
        self
    }

    pub fn without(mut self, dir: Direction) -> Self {
        self.remove(dir);
        self
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn is_subset(self, other: ConnectorSet) -> bool {
        self.0 & !other.0 == 0
    }

    pub fn union(self, other: ConnectorSet) -> ConnectorSet {
        ConnectorSet(self.0 | other.0)
    }

    pub fn difference(self, other: ConnectorSet) -> ConnectorSet {
        ConnectorSet(self.0 & !other.0)
    }

    /// True for a two-direction set whose directions are perpendicular.
    pub fn is_bent(self) -> bool {
        let mut dirs = self.iter();
        match (dirs.next(), dirs.next(), dirs.next()) {
            (Some(a), Some(b), None) => a.is_adjacent(b),
            _ => false,
        }
    }

    /// Directions in declaration order.
    pub fn iter(self) -> impl Iterator<Item = Direction> {
        Direction::ALL.into_iter().filter(move |d| self.contains(*d))
    }

    /// Orientation code, e.g. `"ns"` or `"nesw"`. Empty set yields `""`.
    pub fn code(self) -> String {
        self.iter().map(Direction::code).collect()
    }

    /// Parse an orientation code. Order and case are ignored; unknown letters
    /// and repeated letters are rejected.
    pub fn from_code(code: &str) -> Option<ConnectorSet> {
        let mut set = ConnectorSet::EMPTY;
        for c in code.chars() {
            let dir = Direction::from_code(c)?;
            if !set.insert(dir) {
                return None;
            }
        }
        Some(set)
    }
}

impl FromIterator<Direction> for ConnectorSet {
    fn from_iter<I: IntoIterator<Item = Direction>>(iter: I) -> Self {
        let mut set = ConnectorSet::EMPTY;
        for dir in iter {
            set.insert(dir);
        }
        set
    }
}

impl fmt::Display for ConnectorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "-")
        } else {
            write!(f, "{}", self.code())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // -----------------------------------------------------------------------
    // Direction
    // -----------------------------------------------------------------------

    #[test]
    fn opposite_is_involution() {
        for d in Direction::ALL {
            assert_eq!(d.opposite().opposite(), d);
            assert_ne!(d.opposite(), d);
        }
    }

    #[test]
    fn rotate_cw_then_ccw_is_identity() {
        for d in Direction::ALL {
            assert_eq!(d.rotate_cw().rotate_ccw(), d);
            assert_eq!(d.rotate_ccw().rotate_cw(), d);
        }
    }

    #[test]
    fn four_clockwise_turns_return_home() {
        let mut d = Direction::North;
        for _ in 0..4 {
            d = d.rotate_cw();
        }
        assert_eq!(d, Direction::North);
        assert_eq!(Direction::North.rotate_cw(), Direction::East);
        assert_eq!(Direction::Up.rotate_cw(), Direction::Up);
    }

    #[test]
    fn every_direction_has_four_adjacent() {
        for d in Direction::ALL {
            let count = Direction::ALL.iter().filter(|o| d.is_adjacent(**o)).count();
            assert_eq!(count, 4, "{d:?}");
            assert!(!d.is_adjacent(d.opposite()));
        }
    }

    #[test]
    fn offsets_cancel_with_opposite() {
        for d in Direction::ALL {
            let (x, y, z) = d.offset();
            let (ox, oy, oz) = d.opposite().offset();
            assert_eq!((x + ox, y + oy, z + oz), (0, 0, 0));
            assert_eq!(x.abs() + y.abs() + z.abs(), 1);
        }
    }

    #[test]
    fn codes_round_trip() {
        for d in Direction::ALL {
            assert_eq!(Direction::from_code(d.code()), Some(d));
        }
        assert_eq!(Direction::from_code('x'), None);
        assert_eq!(Direction::from_code('N'), Some(Direction::North));
    }

    // -----------------------------------------------------------------------
    // ConnectorSet
    // -----------------------------------------------------------------------

    #[test]
    fn connector_set_code_is_declaration_ordered() {
        let set: ConnectorSet = [Direction::East, Direction::North].into_iter().collect();
        assert_eq!(set.code(), "ne");
        assert_eq!(ConnectorSet::from_code("en"), Some(set));
    }

    #[test]
    fn connector_set_rejects_bad_codes() {
        assert_eq!(ConnectorSet::from_code("nn"), None);
        assert_eq!(ConnectorSet::from_code("nq"), None);
        assert_eq!(ConnectorSet::from_code(""), Some(ConnectorSet::EMPTY));
    }

    #[test]
    fn connector_set_insert_remove() {
        let mut set = ConnectorSet::EMPTY;
        assert!(set.insert(Direction::Up));
        assert!(!set.insert(Direction::Up));
        assert_eq!(set.len(), 1);
        assert!(set.remove(Direction::Up));
        assert!(!set.remove(Direction::Up));
        assert!(set.is_empty());
    }

    #[test]
    fn bent_detection() {
        let straight = ConnectorSet::from_code("ns").unwrap();
        let bent = ConnectorSet::from_code("nu").unwrap();
        assert!(!straight.is_bent());
        assert!(bent.is_bent());
        assert!(!ConnectorSet::from_code("n").unwrap().is_bent());
        assert!(!ConnectorSet::from_code("neu").unwrap().is_bent());
    }

    #[test]
    fn subset_and_union() {
        let ns = ConnectorSet::from_code("ns").unwrap();
        let n = ConnectorSet::single(Direction::North);
        assert!(n.is_subset(ns));
        assert!(!ns.is_subset(n));
        assert_eq!(n.union(ConnectorSet::single(Direction::South)), ns);
        assert_eq!(ns.difference(n), ConnectorSet::single(Direction::South));
    }

    proptest! {
        #[test]
        fn code_round_trips_for_any_set(bits in 0u8..64) {
            let set = ConnectorSet::from_bits(bits);
            prop_assert_eq!(ConnectorSet::from_code(&set.code()), Some(set));
            prop_assert_eq!(set.iter().count(), set.len());
        }
    }
}
