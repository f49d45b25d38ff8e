// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! In-memory keypoint table: frame → person → keypoint list.
//!
//! This is the artifact that round-trips through the keypoint CSV. Frames and
//! persons are kept in ascending index order; each person keeps its keypoints
//! in the order they were recorded, which may be sparse.

use std::collections::BTreeMap;

/// A single detected anatomical landmark.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    /// COCO keypoint index (0 = nose … 16 = right ankle).
    pub index: usize,
    /// Pixel column.
    pub x: i32,
    /// Pixel row.
    pub y: i32,
    /// Detection confidence.
    pub prob: f32,
}

impl Keypoint {
    /// Create a keypoint.
    #[must_use]
    pub const fn new(index: usize, x: i32, y: i32, prob: f32) -> Self {
        Self { index, x, y, prob }
    }
}

/// One detected person's keypoints within a frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Person {
    keypoints: Vec<Keypoint>,
}

impl Person {
    /// Create an empty person.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            keypoints: Vec::new(),
        }
    }

    /// Number of stored keypoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    /// Whether no keypoints are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }

    /// Keypoint stored at `position` in the sequence.
    #[must_use]
    pub fn get(&self, position: usize) -> Option<&Keypoint> {
        self.keypoints.get(position)
    }

    /// Keypoint whose COCO index is `index`, wherever it is stored.
    #[must_use]
    pub fn find(&self, index: usize) -> Option<&Keypoint> {
        self.keypoints.iter().find(|kp| kp.index == index)
    }

    /// All keypoints in stored order.
    #[must_use]
    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    /// Add a keypoint. A keypoint with the same index replaces the earlier one in place.
    pub fn insert(&mut self, keypoint: Keypoint) {
        match self.keypoints.iter_mut().find(|kp| kp.index == keypoint.index) {
            Some(existing) => *existing = keypoint,
            None => self.keypoints.push(keypoint),
        }
    }
}

impl FromIterator<Keypoint> for Person {
    fn from_iter<I: IntoIterator<Item = Keypoint>>(iter: I) -> Self {
        let mut person = Self::new();
        for keypoint in iter {
            person.insert(keypoint);
        }
        person
    }
}

/// All persons detected in one frame, keyed by person index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameEntry {
    persons: BTreeMap<usize, Person>,
}

/// Shared empty entry for frames absent from a table.
pub static EMPTY_FRAME: FrameEntry = FrameEntry::new();

impl FrameEntry {
    /// Create an entry with no persons.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            persons: BTreeMap::new(),
        }
    }

    /// Number of persons.
    #[must_use]
    pub fn len(&self) -> usize {
        self.persons.len()
    }

    /// Whether the entry has no persons.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.persons.is_empty()
    }

    /// Whether at least one person has a keypoint.
    #[must_use]
    pub fn has_detections(&self) -> bool {
        self.persons.values().any(|person| !person.is_empty())
    }

    /// Person by index.
    #[must_use]
    pub fn person(&self, index: usize) -> Option<&Person> {
        self.persons.get(&index)
    }

    /// Persons in ascending index order.
    pub fn persons(&self) -> impl Iterator<Item = (usize, &Person)> {
        self.persons.iter().map(|(idx, person)| (*idx, person))
    }

    /// Mutable access to a person, created empty if absent.
    pub fn person_mut(&mut self, index: usize) -> &mut Person {
        self.persons.entry(index).or_default()
    }

    /// Replace a whole person.
    pub fn set_person(&mut self, index: usize, person: Person) {
        self.persons.insert(index, person);
    }
}

/// Sparse mapping from frame index to that frame's detections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeypointTable {
    frames: BTreeMap<usize, FrameEntry>,
}

impl KeypointTable {
    /// Create an empty table.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            frames: BTreeMap::new(),
        }
    }

    /// Number of frames present.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether no frames are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Entry for a frame, if present.
    #[must_use]
    pub fn frame(&self, index: usize) -> Option<&FrameEntry> {
        self.frames.get(&index)
    }

    /// Entry for a frame, or the shared empty entry when absent.
    #[must_use]
    pub fn frame_or_empty(&self, index: usize) -> &FrameEntry {
        self.frames.get(&index).unwrap_or(&EMPTY_FRAME)
    }

    /// Frames in ascending index order.
    pub fn frames(&self) -> impl Iterator<Item = (usize, &FrameEntry)> {
        self.frames.iter().map(|(idx, entry)| (*idx, entry))
    }

    /// Replace a whole frame entry.
    pub fn set_frame(&mut self, index: usize, entry: FrameEntry) {
        self.frames.insert(index, entry);
    }

    /// Record one keypoint; a duplicate (frame, person, keypoint) triple overwrites the earlier value.
    pub fn insert(&mut self, frame: usize, person: usize, keypoint: Keypoint) {
        self.frames
            .entry(frame)
            .or_default()
            .person_mut(person)
            .insert(keypoint);
    }

    /// Total number of keypoints across all frames and persons.
    #[must_use]
    pub fn keypoint_count(&self) -> usize {
        self.frames
            .values()
            .flat_map(|entry| entry.persons.values())
            .map(Person::len)
            .sum()
    }

    /// Every (frame, person, keypoint) record in serialization order.
    pub fn records(&self) -> impl Iterator<Item = (usize, usize, &Keypoint)> {
        self.frames.iter().flat_map(|(frame, entry)| {
            entry.persons.iter().flat_map(move |(person, p)| {
                p.keypoints.iter().map(move |kp| (*frame, *person, kp))
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_groups_by_frame_and_person() {
        let mut table = KeypointTable::new();
        table.insert(7, 1, Keypoint::new(5, 10, 20, 0.9));
        table.insert(3, 0, Keypoint::new(5, 100, 200, 0.9));
        table.insert(7, 0, Keypoint::new(6, 11, 21, 0.8));
        table.insert(3, 0, Keypoint::new(6, 150, 200, 0.8));

        assert_eq!(table.len(), 2);
        assert_eq!(table.keypoint_count(), 4);
        let frames: Vec<usize> = table.frames().map(|(idx, _)| idx).collect();
        assert_eq!(frames, vec![3, 7]);

        let person = table.frame(3).unwrap().person(0).unwrap();
        assert_eq!(person.len(), 2);
        assert_eq!(person.get(1).unwrap().x, 150);
    }

    #[test]
    fn test_duplicate_triple_last_wins() {
        let mut table = KeypointTable::new();
        table.insert(0, 0, Keypoint::new(5, 1, 1, 0.1));
        table.insert(0, 0, Keypoint::new(6, 2, 2, 0.2));
        table.insert(0, 0, Keypoint::new(5, 9, 9, 0.9));

        let person = table.frame(0).unwrap().person(0).unwrap();
        assert_eq!(person.len(), 2);
        assert_eq!(person.get(0), Some(&Keypoint::new(5, 9, 9, 0.9)));
    }

    #[test]
    fn test_absent_and_empty_frames_have_no_detections() {
        let mut table = KeypointTable::new();
        table.set_frame(4, FrameEntry::new());
        let mut entry = FrameEntry::new();
        entry.set_person(0, Person::new());
        table.set_frame(5, entry);

        assert!(!table.frame_or_empty(2).has_detections());
        assert!(!table.frame_or_empty(4).has_detections());
        assert!(!table.frame_or_empty(5).has_detections());
    }

    #[test]
    fn test_records_order() {
        let mut table = KeypointTable::new();
        table.insert(2, 1, Keypoint::new(0, 0, 0, 0.5));
        table.insert(1, 0, Keypoint::new(3, 0, 0, 0.5));
        table.insert(1, 0, Keypoint::new(1, 0, 0, 0.5));
        let order: Vec<(usize, usize, usize)> =
            table.records().map(|(f, p, kp)| (f, p, kp.index)).collect();
        assert_eq!(order, vec![(1, 0, 3), (1, 0, 1), (2, 1, 0)]);
    }

    #[test]
    fn test_sparse_person_lookup() {
        let person: Person = [Keypoint::new(5, 1, 1, 0.9), Keypoint::new(11, 2, 2, 0.9)]
            .into_iter()
            .collect();
        assert_eq!(person.get(1).map(|kp| kp.index), Some(11));
        assert_eq!(person.find(11).map(|kp| kp.x), Some(2));
        assert!(person.find(6).is_none());
        assert_eq!(person.get(0).map(|kp| kp.index), Some(5));
    }
}
