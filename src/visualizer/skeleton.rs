// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// COCO-Pose keypoint names, indexed by keypoint index.
pub const KEYPOINT_NAMES: [&str; 17] = [
    "nose",
    "left_eye",
    "right_eye",
    "left_ear",
    "right_ear",
    "left_shoulder",
    "right_shoulder",
    "left_elbow",
    "right_elbow",
    "left_wrist",
    "right_wrist",
    "left_hip",
    "right_hip",
    "left_knee",
    "right_knee",
    "left_ankle",
    "right_ankle",
];

/// Default bones drawn between keypoint indices: torso, arms and legs, no head edges.
pub const COCO_PAIRS: [(usize, usize); 12] = [
    (5, 6),   // left shoulder to right shoulder
    (5, 7),   // left shoulder to left elbow
    (6, 8),   // right shoulder to right elbow
    (7, 9),   // left elbow to left wrist
    (8, 10),  // right elbow to right wrist
    (5, 11),  // left shoulder to left hip
    (6, 12),  // right shoulder to right hip
    (11, 12), // left hip to right hip
    (11, 13), // left hip to left knee
    (12, 14), // right hip to right knee
    (13, 15), // left knee to left ankle
    (14, 16), // right knee to right ankle
];
