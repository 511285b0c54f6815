//! Hand-landmark feature vectors
//!
//! A frame carries 21 `(x, y, z)` landmarks from the hand tracker. Features
//! are the landmarks relative to the wrist (landmark 0), flattened as
//! `x0, y0, z0, x1, ...`, which is the column order of the training CSV.

use crate::errors::{CoreError, Result};
use serde::{Deserialize, Serialize};

pub const LANDMARK_COUNT: usize = 21;
pub const FEATURE_COUNT: usize = LANDMARK_COUNT * 3;

const THUMB_IP: usize = 3;
const THUMB_TIP: usize = 4;
const INDEX_PIP: usize = 6;
const INDEX_TIP: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Wrist-relative, flattened feature vector for one frame
pub fn normalize_and_flatten(landmarks: &[Landmark]) -> Result<Vec<f32>> {
    if landmarks.len() != LANDMARK_COUNT {
        return Err(CoreError::InvalidInput(format!(
            "expected {} landmarks, got {}",
            LANDMARK_COUNT,
            landmarks.len()
        )));
    }

    let wrist = landmarks[0];
    Ok(landmarks
        .iter()
        .flat_map(|p| [p.x - wrist.x, p.y - wrist.y, p.z - wrist.z])
        .collect())
}

/// Open-hand gesture: index finger raised above its middle joint and the
/// thumb tip left of the thumb's last joint (image coordinates, y grows down)
pub fn is_hand_open(landmarks: &[Landmark]) -> Result<bool> {
    if landmarks.len() != LANDMARK_COUNT {
        return Err(CoreError::InvalidInput(format!(
            "expected {} landmarks, got {}",
            LANDMARK_COUNT,
            landmarks.len()
        )));
    }

    let index_raised = landmarks[INDEX_TIP].y < landmarks[INDEX_PIP].y;
    let thumb_out = landmarks[THUMB_TIP].x < landmarks[THUMB_IP].x;
    Ok(index_raised && thumb_out)
}

/// Regroup a flat `x, y, z, ...` row into landmarks
pub fn from_flat(values: &[f32]) -> Result<Vec<Landmark>> {
    if values.len() != FEATURE_COUNT {
        return Err(CoreError::InvalidInput(format!(
            "expected {} coordinates, got {}",
            FEATURE_COUNT,
            values.len()
        )));
    }

    Ok(values
        .chunks_exact(3)
        .map(|c| Landmark::new(c[0], c[1], c[2]))
        .collect())
}
