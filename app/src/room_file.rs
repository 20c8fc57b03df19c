//! Loads the room definition (tutor roster plus study material) from a JSON
//! file passed on the command line.

use std::path::Path;

use anyhow::{Context, Result};
use studyhall_engine::{StudyMaterial, Tutor};

#[derive(Debug, serde::Deserialize)]
pub struct RoomFile {
    pub tutors: Vec<Tutor>,
    pub material: StudyMaterial,
}

pub fn load_room(path: &Path) -> Result<RoomFile> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read room file {:?}", path))?;
    let room: RoomFile = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse room file {:?}", path))?;
    anyhow::ensure!(
        (3..=6).contains(&room.tutors.len()),
        "room must define between 3 and 6 tutors, found {}",
        room.tutors.len()
    );
    Ok(room)
}
