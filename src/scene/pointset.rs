// src/scene/pointset.rs
//
// Point sample files: a headerless array of fixed-size records. Scenes are
// built offline from these; the renderer never touches them.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use bytemuck::{Pod, Zeroable};

use crate::config;

/// One sample: integer scene-space position plus a packed 32-bit color.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, PartialEq, Eq)]
pub struct Point {
    pub pos: [i32; 3],
    pub color: u32,
}

/// Append-only point file writer. Records are buffered and written out in
/// 64 Ki batches; whatever remains is flushed on close (or drop).
pub struct PointWriter {
    file: File,
    buffer: Vec<Point>,
}

impl PointWriter {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("could not create point file {}", path.display()))?;
        Ok(Self {
            file,
            buffer: Vec::with_capacity(config::POINT_BUFFER_LEN),
        })
    }

    pub fn add(&mut self, p: Point) -> Result<()> {
        self.buffer.push(p);
        if self.buffer.len() >= config::POINT_BUFFER_LEN {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.file
            .write_all(bytemuck::cast_slice(&self.buffer))
            .context("point file write failed")?;
        self.buffer.clear();
        Ok(())
    }

    /// Flush the tail and report any error. Dropping the writer flushes too,
    /// but silently.
    pub fn close(mut self) -> Result<()> {
        self.flush()
    }
}

impl Drop for PointWriter {
    fn drop(&mut self) {
        if !self.buffer.is_empty() {
            let _ = self.file.write_all(bytemuck::cast_slice(&self.buffer));
        }
    }
}

/// Read-only view of a point file, pulled into memory whole.
pub struct PointSet {
    points: Vec<Point>,
}

impl PointSet {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("could not read point file {}", path.display()))?;
        let points: &[Point] = bytemuck::try_cast_slice(&bytes).map_err(|e| {
            anyhow!(
                "{} is not a whole number of point records: {e:?}",
                path.display()
            )
        })?;
        Ok(Self {
            points: points.to_vec(),
        })
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
