//! Human-readable summaries of exported files

use anyhow::{Result, bail};

use wow_common::formats::m2::M2_MAGIC;
use wow_common::formats::skin::SKIN_MAGIC;
use wow_common::formats::wmo_group::MOGP;
use wow_common::formats::{ChunkReader, WmoGroup};

/// One line per chunk (indented when nested), or a header summary for
/// M2 and skin files
pub fn describe(bytes: &[u8]) -> Result<Vec<String>> {
    match bytes.get(..4) {
        Some(magic) if magic == M2_MAGIC => describe_m2(bytes),
        Some(magic) if magic == SKIN_MAGIC => describe_skin(bytes),
        _ => {
            let mut lines = Vec::new();
            describe_chunks(bytes, 0, &mut lines)?;
            Ok(lines)
        }
    }
}

fn describe_chunks(bytes: &[u8], depth: usize, lines: &mut Vec<String>) -> Result<()> {
    for chunk in ChunkReader::new(bytes) {
        let (tag, payload) = chunk?;
        lines.push(format!("{:indent$}{} ({} bytes)", "", tag, payload.len(), indent = depth * 2));
        if tag == MOGP {
            if payload.len() < WmoGroup::HEADER_SIZE {
                bail!("MOGP payload of {} bytes is shorter than its header", payload.len());
            }
            describe_chunks(&payload[WmoGroup::HEADER_SIZE..], depth + 1, lines)?;
        }
    }
    Ok(())
}

fn describe_m2(bytes: &[u8]) -> Result<Vec<String>> {
    Ok(vec![
        format!("MD20 version {}", read_u32(bytes, 4)?),
        format!("vertices: {}", read_u32(bytes, 60)?),
        format!("skin profiles: {}", read_u32(bytes, 68)?),
        format!("textures: {}", read_u32(bytes, 80)?),
    ])
}

fn describe_skin(bytes: &[u8]) -> Result<Vec<String>> {
    Ok(vec![
        "SKIN".to_string(),
        format!("vertices: {}", read_u32(bytes, 4)?),
        format!("indices: {}", read_u32(bytes, 12)?),
        format!("submeshes: {}", read_u32(bytes, 28)?),
        format!("texture units: {}", read_u32(bytes, 36)?),
        format!("bone count max: {}", read_u32(bytes, 44)?),
    ])
}

fn read_u32(bytes: &[u8], offset: usize) -> Result<u32> {
    match bytes.get(offset..offset + 4) {
        Some(&[a, b, c, d]) => Ok(u32::from_le_bytes([a, b, c, d])),
        _ => bail!("file truncated at offset {} ({} bytes)", offset, bytes.len()),
    }
}
