//! GLB 容器解析
//!
//! glTF 二进制容器：12 字节头（magic/version/length）+ 若干 chunk。
//! 这里只取第一个 JSON chunk，二进制 buffer 与本引擎无关。

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::{Result, VrmError};

/// "glTF"
const GLB_MAGIC: u32 = 0x4654_6C67;
/// "JSON"
const CHUNK_JSON: u32 = 0x4E4F_534A;

/// 字节流是否像 GLB 容器
pub fn is_glb(bytes: &[u8]) -> bool {
    bytes.len() >= 4 && bytes[..4] == GLB_MAGIC.to_le_bytes()
}

/// 从 GLB 容器中取出 JSON chunk
pub fn extract_json(bytes: &[u8]) -> Result<&[u8]> {
    let mut reader = Cursor::new(bytes);

    let magic = reader
        .read_u32::<LittleEndian>()
        .map_err(|e| VrmError::GlbParse(format!("Failed to read magic: {}", e)))?;
    if magic != GLB_MAGIC {
        return Err(VrmError::GlbParse("Invalid GLB magic".to_string()));
    }

    let version = reader
        .read_u32::<LittleEndian>()
        .map_err(|e| VrmError::GlbParse(format!("Failed to read version: {}", e)))?;
    if version != 2 {
        return Err(VrmError::GlbParse(format!(
            "Unsupported GLB version {}",
            version
        )));
    }

    let total_length = reader
        .read_u32::<LittleEndian>()
        .map_err(|e| VrmError::GlbParse(format!("Failed to read length: {}", e)))? as usize;
    if total_length > bytes.len() {
        return Err(VrmError::GlbParse(format!(
            "Declared length {} exceeds buffer size {}",
            total_length,
            bytes.len()
        )));
    }

    // 顺序扫描 chunk，返回第一个 JSON chunk
    loop {
        let chunk_length = match reader.read_u32::<LittleEndian>() {
            Ok(v) => v as usize,
            Err(_) => break,
        };
        let chunk_type = reader
            .read_u32::<LittleEndian>()
            .map_err(|e| VrmError::GlbParse(format!("Failed to read chunk type: {}", e)))?;

        let start = reader.position() as usize;
        let end = start
            .checked_add(chunk_length)
            .filter(|&e| e <= bytes.len())
            .ok_or_else(|| VrmError::GlbParse("Chunk overruns buffer".to_string()))?;

        if chunk_type == CHUNK_JSON {
            return Ok(&bytes[start..end]);
        }
        reader.set_position(end as u64);
    }

    Err(VrmError::GlbParse("No JSON chunk found".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_u32(buf: &mut Vec<u8>, v: u32) {
        buf.extend_from_slice(&v.to_le_bytes());
    }

    fn make_glb(json: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        push_u32(&mut buf, GLB_MAGIC);
        push_u32(&mut buf, 2);
        push_u32(&mut buf, (12 + 8 + json.len()) as u32);
        push_u32(&mut buf, json.len() as u32);
        push_u32(&mut buf, CHUNK_JSON);
        buf.extend_from_slice(json);
        buf
    }

    #[test]
    fn json_chunk_round_trip() {
        let glb = make_glb(br#"{"nodes":[]}"#);
        assert!(is_glb(&glb));
        assert_eq!(extract_json(&glb).unwrap(), br#"{"nodes":[]}"#);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut glb = make_glb(b"{}");
        glb[0] = b'x';
        assert!(!is_glb(&glb));
        assert!(matches!(extract_json(&glb), Err(VrmError::GlbParse(_))));
    }

    #[test]
    fn wrong_version_is_rejected() {
        let mut glb = make_glb(b"{}");
        glb[4] = 1;
        assert!(matches!(extract_json(&glb), Err(VrmError::GlbParse(_))));
    }

    #[test]
    fn truncated_chunk_is_rejected() {
        let mut glb = make_glb(b"{}");
        // 把 chunk 长度改成越界值
        glb[12] = 0xFF;
        assert!(matches!(extract_json(&glb), Err(VrmError::GlbParse(_))));
    }
}
