//! 构造文档的原生格式（.zsph）
//!
//! 布局：
//! - 0..4   魔数 `ZSPH`
//! - 4..8   格式版本（小端 u32）
//! - 8..12  标志位，目前恒为 0
//! - 12..16 载荷字节数（小端 u32）
//! - 16..   Zstd 压缩的 MessagePack：元数据、内核参数、操作码脚本
//!
//! 读取时只信任实际读到的字节，头部声明的长度超过文件剩余部分即视为损坏。

use crate::document::{ConstructionDocument, DocumentMetadata};
use crate::error::FileError;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use zsphere_core::config::KernelConfig;
use zsphere_core::script::ScriptEntry;

/// 文件魔数 "ZSPH"
const MAGIC: &[u8; 4] = b"ZSPH";

/// 当前文件格式版本
const FORMAT_VERSION: u32 = 1;

/// 文件头字节数
const HEADER_SIZE: u64 = 16;

/// Zstd 压缩级别
const COMPRESSION_LEVEL: i32 = 3;

/// 定长文件头
#[derive(Debug)]
struct FileHeader {
    magic: [u8; 4],
    version: u32,
    /// 标志位（预留）
    flags: u32,
    /// 载荷（压缩后）字节数
    compressed_size: u32,
}

impl FileHeader {
    fn new(compressed_size: u32) -> Self {
        Self {
            magic: *MAGIC,
            version: FORMAT_VERSION,
            flags: 0,
            compressed_size,
        }
    }

    fn write(&self, writer: &mut impl Write) -> Result<(), std::io::Error> {
        writer.write_all(&self.magic)?;
        writer.write_all(&self.version.to_le_bytes())?;
        writer.write_all(&self.flags.to_le_bytes())?;
        writer.write_all(&self.compressed_size.to_le_bytes())?;
        Ok(())
    }

    fn read(reader: &mut impl Read) -> Result<Self, FileError> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;

        if &magic != MAGIC {
            return Err(FileError::InvalidFormat(
                "Invalid magic number, not a ZSphere file".to_string(),
            ));
        }

        let mut buf = [0u8; 4];

        reader.read_exact(&mut buf)?;
        let version = u32::from_le_bytes(buf);

        reader.read_exact(&mut buf)?;
        let flags = u32::from_le_bytes(buf);

        reader.read_exact(&mut buf)?;
        let compressed_size = u32::from_le_bytes(buf);

        Ok(Self {
            magic,
            version,
            flags,
            compressed_size,
        })
    }
}

/// 载荷：文档去掉运行时状态后的可序列化部分
#[derive(Debug, Serialize, Deserialize)]
struct FileContent {
    metadata: DocumentMetadata,
    config: KernelConfig,
    script: Vec<ScriptEntry>,
}

/// 编码为完整的文件字节（含文件头），`check` 子命令也用它做内存往返
pub fn to_bytes(document: &ConstructionDocument) -> Result<Vec<u8>, FileError> {
    let content = FileContent {
        metadata: document.metadata.clone(),
        config: document.config.clone(),
        script: document.script.clone(),
    };

    let msgpack_data = rmp_serde::to_vec(&content)?;
    let compressed_data = zstd::encode_all(msgpack_data.as_slice(), COMPRESSION_LEVEL)?;
    let compressed_size = u32::try_from(compressed_data.len()).map_err(|_| {
        FileError::InvalidFormat(format!(
            "Compressed payload of {} bytes exceeds the header limit",
            compressed_data.len()
        ))
    })?;

    let mut bytes = Vec::with_capacity(16 + compressed_data.len());
    FileHeader::new(compressed_size).write(&mut bytes)?;
    bytes.extend_from_slice(&compressed_data);
    Ok(bytes)
}

/// 从任意读取器解码文档
///
/// 文件头里的长度不可信：按实际读到的字节增长缓冲区，不足时报格式错误。
pub fn read_from(reader: &mut impl Read) -> Result<ConstructionDocument, FileError> {
    let header = FileHeader::read(reader)?;
    read_payload(reader, &header, None)
}

fn read_payload(
    reader: &mut impl Read,
    header: &FileHeader,
    available: Option<u64>,
) -> Result<ConstructionDocument, FileError> {
    if header.version > FORMAT_VERSION {
        return Err(FileError::UnsupportedVersion(format!(
            "File version {} is newer than supported version {}",
            header.version, FORMAT_VERSION
        )));
    }

    let expected = u64::from(header.compressed_size);
    if let Some(available) = available {
        if expected > available {
            return Err(FileError::InvalidFormat(format!(
                "Header claims {expected} payload bytes but only {available} remain"
            )));
        }
    }

    let mut compressed_data = Vec::new();
    reader.take(expected).read_to_end(&mut compressed_data)?;
    if (compressed_data.len() as u64) < expected {
        return Err(FileError::InvalidFormat(format!(
            "Truncated payload: expected {expected} bytes, found {}",
            compressed_data.len()
        )));
    }

    let msgpack_data = zstd::decode_all(compressed_data.as_slice())?;
    let content: FileContent = rmp_serde::from_slice(&msgpack_data)?;

    Ok(ConstructionDocument {
        metadata: content.metadata,
        config: content.config,
        script: content.script,
    })
}

/// 保存文档到文件
pub fn save(document: &ConstructionDocument, path: &Path) -> Result<(), FileError> {
    let bytes = to_bytes(document)?;

    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(&bytes)?;
    writer.flush()?;

    tracing::info!(
        "Saved {} script entries to {} ({} bytes)",
        document.script.len(),
        path.display(),
        bytes.len()
    );

    Ok(())
}

/// 从文件加载文档，载荷长度先与文件实际大小比对
pub fn load(path: &Path) -> Result<ConstructionDocument, FileError> {
    let file = File::open(path)?;
    let file_len = file.metadata()?.len();
    let mut reader = BufReader::new(file);
    let header = FileHeader::read(&mut reader)?;
    let available = file_len.saturating_sub(HEADER_SIZE);
    let document = read_payload(&mut reader, &header, Some(available))?;

    tracing::info!(
        "Loaded {} script entries from {}",
        document.script.len(),
        path.display()
    );

    Ok(document)
}
