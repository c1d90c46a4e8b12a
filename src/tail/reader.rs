//! 增量读取器
//!
//! 同步实现，由 [`super::TailSession`] 放到 `spawn_blocking` 中执行。

use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use file_id::FileId;

use super::{TailEvent, TruncateReason, Truncation};
use crate::config::display_name;
use crate::error::{Error, Result};
use crate::protocol::read_failed_message;

/// 单次 check 最多读取的字节数，剩余部分由下一次 check 继续
pub const MAX_READ_BYTES: u64 = 4 * 1024 * 1024;

/// 单个日志文件的读取状态
#[derive(Debug)]
pub struct Tailer {
    /// 绝对路径
    path: PathBuf,
    /// 已投递到的字节位置
    offset: u64,
    /// 上次观察到的文件标识
    identity: Option<FileId>,
    /// 单次读取上限
    max_read: u64,
    /// 上次 check 是否因读取上限留有未读内容
    backlog: bool,
}

/// 同一个打开句柄上的文件状态
struct Snapshot {
    file: File,
    size: u64,
    identity: Option<FileId>,
}

impl Tailer {
    /// 打开日志文件，偏移量定位到当前末尾（只推送之后追加的内容）
    pub fn open(path: &Path) -> Result<Self> {
        let path = match fs::canonicalize(path) {
            Ok(p) => p,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::FileNotFound(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };

        if path.is_dir() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} 是目录", display_name(&path)),
            )));
        }

        let (offset, identity) = match open_snapshot(&path) {
            Ok(Some(snapshot)) => (snapshot.size, snapshot.identity),
            // 打开期间被替换：先按大小定位，标识由下一次 check 补上
            Ok(None) => (fs::metadata(&path)?.len(), None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::FileNotFound(path));
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            offset,
            identity,
            max_read: MAX_READ_BYTES,
            backlog: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// 上次 check 后是否还有未读完的内容
    pub fn has_backlog(&self) -> bool {
        self.backlog
    }

    /// 检查文件变化并读取新增内容
    ///
    /// 返回的事件按发生顺序排列：截断（如有）在内容之前。
    /// 任何读取失败都不会移动偏移量，下一次 check 从同一位置重试。
    pub fn check(&mut self) -> Vec<TailEvent> {
        let mut events = Vec::new();
        self.backlog = false;

        let Snapshot {
            mut file,
            size,
            identity,
        } = match open_snapshot(&self.path) {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                tracing::trace!("File replaced while opening, retry later: {:?}", self.path);
                return events;
            }
            Err(e) => {
                tracing::error!("读取日志文件失败: {:?}: {}", self.path, e);
                events.push(TailEvent::TailError {
                    message: read_failed_message(&e.to_string()),
                });
                return events;
            }
        };

        let replaced = matches!(
            (self.identity.as_ref(), identity.as_ref()),
            (Some(old), Some(new)) if old != new
        );

        if replaced || size < self.offset {
            let reason = if replaced {
                TruncateReason::Replaced
            } else {
                TruncateReason::Shrunk
            };
            tracing::warn!(
                "⚠️ 日志文件被截断，重新从头读取: {:?} (offset={}, size={}, reason={:?})",
                self.path,
                self.offset,
                size,
                reason
            );
            events.push(TailEvent::Truncated(Truncation {
                previous_offset: self.offset,
                reason,
            }));
            self.offset = 0;
        }

        if identity.is_some() {
            self.identity = identity;
        }

        if size == self.offset {
            tracing::trace!("No new content: {:?} (offset={})", self.path, self.offset);
            return events;
        }

        let end = size.min(self.offset.saturating_add(self.max_read));
        match read_range(&mut file, self.offset, end) {
            Ok(mut bytes) => {
                if end < size {
                    // 未读完时截到最后一个换行，避免拆开多字节字符
                    if let Some(pos) = bytes.iter().rposition(|b| *b == b'\n') {
                        bytes.truncate(pos + 1);
                    }
                }
                let new_offset = self.offset + bytes.len() as u64;
                tracing::debug!(
                    "📝 Read {} bytes from {:?} ({} → {}, size={})",
                    bytes.len(),
                    self.path.file_name().unwrap_or_default(),
                    self.offset,
                    new_offset,
                    size
                );
                self.offset = new_offset;
                self.backlog = new_offset < size;
                events.push(TailEvent::ContentAppended {
                    content: String::from_utf8_lossy(&bytes).into_owned(),
                });
            }
            Err(e) => {
                tracing::error!("读取日志文件失败: {:?}: {}", self.path, e);
                events.push(TailEvent::TailError {
                    message: read_failed_message(&e.to_string()),
                });
            }
        }

        events
    }
}

/// 打开文件，从同一句柄取大小和标识
#[cfg(unix)]
fn open_snapshot(path: &Path) -> io::Result<Option<Snapshot>> {
    use std::os::unix::fs::MetadataExt;

    let file = File::open(path)?;
    let metadata = file.metadata()?;
    Ok(Some(Snapshot {
        size: metadata.len(),
        identity: Some(FileId::new_inode(metadata.dev(), metadata.ino())),
        file,
    }))
}

/// 打开文件，打开前后各取一次路径标识；不一致说明期间被替换，返回 None
#[cfg(not(unix))]
fn open_snapshot(path: &Path) -> io::Result<Option<Snapshot>> {
    let before = file_id::get_file_id(path).ok();
    let file = File::open(path)?;
    let metadata = file.metadata()?;
    let after = file_id::get_file_id(path).ok();
    if before != after {
        return Ok(None);
    }
    Ok(Some(Snapshot {
        size: metadata.len(),
        identity: after,
        file,
    }))
}

/// 读取 `[start, end)` 区间
fn read_range(file: &mut File, start: u64, end: u64) -> io::Result<Vec<u8>> {
    let len = usize::try_from(end - start)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "新增内容过大"))?;

    let mut buf = vec![0u8; len];
    file.seek(SeekFrom::Start(start))?;
    file.read_exact(&mut buf)?;
    Ok(buf)
}
