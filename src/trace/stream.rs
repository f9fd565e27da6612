//! 文本 trace 输出流

use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::TraceError;

/// 一行一个事件的文本输出。回调里无法返回错误，写失败时记下第一个错误，
/// 在 `finish` 时上报。
#[derive(Debug)]
pub struct AsciiTraceStream {
    path: PathBuf,
    out: BufWriter<File>,
    lines: u64,
    error: Option<io::Error>,
}

impl AsciiTraceStream {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, TraceError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|source| TraceError::Create {
            path: path.clone(),
            source,
        })?;
        Ok(Self {
            path,
            out: BufWriter::new(file),
            lines: 0,
            error: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lines(&self) -> u64 {
        self.lines
    }

    pub fn write_line(&mut self, args: fmt::Arguments<'_>) {
        if self.error.is_some() {
            return;
        }
        let res = self
            .out
            .write_fmt(args)
            .and_then(|()| self.out.write_all(b"\n"));
        match res {
            Ok(()) => self.lines += 1,
            Err(e) => self.error = Some(e),
        }
    }

    /// 刷新并返回写入的行数。
    pub fn finish(&mut self) -> Result<u64, TraceError> {
        if let Some(source) = self.error.take() {
            return Err(TraceError::Write {
                path: self.path.clone(),
                source,
            });
        }
        self.out.flush().map_err(|source| TraceError::Write {
            path: self.path.clone(),
            source,
        })?;
        Ok(self.lines)
    }
}
