//! 结果台账 - 业务能力层
//!
//! 只负责"写台账 / 读台账"能力，不关心流程

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{CdaError, Result};
use crate::models::ledger_entry::strip_text_marker;
use crate::models::{CertificateId, EntryStatus, LedgerEntry};

/// 台账表头
pub const LEDGER_HEADER: [&str; 4] = ["CDA", "Status", "Timestamp", "Message"];

/// 结果台账
///
/// 职责：
/// - 每个 CDA 的最终结果追加一行，从不改写已有行
/// - 每次追加后落盘，进程中途崩溃时台账与实际处理情况一致
pub struct ResultLedger {
    path: PathBuf,
    writer: csv::Writer<File>,
    rows_written: usize,
}

impl ResultLedger {
    /// 新运行使用的台账路径：`<log_dir>/log_<时间戳>.csv`
    pub fn fresh_path(log_dir: &Path) -> PathBuf {
        let timestamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S");
        log_dir.join(format!("log_{}.csv", timestamp))
    }

    /// 打开本次运行的台账
    ///
    /// - 非续跑：新建（或清空）文件并写入表头
    /// - 续跑：追加模式打开，只有文件为空时才写表头
    pub fn open_for_run(path: &Path, continuation: bool) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| CdaError::ledger(path, e))?;
        }

        // 续跑时上一份台账可能缺少末尾换行（被编辑器另存或写入中断）
        let needs_terminator = continuation && !ends_with_newline(path)?;

        let mut file = if continuation {
            OpenOptions::new().create(true).append(true).open(path)
        } else {
            OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(path)
        }
        .map_err(|e| CdaError::ledger(path, e))?;

        let is_empty = file
            .metadata()
            .map_err(|e| CdaError::ledger(path, e))?
            .len()
            == 0;

        if !is_empty && needs_terminator {
            file.write_all(b"\n")
                .map_err(|e| CdaError::ledger(path, e))?;
            debug!("已补齐台账末尾换行: {}", path.display());
        }

        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        let mut ledger = Self {
            path: path.to_path_buf(),
            writer,
            rows_written: 0,
        };

        if is_empty {
            ledger.write_row(&LEDGER_HEADER)?;
            debug!("台账表头已写入: {}", path.display());
        } else {
            info!("📜 续跑模式，追加到已有台账: {}", path.display());
        }

        Ok(ledger)
    }

    /// 追加一条记录，返回前已落盘
    pub fn append(&mut self, entry: &LedgerEntry) -> Result<()> {
        self.write_row(&entry.to_record())?;
        self.rows_written += 1;
        debug!(
            "台账追加: {} | {} | 共 {} 行",
            entry.identifier, entry.status, self.rows_written
        );
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 本次运行写入的记录数（不含表头）
    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// 关闭文件句柄（归档移动前调用），返回台账路径
    pub fn close(mut self) -> Result<PathBuf> {
        self.writer
            .flush()
            .map_err(|e| CdaError::ledger(&self.path, e))?;
        Ok(self.path)
    }

    fn write_row<I, T>(&mut self, row: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        self.writer
            .write_record(row)
            .map_err(|e| CdaError::ledger(&self.path, e))?;
        self.writer
            .flush()
            .map_err(|e| CdaError::ledger(&self.path, e))?;
        self.writer
            .get_ref()
            .sync_data()
            .map_err(|e| CdaError::ledger(&self.path, e))?;
        Ok(())
    }
}

/// 文件为空、不存在或以 `\n` 结尾时返回 true
fn ends_with_newline(path: &Path) -> Result<bool> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(CdaError::ledger(path, e)),
    };

    let len = file.metadata().map_err(|e| CdaError::ledger(path, e))?.len();
    if len == 0 {
        return Ok(true);
    }

    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))
        .and_then(|_| file.read_exact(&mut last))
        .map_err(|e| CdaError::ledger(path, e))?;
    Ok(last[0] == b'\n')
}

/// 台账中读回的一行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerRow {
    pub identifier: String,
    pub status: EntryStatus,
    pub timestamp: String,
    pub message: String,
}

/// 读取台账所有记录（标识已去掉文本前缀，状态无法识别的行被忽略）
pub fn read_ledger(path: &Path) -> Result<Vec<LedgerRow>> {
    let file = File::open(path).map_err(|e| CdaError::ledger(path, e))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| CdaError::ledger(path, e))?;
        let Some(status) = record.get(1).and_then(|s| s.parse::<EntryStatus>().ok()) else {
            continue;
        };
        rows.push(LedgerRow {
            identifier: strip_text_marker(record.get(0).unwrap_or_default()).to_string(),
            status,
            timestamp: record.get(2).unwrap_or_default().to_string(),
            message: record.get(3).unwrap_or_default().to_string(),
        });
    }
    Ok(rows)
}

/// 从已有台账计算续跑时需要跳过的 CDA
///
/// 文件不存在不是错误，返回空集合。同一编号只要有一行成功即视为已完成。
pub fn compute_resume_set(path: &Path) -> Result<HashSet<CertificateId>> {
    match fs::metadata(path) {
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!("未找到历史台账 {}，从头开始", path.display());
            return Ok(HashSet::new());
        }
        Err(e) => return Err(CdaError::ledger(path, e)),
    }

    let resume: HashSet<CertificateId> = read_ledger(path)?
        .into_iter()
        .filter(|row| row.status == EntryStatus::Success)
        .filter_map(|row| CertificateId::parse(&row.identifier))
        .collect();

    info!("✓ 历史台账中已有 {} 个成功的 CDA", resume.len());
    Ok(resume)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> CertificateId {
        CertificateId::parse(raw).unwrap()
    }

    #[test]
    fn test_fresh_ledger_writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("ledger.csv");

        let mut ledger = ResultLedger::open_for_run(&path, false).unwrap();
        ledger.append(&LedgerEntry::success(id("1001"), 1)).unwrap();
        ledger
            .append(&LedgerEntry::failed(id("1002"), "timeout\nline two"))
            .unwrap();
        assert_eq!(ledger.rows_written(), 2);
        let path = ledger.close().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("CDA,Status,Timestamp,Message\n'1001,Success,"));

        let rows = read_ledger(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].identifier, "1002");
        assert_eq!(rows[1].status, EntryStatus::Failed);
        assert_eq!(rows[1].message, "timeout\nline two");
    }

    #[test]
    fn test_rows_are_durable_before_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.csv");

        let mut ledger = ResultLedger::open_for_run(&path, false).unwrap();
        ledger.append(&LedgerEntry::success(id("1001"), 1)).unwrap();

        // 句柄仍然打开时其他读者已能看到该行
        let rows = read_ledger(&path).unwrap();
        assert_eq!(rows.len(), 1);
        drop(ledger);
    }

    #[test]
    fn test_fresh_run_truncates_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.csv");
        fs::write(&path, "CDA,Status,Timestamp,Message\n'9,Success,t,m\n").unwrap();

        let ledger = ResultLedger::open_for_run(&path, false).unwrap();
        ledger.close().unwrap();
        assert!(read_ledger(&path).unwrap().is_empty());
    }

    #[test]
    fn test_continuation_appends_without_second_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.csv");

        let mut first = ResultLedger::open_for_run(&path, true).unwrap();
        first.append(&LedgerEntry::success(id("A"), 1)).unwrap();
        first.close().unwrap();

        let mut second = ResultLedger::open_for_run(&path, true).unwrap();
        second.append(&LedgerEntry::failed(id("B"), "boom")).unwrap();
        second.close().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("CDA,Status").count(), 1);
        let rows = read_ledger(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].identifier, "A");
    }

    #[test]
    fn test_continuation_terminates_unfinished_last_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.csv");
        let previous = "CDA,Status,Timestamp,Message\n\
                        'A,Success,2025-01-01T10:00:00-04:00,Downloaded on attempt 1";
        fs::write(&path, previous).unwrap();

        let mut ledger = ResultLedger::open_for_run(&path, true).unwrap();
        ledger.append(&LedgerEntry::success(id("B"), 1)).unwrap();
        ledger.close().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with(&format!("{}\n'B,Success,", previous)));

        let rows = read_ledger(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].message, "Downloaded on attempt 1");
        assert_eq!(rows[1].identifier, "B");

        let resume = compute_resume_set(&path).unwrap();
        assert!(resume.contains(&id("A")));
        assert!(resume.contains(&id("B")));
    }

    #[test]
    fn test_resume_set_only_contains_successes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.csv");
        fs::write(
            &path,
            "CDA,Status,Timestamp,Message\n\
             '1001,Success,2025-01-01T10:00:00-04:00,Downloaded on attempt 1\n\
             '1002,Failed,2025-01-01T10:00:05-04:00,trace\n\
             1003,Success,2025-01-01T10:00:09-04:00,Downloaded on attempt 2\n\
             '1002,Success,2025-01-02T10:00:00-04:00,Downloaded on attempt 1\n\
             '1004,Failed,2025-01-02T10:00:03-04:00,trace\n",
        )
        .unwrap();

        let resume = compute_resume_set(&path).unwrap();
        assert_eq!(resume.len(), 3);
        assert!(resume.contains(&id("1001")));
        assert!(resume.contains(&id("1002")));
        assert!(resume.contains(&id("1003")));
        assert!(!resume.contains(&id("1004")));
    }

    #[test]
    fn test_resume_set_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let resume = compute_resume_set(&dir.path().join("absent.csv")).unwrap();
        assert!(resume.is_empty());
    }
}
