use std::fmt::{self, Display};
use std::str::FromStr;

use chrono::{DateTime, Local};

use super::certificate::CertificateId;

/// 台账中表示"强制按文本保存"的前缀字符，避免表格软件把编号当成数字
pub const TEXT_MARKER: char = '\'';

/// 单个 CDA 的最终处理状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    Success,
    Failed,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Success => "Success",
            EntryStatus::Failed => "Failed",
        }
    }
}

impl Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Success" => Ok(EntryStatus::Success),
            "Failed" => Ok(EntryStatus::Failed),
            other => Err(format!("未知状态: {}", other)),
        }
    }
}

/// 台账中的一行记录
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub identifier: CertificateId,
    pub status: EntryStatus,
    pub timestamp: DateTime<Local>,
    pub message: String,
}

impl LedgerEntry {
    pub fn success(identifier: CertificateId, attempt: u32) -> Self {
        Self {
            identifier,
            status: EntryStatus::Success,
            timestamp: Local::now(),
            message: format!("Downloaded on attempt {}", attempt),
        }
    }

    pub fn failed(identifier: CertificateId, trace: impl Into<String>) -> Self {
        Self {
            identifier,
            status: EntryStatus::Failed,
            timestamp: Local::now(),
            message: trace.into(),
        }
    }

    /// 转为 CSV 行：CDA,Status,Timestamp,Message
    pub fn to_record(&self) -> [String; 4] {
        [
            format!("{}{}", TEXT_MARKER, self.identifier),
            self.status.to_string(),
            self.timestamp.to_rfc3339(),
            self.message.clone(),
        ]
    }
}

/// 去掉存储时添加的文本前缀
pub fn strip_text_marker(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed.strip_prefix(TEXT_MARKER).unwrap_or(trimmed).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_marks_identifier_as_text() {
        let entry = LedgerEntry::success(CertificateId::parse("0042").unwrap(), 2);
        let record = entry.to_record();
        assert_eq!(record[0], "'0042");
        assert_eq!(record[1], "Success");
        assert_eq!(record[3], "Downloaded on attempt 2");
        assert!(DateTime::parse_from_rfc3339(&record[2]).is_ok());
    }

    #[test]
    fn test_strip_text_marker() {
        assert_eq!(strip_text_marker("'0042"), "0042");
        assert_eq!(strip_text_marker(" 0042 "), "0042");
        assert_eq!("Failed".parse::<EntryStatus>().unwrap(), EntryStatus::Failed);
        assert!("Skipped".parse::<EntryStatus>().is_err());
    }
}
