use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::Path;

use tokio::fs;
use tracing::{debug, info, warn};

use crate::config::DuplicatePolicy;
use crate::error::{CdaError, Result};
use crate::models::certificate::CertificateId;

/// 输入清单中必需的列名（区分大小写）
pub const REQUIRED_COLUMN: &str = "cda";

/// 从表格文件加载 CDA 编号列表
///
/// - 文件必须带表头，且包含 `cda` 列，其余列忽略
/// - 每个值去除首尾空白，空值直接丢弃
/// - 保持原始顺序，不去重
pub async fn load_certificate_list(path: &Path) -> Result<Vec<CertificateId>> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(CdaError::InputNotFound {
                path: path.to_path_buf(),
            })
        }
        Err(e) => {
            return Err(CdaError::SchemaInvalid {
                path: path.to_path_buf(),
                reason: format!("无法读取文件: {}", e),
            })
        }
    };

    let ids = parse_certificate_list(&content).map_err(|reason| CdaError::SchemaInvalid {
        path: path.to_path_buf(),
        reason,
    })?;

    info!("✓ 从 {} 加载了 {} 个 CDA", path.display(), ids.len());
    Ok(ids)
}

/// 解析清单内容（容忍 UTF-8 BOM）
pub fn parse_certificate_list(content: &str) -> std::result::Result<Vec<CertificateId>, String> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| format!("无法解析表头: {}", e))?
        .clone();

    if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
        return Err("文件缺少表头".to_string());
    }

    let column = headers
        .iter()
        .position(|h| h == REQUIRED_COLUMN)
        .ok_or_else(|| format!("缺少必需的列 '{}'", REQUIRED_COLUMN))?;

    let mut ids = Vec::new();
    let mut blank = 0usize;

    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(|e| format!("第 {} 行解析失败: {}", row + 2, e))?;
        match CertificateId::parse(record.get(column).unwrap_or_default()) {
            Some(id) => ids.push(id),
            None => blank += 1,
        }
    }

    if blank > 0 {
        debug!("忽略了 {} 个空白的 CDA 值", blank);
    }

    Ok(ids)
}

/// 按配置处理重复编号
///
/// `ProcessOnce` 只保留第一次出现的位置。
pub fn apply_duplicate_policy(ids: Vec<CertificateId>, policy: DuplicatePolicy) -> Vec<CertificateId> {
    match policy {
        DuplicatePolicy::ProcessEach => ids,
        DuplicatePolicy::ProcessOnce => {
            let before = ids.len();
            let mut seen = HashSet::new();
            let unique: Vec<_> = ids.into_iter().filter(|id| seen.insert(id.clone())).collect();
            if unique.len() < before {
                warn!("⚠️ 清单中有 {} 个重复的 CDA，已去重", before - unique.len());
            }
            unique
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[CertificateId]) -> Vec<&str> {
        list.iter().map(|id| id.as_str()).collect()
    }

    #[test]
    fn test_blank_rows_are_dropped_in_order() {
        let parsed = parse_certificate_list("cda\n1001\n1002\n   \n1003\n").unwrap();
        assert_eq!(ids(&parsed), vec!["1001", "1002", "1003"]);
    }

    #[test]
    fn test_bom_and_extra_columns() {
        let content = "\u{feff}nome,cda,valor\nJoão, 2001 ,10\nMaria,,20\nAna,2002,30\n";
        let parsed = parse_certificate_list(content).unwrap();
        assert_eq!(ids(&parsed), vec!["2001", "2002"]);
    }

    #[test]
    fn test_short_rows_count_as_blank() {
        let parsed = parse_certificate_list("nome,cda\nJoão\nAna,3001\n").unwrap();
        assert_eq!(ids(&parsed), vec!["3001"]);
    }

    #[test]
    fn test_missing_column_is_case_sensitive() {
        let err = parse_certificate_list("CDA\n1001\n").unwrap_err();
        assert!(err.contains("cda"));
    }

    #[test]
    fn test_empty_file_has_no_header() {
        assert!(parse_certificate_list("").is_err());
        assert!(parse_certificate_list("\u{feff}").is_err());
    }

    #[test]
    fn test_duplicate_policy() {
        let list = parse_certificate_list("cda\nA\nB\nA\nC\nB\n").unwrap();
        let each = apply_duplicate_policy(list.clone(), DuplicatePolicy::ProcessEach);
        assert_eq!(each.len(), 5);
        let once = apply_duplicate_policy(list, DuplicatePolicy::ProcessOnce);
        assert_eq!(ids(&once), vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_certificate_list(&dir.path().join("nope.csv"))
            .await
            .unwrap_err();
        assert!(matches!(err, CdaError::InputNotFound { .. }));
    }

    #[tokio::test]
    async fn test_load_missing_column_never_partially_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.csv");
        std::fs::write(&path, "numero\n1001\n1002\n").unwrap();

        let err = load_certificate_list(&path).await.unwrap_err();
        assert!(matches!(err, CdaError::SchemaInvalid { .. }));
    }

    #[tokio::test]
    async fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.txt");
        std::fs::write(&path, "cda\r\n1001\r\n1002\r\n\r\n1003\r\n").unwrap();

        let loaded = load_certificate_list(&path).await.unwrap();
        assert_eq!(ids(&loaded), vec!["1001", "1002", "1003"]);
    }
}
