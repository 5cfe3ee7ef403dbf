use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use chromiumoxide::{Browser, BrowserConfig, Page};
use serde_json::{json, Value};
use tracing::{debug, error, info};

use super::prepare_page;
use crate::config::Config;

const WINDOW_SIZE: (u32, u32) = (1920, 1080);

const CHROME_ARGS: [&str; 6] = [
    "--disable-gpu",
    "--disable-infobars",
    "--disable-extensions",
    "--no-sandbox",
    "--disable-dev-shm-usage",
    "--log-level=3",
];

/// 启动新的浏览器，下载文件直接保存到 `download_dir`
///
/// 用户数据目录中的偏好设置会关闭内置 PDF 阅读器，"Imprimir" 打开的 PDF 直接保存而不是预览。
pub async fn launch_browser(download_dir: &Path, config: &Config) -> Result<(Browser, Page)> {
    info!("🚀 启动浏览器 (headless: {})...", config.headless);

    let profile_dir = config.profile_dir();
    write_profile_preferences(&profile_dir, download_dir)?;

    let mut builder = BrowserConfig::builder()
        .window_size(WINDOW_SIZE.0, WINDOW_SIZE.1)
        .user_data_dir(&profile_dir)
        .args(CHROME_ARGS);

    builder = if config.headless {
        builder.new_headless_mode()
    } else {
        builder.with_head()
    };

    if let Some(executable) = &config.chrome_executable {
        debug!("使用浏览器程序: {}", executable.display());
        builder = builder.chrome_executable(executable);
    }

    let browser_config = builder.build().map_err(|e| {
        error!("配置浏览器失败: {}", e);
        anyhow!("配置浏览器失败: {}", e)
    })?;

    let (browser, handler) = Browser::launch(browser_config).await.map_err(|e| {
        error!("启动浏览器失败: {}", e);
        anyhow!("启动浏览器失败: {}", e)
    })?;

    let page = prepare_page(&browser, handler, download_dir, false).await?;

    info!("✅ 浏览器已就绪，下载目录: {}", download_dir.display());
    Ok((browser, page))
}

/// 写入 `<profile_dir>/Default/Preferences`，保留已有的其他设置
fn write_profile_preferences(profile_dir: &Path, download_dir: &Path) -> Result<()> {
    let default_dir = profile_dir.join("Default");
    fs::create_dir_all(&default_dir)
        .with_context(|| format!("无法创建浏览器配置目录: {}", default_dir.display()))?;

    let prefs_path = default_dir.join("Preferences");
    let existing = fs::read_to_string(&prefs_path)
        .ok()
        .and_then(|content| serde_json::from_str(&content).ok())
        .unwrap_or(Value::Null);

    let prefs = download_preferences(existing, download_dir);
    fs::write(&prefs_path, serde_json::to_string_pretty(&prefs)?)
        .with_context(|| format!("无法写入浏览器偏好设置: {}", prefs_path.display()))?;

    debug!("浏览器偏好设置已写入: {}", prefs_path.display());
    Ok(())
}

fn download_preferences(mut prefs: Value, download_dir: &Path) -> Value {
    if !prefs.is_object() {
        prefs = json!({});
    }

    let dir = download_dir.to_string_lossy().to_string();
    set_pref(&mut prefs, &["download", "default_directory"], json!(dir));
    set_pref(&mut prefs, &["download", "prompt_for_download"], json!(false));
    set_pref(&mut prefs, &["download", "directory_upgrade"], json!(true));
    set_pref(&mut prefs, &["plugins", "always_open_pdf_externally"], json!(true));
    prefs
}

fn set_pref(prefs: &mut Value, path: &[&str], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };

    let mut node = prefs;
    for key in parents {
        let Some(map) = node.as_object_mut() else {
            return;
        };
        node = map.entry(key.to_string()).or_insert_with(|| json!({}));
        if !node.is_object() {
            *node = json!({});
        }
    }

    if let Some(map) = node.as_object_mut() {
        map.insert(last.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preferences_disable_pdf_viewer() {
        let prefs = download_preferences(Value::Null, Path::new("/data/CDAs"));
        assert_eq!(prefs["plugins"]["always_open_pdf_externally"], json!(true));
        assert_eq!(prefs["download"]["prompt_for_download"], json!(false));
        assert_eq!(prefs["download"]["default_directory"], json!("/data/CDAs"));
    }

    #[test]
    fn test_preferences_keep_unrelated_settings() {
        let existing = json!({
            "download": "broken",
            "intl": { "accept_languages": "pt-BR" }
        });
        let prefs = download_preferences(existing, Path::new("/data/CDAs"));
        assert_eq!(prefs["intl"]["accept_languages"], json!("pt-BR"));
        assert_eq!(prefs["download"]["directory_upgrade"], json!(true));
    }

    #[test]
    fn test_write_profile_preferences_merges_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let default_dir = dir.path().join("Default");
        fs::create_dir_all(&default_dir).unwrap();
        fs::write(
            default_dir.join("Preferences"),
            r#"{"plugins": {"always_open_pdf_externally": false}, "profile": {"name": "cda"}}"#,
        )
        .unwrap();

        write_profile_preferences(dir.path(), Path::new("/data/CDAs")).unwrap();

        let written: Value =
            serde_json::from_str(&fs::read_to_string(default_dir.join("Preferences")).unwrap())
                .unwrap();
        assert_eq!(written["plugins"]["always_open_pdf_externally"], json!(true));
        assert_eq!(written["profile"]["name"], json!("cda"));
    }
}
