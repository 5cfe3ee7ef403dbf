use std::path::Path;

use anyhow::Result;
use cda_downloader::utils::logging;
use cda_downloader::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::load()?;

    // 初始化日志
    logging::init_log_file(&config.output_log_file)?;
    logging::init(Some(Path::new(&config.output_log_file)))?;

    // 初始化并运行应用
    let app = App::initialize(config).await?;
    let summary = app.run().await?;
    drop(app);

    if !summary.is_clean() {
        std::process::exit(1);
    }

    Ok(())
}
