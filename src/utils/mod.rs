use std::path::PathBuf;

/// 默认数据文件名
pub const DB_FILE_NAME: &str = "tests.json";

/// 数据目录：当前工作目录下的 data/
pub fn get_app_data_dir() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("data")
}

pub fn get_default_db_path() -> PathBuf {
    let mut path = get_app_data_dir();
    path.push(DB_FILE_NAME);
    path
}

/// 初始化日志输出
pub fn init_logging(level: log::LevelFilter) -> Result<(), log::SetLoggerError> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .level_for("hyper", log::LevelFilter::Warn)
        .level_for("reqwest", log::LevelFilter::Warn)
        .level_for("tower_http", log::LevelFilter::Warn)
        .chain(std::io::stdout())
        .apply()
}

/// 保留两位小数
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round2() {
        assert_eq!(round2(66.666_666), 66.67);
        assert_eq!(round2(50.0), 50.0);
        assert_eq!(round2(33.333_3), 33.33);
    }

    #[test]
    fn test_default_db_path() {
        let path = get_default_db_path();
        assert!(path.ends_with("data/tests.json"));
    }
}
