/// 应用配置管理
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 默认扫描间隔（秒）
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 1;

/// 默认迟到窗口（秒）：超过这个时间的提醒直接丢弃
pub const DEFAULT_LATENESS_WINDOW_SECS: u64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// 外部编辑器命令（用于编辑任务文件）
    pub editor: String,
    /// 数据目录（为空时使用 ~/.helix-todo）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    /// 提醒设置
    #[serde(default)]
    pub reminder: ReminderConfig,
}

/// 提醒设置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderConfig {
    /// 扫描间隔（秒），最小 1
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// 到期后多久内仍然补发提醒（秒）
    #[serde(default = "default_lateness_window")]
    pub lateness_window_secs: u64,
    /// 是否响铃
    #[serde(default = "default_sound")]
    pub sound: bool,
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

fn default_lateness_window() -> u64 {
    DEFAULT_LATENESS_WINDOW_SECS
}

fn default_sound() -> bool {
    true
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            lateness_window_secs: DEFAULT_LATENESS_WINDOW_SECS,
            sound: true,
        }
    }
}

impl ReminderConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn lateness_window(&self) -> Duration {
        Duration::from_secs(self.lateness_window_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            editor: detect_editor(),
            data_dir: None,
            reminder: ReminderConfig::default(),
        }
    }
}

impl Config {
    /// 实际使用的数据目录（HXT_DATA_DIR 环境变量优先）
    pub fn data_dir(&self) -> PathBuf {
        if std::env::var_os("HXT_DATA_DIR").is_some() {
            return crate::fs::default_data_dir();
        }
        self.data_dir
            .clone()
            .unwrap_or_else(crate::fs::default_data_dir)
    }
}

/// 获取配置文件路径
/// Windows: %APPDATA%\helix-todo\config.toml
/// macOS: ~/Library/Application Support/helix-todo/config.toml
/// Linux: ~/.config/helix-todo/config.toml
pub fn get_config_path() -> PathBuf {
    let config_dir = directories::BaseDirs::new()
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));
    config_dir.join("helix-todo").join("config.toml")
}

/// 加载配置
pub fn load_config() -> Result<Config> {
    load_config_from(&get_config_path())
}

pub fn load_config_from(config_path: &Path) -> Result<Config> {
    if !config_path.exists() {
        // 配置文件不存在，返回默认配置
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(config_path)?;
    let config: Config = toml::from_str(&content)?;

    Ok(config)
}

/// 保存配置
pub fn save_config(config: &Config) -> Result<()> {
    save_config_to(config, &get_config_path())
}

pub fn save_config_to(config: &Config, config_path: &Path) -> Result<()> {
    // 确保目录存在
    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(config_path, content)?;

    Ok(())
}

/// 检测系统编辑器
fn detect_editor() -> String {
    // 1. 检查环境变量
    if let Ok(editor) = std::env::var("VISUAL") {
        return editor;
    }
    if let Ok(editor) = std::env::var("EDITOR") {
        return editor;
    }

    // 2. 检查常见编辑器（按优先级）
    let common_editors = ["hx", "nvim", "vim", "nano"];

    for editor in common_editors {
        if which(editor).is_ok() {
            return editor.to_string();
        }
    }

    // 3. 默认使用 vim
    "vim".to_string()
}

/// 检查命令是否存在
fn which(cmd: &str) -> Result<PathBuf> {
    use std::process::Command;

    let output = Command::new("which").arg(cmd).output()?;

    if output.status.success() {
        let path = String::from_utf8(output.stdout)?.trim().to_string();
        Ok(PathBuf::from(path))
    } else {
        Err(anyhow::anyhow!("Command not found: {}", cmd))
    }
}

/// 首次运行检查
/// 返回 (config, is_first_run)
pub fn check_first_run() -> Result<(Config, bool)> {
    let config_path = get_config_path();

    if !config_path.exists() {
        // 首次运行，创建默认配置
        let config = Config::default();
        save_config(&config)?;

        Ok((config, true))
    } else {
        Ok((load_config()?, false))
    }
}

/// 修改配置并保存
fn update_config<F: FnOnce(&mut Config)>(f: F) -> Result<Config> {
    let mut config = load_config()?;
    f(&mut config);
    save_config(&config)?;
    Ok(config)
}

/// 更新编辑器配置
pub fn set_editor(editor: String) -> Result<()> {
    let config = update_config(|c| c.editor = editor)?;
    println!("✓ 编辑器已设置为: {}", config.editor);
    Ok(())
}

/// 更新扫描间隔
pub fn set_poll_interval(secs: u64) -> Result<()> {
    if secs == 0 {
        anyhow::bail!("扫描间隔至少为 1 秒");
    }
    let config = update_config(|c| c.reminder.poll_interval_secs = secs)?;
    println!("✓ 扫描间隔已设置为: {} 秒", config.reminder.poll_interval_secs);
    Ok(())
}

/// 更新迟到窗口
pub fn set_lateness_window(secs: u64) -> Result<()> {
    let config = update_config(|c| c.reminder.lateness_window_secs = secs)?;
    println!("✓ 迟到窗口已设置为: {} 秒", config.reminder.lateness_window_secs);
    Ok(())
}

/// 开关提醒声音
pub fn set_sound(enabled: bool) -> Result<()> {
    update_config(|c| c.reminder.sound = enabled)?;
    println!("✓ 提醒声音已{}", if enabled { "开启" } else { "关闭" });
    Ok(())
}

/// 显示当前配置
pub fn show_config() -> Result<()> {
    let config = load_config()?;
    println!("当前配置:");
    println!("  编辑器:     {}", config.editor);
    println!("  数据目录:   {}", config.data_dir().display());
    println!("  扫描间隔:   {} 秒", config.reminder.poll_interval_secs);
    println!("  迟到窗口:   {} 秒", config.reminder.lateness_window_secs);
    println!("  提醒声音:   {}", if config.reminder.sound { "开" } else { "关" });
    println!();
    println!("配置文件: {}", get_config_path().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let config = load_config_from(&temp.path().join("config.toml")).unwrap();
        assert_eq!(config.reminder, ReminderConfig::default());
        assert!(config.data_dir.is_none());
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.editor = "hx".to_string();
        config.reminder.poll_interval_secs = 30;
        config.reminder.sound = false;
        save_config_to(&config, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.editor, "hx");
        assert_eq!(loaded.reminder.poll_interval_secs, 30);
        assert!(!loaded.reminder.sound);
    }

    #[test]
    fn test_partial_reminder_section_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "editor = \"vim\"\n\n[reminder]\nsound = false\n").unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.reminder.poll_interval_secs, DEFAULT_POLL_INTERVAL_SECS);
        assert_eq!(
            config.reminder.lateness_window_secs,
            DEFAULT_LATENESS_WINDOW_SECS
        );
        assert!(!config.reminder.sound);
    }

    #[test]
    fn test_poll_interval_never_zero() {
        let config = ReminderConfig {
            poll_interval_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(
            ReminderConfig::default().lateness_window(),
            Duration::from_secs(60)
        );
    }
}
