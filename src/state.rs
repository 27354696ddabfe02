/// 应用状态持久化
use crate::views::View;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 应用状态（用于持久化）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppState {
    /// 上次打开的视图
    #[serde(default)]
    pub view: View,
    /// 上次选中的行
    #[serde(default)]
    pub selected: usize,
}

/// 获取状态文件路径：`<data_dir>/state.json`
pub fn state_file_path(data_dir: &Path) -> PathBuf {
    data_dir.join("state.json")
}

/// 从应用中提取状态
pub fn extract_state(app: &crate::app::App) -> AppState {
    AppState {
        view: app.view,
        selected: app.selected,
    }
}

/// 保存状态到文件
pub fn save_state(path: &Path, state: &AppState) -> Result<()> {
    // 确保目录存在
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(state)?;
    std::fs::write(path, json)?;

    Ok(())
}

/// 从文件加载状态
pub fn load_state(path: &Path) -> Result<AppState> {
    if !path.exists() {
        return Ok(AppState::default());
    }

    let content = std::fs::read_to_string(path)?;
    let state: AppState = serde_json::from_str(&content)?;

    Ok(state)
}

/// 应用状态到应用
pub fn apply_state(app: &mut crate::app::App, state: AppState) {
    app.view = state.view;
    app.selected = state.selected;
    // 任务可能在上次退出后被删除
    app.clamp_selection();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = state_file_path(temp.path());
        let state = AppState {
            view: View::Upcoming,
            selected: 4,
        };

        save_state(&path, &state).unwrap();

        assert_eq!(load_state(&path).unwrap(), state);
        let json = std::fs::read_to_string(&path).unwrap();
        assert!(json.contains("\"upcoming\""));
    }

    #[test]
    fn test_missing_file_is_default() {
        let temp = TempDir::new().unwrap();
        let state = load_state(&state_file_path(temp.path())).unwrap();
        assert_eq!(state, AppState::default());
    }

    #[test]
    fn test_unknown_fields_and_garbage() {
        let temp = TempDir::new().unwrap();
        let path = state_file_path(temp.path());
        std::fs::write(&path, "{\"split_tree\": 1}").unwrap();

        // 未知字段被忽略，缺失字段取默认值
        assert_eq!(load_state(&path).unwrap(), AppState::default());

        std::fs::write(&path, "not json").unwrap();
        assert!(load_state(&path).is_err());
    }
}
