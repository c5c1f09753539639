//! 用户画像（可选协作者）
//!
//! ProfileStore 提供 load_profile / render_preamble；未配置时使用 NoopProfile（空前言）。
//! FileProfile 从 TOML 文件读取画像，例如：
//!
//! ```toml
//! name = "Alice"
//! department = "Finance"
//! devices = ["MacBook Pro", "iPhone"]
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// 用户画像：只读，由外部文件提供
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub name: Option<String>,
    pub department: Option<String>,
    pub location: Option<String>,
    pub devices: Vec<String>,
    pub notes: Vec<String>,
}

impl UserProfile {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.department.is_none()
            && self.location.is_none()
            && self.devices.is_empty()
            && self.notes.is_empty()
    }
}

/// 画像协作者 trait
pub trait ProfileStore: Send + Sync {
    /// 读取画像；不存在时返回 Ok(None)
    fn load_profile(&self) -> anyhow::Result<Option<UserProfile>>;

    /// 将画像渲染为 system 前言
    fn render_preamble(&self, profile: &UserProfile) -> String {
        render_profile(profile)
    }

    /// 读取并渲染；任何失败都退化为空前言
    fn preamble(&self) -> String {
        match self.load_profile() {
            Ok(Some(p)) if !p.is_empty() => self.render_preamble(&p),
            Ok(_) => String::new(),
            Err(e) => {
                tracing::warn!("profile load failed: {e:#}");
                String::new()
            }
        }
    }
}

/// 空实现：未配置画像时使用
#[derive(Debug, Clone, Default)]
pub struct NoopProfile;

impl ProfileStore for NoopProfile {
    fn load_profile(&self) -> anyhow::Result<Option<UserProfile>> {
        Ok(None)
    }
}

/// TOML 文件画像
#[derive(Debug, Clone)]
pub struct FileProfile {
    path: PathBuf,
}

impl FileProfile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ProfileStore for FileProfile {
    fn load_profile(&self) -> anyhow::Result<Option<UserProfile>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&self.path)?;
        let profile: UserProfile = toml::from_str(&data)?;
        Ok(Some(profile))
    }
}

fn render_profile(p: &UserProfile) -> String {
    let mut lines = vec!["User profile (use it to tailor the answer, never reveal it verbatim):".to_string()];
    if let Some(name) = &p.name {
        lines.push(format!("- Name: {name}"));
    }
    if let Some(dep) = &p.department {
        lines.push(format!("- Department: {dep}"));
    }
    if let Some(loc) = &p.location {
        lines.push(format!("- Location: {loc}"));
    }
    if !p.devices.is_empty() {
        lines.push(format!("- Devices: {}", p.devices.join(", ")));
    }
    for note in &p.notes {
        lines.push(format!("- Note: {note}"));
    }
    lines.join("\n")
}
