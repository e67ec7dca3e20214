use crate::models::{CountingMode, HabitDef, Settings, Tag};

/// How a habit counter reacts to increments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HabitKind {
    Bounded { max: u32 },
    Unbounded,
}

impl HabitKind {
    /// Returns the new count, or `None` when the change is rejected.
    /// Counts floor at zero; only bounded habits have a ceiling.
    pub fn apply_delta(self, current: u32, delta: i64) -> Option<u32> {
        let next = i64::from(current)
            .saturating_add(delta)
            .clamp(0, i64::from(u32::MAX)) as u32;
        match self {
            HabitKind::Bounded { max } if next > max => None,
            _ => Some(next),
        }
    }
}

impl HabitDef {
    pub fn kind(&self) -> HabitKind {
        match self.mode {
            CountingMode::Count => HabitKind::Bounded { max: self.max },
            CountingMode::Infinite => HabitKind::Unbounded,
        }
    }
}

pub const TAG_PALETTE: [&str; 8] = [
    "blue", "indigo", "emerald", "orange", "stone", "rose", "purple", "cyan",
];

pub fn default_tags() -> Vec<Tag> {
    [
        ("工作", "blue"),
        ("学习", "indigo"),
        ("阅读", "emerald"),
        ("运动", "orange"),
        ("发呆", "stone"),
    ]
    .into_iter()
    .map(|(name, color)| Tag {
        name: name.to_string(),
        color: color.to_string(),
    })
    .collect()
}

pub fn default_habits() -> Vec<HabitDef> {
    let habit = |id: &str, label: &str, max, mode, color: &str, desc: &str| HabitDef {
        id: id.to_string(),
        label: label.to_string(),
        max,
        mode,
        color: color.to_string(),
        desc: desc.to_string(),
    };
    vec![
        habit("water", "💧 饮水守护", 8, CountingMode::Infinite, "blue", "≥300ml 对抗结石"),
        habit("poop", "💩 顺畅守护", 1, CountingMode::Count, "amber", "身体净化完成"),
        habit("spine", "🚶 脊柱活动", 2, CountingMode::Count, "green", "上下午各一次拉伸"),
        habit("sleep", "🌙 睡前锚点", 1, CountingMode::Count, "indigo", "23:00 前开始仪式"),
        habit("impulse", "🧠 冲动记录", 999, CountingMode::Infinite, "rose", "觉察与停顿"),
    ]
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tags: default_tags(),
            habits: default_habits(),
        }
    }
}
