//! 配置管理
//!
//! 内置默认值, 可被配置文件和 `DIP_` 开头的环境变量覆盖, 例如 `DIP_TIER_COEFFICIENT=1.05`,
//! 嵌套的键用双下划线分隔, 例如 `DIP_POINT_VALUE__RESIDENT=60.0`。

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

use crate::error::{DipError, Result};
use crate::finance::CostInputs;
use crate::grouping::DEFAULT_FALLBACK_BASE_SCORE;

/// 点值类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointCategory {
    /// 居民
    Resident,
    /// 职工
    #[default]
    Employee,
}

impl PointCategory {
    pub fn label(&self) -> &'static str {
        match self {
            PointCategory::Resident => "居民",
            PointCategory::Employee => "职工",
        }
    }
}

impl fmt::Display for PointCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PointCategory {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "resident" | "居民" => Ok(PointCategory::Resident),
            "employee" | "职工" => Ok(PointCategory::Employee),
            other => Err(format!("未知的点值类别: {}", other)),
        }
    }
}

/// 各类别的点值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointValues {
    pub resident: f64,
    pub employee: f64,
}

impl PointValues {
    pub fn get(&self, category: PointCategory) -> f64 {
        match category {
            PointCategory::Resident => self.resident,
            PointCategory::Employee => self.employee,
        }
    }
}

/// 测算参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// 无法入组时使用的基准分值
    pub fallback_base_score: f64,
    /// 级别系数
    pub tier_coefficient: f64,
    pub point_value: PointValues,
    pub point_category: PointCategory,
    /// 医疗性收入成本率
    pub medical_cost_ratio: f64,
    /// 药耗成本率
    pub drug_cost_ratio: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fallback_base_score: DEFAULT_FALLBACK_BASE_SCORE,
            tier_coefficient: 1.0330,
            point_value: PointValues {
                resident: 63.3253,
                employee: 73.6011,
            },
            point_category: PointCategory::Employee,
            medical_cost_ratio: 0.50,
            drug_cost_ratio: 1.00,
        }
    }
}

impl Settings {
    /// 加载配置, `path` 为空时只用默认值和环境变量
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = Settings::default();
        let mut builder = Config::builder()
            .set_default("fallback_base_score", defaults.fallback_base_score)?
            .set_default("tier_coefficient", defaults.tier_coefficient)?
            .set_default("point_value.resident", defaults.point_value.resident)?
            .set_default("point_value.employee", defaults.point_value.employee)?
            .set_default("point_category", "employee")?
            .set_default("medical_cost_ratio", defaults.medical_cost_ratio)?
            .set_default("drug_cost_ratio", defaults.drug_cost_ratio)?;

        if let Some(path) = path {
            debug!("读取配置文件: {}", path.display());
            builder = builder.add_source(File::from(path).required(true));
        }

        let settings: Settings = builder
            .add_source(
                Environment::with_prefix("DIP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        info!(
            "配置加载完成: 级别系数 {}, {}点值 {}",
            settings.tier_coefficient,
            settings.point_category,
            settings.point_value()
        );
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tier_coefficient < 0.0 {
            return Err(DipError::Config(format!("级别系数不能为负数: {}", self.tier_coefficient)));
        }
        if self.point_value.resident < 0.0 || self.point_value.employee < 0.0 {
            return Err(DipError::Config("点值不能为负数".to_string()));
        }
        if !(0.0..=1.0).contains(&self.medical_cost_ratio) {
            return Err(DipError::Config(format!(
                "医疗性收入成本率应在0到1之间: {}",
                self.medical_cost_ratio
            )));
        }
        if self.drug_cost_ratio < 0.0 {
            return Err(DipError::Config(format!("药耗成本率不能为负数: {}", self.drug_cost_ratio)));
        }
        Ok(())
    }

    /// 当前类别的默认点值
    pub fn point_value(&self) -> f64 {
        self.point_value.get(self.point_category)
    }

    /// 用配置填充测算参数, 费用保持默认
    pub fn cost_inputs(&self, base_score: f64) -> CostInputs {
        CostInputs {
            medical_cost_ratio: self.medical_cost_ratio,
            drug_cost_ratio: self.drug_cost_ratio,
            base_score,
            tier_coefficient: self.tier_coefficient,
            point_value: self.point_value(),
            ..CostInputs::default()
        }
    }
}
