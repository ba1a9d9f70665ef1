//! 目录数据结构

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::normalize::{display_or_none, NONE_MARKER};

/// 编码+名称, 下拉选项和目录选择都用它, 不再从"编码 - 名称"字符串里拆分
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CodeName {
    pub code: Option<String>,
    pub name: Option<String>,
}

impl CodeName {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: crate::normalize::clean_text(&code.into()),
            name: crate::normalize::clean_text(&name.into()),
        }
    }
}

impl fmt::Display for CodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {}",
            display_or_none(self.code.as_deref()),
            display_or_none(self.name.as_deref())
        )
    }
}

/// 病种类型
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiseaseType {
    /// 基层病种
    Baseline,
    /// 核心病种
    Core,
    /// 综合病种
    Composite,
    Other(String),
}

impl DiseaseType {
    /// 基层病种和核心病种可以无操作入组
    pub fn allows_no_procedure(&self) -> bool {
        matches!(self, DiseaseType::Baseline | DiseaseType::Core)
    }

    pub fn label(&self) -> &str {
        match self {
            DiseaseType::Baseline => "基层病种",
            DiseaseType::Core => "核心病种",
            DiseaseType::Composite => "综合病种",
            DiseaseType::Other(s) => s.as_str(),
        }
    }
}

impl FromStr for DiseaseType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "基层病种" => DiseaseType::Baseline,
            "核心病种" => DiseaseType::Core,
            "综合病种" => DiseaseType::Composite,
            other => DiseaseType::Other(other.to_string()),
        })
    }
}

impl fmt::Display for DiseaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 手术操作类别
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcedureCategory {
    /// 手术
    Surgery,
    /// 介入治疗
    Interventional,
    /// 治疗性操作
    Therapeutic,
    /// 诊断性操作
    Diagnostic,
    Other(String),
}

impl ProcedureCategory {
    pub fn label(&self) -> &str {
        match self {
            ProcedureCategory::Surgery => "手术",
            ProcedureCategory::Interventional => "介入治疗",
            ProcedureCategory::Therapeutic => "治疗性操作",
            ProcedureCategory::Diagnostic => "诊断性操作",
            ProcedureCategory::Other(s) => s.as_str(),
        }
    }

    /// 综合病种按操作类别确定DIP名称里的组别后缀
    pub fn composite_suffix(&self) -> Option<&'static str> {
        match self {
            ProcedureCategory::Surgery | ProcedureCategory::Interventional => Some("手术组"),
            ProcedureCategory::Therapeutic => Some("治疗组"),
            ProcedureCategory::Diagnostic => Some("诊断组"),
            ProcedureCategory::Other(_) => None,
        }
    }
}

impl FromStr for ProcedureCategory {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "手术" => ProcedureCategory::Surgery,
            "介入治疗" => ProcedureCategory::Interventional,
            "治疗性操作" => ProcedureCategory::Therapeutic,
            "诊断性操作" => ProcedureCategory::Diagnostic,
            other => ProcedureCategory::Other(other.to_string()),
        })
    }
}

impl fmt::Display for ProcedureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 诊断编码及名称目录的一行
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosisEntry {
    pub code: Option<String>,
    pub name: Option<String>,
}

/// 手术操作分类目录的一行
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcedureEntry {
    pub code: Option<String>,
    pub name: Option<String>,
    pub category: Option<ProcedureCategory>,
}

/// DIP病种及分值目录的一行
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DipGroupRecord {
    pub sequence_no: u32,               // 序号
    pub group_code: Option<String>,     // DIP编码
    pub group_name: Option<String>,     // DIP名称
    pub disease_type: Option<DiseaseType>, // 病种类型
    pub diagnosis_code: Option<String>, // 诊断编码
    pub diagnosis_name: Option<String>, // 诊断名称
    pub procedure_code: Option<String>, // 操作编码, None 即"无"
    pub procedure_name: Option<String>, // 操作名称
    pub case_count: u32,                // 病例数
    pub base_score: f64,                // 入组的DIP基准分值
}

impl DipGroupRecord {
    pub fn has_procedure(&self) -> bool {
        self.procedure_code.is_some()
    }

    pub fn disease_type_label(&self) -> &str {
        self.disease_type
            .as_ref()
            .map(|t| t.label())
            .unwrap_or(NONE_MARKER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_suffix() {
        let cat: ProcedureCategory = "介入治疗".parse().unwrap();
        assert_eq!(cat.composite_suffix(), Some("手术组"));
        let cat: ProcedureCategory = "诊断性操作".parse().unwrap();
        assert_eq!(cat.composite_suffix(), Some("诊断组"));
        let cat: ProcedureCategory = "其他".parse().unwrap();
        assert_eq!(cat.composite_suffix(), None);
    }

    #[test]
    fn disease_type_no_procedure() {
        assert!(DiseaseType::Baseline.allows_no_procedure());
        assert!(DiseaseType::Core.allows_no_procedure());
        assert!(!DiseaseType::Composite.allows_no_procedure());
        assert_eq!("综合病种".parse::<DiseaseType>().unwrap(), DiseaseType::Composite);
    }

    #[test]
    fn code_name_display() {
        let cn = CodeName::new("H25.0", "老年性初期白内障");
        assert_eq!(cn.to_string(), "H25.0 - 老年性初期白内障");
        let cn = CodeName::new("", "发热");
        assert_eq!(cn.code, None);
        assert_eq!(cn.to_string(), "无 - 发热");
    }
}
