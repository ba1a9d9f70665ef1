//! 下拉选项
//!
//! 选项直接携带编码和名称, 选择后不再从展示文本里拆分。

use serde::Serialize;
use std::collections::HashSet;

use crate::catalog::DipCatalog;
use crate::grouping::{ProcedureSelection, QueryOrder};
use crate::model::{CodeName, DipGroupRecord};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogOption {
    pub value: CodeName,
    /// 展示文本
    pub label: String,
}

impl CatalogOption {
    fn plain(value: CodeName) -> Self {
        Self { label: value.to_string(), value }
    }

    /// 带病种类型和分值的选项
    fn detailed(value: CodeName, record: &DipGroupRecord) -> Self {
        let label = format!(
            "{} | 病种类型: {} | 分值: {:.4}",
            value,
            record.disease_type_label(),
            record.base_score
        );
        Self { value, label }
    }
}

/// 两个下拉框的选项, 顺序由查询顺序决定
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryOptions {
    pub diagnoses: Vec<CatalogOption>,
    pub procedures: Vec<CatalogOption>,
}

// 按展示文本去重, 保持目录顺序
fn distinct(options: impl Iterator<Item = CatalogOption>) -> Vec<CatalogOption> {
    let mut seen = HashSet::new();
    options.filter(|o| seen.insert(o.label.clone())).collect()
}

fn diagnosis_of(record: &DipGroupRecord) -> CodeName {
    CodeName {
        code: record.diagnosis_code.clone(),
        name: record.diagnosis_name.clone(),
    }
}

fn procedure_of(record: &DipGroupRecord) -> CodeName {
    CodeName {
        code: record.procedure_code.clone(),
        name: record.procedure_name.clone(),
    }
}

/// 先诊断后操作: 所有有编码的诊断
pub fn diagnosis_options(dip: &DipCatalog) -> Vec<CatalogOption> {
    distinct(
        dip.records()
            .iter()
            .filter(|r| r.diagnosis_code.is_some())
            .map(|r| CatalogOption::plain(diagnosis_of(r))),
    )
}

/// 先诊断后操作: 该诊断下有操作的记录
pub fn procedure_options_for_diagnosis(dip: &DipCatalog, diagnosis_code: &str) -> Vec<CatalogOption> {
    distinct(
        dip.records()
            .iter()
            .filter(|r| r.diagnosis_code.as_deref() == Some(diagnosis_code) && r.has_procedure())
            .map(|r| CatalogOption::detailed(procedure_of(r), r)),
    )
}

/// 先操作后诊断: 所有有编码的操作
pub fn procedure_options(dip: &DipCatalog) -> Vec<CatalogOption> {
    distinct(
        dip.records()
            .iter()
            .filter(|r| r.has_procedure())
            .map(|r| CatalogOption::plain(procedure_of(r))),
    )
}

/// 先操作后诊断: 选择操作后可选的诊断, 选择"无操作的"时列出有无操作记录的诊断
pub fn diagnosis_options_for_procedure(dip: &DipCatalog, selection: &ProcedureSelection) -> Vec<CatalogOption> {
    let records = dip.records().iter();
    match selection {
        ProcedureSelection::ExplicitNone => distinct(
            records
                .filter(|r| !r.has_procedure())
                .map(|r| CatalogOption::detailed(diagnosis_of(r), r)),
        ),
        ProcedureSelection::Catalog(CodeName { code: Some(code), .. }) => distinct(
            records
                .filter(|r| r.procedure_code.as_deref() == Some(code.as_str()))
                .map(|r| CatalogOption::detailed(diagnosis_of(r), r)),
        ),
        _ => Vec::new(),
    }
}

/// 按查询顺序构造两个下拉框的选项
pub fn options_for(
    dip: &DipCatalog,
    order: QueryOrder,
    diagnosis_code: Option<&str>,
    procedure: &ProcedureSelection,
) -> QueryOptions {
    match order {
        QueryOrder::DiagnosisFirst => QueryOptions {
            diagnoses: diagnosis_options(dip),
            procedures: diagnosis_code
                .map(|code| procedure_options_for_diagnosis(dip, code))
                .unwrap_or_default(),
        },
        QueryOrder::ProcedureFirst => QueryOptions {
            procedures: procedure_options(dip),
            diagnoses: diagnosis_options_for_procedure(dip, procedure),
        },
    }
}

/// 选项列表的纯文本, 供命令行打印
pub fn render_options(title: &str, options: &[CatalogOption]) -> String {
    let mut out = format!("{} ({}项)\n", title, options.len());
    for o in options {
        out.push_str("  ");
        out.push_str(&o.label);
        out.push('\n');
    }
    out
}
