//! 目录查询
//!
//! 都是对单张目录的顺序扫描, 取第一条命中的记录。诊断编码为空时一律查不到。

use crate::catalog::{DiagnosisCatalog, DipCatalog, SurgeryCatalog};
use crate::model::{DiseaseType, DipGroupRecord, ProcedureCategory};
use crate::normalize::{clean_text, looks_like_diagnosis_code};

fn same(field: &Option<String>, value: &str) -> bool {
    field.as_deref() == Some(value)
}

fn of_diagnosis(record: &DipGroupRecord, diagnosis_code: &str) -> bool {
    !diagnosis_code.is_empty() && same(&record.diagnosis_code, diagnosis_code)
}

/// 手动输入的诊断转成诊断编码
///
/// 输入本身像编码就直接用; 否则按诊断名称精确查找诊断目录, 查不到返回 `None`。
pub fn find_diagnosis_code(diagnosis: &DiagnosisCatalog, input: &str) -> Option<String> {
    let input = clean_text(input)?;
    if looks_like_diagnosis_code(&input) {
        return Some(input);
    }
    diagnosis
        .entries()
        .iter()
        .find(|e| same(&e.name, &input))
        .and_then(|e| e.code.clone())
}

/// 只按诊断编码查找DIP记录
pub fn find_matching_diagnosis<'a>(dip: &'a DipCatalog, diagnosis_code: &str) -> Option<&'a DipGroupRecord> {
    dip.records().iter().find(|r| of_diagnosis(r, diagnosis_code))
}

/// 按诊断编码+操作查找DIP记录, 先匹配操作编码, 再匹配操作名称
pub fn find_matching_operation<'a>(
    dip: &'a DipCatalog,
    diagnosis_code: &str,
    operation: &str,
) -> Option<&'a DipGroupRecord> {
    let operation = clean_text(operation)?;
    let records = dip.records();
    records
        .iter()
        .find(|r| of_diagnosis(r, diagnosis_code) && same(&r.procedure_code, &operation))
        .or_else(|| {
            records
                .iter()
                .find(|r| of_diagnosis(r, diagnosis_code) && same(&r.procedure_name, &operation))
        })
}

/// 在手术操作分类目录中查找操作类别, 先按编码再按名称
pub fn find_operation_category(surgery: &SurgeryCatalog, operation: &str) -> Option<ProcedureCategory> {
    let operation = clean_text(operation)?;
    let entries = surgery.entries();
    entries
        .iter()
        .find(|e| same(&e.code, &operation))
        .or_else(|| entries.iter().find(|e| same(&e.name, &operation)))
        .and_then(|e| e.category.clone())
}

/// 诊断编码对应的病种类型, 取该诊断的第一条记录
pub fn get_diagnosis_type(dip: &DipCatalog, diagnosis_code: &str) -> Option<DiseaseType> {
    find_matching_diagnosis(dip, diagnosis_code).and_then(|r| r.disease_type.clone())
}

/// 综合病种: 按操作类别对应的组别后缀, 在DIP名称中查找
pub fn get_composite_record<'a>(
    dip: &'a DipCatalog,
    diagnosis_code: &str,
    category: &ProcedureCategory,
) -> Option<&'a DipGroupRecord> {
    let suffix = category.composite_suffix()?;
    dip.records().iter().find(|r| {
        of_diagnosis(r, diagnosis_code)
            && r.group_name
                .as_deref()
                .map(|n| n.contains(suffix))
                .unwrap_or(false)
    })
}

/// 基层病种和核心病种的无操作记录
pub fn get_procedure_less_record<'a>(dip: &'a DipCatalog, diagnosis_code: &str) -> Option<&'a DipGroupRecord> {
    dip.records()
        .iter()
        .find(|r| of_diagnosis(r, diagnosis_code) && !r.has_procedure())
}
