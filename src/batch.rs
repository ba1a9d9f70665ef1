//! 批量分组
//!
//! 读取病例CSV, 逐例入组并测算费用, 结果写回CSV。单个病例无法入组不影响其他病例。

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::{debug, info};

use crate::catalog::custom_deserializer;
use crate::catalog::CatalogSet;
use crate::config::Settings;
use crate::error::{DipError, Result};
use crate::finance::{calculate_dip_metrics, CostInputs};
use crate::grouping::{DiagnosisSelection, DipGrouper, ProcedureSelection, ResolutionRequest};
use crate::normalize::display_or_none;

/// 病例CSV的一行
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CaseRecord {
    pub id: String,                                  // 病例ID
    #[serde(default, deserialize_with = "custom_deserializer::deserialize_text")]
    pub diagnosis: Option<String>,                   // 诊断编码或名称
    #[serde(default, deserialize_with = "custom_deserializer::deserialize_text")]
    pub procedure: Option<String>,                   // 操作编码或名称, 为空即无操作
    #[serde(default, deserialize_with = "custom_deserializer::deserialize_f64")]
    pub treatment_fee: f64,                          // 诊疗费用
    #[serde(default, deserialize_with = "custom_deserializer::deserialize_f64")]
    pub examination_fee: f64,                        // 检查检验费用
    #[serde(default, deserialize_with = "custom_deserializer::deserialize_f64")]
    pub drug_fee: f64,                               // 药品费用
    #[serde(default, deserialize_with = "custom_deserializer::deserialize_f64")]
    pub consumables_fee: f64,                        // 耗材费用
    #[serde(default, deserialize_with = "custom_deserializer::deserialize_f64")]
    pub fund_paid: f64,                              // 统筹基金支付金额
}

impl CaseRecord {
    pub fn request(&self) -> ResolutionRequest {
        let diagnosis = match &self.diagnosis {
            Some(d) => DiagnosisSelection::FreeText(d.clone()),
            None => DiagnosisSelection::None,
        };
        let procedure = match &self.procedure {
            Some(p) => ProcedureSelection::FreeText(p.clone()),
            None => ProcedureSelection::ExplicitNone,
        };
        ResolutionRequest::new(diagnosis, procedure)
    }
}

/// 分组完成后的一行
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedCase {
    pub id: String,
    pub diagnosis_code: String,
    pub procedure_code: String,
    pub matched: bool,
    pub group_code: String,
    pub group_name: String,
    pub disease_type: String,
    pub base_score: f64,
    pub group_score: f64,
    pub total_cost: f64,
    pub payment_standard: f64,
    pub settlement_amount: f64,
    pub true_profit_loss: f64,
    pub dip_recovery_rate: f64,
    pub dip_profit_loss: f64,
    pub trace: String,
}

/// 批量分组的统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchSummary {
    pub total: usize,
    pub matched: usize,
}

pub fn read_cases<R: Read>(reader: R) -> Result<Vec<CaseRecord>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut cases = Vec::new();
    for (i, result) in rdr.deserialize().enumerate() {
        let record: CaseRecord = result.map_err(|e| DipError::CatalogIo(format!("病例第{}行: {}", i + 1, e)))?;
        cases.push(record);
    }
    Ok(cases)
}

pub fn read_cases_from_path<P: AsRef<Path>>(path: P) -> Result<Vec<CaseRecord>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| DipError::CatalogIo(format!("{}: {}", path.display(), e)))?;
    read_cases(file)
}

pub fn write_results<W: Write>(writer: W, grouped: &[GroupedCase]) -> Result<()> {
    let mut wrt = csv::Writer::from_writer(writer);
    for g in grouped {
        wrt.serialize(g)?;
    }
    wrt.flush()?;
    Ok(())
}

/// 单个病例入组并测算
pub fn group_case(
    grouper: &DipGrouper,
    catalogs: &CatalogSet,
    settings: &Settings,
    case: &CaseRecord,
) -> GroupedCase {
    let result = grouper.resolve(catalogs, &case.request());
    let metrics = calculate_dip_metrics(&CostInputs {
        treatment_fee: case.treatment_fee,
        examination_fee: case.examination_fee,
        drug_fee: case.drug_fee,
        consumables_fee: case.consumables_fee,
        fund_paid: case.fund_paid,
        ..settings.cost_inputs(result.base_score)
    });
    debug!("病例 {} 入组结果: {}", case.id, result.group_name);
    GroupedCase {
        id: case.id.clone(),
        diagnosis_code: display_or_none(result.diagnosis_code.as_deref()).to_string(),
        procedure_code: display_or_none(result.procedure_code.as_deref()).to_string(),
        matched: result.matched,
        group_code: display_or_none(result.group_code.as_deref()).to_string(),
        group_name: result.group_name,
        disease_type: result.disease_type,
        base_score: result.base_score,
        group_score: metrics.group_score,
        total_cost: metrics.total_cost,
        payment_standard: metrics.payment_standard,
        settlement_amount: metrics.settlement_amount,
        true_profit_loss: metrics.true_profit_loss,
        dip_recovery_rate: metrics.dip_recovery_rate,
        dip_profit_loss: metrics.dip_profit_loss,
        trace: result.procedure_trace,
    }
}

pub fn batch_group(
    grouper: &DipGrouper,
    catalogs: &CatalogSet,
    settings: &Settings,
    cases: &[CaseRecord],
) -> (Vec<GroupedCase>, BatchSummary) {
    let grouped: Vec<GroupedCase> = cases
        .iter()
        .map(|case| group_case(grouper, catalogs, settings, case))
        .collect();
    let summary = BatchSummary {
        total: grouped.len(),
        matched: grouped.iter().filter(|g| g.matched).count(),
    };
    (grouped, summary)
}

/// 读取病例文件, 批量分组后写入结果文件
pub fn run_batch<P: AsRef<Path>, Q: AsRef<Path>>(
    grouper: &DipGrouper,
    catalogs: &CatalogSet,
    settings: &Settings,
    input: P,
    output: Q,
) -> Result<BatchSummary> {
    let cases = read_cases_from_path(input.as_ref())?;
    info!("读取病例 {} 例: {}", cases.len(), input.as_ref().display());
    let (grouped, summary) = batch_group(grouper, catalogs, settings, &cases);
    let file = File::create(output.as_ref())?;
    write_results(file, &grouped)?;
    info!(
        "批量分组完成, 入组 {}/{}, 结果保存在 {}",
        summary.matched,
        summary.total,
        output.as_ref().display()
    );
    Ok(summary)
}
