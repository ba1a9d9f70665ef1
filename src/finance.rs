//! DIP费用测算
//!
//! 纯计算, 中间结果不做舍入, 只在展示时格式化。

use serde::{Deserialize, Serialize};

/// 费用测算的输入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostInputs {
    pub treatment_fee: f64,       // 诊疗费用
    pub examination_fee: f64,     // 检查检验费用
    pub drug_fee: f64,            // 药品费用
    pub consumables_fee: f64,     // 耗材费用
    pub medical_cost_ratio: f64,  // 医疗性收入成本率
    pub drug_cost_ratio: f64,     // 药耗成本率
    pub fund_paid: f64,           // 统筹基金支付金额
    pub base_score: f64,          // 入组的DIP基准分值
    pub tier_coefficient: f64,    // 级别系数
    pub point_value: f64,         // 点值
}

impl Default for CostInputs {
    fn default() -> Self {
        Self {
            treatment_fee: 3936.93,
            examination_fee: 3348.15,
            drug_fee: 2001.41,
            consumables_fee: 3115.78,
            medical_cost_ratio: 0.50,
            drug_cost_ratio: 1.00,
            fund_paid: 7657.03,
            base_score: 0.0,
            tier_coefficient: 1.0330,
            point_value: 73.6011,
        }
    }
}

/// 费用测算结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DipMetrics {
    pub group_score: f64,              // 入组的DIP分值
    pub total_cost: f64,               // 住院总费用
    pub medical_income: f64,           // 医疗性收入
    pub drug_consumables_income: f64,  // 药耗收入
    pub treatment_cost: f64,           // 治疗成本
    pub patient_self_pay: f64,         // 病人自付金额
    pub payment_standard: f64,         // DIP支付标准
    pub settlement_amount: f64,        // DIP核算金额
    pub true_profit_loss: f64,         // 病例真实盈亏金额
    pub dip_recovery_rate: f64,        // DIP回款率
    pub dip_profit_loss: f64,          // DIP盈亏金额
}

pub fn calculate_dip_metrics(inputs: &CostInputs) -> DipMetrics {
    let group_score = inputs.base_score * inputs.tier_coefficient;
    let total_cost =
        inputs.treatment_fee + inputs.examination_fee + inputs.drug_fee + inputs.consumables_fee;
    let medical_income = inputs.treatment_fee + inputs.examination_fee;
    let drug_consumables_income = inputs.drug_fee + inputs.consumables_fee;
    let treatment_cost =
        medical_income * inputs.medical_cost_ratio + drug_consumables_income * inputs.drug_cost_ratio;
    let patient_self_pay = total_cost - inputs.fund_paid;
    let payment_standard = group_score * inputs.point_value;
    // DIP核算金额为负数时按0计算
    let settlement_amount = (payment_standard - patient_self_pay).max(0.0);
    let true_profit_loss = payment_standard - treatment_cost;
    let dip_recovery_rate = if inputs.fund_paid != 0.0 {
        settlement_amount / inputs.fund_paid
    } else {
        0.0
    };
    let dip_profit_loss = settlement_amount - inputs.fund_paid;

    DipMetrics {
        group_score,
        total_cost,
        medical_income,
        drug_consumables_income,
        treatment_cost,
        patient_self_pay,
        payment_standard,
        settlement_amount,
        true_profit_loss,
        dip_recovery_rate,
        dip_profit_loss,
    }
}

/// 详细计算数据的一行
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailRow {
    pub label: &'static str,
    pub value: f64,
    pub display: String,
}

impl DipMetrics {
    /// 详细计算数据, 回款率显示为百分比, 其他显示为金额
    pub fn detail_rows(&self) -> Vec<DetailRow> {
        let money = |label: &'static str, value: f64| DetailRow { label, value, display: format_money(value) };
        vec![
            money("住院总费用", self.total_cost),
            money("医疗性收入", self.medical_income),
            money("药耗收入", self.drug_consumables_income),
            money("治疗成本", self.treatment_cost),
            money("病人自付金额", self.patient_self_pay),
            money("DIP支付标准", self.payment_standard),
            money("DIP核算金额", self.settlement_amount),
            money("DIP盈亏金额", self.dip_profit_loss),
            money("病例真实盈亏金额", self.true_profit_loss),
            DetailRow {
                label: "DIP回款率",
                value: self.dip_recovery_rate,
                display: format_percent(self.dip_recovery_rate),
            },
            money("入组的DIP分值", self.group_score),
        ]
    }
}

/// 金额格式, 保留两位小数并加千分位: ¥12,402.27
pub fn format_money(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("¥{}{}.{}", sign, grouped, frac_part)
}

/// 百分比格式, 保留两位小数: 12.34%
pub fn format_percent(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() < eps
    }

    #[test]
    fn scenario_with_default_fees() {
        let inputs = CostInputs {
            base_score: 78.0521,
            ..CostInputs::default()
        };
        let m = calculate_dip_metrics(&inputs);
        assert!(approx(m.group_score, 80.6278, 1e-3));
        assert!(approx(m.total_cost, 12402.27, 1e-6));
        assert!(approx(m.medical_income, 7285.08, 1e-6));
        assert!(approx(m.drug_consumables_income, 5117.19, 1e-6));
        assert!(approx(m.treatment_cost, 8759.73, 1e-6));
        assert!(approx(m.patient_self_pay, 4745.24, 1e-6));
        assert!(approx(m.payment_standard, m.group_score * 73.6011, 1e-9));
        assert!(approx(m.settlement_amount, m.payment_standard - 4745.24, 1e-6));
        assert!(approx(m.dip_profit_loss, m.settlement_amount - 7657.03, 1e-9));
        assert!(approx(m.true_profit_loss, m.payment_standard - 8759.73, 1e-6));
    }

    #[test]
    fn settlement_never_negative() {
        let inputs = CostInputs {
            base_score: 1.0,
            fund_paid: 0.0,
            ..CostInputs::default()
        };
        let m = calculate_dip_metrics(&inputs);
        assert!(m.payment_standard < m.patient_self_pay);
        assert_eq!(m.settlement_amount, 0.0);
        assert_eq!(m.dip_recovery_rate, 0.0);
    }

    #[test]
    fn recovery_rate() {
        let inputs = CostInputs {
            base_score: 200.0,
            ..CostInputs::default()
        };
        let m = calculate_dip_metrics(&inputs);
        assert!(approx(m.dip_recovery_rate, m.settlement_amount / 7657.03, 1e-12));
    }

    #[test]
    fn money_and_percent_format() {
        assert_eq!(format_money(12402.27), "¥12,402.27");
        assert_eq!(format_money(1234567.891), "¥1,234,567.89");
        assert_eq!(format_money(999.5), "¥999.50");
        assert_eq!(format_money(-2900.04), "¥-2,900.04");
        assert_eq!(format_money(0.0), "¥0.00");
        assert_eq!(format_percent(0.6214), "62.14%");
    }

    #[test]
    fn detail_rows_order() {
        let m = calculate_dip_metrics(&CostInputs {
            base_score: 78.0521,
            ..CostInputs::default()
        });
        let rows = m.detail_rows();
        assert_eq!(rows.len(), 11);
        assert_eq!(rows[0].label, "住院总费用");
        assert_eq!(rows[0].display, "¥12,402.27");
        assert_eq!(rows[9].label, "DIP回款率");
        assert!(rows[9].display.ends_with('%'));
        assert_eq!(rows[10].label, "入组的DIP分值");
    }
}
